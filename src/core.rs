// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::error::{DislocError, Result};

/// Number of columns in a dislocation source vector.
pub const SOURCE_VECTOR_LEN: usize = 10;

/// Amount subtracted from a dip of exactly 90 degrees before it reaches the
/// solver, which is undefined for a perfectly vertical plane.
pub const VERTICAL_DIP_OFFSET: f64 = 1e-5;

/// Default half-space material constant.
pub const DEFAULT_NU: f64 = 1.25;

/// Solver parameters of one rectangular patch, in the fixed column order
/// `[length, width, depth, -dip, strike, easting, northing, strike_slip, dip_slip, opening]`.
pub type SourceVector = [f64; SOURCE_VECTOR_LEN];

fn default_strike() -> f64 {
    45.0
}

fn default_dip() -> f64 {
    45.0
}

fn default_rake() -> f64 {
    90.0
}

fn default_slip() -> f64 {
    1.5
}

fn default_nu() -> f64 {
    DEFAULT_NU
}

fn default_enabled() -> bool {
    true
}

/// A rectangular dislocation patch in an elastic half-space.
///
/// `easting`/`northing`/`depth` locate the middle of the patch's reference
/// edge. The patch extends `length` along strike and `width` down dip.
/// Angles are in degrees, distances and slip in meters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaultPatch {
    /// Easting in [m].
    pub easting: f64,
    /// Northing in [m].
    pub northing: f64,
    /// Depth in [m], positive down.
    pub depth: f64,
    /// Length along strike in [m].
    pub length: f64,
    /// Width down dip in [m].
    pub width: f64,
    /// Strike, clockwise from north in [deg].
    #[serde(default = "default_strike")]
    pub strike: f64,
    /// Dip, down from horizontal in [deg].
    #[serde(default = "default_dip")]
    pub dip: f64,
    /// Rake, clockwise in [deg]; 0 is left-lateral strike-slip.
    #[serde(default = "default_rake")]
    pub rake: f64,
    /// Slip in [m].
    #[serde(default = "default_slip")]
    pub slip: f64,
    /// Tensile opening of the plane in [m].
    #[serde(default)]
    pub opening: f64,
    /// Half-space material constant.
    #[serde(default = "default_nu")]
    pub nu: f64,
}

impl FaultPatch {
    /// Create a patch with default kinematics (strike 45, dip 45, rake 90,
    /// slip 1.5, no opening) and the default material constant.
    ///
    /// # Errors
    /// Returns an error if any attribute is outside its valid range.
    pub fn new(easting: f64, northing: f64, depth: f64, length: f64, width: f64) -> Result<Self> {
        let patch = FaultPatch {
            easting,
            northing,
            depth,
            length,
            width,
            strike: default_strike(),
            dip: default_dip(),
            rake: default_rake(),
            slip: default_slip(),
            opening: 0.0,
            nu: DEFAULT_NU,
        };
        patch.validate()?;
        Ok(patch)
    }

    /// Set the strike in degrees (builder method).
    ///
    /// # Errors
    /// Returns an error if the strike is outside [0, 360).
    pub fn with_strike(mut self, strike: f64) -> Result<Self> {
        self.strike = strike;
        self.validate()?;
        Ok(self)
    }

    /// Set the dip in degrees (builder method).
    ///
    /// # Errors
    /// Returns an error if the dip is outside [0, 90].
    pub fn with_dip(mut self, dip: f64) -> Result<Self> {
        self.dip = dip;
        self.validate()?;
        Ok(self)
    }

    /// Set the rake in degrees (builder method).
    ///
    /// # Errors
    /// Returns an error if the rake is not finite.
    pub fn with_rake(mut self, rake: f64) -> Result<Self> {
        self.rake = rake;
        self.validate()?;
        Ok(self)
    }

    /// Set the slip in meters (builder method).
    ///
    /// # Errors
    /// Returns an error if the slip is not finite.
    pub fn with_slip(mut self, slip: f64) -> Result<Self> {
        self.slip = slip;
        self.validate()?;
        Ok(self)
    }

    /// Set the tensile opening in meters (builder method).
    ///
    /// # Errors
    /// Returns an error if the opening is not finite.
    pub fn with_opening(mut self, opening: f64) -> Result<Self> {
        self.opening = opening;
        self.validate()?;
        Ok(self)
    }

    /// Set the material constant (builder method).
    ///
    /// # Errors
    /// Returns an error if `nu` is not finite.
    pub fn with_nu(mut self, nu: f64) -> Result<Self> {
        self.nu = nu;
        self.validate()?;
        Ok(self)
    }

    /// Check every attribute against its valid range.
    ///
    /// # Errors
    /// Returns [`DislocError::InvalidPatch`] naming the first offending attribute.
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("easting", self.easting),
            ("northing", self.northing),
            ("depth", self.depth),
            ("length", self.length),
            ("width", self.width),
            ("strike", self.strike),
            ("dip", self.dip),
            ("rake", self.rake),
            ("slip", self.slip),
            ("opening", self.opening),
            ("nu", self.nu),
        ];
        for (field, value) in fields {
            if !value.is_finite() {
                return Err(DislocError::InvalidPatch {
                    field,
                    value,
                    reason: "must be finite",
                });
            }
        }

        if self.depth < 0.0 {
            return Err(DislocError::InvalidPatch {
                field: "depth",
                value: self.depth,
                reason: "must be >= 0",
            });
        }
        if self.length <= 0.0 {
            return Err(DislocError::InvalidPatch {
                field: "length",
                value: self.length,
                reason: "must be positive",
            });
        }
        if self.width <= 0.0 {
            return Err(DislocError::InvalidPatch {
                field: "width",
                value: self.width,
                reason: "must be positive",
            });
        }
        if !(0.0..360.0).contains(&self.strike) {
            return Err(DislocError::InvalidPatch {
                field: "strike",
                value: self.strike,
                reason: "must be in [0, 360)",
            });
        }
        if !(0.0..=90.0).contains(&self.dip) {
            return Err(DislocError::InvalidPatch {
                field: "dip",
                value: self.dip,
                reason: "must be in [0, 90]",
            });
        }
        Ok(())
    }

    /// Strike-slip component of the slip vector, `cos(rake) * slip`.
    pub fn strike_slip(&self) -> f64 {
        self.rake.to_radians().cos() * self.slip
    }

    /// Dip-slip component of the slip vector, `sin(rake) * slip`.
    pub fn dip_slip(&self) -> f64 {
        self.rake.to_radians().sin() * self.slip
    }

    /// Build the solver parameter vector for this patch.
    ///
    /// The dip enters negated, which tells the solver that the reference
    /// point sits on the top edge of the plane. A dip of exactly 90 degrees
    /// is replaced by `90 - VERTICAL_DIP_OFFSET`.
    pub fn source_vector(&self) -> SourceVector {
        let dip = if self.dip == 90.0 {
            self.dip - VERTICAL_DIP_OFFSET
        } else {
            self.dip
        };

        [
            self.length,
            self.width,
            self.depth,
            -dip,
            self.strike,
            self.easting,
            self.northing,
            self.strike_slip(),
            self.dip_slip(),
            self.opening,
        ]
    }

    /// Corner points of the patch projected onto the map plane, as
    /// `[easting, northing]` pairs.
    ///
    /// Corners 0 and 1 are the ends of the reference edge; corners 2 and 3
    /// are the far edge, displaced by the horizontal projection of the width.
    pub fn outline(&self) -> [[f64; 2]; 4] {
        let (s_strike, c_strike) = self.strike.to_radians().sin_cos();
        let c_dip = self.dip.to_radians().cos();
        let half = self.length / 2.0;
        let horizontal_width = c_dip * self.width;

        let c0 = [s_strike * half, c_strike * half];
        let c1 = [-c0[0], -c0[1]];
        let c2 = [
            c1[0] - c_strike * horizontal_width,
            c1[1] + s_strike * horizontal_width,
        ];
        let c3 = [
            c0[0] - c_strike * horizontal_width,
            c0[1] + s_strike * horizontal_width,
        ];

        [c0, c1, c2, c3].map(|[e, n]| [e + self.easting, n + self.northing])
    }
}

/// A fault patch owned by a path, with a flag that keeps it addressable
/// while excluding it from forward modeling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathSegment {
    /// Geometry and kinematics of the segment.
    pub patch: FaultPatch,
    /// Whether the segment contributes to the forward model.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl PathSegment {
    /// Wrap a patch as an enabled segment.
    pub fn new(patch: FaultPatch) -> Self {
        PathSegment {
            patch,
            enabled: true,
        }
    }
}

/// Anything that exposes an ordered sequence of enabled fault patches
/// sharing one material constant.
///
/// Implemented by a standalone [`FaultPatch`] (a single segment) and by
/// [`FaultPath`](crate::path::FaultPath).
pub trait DislocSource {
    /// Material constant shared by all segments of this source.
    fn nu(&self) -> f64;

    /// Enabled segments, in order.
    fn enabled_segments(&self) -> Vec<&FaultPatch>;

    /// Source vectors of all enabled segments, one per row, in segment order.
    fn disloc_source(&self) -> Vec<SourceVector> {
        self.enabled_segments()
            .into_iter()
            .map(FaultPatch::source_vector)
            .collect()
    }
}

impl DislocSource for FaultPatch {
    fn nu(&self) -> f64 {
        self.nu
    }

    fn enabled_segments(&self) -> Vec<&FaultPatch> {
        vec![self]
    }
}

/// Build a regular observation grid of `nx * ny` surface points.
///
/// Rows are ordered northing-major: point `j * nx + i` sits at the i-th
/// easting and j-th northing. An axis with a single sample uses its minimum.
///
/// # Errors
/// Returns an error if a bound is not finite, a range is reversed, a sample
/// count is zero, or the grid has more points than fit in memory addressing.
pub fn regular_grid(
    easting: (f64, f64),
    northing: (f64, f64),
    nx: usize,
    ny: usize,
) -> Result<Array2<f64>> {
    for (name, (lo, hi)) in [("easting", easting), ("northing", northing)] {
        if !lo.is_finite() || !hi.is_finite() || hi < lo {
            return Err(DislocError::InvalidGrid(format!(
                "{} range [{}, {}] must be finite and increasing",
                name, lo, hi
            )));
        }
    }
    if nx == 0 || ny == 0 {
        return Err(DislocError::InvalidGrid(format!(
            "sample counts must be >= 1, got {}x{}",
            nx, ny
        )));
    }

    let axis = |(lo, hi): (f64, f64), n: usize, k: usize| {
        if n == 1 {
            lo
        } else {
            lo + (hi - lo) * k as f64 / (n - 1) as f64
        }
    };

    let npoints = nx
        .checked_mul(ny)
        .filter(|n| n.checked_mul(2).is_some_and(|len| len <= isize::MAX as usize))
        .ok_or_else(|| {
            DislocError::InvalidGrid(format!("{}x{} samples is too many points", nx, ny))
        })?;

    let mut coords = Array2::zeros((npoints, 2));
    for j in 0..ny {
        let n = axis(northing, ny, j);
        for i in 0..nx {
            let row = j * nx + i;
            coords[[row, 0]] = axis(easting, nx, i);
            coords[[row, 1]] = n;
        }
    }
    Ok(coords)
}
