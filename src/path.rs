// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use tracing::debug;

use crate::core::{DislocSource, FaultPatch, PathSegment, DEFAULT_NU};
use crate::error::{DislocError, Result};

/// Coefficient of the rupture width-length scaling, `width = 15 * length^0.66`
/// (Leonard, 2010, BSSA 100(5)).
pub const WIDTH_SCALE: f64 = 15.0;

/// Exponent of the rupture width-length scaling.
pub const WIDTH_EXPONENT: f64 = 0.66;

const SEGMENT_DEPTH: f64 = 0.0;
const SEGMENT_DIP: f64 = 45.0;
const SEGMENT_RAKE: f64 = 90.0;
const SEGMENT_SLIP: f64 = 45.0;

/// Geometry of a segment derived from its two end nodes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentGeometry {
    /// Easting of the segment midpoint in [m].
    pub easting: f64,
    /// Northing of the segment midpoint in [m].
    pub northing: f64,
    /// Distance between the nodes in [m].
    pub length: f64,
    /// Down-dip width from the scaling relation in [m].
    pub width: f64,
    /// Bearing from the first node to the second, clockwise from north in [deg].
    pub strike: f64,
}

impl SegmentGeometry {
    /// Derive segment geometry from two `[easting, northing]` nodes, ordered
    /// `from` -> `to`.
    ///
    /// The strike is `arccos(dN / length)`, mirrored to `360 - arccos(dN / length)`
    /// when the segment trends west so it stays a clockwise bearing.
    ///
    /// # Errors
    /// Returns [`DislocError::DegenerateSegment`] if the nodes coincide, and
    /// [`DislocError::InvalidPatch`] if a coordinate is not finite.
    pub fn between(from: [f64; 2], to: [f64; 2]) -> Result<Self> {
        for (field, value) in [
            ("easting", from[0]),
            ("northing", from[1]),
            ("easting", to[0]),
            ("northing", to[1]),
        ] {
            if !value.is_finite() {
                return Err(DislocError::InvalidPatch {
                    field,
                    value,
                    reason: "node coordinates must be finite",
                });
            }
        }

        let de = to[0] - from[0];
        let dn = to[1] - from[1];
        let length = de.hypot(dn);
        if length <= 0.0 {
            return Err(DislocError::DegenerateSegment { from, to });
        }

        let mut strike = (dn / length).clamp(-1.0, 1.0).acos().to_degrees();
        if de < 0.0 {
            strike = 360.0 - strike;
        }
        if strike >= 360.0 {
            strike -= 360.0;
        }

        Ok(SegmentGeometry {
            easting: from[0] + de / 2.0,
            northing: from[1] + dn / 2.0,
            length,
            width: WIDTH_SCALE * length.powf(WIDTH_EXPONENT),
            strike,
        })
    }

    /// Overwrite the geometry fields of `patch`, leaving depth, dip,
    /// kinematics and material untouched.
    fn apply(&self, patch: &mut FaultPatch) {
        patch.easting = self.easting;
        patch.northing = self.northing;
        patch.length = self.length;
        patch.width = self.width;
        patch.strike = self.strike;
    }
}

/// Attribute overrides applied when a path creates a new segment.
///
/// Unset fields fall back to depth 0, dip 45, rake 90, slip 45 and no opening.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SegmentOverrides {
    /// Depth in [m].
    pub depth: Option<f64>,
    /// Dip in [deg].
    pub dip: Option<f64>,
    /// Rake in [deg].
    pub rake: Option<f64>,
    /// Slip in [m].
    pub slip: Option<f64>,
    /// Opening in [m].
    pub opening: Option<f64>,
}

/// A polyline of nodes approximating a curved rupture trace, with one
/// [`PathSegment`] per consecutive node pair.
///
/// Every edit either re-establishes `segments.len() == nodes.len() - 1` or
/// fails before touching the path. Segments are updated in place so their
/// `enabled` flag and kinematics survive node edits.
#[derive(Debug, Clone, PartialEq)]
pub struct FaultPath {
    origin_easting: f64,
    origin_northing: f64,
    nu: f64,
    nodes: Vec<[f64; 2]>,
    segments: Vec<PathSegment>,
}

impl FaultPath {
    /// Create a path whose only node is the origin.
    pub fn new(origin_easting: f64, origin_northing: f64) -> Self {
        FaultPath {
            origin_easting,
            origin_northing,
            nu: DEFAULT_NU,
            nodes: vec![[origin_easting, origin_northing]],
            segments: Vec::new(),
        }
    }

    /// Set the material constant of the path and all of its segments
    /// (builder method).
    ///
    /// # Errors
    /// Returns an error if `nu` is not finite.
    pub fn with_nu(mut self, nu: f64) -> Result<Self> {
        if !nu.is_finite() {
            return Err(DislocError::InvalidMaterial(nu));
        }
        self.nu = nu;
        for segment in &mut self.segments {
            segment.patch.nu = nu;
        }
        Ok(self)
    }

    /// Rebuild a stored path.
    ///
    /// An empty node list is replaced by the origin. Without stored segments,
    /// segments are derived from the nodes. Stored segments keep their
    /// `enabled` flag and kinematics, but their geometry is re-derived from
    /// the nodes and their material constant is set to `nu`.
    ///
    /// # Errors
    /// Returns an error if the segment count does not match the nodes, two
    /// consecutive nodes coincide, or a stored segment is invalid.
    pub fn from_parts(
        origin: [f64; 2],
        nu: f64,
        nodes: Vec<[f64; 2]>,
        segments: Option<Vec<PathSegment>>,
    ) -> Result<Self> {
        let mut path = FaultPath::new(origin[0], origin[1]).with_nu(nu)?;
        let nodes = if nodes.is_empty() { vec![origin] } else { nodes };

        match segments {
            None => {
                path.nodes = vec![nodes[0]];
                for node in &nodes[1..] {
                    path.add_node(node[0], node[1])?;
                }
            }
            Some(mut segments) => {
                if segments.len() + 1 != nodes.len() {
                    return Err(DislocError::SegmentCountMismatch {
                        expected: nodes.len() - 1,
                        got: segments.len(),
                    });
                }
                for (pair, segment) in nodes.windows(2).zip(segments.iter_mut()) {
                    SegmentGeometry::between(pair[0], pair[1])?.apply(&mut segment.patch);
                    segment.patch.nu = nu;
                    segment.patch.validate()?;
                }
                path.nodes = nodes;
                path.segments = segments;
            }
        }
        Ok(path)
    }

    /// Reference point `[easting, northing]` the path was created at.
    pub fn origin(&self) -> [f64; 2] {
        [self.origin_easting, self.origin_northing]
    }

    /// Nodes as `[easting, northing]` pairs.
    pub fn nodes(&self) -> &[[f64; 2]] {
        &self.nodes
    }

    /// All segments, enabled or not.
    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// Mutable access to one segment, for edits of kinematics or the
    /// `enabled` flag. Geometry fields are re-derived on the next edit of an
    /// adjacent node.
    ///
    /// A segment's `nu` follows the path: change it with
    /// [`FaultPath::with_nu`]. The forward model rejects a segment whose `nu`
    /// differs from its path's, and [`FaultPath::from_parts`] resets it.
    pub fn segment_mut(&mut self, index: usize) -> Option<&mut PathSegment> {
        self.segments.get_mut(index)
    }

    /// Include or exclude one segment from forward modeling.
    ///
    /// # Errors
    /// Returns an error if `index` does not address a segment.
    pub fn set_enabled(&mut self, index: usize, enabled: bool) -> Result<()> {
        let len = self.segments.len();
        let segment = self
            .segments
            .get_mut(index)
            .ok_or(DislocError::SegmentIndexOutOfRange { index, len })?;
        segment.enabled = enabled;
        Ok(())
    }

    /// Number of segments.
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// True if the path has no segments yet (a single node).
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    fn new_segment(
        &self,
        from: [f64; 2],
        to: [f64; 2],
        overrides: &SegmentOverrides,
    ) -> Result<PathSegment> {
        let geometry = SegmentGeometry::between(from, to)?;
        let patch = FaultPatch {
            easting: geometry.easting,
            northing: geometry.northing,
            depth: overrides.depth.unwrap_or(SEGMENT_DEPTH),
            length: geometry.length,
            width: geometry.width,
            strike: geometry.strike,
            dip: overrides.dip.unwrap_or(SEGMENT_DIP),
            rake: overrides.rake.unwrap_or(SEGMENT_RAKE),
            slip: overrides.slip.unwrap_or(SEGMENT_SLIP),
            opening: overrides.opening.unwrap_or(0.0),
            nu: self.nu,
        };
        patch.validate()?;
        Ok(PathSegment::new(patch))
    }

    /// Append a node and a segment joining it to the previous last node.
    /// Earlier segments are not touched.
    ///
    /// # Errors
    /// Returns an error if the node coincides with the last node.
    pub fn add_node(&mut self, easting: f64, northing: f64) -> Result<()> {
        self.add_node_with(easting, northing, &SegmentOverrides::default())
    }

    /// Append a node, creating its segment with the given attribute overrides.
    ///
    /// # Errors
    /// Returns an error if the node coincides with the last node or an
    /// override is out of range.
    pub fn add_node_with(
        &mut self,
        easting: f64,
        northing: f64,
        overrides: &SegmentOverrides,
    ) -> Result<()> {
        let node = [easting, northing];
        let Some(&last) = self.nodes.last() else {
            self.nodes.push(node);
            return Ok(());
        };

        let segment = self.new_segment(last, node, overrides)?;
        self.nodes.push(node);
        self.segments.push(segment);
        debug!(
            easting,
            northing,
            segments = self.segments.len(),
            "appended path node"
        );
        Ok(())
    }

    /// Insert a node at index `pos`.
    ///
    /// A new segment joins the inserted node to its successor, and the
    /// segment ending at the old node `pos` is re-derived to end at the
    /// inserted node instead. `pos == nodes.len()` appends.
    ///
    /// # Errors
    /// Returns an error if `pos > nodes.len()` or the node coincides with a
    /// neighbor. The path is unchanged on error.
    pub fn insert_node(&mut self, pos: usize, easting: f64, northing: f64) -> Result<()> {
        let len = self.nodes.len();
        if pos > len {
            return Err(DislocError::NodeIndexOutOfRange { pos, len });
        }
        if pos == len {
            return self.add_node(easting, northing);
        }

        let node = [easting, northing];
        let segment = self.new_segment(node, self.nodes[pos], &SegmentOverrides::default())?;
        let preceding = if pos > 0 {
            Some(SegmentGeometry::between(self.nodes[pos - 1], node)?)
        } else {
            None
        };

        self.nodes.insert(pos, node);
        self.segments.insert(pos, segment);
        if let Some(geometry) = preceding {
            geometry.apply(&mut self.segments[pos - 1].patch);
        }
        debug!(
            pos,
            easting,
            northing,
            segments = self.segments.len(),
            "inserted path node"
        );
        Ok(())
    }

    /// Relocate node `pos` and re-derive the one or two segments touching it.
    ///
    /// # Errors
    /// Returns an error if `pos` does not address a node or the moved node
    /// would coincide with a neighbor. The path is unchanged on error.
    pub fn move_node(&mut self, pos: usize, easting: f64, northing: f64) -> Result<()> {
        let len = self.nodes.len();
        if pos >= len {
            return Err(DislocError::NodeIndexOutOfRange { pos, len });
        }

        let node = [easting, northing];
        let following = if pos + 1 < len {
            Some(SegmentGeometry::between(node, self.nodes[pos + 1])?)
        } else {
            None
        };
        let preceding = if pos > 0 {
            Some(SegmentGeometry::between(self.nodes[pos - 1], node)?)
        } else {
            None
        };

        self.nodes[pos] = node;
        if let Some(geometry) = following {
            geometry.apply(&mut self.segments[pos].patch);
        }
        if let Some(geometry) = preceding {
            geometry.apply(&mut self.segments[pos - 1].patch);
        }
        debug!(pos, easting, northing, "moved path node");
        Ok(())
    }

    /// Outline polygons of every segment, enabled or not.
    pub fn outlines(&self) -> Vec<[[f64; 2]; 4]> {
        self.segments.iter().map(|s| s.patch.outline()).collect()
    }
}

impl DislocSource for FaultPath {
    fn nu(&self) -> f64 {
        self.nu
    }

    fn enabled_segments(&self) -> Vec<&FaultPatch> {
        self.segments
            .iter()
            .filter(|s| s.enabled)
            .map(|s| &s.patch)
            .collect()
    }
}
