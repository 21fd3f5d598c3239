// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use std::collections::BTreeMap;
use std::time::Instant;

use ndarray::{s, Array1, Array2, ArrayView2};
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::core::{DislocSource, SourceVector, SOURCE_VECTOR_LEN};
use crate::error::{DislocError, Result};
use crate::kernels::displacement_at;

/// Timing and diagnostic values reported by a solver binding.
pub type ProcessorProfile = BTreeMap<String, f64>;

/// Call contract of an elastic half-space dislocation solver.
///
/// `sources` has one row per fault segment in [`SourceVector`] column order;
/// `coords` has one row per observation point with easting and northing in
/// the first two columns. The returned matrix has one row per observation
/// point and the columns `[north, east, down]`.
pub trait DislocSolver: Sync {
    /// Compute surface displacement for all observation points.
    ///
    /// `nthreads` is an advisory degree of parallelism; 0 lets the solver
    /// choose. Bindings may record diagnostics in `profile`.
    ///
    /// # Errors
    /// Returns an error if the inputs are unusable or the computation fails.
    fn disloc(
        &self,
        sources: ArrayView2<'_, f64>,
        coords: ArrayView2<'_, f64>,
        nu: f64,
        nthreads: usize,
        profile: &mut ProcessorProfile,
    ) -> Result<Array2<f64>>;
}

/// Okada (1985) closed-form surface solution, summed over all sources and
/// evaluated in parallel over observation points.
///
/// `nu` is Poisson's ratio; the kernel uses `mu / (lambda + mu) = 1 - 2 nu`.
#[derive(Debug, Clone, Copy, Default)]
pub struct OkadaSolver;

impl DislocSolver for OkadaSolver {
    fn disloc(
        &self,
        sources: ArrayView2<'_, f64>,
        coords: ArrayView2<'_, f64>,
        nu: f64,
        nthreads: usize,
        profile: &mut ProcessorProfile,
    ) -> Result<Array2<f64>> {
        if !nu.is_finite() {
            return Err(DislocError::InvalidMaterial(nu));
        }
        if sources.ncols() != SOURCE_VECTOR_LEN {
            return Err(DislocError::ShapeMismatch {
                expected: vec![sources.nrows(), SOURCE_VECTOR_LEN],
                got: sources.shape().to_vec(),
            });
        }
        if coords.ncols() < 2 {
            return Err(DislocError::ShapeMismatch {
                expected: vec![coords.nrows(), 2],
                got: coords.shape().to_vec(),
            });
        }

        let alpha = 1.0 - 2.0 * nu;
        let rows: Vec<SourceVector> = sources
            .rows()
            .into_iter()
            .map(|row| {
                let mut v = [0.0; SOURCE_VECTOR_LEN];
                for (dst, src) in v.iter_mut().zip(row.iter()) {
                    *dst = *src;
                }
                v
            })
            .collect();

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(nthreads)
            .build()
            .map_err(|e| DislocError::Solver(e.to_string()))?;
        let threads = pool.current_num_threads();
        debug!(
            sources = rows.len(),
            points = coords.nrows(),
            threads,
            "dispatching okada solver"
        );

        let start = Instant::now();
        let num_points = coords.nrows();
        let displacement: Vec<[f64; 3]> = pool.install(|| {
            (0..num_points)
                .into_par_iter()
                .map(|i| {
                    let (e, n) = (coords[[i, 0]], coords[[i, 1]]);
                    let mut total = [0.0; 3];
                    for src in &rows {
                        let u = displacement_at(src, alpha, e, n);
                        for (t, v) in total.iter_mut().zip(u) {
                            *t += v;
                        }
                    }
                    total
                })
                .collect()
        });
        let elapsed = start.elapsed();

        profile.insert("sources".to_string(), rows.len() as f64);
        profile.insert("points".to_string(), num_points as f64);
        profile.insert("threads".to_string(), threads as f64);
        profile.insert("elapsed_s".to_string(), elapsed.as_secs_f64());

        let flat: Vec<f64> = displacement.into_iter().flatten().collect();
        Array2::from_shape_vec((num_points, 3), flat)
            .map_err(|e| DislocError::Solver(format!("output shape error: {}", e)))
    }
}

/// Surface displacement at each observation point, aligned with the input
/// coordinate order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DisplacementResult {
    /// North displacement in [m].
    pub north: Array1<f64>,
    /// East displacement in [m].
    pub east: Array1<f64>,
    /// Down displacement in [m].
    pub down: Array1<f64>,
    /// Diagnostics reported by the solver binding.
    pub processor_profile: ProcessorProfile,
}

impl DisplacementResult {
    /// Number of observation points.
    pub fn len(&self) -> usize {
        self.north.len()
    }

    /// True if there are no observation points.
    pub fn is_empty(&self) -> bool {
        self.north.is_empty()
    }

    /// Up displacement, the negated down component.
    pub fn up(&self) -> Array1<f64> {
        -&self.down
    }

    /// Project the displacement onto a radar line of sight.
    ///
    /// `theta` is measured from the vertical and `phi` is the azimuth from
    /// east, both in radians; the unit vector is
    /// `(sin theta cos phi, sin theta sin phi, cos theta)` in east, north, up.
    pub fn line_of_sight(&self, theta: f64, phi: f64) -> Array1<f64> {
        let (st, ct) = theta.sin_cos();
        let (sp, cp) = phi.sin_cos();
        &self.east * (st * cp) + &self.north * (st * sp) - &self.down * ct
    }
}

/// Forward-model pipeline: stacks the enabled segments of all sources into
/// one batch and hands it to a [`DislocSolver`].
///
/// Holds no state between calls; concurrent calls with independent inputs
/// are safe.
#[derive(Debug, Clone, Default)]
pub struct DislocProcessor<S = OkadaSolver> {
    solver: S,
}

impl DislocProcessor<OkadaSolver> {
    /// Create a processor backed by the bundled Okada solver.
    pub fn new() -> Self {
        DislocProcessor {
            solver: OkadaSolver,
        }
    }
}

impl<S: DislocSolver> DislocProcessor<S> {
    /// Create a processor backed by a custom solver.
    pub fn with_solver(solver: S) -> Self {
        DislocProcessor { solver }
    }

    /// Get a reference to the solver.
    pub fn solver(&self) -> &S {
        &self.solver
    }

    /// Compute surface displacement at `coords` due to all enabled segments
    /// of `sources`.
    ///
    /// Segments are stacked in source-then-segment order. `coords` must have
    /// two (easting, northing) or three columns; a third column is ignored.
    ///
    /// # Errors
    /// Returns an error if no segment is enabled, contributing sources
    /// disagree on `nu`, a segment's `nu` differs from its source's, a segment is invalid, `coords` has the wrong shape,
    /// or the solver fails. Solver errors are returned unchanged.
    pub fn process(
        &self,
        sources: &[&dyn DislocSource],
        coords: ArrayView2<'_, f64>,
        nthreads: usize,
    ) -> Result<DisplacementResult> {
        let coords = match coords.ncols() {
            2 => coords,
            3 => {
                warn!("ignoring third coordinate column; the solution is evaluated at the surface");
                coords.slice_move(s![.., ..2])
            }
            _ => {
                return Err(DislocError::ShapeMismatch {
                    expected: vec![coords.nrows(), 2],
                    got: coords.shape().to_vec(),
                })
            }
        };

        let mut nu: Option<f64> = None;
        let mut rows: Vec<SourceVector> = Vec::new();
        for (index, source) in sources.iter().enumerate() {
            let segments = source.enabled_segments();
            if segments.is_empty() {
                continue;
            }
            match nu {
                None => nu = Some(source.nu()),
                Some(expected) if expected != source.nu() => {
                    return Err(DislocError::MixedMaterial {
                        expected,
                        got: source.nu(),
                        source: index,
                    });
                }
                Some(_) => {}
            }
            for segment in segments {
                segment.validate()?;
                if segment.nu != source.nu() {
                    return Err(DislocError::MixedMaterial {
                        expected: source.nu(),
                        got: segment.nu,
                        source: index,
                    });
                }
                rows.push(segment.source_vector());
            }
        }
        let Some(nu) = nu else {
            return Err(DislocError::NoEnabledSegments);
        };

        let num_segments = rows.len();
        let flat: Vec<f64> = rows.iter().flatten().copied().collect();
        let batch = Array2::from_shape_vec((num_segments, SOURCE_VECTOR_LEN), flat)
            .map_err(|e| DislocError::Other(format!("shape error: {}", e)))?;

        let start = Instant::now();
        let mut profile = ProcessorProfile::new();
        let res = self
            .solver
            .disloc(batch.view(), coords, nu, nthreads, &mut profile)?;

        let num_points = coords.nrows();
        if res.dim() != (num_points, 3) {
            return Err(DislocError::Solver(format!(
                "solver returned shape {:?}, expected [{}, 3]",
                res.shape(),
                num_points
            )));
        }

        info!(
            segments = num_segments,
            points = num_points,
            elapsed_ms = start.elapsed().as_secs_f64() * 1e3,
            "forward model complete"
        );

        Ok(DisplacementResult {
            north: res.column(0).to_owned(),
            east: res.column(1).to_owned(),
            down: res.column(2).to_owned(),
            processor_profile: profile,
        })
    }
}

/// Run the forward model with the bundled Okada solver.
///
/// # Errors
/// See [`DislocProcessor::process`].
pub fn process(
    sources: &[&dyn DislocSource],
    coords: ArrayView2<'_, f64>,
    nthreads: usize,
) -> Result<DisplacementResult> {
    DislocProcessor::new().process(sources, coords, nthreads)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::FaultPatch;
    use crate::path::FaultPath;
    use ndarray::array;
    use std::sync::Mutex;

    /// Records its inputs and returns `[i, 10 + i, 20 + i]` for point `i`.
    #[derive(Default)]
    struct RecordingSolver {
        calls: Mutex<Vec<(Array2<f64>, f64, usize)>>,
    }

    impl DislocSolver for RecordingSolver {
        fn disloc(
            &self,
            sources: ArrayView2<'_, f64>,
            coords: ArrayView2<'_, f64>,
            nu: f64,
            nthreads: usize,
            profile: &mut ProcessorProfile,
        ) -> Result<Array2<f64>> {
            self.calls
                .lock()
                .unwrap()
                .push((sources.to_owned(), nu, nthreads));
            profile.insert("calls".to_string(), 1.0);
            let n = coords.nrows();
            Ok(Array2::from_shape_fn((n, 3), |(i, j)| (10 * j + i) as f64))
        }
    }

    struct FailingSolver;

    impl DislocSolver for FailingSolver {
        fn disloc(
            &self,
            _sources: ArrayView2<'_, f64>,
            _coords: ArrayView2<'_, f64>,
            _nu: f64,
            _nthreads: usize,
            _profile: &mut ProcessorProfile,
        ) -> Result<Array2<f64>> {
            Err(DislocError::Solver("resource exhausted".to_string()))
        }
    }

    struct TransposedSolver;

    impl DislocSolver for TransposedSolver {
        fn disloc(
            &self,
            _sources: ArrayView2<'_, f64>,
            coords: ArrayView2<'_, f64>,
            _nu: f64,
            _nthreads: usize,
            _profile: &mut ProcessorProfile,
        ) -> Result<Array2<f64>> {
            Ok(Array2::zeros((3, coords.nrows())))
        }
    }

    fn patch(easting: f64) -> FaultPatch {
        FaultPatch::new(easting, 0.0, 1000.0, 4000.0, 2000.0).unwrap()
    }

    fn path() -> FaultPath {
        let mut path = FaultPath::new(0.0, 0.0);
        path.add_node(0.0, 1000.0).unwrap();
        path.add_node(1000.0, 2000.0).unwrap();
        path.add_node(2000.0, 2000.0).unwrap();
        path
    }

    #[test]
    fn stacks_sources_then_segments() {
        let a = patch(10.0);
        let mut p = path();
        p.set_enabled(1, false).unwrap();
        let b = patch(20.0);
        let processor = DislocProcessor::with_solver(RecordingSolver::default());
        let coords = array![[0.0, 0.0], [1.0, 1.0]];

        processor
            .process(&[&a, &p, &b], coords.view(), 3)
            .unwrap();

        let calls = processor.solver().calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        let (batch, nu, threads) = &calls[0];
        assert_eq!(batch.nrows(), 4);
        assert_eq!(batch.row(0).to_vec(), a.source_vector().to_vec());
        assert_eq!(
            batch.row(1).to_vec(),
            p.segments()[0].patch.source_vector().to_vec()
        );
        assert_eq!(
            batch.row(2).to_vec(),
            p.segments()[2].patch.source_vector().to_vec()
        );
        assert_eq!(batch.row(3).to_vec(), b.source_vector().to_vec());
        assert_eq!(*nu, a.nu);
        assert_eq!(*threads, 3);
    }

    #[test]
    fn output_columns_are_north_east_down() {
        let a = patch(0.0);
        let processor = DislocProcessor::with_solver(RecordingSolver::default());
        let coords = array![[0.0, 0.0], [5.0, 5.0], [9.0, 9.0]];
        let result = processor.process(&[&a], coords.view(), 0).unwrap();
        assert_eq!(result.len(), 3);
        assert_eq!(result.north.to_vec(), vec![0.0, 1.0, 2.0]);
        assert_eq!(result.east.to_vec(), vec![10.0, 11.0, 12.0]);
        assert_eq!(result.down.to_vec(), vec![20.0, 21.0, 22.0]);
        assert_eq!(result.processor_profile.get("calls"), Some(&1.0));
    }

    #[test]
    fn empty_sources_rejected() {
        let processor = DislocProcessor::with_solver(RecordingSolver::default());
        let coords = array![[0.0, 0.0]];
        let result = processor.process(&[], coords.view(), 0);
        assert!(matches!(result, Err(DislocError::NoEnabledSegments)));
        assert!(processor.solver().calls.lock().unwrap().is_empty());
    }

    #[test]
    fn all_disabled_rejected() {
        let mut p = path();
        for i in 0..p.len() {
            p.set_enabled(i, false).unwrap();
        }
        let bare = FaultPath::new(0.0, 0.0);
        let processor = DislocProcessor::with_solver(RecordingSolver::default());
        let coords = array![[0.0, 0.0]];
        let result = processor.process(&[&p, &bare], coords.view(), 0);
        assert!(matches!(result, Err(DislocError::NoEnabledSegments)));
        assert!(processor.solver().calls.lock().unwrap().is_empty());
    }

    #[test]
    fn mixed_nu_rejected() {
        let a = patch(0.0);
        let b = patch(100.0).with_nu(0.25).unwrap();
        let processor = DislocProcessor::with_solver(RecordingSolver::default());
        let coords = array![[0.0, 0.0]];
        let result = processor.process(&[&a, &b], coords.view(), 0);
        assert!(matches!(
            result,
            Err(DislocError::MixedMaterial { source: 1, .. })
        ));
    }

    #[test]
    fn mixed_nu_ignored_for_sources_without_segments() {
        let a = patch(0.0);
        let bare = FaultPath::new(0.0, 0.0).with_nu(0.3).unwrap();
        let processor = DislocProcessor::with_solver(RecordingSolver::default());
        let coords = array![[0.0, 0.0]];
        assert!(processor.process(&[&bare, &a], coords.view(), 0).is_ok());
    }

    #[test]
    fn coordinate_shape_checked() {
        let a = patch(0.0);
        let processor = DislocProcessor::with_solver(RecordingSolver::default());

        let wide = Array2::<f64>::zeros((2, 4));
        assert!(matches!(
            processor.process(&[&a], wide.view(), 0),
            Err(DislocError::ShapeMismatch { .. })
        ));

        let with_elevation = array![[0.0, 0.0, 15.0], [1.0, 1.0, 20.0]];
        let result = processor.process(&[&a], with_elevation.view(), 0).unwrap();
        assert_eq!(result.len(), 2);
    }

    #[test]
    fn solver_error_propagates_unchanged() {
        let a = patch(0.0);
        let processor = DislocProcessor::with_solver(FailingSolver);
        let coords = array![[0.0, 0.0]];
        match processor.process(&[&a], coords.view(), 0) {
            Err(DislocError::Solver(msg)) => assert_eq!(msg, "resource exhausted"),
            other => panic!("expected solver error, got {:?}", other),
        }
    }

    #[test]
    fn solver_output_shape_checked() {
        let a = patch(0.0);
        let processor = DislocProcessor::with_solver(TransposedSolver);
        let coords = array![[0.0, 0.0], [1.0, 0.0]];
        assert!(matches!(
            processor.process(&[&a], coords.view(), 0),
            Err(DislocError::Solver(_))
        ));
    }

    #[test]
    fn edited_invalid_segment_rejected() {
        let mut p = path();
        p.segment_mut(0).unwrap().patch.depth = -10.0;
        let processor = DislocProcessor::with_solver(RecordingSolver::default());
        let coords = array![[0.0, 0.0]];
        assert!(matches!(
            processor.process(&[&p], coords.view(), 0),
            Err(DislocError::InvalidPatch { field: "depth", .. })
        ));
    }

    #[test]
    fn segment_nu_must_follow_its_path() {
        let mut p = path();
        p.segment_mut(0).unwrap().patch.nu = 0.3;
        let processor = DislocProcessor::with_solver(RecordingSolver::default());
        let coords = array![[0.0, 0.0]];
        match processor.process(&[&p], coords.view(), 0) {
            Err(DislocError::MixedMaterial {
                expected,
                got,
                source,
            }) => {
                assert_eq!(expected, p.nu());
                assert_eq!(got, 0.3);
                assert_eq!(source, 0);
            }
            other => panic!("expected MixedMaterial, got {:?}", other),
        }

        let p = p.with_nu(0.3).unwrap();
        assert!(processor.process(&[&p], coords.view(), 0).is_ok());
    }

    #[test]
    fn okada_solver_reports_profile() {
        let a = patch(0.0);
        let coords = array![[0.0, 0.0], [500.0, 500.0], [-2000.0, 100.0]];
        let result = process(&[&a], coords.view(), 2).unwrap();
        let profile = &result.processor_profile;
        assert_eq!(profile.get("sources"), Some(&1.0));
        assert_eq!(profile.get("points"), Some(&3.0));
        assert_eq!(profile.get("threads"), Some(&2.0));
        assert!(profile.contains_key("elapsed_s"));
        assert!(result.down.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn okada_solver_rejects_non_finite_nu() {
        let sources = Array2::<f64>::zeros((1, SOURCE_VECTOR_LEN));
        let coords = array![[0.0, 0.0]];
        let mut profile = ProcessorProfile::new();
        let result = OkadaSolver.disloc(sources.view(), coords.view(), f64::NAN, 1, &mut profile);
        assert!(matches!(result, Err(DislocError::InvalidMaterial(_))));
    }

    #[test]
    fn okada_solver_handles_no_points() {
        let a = patch(0.0);
        let coords = Array2::<f64>::zeros((0, 2));
        let result = process(&[&a], coords.view(), 1).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn line_of_sight_projection() {
        let result = DisplacementResult {
            north: array![1.0, 0.0],
            east: array![0.0, 2.0],
            down: array![-3.0, 1.0],
            processor_profile: ProcessorProfile::new(),
        };
        // Looking straight down the vertical: LOS equals up.
        let los = result.line_of_sight(0.0, 0.0);
        assert!((los[0] - 3.0).abs() < 1e-12);
        assert!((los[1] + 1.0).abs() < 1e-12);

        // Horizontal look toward east.
        let los = result.line_of_sight(std::f64::consts::FRAC_PI_2, 0.0);
        assert!(los[0].abs() < 1e-12);
        assert!((los[1] - 2.0).abs() < 1e-12);

        assert_eq!(result.up().to_vec(), vec![3.0, -1.0]);
    }
}
