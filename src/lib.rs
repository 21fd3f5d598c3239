// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

//! Rectangular dislocation fault models and their surface displacement.
//!
//! A fault is described either as a single [`FaultPatch`] or as a
//! [`FaultPath`], a chain of patches laid along a polyline of surface nodes
//! whose geometry follows the nodes as they are edited. Any number of such
//! sources can be stacked and evaluated at a set of surface points with
//! [`DislocProcessor`], which computes north, east and down displacement in
//! an elastic half-space using the closed-form solution of Okada (1985),
//! spread over a rayon thread pool.

#![warn(missing_docs)]

/// Fault patches, the source trait and observation grids.
pub mod core;
/// Error types for the library.
pub mod error;
/// Model, coordinate and result files.
pub mod io;
/// Okada (1985) surface displacement kernels.
pub mod kernels;
/// Fault paths built from surface nodes.
pub mod path;
/// Forward-model pipeline and the solver seam.
pub mod processor;

pub use crate::core::{DislocSource, FaultPatch, PathSegment};
pub use crate::error::{DislocError, Result};
pub use crate::io::{Model, Source};
pub use crate::path::{FaultPath, SegmentOverrides};
pub use crate::processor::{DislocProcessor, DislocSolver, DisplacementResult, OkadaSolver};
