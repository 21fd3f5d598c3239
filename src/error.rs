// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use std::fmt;

/// Errors that can occur while building fault models, running the forward
/// model, or reading and writing model files.
#[derive(Debug)]
pub enum DislocError {
    /// Two nodes of a path coincide, so the segment between them has no
    /// length and no defined strike.
    DegenerateSegment {
        /// The first node (easting, northing).
        from: [f64; 2],
        /// The second node (easting, northing).
        to: [f64; 2],
    },
    /// Node index is outside the range accepted by a path edit.
    NodeIndexOutOfRange {
        /// The index provided.
        pos: usize,
        /// The number of nodes in the path.
        len: usize,
    },
    /// Segment index does not address an existing segment.
    SegmentIndexOutOfRange {
        /// The index provided.
        index: usize,
        /// The number of segments in the path.
        len: usize,
    },
    /// Stored segments do not match the stored nodes.
    SegmentCountMismatch {
        /// Segments required by the node list (nodes - 1).
        expected: usize,
        /// Segments supplied.
        got: usize,
    },
    /// A patch attribute is outside its valid range.
    InvalidPatch {
        /// The offending attribute.
        field: &'static str,
        /// The value provided.
        value: f64,
        /// The accepted range.
        reason: &'static str,
    },
    /// The forward model was asked to run without any enabled segment.
    NoEnabledSegments,
    /// Sources in one forward-model call carry different material constants.
    MixedMaterial {
        /// The material constant of the first contributing source.
        expected: f64,
        /// The conflicting value.
        got: f64,
        /// Index of the conflicting source.
        source: usize,
    },
    /// The material constant is not usable by the solver.
    InvalidMaterial(f64),
    /// Observation grid parameters are invalid.
    InvalidGrid(String),
    /// Array shape does not match expected shape.
    ShapeMismatch {
        /// The expected shape.
        expected: Vec<usize>,
        /// The actual shape encountered.
        got: Vec<usize>,
    },
    /// The half-space solver failed.
    Solver(String),
    /// Unsupported file format (unrecognized extension).
    UnsupportedFileFormat(String),
    /// A model or coordinate file could not be parsed.
    Parse {
        /// What was being parsed.
        context: String,
        /// Parser message.
        message: String,
    },
    /// I/O error occurred.
    IoError(std::io::Error),
    /// Other error with a descriptive message.
    Other(String),
}

impl fmt::Display for DislocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DislocError::DegenerateSegment { from, to } => {
                write!(
                    f,
                    "degenerate segment: nodes {:?} and {:?} coincide (zero length)",
                    from, to
                )
            }
            DislocError::NodeIndexOutOfRange { pos, len } => {
                write!(
                    f,
                    "node index {} out of range for path with {} nodes",
                    pos, len
                )
            }
            DislocError::SegmentIndexOutOfRange { index, len } => {
                write!(
                    f,
                    "segment index {} out of range for path with {} segments",
                    index, len
                )
            }
            DislocError::SegmentCountMismatch { expected, got } => {
                write!(
                    f,
                    "segment count mismatch: nodes require {} segments, got {}",
                    expected, got
                )
            }
            DislocError::InvalidPatch {
                field,
                value,
                reason,
            } => {
                write!(f, "invalid patch {}: {} ({})", field, value, reason)
            }
            DislocError::NoEnabledSegments => {
                write!(f, "no enabled fault segments to model")
            }
            DislocError::MixedMaterial {
                expected,
                got,
                source,
            } => {
                write!(
                    f,
                    "mixed material constants: source {} has nu={} but batch uses nu={}",
                    source, got, expected
                )
            }
            DislocError::InvalidMaterial(nu) => {
                write!(f, "invalid material constant nu={} (must be finite)", nu)
            }
            DislocError::InvalidGrid(msg) => write!(f, "invalid observation grid: {}", msg),
            DislocError::ShapeMismatch { expected, got } => {
                write!(f, "shape mismatch: expected {:?}, got {:?}", expected, got)
            }
            DislocError::Solver(msg) => write!(f, "solver error: {}", msg),
            DislocError::UnsupportedFileFormat(ext) => {
                write!(f, "unsupported file format: {}", ext)
            }
            DislocError::Parse { context, message } => {
                write!(f, "failed to parse {}: {}", context, message)
            }
            DislocError::IoError(e) => write!(f, "I/O error: {}", e),
            DislocError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for DislocError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DislocError::IoError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for DislocError {
    fn from(e: std::io::Error) -> Self {
        DislocError::IoError(e)
    }
}

/// Convenience type alias for Results with DislocError.
pub type Result<T> = std::result::Result<T, DislocError>;
