//! MeshRefineError: unified error type for mesh-refine public APIs
//!
//! Every failure a caller can observe funnels through this enum; refinement
//! exposes no partial progress. Hot-path invariants are additionally guarded
//! by `debug_assert!`, but each condition listed here stays detectable on the
//! checked `Result` paths in release builds.

use thiserror::Error;

/// Unified error type for mesh-refine operations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MeshRefineError {
    /// Connectivity references an out-of-range vertex, a cell's vertex count
    /// does not match its template, or a size/parameter is out of range.
    #[error("invalid input: {0}")]
    InputInvalid(String),
    /// A face appeared an odd number of times in the toggled-set accounting
    /// without a matching declared boundary face.
    #[error("unmatched boundary face with sorted corners {0:?}")]
    UnmatchedBoundaryFace([u32; 4]),
    /// An (s,t) or (u,v,w) value fell outside its valid simplex; the
    /// parametric mapping for this cell is ill-posed.
    #[error("parametric coordinate out of range: {0}")]
    ParametricOutOfRange(String),
    /// The cubic edge distribution produced non-monotone positions.
    #[error("edge parametric division not monotone between verts {v0} and {v1}")]
    EdgeParamMonotonicity { v0: u32, v1: u32 },
    /// Two distinct partition-boundary faces share a sorted-global key.
    #[error("degenerate mesh: duplicate sorted-global face key {0:?}")]
    MalformedMesh([u32; 4]),
    /// An expected neighbour message was missing, malformed, or mismatched.
    #[error("partition protocol violation: {0}")]
    PartitionProtocol(String),
    /// A structural invariant failed; this is a bug, not a user error.
    #[error("internal invariant violated: {0}")]
    InternalInvariant(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages_name_the_failure() {
        let e = MeshRefineError::InputInvalid("tet 3 references vert 99 of 10".into());
        assert!(format!("{e}").contains("tet 3"));
        let e = MeshRefineError::EdgeParamMonotonicity { v0: 4, v1: 9 };
        assert!(format!("{e}").contains("4"));
        assert!(format!("{e}").contains("9"));
    }

    #[test]
    fn errors_are_comparable() {
        let a = MeshRefineError::MalformedMesh([1, 2, 3, 4]);
        let b = MeshRefineError::MalformedMesh([1, 2, 3, 4]);
        assert_eq!(a, b);
    }
}
