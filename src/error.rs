//! Error types for cotan.
//!
//! This module defines all error types used throughout the library.

use thiserror::Error;

/// Result type alias using [`MeshError`].
pub type Result<T> = std::result::Result<T, MeshError>;

/// Errors that can occur while building meshes, assembling operators or solving.
#[derive(Error, Debug)]
pub enum MeshError {
    /// The mesh has no faces (or no vertices).
    #[error("mesh has no faces")]
    EmptyMesh,

    /// A face references an invalid vertex index.
    #[error("face {face} references invalid vertex index {vertex}")]
    InvalidVertexIndex {
        /// The face index.
        face: usize,
        /// The invalid vertex index.
        vertex: usize,
    },

    /// A face has duplicate vertex indices.
    #[error("face {face} is degenerate (has duplicate vertices)")]
    DegenerateFace {
        /// The face index.
        face: usize,
    },

    /// The mesh has non-manifold topology.
    #[error("mesh has non-manifold topology: {details}")]
    NonManifold {
        /// Description of the non-manifold condition.
        details: String,
    },

    /// A directed edge is used by more than one face.
    #[error("edge ({v0}, {v1}) has more than two incident faces or inconsistent orientation")]
    NonManifoldEdge {
        /// First vertex of the edge.
        v0: usize,
        /// Second vertex of the edge.
        v1: usize,
    },

    /// A face has (near) zero area, so its cotangent weights are undefined.
    #[error("face {face} has degenerate geometry (area {area:e})")]
    DegenerateGeometry {
        /// The face index.
        face: usize,
        /// The offending area.
        area: f64,
    },

    /// The mesh has more than one connected component, so the operator has a
    /// null space of dimension greater than one.
    #[error("mesh has {components} connected components, expected 1")]
    DisconnectedMesh {
        /// Number of connected components (isolated vertices count as one each).
        components: usize,
    },

    /// The sparse factorization could not be computed.
    #[error("factorization failed: {reason}")]
    FactorizationFailed {
        /// Description of the failure.
        reason: String,
    },

    /// The factorization succeeded but the solve broke down.
    #[error("solve failed: {reason}")]
    SolveFailed {
        /// Description of the failure.
        reason: String,
    },

    /// A matrix or vector does not have the expected dimension.
    #[error("dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch {
        /// Expected dimension.
        expected: usize,
        /// Actual dimension.
        found: usize,
    },

    /// Invalid mesh state for the requested operation.
    #[error("invalid mesh state: {0}")]
    InvalidState(String),

    /// Invalid parameter value.
    #[error("invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// The invalid value (as string).
        value: String,
        /// Reason the value is invalid.
        reason: &'static str,
    },
}

impl MeshError {
    /// Create an invalid parameter error.
    pub fn invalid_param<T: std::fmt::Display>(
        name: &'static str,
        value: T,
        reason: &'static str,
    ) -> Self {
        MeshError::InvalidParameter {
            name,
            value: value.to_string(),
            reason,
        }
    }

    /// Create a factorization failure from anything printable.
    pub(crate) fn factorization<T: std::fmt::Display>(reason: T) -> Self {
        MeshError::FactorizationFailed {
            reason: reason.to_string(),
        }
    }

    /// Create a solve failure from anything printable.
    pub(crate) fn solve<T: std::fmt::Display>(reason: T) -> Self {
        MeshError::SolveFailed {
            reason: reason.to_string(),
        }
    }

    /// Whether this error came out of the linear solver stage.
    pub fn is_solver_failure(&self) -> bool {
        matches!(
            self,
            MeshError::FactorizationFailed { .. } | MeshError::SolveFailed { .. }
        )
    }
}
