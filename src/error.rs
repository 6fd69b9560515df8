//! Error types for map loading and geometry preprocessing.
//!
//! Steady-state queries never fail; these only surface while a map is built
//! or read from disk.

use thiserror::Error;

/// Faults in source meshes handed to the preprocessor.
#[derive(Debug, Error)]
pub enum GeometryError {
    #[error("mesh {mesh:?}: index {index} out of range for {vertex_count} vertices")]
    IndexOutOfRange {
        mesh: String,
        index: u32,
        vertex_count: usize,
    },
    #[error("mesh {mesh:?}: index buffer length {len} is not a multiple of 3")]
    RaggedIndices { mesh: String, len: usize },
    #[error("mesh {mesh:?}: vertex {vertex} is not finite")]
    NonFiniteVertex { mesh: String, vertex: usize },
}

/// Faults in the persisted map format.
#[derive(Debug, Error)]
pub enum MapError {
    #[cfg(feature = "json")]
    #[error("malformed map json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("node at depth {depth} has {found} children, expected 8")]
    ChildCount { depth: u32, found: usize },
    #[error("node at depth {depth} has non-positive size {size}")]
    InvalidNodeSize { depth: u32, size: f64 },
    #[error("object {name:?} has a negative size component")]
    InvalidObjectSize { name: Option<String> },
}
