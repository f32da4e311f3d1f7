//! Errors raised while allocating and refining height grids.

use thiserror::Error;

/// Errors that can occur during terrain synthesis.
#[derive(Debug, Error)]
pub enum TerrainError {
    /// Grid side is not of the form `2^k + 1`
    #[error("invalid grid size {size}: side must be 2^k + 1 (2, 3, 5, 9, ...)")]
    InvalidSize { size: usize },

    /// Row lengths disagree, or a target grid has the wrong side
    #[error("dimension mismatch at row {row}: expected {expected}, found {found}")]
    DimensionMismatch {
        expected: usize,
        found: usize,
        row: usize,
    },

    /// A stencil found no in-bounds neighbours to average
    #[error("no in-bounds neighbours for cell ({x}, {y})")]
    DegenerateNeighborhood { x: usize, y: usize },

    /// A refinement or generator parameter is out of range
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    /// A cell was left unwritten or overflowed during a pass
    #[error("cell ({x}, {y}) is not finite after refinement")]
    NonFiniteCell { x: usize, y: usize },

    /// Configuration text could not be parsed
    #[error("configuration error: {0}")]
    Config(#[from] serde_json::Error),
}

impl TerrainError {
    pub(crate) fn invalid_parameter(name: &'static str, reason: impl Into<String>) -> Self {
        TerrainError::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, TerrainError>;
