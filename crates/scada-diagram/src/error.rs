//! Diagram error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DiagramError {
    /// Writing an exported frame failed.
    #[error("Export failed: {0}")]
    Export(#[from] std::io::Error),
}

pub type DiagramResult<T> = Result<T, DiagramError>;
