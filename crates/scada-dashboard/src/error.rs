//! Dashboard error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DashboardError {
    /// The multiplexer consumer has stopped; the update was not queued.
    #[error("Update queue closed")]
    QueueClosed,
}

pub type DashboardResult<T> = Result<T, DashboardError>;
