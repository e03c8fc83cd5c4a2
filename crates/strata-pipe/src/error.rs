//! Error types for pipeline construction.

use thiserror::Error;

/// Result type alias for pipeline operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Pipeline construction errors.
#[derive(Debug, Error)]
pub enum Error {
    /// A pipeline needs at least one layer.
    #[error("a pipeline needs at least one layer")]
    EmptyPipeline,
}
