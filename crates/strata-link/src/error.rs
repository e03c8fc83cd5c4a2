//! Error types for link construction and configuration.

use thiserror::Error;

/// Result type alias for link operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Link construction and configuration errors.
///
/// Failures on the data path are not represented here; those travel through
/// a link as [`LinkException`](crate::event::LinkException) events. This enum
/// covers the failures that must stop setup before any data moves.
#[derive(Debug, Error)]
pub enum Error {
    /// A chunk separator must contain at least one byte.
    #[error("chunk separator must not be empty")]
    EmptySeparator,

    /// Delays must be finite and non-negative.
    #[error("invalid delay {0}: must be finite and non-negative")]
    InvalidDelay(f64),

    /// A clock start time must be finite.
    #[error("invalid clock start time {0}: must be finite")]
    InvalidClockStart(f64),
}
