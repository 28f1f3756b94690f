//! Error types for the gesture pointer library.

use thiserror::Error;

/// Main error type for the library
#[derive(Error, Debug)]
pub enum Error {
    /// File I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid input parameters provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Landmark set too small or malformed
    #[error("Landmark error: {0}")]
    Landmark(String),

    /// Canonical face model loading or validation error
    #[error("Model validation error: {0}")]
    ModelValidation(String),

    /// Pose solver failed or produced a non-finite result
    #[error("Pose estimation error: {0}")]
    Pose(String),

    /// Signal lookup or threshold error
    #[error("Signal error: {0}")]
    Signal(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Action profile parsing or binding error
    #[error("Profile error: {0}")]
    Profile(String),
}

/// Convenience type alias for Results with our Error type
pub type Result<T> = std::result::Result<T, Error>;
