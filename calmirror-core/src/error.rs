//! Error types for the calmirror ecosystem.

use thiserror::Error;

/// Errors that can occur in calmirror operations.
#[derive(Error, Debug)]
pub enum CalMirrorError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Calendar not found: {0}")]
    CalendarNotFound(String),

    #[error("ICS parse error: {0}")]
    IcsParse(String),

    #[error("ICS generation error: {0}")]
    IcsGenerate(String),

    #[error("Mapping store error: {0}")]
    Store(String),

    #[error("Sync error: {0}")]
    Sync(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type alias for calmirror operations.
pub type CalMirrorResult<T> = Result<T, CalMirrorError>;
