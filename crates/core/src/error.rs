//! Error types for the page renderer.
//!
//! Rejected and dropped render requests are not errors: they surface as
//! [`RequestId::REJECTED`](crate::RequestId::REJECTED) or as a missing
//! completion event. This type only covers construction, configuration and
//! the optional encoding / backend helpers.

use thiserror::Error;

/// Main error type for the page renderer library.
#[derive(Error, Debug)]
pub enum RendererError {
    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration could not be parsed.
    #[error("Failed to parse configuration: {0}")]
    ConfigParse(#[from] serde_json::Error),

    /// The background render thread could not be started.
    #[error("Failed to start render worker thread: {0}")]
    WorkerSpawn(#[from] std::io::Error),

    /// PNG encoding failed.
    #[error("PNG encoding failed: {0}")]
    PngEncoding(String),

    /// Pdfium library error.
    #[error("Pdfium error: {0}")]
    Pdfium(String),
}

/// Result type alias for convenience.
pub type Result<T> = std::result::Result<T, RendererError>;
