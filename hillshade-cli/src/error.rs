//! Centralized CLI error handling.

use thiserror::Error;

/// User-facing CLI errors.
#[derive(Debug, Error)]
pub enum CliError {
    /// Invalid arguments or configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// The requested tile could not be rendered
    #[error("render failed: {0}")]
    Render(String),

    /// Failure writing output
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
