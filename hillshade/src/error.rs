//! Error types for the hillshade engine.

use thiserror::Error;

/// Errors surfaced by the DEM source layer.
///
/// Most runtime failures inside the engine are absorbed rather than
/// propagated: an unreadable sample falls back to its neighbour, a failed
/// render completes as an absent tile. What remains here are the errors a
/// caller can actually act on.
#[derive(Debug, Error)]
pub enum HillshadeError {
    /// I/O error while opening or reading a DEM source
    #[error("DEM I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A DEM source exists but cannot be used (bad archive, missing entry)
    #[error("invalid DEM source {name}: {reason}")]
    InvalidSource { name: String, reason: String },
}

/// Result type alias using [`HillshadeError`].
pub type Result<T> = std::result::Result<T, HillshadeError>;
