//! Renderer error types

use thiserror::Error;

/// Errors from fetching or rasterizing a diagram
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Rendering server returned status {0}")]
    Status(u16),

    #[error("Rendering server returned a body that is not SVG: {0}")]
    Malformed(String),

    #[error("Rasterization failed: {0}")]
    Raster(String),
}

impl RenderError {
    /// The server answered, but not with a vector image
    pub fn is_malformed(&self) -> bool {
        matches!(self, RenderError::Malformed(_))
    }
}
