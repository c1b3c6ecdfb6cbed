//! Diagram rendering
//!
//! Fetches the SVG rendering of an encoded token and converts it into a PNG.
//! Nothing is cached; every call re-fetches and re-rasterizes.

use std::sync::Arc;

use tracing::debug;

mod error;
mod raster;
pub mod service;

pub use error::RenderError;
pub use raster::Rasterizer;
pub use service::{DiagramService, PlantUmlServer, check_svg};

use crate::config::RendererConfig;

/// Rendering server plus local rasterizer
#[derive(Clone)]
pub struct Renderer {
    service: Arc<dyn DiagramService>,
    rasterizer: Arc<Rasterizer>,
}

impl Renderer {
    pub fn new(service: Arc<dyn DiagramService>, rasterizer: Rasterizer) -> Self {
        Self {
            service,
            rasterizer: Arc::new(rasterizer),
        }
    }

    pub fn from_config(config: &RendererConfig) -> Result<Self, RenderError> {
        debug!("Renderer::from_config: called");
        let service = PlantUmlServer::from_config(config)?;
        Ok(Self::new(Arc::new(service), Rasterizer::new(config.dpi, config.scale)))
    }

    /// Render an encoded token to PNG bytes
    pub async fn render(&self, token: &str) -> Result<Vec<u8>, RenderError> {
        debug!(token_len = token.len(), "Renderer::render: called");
        let svg = self.service.fetch_svg(token).await?;
        self.rasterize(svg).await
    }

    /// Rasterize markup off the async worker threads
    pub async fn rasterize(&self, svg: String) -> Result<Vec<u8>, RenderError> {
        let rasterizer = self.rasterizer.clone();
        tokio::task::spawn_blocking(move || rasterizer.rasterize(&svg))
            .await
            .map_err(|e| RenderError::Raster(format!("rasterizer task failed: {}", e)))?
    }
}
