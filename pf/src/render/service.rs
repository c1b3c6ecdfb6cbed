//! Diagram rendering server access

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::debug;

use super::RenderError;
use crate::config::RendererConfig;

/// Longest body excerpt kept in a Malformed error
const EXCERPT_LEN: usize = 80;

/// A server that turns an encoded token into SVG markup
#[async_trait]
pub trait DiagramService: Send + Sync {
    /// Fetch the vector rendering of `token`
    async fn fetch_svg(&self, token: &str) -> Result<String, RenderError>;
}

/// Check that a response body is SVG markup
pub fn check_svg(body: &str) -> Result<(), RenderError> {
    let head = body.trim_start();
    if head.starts_with("<?xml") || head.starts_with("<svg") {
        return Ok(());
    }
    let excerpt: String = head.chars().take(EXCERPT_LEN).collect();
    Err(RenderError::Malformed(excerpt))
}

/// PlantUML-compatible rendering server
pub struct PlantUmlServer {
    base_url: String,
    http: Client,
}

impl PlantUmlServer {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, RenderError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn from_config(config: &RendererConfig) -> Result<Self, RenderError> {
        debug!(base_url = %config.base_url, "PlantUmlServer::from_config: called");
        Self::new(config.base_url.clone(), Duration::from_millis(config.request_timeout_ms))
    }

    /// URL of the SVG rendering for a deflate-encoded token
    pub fn svg_url(&self, token: &str) -> String {
        format!("{}/svg/~1{}", self.base_url, token)
    }
}

#[async_trait]
impl DiagramService for PlantUmlServer {
    async fn fetch_svg(&self, token: &str) -> Result<String, RenderError> {
        let url = self.svg_url(token);
        debug!(%url, "PlantUmlServer::fetch_svg: called");

        let response = self.http.get(&url).send().await?;
        let status = response.status();
        if status != StatusCode::OK {
            debug!(%status, "PlantUmlServer::fetch_svg: non-200 status");
            return Err(RenderError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        check_svg(&body)?;
        debug!(body_len = body.len(), "PlantUmlServer::fetch_svg: svg received");
        Ok(body)
    }
}
