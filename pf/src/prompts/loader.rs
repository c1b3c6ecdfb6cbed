//! Prompt Loader
//!
//! Loads prompt templates from an override directory or falls back to embedded defaults.

use std::path::PathBuf;

use eyre::{Result, eyre};
use handlebars::Handlebars;
use serde::Serialize;
use tracing::debug;

use super::embedded;

/// Variables available to the diagram template
#[derive(Debug, Clone, Serialize)]
pub struct DiagramPromptContext {
    /// Free text the user typed for this turn
    pub input: String,
}

impl DiagramPromptContext {
    pub fn new(input: impl Into<String>) -> Self {
        Self { input: input.into() }
    }
}

/// Loads and renders prompt templates
pub struct PromptLoader {
    /// Handlebars template engine
    hbs: Handlebars<'static>,
    /// Operator override directory
    override_dir: Option<PathBuf>,
}

impl PromptLoader {
    /// Create a loader that checks `override_dir` before the embedded prompts
    pub fn new(override_dir: Option<PathBuf>) -> Self {
        debug!(?override_dir, "PromptLoader::new: called");
        let override_dir = override_dir.filter(|dir| {
            let exists = dir.exists();
            if !exists {
                debug!(?dir, "PromptLoader::new: override directory missing, ignoring");
            }
            exists
        });

        Self {
            hbs: Self::engine(),
            override_dir,
        }
    }

    /// Create a loader that only uses embedded prompts
    pub fn embedded_only() -> Self {
        debug!("PromptLoader::embedded_only: called");
        Self {
            hbs: Self::engine(),
            override_dir: None,
        }
    }

    fn engine() -> Handlebars<'static> {
        let mut hbs = Handlebars::new();
        // Prompts are plain text; HTML escaping would mangle quotes and arrows
        hbs.register_escape_fn(handlebars::no_escape);
        hbs
    }

    /// Load a template by name
    fn load_template(&self, name: &str) -> Result<String> {
        debug!(%name, "PromptLoader::load_template: called");
        if let Some(ref dir) = self.override_dir {
            let path = dir.join(format!("{}.pmt", name));
            if path.exists() {
                debug!(?path, "PromptLoader::load_template: found in override directory");
                return std::fs::read_to_string(&path)
                    .map_err(|e| eyre!("Failed to read prompt {}: {}", path.display(), e));
            }
            debug!(?path, "PromptLoader::load_template: not found in override directory");
        }

        if let Some(content) = embedded::get_embedded(name) {
            debug!(%name, "PromptLoader::load_template: found in embedded");
            return Ok(content.to_string());
        }

        Err(eyre!("Prompt template not found: {}", name))
    }

    /// Render the diagram instruction for one user turn
    pub fn diagram_prompt(&self, context: &DiagramPromptContext) -> Result<String> {
        debug!(input_len = context.input.len(), "PromptLoader::diagram_prompt: called");
        let template = self.load_template("diagram")?;
        self.hbs
            .render_template(&template, context)
            .map_err(|e| eyre!("Failed to render template diagram: {}", e))
    }
}

impl Default for PromptLoader {
    fn default() -> Self {
        Self::embedded_only()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_diagram_prompt_embeds_input_verbatim() {
        let loader = PromptLoader::embedded_only();
        let prompt = loader
            .diagram_prompt(&DiagramPromptContext::new("order -> \"approval\" & <shipping>"))
            .unwrap();

        assert!(prompt.contains("order -> \"approval\" & <shipping>"));
        assert!(prompt.contains("@startuml"));
        assert!(!prompt.contains("{{input}}"));
    }

    #[test]
    fn test_override_directory_wins() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("diagram.pmt"), "CUSTOM: {{input}}").unwrap();

        let loader = PromptLoader::new(Some(dir.path().to_path_buf()));
        let prompt = loader.diagram_prompt(&DiagramPromptContext::new("invoice")).unwrap();
        assert_eq!(prompt, "CUSTOM: invoice");
    }

    #[test]
    fn test_missing_override_directory_falls_back() {
        let loader = PromptLoader::new(Some(PathBuf::from("/nonexistent/procflow/prompts")));
        let prompt = loader.diagram_prompt(&DiagramPromptContext::new("invoice")).unwrap();
        assert!(prompt.contains("PlantUML"));
    }
}
