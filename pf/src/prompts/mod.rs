//! Prompt Template System
//!
//! Loads and renders `.pmt` (prompt template) files that wrap user input
//! before it is sent to the assistant.
//!
//! Template loading chain:
//! 1. `{prompt-dir}/{name}.pmt` (operator override, when configured)
//! 2. Embedded fallback in code
//!
//! Templates use Handlebars syntax for variable substitution.

pub mod embedded;
mod loader;

pub use loader::{DiagramPromptContext, PromptLoader};
