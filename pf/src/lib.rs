//! Procflow - Conversational Business-Process Diagram Generator
//!
//! Procflow turns plain-language descriptions of business processes into
//! rendered activity diagrams. Each caller session owns one assistant
//! conversation, so later requests can refine earlier diagrams. Sessions
//! that go quiet get their diagrams mailed to the caller before they are
//! torn down.
//!
//! # Modules
//!
//! - [`assistant`] - Assistant client trait, OpenAI implementation and gateway
//! - [`validation`] - Reply acceptance and cleanup of diagram source
//! - [`encoding`] - Deflate + custom base64 tokens for the rendering server
//! - [`render`] - SVG fetch and PNG rasterization
//! - [`pipeline`] - One request with bounded retry
//! - [`session`] - Session registry and inactivity monitor
//! - [`report`] - Report compilation and mail dispatch
//! - [`orchestrator`] - Public operations and the housekeeper
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod assistant;
pub mod cli;
pub mod config;
pub mod encoding;
pub mod orchestrator;
pub mod pipeline;
pub mod prompts;
pub mod render;
pub mod report;
pub mod retry;
pub mod session;
pub mod validation;

// Re-export commonly used types
pub use assistant::{
    AssistantClient, AssistantError, AssistantGateway, ConversationHandle, OpenAIAssistantClient, create_client,
};
pub use config::Config;
pub use orchestrator::Orchestrator;
pub use pipeline::{AttemptFailure, GeneratedDiagram, GenerationError, GenerationPipeline, Stage};
pub use render::{PlantUmlServer, Rasterizer, RenderError, Renderer};
pub use report::{Report, ReportError, Reporter, SmtpDispatcher};
pub use retry::RetryPolicy;
pub use session::{Contact, InactivityMonitor, Session, SessionInfo, SessionRegistry, Turn};
pub use validation::{RejectReason, Validator};
