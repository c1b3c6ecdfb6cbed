//! Assistant output validation and cleanup
//!
//! Turns a raw assistant reply into diagram source the rendering server
//! accepts, or explains why the reply cannot be used.

use thiserror::Error;
use tracing::debug;

use crate::config::GenerationConfig;

pub const START_MARKER: &str = "@startuml";
pub const END_MARKER: &str = "@enduml";

/// Code fence the assistant likes to wrap its answer in
const FENCE: &str = "```plantuml";

/// Rendering directives placed right after the start marker
const DIRECTIVES: &str = "skinparam ConditionEndStyle hline\nskinparam defaultFontName Montserrat";

/// Keyword opening an annotation line
const NOTE: &str = "note";

/// Why a reply was not accepted as diagram source
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RejectReason {
    #[error("Reply is empty")]
    Empty,

    #[error("Reply is missing the {0} marker")]
    MissingMarker(&'static str),

    #[error("Reply is missing required keyword '{0}'")]
    MissingKeyword(String),
}

/// Checks and normalizes assistant replies
#[derive(Debug, Clone, Default)]
pub struct Validator {
    required_keywords: Vec<String>,
}

impl Validator {
    pub fn new(required_keywords: Vec<String>) -> Self {
        Self { required_keywords }
    }

    pub fn from_config(config: &GenerationConfig) -> Self {
        Self::new(config.required_keywords.clone())
    }

    /// Accept `raw` as diagram source, returning the cleaned text
    pub fn validate(&self, raw: &str) -> Result<String, RejectReason> {
        debug!(raw_len = raw.len(), "Validator::validate: called");
        let source = strip_fence(raw);
        if source.is_empty() {
            return Err(RejectReason::Empty);
        }

        for marker in [START_MARKER, END_MARKER] {
            if !source.contains(marker) {
                debug!(%marker, "Validator::validate: marker missing");
                return Err(RejectReason::MissingMarker(marker));
            }
        }

        let lowered = source.to_lowercase();
        if let Some(missing) = self
            .required_keywords
            .iter()
            .find(|k| !lowered.contains(&k.to_lowercase()))
        {
            debug!(keyword = %missing, "Validator::validate: keyword missing");
            return Err(RejectReason::MissingKeyword(missing.clone()));
        }

        let source = inject_directives(source);
        Ok(strip_note_parens(&source))
    }
}

fn strip_fence(raw: &str) -> &str {
    let unfenced = raw.trim_start();
    let unfenced = unfenced.strip_prefix(FENCE).unwrap_or(unfenced);
    unfenced.trim_end().trim_end_matches('`').trim()
}

fn inject_directives(source: &str) -> String {
    source.replacen(START_MARKER, &format!("{}\n{}", START_MARKER, DIRECTIVES), 1)
}

fn strip_note_parens(source: &str) -> String {
    source
        .split_inclusive('\n')
        .map(|line| {
            if is_note_line(line) {
                line.replace(['(', ')'], "")
            } else {
                line.to_string()
            }
        })
        .collect()
}

/// True for lines opening an annotation, whose parentheses get stripped
fn is_note_line(line: &str) -> bool {
    let trimmed = line.trim_start();
    let Some(head) = trimmed.get(..NOTE.len()) else {
        return false;
    };
    head.eq_ignore_ascii_case(NOTE)
        && !trimmed[NOTE.len()..]
            .chars()
            .next()
            .is_some_and(|c| c.is_alphanumeric() || c == '_')
}
