//! Embedded prompts
//!
//! These are compiled into the binary from .pmt files at build time.

use tracing::debug;

/// Activity diagram instruction wrapped around every user turn
pub const DIAGRAM: &str = include_str!("../../prompts/diagram.pmt");

/// Get the embedded prompt by name
pub fn get_embedded(name: &str) -> Option<&'static str> {
    debug!(%name, "get_embedded: called");
    match name {
        "diagram" => {
            debug!("get_embedded: matched diagram");
            Some(DIAGRAM)
        }
        _ => {
            debug!("get_embedded: no match found");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_embedded_diagram() {
        let diagram = get_embedded("diagram").unwrap();
        assert!(diagram.contains("PlantUML"));
        assert!(diagram.contains("{{input}}"));
    }

    #[test]
    fn test_get_embedded_unknown() {
        assert!(get_embedded("nonexistent").is_none());
    }
}
