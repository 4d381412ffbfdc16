//! Engine configuration.
//!
//! Mirrors the initialize options of the upstream diagram engine. All
//! fields have defaults, so an empty TOML table (or `Default::default()`)
//! yields a working configuration.

use serde::Deserialize;

/// Options passed to [`DiagramEngine::initialize`](crate::DiagramEngine::initialize).
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineOptions {
    /// Visual theme name.
    pub theme: String,
    /// Engine security level; `loose` allows HTML labels inside diagrams.
    pub security_level: String,
    /// Flowchart-specific rendering flags.
    pub flowchart: FlowchartOptions,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            theme: "default".to_owned(),
            security_level: "loose".to_owned(),
            flowchart: FlowchartOptions::default(),
        }
    }
}

/// Flowchart rendering flags.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct FlowchartOptions {
    /// Scale the diagram to the width of its container.
    pub use_max_width: bool,
    /// Render node labels as HTML rather than plain text.
    pub html_labels: bool,
}

impl Default for FlowchartOptions {
    fn default() -> Self {
        Self {
            use_max_width: true,
            html_labels: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let options = EngineOptions::default();
        assert_eq!(options.theme, "default");
        assert_eq!(options.security_level, "loose");
        assert!(options.flowchart.use_max_width);
        assert!(options.flowchart.html_labels);
    }

    #[test]
    fn test_empty_toml_matches_defaults() {
        let options: EngineOptions = toml::from_str("").unwrap();
        assert_eq!(options, EngineOptions::default());
    }

    #[test]
    fn test_partial_toml_overrides() {
        let options: EngineOptions = toml::from_str(
            r#"
            theme = "dark"

            [flowchart]
            html_labels = false
            "#,
        )
        .unwrap();

        assert_eq!(options.theme, "dark");
        assert_eq!(options.security_level, "loose");
        assert!(options.flowchart.use_max_width);
        assert!(!options.flowchart.html_labels);
    }
}
