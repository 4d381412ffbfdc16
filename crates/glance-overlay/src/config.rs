//! Overlay configuration.

use serde::Deserialize;

/// Tunables for the overlay pipeline. All fields default to the values the
/// interaction model was designed around; deserializing an empty TOML table
/// yields [`OverlayConfig::default`].
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct OverlayConfig {
    /// Lower zoom bound.
    pub min_scale: f64,
    /// Upper zoom bound.
    pub max_scale: f64,
    /// Zoom step applied by toolbar buttons and modifier-wheel input.
    pub scale_step: f64,
    /// Frame delay before a watcher-triggered rescan; mutation batches
    /// arriving within this window coalesce into a single rescan.
    pub rescan_delay_ms: u64,
    /// Minimum text length before the content heuristic is consulted.
    pub min_heuristic_len: usize,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            min_scale: 0.2,
            max_scale: 3.0,
            scale_step: 0.2,
            rescan_delay_ms: 16,
            min_heuristic_len: 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = OverlayConfig::default();
        assert_eq!(config.min_scale, 0.2);
        assert_eq!(config.max_scale, 3.0);
        assert_eq!(config.scale_step, 0.2);
        assert_eq!(config.rescan_delay_ms, 16);
        assert_eq!(config.min_heuristic_len, 5);
    }

    #[test]
    fn test_empty_toml_matches_defaults() {
        let config: OverlayConfig = toml::from_str("").unwrap();
        assert_eq!(config, OverlayConfig::default());
    }

    #[test]
    fn test_partial_toml_overrides() {
        let config: OverlayConfig = toml::from_str("max_scale = 5.0\nrescan_delay_ms = 50").unwrap();
        assert_eq!(config.max_scale, 5.0);
        assert_eq!(config.rescan_delay_ms, 50);
        assert_eq!(config.min_scale, 0.2);
    }
}
