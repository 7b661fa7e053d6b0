//! Per-layer configuration.

use tracing::warn;

use crate::shader::Filter;

/// Environment variable that forces GPU-context frames through CPU readback.
pub const FORCE_READBACK_VAR: &str = "CANVAS_FORCE_READBACK";
/// Environment variable selecting the default magnification filter.
pub const FILTER_VAR: &str = "CANVAS_FILTER";

/// Settings that shape how a layer imports and draws its content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayerConfig {
    /// Read GPU-context frames back through the CPU even when the compositor
    /// could open them directly.
    pub force_readback: bool,
    /// Initial magnification filter; hosts may change it per frame.
    pub filter: Filter,
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self {
            force_readback: false,
            filter: Filter::Linear,
        }
    }
}

impl LayerConfig {
    /// Defaults overridden by `CANVAS_FORCE_READBACK` and `CANVAS_FILTER`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`LayerConfig::from_env`] with a custom variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(value) = lookup(FORCE_READBACK_VAR) {
            match parse_bool(&value) {
                Some(v) => config.force_readback = v,
                None => warn!("ignoring {FORCE_READBACK_VAR}={value:?}: expected a boolean"),
            }
        }

        if let Some(value) = lookup(FILTER_VAR) {
            match value.trim().to_ascii_lowercase().as_str() {
                "nearest" | "point" => config.filter = Filter::Nearest,
                "linear" | "bilinear" => config.filter = Filter::Linear,
                _ => warn!("ignoring {FILTER_VAR}={value:?}: expected nearest or linear"),
            }
        }

        config
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn empty_environment_gives_defaults() {
        assert_eq!(LayerConfig::from_lookup(lookup(&[])), LayerConfig::default());
    }

    #[test]
    fn reads_overrides() {
        let config = LayerConfig::from_lookup(lookup(&[
            (FORCE_READBACK_VAR, "yes"),
            (FILTER_VAR, "Point"),
        ]));
        assert!(config.force_readback);
        assert_eq!(config.filter, Filter::Nearest);
    }

    #[test]
    fn malformed_values_are_ignored() {
        let config = LayerConfig::from_lookup(lookup(&[
            (FORCE_READBACK_VAR, "sometimes"),
            (FILTER_VAR, "cubic"),
        ]));
        assert_eq!(config, LayerConfig::default());
    }
}
