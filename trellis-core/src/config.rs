//! Runtime Configuration
//!
//! Limits and switches read by the runtime. Every field has a default, so a
//! partial JSON document only overrides what it names.

use serde::{Deserialize, Serialize};

use crate::error::ReconcileError;

/// Configuration for a [`Runtime`](crate::Runtime).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Consecutive passes of one root within a single flush before the
    /// runtime reports an update loop.
    pub looping_update_limit: usize,

    /// Re-invocations of one component body caused by state set during its
    /// own render.
    pub nested_render_limit: usize,

    /// Install the devtools hook passed to
    /// [`Runtime::install_devtools_hook`](crate::Runtime::install_devtools_hook).
    pub devtools: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            looping_update_limit: 50,
            nested_render_limit: 50,
            devtools: false,
        }
    }
}

impl RuntimeConfig {
    /// Parse a configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self, ReconcileError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_limits() {
        let config = RuntimeConfig::default();
        assert_eq!(config.looping_update_limit, 50);
        assert_eq!(config.nested_render_limit, 50);
        assert!(!config.devtools);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = RuntimeConfig::from_json(r#"{ "devtools": true }"#).unwrap();
        assert!(config.devtools);
        assert_eq!(config.looping_update_limit, 50);
    }

    #[test]
    fn malformed_json_is_a_config_error() {
        let err = RuntimeConfig::from_json("{ nope").unwrap_err();
        assert!(matches!(err, ReconcileError::Config(_)));
    }

    #[test]
    fn json_round_trips() {
        let config = RuntimeConfig {
            looping_update_limit: 10,
            ..RuntimeConfig::default()
        };
        assert_eq!(RuntimeConfig::from_json(&config.to_json()).unwrap(), config);
    }
}
