//! Bridge configuration.
//!
//! Settings come from defaults, a JSON document, or `CAPBRIDGE_*`
//! environment variables. Only logging is configurable; the bridge itself
//! has no tunables.

use anyhow::Context;
use capbridge_core::BridgeError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const ENV_LOG_FILTER: &str = "CAPBRIDGE_LOG_FILTER";
pub const ENV_LOG_DIR: &str = "CAPBRIDGE_LOG_DIR";
pub const ENV_LOG_PREFIX: &str = "CAPBRIDGE_LOG_PREFIX";
pub const ENV_TRACE_INVOCATIONS: &str = "CAPBRIDGE_TRACE_INVOCATIONS";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BridgeConfig {
    /// `EnvFilter` directives. `RUST_LOG` still takes precedence.
    pub log_filter: String,
    /// Directory for rolling log files. Console only when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<PathBuf>,
    pub log_prefix: String,
    /// Log every host invocation and translation at trace level.
    pub trace_invocations: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        BridgeConfig {
            log_filter: "capbridge=debug,warn".to_string(),
            log_dir: None,
            log_prefix: "capbridge".to_string(),
            trace_invocations: false,
        }
    }
}

impl BridgeConfig {
    pub fn from_env() -> Result<Self, BridgeError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each variable.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, BridgeError> {
        let mut config = BridgeConfig::default();
        if let Some(filter) = lookup(ENV_LOG_FILTER) {
            config.log_filter = filter;
        }
        if let Some(dir) = lookup(ENV_LOG_DIR) {
            config.log_dir = Some(PathBuf::from(dir));
        }
        if let Some(prefix) = lookup(ENV_LOG_PREFIX) {
            config.log_prefix = prefix;
        }
        if let Some(flag) = lookup(ENV_TRACE_INVOCATIONS) {
            config.trace_invocations = parse_flag(&flag).ok_or_else(|| {
                BridgeError::Config(format!("{} must be a boolean, got {:?}", ENV_TRACE_INVOCATIONS, flag))
            })?;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn from_json(json: &str) -> Result<Self, BridgeError> {
        let config: BridgeConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_json(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn validate(&self) -> Result<(), BridgeError> {
        if self.log_prefix.trim().is_empty() {
            return Err(BridgeError::Config("log_prefix must not be empty".to_string()));
        }
        Ok(())
    }

    /// The filter directives actually installed.
    pub fn effective_filter(&self) -> String {
        if self.trace_invocations {
            format!("{},capbridge_core=trace", self.log_filter)
        } else {
            self.log_filter.clone()
        }
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = BridgeConfig::default();
        assert_eq!(config.log_filter, "capbridge=debug,warn");
        assert!(config.log_dir.is_none());
        assert!(!config.trace_invocations);
        assert_eq!(config.effective_filter(), "capbridge=debug,warn");
    }

    #[test]
    fn test_env_overrides() {
        let config = BridgeConfig::from_lookup(lookup(&[
            (ENV_LOG_FILTER, "info"),
            (ENV_LOG_DIR, "/var/log/capbridge"),
            (ENV_TRACE_INVOCATIONS, "yes"),
        ]))
        .unwrap();

        assert_eq!(config.log_dir, Some(PathBuf::from("/var/log/capbridge")));
        assert_eq!(config.log_prefix, "capbridge");
        assert_eq!(config.effective_filter(), "info,capbridge_core=trace");
    }

    #[test]
    fn test_bad_flag_rejected() {
        let err = BridgeConfig::from_lookup(lookup(&[(ENV_TRACE_INVOCATIONS, "maybe")])).unwrap_err();
        assert!(matches!(err, BridgeError::Config(_)));
    }

    #[test]
    fn test_from_json_partial() {
        let config = BridgeConfig::from_json(r#"{"log_prefix": "worker"}"#).unwrap();
        assert_eq!(config.log_prefix, "worker");
        assert_eq!(config.log_filter, BridgeConfig::default().log_filter);

        assert!(BridgeConfig::from_json(r#"{"log_prefix": " "}"#).is_err());
        assert!(BridgeConfig::from_json("not json").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bridge.json");
        fs::write(&path, r#"{"trace_invocations": true}"#).unwrap();

        let config = BridgeConfig::load(&path).unwrap();
        assert!(config.trace_invocations);

        let missing = BridgeConfig::load(dir.path().join("absent.json")).unwrap_err();
        assert!(missing.to_string().contains("Failed to read config file"));
    }
}
