//! TOML configuration file loading
//!
//! Supports `~/.config/voice-gate/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::Result;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct VoiceGateConfigFile {
    /// Confirmation gate behavior
    #[serde(default)]
    pub gate: GateFileConfig,

    /// Execution layer hand-off
    #[serde(default)]
    pub dispatch: DispatchFileConfig,

    /// Upstream reporting
    #[serde(default)]
    pub telemetry: TelemetryFileConfig,

    /// Spoken outcome phrases
    #[serde(default)]
    pub prompts: PromptsFileConfig,

    /// HTTP event ingress
    #[serde(default)]
    pub server: ServerFileConfig,
}

/// Confirmation gate configuration
#[derive(Debug, Default, Deserialize)]
pub struct GateFileConfig {
    /// Seconds a command stays armed without an answer
    pub confirm_timeout_secs: Option<u64>,

    /// Phrases accepted as "yes"
    pub affirmative_keywords: Option<Vec<String>>,

    /// Intent label used when the agent omits one
    pub unknown_intent: Option<String>,
}

/// Dispatch configuration
#[derive(Debug, Default, Deserialize)]
pub struct DispatchFileConfig {
    /// "log" or "bridge"
    pub mode: Option<String>,

    /// Cloud bridge base URL (e.g. `https://bridge.example.com`)
    pub bridge_url: Option<String>,

    /// User the bridge queues commands for
    pub user_id: Option<String>,

    /// Bridge API key
    pub api_key: Option<String>,

    /// HTTP request timeout in seconds
    pub request_timeout_secs: Option<u64>,

    /// Upper bound the gate waits on one dispatch, in seconds
    pub dispatch_timeout_secs: Option<u64>,
}

/// Telemetry configuration
#[derive(Debug, Default, Deserialize)]
pub struct TelemetryFileConfig {
    /// Report endpoint; reports are only logged when unset
    pub endpoint: Option<String>,

    /// Device identifier attached to reports
    pub device_id: Option<String>,
}

/// Spoken phrases; an empty string keeps the device silent
#[derive(Debug, Default, Deserialize)]
pub struct PromptsFileConfig {
    pub dispatched: Option<String>,
    pub dispatch_failed: Option<String>,
    pub cancelled: Option<String>,
    pub expired: Option<String>,
}

/// Server configuration
#[derive(Debug, Default, Deserialize)]
pub struct ServerFileConfig {
    /// Enable HTTP event ingress
    pub enabled: Option<bool>,

    /// Port to listen on
    pub port: Option<u16>,
}

/// Load the TOML config file from the standard path
///
/// Returns `VoiceGateConfigFile::default()` if the file doesn't exist or can't be parsed.
#[must_use]
pub fn load_config_file() -> VoiceGateConfigFile {
    let Some(path) = config_file_path() else {
        return VoiceGateConfigFile::default();
    };

    if !path.exists() {
        return VoiceGateConfigFile::default();
    }

    match load_config_path(&path) {
        Ok(config) => {
            tracing::info!(path = %path.display(), "loaded config file");
            config
        }
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to load config file, using defaults"
            );
            VoiceGateConfigFile::default()
        }
    }
}

/// Load a config file from an explicit path
///
/// # Errors
///
/// Returns error if the file cannot be read or is not valid TOML
pub fn load_config_path(path: &Path) -> Result<VoiceGateConfigFile> {
    let content = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Return the config file path: `~/.config/voice-gate/config.toml`
#[must_use]
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("voice-gate").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file() {
        let config: VoiceGateConfigFile = toml::from_str(
            r#"
            [gate]
            confirm_timeout_secs = 12
            affirmative_keywords = ["yes", "sure"]

            [dispatch]
            mode = "bridge"
            bridge_url = "https://bridge.example.com"
            "#,
        )
        .unwrap();

        assert_eq!(config.gate.confirm_timeout_secs, Some(12));
        assert_eq!(
            config.gate.affirmative_keywords.as_deref(),
            Some(&["yes".to_string(), "sure".to_string()][..])
        );
        assert_eq!(config.dispatch.mode.as_deref(), Some("bridge"));
        assert!(config.telemetry.endpoint.is_none());
        assert!(config.server.port.is_none());
    }

    #[test]
    fn test_empty_file() {
        let config: VoiceGateConfigFile = toml::from_str("").unwrap();
        assert!(config.gate.confirm_timeout_secs.is_none());
        assert!(config.prompts.dispatched.is_none());
    }

    #[test]
    fn test_load_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[server]\nport = 9000\n").unwrap();

        let config = load_config_path(&path).unwrap();
        assert_eq!(config.server.port, Some(9000));
    }

    #[test]
    fn test_load_invalid_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[server\nport = ").unwrap();

        assert!(matches!(load_config_path(&path), Err(crate::Error::Toml(_))));
    }
}
