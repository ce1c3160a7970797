//! Configuration management for the voice gate
//!
//! Values resolve as env > TOML file > default. The binary applies CLI flags
//! on top of the result.

pub mod file;

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;
use url::Url;

use crate::gate::{DEFAULT_AFFIRMATIVE, DEFAULT_CONFIRM_TIMEOUT, UNKNOWN_INTENT};
use crate::{Error, Result};

use file::VoiceGateConfigFile;

/// Default HTTP ingress port
pub const DEFAULT_PORT: u16 = 18_800;

/// Default bound on one dispatch call
pub const DEFAULT_DISPATCH_TIMEOUT: Duration = Duration::from_secs(5);

/// Default HTTP request timeout for the bridge and telemetry clients
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Longest accepted value for any configured timeout (one day)
pub const MAX_TIMEOUT_SECS: u64 = 86_400;

/// Turn a configured number of seconds into a timeout within `1..=MAX_TIMEOUT_SECS`
fn bounded_timeout(name: &str, secs: u64) -> Result<Duration> {
    if secs == 0 || secs > MAX_TIMEOUT_SECS {
        return Err(Error::Config(format!(
            "{name} must be between 1 and {MAX_TIMEOUT_SECS} seconds, got {secs}"
        )));
    }
    Ok(Duration::from_secs(secs))
}

/// Voice gate configuration
#[derive(Debug, Default)]
pub struct Config {
    /// Confirmation gate behavior
    pub gate: GateConfig,

    /// Execution layer hand-off
    pub dispatch: DispatchConfig,

    /// Upstream reporting
    pub telemetry: TelemetryConfig,

    /// Spoken outcome phrases
    pub prompts: PromptsConfig,

    /// HTTP event ingress
    pub server: ServerConfig,
}

/// Confirmation gate configuration
#[derive(Debug, Clone)]
pub struct GateConfig {
    /// How long a command stays armed without an answer
    pub confirm_timeout: Duration,

    /// Phrases accepted as "yes"
    pub affirmative_keywords: Vec<String>,

    /// Intent label used when the agent omits one
    pub unknown_intent: String,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            confirm_timeout: DEFAULT_CONFIRM_TIMEOUT,
            affirmative_keywords: DEFAULT_AFFIRMATIVE.iter().map(ToString::to_string).collect(),
            unknown_intent: UNKNOWN_INTENT.to_string(),
        }
    }
}

/// Where confirmed commands go
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DispatchMode {
    /// Log the command only (dry run)
    #[default]
    Log,
    /// Queue the command on the cloud bridge
    Bridge,
}

impl FromStr for DispatchMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "log" | "dry-run" => Ok(Self::Log),
            "bridge" => Ok(Self::Bridge),
            other => Err(Error::Config(format!("unknown dispatch mode: {other}"))),
        }
    }
}

impl std::fmt::Display for DispatchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Log => write!(f, "log"),
            Self::Bridge => write!(f, "bridge"),
        }
    }
}

/// Dispatch configuration
#[derive(Debug)]
pub struct DispatchConfig {
    /// Sink selection
    pub mode: DispatchMode,

    /// Cloud bridge base URL
    pub bridge_url: Option<Url>,

    /// User the bridge queues commands for
    pub user_id: String,

    /// Bridge API key
    pub api_key: Option<SecretString>,

    /// HTTP request timeout
    pub request_timeout: Duration,

    /// Upper bound the gate waits on one dispatch
    pub dispatch_timeout: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            mode: DispatchMode::Log,
            bridge_url: None,
            user_id: "voice_gate".to_string(),
            api_key: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            dispatch_timeout: DEFAULT_DISPATCH_TIMEOUT,
        }
    }
}

/// Telemetry configuration
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Report endpoint; reports are only logged when unset
    pub endpoint: Option<Url>,

    /// Device identifier attached to reports
    pub device_id: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            device_id: "voice-gate".to_string(),
        }
    }
}

/// Spoken outcome phrases; an empty phrase is not spoken
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptsConfig {
    /// After a successful dispatch
    pub dispatched: String,

    /// After a failed dispatch
    pub dispatch_failed: String,

    /// After the user declined
    pub cancelled: String,

    /// After the confirmation window elapsed
    pub expired: String,
}

impl Default for PromptsConfig {
    fn default() -> Self {
        Self {
            dispatched: "Done.".to_string(),
            dispatch_failed: "Sorry, I couldn't do that.".to_string(),
            cancelled: "Okay, cancelled.".to_string(),
            expired: String::new(),
        }
    }
}

/// HTTP ingress configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Serve the event ingress API
    pub enabled: bool,

    /// Port to listen on
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: DEFAULT_PORT,
        }
    }
}

impl Config {
    /// Load configuration from the standard config file and environment
    ///
    /// # Errors
    ///
    /// Returns error if a value is invalid (bad URL, out-of-range timeout, unknown mode)
    pub fn load() -> Result<Self> {
        Self::resolve(file::load_config_file(), |key| std::env::var(key).ok())
    }

    /// Load configuration from an explicit config file and environment
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed, or a value is invalid
    pub fn load_from(path: &Path) -> Result<Self> {
        let fc = file::load_config_path(path)?;
        tracing::info!(path = %path.display(), "loaded config file");
        Self::resolve(fc, |key| std::env::var(key).ok())
    }

    /// Merge a parsed config file with environment lookups
    ///
    /// # Errors
    ///
    /// Returns error if a value is invalid (bad URL, out-of-range timeout, unknown mode)
    pub fn resolve<F>(fc: VoiceGateConfigFile, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env_secs = |key: &str| -> Result<Option<u64>> {
            env(key)
                .map(|v| {
                    v.trim()
                        .parse::<u64>()
                        .map_err(|e| Error::Config(format!("{key}: {e}")))
                })
                .transpose()
        };

        // Gate (env > toml > default)
        let defaults = GateConfig::default();
        let confirm_timeout_secs = env_secs("VOICE_GATE_CONFIRM_TIMEOUT_SECS")?
            .or(fc.gate.confirm_timeout_secs);
        let confirm_timeout = match confirm_timeout_secs {
            Some(secs) => bounded_timeout("confirm timeout", secs)?,
            None => defaults.confirm_timeout,
        };
        let affirmative_keywords = env("VOICE_GATE_AFFIRMATIVE")
            .map(|v| v.split(',').map(|k| k.trim().to_string()).collect::<Vec<_>>())
            .or(fc.gate.affirmative_keywords)
            .filter(|k| k.iter().any(|w| !w.trim().is_empty()))
            .unwrap_or(defaults.affirmative_keywords);
        let gate = GateConfig {
            confirm_timeout,
            affirmative_keywords,
            unknown_intent: fc.gate.unknown_intent.unwrap_or(defaults.unknown_intent),
        };

        // Dispatch (env > toml > default)
        let bridge_url = env("VOICE_GATE_BRIDGE_URL")
            .or(fc.dispatch.bridge_url)
            .map(|u| Url::parse(&u))
            .transpose()?;
        let mode = match env("VOICE_GATE_DISPATCH_MODE").or(fc.dispatch.mode) {
            Some(m) => m.parse()?,
            None if bridge_url.is_some() => DispatchMode::Bridge,
            None => DispatchMode::Log,
        };
        if mode == DispatchMode::Bridge && bridge_url.is_none() {
            return Err(Error::Config(
                "bridge dispatch requires VOICE_GATE_BRIDGE_URL or dispatch.bridge_url".to_string(),
            ));
        }
        let dispatch_defaults = DispatchConfig::default();
        let request_timeout = match fc.dispatch.request_timeout_secs {
            Some(secs) => bounded_timeout("request timeout", secs)?,
            None => dispatch_defaults.request_timeout,
        };
        let dispatch_timeout = match env_secs("VOICE_GATE_DISPATCH_TIMEOUT_SECS")?
            .or(fc.dispatch.dispatch_timeout_secs)
        {
            Some(secs) => bounded_timeout("dispatch timeout", secs)?,
            None => dispatch_defaults.dispatch_timeout,
        };
        let dispatch = DispatchConfig {
            mode,
            bridge_url,
            user_id: env("VOICE_GATE_BRIDGE_USER_ID")
                .or(fc.dispatch.user_id)
                .unwrap_or(dispatch_defaults.user_id),
            api_key: env("VOICE_GATE_BRIDGE_API_KEY")
                .or(fc.dispatch.api_key)
                .map(SecretString::from),
            request_timeout,
            dispatch_timeout,
        };

        // Telemetry (env > toml > default)
        let telemetry = TelemetryConfig {
            endpoint: env("VOICE_GATE_TELEMETRY_URL")
                .or(fc.telemetry.endpoint)
                .map(|u| Url::parse(&u))
                .transpose()?,
            device_id: env("VOICE_GATE_DEVICE_ID")
                .or(fc.telemetry.device_id)
                .unwrap_or_else(|| TelemetryConfig::default().device_id),
        };

        // Prompts (toml > default)
        let prompt_defaults = PromptsConfig::default();
        let prompts = PromptsConfig {
            dispatched: fc.prompts.dispatched.unwrap_or(prompt_defaults.dispatched),
            dispatch_failed: fc
                .prompts
                .dispatch_failed
                .unwrap_or(prompt_defaults.dispatch_failed),
            cancelled: fc.prompts.cancelled.unwrap_or(prompt_defaults.cancelled),
            expired: fc.prompts.expired.unwrap_or(prompt_defaults.expired),
        };

        // Server (env > toml > default)
        let port = match env("VOICE_GATE_PORT") {
            Some(p) => Some(
                p.trim()
                    .parse::<u16>()
                    .map_err(|e| Error::Config(format!("VOICE_GATE_PORT: {e}")))?,
            ),
            None => fc.server.port,
        };
        let server = ServerConfig {
            enabled: fc.server.enabled.unwrap_or(true),
            port: port.unwrap_or(DEFAULT_PORT),
        };

        tracing::debug!(
            confirm_timeout_secs = gate.confirm_timeout.as_secs(),
            dispatch_mode = %dispatch.mode,
            telemetry = telemetry.endpoint.is_some(),
            "configuration resolved"
        );

        Ok(Self {
            gate,
            dispatch,
            telemetry,
            prompts,
            server,
        })
    }
}
