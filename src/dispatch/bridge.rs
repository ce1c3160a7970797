//! Cloud bridge dispatch
//!
//! Queues confirmed commands on the bridge's `POST /api/execute` endpoint.
//! The bridge answers immediately with a command id; execution and result
//! collection happen on the bridge side.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use url::Url;

use super::{DispatchError, DispatchSink};
use crate::config::DispatchConfig;
use crate::gate::PendingCommand;
use crate::{Error, Result};

/// Path of the execute endpoint, relative to the bridge base URL
const EXECUTE_PATH: &str = "api/execute";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExecuteRequest<'a> {
    user_id: &'a str,
    api_key: &'a str,
    command: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExecuteResponse {
    #[serde(default)]
    success: bool,
    command_id: Option<String>,
    status: Option<String>,
    error: Option<String>,
}

/// Sink that queues commands on the cloud bridge
pub struct BridgeSink {
    client: reqwest::Client,
    execute_url: Url,
    user_id: String,
    api_key: Option<SecretString>,
}

impl BridgeSink {
    /// Create a bridge sink
    ///
    /// # Errors
    ///
    /// Returns error if the execute URL cannot be derived or the HTTP client
    /// cannot be built
    pub fn new(
        base_url: &Url,
        user_id: impl Into<String>,
        api_key: Option<SecretString>,
        request_timeout: Duration,
    ) -> Result<Self> {
        let execute_url = execute_url(base_url)?;
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;

        if api_key.is_none() {
            tracing::warn!(url = %execute_url, "bridge API key not set, requests may be refused");
        }

        Ok(Self {
            client,
            execute_url,
            user_id: user_id.into(),
            api_key,
        })
    }

    /// Create a bridge sink from dispatch configuration
    ///
    /// # Errors
    ///
    /// Returns error if no bridge URL is configured
    pub fn from_config(config: &DispatchConfig) -> Result<Self> {
        let base_url = config
            .bridge_url
            .as_ref()
            .ok_or_else(|| Error::Config("bridge dispatch requires a bridge URL".to_string()))?;

        let api_key = config
            .api_key
            .as_ref()
            .map(|k| SecretString::from(k.expose_secret().to_string()));

        Self::new(base_url, config.user_id.clone(), api_key, config.request_timeout)
    }

    /// Endpoint commands are posted to
    #[must_use]
    pub const fn execute_url(&self) -> &Url {
        &self.execute_url
    }
}

#[async_trait]
impl DispatchSink for BridgeSink {
    async fn dispatch(&self, command: PendingCommand) -> std::result::Result<(), DispatchError> {
        let request = ExecuteRequest {
            user_id: &self.user_id,
            api_key: self.api_key.as_ref().map_or("", ExposeSecret::expose_secret),
            command: &command.command_payload,
        };

        let response = self
            .client
            .post(self.execute_url.clone())
            .json(&request)
            .send()
            .await
            .map_err(|e| DispatchError::Unreachable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DispatchError::Rejected(format!("bridge returned {status}: {body}")));
        }

        let body: ExecuteResponse = response
            .json()
            .await
            .map_err(|e| DispatchError::Rejected(format!("invalid bridge response: {e}")))?;

        if !body.success {
            return Err(DispatchError::Rejected(
                body.error
                    .unwrap_or_else(|| "bridge did not accept the command".to_string()),
            ));
        }

        tracing::info!(
            intent = %command.intent,
            command_id = body.command_id.as_deref().unwrap_or("-"),
            status = body.status.as_deref().unwrap_or("-"),
            "command queued on bridge"
        );

        Ok(())
    }

    fn name(&self) -> &'static str {
        "bridge"
    }
}

/// Join the execute path onto a base URL, keeping any path prefix
fn execute_url(base: &Url) -> Result<Url> {
    let mut base = base.clone();
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    Ok(base.join(EXECUTE_PATH)?)
}
