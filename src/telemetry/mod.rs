//! Upstream reporting of conversation outcomes
//!
//! Reporting is best-effort: errors are logged and never reach the gate.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use url::Url;

use crate::config::TelemetryConfig;
use crate::{Error, Result};

/// Intent label of the latest agent reply
pub const KEY_INTENT: &str = "intent";

/// Payload of a dispatched command
pub const KEY_EXEC_COMMAND: &str = "exec_command";

/// Outcome of a dispatched command
pub const KEY_EXEC_RESULT: &str = "exec_result";

/// Key/value reporter
pub trait Reporter: Send + Sync {
    /// Report one value; must not block
    fn report(&self, key: &str, value: &str);
}

/// Reporter that only logs
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReporter;

impl Reporter for LogReporter {
    fn report(&self, key: &str, value: &str) {
        tracing::info!(key, value, "telemetry");
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Report {
    device_id: String,
    key: String,
    value: String,
    timestamp: String,
}

/// Reporter that POSTs each value as JSON
#[derive(Debug, Clone)]
pub struct HttpReporter {
    client: reqwest::Client,
    endpoint: Url,
    device_id: String,
}

impl HttpReporter {
    /// Create an HTTP reporter
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn new(endpoint: Url, device_id: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint,
            device_id: device_id.into(),
        })
    }

    async fn send(&self, report: &Report) -> Result<()> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(report)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Telemetry(format!("endpoint returned {status}")));
        }
        Ok(())
    }
}

impl Reporter for HttpReporter {
    fn report(&self, key: &str, value: &str) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(key, "no runtime, telemetry dropped");
            return;
        };

        let report = Report {
            device_id: self.device_id.clone(),
            key: key.to_string(),
            value: value.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };
        let reporter = self.clone();

        drop(handle.spawn(async move {
            if let Err(e) = reporter.send(&report).await {
                tracing::warn!(key = %report.key, error = %e, "failed to report telemetry");
            } else {
                tracing::debug!(key = %report.key, "reported telemetry");
            }
        }));
    }
}

/// Build the reporter selected by configuration
///
/// # Errors
///
/// Returns error if the HTTP reporter cannot be constructed
pub fn build_reporter(config: &TelemetryConfig, timeout: Duration) -> Result<Arc<dyn Reporter>> {
    match &config.endpoint {
        Some(endpoint) => Ok(Arc::new(HttpReporter::new(
            endpoint.clone(),
            config.device_id.clone(),
            timeout,
        )?)),
        None => Ok(Arc::new(LogReporter)),
    }
}

#[cfg(test)]
mod tests {
    use axum::{Router, http::StatusCode, routing::post};

    use super::*;

    #[test]
    fn test_report_shape() {
        let report = Report {
            device_id: "dev-1".to_string(),
            key: KEY_EXEC_RESULT.to_string(),
            value: "ok".to_string(),
            timestamp: "2026-01-01T00:00:00+00:00".to_string(),
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["deviceId"], "dev-1");
        assert_eq!(json["key"], "exec_result");
        assert_eq!(json["timestamp"], "2026-01-01T00:00:00+00:00");
    }

    /// Serve `POST /report` answering with a fixed status
    async fn spawn_endpoint(status: StatusCode) -> Url {
        let app = Router::new().route("/report", post(move || async move { status }));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Url::parse(&format!("http://{addr}/report")).unwrap()
    }

    fn report() -> Report {
        Report {
            device_id: "dev-1".to_string(),
            key: KEY_EXEC_RESULT.to_string(),
            value: "ok".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    #[tokio::test]
    async fn test_send_accepts_success_status() {
        let url = spawn_endpoint(StatusCode::OK).await;
        let reporter = HttpReporter::new(url, "dev-1", Duration::from_secs(5)).unwrap();
        reporter.send(&report()).await.unwrap();
    }

    #[tokio::test]
    async fn test_send_rejects_error_status() {
        let url = spawn_endpoint(StatusCode::SERVICE_UNAVAILABLE).await;
        let reporter = HttpReporter::new(url, "dev-1", Duration::from_secs(5)).unwrap();

        let err = reporter.send(&report()).await.unwrap_err();
        assert!(matches!(&err, Error::Telemetry(msg) if msg.contains("503")), "{err}");
    }

    #[test]
    fn test_report_outside_runtime_does_not_panic() {
        let reporter = HttpReporter::new(
            "http://127.0.0.1:9/report".parse().unwrap(),
            "dev-1",
            Duration::from_secs(1),
        )
        .unwrap();
        reporter.report(KEY_INTENT, "home");
    }
}
