//! Hand-off of confirmed commands to the execution layer
//!
//! A sink receives each confirmed [`PendingCommand`] by value, so a command
//! can reach a sink at most once. Sinks report failure but never retry; the
//! execution layer owns delivery guarantees.

mod bridge;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub use bridge::BridgeSink;

use crate::Result;
use crate::config::{DispatchConfig, DispatchMode};
use crate::gate::PendingCommand;

/// Failure to hand a command to the execution layer
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// Execution layer could not be reached
    #[error("execution layer unreachable: {0}")]
    Unreachable(String),

    /// Execution layer refused the command
    #[error("command rejected: {0}")]
    Rejected(String),

    /// Dispatch did not finish within the allowed time
    #[error("dispatch timed out after {0:?}")]
    Timeout(Duration),
}

/// Destination for confirmed commands
#[async_trait]
pub trait DispatchSink: Send + Sync {
    /// Hand one confirmed command to the execution layer
    ///
    /// # Errors
    ///
    /// Returns `DispatchError` if the command could not be delivered; the
    /// error is terminal for that command
    async fn dispatch(&self, command: PendingCommand) -> std::result::Result<(), DispatchError>;

    /// Short name for logs
    fn name(&self) -> &'static str;
}

/// Sink that only logs commands (dry run)
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

#[async_trait]
impl DispatchSink for LogSink {
    async fn dispatch(&self, command: PendingCommand) -> std::result::Result<(), DispatchError> {
        tracing::info!(
            intent = %command.intent,
            payload = %command.command_payload,
            "dispatch (dry run)"
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

/// Build the sink selected by configuration
///
/// # Errors
///
/// Returns error if the bridge sink cannot be constructed
pub fn build_sink(config: &DispatchConfig) -> Result<Arc<dyn DispatchSink>> {
    match config.mode {
        DispatchMode::Log => Ok(Arc::new(LogSink)),
        DispatchMode::Bridge => Ok(Arc::new(BridgeSink::from_config(config)?)),
    }
}
