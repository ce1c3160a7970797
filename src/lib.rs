//! Voice Gate - confirmation gate for cloud-agent voice assistants
//!
//! Sits between a device's speech pipeline and the cloud agent:
//! - Decodes the agent's structured reply
//! - Holds risky commands until the user says yes
//! - Hands each confirmed command to the execution layer exactly once
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                   Event sources                      │
//! │      stdin (NDJSON)  │  HTTP /v1/events  │  /v1/wake │
//! └────────────────────┬────────────────────────────────┘
//!                      │ ordered mpsc
//! ┌────────────────────▼────────────────────────────────┐
//! │                  Event loop                          │
//! │   Router  →  Intent parser  →  Confirmation gate     │
//! └────────────────────┬────────────────────────────────┘
//!                      │ confirmed command (moved)
//! ┌────────────────────▼────────────────────────────────┐
//! │                 Dispatch sink                        │
//! │          Cloud bridge  │  Log (dry run)              │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod config;
pub mod daemon;
pub mod dispatch;
pub mod error;
pub mod gate;
pub mod intent;
pub mod router;
pub mod telemetry;
pub mod voice;

pub use config::Config;
pub use daemon::{Daemon, EventLoop, EventSender};
pub use dispatch::{BridgeSink, DispatchError, DispatchSink, LogSink};
pub use error::{Error, Result};
pub use gate::{ConversationState, Gate, GateSnapshot, GateStep, PendingCommand};
pub use intent::{IntentReply, ParseError};
pub use router::{DispatchOutcome, EventOutcome, Router, SpeechEvent, WireEvent};
