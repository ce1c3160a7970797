//! Speech event routing
//!
//! The [`Router`] owns the [`Gate`] and performs the side effects each gate
//! transition asks for: forwarding transcripts, speaking prompts, dispatching
//! confirmed commands and reporting telemetry. It is driven by one consumer,
//! so events reach the gate in arrival order.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::time::Instant;

use crate::Result;
use crate::config::{DEFAULT_DISPATCH_TIMEOUT, PromptsConfig};
use crate::dispatch::{DispatchError, DispatchSink};
use crate::gate::{ConversationState, Gate, GateSnapshot, GateStep, PendingCommand};
use crate::intent::{self, ParseError};
use crate::telemetry::{KEY_EXEC_COMMAND, KEY_EXEC_RESULT, KEY_INTENT, LogReporter, Reporter};
use crate::voice::{Alert, LogSpeaker, Speaker};

/// Event from the speech pipeline or the agent link
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechEvent {
    /// Wake word or button press
    Wakeup,
    /// Interim recognition result
    PartialTranscript(String),
    /// Final recognition result for one utterance
    FinalTranscript(String),
    /// One complete agent reply body
    AgentReplyChunk(Vec<u8>),
    /// Agent finished replying
    AgentReplyFinished,
    /// Drop any pending command and go idle
    Reset,
}

impl SpeechEvent {
    /// Short name for logs
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Wakeup => "wakeup",
            Self::PartialTranscript(_) => "partial_transcript",
            Self::FinalTranscript(_) => "final_transcript",
            Self::AgentReplyChunk(_) => "agent_reply_chunk",
            Self::AgentReplyFinished => "agent_reply_finished",
            Self::Reset => "reset",
        }
    }
}

/// JSON form of a [`SpeechEvent`], as accepted on stdin and over HTTP
///
/// `agent_reply_chunk.data` may be the reply as a string or as an inline
/// JSON value.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WireEvent {
    Wakeup,
    PartialTranscript { text: String },
    FinalTranscript { text: String },
    AgentReplyChunk { data: serde_json::Value },
    AgentReplyFinished,
    Reset,
}

impl From<WireEvent> for SpeechEvent {
    fn from(event: WireEvent) -> Self {
        match event {
            WireEvent::Wakeup => Self::Wakeup,
            WireEvent::PartialTranscript { text } => Self::PartialTranscript(text),
            WireEvent::FinalTranscript { text } => Self::FinalTranscript(text),
            WireEvent::AgentReplyChunk { data } => {
                let raw = match data {
                    serde_json::Value::String(s) => s.into_bytes(),
                    other => other.to_string().into_bytes(),
                };
                Self::AgentReplyChunk(raw)
            }
            WireEvent::AgentReplyFinished => Self::AgentReplyFinished,
            WireEvent::Reset => Self::Reset,
        }
    }
}

/// Parse one line of newline-delimited JSON events
///
/// Blank lines and `#` comments yield `None`.
///
/// # Errors
///
/// Returns error if the line is not a valid event
pub fn parse_event_line(line: &str) -> Result<Option<SpeechEvent>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let event: WireEvent = serde_json::from_str(line)?;
    Ok(Some(event.into()))
}

/// Uplink carrying the user's words to the cloud agent
pub trait TranscriptForwarder: Send + Sync {
    /// Send one final transcript; must not block
    fn forward(&self, transcript: &str);
}

/// Forwarder that only logs
#[derive(Debug, Default, Clone, Copy)]
pub struct LogForwarder;

impl TranscriptForwarder for LogForwarder {
    fn forward(&self, transcript: &str) {
        tracing::info!(transcript, "forward to agent");
    }
}

/// Result of handing one confirmed command to the sink
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchOutcome {
    /// Intent of the dispatched command
    pub intent: String,

    /// Payload handed to the sink
    pub payload: String,

    /// What the sink reported
    pub result: std::result::Result<(), DispatchError>,
}

/// What handling one event did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventOutcome {
    /// Conversation state after the event
    pub state: ConversationState,

    /// Transcript forwarded to the agent
    pub forwarded: Option<String>,

    /// Pending command dropped without running
    pub discarded: Option<PendingCommand>,

    /// Why an agent reply was dropped
    pub reply_error: Option<ParseError>,

    /// Dispatch performed while handling the event
    pub dispatch: Option<DispatchOutcome>,
}

impl EventOutcome {
    const fn new(state: ConversationState) -> Self {
        Self {
            state,
            forwarded: None,
            discarded: None,
            reply_error: None,
            dispatch: None,
        }
    }
}

impl fmt::Display for EventOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "state={}", self.state)?;
        if let Some(text) = &self.forwarded {
            write!(f, " forwarded={text:?}")?;
        }
        if let Some(cmd) = &self.discarded {
            write!(f, " discarded={}", cmd.intent)?;
        }
        if let Some(e) = &self.reply_error {
            write!(f, " reply_error=\"{e}\"")?;
        }
        if let Some(d) = &self.dispatch {
            write!(f, " dispatched={:?}", d.payload)?;
            match &d.result {
                Ok(()) => write!(f, " result=ok")?,
                Err(e) => write!(f, " result=\"{e}\"")?,
            }
        }
        Ok(())
    }
}

/// Drives the gate and runs its side effects
pub struct Router {
    gate: Gate,
    sink: Arc<dyn DispatchSink>,
    speaker: Arc<dyn Speaker>,
    reporter: Arc<dyn Reporter>,
    forwarder: Arc<dyn TranscriptForwarder>,
    dispatch_timeout: Duration,
    prompts: PromptsConfig,
    snapshots: watch::Sender<GateSnapshot>,
}

impl Router {
    /// Create a router with logging speaker, reporter and forwarder
    #[must_use]
    pub fn new(gate: Gate, sink: Arc<dyn DispatchSink>) -> Self {
        let (snapshots, _) = watch::channel(gate.snapshot(Instant::now()));
        Self {
            gate,
            sink,
            speaker: Arc::new(LogSpeaker),
            reporter: Arc::new(LogReporter),
            forwarder: Arc::new(LogForwarder),
            dispatch_timeout: DEFAULT_DISPATCH_TIMEOUT,
            prompts: PromptsConfig::default(),
            snapshots,
        }
    }

    /// Use this speaker for prompts and alerts
    #[must_use]
    pub fn with_speaker(mut self, speaker: Arc<dyn Speaker>) -> Self {
        self.speaker = speaker;
        self
    }

    /// Use this reporter for telemetry
    #[must_use]
    pub fn with_reporter(mut self, reporter: Arc<dyn Reporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Use this uplink for final transcripts
    #[must_use]
    pub fn with_forwarder(mut self, forwarder: Arc<dyn TranscriptForwarder>) -> Self {
        self.forwarder = forwarder;
        self
    }

    /// Bound each dispatch call
    #[must_use]
    pub const fn with_dispatch_timeout(mut self, timeout: Duration) -> Self {
        self.dispatch_timeout = timeout;
        self
    }

    /// Use these outcome phrases
    #[must_use]
    pub fn with_prompts(mut self, prompts: PromptsConfig) -> Self {
        self.prompts = prompts;
        self
    }

    /// Current conversation state
    #[must_use]
    pub const fn state(&self) -> ConversationState {
        self.gate.state()
    }

    /// Read-only access to the gate
    #[must_use]
    pub const fn gate(&self) -> &Gate {
        &self.gate
    }

    /// When the armed command expires, if one is armed
    #[must_use]
    pub const fn deadline(&self) -> Option<Instant> {
        self.gate.deadline()
    }

    /// Watch gate snapshots, published after every event
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<GateSnapshot> {
        self.snapshots.subscribe()
    }

    /// Handle one event
    pub async fn on_event(&mut self, event: SpeechEvent) -> EventOutcome {
        let now = Instant::now();

        let step = match event {
            SpeechEvent::Wakeup => {
                self.speaker.stop();
                self.speaker.play_alert(Alert::Wakeup);
                self.gate.on_wakeup()
            }
            SpeechEvent::PartialTranscript(text) => {
                tracing::debug!(text, "partial transcript");
                GateStep::Ignored
            }
            SpeechEvent::FinalTranscript(text) => {
                tracing::debug!(text, state = %self.gate.state(), "final transcript");
                self.gate.on_final_transcript(&text, now)
            }
            SpeechEvent::AgentReplyChunk(raw) => self.gate.on_agent_reply(intent::parse(&raw), now),
            SpeechEvent::AgentReplyFinished => self.gate.on_reply_finished(),
            SpeechEvent::Reset => self.gate.reset(),
        };

        self.apply(step).await
    }

    /// Expire the armed command once its deadline has passed
    pub async fn on_timeout(&mut self) -> EventOutcome {
        let step = self.gate.expire(Instant::now());
        self.apply(step).await
    }

    async fn apply(&mut self, step: GateStep) -> EventOutcome {
        let mut outcome = EventOutcome::new(self.gate.state());

        match step {
            GateStep::Ignored => {}
            GateStep::Listening { discarded } | GateStep::Reset { discarded } => {
                outcome.discarded = discarded;
            }
            GateStep::Forward {
                transcript,
                expired,
            } => {
                if expired.is_some() {
                    self.speak(&self.prompts.expired);
                }
                self.forwarder.forward(&transcript);
                outcome.forwarded = Some(transcript);
                outcome.discarded = expired;
            }
            GateStep::Completed { intent } => {
                if let Some(intent) = &intent {
                    self.reporter.report(KEY_INTENT, intent);
                }
            }
            GateStep::ConfirmationRequested { intent, prompt } => {
                self.reporter.report(KEY_INTENT, &intent);
                if let Some(prompt) = &prompt {
                    self.speak(prompt);
                }
            }
            GateStep::ReplyRejected(e) => {
                outcome.reply_error = Some(e);
            }
            GateStep::Confirmed => {
                outcome.dispatch = self.dispatch_confirmed().await;
            }
            GateStep::Denied { discarded } => {
                self.speak(&self.prompts.cancelled);
                outcome.discarded = Some(discarded);
            }
            GateStep::Expired { discarded } => {
                self.speak(&self.prompts.expired);
                outcome.discarded = Some(discarded);
            }
        }

        outcome.state = self.gate.state();
        self.publish();
        outcome
    }

    async fn dispatch_confirmed(&mut self) -> Option<DispatchOutcome> {
        // Observers see Executing while the sink runs
        self.publish();

        let command = self.gate.take_confirmed()?;
        let intent = command.intent.clone();
        let payload = command.command_payload.clone();

        self.reporter.report(KEY_EXEC_COMMAND, &payload);
        tracing::info!(sink = self.sink.name(), intent = %intent, "dispatching command");

        let result = tokio::time::timeout(self.dispatch_timeout, self.sink.dispatch(command))
            .await
            .unwrap_or_else(|_elapsed| Err(DispatchError::Timeout(self.dispatch_timeout)));

        match &result {
            Ok(()) => {
                self.reporter.report(KEY_EXEC_RESULT, "ok");
                self.speak(&self.prompts.dispatched);
            }
            Err(e) => {
                tracing::warn!(intent = %intent, error = %e, "dispatch failed");
                self.reporter.report(KEY_EXEC_RESULT, &format!("Error: {e}"));
                self.speak(&self.prompts.dispatch_failed);
            }
        }

        Some(DispatchOutcome {
            intent,
            payload,
            result,
        })
    }

    fn speak(&self, text: &str) {
        if !text.trim().is_empty() {
            self.speaker.speak(text);
        }
    }

    fn publish(&self) {
        let snapshot = self.gate.snapshot(Instant::now());
        self.snapshots.send_replace(snapshot);
    }
}
