//! Shared test utilities

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use voice_gate::config::{GateConfig, PromptsConfig};
use voice_gate::router::TranscriptForwarder;
use voice_gate::telemetry::Reporter;
use voice_gate::voice::{Alert, Speaker};
use voice_gate::{DispatchError, DispatchSink, Gate, PendingCommand, Router, SpeechEvent};

/// Reply that arms a door-lock command
pub const LOCK_DOOR: &str = r#"{"intent":"home","needs_confirmation":true,"command":"lock_door","tts_confirm":"Lock the door?"}"#;

/// Reply that needs no confirmation
pub const CHAT_ONLY: &str = r#"{"needs_confirmation":false}"#;

/// Dispatch bound used by the test harness
pub const DISPATCH_TIMEOUT: Duration = Duration::from_secs(5);

/// Agent reply event from a JSON body
pub fn reply(body: &str) -> SpeechEvent {
    SpeechEvent::AgentReplyChunk(body.as_bytes().to_vec())
}

/// Final transcript event
pub fn said(text: &str) -> SpeechEvent {
    SpeechEvent::FinalTranscript(text.to_string())
}

enum SinkBehavior {
    Accept,
    Fail(DispatchError),
    Hang,
}

/// Sink that records every command it receives
pub struct RecordingSink {
    calls: Mutex<Vec<PendingCommand>>,
    behavior: SinkBehavior,
}

impl RecordingSink {
    fn with_behavior(behavior: SinkBehavior) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            behavior,
        })
    }

    pub fn accepting() -> Arc<Self> {
        Self::with_behavior(SinkBehavior::Accept)
    }

    pub fn failing(error: DispatchError) -> Arc<Self> {
        Self::with_behavior(SinkBehavior::Fail(error))
    }

    /// Never completes a dispatch
    pub fn hanging() -> Arc<Self> {
        Self::with_behavior(SinkBehavior::Hang)
    }

    pub fn calls(&self) -> Vec<PendingCommand> {
        self.calls.lock().unwrap().clone()
    }

    pub fn payloads(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.command_payload).collect()
    }
}

#[async_trait]
impl DispatchSink for RecordingSink {
    async fn dispatch(&self, command: PendingCommand) -> Result<(), DispatchError> {
        self.calls.lock().unwrap().push(command);
        match &self.behavior {
            SinkBehavior::Accept => Ok(()),
            SinkBehavior::Fail(e) => Err(e.clone()),
            SinkBehavior::Hang => std::future::pending().await,
        }
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

/// Speaker that records what it was asked to play
#[derive(Default)]
pub struct RecordingSpeaker {
    spoken: Mutex<Vec<String>>,
    alerts: Mutex<Vec<Alert>>,
}

impl RecordingSpeaker {
    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().unwrap().clone()
    }

    pub fn alerts(&self) -> Vec<Alert> {
        self.alerts.lock().unwrap().clone()
    }
}

impl Speaker for RecordingSpeaker {
    fn speak(&self, text: &str) {
        self.spoken.lock().unwrap().push(text.to_string());
    }

    fn play_alert(&self, alert: Alert) {
        self.alerts.lock().unwrap().push(alert);
    }
}

/// Reporter that records key/value pairs
#[derive(Default)]
pub struct RecordingReporter {
    reports: Mutex<Vec<(String, String)>>,
}

impl RecordingReporter {
    pub fn reports(&self) -> Vec<(String, String)> {
        self.reports.lock().unwrap().clone()
    }

    /// Values reported under one key
    pub fn values(&self, key: &str) -> Vec<String> {
        self.reports()
            .into_iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v)
            .collect()
    }
}

impl Reporter for RecordingReporter {
    fn report(&self, key: &str, value: &str) {
        self.reports
            .lock()
            .unwrap()
            .push((key.to_string(), value.to_string()));
    }
}

/// Forwarder that records transcripts sent to the agent
#[derive(Default)]
pub struct RecordingForwarder {
    forwarded: Mutex<Vec<String>>,
}

impl RecordingForwarder {
    pub fn forwarded(&self) -> Vec<String> {
        self.forwarded.lock().unwrap().clone()
    }
}

impl TranscriptForwarder for RecordingForwarder {
    fn forward(&self, transcript: &str) {
        self.forwarded.lock().unwrap().push(transcript.to_string());
    }
}

/// Router wired to recording fakes
pub struct Harness {
    pub router: Router,
    pub sink: Arc<RecordingSink>,
    pub speaker: Arc<RecordingSpeaker>,
    pub reporter: Arc<RecordingReporter>,
    pub forwarder: Arc<RecordingForwarder>,
}

impl Harness {
    pub fn new(sink: Arc<RecordingSink>) -> Self {
        Self::with_gate_config(sink, &GateConfig::default())
    }

    pub fn with_gate_config(sink: Arc<RecordingSink>, gate_config: &GateConfig) -> Self {
        let speaker = Arc::new(RecordingSpeaker::default());
        let reporter = Arc::new(RecordingReporter::default());
        let forwarder = Arc::new(RecordingForwarder::default());

        let router = Router::new(Gate::new(gate_config), sink.clone())
            .with_speaker(speaker.clone())
            .with_reporter(reporter.clone())
            .with_forwarder(forwarder.clone())
            .with_dispatch_timeout(DISPATCH_TIMEOUT)
            .with_prompts(PromptsConfig::default());

        Self {
            router,
            sink,
            speaker,
            reporter,
            forwarder,
        }
    }

    /// Feed events in order
    pub async fn feed(&mut self, events: Vec<SpeechEvent>) {
        for event in events {
            self.router.on_event(event).await;
        }
    }
}
