//! Daemon - the main gate service
//!
//! One [`EventLoop`] task owns the router and consumes events in order.
//! Producers (stdin, HTTP ingress) only hold an [`EventSender`].

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;

use crate::api::{ApiServer, ApiState};
use crate::dispatch::build_sink;
use crate::gate::{Gate, GateSnapshot};
use crate::router::{Router, SpeechEvent, parse_event_line};
use crate::telemetry::build_reporter;
use crate::voice::{Alert, LogSpeaker, Speaker};
use crate::{Config, Error, Result};

/// Events buffered ahead of the consumer
pub const EVENT_QUEUE_DEPTH: usize = 64;

/// Cloneable handle for submitting events
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::Sender<SpeechEvent>,
}

impl EventSender {
    /// Queue an event behind those already submitted
    ///
    /// # Errors
    ///
    /// Returns error if the event loop has stopped
    pub async fn send(&self, event: SpeechEvent) -> Result<()> {
        self.tx
            .send(event)
            .await
            .map_err(|_| Error::Channel("event loop stopped".to_string()))
    }
}

/// Create an ordered event channel
#[must_use]
pub fn channel(depth: usize) -> (EventSender, mpsc::Receiver<SpeechEvent>) {
    let (tx, rx) = mpsc::channel(depth);
    (EventSender { tx }, rx)
}

/// Single consumer driving the router
pub struct EventLoop {
    router: Router,
    rx: mpsc::Receiver<SpeechEvent>,
}

impl EventLoop {
    #[must_use]
    pub const fn new(router: Router, rx: mpsc::Receiver<SpeechEvent>) -> Self {
        Self { router, rx }
    }

    /// Watch gate snapshots
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<GateSnapshot> {
        self.router.subscribe()
    }

    /// Process events until every sender is dropped
    ///
    /// Returns the router so callers can inspect its final state.
    pub async fn run(mut self) -> Router {
        loop {
            let deadline = self.router.deadline();

            tokio::select! {
                event = self.rx.recv() => {
                    let Some(event) = event else {
                        break;
                    };
                    let kind = event.kind();
                    let outcome = self.router.on_event(event).await;
                    tracing::debug!(event = kind, %outcome, "event handled");
                }
                () = sleep_until(deadline) => {
                    let outcome = self.router.on_timeout().await;
                    tracing::debug!(%outcome, "confirmation timer fired");
                }
            }
        }

        tracing::debug!("event loop stopped");
        self.router
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// The voice gate daemon
pub struct Daemon {
    config: Config,
    speaker: Arc<dyn Speaker>,
}

impl Daemon {
    /// Create a new daemon instance
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            config,
            speaker: Arc::new(LogSpeaker),
        }
    }

    /// Assemble the router from configuration
    ///
    /// # Errors
    ///
    /// Returns error if the dispatch sink or reporter cannot be built
    pub fn build_router(&self) -> Result<Router> {
        let sink = build_sink(&self.config.dispatch)?;
        let reporter =
            build_reporter(&self.config.telemetry, self.config.dispatch.request_timeout)?;

        tracing::info!(
            sink = sink.name(),
            confirm_timeout_secs = self.config.gate.confirm_timeout.as_secs(),
            dispatch_timeout_secs = self.config.dispatch.dispatch_timeout.as_secs(),
            "router ready"
        );

        Ok(Router::new(Gate::new(&self.config.gate), sink)
            .with_speaker(Arc::clone(&self.speaker))
            .with_reporter(reporter)
            .with_dispatch_timeout(self.config.dispatch.dispatch_timeout)
            .with_prompts(self.config.prompts.clone()))
    }

    /// Run the daemon until interrupted
    ///
    /// Events are read as newline-delimited JSON from stdin and, when the
    /// server is enabled, from the HTTP API. Without the server the daemon
    /// exits once stdin closes and queued events are handled.
    ///
    /// # Errors
    ///
    /// Returns error if startup fails
    pub async fn run(self) -> Result<()> {
        let router = self.build_router()?;
        let (events, rx) = channel(EVENT_QUEUE_DEPTH);
        let event_loop = EventLoop::new(router, rx);
        let snapshots = event_loop.subscribe();
        let loop_handle = tokio::spawn(event_loop.run());

        self.speaker.play_alert(Alert::PowerOn);

        if self.config.server.enabled {
            let server = ApiServer::new(
                ApiState {
                    events: events.clone(),
                    snapshots,
                },
                self.config.server.port,
            );
            drop(server.spawn());
        }

        let stdin_task = tokio::spawn(read_stdin(events.clone()));
        drop(events);

        tracing::info!(
            server = self.config.server.enabled,
            port = self.config.server.port,
            "daemon running"
        );

        if self.config.server.enabled {
            tokio::signal::ctrl_c().await?;
            tracing::info!("shutdown requested");
        } else {
            tokio::select! {
                result = tokio::signal::ctrl_c() => {
                    result?;
                    tracing::info!("shutdown requested");
                }
                _ = stdin_task => {
                    tracing::info!("stdin closed, draining events");
                    if let Ok(router) = loop_handle.await {
                        tracing::info!(state = %router.state(), "daemon stopped");
                    }
                }
            }
        }

        Ok(())
    }
}

/// Forward newline-delimited JSON events from stdin
async fn read_stdin(events: EventSender) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(error = %e, "stdin read failed");
                break;
            }
        };

        match parse_event_line(&line) {
            Ok(Some(event)) => {
                if events.send(event).await.is_err() {
                    break;
                }
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, line, "ignoring invalid event"),
        }
    }
}
