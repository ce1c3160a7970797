//! Confirmation gate
//!
//! Holds the phase of the single logical conversation and at most one pending
//! command. The pending command lives inside the phases that may carry it, so
//! "a command is armed" and "we are waiting for the user or executing" can
//! never disagree.
//!
//! The gate performs no I/O. Each transition returns a [`GateStep`] telling
//! the caller which side effects to run (forward a transcript, speak a prompt,
//! dispatch). A confirmed command is handed out by value through
//! [`Gate::take_confirmed`], which makes a second dispatch of the same command
//! impossible to express.

mod keywords;

use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

pub use keywords::{AffirmativeKeywords, DEFAULT_AFFIRMATIVE};

use crate::config::{GateConfig, MAX_TIMEOUT_SECS};
use crate::intent::{IntentReply, ParseError};

/// Intent label used when the reply carries none
pub const UNKNOWN_INTENT: &str = "unknown";

/// Default time a confirmation stays armed
pub const DEFAULT_CONFIRM_TIMEOUT: Duration = Duration::from_secs(30);

/// Command awaiting the user's confirmation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingCommand {
    /// Intent label from the reply, or the unknown sentinel
    pub intent: String,

    /// Opaque payload for the execution layer
    pub command_payload: String,
}

impl PendingCommand {
    /// Build a pending command from a parsed reply
    #[must_use]
    pub fn from_reply(reply: &IntentReply, unknown_intent: &str) -> Self {
        let intent = reply
            .intent
            .as_deref()
            .map(str::trim)
            .filter(|i| !i.is_empty())
            .unwrap_or(unknown_intent);

        Self {
            intent: intent.to_string(),
            command_payload: reply.command.clone().unwrap_or_default(),
        }
    }
}

/// Externally visible phase of the conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationState {
    /// Nothing in progress
    Idle,
    /// Wake detected, capturing the user's request
    Listening,
    /// Request sent, waiting for the agent's reply
    WaitingForAgent,
    /// Command armed, waiting for yes/no
    WaitingForUserConfirmation,
    /// Command confirmed, about to be dispatched
    Executing,
}

impl ConversationState {
    /// Whether a pending command must exist in this state
    #[must_use]
    pub const fn holds_command(self) -> bool {
        matches!(self, Self::WaitingForUserConfirmation | Self::Executing)
    }
}

impl std::fmt::Display for ConversationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Listening => "listening",
            Self::WaitingForAgent => "waiting_for_agent",
            Self::WaitingForUserConfirmation => "waiting_for_user_confirmation",
            Self::Executing => "executing",
        };
        f.write_str(name)
    }
}

/// Internal phase, carrying the pending command where one is allowed
#[derive(Debug)]
enum Phase {
    Idle,
    Listening,
    WaitingForAgent,
    AwaitingConfirmation {
        pending: PendingCommand,
        deadline: Instant,
    },
    Executing {
        pending: PendingCommand,
    },
}

impl Phase {
    const fn state(&self) -> ConversationState {
        match self {
            Self::Idle => ConversationState::Idle,
            Self::Listening => ConversationState::Listening,
            Self::WaitingForAgent => ConversationState::WaitingForAgent,
            Self::AwaitingConfirmation { .. } => ConversationState::WaitingForUserConfirmation,
            Self::Executing { .. } => ConversationState::Executing,
        }
    }

    /// Drop any held command and return it
    fn into_pending(self) -> Option<PendingCommand> {
        match self {
            Self::AwaitingConfirmation { pending, .. } | Self::Executing { pending } => {
                Some(pending)
            }
            Self::Idle | Self::Listening | Self::WaitingForAgent => None,
        }
    }
}

/// Side effects requested by a gate transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateStep {
    /// Event had no effect on the conversation
    Ignored,

    /// A new listening window opened
    Listening {
        /// Unanswered command abandoned by the wake
        discarded: Option<PendingCommand>,
    },

    /// Transcript should be forwarded to the agent
    Forward {
        /// Text the user said
        transcript: String,
        /// Command whose confirmation window lapsed before this transcript
        expired: Option<PendingCommand>,
    },

    /// Reply needs no confirmation; conversation is over
    Completed {
        /// Intent label, if the reply carried one
        intent: Option<String>,
    },

    /// Command armed; prompt the user
    ConfirmationRequested {
        /// Intent of the armed command
        intent: String,
        /// Prompt to speak before listening for the answer
        prompt: Option<String>,
    },

    /// Reply could not be decoded and was dropped
    ReplyRejected(ParseError),

    /// User confirmed; call [`Gate::take_confirmed`] and dispatch
    Confirmed,

    /// User said something other than yes
    Denied {
        /// Command that will not run
        discarded: PendingCommand,
    },

    /// Confirmation window elapsed
    Expired {
        /// Command that will not run
        discarded: PendingCommand,
    },

    /// Gate was reset
    Reset {
        /// Command dropped by the reset
        discarded: Option<PendingCommand>,
    },
}

/// Serializable view of the gate
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GateSnapshot {
    /// Current conversation state
    pub state: ConversationState,

    /// Intent of the armed command, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_intent: Option<String>,

    /// Milliseconds left before the armed command expires
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in_ms: Option<u64>,
}

/// Confirmation state machine
#[derive(Debug)]
pub struct Gate {
    phase: Phase,
    keywords: AffirmativeKeywords,
    confirm_timeout: Duration,
    unknown_intent: String,
}

impl Gate {
    /// Create an idle gate
    #[must_use]
    pub fn new(config: &GateConfig) -> Self {
        Self {
            phase: Phase::Idle,
            keywords: AffirmativeKeywords::new(&config.affirmative_keywords),
            confirm_timeout: config.confirm_timeout,
            unknown_intent: config.unknown_intent.clone(),
        }
    }

    /// Current conversation state
    #[must_use]
    pub const fn state(&self) -> ConversationState {
        self.phase.state()
    }

    /// The armed or executing command, if any
    #[must_use]
    pub const fn pending(&self) -> Option<&PendingCommand> {
        match &self.phase {
            Phase::AwaitingConfirmation { pending, .. } | Phase::Executing { pending } => {
                Some(pending)
            }
            Phase::Idle | Phase::Listening | Phase::WaitingForAgent => None,
        }
    }

    /// When the armed command expires
    #[must_use]
    pub const fn deadline(&self) -> Option<Instant> {
        match &self.phase {
            Phase::AwaitingConfirmation { deadline, .. } => Some(*deadline),
            _ => None,
        }
    }

    /// Configured confirmation window
    #[must_use]
    pub const fn confirm_timeout(&self) -> Duration {
        self.confirm_timeout
    }

    /// Wake word or manual trigger
    ///
    /// Always opens a new listening window. An unanswered confirmation is
    /// abandoned rather than carried into the new request.
    pub fn on_wakeup(&mut self) -> GateStep {
        let discarded = self.replace(Phase::Listening).into_pending();
        if let Some(cmd) = &discarded {
            tracing::info!(intent = %cmd.intent, "wake abandoned pending command");
        }
        GateStep::Listening { discarded }
    }

    /// Final recognized text for one utterance
    pub fn on_final_transcript(&mut self, transcript: &str, now: Instant) -> GateStep {
        let expired = self.take_if_expired(now);

        match self.state() {
            ConversationState::WaitingForUserConfirmation => {
                let Some(pending) = self.replace(Phase::Idle).into_pending() else {
                    return GateStep::Ignored;
                };

                if self.keywords.matches(transcript) {
                    tracing::info!(intent = %pending.intent, "command confirmed");
                    self.phase = Phase::Executing { pending };
                    GateStep::Confirmed
                } else {
                    tracing::info!(intent = %pending.intent, transcript, "command declined");
                    GateStep::Denied { discarded: pending }
                }
            }
            ConversationState::Executing => {
                // Dispatch is taken synchronously after Confirmed; nothing to do
                tracing::warn!(transcript, "transcript while executing, ignored");
                GateStep::Ignored
            }
            ConversationState::WaitingForAgent => {
                tracing::debug!(transcript, "new transcript before agent reply");
                GateStep::Forward {
                    transcript: transcript.to_string(),
                    expired,
                }
            }
            ConversationState::Idle | ConversationState::Listening => {
                self.phase = Phase::WaitingForAgent;
                GateStep::Forward {
                    transcript: transcript.to_string(),
                    expired,
                }
            }
        }
    }

    /// One complete agent reply, already decoded
    ///
    /// Replies arriving while a confirmation is armed are ignored; the agent
    /// also hears the user's yes/no and may answer it.
    pub fn on_agent_reply(
        &mut self,
        reply: Result<IntentReply, ParseError>,
        now: Instant,
    ) -> GateStep {
        let expired = self.take_if_expired(now);
        if let Some(cmd) = expired {
            tracing::info!(intent = %cmd.intent, "confirmation window elapsed");
        }

        if self.state().holds_command() {
            tracing::debug!("agent reply while confirmation armed, ignored");
            return GateStep::Ignored;
        }

        let reply = match reply {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(error = %e, "discarding agent reply");
                self.phase = Phase::Idle;
                return GateStep::ReplyRejected(e);
            }
        };

        if !reply.needs_confirmation {
            self.phase = Phase::Idle;
            return GateStep::Completed {
                intent: reply.intent,
            };
        }

        let pending = PendingCommand::from_reply(&reply, &self.unknown_intent);
        let intent = pending.intent.clone();
        tracing::info!(
            intent = %intent,
            timeout_secs = self.confirm_timeout.as_secs(),
            "command awaiting confirmation"
        );

        let deadline = now.checked_add(self.confirm_timeout).unwrap_or_else(|| {
            tracing::warn!("confirm timeout out of range, capping at one day");
            now + Duration::from_secs(MAX_TIMEOUT_SECS)
        });
        self.phase = Phase::AwaitingConfirmation { pending, deadline };

        GateStep::ConfirmationRequested {
            intent,
            prompt: reply.confirmation_prompt,
        }
    }

    /// End-of-reply marker; never changes state
    #[must_use]
    pub const fn on_reply_finished(&self) -> GateStep {
        GateStep::Ignored
    }

    /// Expire the armed command if its deadline has passed
    pub fn expire(&mut self, now: Instant) -> GateStep {
        match self.take_if_expired(now) {
            Some(discarded) => {
                tracing::info!(intent = %discarded.intent, "confirmation timed out");
                GateStep::Expired { discarded }
            }
            None => GateStep::Ignored,
        }
    }

    /// Hand out the confirmed command, returning the gate to idle
    ///
    /// Returns `None` unless the previous step was [`GateStep::Confirmed`].
    pub fn take_confirmed(&mut self) -> Option<PendingCommand> {
        if self.state() == ConversationState::Executing {
            self.replace(Phase::Idle).into_pending()
        } else {
            None
        }
    }

    /// Drop any pending command and return to idle
    pub fn reset(&mut self) -> GateStep {
        let discarded = self.replace(Phase::Idle).into_pending();
        GateStep::Reset { discarded }
    }

    /// Read-only view for observers
    #[must_use]
    pub fn snapshot(&self, now: Instant) -> GateSnapshot {
        let expires_in_ms = self.deadline().map(|d| {
            u64::try_from(d.saturating_duration_since(now).as_millis()).unwrap_or(u64::MAX)
        });

        GateSnapshot {
            state: self.state(),
            pending_intent: self.pending().map(|p| p.intent.clone()),
            expires_in_ms,
        }
    }

    fn replace(&mut self, next: Phase) -> Phase {
        std::mem::replace(&mut self.phase, next)
    }

    /// Move to idle if the armed command's deadline has passed
    fn take_if_expired(&mut self, now: Instant) -> Option<PendingCommand> {
        if self.deadline().is_some_and(|deadline| now >= deadline) {
            self.replace(Phase::Idle).into_pending()
        } else {
            None
        }
    }
}
