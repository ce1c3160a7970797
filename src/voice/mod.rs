//! Spoken output
//!
//! Speech synthesis and playback live outside this crate. The gate only needs
//! a fire-and-forget [`Speaker`] for prompts, outcome phrases and earcons.

use std::fmt;

/// Short prerecorded sounds played by the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alert {
    /// Device finished booting
    PowerOn,
    /// Wake word or button detected
    Wakeup,
    /// Network link came up
    NetworkConnected,
    /// Speech was not understood
    PleaseAgain,
}

impl fmt::Display for Alert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::PowerOn => "power_on",
            Self::Wakeup => "wakeup",
            Self::NetworkConnected => "network_connected",
            Self::PleaseAgain => "please_again",
        };
        f.write_str(name)
    }
}

/// Text-to-speech output
///
/// Calls return immediately; playback happens elsewhere.
pub trait Speaker: Send + Sync {
    /// Queue text to be spoken
    fn speak(&self, text: &str);

    /// Play an earcon
    fn play_alert(&self, alert: Alert);

    /// Interrupt whatever is currently playing
    fn stop(&self) {}
}

/// Speaker that writes to the log instead of a device
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSpeaker;

impl Speaker for LogSpeaker {
    fn speak(&self, text: &str) {
        tracing::info!(text, "speak");
    }

    fn play_alert(&self, alert: Alert) {
        tracing::debug!(%alert, "alert");
    }

    fn stop(&self) {
        tracing::trace!("stop playback");
    }
}
