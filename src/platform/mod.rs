//! Meeting platform boundary.
//!
//! The engine never touches the browser: a per-platform automation sidecar
//! owns selectors and clicks, and talks to the engine over a local
//! websocket bridge. This module defines the platform capability surface
//! and the events the sidecar raises.

pub mod bridge;

use anyhow::{bail, Result};
use async_trait::async_trait;

pub use bridge::WsBridge;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Chime,
    Zoom,
    Webex,
}

impl Platform {
    pub fn parse(name: &str) -> Result<Self> {
        match name {
            "Chime" => Ok(Self::Chime),
            "Zoom" => Ok(Self::Zoom),
            "Webex" => Ok(Self::Webex),
            _ => bail!(
                "Unknown meeting platform '{}'. Supported platforms: Chime, Zoom, Webex",
                name
            ),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Chime => "Chime",
            Self::Zoom => "Zoom",
            Self::Webex => "Webex",
        }
    }

    /// Sender name the platform uses for its own system chat messages.
    /// Messages from this sender are never logged.
    pub fn system_sender(&self) -> &'static str {
        match self {
            Self::Chime => "Amazon Chime",
            Self::Zoom => "Zoom",
            Self::Webex => "Webex",
        }
    }
}

/// Notifications raised by the automation sidecar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MeetingEvent {
    SpeakerChanged {
        name: String,
    },
    /// A chat message appeared. `sender` is empty on continuation lines
    /// (platforms group consecutive messages and omit the repeated label).
    MessageChanged {
        sender: String,
        text: String,
        attachment_title: Option<String>,
        attachment_href: Option<String>,
    },
    MeetingEnded,
}

/// Outbound capability surface the engine drives.
#[async_trait]
pub trait MeetingPlatform: Send + Sync {
    /// Join the meeting under the given display identity.
    async fn join(&self, meeting_id: &str, password: &str, identity: &str) -> Result<()>;

    /// Post a message to the meeting chat. Best-effort; the caller logs
    /// failures and continues.
    async fn send_chat_message(&self, text: &str) -> Result<()>;

    /// Leave and close the meeting.
    async fn leave(&self) -> Result<()>;
}
