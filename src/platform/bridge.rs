//! Websocket bridge to the browser-automation sidecar.
//!
//! The sidecar observes the meeting DOM and writes JSON events into this
//! socket; the engine writes JSON commands (join, send message, leave)
//! back. Wire tags are snake_case.

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio_tungstenite::{connect_async, tungstenite};
use tracing::{debug, info, warn};

use super::{MeetingEvent, MeetingPlatform, Platform};

type WsSink = futures_util::stream::SplitSink<
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>,
    tungstenite::Message,
>;

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum BridgeEvent {
    SpeakerChanged {
        name: String,
    },
    MessageChanged {
        #[serde(default)]
        sender: String,
        #[serde(default)]
        text: String,
        attachment_title: Option<String>,
        attachment_href: Option<String>,
    },
    MeetingEnded,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum BridgeCommand {
    Join {
        platform: String,
        meeting_id: String,
        password: String,
        identity: String,
    },
    SendMessage {
        text: String,
    },
    Leave,
}

impl From<BridgeEvent> for MeetingEvent {
    fn from(event: BridgeEvent) -> Self {
        match event {
            BridgeEvent::SpeakerChanged { name } => MeetingEvent::SpeakerChanged { name },
            BridgeEvent::MessageChanged {
                sender,
                text,
                attachment_title,
                attachment_href,
            } => MeetingEvent::MessageChanged {
                sender,
                text,
                attachment_title,
                attachment_href,
            },
            BridgeEvent::MeetingEnded => MeetingEvent::MeetingEnded,
        }
    }
}

pub struct WsBridge {
    platform: Platform,
    sink: Mutex<WsSink>,
}

impl WsBridge {
    /// Connect to the sidecar. Returns the bridge handle and the channel
    /// its meeting events arrive on. The channel closes when the sidecar
    /// disconnects.
    pub async fn connect(
        url: &str,
        platform: Platform,
    ) -> Result<(Arc<Self>, mpsc::Receiver<MeetingEvent>)> {
        let (ws, _) = connect_async(url)
            .await
            .with_context(|| format!("Failed to connect to platform bridge at {}", url))?;
        let (sink, mut source) = ws.split();

        info!(platform = platform.as_str(), "platform bridge connected");

        let (tx, rx) = mpsc::channel::<MeetingEvent>(64);
        tokio::spawn(async move {
            while let Some(message) = source.next().await {
                match message {
                    Ok(tungstenite::Message::Text(text)) => {
                        match serde_json::from_str::<BridgeEvent>(&text) {
                            Ok(event) => {
                                if tx.send(event.into()).await.is_err() {
                                    return;
                                }
                            }
                            Err(err) => warn!("unrecognized bridge event: {}", err),
                        }
                    }
                    Ok(tungstenite::Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(err) => {
                        warn!("platform bridge read error: {}", err);
                        break;
                    }
                }
            }
            debug!("platform bridge reader finished");
        });

        let bridge = Arc::new(Self {
            platform,
            sink: Mutex::new(sink),
        });
        Ok((bridge, rx))
    }

    async fn send(&self, command: BridgeCommand) -> Result<()> {
        let payload = serde_json::to_string(&command).context("Failed to encode bridge command")?;
        let mut sink = self.sink.lock().await;
        sink.send(tungstenite::Message::Text(payload.into()))
            .await
            .context("Failed to send bridge command")
    }
}

#[async_trait]
impl MeetingPlatform for WsBridge {
    async fn join(&self, meeting_id: &str, password: &str, identity: &str) -> Result<()> {
        self.send(BridgeCommand::Join {
            platform: self.platform.as_str().to_string(),
            meeting_id: meeting_id.to_string(),
            password: password.to_string(),
            identity: identity.to_string(),
        })
        .await
    }

    async fn send_chat_message(&self, text: &str) -> Result<()> {
        self.send(BridgeCommand::SendMessage {
            text: text.to_string(),
        })
        .await
    }

    async fn leave(&self) -> Result<()> {
        self.send(BridgeCommand::Leave).await
    }
}
