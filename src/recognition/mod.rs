//! Streaming speech recognition client.
//!
//! One stream per recording segment: binary PCM frames go out, incremental
//! transcript results come back as JSON text messages. The stream is closed
//! with an explicit end marker so the service flushes the final utterance.

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite};
use tracing::{debug, info, warn};

use crate::config::RecognitionConfig;

type WsSink = futures_util::stream::SplitSink<
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>,
    tungstenite::Message,
>;

/// Write half of one open recognition connection, exclusively owned by the
/// relay for the segment's lifetime.
#[async_trait]
pub trait RecognitionStream: Send {
    fn id(&self) -> u64;
    async fn send_frame(&mut self, pcm: &[u8]) -> Result<()>;
    async fn end_stream(&mut self) -> Result<()>;
}

/// Opens recognition streams. Each call returns a fresh connection and the
/// receiver its transcript results arrive on.
#[async_trait]
pub trait RecognitionClient: Send + Sync {
    async fn open_stream(&self) -> Result<(Box<dyn RecognitionStream>, mpsc::Receiver<String>)>;
}

#[derive(Debug, Deserialize)]
struct TranscriptResult {
    transcript: String,
}

pub struct WsRecognitionClient {
    endpoint: String,
    language: String,
    sample_rate: u32,
    next_id: AtomicU64,
}

impl WsRecognitionClient {
    pub fn new(config: &RecognitionConfig) -> Self {
        Self {
            endpoint: config.endpoint.clone(),
            language: config.language.clone(),
            sample_rate: config.sample_rate,
            next_id: AtomicU64::new(1),
        }
    }
}

#[async_trait]
impl RecognitionClient for WsRecognitionClient {
    async fn open_stream(&self) -> Result<(Box<dyn RecognitionStream>, mpsc::Receiver<String>)> {
        let stream_id = self.next_id.fetch_add(1, Ordering::SeqCst);

        let (ws, _) = connect_async(&self.endpoint)
            .await
            .context("Failed to connect to recognition service")?;
        let (mut sink, mut source) = ws.split();

        let start = serde_json::json!({
            "type": "start",
            "encoding": "pcm_s16le",
            "sample_rate": self.sample_rate,
            "language": self.language,
        });
        sink.send(tungstenite::Message::Text(start.to_string().into()))
            .await
            .context("Failed to configure recognition stream")?;

        info!(stream_id, "recognition stream opened");

        let (tx, rx) = mpsc::channel::<String>(64);
        tokio::spawn(async move {
            while let Some(message) = source.next().await {
                match message {
                    Ok(tungstenite::Message::Text(text)) => {
                        match serde_json::from_str::<TranscriptResult>(&text) {
                            Ok(result) if !result.transcript.is_empty() => {
                                if tx.send(result.transcript).await.is_err() {
                                    return;
                                }
                            }
                            Ok(_) => {}
                            Err(err) => {
                                debug!(stream_id, "ignoring non-transcript message: {}", err);
                            }
                        }
                    }
                    Ok(tungstenite::Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(err) => {
                        warn!(stream_id, "recognition stream read error: {}", err);
                        break;
                    }
                }
            }
            debug!(stream_id, "recognition result reader finished");
        });

        Ok((
            Box::new(WsRecognitionStream {
                id: stream_id,
                sink,
            }),
            rx,
        ))
    }
}

struct WsRecognitionStream {
    id: u64,
    sink: WsSink,
}

#[async_trait]
impl RecognitionStream for WsRecognitionStream {
    fn id(&self) -> u64 {
        self.id
    }

    async fn send_frame(&mut self, pcm: &[u8]) -> Result<()> {
        self.sink
            .send(tungstenite::Message::Binary(pcm.to_vec().into()))
            .await
            .context("Failed to send audio frame")
    }

    async fn end_stream(&mut self) -> Result<()> {
        let end = serde_json::json!({ "type": "end" });
        self.sink
            .send(tungstenite::Message::Text(end.to_string().into()))
            .await
            .context("Failed to send end-of-stream marker")?;
        if let Err(err) = self.sink.close().await {
            debug!(stream_id = self.id, "recognition sink close: {}", err);
        }
        Ok(())
    }
}
