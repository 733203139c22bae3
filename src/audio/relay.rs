//! Relay consumer for one recording segment.
//!
//! Drains the frame queue into the open recognition stream until the
//! recording flag clears, then sends the end-of-stream marker before
//! returning. Skipping the marker truncates the final utterance's result,
//! so the shutdown path always runs, including after a send error.

use anyhow::Result;
use tokio::sync::watch;
use tracing::{debug, info};

use super::frame_queue::FrameQueue;
use crate::recognition::RecognitionStream;

/// Forward frames until `recording` turns false, then close the stream.
pub async fn run(
    mut stream: Box<dyn RecognitionStream>,
    frames: FrameQueue,
    mut recording: watch::Receiver<bool>,
) -> Result<()> {
    let stream_id = stream.id();
    debug!(stream_id, "relay started");

    let forward = async {
        loop {
            if !*recording.borrow() {
                return Ok(());
            }
            tokio::select! {
                frame = frames.pop() => {
                    stream.send_frame(&frame).await?;
                }
                changed = recording.changed() => {
                    if changed.is_err() {
                        return Ok(());
                    }
                }
            }
        }
    };

    let result: Result<()> = forward.await;

    stream.end_stream().await?;
    info!(stream_id, "recognition stream closed");

    result
}
