//! Microphone capture via cpal.
//!
//! The capture callback runs on cpal's own thread. It only converts the
//! block to little-endian bytes and hands it to the frame queue.

use anyhow::{Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tracing::{debug, error, info};

use super::frame_queue::FrameQueue;

/// Block size in samples, roughly 128 ms at 16 kHz.
const FRAMES_PER_BLOCK: u32 = 2048;

/// Capture source feeding PCM frames into a queue for one recording segment.
pub trait AudioCapture {
    fn start(&mut self, frames: FrameQueue) -> Result<()>;
    fn stop(&mut self);
    fn is_active(&self) -> bool;
}

pub struct MicCapture {
    device: cpal::Device,
    config: cpal::StreamConfig,
    stream: Option<cpal::Stream>,
}

impl MicCapture {
    /// Create a capture source on the default input device.
    /// 16-bit mono at the given sample rate, ~2048-sample blocks.
    pub fn new(sample_rate: u32) -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .context("No input device available for meeting capture")?;

        info!(
            "Meeting capture using device: {}",
            device.name().unwrap_or_else(|_| "unknown".to_string())
        );

        let config = cpal::StreamConfig {
            channels: 1,
            sample_rate: cpal::SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Fixed(FRAMES_PER_BLOCK),
        };

        Ok(Self {
            device,
            config,
            stream: None,
        })
    }
}

impl AudioCapture for MicCapture {
    fn start(&mut self, frames: FrameQueue) -> Result<()> {
        if self.stream.is_some() {
            anyhow::bail!("Capture already running");
        }

        let err_fn = |err| error!("Meeting capture stream error: {}", err);

        let stream = self.device.build_input_stream(
            &self.config,
            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                let mut block = Vec::with_capacity(data.len() * 2);
                for sample in data {
                    block.extend_from_slice(&sample.to_le_bytes());
                }
                frames.push(block);
            },
            err_fn,
            None,
        )?;

        stream.play()?;
        self.stream = Some(stream);

        info!("Meeting capture started");
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            debug!("Stopping meeting capture stream");
            drop(stream);
        }
    }

    fn is_active(&self) -> bool {
        self.stream.is_some()
    }
}

impl Drop for MicCapture {
    fn drop(&mut self) {
        if self.is_active() {
            debug!("Dropping active MicCapture, cleaning up");
            self.stop();
        }
    }
}
