//! Bounded handoff queue between the audio capture callback and the relay.
//!
//! The capture callback runs on the audio subsystem's own thread and must
//! not block, so `push` is lock-and-return. On overflow the oldest unsent
//! frame is dropped rather than stalling the callback.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use tracing::warn;

#[derive(Clone)]
pub struct FrameQueue {
    inner: Arc<FrameQueueInner>,
}

struct FrameQueueInner {
    frames: Mutex<VecDeque<Vec<u8>>>,
    notify: Notify,
    capacity: usize,
}

impl FrameQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(FrameQueueInner {
                frames: Mutex::new(VecDeque::with_capacity(capacity)),
                notify: Notify::new(),
                capacity,
            }),
        }
    }

    /// Push one PCM frame. Never blocks; drops the oldest queued frame when
    /// the queue is full.
    pub fn push(&self, frame: Vec<u8>) {
        {
            let mut frames = match self.inner.frames.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            if frames.len() >= self.inner.capacity {
                frames.pop_front();
                warn!("audio frame queue full, dropping oldest frame");
            }
            frames.push_back(frame);
        }
        self.inner.notify.notify_one();
    }

    /// Await the next frame in push order.
    pub async fn pop(&self) -> Vec<u8> {
        loop {
            {
                let mut frames = match self.inner.frames.lock() {
                    Ok(guard) => guard,
                    Err(poisoned) => poisoned.into_inner(),
                };
                if let Some(frame) = frames.pop_front() {
                    return frame;
                }
            }
            self.inner.notify.notified().await;
        }
    }

    pub fn len(&self) -> usize {
        self.inner
            .frames
            .lock()
            .map(|frames| frames.len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
