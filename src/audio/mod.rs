//! Audio capture and the per-segment relay into the recognition stream.

pub mod capture;
pub mod frame_queue;
pub mod relay;

pub use capture::{AudioCapture, MicCapture};
pub use frame_queue::FrameQueue;
