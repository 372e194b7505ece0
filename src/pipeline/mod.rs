//! Pipeline engine and the channel built on it.
//!
//! ```text
//! Source Thread → Ring Buffer → Encoder ─┐
//!                                        ├─ PipelineWorker (capture, process) → Transport
//!                         MediaChannel ──┘
//! ```
//!
//! - **Worker**: Runs capture and process on a dedicated thread, paced by
//!   the cycle interval, with bounded automatic recovery
//! - **Channel**: Owns encoder and transport and orders their start and stop
//!   around the worker
//! - **Ring Buffer**: Lock-free SPSC queue between the capture callback and
//!   the encoder, so the callback never blocks

mod channel;
mod ring_buffer;
mod worker;

pub use channel::{ChannelStats, MediaChannel};
pub(crate) use ring_buffer::AudioBuffer;
pub use worker::{Pipeline, PipelineWorker, WorkerHandle, WorkerStatus};
