//! Streaming speech-to-text client for the Rev.ai realtime WebSocket API.
//!
//! Audio frames pushed into [`RevAiTranscriber`] are forwarded over a
//! persistent duplex WebSocket session; the service's cumulative partial and
//! final results come back as [`Transcription`] events on subscribed
//! channels. Connection loss is absorbed by a bounded reconnect loop rather
//! than surfaced to the caller.

mod client;
mod config;
mod error;
mod queue;
mod session;
mod state;
mod transcript;

pub use client::RevAiTranscriber;
pub use config::{EndpointingMode, TranscriberConfig, API_KEY_ENV};
pub use error::TranscriberError;
pub use state::LifecycleState;
pub use transcript::Transcription;
