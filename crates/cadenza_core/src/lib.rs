//! Cadenza Core - Audio Engine
//!
//! This crate provides the mixing and render layer of Cadenza, including:
//! - Channels, channel groups and the master bus
//! - A render thread driving a platform `AudioOutput`
//! - Lock-free communication between control and render threads
//! - Sequencer transport and engine notifications
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Control Thread                         │
//! │  host ──commands──▶ AudioEngine ◀──notifications── Notifier │
//! └─────────────────────────────────────────────────────────────┘
//!                 │ crossbeam-channel        ▲ rtrb
//!                 ▼                          │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Render Thread                          │
//! │   Channels ──▶ Groups ──▶ Master chain ──▶ AudioOutput      │
//! │      │           │             │                            │
//! │      └───────────┴─────────────┘                            │
//! │              (Zero allocation in this path)                 │
//! └─────────────────────────────────────────────────────────────┘
//! ```

mod channel;
mod config;
mod engine;
mod error;
mod group;
mod message;
mod notifier;
mod render;
mod transport;

pub use channel::{AudioChannel, ChannelId, ChannelSet, SampleSource};
pub use config::{EngineConfig, PerformanceConfig, StreamConfig};
pub use engine::{AudioEngine, AudioOutput};
pub use error::{EngineError, EngineResult, OutputError};
pub use group::{ChannelGroup, GroupId};
pub use message::{ChainTarget, Command, ProcessorEdit, Retired};
pub use notifier::{
    notification_queue, BridgeSink, HostBridge, Notification, NotificationKind,
    NotificationProducer, NotificationPump, NotificationSink, Notifier, Observer,
    ObserverRegistry,
};
pub use render::{Renderer, MAX_CHANNELS, MAX_GROUPS};
pub use transport::{Transport, MAX_TEMPO, MIN_TEMPO};

// Re-export DSP types for convenience
pub use cadenza_dsp::{AudioBuffer, AudioProcessor, DspError, ProcessContext, ProcessingChain, ProcessorId};
