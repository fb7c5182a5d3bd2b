//! Cadenza DSP - Digital Signal Processing Module
//!
//! This crate provides the signal processing pipeline for Cadenza, including:
//! - Planar `AudioBuffer` with merge and mix primitives
//! - Fixed-capacity `RingBuffer` for block-size hand-off
//! - `ProcessingChain` of boxed `AudioProcessor`s
//! - ADSR envelopes, envelope followers and the arpeggiator step sequencer
//! - Dynamics (limiter, compressor, gate) and effects (reverb, delay,
//!   bit crusher, decimator, wave shaper, tremolo, glitcher, filter, gain,
//!   flanger, phaser, formant filter, DC offset filter)
//! - Volume and unit conversion helpers
//!
//! # Architecture
//!
//! ```text
//! SampleSource ──► AudioBuffer ──► ProcessingChain ──► bus AudioBuffer
//!                                   │
//!                                   ├─ Filter / Gain / WaveShaper ...
//!                                   └─ Delay / Reverb / Limiter ...
//! ```
//!
//! The DSP chain follows a strict "no allocation in audio callback" rule.
//! Buffers, delay lines and tables are allocated by constructors; the
//! `process()` path only reads and writes them. Parameters are changed
//! through `&mut self` setters between buffer processing calls.

mod arpeggiator;
mod buffer;
mod envelope;
mod error;
mod follower;
mod processor;
pub mod processors;
mod ring_buffer;
pub mod units;
pub mod volume;

pub use arpeggiator::{Arpeggiator, MAX_STEPS};
pub use buffer::AudioBuffer;
pub use envelope::{Adsr, EnvelopePhase, EnvelopeState};
pub use error::DspError;
pub use follower::EnvelopeFollower;
pub use processor::{AudioProcessor, ProcessContext, ProcessingChain, ProcessorId, MAX_PROCESSORS};
pub use processors::{
    BitCrusher, Compressor, DcOffsetFilter, Decimator, Delay, Filter, FilterType, Flanger,
    FormantFilter, Gain, Gate, Glitcher, Limiter, Phaser, Reverb, Tremolo, TremoloSettings,
    TremoloType, Vowel, WaveShaper,
};
pub use ring_buffer::RingBuffer;
