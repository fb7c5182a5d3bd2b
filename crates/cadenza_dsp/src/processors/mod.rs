//! Effect and dynamics processors
//!
//! Every processor implements `AudioProcessor` and can be placed in a
//! `ProcessingChain`. Threshold constants stay namespaced by their module
//! (`limiter::MIN_THRESHOLD_DB`, `compressor::MIN_THRESHOLD_DB`).

pub mod bitcrusher;
pub mod compressor;
pub mod dc_offset;
pub mod decimator;
pub mod delay;
pub mod dynamics;
pub mod filter;
pub mod flanger;
pub mod formant;
pub mod gain;
pub mod gate;
pub mod glitcher;
pub mod limiter;
pub mod phaser;
pub mod reverb;
pub mod tremolo;
pub mod waveshaper;

pub use bitcrusher::BitCrusher;
pub use compressor::Compressor;
pub use dc_offset::DcOffsetFilter;
pub use decimator::Decimator;
pub use delay::Delay;
pub use dynamics::{AttackRelease, EnvelopeDetector};
pub use filter::{Filter, FilterType};
pub use flanger::Flanger;
pub use formant::{FormantFilter, Vowel};
pub use gain::{Gain, MAX_GAIN};
pub use gate::Gate;
pub use glitcher::Glitcher;
pub use limiter::Limiter;
pub use phaser::Phaser;
pub use reverb::Reverb;
pub use tremolo::{Tremolo, TremoloSettings, TremoloType};
pub use waveshaper::WaveShaper;
