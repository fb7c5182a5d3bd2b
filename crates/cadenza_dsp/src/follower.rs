//! Envelope Follower
//!
//! Peak follower with separate attack and release smoothing, used for level
//! metering.

use crate::buffer::AudioBuffer;

#[derive(Debug, Clone)]
pub struct EnvelopeFollower {
    attack: f32,
    release: f32,
    pub envelope: f32,
}

impl EnvelopeFollower {
    pub fn new(max_gain: f32, attack_ms: f32, release_ms: f32, sample_rate: f32) -> Self {
        Self {
            attack: Self::coefficient(max_gain, attack_ms, sample_rate),
            release: Self::coefficient(max_gain, release_ms, sample_rate),
            envelope: 0.0,
        }
    }

    fn coefficient(max_gain: f32, time_ms: f32, sample_rate: f32) -> f32 {
        let samples = time_ms * sample_rate * 0.001;
        if samples <= 0.0 {
            return 0.0;
        }
        0.01_f32.powf(max_gain / samples)
    }

    #[inline]
    pub fn process(&mut self, sample: f32) -> f32 {
        let v = sample.abs();
        let coefficient = if v > self.envelope { self.attack } else { self.release };
        self.envelope = coefficient * (self.envelope - v) + v;
        self.envelope
    }

    /// Follow channel 0 of `buffer` and return the resulting envelope
    pub fn process_buffer(&mut self, buffer: &AudioBuffer) -> f32 {
        for sample in buffer.channel(0) {
            self.process(*sample);
        }
        self.envelope
    }

    pub fn reset(&mut self) {
        self.envelope = 0.0;
    }
}
