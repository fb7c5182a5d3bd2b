//! ADSR Amplitude Envelope
//!
//! The envelope is a pure function of an event's position within its own
//! lifetime. An `Adsr` holds the shape (sample counts and levels) and may be
//! shared by many events; each event carries an `EnvelopeState` recording
//! where it is and whether it has been released.
//!
//! ```text
//!  1.0 |   /\
//!      |  /  \______ sustain
//!      | /          \
//!  0.0 |/            \____
//!       A  D   S     R   idle
//! ```
//!
//! Sequenced events release at `release_start_offset()`, the natural note
//! length. Live events sustain until `EnvelopeState::begin_release` is
//! called.

use crate::buffer::AudioBuffer;
use crate::units::{buffer_to_seconds, seconds_to_buffer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopePhase {
    Attack,
    Decay,
    Sustain,
    Release,
    Idle,
}

/// Per-event envelope bookkeeping
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnvelopeState {
    /// Offset of the first sample of the next buffer within the event
    pub position: usize,
    /// Whether the event has a fixed length and releases on its own
    pub sequenced: bool,
    /// Offset at which a live event was released
    release_offset: Option<usize>,
    /// Last applied envelope value
    pub envelope: f32,
}

impl EnvelopeState {
    pub fn sequenced() -> Self {
        Self {
            position: 0,
            sequenced: true,
            release_offset: None,
            envelope: 0.0,
        }
    }

    pub fn live() -> Self {
        Self {
            sequenced: false,
            ..Self::sequenced()
        }
    }

    /// Release a live event at `offset` within its lifetime
    pub fn begin_release(&mut self, offset: usize) {
        if self.release_offset.is_none() {
            self.release_offset = Some(offset);
        }
    }

    pub fn release_offset(&self) -> Option<usize> {
        self.release_offset
    }

    pub fn is_released(&self) -> bool {
        self.release_offset.is_some()
    }

    /// Rewind for a retriggered event
    pub fn restart(&mut self) {
        self.position = 0;
        self.release_offset = None;
        self.envelope = 0.0;
    }
}

#[derive(Debug, Clone)]
pub struct Adsr {
    sample_rate: f32,
    attack_samples: usize,
    decay_samples: usize,
    sustain_level: f32,
    release_samples: usize,
    /// Natural note length, where sequenced events start releasing
    buffer_length: usize,
}

impl Adsr {
    /// Envelope with no attack, decay or release and full sustain
    pub fn new(sample_rate: f32) -> Self {
        Self {
            sample_rate,
            attack_samples: 0,
            decay_samples: 0,
            sustain_level: 1.0,
            release_samples: 0,
            buffer_length: 0,
        }
    }

    /// Set every stage directly in samples
    pub fn set_durations(
        &mut self,
        attack: usize,
        decay: usize,
        sustain_level: f32,
        release: usize,
        buffer_length: usize,
    ) {
        self.attack_samples = attack;
        self.decay_samples = decay;
        self.sustain_level = sustain_level.clamp(0.0, 1.0);
        self.release_samples = release;
        self.buffer_length = buffer_length;
    }

    /// Attack time in seconds
    pub fn attack(&self) -> f32 {
        buffer_to_seconds(self.attack_samples, self.sample_rate)
    }

    pub fn set_attack(&mut self, seconds: f32) {
        self.attack_samples = seconds_to_buffer(seconds.max(0.0), self.sample_rate);
    }

    /// Decay time in seconds
    pub fn decay(&self) -> f32 {
        buffer_to_seconds(self.decay_samples, self.sample_rate)
    }

    pub fn set_decay(&mut self, seconds: f32) {
        self.decay_samples = seconds_to_buffer(seconds.max(0.0), self.sample_rate);
    }

    pub fn sustain(&self) -> f32 {
        self.sustain_level
    }

    pub fn set_sustain(&mut self, level: f32) {
        self.sustain_level = level.clamp(0.0, 1.0);
    }

    /// Release time in seconds
    pub fn release(&self) -> f32 {
        buffer_to_seconds(self.release_samples, self.sample_rate)
    }

    pub fn set_release(&mut self, seconds: f32) {
        self.release_samples = seconds_to_buffer(seconds.max(0.0), self.sample_rate);
    }

    pub fn buffer_length(&self) -> usize {
        self.buffer_length
    }

    pub fn set_buffer_length(&mut self, length: usize) {
        self.buffer_length = length;
    }

    /// Offset at which sequenced events start releasing
    pub fn release_start_offset(&self) -> usize {
        self.buffer_length
    }

    /// Release length in samples
    pub fn release_duration(&self) -> usize {
        self.release_samples
    }

    /// Offset after which an event is silent for good, `None` for live
    /// events that have not been released yet
    pub fn end_offset(&self, state: &EnvelopeState) -> Option<usize> {
        self.release_start(state).map(|start| start + self.release_samples)
    }

    fn release_start(&self, state: &EnvelopeState) -> Option<usize> {
        if state.sequenced {
            let natural = self.buffer_length;
            Some(state.release_offset.map_or(natural, |offset| offset.min(natural)))
        } else {
            state.release_offset
        }
    }

    /// Envelope before any release
    #[inline]
    fn held_level(&self, offset: usize) -> f32 {
        if offset < self.attack_samples {
            return offset as f32 / self.attack_samples as f32;
        }
        let decay_offset = offset - self.attack_samples;
        if decay_offset < self.decay_samples {
            let drop = 1.0 - self.sustain_level;
            return 1.0 - decay_offset as f32 * drop / self.decay_samples as f32;
        }
        self.sustain_level
    }

    #[inline]
    fn level_at(&self, offset: usize, release_start: Option<usize>, release_level: f32) -> f32 {
        match release_start {
            Some(start) if offset >= start => {
                let elapsed = offset - start;
                if elapsed >= self.release_samples {
                    0.0
                } else {
                    release_level - elapsed as f32 * release_level / self.release_samples as f32
                }
            }
            _ => self.held_level(offset),
        }
    }

    /// Stage an event is in at its current position
    pub fn phase(&self, state: &EnvelopeState) -> EnvelopePhase {
        let offset = state.position;
        if let Some(start) = self.release_start(state) {
            if offset >= start + self.release_samples {
                return EnvelopePhase::Idle;
            }
            if offset >= start {
                return EnvelopePhase::Release;
            }
        }
        if offset < self.attack_samples {
            EnvelopePhase::Attack
        } else if offset < self.attack_samples + self.decay_samples {
            EnvelopePhase::Decay
        } else {
            EnvelopePhase::Sustain
        }
    }

    /// Multiply `buffer` from `write_offset` onward by the envelope and
    /// advance `state.position` by the samples processed
    ///
    /// Returns the last applied envelope value.
    pub fn apply(&self, buffer: &mut AudioBuffer, state: &mut EnvelopeState, write_offset: usize) -> f32 {
        let size = buffer.buffer_size();
        if write_offset >= size {
            return state.envelope;
        }

        let release_start = self.release_start(state);
        let release_level = release_start.map_or(0.0, |start| self.held_level(start));
        let channels = buffer.amount_of_channels();
        let mut envelope = state.envelope;

        for (i, offset) in (write_offset..size).zip(state.position..) {
            envelope = self.level_at(offset, release_start, release_level);
            for c in 0..channels {
                buffer.channel_mut(c)[i] *= envelope;
            }
        }

        state.position += size - write_offset;
        state.envelope = envelope;
        envelope
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_scale(size: usize) -> AudioBuffer {
        let mut buffer = AudioBuffer::new(1, size).unwrap();
        buffer.channel_mut(0).fill(1.0);
        buffer
    }

    fn assert_samples(actual: &[f32], expected: &[f32]) {
        assert_eq!(actual.len(), expected.len());
        for (i, (a, e)) in actual.iter().zip(expected).enumerate() {
            assert!((a - e).abs() < 1e-6, "sample {}: {} != {}", i, a, e);
        }
    }

    #[test]
    fn test_defaults() {
        let adsr = Adsr::new(44100.0);
        assert_eq!(adsr.attack(), 0.0);
        assert_eq!(adsr.decay(), 0.0);
        assert_eq!(adsr.sustain(), 1.0);
        assert_eq!(adsr.release(), 0.0);
    }

    #[test]
    fn test_seconds_to_samples() {
        let mut adsr = Adsr::new(1000.0);
        adsr.set_attack(0.5);
        adsr.set_release(0.25);
        assert_eq!(adsr.release_duration(), 250);
        assert!((adsr.attack() - 0.5).abs() < 1e-6);

        adsr.set_sustain(3.0);
        assert_eq!(adsr.sustain(), 1.0);
    }

    #[test]
    fn test_full_envelope_shape() {
        let mut adsr = Adsr::new(44100.0);
        adsr.set_durations(2, 2, 0.5, 8, 8);

        let mut buffer = full_scale(16);
        let mut state = EnvelopeState::sequenced();
        adsr.apply(&mut buffer, &mut state, 0);

        assert_samples(
            buffer.channel(0),
            &[
                0.0, 0.5, 1.0, 0.75, 0.5, 0.5, 0.5, 0.5, 0.5, 0.4375, 0.375, 0.3125, 0.25,
                0.1875, 0.125, 0.0625,
            ],
        );
        assert!((state.envelope - 0.0625).abs() < 1e-6);
        assert_eq!(state.position, 16);
    }

    #[test]
    fn test_decay_to_zero_sustain() {
        let mut adsr = Adsr::new(44100.0);
        adsr.set_durations(2, 4, 0.0, 16, 16);

        let mut buffer = full_scale(8);
        let mut state = EnvelopeState::sequenced();
        adsr.apply(&mut buffer, &mut state, 0);

        assert_samples(buffer.channel(0), &[0.0, 0.5, 1.0, 0.75, 0.5, 0.25, 0.0, 0.0]);
    }

    #[test]
    fn test_zero_attack_and_decay_jump_to_sustain() {
        let mut adsr = Adsr::new(44100.0);
        adsr.set_durations(0, 0, 0.5, 10, 100);

        let mut buffer = full_scale(128);
        let mut state = EnvelopeState::sequenced();
        adsr.apply(&mut buffer, &mut state, 0);

        let out = buffer.channel(0);
        assert!(out[0] >= 0.5 && out[0] <= 1.0);

        let release = &out[adsr.release_start_offset()..];
        assert!(release.windows(2).all(|w| w[1] <= w[0]));
        assert_eq!(out[110], 0.0);
    }

    #[test]
    fn test_envelope_continues_across_buffers() {
        let mut adsr = Adsr::new(44100.0);
        adsr.set_durations(2, 2, 0.5, 8, 8);

        let mut state = EnvelopeState::sequenced();
        let mut first = full_scale(8);
        adsr.apply(&mut first, &mut state, 0);
        let mut second = full_scale(8);
        adsr.apply(&mut second, &mut state, 0);

        assert_samples(
            second.channel(0),
            &[0.5, 0.4375, 0.375, 0.3125, 0.25, 0.1875, 0.125, 0.0625],
        );
    }

    #[test]
    fn test_write_offset_leaves_leading_samples() {
        let mut adsr = Adsr::new(44100.0);
        adsr.set_durations(4, 0, 1.0, 0, 100);

        let mut buffer = full_scale(6);
        let mut state = EnvelopeState::sequenced();
        adsr.apply(&mut buffer, &mut state, 2);

        assert_samples(buffer.channel(0), &[1.0, 1.0, 0.0, 0.25, 0.5, 0.75]);
        assert_eq!(state.position, 4);
    }

    #[test]
    fn test_live_event_sustains_until_released() {
        let mut adsr = Adsr::new(44100.0);
        adsr.set_durations(0, 0, 0.8, 4, 4);

        let mut state = EnvelopeState::live();
        let mut buffer = full_scale(8);
        adsr.apply(&mut buffer, &mut state, 0);
        assert!(buffer.channel(0).iter().all(|s| (*s - 0.8).abs() < 1e-6));
        assert_eq!(adsr.phase(&state), EnvelopePhase::Sustain);

        state.begin_release(8);
        let mut buffer = full_scale(8);
        adsr.apply(&mut buffer, &mut state, 0);
        assert_samples(buffer.channel(0), &[0.8, 0.6, 0.4, 0.2, 0.0, 0.0, 0.0, 0.0]);
        assert_eq!(adsr.phase(&state), EnvelopePhase::Idle);
        assert_eq!(adsr.end_offset(&state), Some(12));
    }

    #[test]
    fn test_early_release_starts_from_reached_level() {
        let mut adsr = Adsr::new(44100.0);
        adsr.set_durations(4, 0, 1.0, 2, 100);

        let mut state = EnvelopeState::sequenced();
        state.begin_release(2);
        let mut buffer = full_scale(5);
        adsr.apply(&mut buffer, &mut state, 0);

        // released at half way through the attack
        assert_samples(buffer.channel(0), &[0.0, 0.25, 0.5, 0.25, 0.0]);
    }

    #[test]
    fn test_phases() {
        let mut adsr = Adsr::new(44100.0);
        adsr.set_durations(2, 2, 0.5, 2, 8);
        let mut state = EnvelopeState::sequenced();

        let expected = [
            (0, EnvelopePhase::Attack),
            (2, EnvelopePhase::Decay),
            (5, EnvelopePhase::Sustain),
            (8, EnvelopePhase::Release),
            (10, EnvelopePhase::Idle),
        ];
        for (position, phase) in expected {
            state.position = position;
            assert_eq!(adsr.phase(&state), phase);
        }

        state.restart();
        assert_eq!(state.position, 0);
        assert!(!state.is_released());
    }
}
