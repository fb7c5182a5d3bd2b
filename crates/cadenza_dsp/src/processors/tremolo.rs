//! Tremolo
//!
//! Amplitude modulation driven by an envelope that cycles from silence up
//! to unity (attack) and back down (decay). Each output channel runs its own
//! envelope, so left and right can pulse at different rates or with
//! different curves.
//!
//! Both curves are precomputed tables of `ENVELOPE_PRECISION` entries. The
//! exponential table spans a 96 dB range, 0.1 dB per entry.

use std::any::Any;

use crate::buffer::AudioBuffer;
use crate::processor::AudioProcessor;
use crate::units::milliseconds_to_buffer;

/// Entries per envelope table
pub const ENVELOPE_PRECISION: usize = 960;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TremoloType {
    Linear,
    Exponential,
}

/// Modulation settings of one channel
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TremoloSettings {
    pub curve: TremoloType,
    pub attack_ms: f32,
    pub decay_ms: f32,
}

impl TremoloSettings {
    pub fn new(curve: TremoloType, attack_ms: f32, decay_ms: f32) -> Self {
        Self {
            curve,
            attack_ms,
            decay_ms,
        }
    }
}

/// Position of one channel's envelope inside its table
#[derive(Debug, Clone, Copy)]
struct EnvelopeCursor {
    index: f32,
    attacking: bool,
    attack_increment: f32,
    decay_increment: f32,
}

impl EnvelopeCursor {
    fn new(settings: &TremoloSettings, sample_rate: f32) -> Self {
        let mut cursor = Self {
            index: 0.0,
            attacking: true,
            attack_increment: 0.0,
            decay_increment: 0.0,
        };
        cursor.configure(settings, sample_rate);
        cursor
    }

    fn configure(&mut self, settings: &TremoloSettings, sample_rate: f32) {
        let span = (ENVELOPE_PRECISION - 1) as f32;
        let attack = milliseconds_to_buffer(settings.attack_ms, sample_rate).max(1);
        let decay = milliseconds_to_buffer(settings.decay_ms, sample_rate).max(1);
        self.attack_increment = span / attack as f32;
        self.decay_increment = span / decay as f32;
    }

    /// Current table index, then advance one sample
    #[inline]
    fn next(&mut self) -> usize {
        let last = (ENVELOPE_PRECISION - 1) as f32;
        let current = self.index as usize;

        if self.attacking {
            self.index += self.attack_increment;
            if self.index >= last {
                self.index = last;
                self.attacking = false;
            }
        } else {
            self.index -= self.decay_increment;
            if self.index <= 0.0 {
                self.index = 0.0;
                self.attacking = true;
            }
        }
        current
    }

    fn restart(&mut self) {
        self.index = 0.0;
        self.attacking = true;
    }
}

pub struct Tremolo {
    sample_rate: f32,
    settings: [TremoloSettings; 2],
    cursors: [EnvelopeCursor; 2],
    linear_table: Box<[f32]>,
    exponential_table: Box<[f32]>,
}

impl Tremolo {
    pub fn new(left: TremoloSettings, right: TremoloSettings, sample_rate: f32) -> Self {
        let last = (ENVELOPE_PRECISION - 1) as f32;

        let linear_table = (0..ENVELOPE_PRECISION)
            .map(|i| i as f32 / last)
            .collect::<Vec<_>>()
            .into_boxed_slice();

        let exponential_table = (0..ENVELOPE_PRECISION)
            .map(|i| 10.0_f32.powf(((i as f32 - last) * 0.1) / 20.0))
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Self {
            sample_rate,
            settings: [left, right],
            cursors: [
                EnvelopeCursor::new(&left, sample_rate),
                EnvelopeCursor::new(&right, sample_rate),
            ],
            linear_table,
            exponential_table,
        }
    }

    /// Same modulation on both channels
    pub fn mono(settings: TremoloSettings, sample_rate: f32) -> Self {
        Self::new(settings, settings, sample_rate)
    }

    pub fn settings(&self, channel: usize) -> TremoloSettings {
        self.settings[channel.min(1)]
    }

    pub fn set_type(&mut self, channel: usize, curve: TremoloType) {
        self.settings[channel.min(1)].curve = curve;
    }

    pub fn set_attack(&mut self, channel: usize, attack_ms: f32) {
        let c = channel.min(1);
        self.settings[c].attack_ms = attack_ms.max(0.0);
        self.cursors[c].configure(&self.settings[c], self.sample_rate);
    }

    pub fn set_decay(&mut self, channel: usize, decay_ms: f32) {
        let c = channel.min(1);
        self.settings[c].decay_ms = decay_ms.max(0.0);
        self.cursors[c].configure(&self.settings[c], self.sample_rate);
    }

    /// Whether left and right are modulated differently
    pub fn is_stereo(&self) -> bool {
        self.settings[0] != self.settings[1]
    }

    fn modulate(&mut self, channel: usize, samples: &mut [f32]) {
        let table = match self.settings[channel].curve {
            TremoloType::Linear => &self.linear_table,
            TremoloType::Exponential => &self.exponential_table,
        };
        let cursor = &mut self.cursors[channel];
        for sample in samples.iter_mut() {
            *sample *= table[cursor.next()];
        }
    }
}

impl AudioProcessor for Tremolo {
    fn process(&mut self, buffer: &mut AudioBuffer, is_mono_source: bool) {
        if buffer.is_mono() || (is_mono_source && !self.is_stereo()) {
            self.modulate(0, buffer.channel_mut(0));
            buffer.apply_mono_source();
            return;
        }
        self.modulate(0, buffer.channel_mut(0));
        self.modulate(1, buffer.channel_mut(1));
    }

    fn reset(&mut self) {
        for cursor in &mut self.cursors {
            cursor.restart();
        }
    }

    fn name(&self) -> &'static str {
        "Tremolo"
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
