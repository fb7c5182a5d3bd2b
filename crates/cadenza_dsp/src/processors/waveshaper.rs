//! Wave Shaper
//!
//! Static nonlinearity `f(x) = (1 + k) * x / (1 + k * |x|)` with
//! `k = 2a / (1 - a)`. Positive amounts saturate, negative amounts expand
//! toward the peaks. The amount is kept strictly inside
//! `(-MAX_PHASE, MAX_PHASE)` so `k` stays finite.

use std::any::Any;

use crate::buffer::AudioBuffer;
use crate::processor::AudioProcessor;
use crate::volume::MAX_PHASE;

/// Amount substituted when the requested amount reaches +-`MAX_PHASE`
const AMOUNT_LIMIT: f32 = 0.9;

pub struct WaveShaper {
    amount: f32,
    k: f32,
    level: f32,
}

impl WaveShaper {
    pub fn new(amount: f32, level: f32) -> Self {
        let mut shaper = Self {
            amount: 0.0,
            k: 0.0,
            level,
        };
        shaper.set_amount(amount);
        shaper
    }

    pub fn amount(&self) -> f32 {
        self.amount
    }

    pub fn set_amount(&mut self, amount: f32) {
        self.amount = if amount >= MAX_PHASE {
            AMOUNT_LIMIT
        } else if amount <= -MAX_PHASE {
            -AMOUNT_LIMIT
        } else {
            amount
        };
        self.k = 2.0 * self.amount / (1.0 - self.amount);
    }

    pub fn level(&self) -> f32 {
        self.level
    }

    pub fn set_level(&mut self, level: f32) {
        self.level = level.max(0.0);
    }

    #[inline]
    fn shape(&self, x: f32) -> f32 {
        ((1.0 + self.k) * x / (1.0 + self.k * x.abs())) * self.level
    }
}

impl AudioProcessor for WaveShaper {
    fn process(&mut self, buffer: &mut AudioBuffer, is_mono_source: bool) {
        let channels = if is_mono_source { 1 } else { buffer.amount_of_channels() };
        for c in 0..channels {
            for sample in buffer.channel_mut(c) {
                *sample = self.shape(*sample);
            }
        }
        if is_mono_source {
            buffer.apply_mono_source();
        }
    }

    fn reset(&mut self) {}

    fn name(&self) -> &'static str {
        "WaveShaper"
    }

    fn is_cacheable(&self) -> bool {
        true
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
