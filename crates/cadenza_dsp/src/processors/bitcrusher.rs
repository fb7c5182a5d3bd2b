//! Bit Crusher
//!
//! Reduces the resolution of each sample by masking the low bits of its
//! 16-bit representation.

use std::any::Any;

use crate::buffer::AudioBuffer;
use crate::processor::AudioProcessor;
use crate::volume::{cap_param, cap_sample};

const FULL_SCALE: f32 = i16::MAX as f32;

pub struct BitCrusher {
    amount: f32,
    bits: u32,
    /// Drive applied before quantization
    input_mix: f32,
    /// Level applied to the crushed signal
    output_mix: f32,
    /// Dry/wet balance, 1.0 is fully crushed
    mix: f32,
}

impl BitCrusher {
    /// Create a crusher. `amount` 0.0 keeps a single bit, 1.0 all sixteen.
    pub fn new(amount: f32, input_mix: f32, output_mix: f32) -> Self {
        let mut crusher = Self {
            amount: 0.0,
            bits: 16,
            input_mix: cap_param(input_mix),
            output_mix: cap_param(output_mix),
            mix: 1.0,
        };
        crusher.set_amount(amount);
        crusher
    }

    pub fn amount(&self) -> f32 {
        self.amount
    }

    pub fn set_amount(&mut self, amount: f32) {
        self.amount = cap_param(amount);
        self.bits = (self.amount * 15.0).floor() as u32 + 1;
    }

    /// Bit depth derived from the amount (1 - 16)
    pub fn bits(&self) -> u32 {
        self.bits
    }

    pub fn set_input_mix(&mut self, value: f32) {
        self.input_mix = cap_param(value);
    }

    pub fn set_output_mix(&mut self, value: f32) {
        self.output_mix = cap_param(value);
    }

    pub fn mix(&self) -> f32 {
        self.mix
    }

    pub fn set_mix(&mut self, value: f32) {
        self.mix = cap_param(value);
    }

    #[inline]
    fn crush(&self, sample: f32) -> f32 {
        let quantized = (cap_sample(sample * self.input_mix) * FULL_SCALE) as i32;
        let masked = quantized & (-1_i32 << (16 - self.bits));
        let crushed = masked as f32 / FULL_SCALE * self.output_mix;
        sample + (crushed - sample) * self.mix
    }
}

impl AudioProcessor for BitCrusher {
    fn process(&mut self, buffer: &mut AudioBuffer, is_mono_source: bool) {
        let channels = if is_mono_source { 1 } else { buffer.amount_of_channels() };
        for c in 0..channels {
            for sample in buffer.channel_mut(c) {
                *sample = self.crush(*sample);
            }
        }
        if is_mono_source {
            buffer.apply_mono_source();
        }
    }

    fn reset(&mut self) {}

    fn name(&self) -> &'static str {
        "BitCrusher"
    }

    fn is_cacheable(&self) -> bool {
        true
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
