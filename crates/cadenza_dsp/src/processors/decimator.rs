//! Decimator
//!
//! Sample-and-hold downsampling combined with bit-depth reduction. Every
//! `factor`-th sample is quantized and then held until the next capture.

use std::any::Any;

use crate::buffer::AudioBuffer;
use crate::processor::AudioProcessor;

pub struct Decimator {
    bits: u32,
    factor: u32,
    step: f32,
    counters: [u32; 2],
    held: [f32; 2],
}

impl Decimator {
    /// Create a decimator holding each capture for `factor` samples and
    /// quantizing to `bits` bits (1 - 16)
    pub fn new(bits: u32, factor: u32) -> Self {
        let mut decimator = Self {
            bits: 16,
            factor: 1,
            step: 1.0,
            counters: [0; 2],
            held: [0.0; 2],
        };
        decimator.set_bits(bits);
        decimator.set_factor(factor);
        decimator
    }

    pub fn bits(&self) -> u32 {
        self.bits
    }

    pub fn set_bits(&mut self, bits: u32) {
        self.bits = bits.clamp(1, 16);
        self.step = (1_u32 << (self.bits - 1)) as f32;
    }

    pub fn factor(&self) -> u32 {
        self.factor
    }

    pub fn set_factor(&mut self, factor: u32) {
        self.factor = factor.max(1);
        for counter in &mut self.counters {
            if *counter >= self.factor {
                *counter = 0;
            }
        }
    }

    #[inline]
    fn quantize(&self, sample: f32) -> f32 {
        (sample * self.step).round() / self.step
    }
}

impl AudioProcessor for Decimator {
    fn process(&mut self, buffer: &mut AudioBuffer, is_mono_source: bool) {
        let channels = if is_mono_source { 1 } else { buffer.amount_of_channels() };

        for c in 0..channels {
            let mut counter = self.counters[c];
            let mut held = self.held[c];

            for sample in buffer.channel_mut(c) {
                if counter == 0 {
                    held = self.quantize(*sample);
                }
                *sample = held;
                counter += 1;
                if counter == self.factor {
                    counter = 0;
                }
            }
            self.counters[c] = counter;
            self.held[c] = held;
        }

        if is_mono_source {
            buffer.apply_mono_source();
        }
    }

    fn reset(&mut self) {
        self.counters = [0; 2];
        self.held = [0.0; 2];
    }

    fn name(&self) -> &'static str {
        "Decimator"
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
