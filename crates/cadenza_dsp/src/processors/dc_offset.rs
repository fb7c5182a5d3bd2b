//! DC Offset Filter
//!
//! First-order DC blocker `y[n] = x[n] - x[n-1] + R * y[n-1]` with the
//! -3 dB point at C2 (65.41 Hz). Asymmetric shaping and cascaded filters
//! leave a DC bias behind; this strips it before it eats headroom.

use std::any::Any;

use crate::buffer::AudioBuffer;
use crate::processor::AudioProcessor;

/// Cutoff of the blocker in Hz
pub const DC_CUTOFF: f32 = 65.41;

pub struct DcOffsetFilter {
    r: f32,
    last_in: Vec<f32>,
    last_out: Vec<f32>,
}

impl DcOffsetFilter {
    pub fn new(channels: usize, sample_rate: f32) -> Self {
        Self {
            r: 1.0 - std::f32::consts::TAU * DC_CUTOFF / sample_rate,
            last_in: vec![0.0; channels.max(1)],
            last_out: vec![0.0; channels.max(1)],
        }
    }

    /// Pole radius of the filter
    pub fn r(&self) -> f32 {
        self.r
    }
}

impl AudioProcessor for DcOffsetFilter {
    fn process(&mut self, buffer: &mut AudioBuffer, is_mono_source: bool) {
        let channels = if is_mono_source {
            1
        } else {
            buffer.amount_of_channels().min(self.last_in.len())
        };

        for c in 0..channels {
            let mut last_in = self.last_in[c];
            let mut last_out = self.last_out[c];

            for sample in buffer.channel_mut(c) {
                let out = *sample - last_in + self.r * last_out;
                last_in = *sample;
                last_out = out;
                *sample = out;
            }
            self.last_in[c] = last_in;
            self.last_out[c] = last_out;
        }

        if is_mono_source {
            buffer.apply_mono_source();
        }
    }

    fn reset(&mut self) {
        self.last_in.fill(0.0);
        self.last_out.fill(0.0);
    }

    fn name(&self) -> &'static str {
        "DcOffsetFilter"
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
