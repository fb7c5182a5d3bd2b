//! Linear gain stage

use std::any::Any;

use crate::buffer::AudioBuffer;
use crate::processor::AudioProcessor;

/// Highest accepted gain (+12 dB)
pub const MAX_GAIN: f32 = 4.0;

pub struct Gain {
    amount: f32,
}

impl Gain {
    pub fn new(amount: f32) -> Self {
        Self {
            amount: amount.clamp(0.0, MAX_GAIN),
        }
    }

    pub fn amount(&self) -> f32 {
        self.amount
    }

    pub fn set_amount(&mut self, amount: f32) {
        self.amount = amount.clamp(0.0, MAX_GAIN);
    }
}

impl AudioProcessor for Gain {
    fn process(&mut self, buffer: &mut AudioBuffer, _is_mono_source: bool) {
        if self.amount != 1.0 {
            buffer.adjust_buffer_volumes(self.amount);
        }
    }

    fn reset(&mut self) {}

    fn name(&self) -> &'static str {
        "Gain"
    }

    fn is_cacheable(&self) -> bool {
        true
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gain_clamping() {
        assert_eq!(Gain::new(-1.0).amount(), 0.0);
        assert_eq!(Gain::new(10.0).amount(), MAX_GAIN);
    }

    #[test]
    fn test_gain_scales_all_channels() {
        let mut gain = Gain::new(2.0);
        let mut buffer = AudioBuffer::new(2, 4).unwrap();
        buffer.channel_mut(0).fill(0.25);
        buffer.channel_mut(1).fill(-0.1);
        gain.process(&mut buffer, false);

        assert_eq!(buffer.channel(0)[3], 0.5);
        assert!((buffer.channel(1)[0] + 0.2).abs() < 1e-6);
    }
}
