//! Noise Gate
//!
//! Mutes the signal while its louder channel stays below the threshold.
//! The open/closed key is smoothed with the same attack/release detector
//! the compressor uses, so the gate fades instead of clicking.

use std::any::Any;

use crate::buffer::AudioBuffer;
use crate::processor::AudioProcessor;
use crate::processors::compressor::{MAX_THRESHOLD_DB, MIN_THRESHOLD_DB};
use crate::processors::dynamics::AttackRelease;
use crate::volume::{db_to_linear, DC_OFFSET};

pub struct Gate {
    detector: AttackRelease,
    threshold_db: f32,
    threshold_linear: f32,
    envelope: f64,
}

impl Gate {
    /// Create a gate with 1 ms attack and 100 ms release
    pub fn new(threshold_db: f32, sample_rate: f32) -> Self {
        let mut gate = Self {
            detector: AttackRelease::new(1.0, 100.0, sample_rate),
            threshold_db: 0.0,
            threshold_linear: 1.0,
            envelope: DC_OFFSET as f64,
        };
        gate.set_threshold(threshold_db);
        gate
    }

    pub fn threshold(&self) -> f32 {
        self.threshold_db
    }

    /// Set the threshold in dB, clamped to the compressor's threshold range
    pub fn set_threshold(&mut self, db: f32) {
        self.threshold_db = db.clamp(MIN_THRESHOLD_DB, MAX_THRESHOLD_DB);
        self.threshold_linear = db_to_linear(self.threshold_db);
    }

    pub fn set_attack(&mut self, attack_ms: f32) {
        self.detector.set_attack(attack_ms);
    }

    pub fn set_release(&mut self, release_ms: f32) {
        self.detector.set_release(release_ms);
    }

    #[inline]
    fn next_gain(&mut self, key: f32) -> f32 {
        let dc = DC_OFFSET as f64;
        let open = if key > self.threshold_linear { 1.0 } else { 0.0 };
        self.detector.run(open + dc, &mut self.envelope);
        (self.envelope - dc) as f32
    }
}

impl AudioProcessor for Gate {
    fn process(&mut self, buffer: &mut AudioBuffer, is_mono_source: bool) {
        let mono = is_mono_source || buffer.is_mono();
        let (left, right) = buffer.stereo_mut();

        match right {
            Some(right) if !mono => {
                for (l, r) in left.iter_mut().zip(right.iter_mut()) {
                    let gain = self.next_gain(l.abs().max(r.abs()));
                    *l *= gain;
                    *r *= gain;
                }
            }
            right => {
                for l in left.iter_mut() {
                    *l *= self.next_gain(l.abs());
                }
                if let Some(right) = right {
                    right.copy_from_slice(left);
                }
            }
        }
    }

    fn reset(&mut self) {
        self.envelope = DC_OFFSET as f64;
    }

    fn name(&self) -> &'static str {
        "Gate"
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn constant(value: f32, size: usize) -> AudioBuffer {
        let mut buffer = AudioBuffer::new(2, size).unwrap();
        buffer.channel_mut(0).fill(value);
        buffer.channel_mut(1).fill(value);
        buffer
    }

    #[test]
    fn test_signal_below_threshold_is_muted() {
        let mut gate = Gate::new(-20.0, 48000.0);
        let mut buffer = constant(0.01, 256);
        gate.process(&mut buffer, false);
        assert!(buffer.channel(0).iter().all(|s| s.abs() < 1e-6));
    }

    #[test]
    fn test_signal_above_threshold_opens() {
        let mut gate = Gate::new(-20.0, 48000.0);
        // 1 ms attack, after 10 ms the gate is fully open
        let mut buffer = constant(0.5, 480);
        gate.process(&mut buffer, false);

        let last = buffer.channel(1)[479];
        assert!((last - 0.5).abs() < 0.001, "last sample {}", last);
        // the first samples fade in
        assert!(buffer.channel(0)[0] < 0.5);
    }

    #[test]
    fn test_threshold_clamping() {
        let mut gate = Gate::new(-90.0, 48000.0);
        assert_eq!(gate.threshold(), MIN_THRESHOLD_DB);

        gate.set_threshold(30.0);
        assert_eq!(gate.threshold(), MAX_THRESHOLD_DB);

        gate.set_threshold(-12.0);
        assert_eq!(gate.threshold(), -12.0);
    }

    #[test]
    fn test_gate_closes_slowly() {
        let mut gate = Gate::new(-20.0, 48000.0);
        let mut open = constant(0.5, 480);
        gate.process(&mut open, false);

        let mut quiet = constant(0.05, 480);
        gate.process(&mut quiet, false);
        // 10 ms into a 100 ms release, still mostly open
        assert!(quiet.channel(0)[479] > 0.04);

        gate.reset();
        let mut after_reset = constant(0.05, 16);
        gate.process(&mut after_reset, false);
        assert!(after_reset.channel(0)[15].abs() < 1e-6);
    }
}
