//! Compressor
//!
//! Feed-forward compressor working in the dB domain. The overshoot above the
//! threshold is smoothed by an attack/release detector and turned into a gain
//! of `overshoot * (ratio - 1)` dB. Ratios below 1.0 compress (0.25 is 4:1),
//! ratios above 1.0 expand.

use std::any::Any;

use crate::buffer::AudioBuffer;
use crate::processor::AudioProcessor;
use crate::processors::dynamics::AttackRelease;
use crate::volume::DC_OFFSET;

/// Lowest selectable threshold
pub const MIN_THRESHOLD_DB: f32 = -40.0;

/// Highest selectable threshold
pub const MAX_THRESHOLD_DB: f32 = 20.0;

pub struct Compressor {
    detector: AttackRelease,
    threshold_db: f32,
    ratio: f32,
    /// Smoothed overshoot in dB (offset by `DC_OFFSET`)
    envelope_db: f64,
}

impl Compressor {
    /// Create a compressor with 10 ms attack, 100 ms release, 0 dB
    /// threshold and a neutral ratio of 1.0
    pub fn new(sample_rate: f32) -> Self {
        Self {
            detector: AttackRelease::new(10.0, 100.0, sample_rate),
            threshold_db: 0.0,
            ratio: 1.0,
            envelope_db: DC_OFFSET as f64,
        }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold_db
    }

    /// Set the threshold in dB, clamped to `MIN_THRESHOLD_DB..=MAX_THRESHOLD_DB`
    pub fn set_threshold(&mut self, db: f32) {
        self.threshold_db = db.clamp(MIN_THRESHOLD_DB, MAX_THRESHOLD_DB);
    }

    pub fn ratio(&self) -> f32 {
        self.ratio
    }

    /// Set the ratio, negative values clamp to 0
    pub fn set_ratio(&mut self, ratio: f32) {
        self.ratio = ratio.max(0.0);
    }

    pub fn attack(&self) -> f32 {
        self.detector.attack()
    }

    pub fn set_attack(&mut self, attack_ms: f32) {
        self.detector.set_attack(attack_ms);
    }

    pub fn release(&self) -> f32 {
        self.detector.release()
    }

    pub fn set_release(&mut self, release_ms: f32) {
        self.detector.set_release(release_ms);
    }

    /// Gain applied for a frame whose louder channel is `key`
    #[inline]
    fn next_gain(&mut self, key: f32) -> f32 {
        let dc = DC_OFFSET as f64;
        let key_db = 20.0 * (key as f64 + dc).log10();
        let overshoot = (key_db - self.threshold_db as f64).max(0.0) + dc;

        self.detector.run(overshoot, &mut self.envelope_db);

        let gain_db = (self.envelope_db - dc) * (self.ratio as f64 - 1.0);
        10.0_f64.powf(gain_db / 20.0) as f32
    }
}

impl AudioProcessor for Compressor {
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
        self.envelope_db = DC_OFFSET as f64;
    }

    fn name(&self) -> &'static str {
        "Compressor"
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
