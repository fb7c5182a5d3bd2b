//! Peak Limiter
//!
//! Feed-forward peak limiter with a selectable soft or hard knee, derived
//! from the classic normalized-parameter limiter design.
//!
//! # Algorithm
//!
//! For every frame the cross-channel peak `max(|l|, |r|)` drives a one-pole
//! gain smoother:
//! - Soft knee: the target gain is `1 / (1 + th * peak)`, a curve that starts
//!   reducing gently well below the threshold
//! - Hard knee: the gain only drops while `gain * peak` exceeds the threshold
//!   and relaxes back toward unity otherwise
//!
//! The attack coefficient is used while reduction increases, the release
//! coefficient while it decreases. The output is `sample * trim * gain`.
//!
//! # Units
//!
//! Attack and release are stored normalized (0.0 - 1.0). They map onto
//! microseconds and milliseconds through exact, invertible formulas at the
//! limiter's sample rate. The conversions run in `f64` so the round trip
//! stays within rounding error.

use std::any::Any;

use crate::buffer::AudioBuffer;
use crate::processor::AudioProcessor;
use crate::volume::{cap_param, linear_to_db};

/// Lowest selectable threshold
pub const MIN_THRESHOLD_DB: f32 = -40.0;

/// Highest selectable threshold
pub const MAX_THRESHOLD_DB: f32 = 0.0;

/// Fixed output trim (normalized), roughly +4 dB of make-up gain
const TRIM: f64 = 0.60;

/// Gain above which the limiter is considered at rest
const REST_GAIN: f32 = 0.9999;

/// Constants of the attack/release time formulas
const ATTACK_SCALE: f64 = 301_030.1;
const RELEASE_SCALE: f64 = 301.0301;

/// Normalized attack (0.0 - 1.0) to microseconds
pub fn attack_to_microseconds(attack: f32, sample_rate: f32) -> f64 {
    let coefficient = 10.0_f64.powf(-2.0 * attack as f64);
    -ATTACK_SCALE / (sample_rate as f64 * (1.0 - coefficient).log10())
}

/// Microseconds to normalized attack (0.0 - 1.0)
pub fn microseconds_to_attack(microseconds: f64, sample_rate: f32) -> f32 {
    let coefficient = 1.0 - 10.0_f64.powf(-ATTACK_SCALE / (microseconds * sample_rate as f64));
    (-coefficient.log10() / 2.0).clamp(0.0, 1.0) as f32
}

/// Normalized release (0.0 - 1.0) to milliseconds
pub fn release_to_milliseconds(release: f32, sample_rate: f32) -> f64 {
    let coefficient = 10.0_f64.powf(-2.0 - 3.0 * release as f64);
    -RELEASE_SCALE / (sample_rate as f64 * (1.0 - coefficient).log10())
}

/// Milliseconds to normalized release (0.0 - 1.0)
pub fn milliseconds_to_release(milliseconds: f64, sample_rate: f32) -> f32 {
    let coefficient = 1.0 - 10.0_f64.powf(-RELEASE_SCALE / (milliseconds * sample_rate as f64));
    ((-coefficient.log10() - 2.0) / 3.0).clamp(0.0, 1.0) as f32
}

/// Soft/hard knee peak limiter
#[derive(Debug, Clone)]
pub struct Limiter {
    sample_rate: f32,

    // normalized parameters
    attack: f32,
    release: f32,
    threshold: f32,
    soft_knee: bool,

    // derived per-sample coefficients
    attack_coefficient: f32,
    release_coefficient: f32,
    knee_threshold: f32,
    trim: f32,

    /// Current linear gain, 1.0 when idle
    gain: f32,
}

impl Limiter {
    /// Create a soft knee limiter with the default response
    pub fn new(sample_rate: f32) -> Self {
        Self::with_params(0.15, 0.50, 0.60, true, sample_rate)
    }

    /// Create a limiter from normalized attack, release and threshold
    pub fn with_params(
        attack: f32,
        release: f32,
        threshold: f32,
        soft_knee: bool,
        sample_rate: f32,
    ) -> Self {
        let mut limiter = Self {
            sample_rate,
            attack: cap_param(attack),
            release: cap_param(release),
            threshold: cap_param(threshold),
            soft_knee,
            attack_coefficient: 0.0,
            release_coefficient: 0.0,
            knee_threshold: 0.0,
            trim: 0.0,
            gain: 1.0,
        };
        limiter.recalculate();
        limiter
    }

    fn recalculate(&mut self) {
        let threshold = self.threshold as f64;
        self.knee_threshold = if self.soft_knee {
            10.0_f64.powf(1.0 - 2.0 * threshold) as f32
        } else {
            10.0_f64.powf(2.0 * threshold - 2.0) as f32
        };
        self.trim = 10.0_f64.powf(2.0 * TRIM - 1.0) as f32;
        self.attack_coefficient = 10.0_f64.powf(-2.0 * self.attack as f64) as f32;
        self.release_coefficient = 10.0_f64.powf(-2.0 - 3.0 * self.release as f64) as f32;
    }

    pub fn attack(&self) -> f32 {
        self.attack
    }

    pub fn set_attack(&mut self, attack: f32) {
        self.attack = cap_param(attack);
        self.recalculate();
    }

    pub fn attack_microseconds(&self) -> f64 {
        attack_to_microseconds(self.attack, self.sample_rate)
    }

    pub fn set_attack_microseconds(&mut self, microseconds: f64) {
        self.set_attack(microseconds_to_attack(microseconds, self.sample_rate));
    }

    pub fn release(&self) -> f32 {
        self.release
    }

    pub fn set_release(&mut self, release: f32) {
        self.release = cap_param(release);
        self.recalculate();
    }

    pub fn release_milliseconds(&self) -> f64 {
        release_to_milliseconds(self.release, self.sample_rate)
    }

    pub fn set_release_milliseconds(&mut self, milliseconds: f64) {
        self.set_release(milliseconds_to_release(milliseconds, self.sample_rate));
    }

    /// Normalized threshold, 0.0 maps to `MIN_THRESHOLD_DB`, 1.0 to `MAX_THRESHOLD_DB`
    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn set_threshold(&mut self, threshold: f32) {
        self.threshold = cap_param(threshold);
        self.recalculate();
    }

    pub fn threshold_db(&self) -> f32 {
        MIN_THRESHOLD_DB + self.threshold * (MAX_THRESHOLD_DB - MIN_THRESHOLD_DB)
    }

    /// Set the threshold in dB, clamped to `MIN_THRESHOLD_DB..=MAX_THRESHOLD_DB`
    pub fn set_threshold_db(&mut self, db: f32) {
        let db = db.clamp(MIN_THRESHOLD_DB, MAX_THRESHOLD_DB);
        self.set_threshold((db - MIN_THRESHOLD_DB) / (MAX_THRESHOLD_DB - MIN_THRESHOLD_DB));
    }

    pub fn soft_knee(&self) -> bool {
        self.soft_knee
    }

    pub fn set_soft_knee(&mut self, soft_knee: bool) {
        self.soft_knee = soft_knee;
        self.recalculate();
    }

    /// Current gain reduction as a linear factor (1.0 = no reduction)
    pub fn gain_reduction(&self) -> f32 {
        self.gain.min(1.0)
    }

    /// Current gain reduction in dB (0.0 = no reduction)
    pub fn gain_reduction_db(&self) -> f32 {
        linear_to_db(self.gain_reduction())
    }

    /// Advance the gain smoother by one frame with peak level `peak`
    #[inline]
    fn update_gain(&mut self, peak: f32) {
        let th = self.knee_threshold;
        let g = self.gain;

        self.gain = if self.soft_knee {
            let target = 1.0 / (1.0 + th * peak);
            if g > target {
                g - self.attack_coefficient * (g - target)
            } else {
                g + self.release_coefficient * (target - g)
            }
        } else {
            let level = g * peak;
            if level > th {
                // large overshoots would push the gain through zero
                (g - self.attack_coefficient * (level - th)).clamp(0.0, 1.0)
            } else {
                g + self.release_coefficient * (1.0 - g)
            }
        };
    }
}

impl AudioProcessor for Limiter {
    fn process(&mut self, buffer: &mut AudioBuffer, is_mono_source: bool) {
        // Nothing to release from and nothing to limit
        if self.gain > REST_GAIN && buffer.is_silent() {
            return;
        }

        let mono = is_mono_source || buffer.is_mono();
        let (left, right) = buffer.stereo_mut();

        match right {
            Some(right) if !mono => {
                for (l, r) in left.iter_mut().zip(right.iter_mut()) {
                    self.update_gain(l.abs().max(r.abs()));
                    let amp = self.trim * self.gain;
                    *l *= amp;
                    *r *= amp;
                }
            }
            right => {
                for l in left.iter_mut() {
                    self.update_gain(l.abs());
                    *l *= self.trim * self.gain;
                }
                if let Some(right) = right {
                    right.copy_from_slice(left);
                }
            }
        }
    }

    fn reset(&mut self) {
        self.gain = 1.0;
    }

    fn name(&self) -> &'static str {
        "Limiter"
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
