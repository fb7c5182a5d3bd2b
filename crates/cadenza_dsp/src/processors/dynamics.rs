//! Envelope Detection for Dynamics Processors
//!
//! Compressor and gate share the same smoothing structure: a pair of
//! one-pole filters, one used while the detected level rises (attack) and
//! one while it falls (release). State is kept in `f64` since detector
//! coefficients sit very close to 1.0 for long time constants.

/// One-pole smoothing filter with a time constant in milliseconds
#[derive(Debug, Clone, Copy)]
pub struct EnvelopeDetector {
    sample_rate: f32,
    time_ms: f32,
    coefficient: f64,
}

impl EnvelopeDetector {
    pub fn new(time_ms: f32, sample_rate: f32) -> Self {
        let mut detector = Self {
            sample_rate,
            time_ms: 0.0,
            coefficient: 0.0,
        };
        detector.set_time(time_ms);
        detector
    }

    /// Set the time constant, negative values clamp to 0 (instant)
    pub fn set_time(&mut self, time_ms: f32) {
        self.time_ms = time_ms.max(0.0);
        self.update_coefficient();
    }

    pub fn time(&self) -> f32 {
        self.time_ms
    }

    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.update_coefficient();
    }

    pub fn coefficient(&self) -> f64 {
        self.coefficient
    }

    fn update_coefficient(&mut self) {
        let samples = self.time_ms as f64 * self.sample_rate as f64 * 0.001;
        self.coefficient = if samples > 0.0 { (-1.0 / samples).exp() } else { 0.0 };
    }

    /// Move `state` one sample toward `input`
    #[inline]
    pub fn run(&self, input: f64, state: &mut f64) {
        *state = input + self.coefficient * (*state - input);
    }
}

/// Attack/release pair of envelope detectors
#[derive(Debug, Clone, Copy)]
pub struct AttackRelease {
    attack: EnvelopeDetector,
    release: EnvelopeDetector,
}

impl AttackRelease {
    pub fn new(attack_ms: f32, release_ms: f32, sample_rate: f32) -> Self {
        Self {
            attack: EnvelopeDetector::new(attack_ms, sample_rate),
            release: EnvelopeDetector::new(release_ms, sample_rate),
        }
    }

    pub fn set_attack(&mut self, attack_ms: f32) {
        self.attack.set_time(attack_ms);
    }

    pub fn attack(&self) -> f32 {
        self.attack.time()
    }

    pub fn set_release(&mut self, release_ms: f32) {
        self.release.set_time(release_ms);
    }

    pub fn release(&self) -> f32 {
        self.release.time()
    }

    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.attack.set_sample_rate(sample_rate);
        self.release.set_sample_rate(sample_rate);
    }

    /// Attack while the input rises above `state`, release otherwise
    #[inline]
    pub fn run(&self, input: f64, state: &mut f64) {
        if input > *state {
            self.attack.run(input, state);
        } else {
            self.release.run(input, state);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coefficient_matches_time_constant() {
        let detector = EnvelopeDetector::new(10.0, 44100.0);
        let expected = (-1000.0_f64 / (10.0 * 44100.0)).exp();
        assert!((detector.coefficient() - expected).abs() < 1e-12);
    }

    #[test]
    fn test_negative_time_is_instant() {
        let detector = EnvelopeDetector::new(-5.0, 44100.0);
        assert_eq!(detector.time(), 0.0);

        let mut state = 0.0;
        detector.run(0.8, &mut state);
        assert!((state - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_one_time_constant_reaches_63_percent() {
        let detector = EnvelopeDetector::new(1.0, 48000.0);
        let mut state = 0.0;
        for _ in 0..48 {
            detector.run(1.0, &mut state);
        }
        assert!((state - 0.632).abs() < 0.01, "state was {}", state);
    }

    #[test]
    fn test_attack_faster_than_release() {
        let smoother = AttackRelease::new(1.0, 100.0, 48000.0);
        let mut state = 0.0;
        for _ in 0..480 {
            smoother.run(1.0, &mut state);
        }
        assert!(state > 0.99);

        for _ in 0..480 {
            smoother.run(0.0, &mut state);
        }
        // 10 ms into a 100 ms release
        assert!(state > 0.85 && state < 0.95, "state was {}", state);
    }
}
