//! Flanger
//!
//! A short modulated delay mixed back onto the dry signal. All parameters
//! are normalized (0.0 - 1.0):
//! - `rate` maps onto a 0.05 Hz - 9.55 Hz triangle sweep along a log curve
//! - `width` is the sweep depth, up to 10 ms (off below 0.05)
//! - `delay` is the base delay, 0 - 10 ms on top of a one sample minimum
//! - `feedback` feeds the delayed signal back into the line
//! - `mix` is the wet level
//!
//! Delay and mix are smoothed per sample so automation does not zipper.
//! The delay lines hold 200 ms, more than the longest possible delay.

use std::any::Any;

use crate::buffer::AudioBuffer;
use crate::processor::AudioProcessor;
use crate::processors::dynamics::EnvelopeDetector;
use crate::volume::{cap_param, cap_sample, MAX_OUTPUT};

/// Widths at or below this value disable the sweep
const MIN_WIDTH: f32 = 0.05;

/// Smoothing time of delay and mix, a 20 Hz one-pole
const SMOOTHING_MS: f32 = 7.96;

pub struct Flanger {
    sample_rate: f32,
    rate: f32,
    width: f32,
    feedback: f32,
    delay: f32,
    mix: f32,

    /// Samples per unit of `width`/`delay`, 10 ms worth
    unit_samples: f32,
    sweep_samples: f32,
    sweep: f32,
    step: f32,

    smoother: EnvelopeDetector,
    smoothed_delay: f64,
    smoothed_mix: f64,

    lines: Vec<Vec<f32>>,
    last: Vec<f32>,
    write: usize,
}

impl Flanger {
    pub fn new(
        rate: f32,
        width: f32,
        feedback: f32,
        delay: f32,
        mix: f32,
        channels: usize,
        sample_rate: f32,
    ) -> Self {
        let length = ((sample_rate / 5.0) as usize).max(4);
        let mut flanger = Self {
            sample_rate,
            rate: 0.0,
            width: 0.0,
            feedback: 0.0,
            delay: cap_param(delay),
            mix: cap_param(mix),
            unit_samples: sample_rate * 0.01,
            sweep_samples: 0.0,
            sweep: 0.0,
            step: 0.0,
            smoother: EnvelopeDetector::new(SMOOTHING_MS, sample_rate),
            smoothed_delay: cap_param(delay) as f64,
            smoothed_mix: cap_param(mix) as f64,
            lines: vec![vec![0.0; length]; channels.max(1)],
            last: vec![0.0; channels.max(1)],
            write: 0,
        };
        flanger.set_rate(rate);
        flanger.set_width(width);
        flanger.set_feedback(feedback);
        flanger
    }

    pub fn rate(&self) -> f32 {
        self.rate
    }

    pub fn set_rate(&mut self, rate: f32) {
        self.rate = cap_param(rate);
        self.update_sweep();
    }

    /// Sweep frequency in Hz
    pub fn sweep_rate(&self) -> f32 {
        (10.0_f32.powf(self.rate) - 1.0) * 1.05556 + 0.05
    }

    pub fn width(&self) -> f32 {
        self.width
    }

    pub fn set_width(&mut self, width: f32) {
        self.width = cap_param(width);
        self.sweep_samples = if self.width <= MIN_WIDTH {
            0.0
        } else {
            self.width * self.unit_samples
        };
        self.update_sweep();
    }

    pub fn feedback(&self) -> f32 {
        self.feedback
    }

    pub fn set_feedback(&mut self, feedback: f32) {
        self.feedback = feedback.clamp(0.0, MAX_OUTPUT);
    }

    pub fn delay(&self) -> f32 {
        self.delay
    }

    pub fn set_delay(&mut self, delay: f32) {
        self.delay = cap_param(delay);
    }

    pub fn mix(&self) -> f32 {
        self.mix
    }

    pub fn set_mix(&mut self, mix: f32) {
        self.mix = cap_param(mix);
    }

    fn update_sweep(&mut self) {
        self.step = self.sweep_samples * 2.0 * self.sweep_rate() / self.sample_rate;
        self.sweep = 0.0;
    }

    /// Advance the triangle sweep by one sample
    #[inline]
    fn advance_sweep(&mut self) {
        if self.step == 0.0 {
            return;
        }
        self.sweep += self.step;
        if self.sweep <= 0.0 {
            self.sweep = 0.0;
            self.step = -self.step;
        } else if self.sweep >= self.sweep_samples {
            self.sweep = self.sweep_samples;
            self.step = -self.step;
        }
    }
}

impl AudioProcessor for Flanger {
    fn process(&mut self, buffer: &mut AudioBuffer, is_mono_source: bool) {
        let channels = if is_mono_source {
            1
        } else {
            buffer.amount_of_channels().min(self.lines.len())
        };
        let length = self.lines[0].len();

        for i in 0..buffer.buffer_size() {
            self.smoother.run(self.delay as f64, &mut self.smoothed_delay);
            self.smoother.run(self.mix as f64, &mut self.smoothed_mix);
            let mix = self.smoothed_mix as f32;

            // at least one sample behind the write head
            let delay = self.smoothed_delay as f32 * self.unit_samples + 1.0 + self.sweep;
            let mut read = self.write as f32 - delay;
            if read < 0.0 {
                read += length as f32;
            }
            let first = (read as usize) % length;
            let second = (first + 1) % length;
            let fraction = read - read.floor();

            for c in 0..channels {
                let line = &mut self.lines[c];
                let sample = &mut buffer.channel_mut(c)[i];
                let dry = *sample;

                line[self.write] = dry + self.feedback * self.last[c];
                let wet = line[first] * (1.0 - fraction) + line[second] * fraction;
                self.last[c] = wet;
                *sample = cap_sample(dry + mix * wet);
            }

            self.write = (self.write + 1) % length;
            self.advance_sweep();
        }

        if is_mono_source {
            buffer.apply_mono_source();
        }
    }

    fn reset(&mut self) {
        for line in &mut self.lines {
            line.fill(0.0);
        }
        self.last.fill(0.0);
        self.write = 0;
        self.update_sweep();
    }

    fn name(&self) -> &'static str {
        "Flanger"
    }

    fn added_duration_in_samples(&self) -> usize {
        (self.unit_samples * (1.0 + self.delay) + 1.0).ceil() as usize
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn impulse(channels: usize, size: usize) -> AudioBuffer {
        let mut buffer = AudioBuffer::new(channels, size).unwrap();
        for c in 0..channels {
            buffer.channel_mut(c)[0] = 0.5;
        }
        buffer
    }

    #[test]
    fn test_rate_mapping() {
        let mut flanger = Flanger::new(0.0, 0.5, 0.0, 0.5, 0.5, 2, 44100.0);
        assert!((flanger.sweep_rate() - 0.05).abs() < 1e-6);
        flanger.set_rate(1.0);
        assert!((flanger.sweep_rate() - 9.55).abs() < 0.01);
    }

    #[test]
    fn test_static_delay_echoes_one_sample_late() {
        // no sweep, no base delay: the wet path lags by one sample
        let mut flanger = Flanger::new(0.0, 0.0, 0.0, 0.0, 1.0, 1, 44100.0);
        let mut buffer = impulse(1, 8);
        flanger.process(&mut buffer, false);

        let out = buffer.channel(0);
        assert_eq!(out[0], 0.5);
        assert!((out[1] - 0.5).abs() < 1e-6);
        assert!(out[2..].iter().all(|s| s.abs() < 1e-6));
    }

    #[test]
    fn test_dry_only_when_mix_is_zero() {
        let mut flanger = Flanger::new(0.5, 0.8, 0.5, 0.3, 0.0, 2, 44100.0);
        let mut buffer = AudioBuffer::new(2, 128).unwrap();
        for c in 0..2 {
            for (i, s) in buffer.channel_mut(c).iter_mut().enumerate() {
                *s = (i as f32 * 0.1).sin() * 0.5;
            }
        }
        let dry = buffer.clone();
        flanger.process(&mut buffer, false);
        for (a, b) in buffer.channel(0).iter().zip(dry.channel(0)) {
            assert!((a - b).abs() < 1e-6);
        }
    }

    #[test]
    fn test_sweep_stays_in_range() {
        let mut flanger = Flanger::new(1.0, 1.0, 0.9, 1.0, 1.0, 2, 44100.0);
        for _ in 0..100 {
            let mut buffer = impulse(2, 512);
            flanger.process(&mut buffer, false);
            assert!(buffer.peak() <= 1.0);
            assert!(flanger.sweep >= 0.0 && flanger.sweep <= flanger.sweep_samples);
        }
    }

    #[test]
    fn test_parameters_clamped() {
        let mut flanger = Flanger::new(2.0, -1.0, 3.0, 2.0, 2.0, 1, 44100.0);
        assert_eq!(flanger.rate(), 1.0);
        assert_eq!(flanger.width(), 0.0);
        assert_eq!(flanger.feedback(), MAX_OUTPUT);
        assert_eq!(flanger.delay(), 1.0);
        assert_eq!(flanger.mix(), 1.0);

        flanger.set_width(0.04);
        assert_eq!(flanger.step, 0.0);
    }

    #[test]
    fn test_reset_clears_lines() {
        let mut flanger = Flanger::new(0.0, 0.0, 0.5, 0.0, 1.0, 2, 44100.0);
        let mut buffer = impulse(2, 4);
        flanger.process(&mut buffer, false);
        flanger.reset();

        let mut silent = AudioBuffer::new(2, 64).unwrap();
        flanger.process(&mut silent, true);
        assert!(silent.is_silent());
    }
}
