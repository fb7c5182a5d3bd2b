//! Feedback Delay
//!
//! One circular delay line per channel. Each line is allocated for the
//! maximum delay time up front; changing the delay time only moves the
//! wrap point.

use std::any::Any;

use crate::buffer::AudioBuffer;
use crate::processor::AudioProcessor;
use crate::units::milliseconds_to_buffer;
use crate::volume::{cap_param, MAX_OUTPUT};

pub struct Delay {
    sample_rate: f32,
    lines: Vec<Vec<f32>>,
    indices: Vec<usize>,
    /// Current delay in samples, at least 1
    time: usize,
    max_time: usize,
    mix: f32,
    feedback: f32,
}

impl Delay {
    /// Create a delay of `delay_ms` (capped at `max_delay_ms`) for
    /// `channels` channels
    pub fn new(
        delay_ms: f32,
        max_delay_ms: f32,
        mix: f32,
        feedback: f32,
        channels: usize,
        sample_rate: f32,
    ) -> Self {
        let max_time = milliseconds_to_buffer(max_delay_ms, sample_rate).max(1);
        let mut delay = Self {
            sample_rate,
            lines: vec![vec![0.0; max_time]; channels.max(1)],
            indices: vec![0; channels.max(1)],
            time: 1,
            max_time,
            mix: cap_param(mix),
            feedback: feedback.clamp(0.0, MAX_OUTPUT),
        };
        delay.set_delay_time(delay_ms);
        delay
    }

    /// Delay time in milliseconds
    pub fn delay_time(&self) -> f32 {
        self.time as f32 / (self.sample_rate / 1000.0)
    }

    pub fn delay_samples(&self) -> usize {
        self.time
    }

    /// Set the delay time, capped at the maximum given at construction
    pub fn set_delay_time(&mut self, delay_ms: f32) {
        let samples = (delay_ms.max(0.0) * self.sample_rate / 1000.0).round() as usize;
        self.time = samples.clamp(1, self.max_time);

        for index in &mut self.indices {
            if *index >= self.time {
                *index = 0;
            }
        }
    }

    pub fn mix(&self) -> f32 {
        self.mix
    }

    pub fn set_mix(&mut self, mix: f32) {
        self.mix = cap_param(mix);
    }

    pub fn feedback(&self) -> f32 {
        self.feedback
    }

    /// Set the feedback, clamped below unity so echoes always decay
    pub fn set_feedback(&mut self, feedback: f32) {
        self.feedback = feedback.clamp(0.0, MAX_OUTPUT);
    }

    /// Wet level, pulled back at high feedback to limit build-up
    fn wet_level(&self) -> f32 {
        if self.feedback > 0.5 {
            self.mix * (1.5 - self.feedback)
        } else {
            self.mix
        }
    }
}

impl AudioProcessor for Delay {
    fn process(&mut self, buffer: &mut AudioBuffer, is_mono_source: bool) {
        let wet = self.wet_level();
        let channels = if is_mono_source {
            1
        } else {
            buffer.amount_of_channels().min(self.lines.len())
        };

        for c in 0..channels {
            let line = &mut self.lines[c][..self.time];
            let mut index = self.indices[c];

            for sample in buffer.channel_mut(c) {
                let delayed = line[index];
                line[index] = *sample + delayed * self.feedback;
                *sample += delayed * wet;
                index += 1;
                if index == self.time {
                    index = 0;
                }
            }
            self.indices[c] = index;
        }

        if is_mono_source {
            buffer.apply_mono_source();
        }
    }

    fn reset(&mut self) {
        for line in &mut self.lines {
            line.fill(0.0);
        }
        self.indices.fill(0);
    }

    fn name(&self) -> &'static str {
        "Delay"
    }

    fn added_duration_in_samples(&self) -> usize {
        if self.feedback <= 0.0 {
            return self.time;
        }
        // repeats until an echo has dropped by 60 dB
        let repeats = (-3.0 / self.feedback.log10()).ceil().max(1.0);
        self.time * repeats as usize
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
            buffer.channel_mut(c)[0] = 1.0;
        }
        buffer
    }

    #[test]
    fn test_delay_time_conversion_and_cap() {
        let mut delay = Delay::new(10.0, 100.0, 0.5, 0.0, 2, 48000.0);
        assert_eq!(delay.delay_samples(), 480);
        assert!((delay.delay_time() - 10.0).abs() < 1e-4);

        delay.set_delay_time(500.0);
        assert_eq!(delay.delay_samples(), 4800);
    }

    #[test]
    fn test_echo_at_delay_time() {
        // 1 ms at 8 kHz = 8 samples
        let mut delay = Delay::new(1.0, 10.0, 0.5, 0.0, 1, 8000.0);
        let mut buffer = impulse(1, 32);
        delay.process(&mut buffer, false);

        let out = buffer.channel(0);
        assert_eq!(out[0], 1.0);
        assert_eq!(out[8], 0.5);
        // no feedback: a single echo
        assert_eq!(out[16], 0.0);
        assert!(out[1..8].iter().all(|s| *s == 0.0));
    }

    #[test]
    fn test_feedback_repeats() {
        let mut delay = Delay::new(1.0, 10.0, 1.0, 0.5, 1, 8000.0);
        let mut buffer = impulse(1, 32);
        delay.process(&mut buffer, false);

        let out = buffer.channel(0);
        assert!((out[8] - 1.0).abs() < 1e-6);
        assert!((out[16] - 0.5).abs() < 1e-6);
        assert!((out[24] - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_high_feedback_reduces_wet_level() {
        let delay = Delay::new(1.0, 10.0, 1.0, 0.8, 1, 8000.0);
        assert!((delay.wet_level() - 0.7).abs() < 1e-6);

        let mut clamped = Delay::new(1.0, 10.0, 1.0, 0.0, 1, 8000.0);
        clamped.set_feedback(4.0);
        assert_eq!(clamped.feedback(), MAX_OUTPUT);
    }

    #[test]
    fn test_state_carries_across_buffers() {
        let mut delay = Delay::new(1.0, 10.0, 0.5, 0.0, 1, 8000.0);
        let mut first = impulse(1, 4);
        delay.process(&mut first, false);

        let mut second = AudioBuffer::new(1, 8).unwrap();
        delay.process(&mut second, false);
        assert_eq!(second.channel(0)[4], 0.5);
    }

    #[test]
    fn test_reset_clears_line() {
        let mut delay = Delay::new(1.0, 10.0, 0.5, 0.0, 1, 8000.0);
        let mut first = impulse(1, 4);
        delay.process(&mut first, false);
        delay.reset();

        let mut second = AudioBuffer::new(1, 16).unwrap();
        delay.process(&mut second, false);
        assert!(second.is_silent());
    }

    #[test]
    fn test_mono_source_copied_to_right() {
        let mut delay = Delay::new(1.0, 10.0, 0.5, 0.0, 2, 8000.0);
        let mut buffer = impulse(2, 16);
        delay.process(&mut buffer, true);
        assert_eq!(buffer.channel(0), buffer.channel(1));
        assert_eq!(buffer.channel(1)[8], 0.5);
    }

    #[test]
    fn test_tail_length() {
        let delay = Delay::new(1.0, 10.0, 0.5, 0.0, 1, 8000.0);
        assert_eq!(delay.added_duration_in_samples(), 8);

        let delay = Delay::new(1.0, 10.0, 0.5, 0.1, 1, 8000.0);
        assert_eq!(delay.added_duration_in_samples(), 24);
    }
}
