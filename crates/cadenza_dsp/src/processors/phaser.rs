//! Phaser
//!
//! Six first-order allpass stages swept by a sine LFO between a minimum and
//! maximum frequency. The cascade output is fed back into its input and
//! added onto the dry signal at `depth`.
//!
//! The LFO is shared by all channels; every channel owns its allpass state.

use std::any::Any;
use std::f32::consts::TAU;

use crate::buffer::AudioBuffer;
use crate::processor::AudioProcessor;
use crate::volume::{cap_param, MAX_OUTPUT};

/// Amount of allpass stages in the cascade
pub const STAGES: usize = 6;

#[derive(Debug, Clone, Copy, Default)]
struct ChannelState {
    stages: [f32; STAGES],
    feedback: f32,
}

impl ChannelState {
    /// Run one sample through the cascade with allpass coefficient `a1`
    #[inline]
    fn run(&mut self, input: f32, a1: f32, feedback: f32) -> f32 {
        let mut x = input + self.feedback * feedback;
        for z in &mut self.stages {
            let y = x * -a1 + *z;
            *z = y * a1 + x;
            x = y;
        }
        self.feedback = x;
        x
    }
}

pub struct Phaser {
    sample_rate: f32,
    rate: f32,
    feedback: f32,
    depth: f32,
    /// Sweep bounds as fractions of Nyquist
    min: f32,
    max: f32,
    lfo_phase: f32,
    lfo_increment: f32,
    states: Vec<ChannelState>,
}

impl Phaser {
    /// Create a phaser with an LFO `rate` in Hz, sweeping between
    /// `min_frequency` and `max_frequency`
    pub fn new(
        rate: f32,
        feedback: f32,
        depth: f32,
        min_frequency: f32,
        max_frequency: f32,
        channels: usize,
        sample_rate: f32,
    ) -> Self {
        let mut phaser = Self {
            sample_rate,
            rate: 0.0,
            feedback: 0.0,
            depth: 0.0,
            min: 0.0,
            max: 0.0,
            lfo_phase: 0.0,
            lfo_increment: 0.0,
            states: vec![ChannelState::default(); channels.max(1)],
        };
        phaser.set_rate(rate);
        phaser.set_feedback(feedback);
        phaser.set_depth(depth);
        phaser.set_range(min_frequency, max_frequency);
        phaser
    }

    pub fn rate(&self) -> f32 {
        self.rate
    }

    /// LFO rate in Hz
    pub fn set_rate(&mut self, rate: f32) {
        self.rate = rate.max(0.0);
        self.lfo_increment = TAU * self.rate / self.sample_rate;
    }

    pub fn feedback(&self) -> f32 {
        self.feedback
    }

    pub fn set_feedback(&mut self, feedback: f32) {
        self.feedback = feedback.clamp(0.0, MAX_OUTPUT);
    }

    pub fn depth(&self) -> f32 {
        self.depth
    }

    pub fn set_depth(&mut self, depth: f32) {
        self.depth = cap_param(depth);
    }

    /// Sweep range in Hz, both ends kept between 0 and Nyquist
    pub fn set_range(&mut self, min_frequency: f32, max_frequency: f32) {
        let nyquist = self.sample_rate / 2.0;
        let low = min_frequency.clamp(0.0, nyquist);
        let high = max_frequency.clamp(0.0, nyquist);
        self.min = low.min(high) / nyquist;
        self.max = low.max(high) / nyquist;
    }

    pub fn range(&self) -> (f32, f32) {
        let nyquist = self.sample_rate / 2.0;
        (self.min * nyquist, self.max * nyquist)
    }

    /// Allpass coefficient for the current LFO position, then advance it
    #[inline]
    fn next_coefficient(&mut self) -> f32 {
        let d = self.min + (self.max - self.min) * ((self.lfo_phase.sin() + 1.0) / 2.0);
        self.lfo_phase += self.lfo_increment;
        if self.lfo_phase >= TAU {
            self.lfo_phase -= TAU;
        }
        (1.0 - d) / (1.0 + d)
    }
}

impl AudioProcessor for Phaser {
    fn process(&mut self, buffer: &mut AudioBuffer, is_mono_source: bool) {
        let channels = if is_mono_source {
            1
        } else {
            buffer.amount_of_channels().min(self.states.len())
        };

        for i in 0..buffer.buffer_size() {
            let a1 = self.next_coefficient();
            for c in 0..channels {
                let sample = &mut buffer.channel_mut(c)[i];
                let wet = self.states[c].run(*sample, a1, self.feedback);
                *sample += wet * self.depth;
            }
        }

        if is_mono_source {
            buffer.apply_mono_source();
        }
    }

    fn reset(&mut self) {
        self.states.fill(ChannelState::default());
        self.lfo_phase = 0.0;
    }

    fn name(&self) -> &'static str {
        "Phaser"
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
