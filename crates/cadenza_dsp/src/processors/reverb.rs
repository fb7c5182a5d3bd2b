//! Ambience Reverb
//!
//! A small room reverb built from four allpass delay lines sharing a high
//! frequency damping filter. Each line is 1024 samples long; the read and
//! write positions wrap with a power-of-two mask.
//!
//! # Denormals
//!
//! Once the input stops, the damping filter decays toward zero and would
//! eventually produce denormal floats. When its magnitude drops below
//! `DENORMAL_THRESHOLD` it is snapped to zero and the delay lines are
//! cleared, once per silence episode.

use std::any::Any;

use crate::buffer::AudioBuffer;
use crate::processor::AudioProcessor;
use crate::volume::cap_param;

/// Length of each delay line (power of two)
const LINE_LENGTH: usize = 1024;
const LINE_MASK: usize = LINE_LENGTH - 1;

/// Base tap offsets of the four allpass lines, scaled by room size
const TAPS: [f32; 4] = [142.0, 277.0, 379.0, 107.0];

const FEEDBACK: f32 = 0.8;
const DENORMAL_THRESHOLD: f32 = 1.0e-10;

pub struct Reverb {
    lines: Box<[[f32; LINE_LENGTH]; 4]>,
    position: usize,

    // normalized parameters
    size_param: f32,
    hf_damp_param: f32,
    mix_param: f32,
    output_param: f32,

    // derived coefficients
    size: f32,
    damp: f32,
    dry: f32,
    wet: f32,

    /// Damping filter state
    filter: f32,
    /// False until the lines are cleared for the current size
    ready: bool,
    /// Set once the lines were cleared for the current silence episode
    silenced: bool,
    flush_count: u64,
}

impl Reverb {
    /// Create a reverb from normalized size, damping, mix and output level
    pub fn new(size: f32, hf_damp: f32, mix: f32, output: f32) -> Self {
        let mut reverb = Self {
            lines: Box::new([[0.0; LINE_LENGTH]; 4]),
            position: 0,
            size_param: cap_param(size),
            hf_damp_param: cap_param(hf_damp),
            mix_param: cap_param(mix),
            output_param: cap_param(output),
            size: 0.0,
            damp: 0.0,
            dry: 0.0,
            wet: 0.0,
            filter: 0.0,
            ready: false,
            silenced: false,
            flush_count: 0,
        };
        reverb.recalculate();
        reverb
    }

    fn recalculate(&mut self) {
        self.damp = 0.05 + 0.9 * self.hf_damp_param;

        let level = 10.0_f32.powf(2.0 * self.output_param - 1.0);
        self.dry = level - self.mix_param * self.mix_param * level;
        self.wet = 0.8 * self.mix_param * level;

        let size = 0.025 + 2.665 * self.size_param;
        if size != self.size {
            self.ready = false;
        }
        self.size = size;
    }

    pub fn size(&self) -> f32 {
        self.size_param
    }

    pub fn set_size(&mut self, value: f32) {
        let value = cap_param(value);
        if value != self.size_param {
            self.size_param = value;
            self.recalculate();
        }
    }

    pub fn hf_damp(&self) -> f32 {
        self.hf_damp_param
    }

    pub fn set_hf_damp(&mut self, value: f32) {
        let value = cap_param(value);
        if value != self.hf_damp_param {
            self.hf_damp_param = value;
            self.recalculate();
        }
    }

    pub fn mix(&self) -> f32 {
        self.mix_param
    }

    pub fn set_mix(&mut self, value: f32) {
        let value = cap_param(value);
        if value != self.mix_param {
            self.mix_param = value;
            self.recalculate();
        }
    }

    pub fn output(&self) -> f32 {
        self.output_param
    }

    pub fn set_output(&mut self, value: f32) {
        let value = cap_param(value);
        if value != self.output_param {
            self.output_param = value;
            self.recalculate();
        }
    }

    fn clear_lines(&mut self) {
        for line in self.lines.iter_mut() {
            line.fill(0.0);
        }
        self.ready = true;
        self.flush_count += 1;
    }
}

impl AudioProcessor for Reverb {
    fn process(&mut self, buffer: &mut AudioBuffer, _is_mono_source: bool) {
        if !self.ready {
            self.clear_lines();
        }

        let fb = FEEDBACK;
        let (dry, wet, damp) = (self.dry, self.wet, self.damp);
        let mut f = self.filter;
        let mut p = self.position;

        let mut taps = [0usize; 4];
        for (tap, base) in taps.iter_mut().zip(TAPS) {
            *tap = (p + (base * self.size) as usize) & LINE_MASK;
        }

        let lines = &mut self.lines;
        let (left, mut right) = buffer.stereo_mut();

        for i in 0..left.len() {
            let a = left[i];
            let b = right.as_ref().map_or(a, |r| r[i]);

            f += damp * (wet * (a + b) - f);
            let mut r = f;

            // three allpass stages feed the left output
            for stage in 0..3 {
                let t = lines[stage][p];
                r -= fb * t;
                lines[stage][taps[stage]] = r;
                r += t;
            }
            left[i] = dry * a + r - f;

            // the fourth stage feeds the right output
            let t = lines[3][p];
            r -= fb * t;
            lines[3][taps[3]] = r;
            r += t;
            if let Some(right) = right.as_mut() {
                right[i] = dry * b + r - f;
            }

            p = (p + 1) & LINE_MASK;
            for tap in taps.iter_mut() {
                *tap = (*tap + 1) & LINE_MASK;
            }
        }
        self.position = p;

        if f.abs() > DENORMAL_THRESHOLD {
            self.filter = f;
            self.silenced = false;
        } else {
            self.filter = 0.0;
            if !self.silenced {
                self.silenced = true;
                self.clear_lines();
            }
        }
    }

    fn reset(&mut self) {
        self.filter = 0.0;
        self.position = 0;
        self.clear_lines();
    }

    fn name(&self) -> &'static str {
        "Reverb"
    }

    fn added_duration_in_samples(&self) -> usize {
        LINE_LENGTH * 4
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
