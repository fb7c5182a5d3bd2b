//! Formant Filter
//!
//! Tenth-order all-pole filter shaping its input towards one of five
//! vowels. Works best on harmonically rich sources such as saw or square
//! waves. The coefficient sets are designed for 44.1 kHz.
//!
//! Feedback state is kept in `f64`; the poles sit too close to the unit
//! circle for single precision.

use std::any::Any;

use crate::buffer::AudioBuffer;
use crate::processor::AudioProcessor;

const ORDER: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Vowel {
    A,
    E,
    I,
    O,
    U,
}

impl Vowel {
    pub const ALL: [Vowel; 5] = [Vowel::A, Vowel::E, Vowel::I, Vowel::O, Vowel::U];

    /// Nearest vowel to a position in 0.0 (A) - 4.0 (U)
    pub fn from_position(position: f32) -> Self {
        let index = position.clamp(0.0, 4.0).round() as usize;
        Self::ALL[index.min(Self::ALL.len() - 1)]
    }

    fn coefficients(self) -> &'static [f64; ORDER + 1] {
        &COEFFICIENTS[self as usize]
    }
}

/// Input gain followed by the feedback taps, per vowel
const COEFFICIENTS: [[f64; ORDER + 1]; 5] = [
    [
        8.11044e-06, 8.943665402, -36.83889529, 92.01697887, -154.337906, 181.6233289,
        -151.8651235, 89.09614114, -35.10298511, 8.388101016, -0.923313471,
    ],
    [
        4.36215e-06, 8.90438318, -36.55179099, 91.05750846, -152.422234, 179.1170248,
        -149.6496211, 87.78352223, -34.60687431, 8.282228154, -0.914150747,
    ],
    [
        3.33819e-06, 8.893102966, -36.49532826, 90.96543286, -152.4545478, 179.4835618,
        -150.315433, 88.43409371, -34.98612086, 8.407803364, -0.932568035,
    ],
    [
        1.13572e-06, 8.994734087, -37.2084849, 93.22900521, -156.6929844, 184.596544,
        -154.3755513, 90.49663749, -35.58964535, 8.478996281, -0.929252233,
    ],
    [
        4.09431e-07, 8.997322763, -37.20218544, 93.11385476, -156.2530937, 183.7080141,
        -153.2631681, 89.59539726, -35.12454591, 8.338655623, -0.910251753,
    ],
];

pub struct FormantFilter {
    vowel: Vowel,
    history: Vec<[f64; ORDER]>,
}

impl FormantFilter {
    pub fn new(vowel: Vowel, channels: usize) -> Self {
        Self {
            vowel,
            history: vec![[0.0; ORDER]; channels.max(1)],
        }
    }

    pub fn vowel(&self) -> Vowel {
        self.vowel
    }

    /// Switch vowels, keeping the filter history so the change does not click
    pub fn set_vowel(&mut self, vowel: Vowel) {
        self.vowel = vowel;
    }
}

impl AudioProcessor for FormantFilter {
    fn process(&mut self, buffer: &mut AudioBuffer, is_mono_source: bool) {
        let coefficients = self.vowel.coefficients();
        let channels = if is_mono_source {
            1
        } else {
            buffer.amount_of_channels().min(self.history.len())
        };

        for c in 0..channels {
            let history = &mut self.history[c];

            for sample in buffer.channel_mut(c) {
                let mut out = coefficients[0] * *sample as f64;
                for (tap, past) in coefficients[1..].iter().zip(history.iter()) {
                    out += tap * past;
                }
                history.copy_within(0..ORDER - 1, 1);
                history[0] = out;

                *sample = out.clamp(f32::MIN as f64, f32::MAX as f64) as f32;
            }
        }

        if is_mono_source {
            buffer.apply_mono_source();
        }
    }

    fn reset(&mut self) {
        self.history.fill([0.0; ORDER]);
    }

    fn name(&self) -> &'static str {
        "FormantFilter"
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
