//! Arpeggiator
//!
//! A step sequencer for a single voice. Every step lasts `step_size`
//! samples and carries a semitone shift; the voice asks `peek()` once per
//! sample and re-pitches when it reports a step change.

/// Upper bound on the amount of steps
pub const MAX_STEPS: usize = 16;

/// One semitone up
const SEMITONE_UP: f32 = 1.0594;

/// One semitone down
const SEMITONE_DOWN: f32 = 0.9439;

#[derive(Debug, Clone, PartialEq)]
pub struct Arpeggiator {
    step: usize,
    step_amount: usize,
    step_size: usize,
    step_shifts: [i32; MAX_STEPS],
    buffer_position: usize,
}

impl Default for Arpeggiator {
    fn default() -> Self {
        Self {
            step: 0,
            step_amount: 1,
            step_size: 1,
            step_shifts: [0; MAX_STEPS],
            buffer_position: 0,
        }
    }
}

impl Arpeggiator {
    pub fn new(step_size: usize, step_amount: usize) -> Self {
        let mut arpeggiator = Self::default();
        arpeggiator.set_step_size(step_size);
        arpeggiator.set_amount_of_steps(step_amount);
        arpeggiator
    }

    /// Step length in samples
    pub fn step_size(&self) -> usize {
        self.step_size
    }

    pub fn set_step_size(&mut self, samples: usize) {
        self.step_size = samples.max(1);
        if self.buffer_position >= self.step_size {
            self.buffer_position = 0;
        }
    }

    pub fn amount_of_steps(&self) -> usize {
        self.step_amount
    }

    pub fn set_amount_of_steps(&mut self, amount: usize) {
        self.step_amount = amount.clamp(1, MAX_STEPS);
        if self.step >= self.step_amount {
            self.step = 0;
        }
    }

    pub fn shift_for_step(&self, step: usize) -> i32 {
        self.step_shifts[step.min(MAX_STEPS - 1)]
    }

    /// Semitone shift of `step`; steps beyond `MAX_STEPS` are ignored
    pub fn set_shift_for_step(&mut self, step: usize, shift: i32) {
        if let Some(slot) = self.step_shifts.get_mut(step) {
            *slot = shift;
        }
    }

    pub fn step(&self) -> usize {
        self.step
    }

    pub fn set_step(&mut self, step: usize) {
        self.step = if step < self.step_amount { step } else { 0 };
    }

    pub fn buffer_position(&self) -> usize {
        self.buffer_position
    }

    pub fn set_buffer_position(&mut self, position: usize) {
        self.buffer_position = if position < self.step_size { position } else { 0 };
    }

    /// Advance one sample, true when this moved to the next step
    #[inline]
    pub fn peek(&mut self) -> bool {
        self.buffer_position += 1;
        if self.buffer_position < self.step_size {
            return false;
        }
        self.buffer_position = 0;
        self.step += 1;
        if self.step >= self.step_amount {
            self.step = 0;
        }
        true
    }

    /// `base_pitch` transposed by the shift of `step`
    pub fn pitch_for_step(&self, step: usize, base_pitch: f32) -> f32 {
        let shift = self.shift_for_step(step);
        if shift > 0 {
            base_pitch * SEMITONE_UP.powi(shift)
        } else if shift < 0 {
            base_pitch * SEMITONE_DOWN.powi(-shift)
        } else {
            base_pitch
        }
    }
}
