//! Sequencer Transport
//!
//! Tempo and playback position bookkeeping for the render loop. The
//! transport runs in samples; steps are an even division of a bar. It
//! reports step changes, marker hits and tempo changes through the
//! notification queue.

use cadenza_dsp::units::samples_per_bar;

use crate::notifier::{NotificationKind, NotificationProducer};

pub const MIN_TEMPO: f32 = 20.0;
pub const MAX_TEMPO: f32 = 300.0;

#[derive(Debug, Clone)]
pub struct Transport {
    sample_rate: f32,
    tempo: f32,
    beat_amount: u32,
    beat_unit: u32,
    steps_per_bar: usize,
    /// Position within the loop, in samples
    position: usize,
    current_step: usize,
    marker: Option<usize>,
    /// Loop bounds in steps, end exclusive
    loop_start: usize,
    loop_end: usize,
    playing: bool,
    tempo_changed: bool,
}

impl Transport {
    /// A stopped 4/4 transport with sixteen steps looping over one bar
    pub fn new(sample_rate: f32, tempo: f32) -> Self {
        Self {
            sample_rate,
            tempo: tempo.clamp(MIN_TEMPO, MAX_TEMPO),
            beat_amount: 4,
            beat_unit: 4,
            steps_per_bar: 16,
            position: 0,
            current_step: 0,
            marker: None,
            loop_start: 0,
            loop_end: 16,
            playing: false,
            tempo_changed: false,
        }
    }

    pub fn tempo(&self) -> f32 {
        self.tempo
    }

    /// Change tempo, keeping the position at the same step
    pub fn set_tempo(&mut self, tempo: f32) {
        let tempo = tempo.clamp(MIN_TEMPO, MAX_TEMPO);
        if tempo == self.tempo {
            return;
        }
        let step_offset = self.position % self.samples_per_step().max(1);
        let fraction = step_offset as f32 / self.samples_per_step().max(1) as f32;

        self.tempo = tempo;
        self.position = self.current_step * self.samples_per_step()
            + (fraction * self.samples_per_step() as f32) as usize;
        self.tempo_changed = true;
    }

    pub fn time_signature(&self) -> (u32, u32) {
        (self.beat_amount, self.beat_unit)
    }

    pub fn set_time_signature(&mut self, beat_amount: u32, beat_unit: u32) {
        self.beat_amount = beat_amount.max(1);
        self.beat_unit = beat_unit.max(1);
        self.rewind_if_outside_loop();
    }

    pub fn steps_per_bar(&self) -> usize {
        self.steps_per_bar
    }

    /// Change the step resolution, resetting the loop to one full bar
    pub fn set_steps_per_bar(&mut self, steps: usize) {
        self.steps_per_bar = steps.max(1);
        self.loop_start = 0;
        self.loop_end = self.steps_per_bar;
        self.rewind_if_outside_loop();
    }

    pub fn samples_per_bar(&self) -> usize {
        samples_per_bar(self.sample_rate, self.tempo, self.beat_amount, self.beat_unit)
    }

    pub fn samples_per_step(&self) -> usize {
        self.samples_per_bar() / self.steps_per_bar
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn set_position(&mut self, samples: usize) {
        self.position = samples;
        self.rewind_if_outside_loop();
        self.current_step = self.step_at(self.position);
    }

    pub fn current_step(&self) -> usize {
        self.current_step
    }

    pub fn marker(&self) -> Option<usize> {
        self.marker
    }

    /// Sample position at which `MarkerPositionReached` is posted
    pub fn set_marker(&mut self, position: Option<usize>) {
        self.marker = position;
    }

    /// Loop bounds in steps, end exclusive
    pub fn loop_range(&self) -> (usize, usize) {
        (self.loop_start, self.loop_end)
    }

    pub fn set_loop_range(&mut self, start_step: usize, end_step: usize) {
        self.loop_end = end_step.max(1);
        self.loop_start = start_step.min(self.loop_end - 1);
        self.rewind_if_outside_loop();
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn set_playing(&mut self, playing: bool) {
        self.playing = playing;
    }

    fn loop_start_samples(&self) -> usize {
        self.loop_start * self.samples_per_step()
    }

    fn loop_end_samples(&self) -> usize {
        self.loop_end * self.samples_per_step()
    }

    fn step_at(&self, position: usize) -> usize {
        position / self.samples_per_step().max(1)
    }

    fn rewind_if_outside_loop(&mut self) {
        if self.position < self.loop_start_samples() || self.position >= self.loop_end_samples() {
            self.position = self.loop_start_samples();
            self.current_step = self.loop_start;
        }
    }

    fn marker_within(&self, start: usize, end: usize) -> bool {
        self.marker.is_some_and(|marker| marker >= start && marker < end)
    }

    /// Move forward by one tick of `frames` samples, posting notifications
    /// for whatever happened during it
    pub fn advance(&mut self, frames: usize, mut notifications: Option<&mut NotificationProducer>) {
        let mut post = |kind: NotificationKind, value: Option<i32>| {
            if let Some(producer) = notifications.as_deref_mut() {
                match value {
                    Some(value) => producer.post_value(kind, value),
                    None => producer.post(kind),
                };
            }
        };

        if self.tempo_changed {
            self.tempo_changed = false;
            post(NotificationKind::SequencerTempoUpdated, None);
        }
        if !self.playing {
            return;
        }

        let loop_start = self.loop_start_samples();
        let loop_end = self.loop_end_samples().max(loop_start + 1);
        let loop_length = loop_end - loop_start;

        let start = self.position;
        let mut end = start + frames;
        let mut marker_hit = self.marker_within(start, end.min(loop_end));

        if end >= loop_end {
            end = loop_start + (end - loop_end) % loop_length;
            marker_hit |= self.marker_within(loop_start, end);
        }
        self.position = end;

        if let Some(marker) = self.marker.filter(|_| marker_hit) {
            post(NotificationKind::MarkerPositionReached, Some(marker as i32));
        }

        let step = self.step_at(self.position);
        if step != self.current_step {
            self.current_step = step;
            post(NotificationKind::SequencerPositionUpdated, Some(step as i32));
        }
    }
}
