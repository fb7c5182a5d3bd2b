//! Glitcher
//!
//! Captures the incoming signal into a fixed-length loop and, while playback
//! is enabled, replaces the input with a sub-range of that loop. Recording
//! and playback keep separate cursors and may run at the same time, which
//! yields stutter and buffer-repeat effects.

use std::any::Any;

use crate::buffer::AudioBuffer;
use crate::error::DspError;
use crate::processor::AudioProcessor;
use crate::units::milliseconds_to_buffer;

pub struct Glitcher {
    recording_buffer: AudioBuffer,
    recording: bool,
    playing: bool,
    write_offset: usize,
    read_offset: usize,
}

impl Glitcher {
    /// Create a glitcher holding `duration_ms` of audio for `channels` channels
    pub fn new(channels: usize, duration_ms: f32, sample_rate: f32) -> Result<Self, DspError> {
        let length = milliseconds_to_buffer(duration_ms, sample_rate);
        let mut recording_buffer = AudioBuffer::new(channels, length)?;
        recording_buffer.loopable = true;

        Ok(Self {
            recording_buffer,
            recording: false,
            playing: false,
            write_offset: 0,
            read_offset: 0,
        })
    }

    /// Loop length in samples
    pub fn sample_length(&self) -> usize {
        self.recording_buffer.buffer_size()
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    pub fn set_recording(&mut self, value: bool) {
        self.recording = value;
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn set_playback(&mut self, value: bool) {
        self.playing = value;
    }

    /// Restrict playback to the inclusive range `start..=end` of the loop
    pub fn set_playback_range(&mut self, start: usize, end: usize) {
        self.recording_buffer.set_range(start, end);
        let (start, end) = self.recording_buffer.range();
        if self.read_offset < start || self.read_offset > end {
            self.read_offset = start;
        }
    }

    pub fn playback_range(&self) -> (usize, usize) {
        self.recording_buffer.range()
    }

    fn record(&mut self, input: &AudioBuffer) {
        let length = self.sample_length();
        let channels = input
            .amount_of_channels()
            .min(self.recording_buffer.amount_of_channels());

        for c in 0..channels {
            let source = input.channel(c);
            let target = self.recording_buffer.channel_mut(c);
            let mut w = self.write_offset;
            for sample in source {
                target[w] = *sample;
                w += 1;
                if w == length {
                    w = 0;
                }
            }
        }
        self.write_offset = (self.write_offset + input.buffer_size()) % length;
    }
}

impl AudioProcessor for Glitcher {
    fn process(&mut self, buffer: &mut AudioBuffer, _is_mono_source: bool) {
        // capture the unmodified input before playback overwrites it
        if self.recording {
            self.record(buffer);
        }
        if self.playing {
            buffer.silence_buffers();
            self.read_offset = self.recording_buffer.copy_range_into(buffer, self.read_offset);
            if self.recording_buffer.is_mono() && !buffer.is_mono() {
                buffer.apply_mono_source();
            }
        }
    }

    fn reset(&mut self) {
        self.recording_buffer.silence_buffers();
        self.write_offset = 0;
        self.read_offset = self.recording_buffer.range().0;
    }

    fn name(&self) -> &'static str {
        "Glitcher"
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
