//! Planar Audio Buffer
//!
//! `AudioBuffer` stores one sample array per channel. It is the unit of
//! work for every processor and the bus that voices are summed into.
//!
//! # Real-time Safety
//!
//! All methods except construction and `clone` are allocation-free. Offset
//! arguments are pre-conditions checked with `debug_assert!` only; callers
//! on the render thread are expected to pass valid ranges.

use crate::error::DspError;

/// Per-channel sample container with mix and merge primitives
#[derive(Debug, Clone)]
pub struct AudioBuffer {
    channels: Vec<Vec<f32>>,
    buffer_size: usize,
    /// Whether reads past the end wrap to the start when merging
    pub loopable: bool,
    range_start: usize,
    range_end: usize,
}

impl AudioBuffer {
    /// Create a silent buffer
    ///
    /// Fails when `amount_of_channels` is not 1 or 2 or `buffer_size` is 0.
    pub fn new(amount_of_channels: usize, buffer_size: usize) -> Result<Self, DspError> {
        if !(1..=2).contains(&amount_of_channels) {
            return Err(DspError::InvalidChannelCount(amount_of_channels));
        }
        if buffer_size == 0 {
            return Err(DspError::InvalidBufferSize(buffer_size));
        }
        Ok(Self {
            channels: vec![vec![0.0; buffer_size]; amount_of_channels],
            buffer_size,
            loopable: false,
            range_start: 0,
            range_end: buffer_size - 1,
        })
    }

    pub fn amount_of_channels(&self) -> usize {
        self.channels.len()
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    pub fn is_mono(&self) -> bool {
        self.channels.len() == 1
    }

    #[inline]
    pub fn channel(&self, index: usize) -> &[f32] {
        &self.channels[index]
    }

    #[inline]
    pub fn channel_mut(&mut self, index: usize) -> &mut [f32] {
        &mut self.channels[index]
    }

    /// Borrow the left channel and, for stereo buffers, the right channel
    #[inline]
    pub fn stereo_mut(&mut self) -> (&mut [f32], Option<&mut [f32]>) {
        let (left, rest) = self.channels.split_at_mut(1);
        (left[0].as_mut_slice(), rest.first_mut().map(|r| r.as_mut_slice()))
    }

    /// Sum `source` into this buffer, scaled by `volume`
    ///
    /// Reads start at `read_offset` in the source and writes at
    /// `write_offset` here. When the source is exhausted a loopable source
    /// wraps back to its start, any other source ends the merge early.
    ///
    /// Returns the amount of samples written per channel.
    pub fn merge_buffers(
        &mut self,
        source: &AudioBuffer,
        read_offset: usize,
        write_offset: usize,
        volume: f32,
    ) -> usize {
        if write_offset >= self.buffer_size || volume == 0.0 {
            return 0;
        }
        debug_assert!(read_offset < source.buffer_size, "read offset out of range");

        let channel_count = self.channels.len().min(source.channels.len());
        let writable = self.buffer_size - write_offset;
        let mut written = 0;

        for c in 0..channel_count {
            let src = &source.channels[c];
            let dst = &mut self.channels[c][write_offset..];
            let mut r = read_offset;
            let mut count = 0;

            for sample in dst.iter_mut().take(writable) {
                if r >= src.len() {
                    if !source.loopable {
                        break;
                    }
                    r = 0;
                }
                *sample += src[r] * volume;
                r += 1;
                count += 1;
            }
            written = count;
        }
        written
    }

    /// Copy channel 0 into all other channels
    pub fn apply_mono_source(&mut self) {
        if let Some((first, rest)) = self.channels.split_first_mut() {
            for channel in rest {
                channel.copy_from_slice(first);
            }
        }
    }

    /// Zero every channel
    pub fn silence_buffers(&mut self) {
        for channel in &mut self.channels {
            channel.fill(0.0);
        }
    }

    pub fn is_silent(&self) -> bool {
        self.channels
            .iter()
            .all(|channel| channel.iter().all(|s| *s == 0.0))
    }

    /// Multiply every sample by `amplitude`
    pub fn adjust_buffer_volumes(&mut self, amplitude: f32) {
        for channel in &mut self.channels {
            for sample in channel.iter_mut() {
                *sample *= amplitude;
            }
        }
    }

    /// Peak absolute sample value across all channels
    pub fn peak(&self) -> f32 {
        self.channels
            .iter()
            .flat_map(|channel| channel.iter())
            .fold(0.0_f32, |peak, s| peak.max(s.abs()))
    }

    /// Copy this buffer's samples into `target`, starting at `read_offset`
    /// and wrapping within the playback range
    pub fn copy_range_into(&self, target: &mut AudioBuffer, read_offset: usize) -> usize {
        let (start, end) = self.range();
        debug_assert!(read_offset >= start && read_offset <= end, "read offset outside range");

        let channel_count = self.channels.len().min(target.channels.len());
        let mut r = read_offset;
        for i in 0..target.buffer_size {
            for c in 0..channel_count {
                target.channels[c][i] = self.channels[c][r];
            }
            r = if r >= end { start } else { r + 1 };
        }
        r
    }

    /// Restrict loop playback to the inclusive range `start..=end`
    pub fn set_range(&mut self, start: usize, end: usize) {
        let last = self.buffer_size - 1;
        self.range_end = end.min(last);
        self.range_start = start.min(self.range_end);
    }

    pub fn reset_range(&mut self) {
        self.range_start = 0;
        self.range_end = self.buffer_size - 1;
    }

    /// Inclusive playback range
    pub fn range(&self) -> (usize, usize) {
        (self.range_start, self.range_end)
    }

    pub fn range_length(&self) -> usize {
        self.range_end - self.range_start + 1
    }
}
