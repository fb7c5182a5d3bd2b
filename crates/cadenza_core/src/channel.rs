//! Audio Channels
//!
//! An `AudioChannel` is one sound source (a synthesizer voice, a sample
//! player, a recorder monitor) together with its output buffer, mix
//! settings and its own `ProcessingChain`. The renderer owns every channel
//! in a `ChannelSet`; groups refer to channels by `ChannelId` only.

use std::sync::atomic::{AtomicU64, Ordering};

use cadenza_dsp::volume::{to_linear, to_log};
use cadenza_dsp::{AudioBuffer, DspError, ProcessContext, ProcessingChain};

/// Producer of the samples a channel plays
///
/// `render` is called once per tick on the render thread with a silenced
/// buffer and follows the same real-time rules as `AudioProcessor::process`.
pub trait SampleSource: Send {
    fn render(&mut self, buffer: &mut AudioBuffer, context: &ProcessContext);
}

impl<F> SampleSource for F
where
    F: FnMut(&mut AudioBuffer, &ProcessContext) + Send,
{
    fn render(&mut self, buffer: &mut AudioBuffer, context: &ProcessContext) {
        self(buffer, context)
    }
}

/// Stable handle of a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(u64);

impl ChannelId {
    pub fn next() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

pub struct AudioChannel {
    id: ChannelId,
    source: Box<dyn SampleSource>,
    buffer: AudioBuffer,
    /// Volume in the logarithmic domain
    volume: f32,
    pan: f32,
    /// Whether the source only renders channel 0
    pub is_mono: bool,
    chain: ProcessingChain,
}

impl AudioChannel {
    pub fn new<S: SampleSource + 'static>(
        source: S,
        channels: usize,
        buffer_size: usize,
    ) -> Result<Self, DspError> {
        Ok(Self {
            id: ChannelId::next(),
            source: Box::new(source),
            buffer: AudioBuffer::new(channels, buffer_size)?,
            volume: to_log(1.0),
            pan: 0.0,
            is_mono: false,
            chain: ProcessingChain::new(),
        })
    }

    /// Channel sized for `context`
    pub fn with_context<S: SampleSource + 'static>(
        source: S,
        context: &ProcessContext,
    ) -> Result<Self, DspError> {
        Self::new(source, context.channels, context.buffer_size)
    }

    pub fn id(&self) -> ChannelId {
        self.id
    }

    /// Linear volume
    pub fn volume(&self) -> f32 {
        to_linear(self.volume)
    }

    pub fn volume_logarithmic(&self) -> f32 {
        self.volume
    }

    pub fn set_volume(&mut self, linear: f32) {
        self.volume = to_log(linear.clamp(0.0, 1.0));
    }

    pub fn pan(&self) -> f32 {
        self.pan
    }

    /// -1.0 is hard left, 1.0 hard right
    pub fn set_pan(&mut self, pan: f32) {
        self.pan = pan.clamp(-1.0, 1.0);
    }

    pub fn buffer(&self) -> &AudioBuffer {
        &self.buffer
    }

    pub fn chain(&self) -> &ProcessingChain {
        &self.chain
    }

    pub fn chain_mut(&mut self) -> &mut ProcessingChain {
        &mut self.chain
    }

    /// Render the source and run the channel's own chain
    pub fn render(&mut self, context: &ProcessContext) {
        self.buffer.silence_buffers();
        self.source.render(&mut self.buffer, context);
        if self.is_mono {
            self.buffer.apply_mono_source();
        }
        self.chain.process(&mut self.buffer, self.is_mono);
    }

    /// Sum the rendered buffer into `target`, scaled by `volume` and panned
    pub fn mix_into(&self, target: &mut AudioBuffer, volume: f32) {
        if volume == 0.0 {
            return;
        }
        if self.pan == 0.0 || target.is_mono() {
            target.merge_buffers(&self.buffer, 0, 0, volume);
            return;
        }

        let left_gain = (1.0 - self.pan.max(0.0)) * volume;
        let right_gain = (1.0 + self.pan.min(0.0)) * volume;

        let source_left = self.buffer.channel(0);
        let source_right = if self.buffer.is_mono() {
            source_left
        } else {
            self.buffer.channel(1)
        };

        let (left, right) = target.stereo_mut();
        for (out, s) in left.iter_mut().zip(source_left) {
            *out += s * left_gain;
        }
        if let Some(right) = right {
            for (out, s) in right.iter_mut().zip(source_right) {
                *out += s * right_gain;
            }
        }
    }
}

impl std::fmt::Debug for AudioChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioChannel")
            .field("id", &self.id)
            .field("volume", &self.volume())
            .field("pan", &self.pan)
            .field("is_mono", &self.is_mono)
            .field("chain", &self.chain)
            .finish()
    }
}

/// Every channel the renderer plays
#[derive(Debug, Default)]
pub struct ChannelSet {
    channels: Vec<Box<AudioChannel>>,
}

impl ChannelSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Preallocate room so adding channels on the render thread does not
    /// reallocate
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            channels: Vec::with_capacity(capacity),
        }
    }

    pub fn add(&mut self, channel: Box<AudioChannel>) -> ChannelId {
        let id = channel.id();
        if !self.contains(id) {
            self.channels.push(channel);
        }
        id
    }

    pub fn remove(&mut self, id: ChannelId) -> Option<Box<AudioChannel>> {
        let index = self.channels.iter().position(|c| c.id() == id)?;
        Some(self.channels.remove(index))
    }

    pub fn contains(&self, id: ChannelId) -> bool {
        self.channels.iter().any(|c| c.id() == id)
    }

    pub fn get(&self, id: ChannelId) -> Option<&AudioChannel> {
        self.channels.iter().find(|c| c.id() == id).map(|c| c.as_ref())
    }

    pub fn get_mut(&mut self, id: ChannelId) -> Option<&mut AudioChannel> {
        self.channels
            .iter_mut()
            .find(|c| c.id() == id)
            .map(|c| c.as_mut())
    }

    pub fn iter(&self) -> impl Iterator<Item = &AudioChannel> {
        self.channels.iter().map(|c| c.as_ref())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut AudioChannel> {
        self.channels.iter_mut().map(|c| c.as_mut())
    }

    pub fn render_all(&mut self, context: &ProcessContext) {
        for channel in &mut self.channels {
            channel.render(context);
        }
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}
