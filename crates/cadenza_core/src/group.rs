//! Channel Groups
//!
//! A `ChannelGroup` is a bus: it submixes its member channels into its own
//! buffer, runs that submix through the group's `ProcessingChain` and sums
//! the result into a parent buffer (normally the master).
//!
//! Volumes are combined in the logarithmic domain and only turned into a
//! multiplier at the merge, so stacking channel and group volumes does not
//! compound the way naive linear summing does.

use std::sync::atomic::{AtomicU64, Ordering};

use cadenza_dsp::volume::{to_linear, to_log};
use cadenza_dsp::{AudioBuffer, DspError, ProcessContext, ProcessingChain};

use crate::channel::{ChannelId, ChannelSet};
use crate::render::MAX_CHANNELS;

/// Stable handle of a group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupId(u64);

impl GroupId {
    pub fn next() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

#[derive(Debug)]
pub struct ChannelGroup {
    id: GroupId,
    members: Vec<ChannelId>,
    mixdown: AudioBuffer,
    chain: ProcessingChain,
    /// Volume in the logarithmic domain
    volume: f32,
}

impl ChannelGroup {
    pub fn new(context: &ProcessContext) -> Result<Self, DspError> {
        Ok(Self {
            id: GroupId::next(),
            members: Vec::with_capacity(MAX_CHANNELS),
            mixdown: AudioBuffer::new(context.channels, context.buffer_size)?,
            chain: ProcessingChain::new(),
            volume: to_log(1.0),
        })
    }

    pub fn id(&self) -> GroupId {
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

    pub fn chain(&self) -> &ProcessingChain {
        &self.chain
    }

    pub fn chain_mut(&mut self) -> &mut ProcessingChain {
        &mut self.chain
    }

    /// Add a member, ignoring channels already in the group
    ///
    /// Returns false when the channel is not a member afterwards because
    /// the group already holds `MAX_CHANNELS` members.
    pub fn add_channel(&mut self, id: ChannelId) -> bool {
        if self.contains_channel(id) {
            return true;
        }
        if self.members.len() >= MAX_CHANNELS {
            return false;
        }
        self.members.push(id);
        true
    }

    pub fn remove_channel(&mut self, id: ChannelId) -> bool {
        let before = self.members.len();
        self.members.retain(|member| *member != id);
        before != self.members.len()
    }

    pub fn contains_channel(&self, id: ChannelId) -> bool {
        self.members.contains(&id)
    }

    pub fn channel_ids(&self) -> &[ChannelId] {
        &self.members
    }

    /// Submix the member channels, process them and sum into `output`
    ///
    /// Returns false, leaving `output` untouched, when the group has no
    /// members.
    pub fn apply_effects_to_channels(&mut self, channels: &ChannelSet, output: &mut AudioBuffer) -> bool {
        if self.members.is_empty() {
            return false;
        }

        self.mixdown.silence_buffers();

        let present = self.members.iter().filter(|id| channels.contains(**id)).count();
        let share = 1.0 / present.max(1) as f32;
        let mut is_mono = output.amount_of_channels() == 1;

        for id in &self.members {
            let Some(channel) = channels.get(*id) else {
                continue;
            };
            channel.mix_into(&mut self.mixdown, channel.volume_logarithmic() * share);
            if !channel.is_mono {
                is_mono = false;
            }
        }

        self.chain.process(&mut self.mixdown, is_mono);
        output.merge_buffers(&self.mixdown, 0, 0, self.volume);
        true
    }
}
