//! Renderer
//!
//! Owns the whole mixing graph and produces one buffer per tick:
//!
//! ```text
//! commands ─▶ apply ─▶ channels.render_all()
//!                             │
//!               ┌─────────────┴──────────────┐
//!         ungrouped channels          ChannelGroup submix
//!               │                   (chain, group volume)
//!               └──────────────┬─────────────┘
//!                              ▼
//!                    master ─▶ master chain ─▶ master volume
//!                              │
//!                    meter, transport, interleave
//! ```
//!
//! The renderer itself is single-threaded. `AudioEngine` moves it onto the
//! render thread and talks to it through the command queue.

use crossbeam_channel::{Receiver, Sender};
use tracing::trace;

use cadenza_dsp::volume::{to_linear, to_log};
use cadenza_dsp::{AudioBuffer, EnvelopeFollower, ProcessContext, ProcessingChain, RingBuffer};

use crate::channel::{AudioChannel, ChannelId, ChannelSet};
use crate::config::EngineConfig;
use crate::error::EngineResult;
use crate::group::{ChannelGroup, GroupId};
use crate::message::{ChainTarget, Command, Retired};
use crate::notifier::{NotificationKind, NotificationProducer};
use crate::transport::Transport;

/// Channels preallocated so adding one on the render thread does not grow
/// the channel list
pub const MAX_CHANNELS: usize = 64;

/// Groups preallocated for the same reason
pub const MAX_GROUPS: usize = 16;

const DEFAULT_TEMPO: f32 = 120.0;

pub struct Renderer {
    context: ProcessContext,
    channels: ChannelSet,
    groups: Vec<Box<ChannelGroup>>,
    master: AudioBuffer,
    master_chain: ProcessingChain,
    /// Master volume in the logarithmic domain
    master_volume: f32,
    staging: RingBuffer,
    interleaved: Vec<f32>,
    meter: EnvelopeFollower,
    transport: Transport,
    notifications: Option<NotificationProducer>,
    commands: Option<Receiver<Command>>,
    retired: Option<Sender<Retired>>,
}

impl Renderer {
    pub fn new(config: &EngineConfig) -> EngineResult<Self> {
        config.validate()?;
        let context = config.context();

        Ok(Self {
            context,
            channels: ChannelSet::with_capacity(MAX_CHANNELS),
            groups: Vec::with_capacity(MAX_GROUPS),
            master: AudioBuffer::new(context.channels, context.buffer_size)?,
            master_chain: ProcessingChain::new(),
            master_volume: to_log(1.0),
            staging: RingBuffer::new(config.ring_buffer_frames * context.channels)?,
            interleaved: vec![0.0; context.buffer_size * context.channels],
            meter: EnvelopeFollower::new(1.0, 1.0, 300.0, context.sample_rate),
            transport: Transport::new(context.sample_rate, DEFAULT_TEMPO),
            notifications: None,
            commands: None,
            retired: None,
        })
    }

    /// Post sequencer and error notifications to `producer`
    pub fn with_notifications(mut self, producer: NotificationProducer) -> Self {
        self.notifications = Some(producer);
        self
    }

    /// Drain `commands` at the top of every tick
    pub fn with_commands(mut self, commands: Receiver<Command>) -> Self {
        self.commands = Some(commands);
        self
    }

    /// Hand removed objects to `retired` instead of dropping them in place
    pub fn with_retired(mut self, retired: Sender<Retired>) -> Self {
        self.retired = Some(retired);
        self
    }

    /// Drop every queue endpoint, returning to standalone use
    pub(crate) fn disconnect(&mut self) {
        self.notifications = None;
        self.commands = None;
        self.retired = None;
    }

    pub fn context(&self) -> &ProcessContext {
        &self.context
    }

    pub fn channels(&self) -> &ChannelSet {
        &self.channels
    }

    pub fn channel_mut(&mut self, id: ChannelId) -> Option<&mut AudioChannel> {
        self.channels.get_mut(id)
    }

    pub fn add_channel(&mut self, channel: Box<AudioChannel>) -> ChannelId {
        let id = self.channels.add(channel);
        trace!("Added channel {}", id.get());
        id
    }

    /// Remove a channel from the set and from every group
    pub fn remove_channel(&mut self, id: ChannelId) -> Option<Box<AudioChannel>> {
        for group in &mut self.groups {
            group.remove_channel(id);
        }
        let removed = self.channels.remove(id);
        if removed.is_some() {
            trace!("Removed channel {}", id.get());
        }
        removed
    }

    pub fn groups(&self) -> impl Iterator<Item = &ChannelGroup> {
        self.groups.iter().map(|g| g.as_ref())
    }

    pub fn group_mut(&mut self, id: GroupId) -> Option<&mut ChannelGroup> {
        self.groups
            .iter_mut()
            .find(|g| g.id() == id)
            .map(|g| g.as_mut())
    }

    pub fn add_group(&mut self, group: Box<ChannelGroup>) -> GroupId {
        let id = group.id();
        if !self.groups.iter().any(|g| g.id() == id) {
            self.groups.push(group);
            trace!("Added group {}", id.get());
        }
        id
    }

    pub fn remove_group(&mut self, id: GroupId) -> Option<Box<ChannelGroup>> {
        let index = self.groups.iter().position(|g| g.id() == id)?;
        trace!("Removed group {}", id.get());
        Some(self.groups.remove(index))
    }

    /// Move `channel` into `group`, or leave it ungrouped with `None`
    ///
    /// A channel belongs to at most one group.
    pub fn assign_channel(&mut self, channel: ChannelId, group: Option<GroupId>) {
        for g in &mut self.groups {
            if Some(g.id()) != group {
                g.remove_channel(channel);
            }
        }
        if let Some(target) = group.and_then(|id| self.group_mut(id)) {
            target.add_channel(channel);
        }
    }

    pub fn chain_mut(&mut self, target: ChainTarget) -> Option<&mut ProcessingChain> {
        match target {
            ChainTarget::Channel(id) => self.channels.get_mut(id).map(|c| c.chain_mut()),
            ChainTarget::Group(id) => self.group_mut(id).map(|g| g.chain_mut()),
            ChainTarget::Master => Some(&mut self.master_chain),
        }
    }

    pub fn master_chain_mut(&mut self) -> &mut ProcessingChain {
        &mut self.master_chain
    }

    /// Linear master volume
    pub fn master_volume(&self) -> f32 {
        to_linear(self.master_volume)
    }

    pub fn set_master_volume(&mut self, linear: f32) {
        self.master_volume = to_log(linear.clamp(0.0, 1.0));
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut Transport {
        &mut self.transport
    }

    /// Smoothed peak level of the master output after the last tick
    pub fn level(&self) -> f32 {
        self.meter.envelope
    }

    /// Master buffer of the last tick
    pub fn master(&self) -> &AudioBuffer {
        &self.master
    }

    /// Post a notification if a producer is attached
    pub fn post(&mut self, kind: NotificationKind) -> bool {
        match self.notifications.as_mut() {
            Some(producer) => producer.post(kind),
            None => false,
        }
    }

    fn retire(&self, item: Retired) {
        if let Some(retired) = &self.retired {
            // A full queue drops the item here
            let _ = retired.try_send(item);
        }
    }

    pub fn apply_command(&mut self, command: Command) {
        trace!("Applying {}", command.name());

        match command {
            Command::AddChannel(channel) => {
                if self.channels.len() < MAX_CHANNELS {
                    self.add_channel(channel);
                } else {
                    self.retire(Retired::Channel(channel));
                }
            }
            Command::RemoveChannel(id) => {
                if let Some(channel) = self.remove_channel(id) {
                    self.retire(Retired::Channel(channel));
                }
            }
            Command::AddGroup(group) => {
                if self.groups.len() < MAX_GROUPS {
                    self.add_group(group);
                } else {
                    self.retire(Retired::Group(group));
                }
            }
            Command::RemoveGroup(id) => {
                if let Some(group) = self.remove_group(id) {
                    self.retire(Retired::Group(group));
                }
            }
            Command::AssignChannel { channel, group } => self.assign_channel(channel, group),
            Command::AddProcessor { target, id, processor } => {
                let rejected = match self.chain_mut(target) {
                    Some(chain) => chain.add_with_id(id, processor).err(),
                    None => Some(processor),
                };
                if let Some(processor) = rejected {
                    self.retire(Retired::Processor(processor));
                }
            }
            Command::RemoveProcessor { target, id } => {
                if let Some(processor) = self.chain_mut(target).and_then(|chain| chain.remove(id)) {
                    self.retire(Retired::Processor(processor));
                }
            }
            Command::EditProcessor { target, id, mut edit } => {
                if let Some(processor) = self.chain_mut(target).and_then(|chain| chain.get_mut(id)) {
                    edit(processor);
                }
                self.retire(Retired::Edit(edit));
            }
            Command::SetChannelVolume { channel, volume } => {
                if let Some(channel) = self.channels.get_mut(channel) {
                    channel.set_volume(volume);
                }
            }
            Command::SetChannelPan { channel, pan } => {
                if let Some(channel) = self.channels.get_mut(channel) {
                    channel.set_pan(pan);
                }
            }
            Command::SetGroupVolume { group, volume } => {
                if let Some(group) = self.group_mut(group) {
                    group.set_volume(volume);
                }
            }
            Command::SetMasterVolume(volume) => self.set_master_volume(volume),
            Command::SetTempo(tempo) => self.transport.set_tempo(tempo),
            Command::SetMarker(position) => self.transport.set_marker(position),
            Command::SetLoopRange { start, end } => self.transport.set_loop_range(start, end),
            Command::SetPlaying(playing) => self.transport.set_playing(playing),
        }
    }

    /// Render one buffer into the master bus
    pub fn tick(&mut self) -> &AudioBuffer {
        if let Some(commands) = self.commands.take() {
            while let Ok(command) = commands.try_recv() {
                self.apply_command(command);
            }
            self.commands = Some(commands);
        }

        self.channels.render_all(&self.context);
        self.master.silence_buffers();

        for channel in self.channels.iter() {
            if !self.groups.iter().any(|g| g.contains_channel(channel.id())) {
                channel.mix_into(&mut self.master, channel.volume_logarithmic());
            }
        }
        for group in &mut self.groups {
            group.apply_effects_to_channels(&self.channels, &mut self.master);
        }

        let is_mono = self.master.is_mono();
        self.master_chain.process(&mut self.master, is_mono);
        self.master.adjust_buffer_volumes(self.master_volume);

        self.meter.process_buffer(&self.master);
        self.transport
            .advance(self.context.buffer_size, self.notifications.as_mut());

        &self.master
    }

    /// Copy the master buffer into interleaved frames, returning the amount
    /// of frames written
    pub fn write_interleaved(&self, out: &mut [f32]) -> usize {
        interleave(&self.master, out)
    }

    /// Tick and return the result as interleaved frames
    pub fn render_interleaved(&mut self) -> &[f32] {
        self.tick();
        interleave(&self.master, &mut self.interleaved);
        &self.interleaved
    }

    /// Fill an interleaved device block of any size
    ///
    /// Ticks into the staging queue until enough samples are available.
    /// Samples that cannot be produced are zero-filled.
    pub fn pull(&mut self, out: &mut [f32]) {
        let mut filled = self.staging.dequeue_into(out);

        while filled < out.len() {
            self.tick();
            interleave(&self.master, &mut self.interleaved);
            if self.staging.enqueue_slice(&self.interleaved) == 0 {
                out[filled..].fill(0.0);
                return;
            }
            filled += self.staging.dequeue_into(&mut out[filled..]);
        }
    }

    /// Samples rendered but not yet pulled
    pub fn staged(&self) -> usize {
        self.staging.size()
    }
}

impl std::fmt::Debug for Renderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Renderer")
            .field("context", &self.context)
            .field("channels", &self.channels.len())
            .field("groups", &self.groups.len())
            .field("master_chain", &self.master_chain)
            .field("master_volume", &self.master_volume())
            .finish()
    }
}

fn interleave(buffer: &AudioBuffer, out: &mut [f32]) -> usize {
    let channels = buffer.amount_of_channels();
    let frames = (out.len() / channels).min(buffer.buffer_size());

    for c in 0..channels {
        let source = buffer.channel(c);
        for (frame, sample) in source.iter().take(frames).enumerate() {
            out[frame * channels + c] = *sample;
        }
    }
    frames
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StreamConfig;
    use crate::message::ProcessorEdit;
    use crate::notifier::notification_queue;
    use cadenza_dsp::{AudioProcessor, Gain, ProcessorId, MAX_PROCESSORS};

    const SIZE: usize = 64;

    fn config() -> EngineConfig {
        EngineConfig {
            stream: StreamConfig {
                sample_rate: 48000,
                channels: 2,
                buffer_size: SIZE as u32,
            },
            ring_buffer_frames: SIZE * 4,
            ..Default::default()
        }
    }

    fn constant(value: f32, renderer: &Renderer) -> Box<AudioChannel> {
        let source = move |buffer: &mut AudioBuffer, _: &ProcessContext| {
            for c in 0..buffer.amount_of_channels() {
                buffer.channel_mut(c).fill(value);
            }
        };
        Box::new(AudioChannel::with_context(source, renderer.context()).unwrap())
    }

    /// Source counting up one per frame, across ticks
    fn ramp(renderer: &Renderer) -> Box<AudioChannel> {
        let mut next = 0.0_f32;
        let source = move |buffer: &mut AudioBuffer, _: &ProcessContext| {
            let start = next;
            for c in 0..buffer.amount_of_channels() {
                for (i, sample) in buffer.channel_mut(c).iter_mut().enumerate() {
                    *sample = (start + i as f32) * 0.001;
                }
            }
            next += buffer.buffer_size() as f32;
        };
        Box::new(AudioChannel::with_context(source, renderer.context()).unwrap())
    }

    #[test]
    fn test_ungrouped_channels_mixed_into_master() {
        let mut renderer = Renderer::new(&config()).unwrap();
        renderer.add_channel(constant(0.25, &renderer));
        renderer.add_channel(constant(0.25, &renderer));

        let master = renderer.tick();
        assert!((master.channel(0)[0] - 0.5).abs() < 1e-6);
        assert!((master.channel(1)[SIZE - 1] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_grouped_channels_not_mixed_twice() {
        let mut renderer = Renderer::new(&config()).unwrap();
        let a = renderer.add_channel(constant(0.5, &renderer));
        let b = renderer.add_channel(constant(0.5, &renderer));
        let group = ChannelGroup::new(renderer.context()).unwrap();
        let group_id = renderer.add_group(Box::new(group));

        renderer.assign_channel(a, Some(group_id));
        renderer.assign_channel(b, Some(group_id));

        // Two members at full volume share the bus: 0.5/2 + 0.5/2
        let master = renderer.tick();
        assert!((master.channel(0)[0] - 0.5).abs() < 1e-6);

        renderer.assign_channel(b, None);
        let master = renderer.tick();
        assert!((master.channel(0)[0] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_channel_in_one_group_only() {
        let mut renderer = Renderer::new(&config()).unwrap();
        let channel = renderer.add_channel(constant(0.5, &renderer));
        let first = renderer.add_group(Box::new(ChannelGroup::new(renderer.context()).unwrap()));
        let second = renderer.add_group(Box::new(ChannelGroup::new(renderer.context()).unwrap()));

        renderer.assign_channel(channel, Some(first));
        renderer.assign_channel(channel, Some(second));

        let members: Vec<_> = renderer.groups().map(|g| g.contains_channel(channel)).collect();
        assert_eq!(members, vec![false, true]);
    }

    #[test]
    fn test_master_volume_and_chain() {
        let mut renderer = Renderer::new(&config()).unwrap();
        renderer.add_channel(constant(0.25, &renderer));
        renderer.master_chain_mut().add(Gain::new(2.0));
        renderer.set_master_volume(0.5);

        let master = renderer.tick();
        assert!((master.channel(0)[0] - 0.5 * 0.25).abs() < 1e-6);
        assert!(renderer.level() > 0.0);
    }

    #[test]
    fn test_commands_drained_each_tick() {
        let (sender, receiver) = crossbeam_channel::bounded(8);
        let (retired_tx, retired_rx) = crossbeam_channel::bounded(8);
        let mut renderer = Renderer::new(&config())
            .unwrap()
            .with_commands(receiver)
            .with_retired(retired_tx);

        let channel = constant(0.5, &renderer);
        let channel_id = channel.id();
        let gain_id = ProcessorId::next();

        sender.send(Command::AddChannel(channel)).unwrap();
        sender
            .send(Command::AddProcessor {
                target: ChainTarget::Channel(channel_id),
                id: gain_id,
                processor: Box::new(Gain::new(0.5)),
            })
            .unwrap();
        let edit: ProcessorEdit = Box::new(|processor: &mut dyn AudioProcessor| {
            if let Some(gain) = processor.as_any_mut().downcast_mut::<Gain>() {
                gain.set_amount(2.0);
            }
        });
        sender
            .send(Command::EditProcessor {
                target: ChainTarget::Channel(channel_id),
                id: gain_id,
                edit,
            })
            .unwrap();

        let master = renderer.tick();
        assert!((master.channel(0)[0] - 1.0).abs() < 1e-6);
        assert!(matches!(retired_rx.try_recv(), Ok(Retired::Edit(_))));

        sender
            .send(Command::RemoveProcessor {
                target: ChainTarget::Channel(channel_id),
                id: gain_id,
            })
            .unwrap();
        sender.send(Command::RemoveChannel(channel_id)).unwrap();
        let master = renderer.tick();
        assert!(master.is_silent());

        let retired: Vec<_> = retired_rx.try_iter().collect();
        assert!(matches!(retired[0], Retired::Processor(_)));
        assert!(matches!(retired[1], Retired::Channel(_)));
    }

    #[test]
    fn test_additions_beyond_capacity_are_retired() {
        let (retired_tx, retired_rx) = crossbeam_channel::bounded(4);
        let mut renderer = Renderer::new(&config()).unwrap().with_retired(retired_tx);

        for _ in 0..MAX_PROCESSORS {
            renderer.apply_command(Command::AddProcessor {
                target: ChainTarget::Master,
                id: ProcessorId::next(),
                processor: Box::new(Gain::new(1.0)),
            });
        }
        assert!(retired_rx.try_recv().is_err());
        renderer.apply_command(Command::AddProcessor {
            target: ChainTarget::Master,
            id: ProcessorId::next(),
            processor: Box::new(Gain::new(1.0)),
        });
        assert!(matches!(retired_rx.try_recv(), Ok(Retired::Processor(_))));
        assert_eq!(renderer.master_chain_mut().len(), MAX_PROCESSORS);

        for _ in 0..MAX_GROUPS {
            let group = ChannelGroup::new(renderer.context()).unwrap();
            renderer.apply_command(Command::AddGroup(Box::new(group)));
        }
        let extra = ChannelGroup::new(renderer.context()).unwrap();
        renderer.apply_command(Command::AddGroup(Box::new(extra)));
        assert!(matches!(retired_rx.try_recv(), Ok(Retired::Group(_))));
        assert_eq!(renderer.groups().count(), MAX_GROUPS);

        for _ in 0..MAX_CHANNELS {
            let channel = constant(0.0, &renderer);
            renderer.apply_command(Command::AddChannel(channel));
        }
        let extra = constant(0.0, &renderer);
        renderer.apply_command(Command::AddChannel(extra));
        assert!(matches!(retired_rx.try_recv(), Ok(Retired::Channel(_))));
        assert_eq!(renderer.channels().len(), MAX_CHANNELS);
    }

    #[test]
    fn test_unknown_targets_ignored() {
        let mut renderer = Renderer::new(&config()).unwrap();
        renderer.apply_command(Command::SetChannelVolume {
            channel: ChannelId::next(),
            volume: 0.5,
        });
        renderer.apply_command(Command::AddProcessor {
            target: ChainTarget::Group(GroupId::next()),
            id: ProcessorId::next(),
            processor: Box::new(Gain::new(1.0)),
        });
        assert!(renderer.tick().is_silent());
    }

    #[test]
    fn test_transport_commands_post_notifications() {
        let (producer, mut pump) = notification_queue(16);
        let mut renderer = Renderer::new(&config()).unwrap().with_notifications(producer);

        renderer.apply_command(Command::SetTempo(90.0));
        renderer.apply_command(Command::SetPlaying(true));
        renderer.tick();

        assert_eq!(renderer.transport().tempo(), 90.0);
        assert_eq!(
            pump.try_next().map(|n| n.kind),
            Some(NotificationKind::SequencerTempoUpdated)
        );
    }

    #[test]
    fn test_write_interleaved() {
        let mut renderer = Renderer::new(&config()).unwrap();
        let channel = renderer.add_channel(constant(1.0, &renderer));
        renderer.channel_mut(channel).unwrap().set_pan(1.0);
        renderer.tick();

        let mut out = vec![9.0; SIZE * 2];
        assert_eq!(renderer.write_interleaved(&mut out), SIZE);
        assert_eq!(&out[..4], &[0.0, 1.0, 0.0, 1.0]);

        let mut short = vec![9.0; 6];
        assert_eq!(renderer.write_interleaved(&mut short), 3);
    }

    #[test]
    fn test_pull_spans_ticks() {
        let mut renderer = Renderer::new(&config()).unwrap();
        renderer.add_channel(ramp(&renderer));

        // 1.5 ticks then another 1.5 ticks: the second block continues the first
        let mut first = vec![0.0; SIZE * 3];
        let mut second = vec![0.0; SIZE * 3];
        renderer.pull(&mut first);
        assert_eq!(renderer.staged(), SIZE);
        renderer.pull(&mut second);
        assert_eq!(renderer.staged(), 0);

        let frame = |block: &[f32], i: usize| block[i * 2];
        assert!((frame(&first, 95) - 0.095).abs() < 1e-6);
        assert!((frame(&second, 0) - 0.096).abs() < 1e-6);
        assert!((frame(&second, 95) - 0.191).abs() < 1e-5);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let invalid = EngineConfig {
            ring_buffer_frames: 0,
            ..config()
        };
        assert!(Renderer::new(&invalid).is_err());
    }
}
