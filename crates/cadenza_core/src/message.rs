//! Message Types for Thread Communication
//!
//! Commands flow from control thread -> render thread.
//! Retired objects flow back from render thread -> control thread so their
//! memory is released off the render thread.

use cadenza_dsp::{AudioProcessor, ProcessorId};

use crate::channel::{AudioChannel, ChannelId};
use crate::group::{ChannelGroup, GroupId};

/// In-place edit of a processor's parameters, run on the render thread
pub type ProcessorEdit = Box<dyn FnMut(&mut dyn AudioProcessor) + Send>;

/// Chain a processor command addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainTarget {
    Channel(ChannelId),
    Group(GroupId),
    Master,
}

/// Commands sent from the control thread to the renderer
///
/// Everything the render thread needs arrives fully allocated, so applying
/// a command never allocates.
pub enum Command {
    /// Start rendering a channel; it plays ungrouped until assigned
    AddChannel(Box<AudioChannel>),

    /// Stop rendering a channel and drop it from every group
    RemoveChannel(ChannelId),

    AddGroup(Box<ChannelGroup>),

    /// Remove a group; its members play ungrouped afterwards
    RemoveGroup(GroupId),

    /// Move a channel into `group`, or out of every group with `None`
    AssignChannel {
        channel: ChannelId,
        group: Option<GroupId>,
    },

    AddProcessor {
        target: ChainTarget,
        id: ProcessorId,
        processor: Box<dyn AudioProcessor>,
    },

    RemoveProcessor {
        target: ChainTarget,
        id: ProcessorId,
    },

    EditProcessor {
        target: ChainTarget,
        id: ProcessorId,
        edit: ProcessorEdit,
    },

    /// Linear volume (0.0 - 1.0)
    SetChannelVolume { channel: ChannelId, volume: f32 },

    /// Pan (-1.0 - 1.0)
    SetChannelPan { channel: ChannelId, pan: f32 },

    SetGroupVolume { group: GroupId, volume: f32 },

    SetMasterVolume(f32),

    /// Tempo in BPM
    SetTempo(f32),

    /// Marker position in samples, `None` clears it
    SetMarker(Option<usize>),

    /// Loop bounds in sequencer steps, end exclusive
    SetLoopRange { start: usize, end: usize },

    SetPlaying(bool),
}

impl Command {
    /// Short name used in log output
    pub fn name(&self) -> &'static str {
        match self {
            Command::AddChannel(_) => "AddChannel",
            Command::RemoveChannel(_) => "RemoveChannel",
            Command::AddGroup(_) => "AddGroup",
            Command::RemoveGroup(_) => "RemoveGroup",
            Command::AssignChannel { .. } => "AssignChannel",
            Command::AddProcessor { .. } => "AddProcessor",
            Command::RemoveProcessor { .. } => "RemoveProcessor",
            Command::EditProcessor { .. } => "EditProcessor",
            Command::SetChannelVolume { .. } => "SetChannelVolume",
            Command::SetChannelPan { .. } => "SetChannelPan",
            Command::SetGroupVolume { .. } => "SetGroupVolume",
            Command::SetMasterVolume(_) => "SetMasterVolume",
            Command::SetTempo(_) => "SetTempo",
            Command::SetMarker(_) => "SetMarker",
            Command::SetLoopRange { .. } => "SetLoopRange",
            Command::SetPlaying(_) => "SetPlaying",
        }
    }
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Objects the renderer let go of
pub enum Retired {
    Channel(Box<AudioChannel>),
    Group(Box<ChannelGroup>),
    Processor(Box<dyn AudioProcessor>),
    Edit(ProcessorEdit),
}

impl Retired {
    pub fn name(&self) -> &'static str {
        match self {
            Retired::Channel(_) => "channel",
            Retired::Group(_) => "group",
            Retired::Processor(processor) => processor.name(),
            Retired::Edit(_) => "processor edit",
        }
    }
}

impl std::fmt::Debug for Retired {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Retired({})", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadenza_dsp::Gain;

    #[test]
    fn test_command_names() {
        assert_eq!(Command::SetTempo(120.0).name(), "SetTempo");
        assert_eq!(
            format!("{:?}", Command::RemoveProcessor { target: ChainTarget::Master, id: ProcessorId::next() }),
            "RemoveProcessor"
        );
    }

    #[test]
    fn test_retired_processor_named_after_processor() {
        let retired = Retired::Processor(Box::new(Gain::new(1.0)));
        assert_eq!(retired.name(), Gain::new(1.0).name());
        assert!(format!("{:?}", retired).starts_with("Retired("));
    }

    #[test]
    fn test_command_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<Command>();
        assert_send::<Retired>();
    }
}
