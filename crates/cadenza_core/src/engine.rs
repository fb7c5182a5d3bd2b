//! Audio Engine - Main Entry Point
//!
//! The AudioEngine runs a `Renderer` on a dedicated render thread and
//! coordinates communication between it and the control thread.
//!
//! # Architecture
//!
//! ```text
//!  control thread                          render thread ("cadenza-render")
//!  ──────────────                          ─────────────────────────────────
//!  send(Command) ──crossbeam bounded──▶    tick()
//!                                            interleave
//!                                            output.write(frames)  (paces loop)
//!                                            burn until deadline   (optional)
//!  dispatch_notifications() ◀──rtrb SPSC── notifications
//!  (drops retired objects)  ◀──crossbeam── retired channels/groups/processors
//! ```
//!
//! The render thread never returns errors. Hardware failures and thread
//! start failures reach the control thread as notifications.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use tracing::{debug, error, info, warn};

use cadenza_dsp::{AudioProcessor, ProcessorId};

use crate::channel::{AudioChannel, ChannelId};
use crate::config::{EngineConfig, PerformanceConfig};
use crate::error::{EngineError, EngineResult, OutputError};
use crate::group::{ChannelGroup, GroupId};
use crate::message::{ChainTarget, Command, Retired};
use crate::notifier::{notification_queue, NotificationKind, NotificationPump, NotificationSink, Notifier};
use crate::render::Renderer;

/// Platform audio sink the render thread writes to
///
/// `write` receives one tick of interleaved frames and is expected to block
/// until the device accepts them, which paces the render loop.
pub trait AudioOutput: Send {
    fn write(&mut self, interleaved: &[f32]) -> Result<(), OutputError>;
}

/// Main audio engine
pub struct AudioEngine {
    /// Channel to send commands to the render thread
    command_sender: Sender<Command>,

    /// Objects the renderer no longer needs
    retired_receiver: Receiver<Retired>,

    /// Control-side end of the notification queue
    notifications: NotificationPump,

    /// Handle to the render thread, which hands the renderer back on exit
    render_thread: Option<JoinHandle<Renderer>>,

    /// Flag to signal shutdown
    shutdown_flag: Arc<AtomicBool>,

    /// Whether the render loop is currently running
    is_running: Arc<AtomicBool>,

    /// Reason the render thread could not be spawned
    start_error: Option<String>,
    start_error_reported: bool,

    config: EngineConfig,
}

impl AudioEngine {
    /// Move `renderer` onto a new render thread writing to `output`
    ///
    /// Only configuration problems are returned as errors. A thread that
    /// cannot be spawned is reported as `ErrorThreadStart` on the next
    /// `dispatch_notifications`.
    pub fn start<O: AudioOutput + 'static>(
        config: EngineConfig,
        renderer: Renderer,
        output: O,
    ) -> EngineResult<Self> {
        config.validate()?;
        if *renderer.context() != config.context() {
            return Err(EngineError::ConfigError(format!(
                "Renderer context {:?} does not match stream config {:?}",
                renderer.context(),
                config.stream
            )));
        }

        let (command_sender, command_receiver) = bounded::<Command>(config.command_capacity);
        let (retired_sender, retired_receiver) = bounded::<Retired>(config.command_capacity);
        let (producer, notifications) = notification_queue(config.notification_capacity);

        let renderer = renderer
            .with_commands(command_receiver)
            .with_retired(retired_sender)
            .with_notifications(producer);

        let shutdown_flag = Arc::new(AtomicBool::new(false));
        let is_running = Arc::new(AtomicBool::new(true));

        // Clone for render thread
        let shutdown_clone = Arc::clone(&shutdown_flag);
        let running_clone = Arc::clone(&is_running);
        let performance = config.performance.clone();
        let tick = Duration::from_secs_f32(config.stream.latency_ms() / 1000.0);

        let spawned = thread::Builder::new()
            .name("cadenza-render".into())
            .spawn(move || {
                Self::render_thread_main(
                    renderer,
                    output,
                    shutdown_clone,
                    running_clone,
                    performance,
                    tick,
                )
            });

        let (render_thread, start_error) = match spawned {
            Ok(handle) => (Some(handle), None),
            Err(e) => {
                error!("Failed to spawn render thread: {}", e);
                is_running.store(false, Ordering::SeqCst);
                (None, Some(e.to_string()))
            }
        };

        Ok(Self {
            command_sender,
            retired_receiver,
            notifications,
            render_thread,
            shutdown_flag,
            is_running,
            start_error,
            start_error_reported: false,
            config,
        })
    }

    fn render_thread_main<O: AudioOutput>(
        mut renderer: Renderer,
        mut output: O,
        shutdown: Arc<AtomicBool>,
        is_running: Arc<AtomicBool>,
        performance: PerformanceConfig,
        tick: Duration,
    ) -> Renderer {
        info!(
            "Render thread started: {} Hz, {} frames per tick",
            renderer.context().sample_rate,
            renderer.context().buffer_size
        );
        let burn = tick.mul_f32(performance.burn_fraction);

        while !shutdown.load(Ordering::Relaxed) {
            let started = Instant::now();

            let frames = renderer.render_interleaved();
            if let Err(e) = output.write(frames) {
                warn!("Audio output write failed: {}", e);
                renderer.post(NotificationKind::ErrorHardwareUnavailable);
                break;
            }

            if performance.prevent_cpu_frequency_scaling {
                // Keep the core busy so the governor does not clock down
                while started.elapsed() < burn {
                    std::hint::spin_loop();
                }
            }
        }

        is_running.store(false, Ordering::SeqCst);
        info!("Render thread stopped");
        renderer
    }

    /// Check whether the render loop is running
    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::SeqCst)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn ensure_running(&self) -> EngineResult<()> {
        if let Some(reason) = &self.start_error {
            return Err(EngineError::ThreadStart(reason.clone()));
        }
        if !self.is_running() {
            return Err(EngineError::NotRunning);
        }
        Ok(())
    }

    /// Queue a command for the next tick
    pub fn send(&self, command: Command) -> EngineResult<()> {
        self.ensure_running()?;

        let name = command.name();
        match self.command_sender.try_send(command) {
            Ok(()) => {
                debug!("Queued {}", name);
                Ok(())
            }
            Err(TrySendError::Full(command)) => {
                warn!("Command queue full - dropping {}", command.name());
                Err(EngineError::ChannelSendError)
            }
            Err(TrySendError::Disconnected(_)) => Err(EngineError::NotRunning),
        }
    }

    pub fn add_channel(&self, channel: AudioChannel) -> EngineResult<ChannelId> {
        let id = channel.id();
        self.send(Command::AddChannel(Box::new(channel)))?;
        Ok(id)
    }

    pub fn remove_channel(&self, channel: ChannelId) -> EngineResult<()> {
        self.send(Command::RemoveChannel(channel))
    }

    pub fn add_group(&self, group: ChannelGroup) -> EngineResult<GroupId> {
        let id = group.id();
        self.send(Command::AddGroup(Box::new(group)))?;
        Ok(id)
    }

    pub fn remove_group(&self, group: GroupId) -> EngineResult<()> {
        self.send(Command::RemoveGroup(group))
    }

    pub fn assign_channel(&self, channel: ChannelId, group: Option<GroupId>) -> EngineResult<()> {
        self.send(Command::AssignChannel { channel, group })
    }

    pub fn add_processor<P: AudioProcessor + 'static>(
        &self,
        target: ChainTarget,
        processor: P,
    ) -> EngineResult<ProcessorId> {
        let id = ProcessorId::next();
        self.send(Command::AddProcessor {
            target,
            id,
            processor: Box::new(processor),
        })?;
        Ok(id)
    }

    pub fn remove_processor(&self, target: ChainTarget, id: ProcessorId) -> EngineResult<()> {
        self.send(Command::RemoveProcessor { target, id })
    }

    /// Run `edit` on the render thread against the processor `id`
    ///
    /// The edit is skipped when the processor is not of type `T`.
    pub fn edit_processor<T, F>(&self, target: ChainTarget, id: ProcessorId, mut edit: F) -> EngineResult<()>
    where
        T: AudioProcessor + 'static,
        F: FnMut(&mut T) + Send + 'static,
    {
        self.send(Command::EditProcessor {
            target,
            id,
            edit: Box::new(move |processor: &mut dyn AudioProcessor| {
                if let Some(processor) = processor.as_any_mut().downcast_mut::<T>() {
                    edit(processor);
                }
            }),
        })
    }

    /// Set channel volume (0.0 - 1.0, linear)
    pub fn set_channel_volume(&self, channel: ChannelId, volume: f32) -> EngineResult<()> {
        self.send(Command::SetChannelVolume { channel, volume })
    }

    /// Set channel pan (-1.0 hard left - 1.0 hard right)
    pub fn set_channel_pan(&self, channel: ChannelId, pan: f32) -> EngineResult<()> {
        self.send(Command::SetChannelPan { channel, pan })
    }

    pub fn set_group_volume(&self, group: GroupId, volume: f32) -> EngineResult<()> {
        self.send(Command::SetGroupVolume { group, volume })
    }

    /// Set master volume (0.0 - 1.0, linear)
    pub fn set_master_volume(&self, volume: f32) -> EngineResult<()> {
        self.send(Command::SetMasterVolume(volume))
    }

    pub fn set_tempo(&self, tempo: f32) -> EngineResult<()> {
        self.send(Command::SetTempo(tempo))
    }

    pub fn set_marker(&self, position: Option<usize>) -> EngineResult<()> {
        self.send(Command::SetMarker(position))
    }

    pub fn set_loop_range(&self, start: usize, end: usize) -> EngineResult<()> {
        self.send(Command::SetLoopRange { start, end })
    }

    pub fn set_playing(&self, playing: bool) -> EngineResult<()> {
        self.send(Command::SetPlaying(playing))
    }

    /// Deliver pending notifications and release retired objects
    ///
    /// Call regularly from the control thread. Returns the amount of
    /// notifications delivered.
    pub fn dispatch_notifications<S: NotificationSink>(&mut self, notifier: &Notifier<S>) -> usize {
        let mut delivered = 0;

        if self.start_error.is_some() && !self.start_error_reported {
            notifier.broadcast(NotificationKind::ErrorThreadStart);
            self.start_error_reported = true;
            delivered += 1;
        }

        for retired in self.retired_receiver.try_iter() {
            debug!("Released {}", retired.name());
        }

        delivered + self.notifications.dispatch(notifier)
    }

    /// Stop the render thread and take the renderer back
    ///
    /// Queued commands that were not applied yet are discarded.
    pub fn stop(&mut self) -> EngineResult<Renderer> {
        let Some(handle) = self.render_thread.take() else {
            return Err(match &self.start_error {
                Some(reason) => EngineError::ThreadStart(reason.clone()),
                None => EngineError::NotRunning,
            });
        };

        self.shutdown_flag.store(true, Ordering::SeqCst);
        let mut renderer = handle
            .join()
            .map_err(|_| EngineError::ThreadStart("render thread panicked".into()))?;
        self.is_running.store(false, Ordering::SeqCst);

        renderer.disconnect();
        Ok(renderer)
    }
}

impl Drop for AudioEngine {
    fn drop(&mut self) {
        // Signal shutdown
        self.shutdown_flag.store(true, Ordering::SeqCst);

        // Wait for render thread to finish
        if let Some(handle) = self.render_thread.take() {
            let _ = handle.join();
        }
    }
}
