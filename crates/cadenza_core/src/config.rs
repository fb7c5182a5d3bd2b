//! Configuration
//!
//! Everything here is plain serde data, validated once before a renderer
//! or engine is built from it.

use serde::{Deserialize, Serialize};

use cadenza_dsp::units::buffer_to_milliseconds;
use cadenza_dsp::ProcessContext;

use crate::error::{EngineError, EngineResult};

/// Shape of the stream the renderer produces
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Output rate in Hz
    pub sample_rate: u32,

    /// 1 for mono devices, 2 for stereo
    pub channels: u16,

    /// Frames rendered per tick (lower = less latency, higher = more stability)
    pub buffer_size: u32,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            channels: 2,
            buffer_size: 512,
        }
    }
}

impl StreamConfig {
    /// Duration of one tick in milliseconds
    pub fn latency_ms(&self) -> f32 {
        buffer_to_milliseconds(self.buffer_size as usize, self.sample_rate as f32)
    }

    /// Interleaved samples in one tick
    pub fn samples_per_tick(&self) -> usize {
        self.buffer_size as usize * self.channels as usize
    }

    /// Reject rates, channel counts and tick sizes the engine cannot run
    pub fn validate(&self) -> EngineResult<()> {
        if !(8000..=192000).contains(&self.sample_rate) {
            return Err(EngineError::ConfigError(format!(
                "Invalid sample rate: {}",
                self.sample_rate
            )));
        }
        if self.channels == 0 || self.channels > 2 {
            return Err(EngineError::ConfigError(format!(
                "Invalid channel count: {}",
                self.channels
            )));
        }
        if !(32..=8192).contains(&self.buffer_size) {
            return Err(EngineError::ConfigError(format!(
                "Invalid buffer size: {}",
                self.buffer_size
            )));
        }
        Ok(())
    }
}

/// Render thread scheduling options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceConfig {
    /// Busy-wait after each tick so the CPU governor keeps clocks high
    pub prevent_cpu_frequency_scaling: bool,

    /// Fraction of the tick duration to fill with busy-waiting (0.0 - 1.0)
    pub burn_fraction: f32,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            prevent_cpu_frequency_scaling: false,
            burn_fraction: 0.5,
        }
    }
}

/// Configuration of a `Renderer` and the `AudioEngine` running it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub stream: StreamConfig,

    /// Frames the `pull` staging queue holds, at least one tick
    pub ring_buffer_frames: usize,

    /// Pending commands the control thread may queue
    pub command_capacity: usize,

    /// Pending notifications the render thread may queue
    pub notification_capacity: usize,

    /// Render thread scheduling
    pub performance: PerformanceConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            stream: StreamConfig::default(),
            ring_buffer_frames: 2048,
            command_capacity: 64,
            notification_capacity: 256,
            performance: PerformanceConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Small ticks with the CPU kept awake, for live playing
    pub fn low_latency() -> Self {
        Self {
            stream: StreamConfig {
                sample_rate: 48000,
                channels: 2,
                buffer_size: 128,
            },
            ring_buffer_frames: 1024,
            performance: PerformanceConfig {
                prevent_cpu_frequency_scaling: true,
                burn_fraction: 0.5,
            },
            ..Self::default()
        }
    }

    /// Large ticks for playback and bouncing, where latency does not matter
    pub fn stable() -> Self {
        Self {
            stream: StreamConfig {
                sample_rate: 48000,
                channels: 2,
                buffer_size: 1024,
            },
            ring_buffer_frames: 4096,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> EngineResult<()> {
        self.stream.validate()?;

        if self.ring_buffer_frames < self.stream.buffer_size as usize {
            return Err(EngineError::ConfigError(format!(
                "Ring buffer of {} frames cannot hold one tick of {} frames",
                self.ring_buffer_frames, self.stream.buffer_size
            )));
        }
        if self.command_capacity == 0 || self.notification_capacity == 0 {
            return Err(EngineError::ConfigError(
                "Queue capacities must be at least 1".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.performance.burn_fraction) {
            return Err(EngineError::ConfigError(format!(
                "Invalid burn fraction: {}",
                self.performance.burn_fraction
            )));
        }
        Ok(())
    }

    /// Processing context shared by every stage of the pipeline
    pub fn context(&self) -> ProcessContext {
        ProcessContext::new(
            self.stream.sample_rate as f32,
            self.stream.channels as usize,
            self.stream.buffer_size as usize,
        )
    }

    pub fn from_json(json: &str) -> EngineResult<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| EngineError::ConfigError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> EngineResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| EngineError::ConfigError(e.to_string()))
    }
}
