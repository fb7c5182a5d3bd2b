//! Engine Error Types

use thiserror::Error;

/// Errors that can occur in the audio engine
///
/// Only control-thread operations return these. Failures on the render
/// thread are reported as notifications instead.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Stream configuration error: {0}")]
    ConfigError(String),

    #[error("Engine already running")]
    AlreadyRunning,

    #[error("Engine not running")]
    NotRunning,

    #[error("Failed to start render thread: {0}")]
    ThreadStart(String),

    #[error("DSP error: {0}")]
    Dsp(#[from] cadenza_dsp::DspError),

    #[error("Channel send error - receiver dropped or queue full")]
    ChannelSendError,
}

/// Result type alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// Failures reported by an `AudioOutput` implementation
#[derive(Error, Debug)]
pub enum OutputError {
    #[error("Audio device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("Audio device disconnected")]
    Disconnected,

    #[error("Write failed: {0}")]
    WriteFailed(String),
}
