//! DSP Error Types

use thiserror::Error;

/// Errors raised while constructing buffers and processors
///
/// Only construction can fail. Parameter setters clamp out-of-range
/// values instead of returning errors so the render path stays
/// allocation and branch-light.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DspError {
    #[error("Invalid channel count: {0} (must be 1 or 2)")]
    InvalidChannelCount(usize),

    #[error("Invalid buffer size: {0} (must be at least 1 sample)")]
    InvalidBufferSize(usize),

    #[error("Invalid ring buffer capacity: {0}")]
    InvalidCapacity(usize),

    #[error("Sample rate must be positive, got {0}")]
    InvalidSampleRate(f32),

    #[error("Invalid filter parameters for cutoff {cutoff}Hz at sample rate {sample_rate}Hz")]
    InvalidFilterParameters { cutoff: f32, sample_rate: f32 },

    #[error("Buffer size mismatch: expected {expected}, got {got}")]
    BufferSizeMismatch { expected: usize, got: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DspError::InvalidChannelCount(6);
        assert!(err.to_string().contains('6'));

        let err = DspError::InvalidFilterParameters {
            cutoff: 30000.0,
            sample_rate: 44100.0,
        };
        assert!(err.to_string().contains("30000"));
    }
}
