//! Time and Tempo Conversions
//!
//! Pure functions converting between buffer lengths (in samples) and
//! musical or wall-clock time.

/// Length of `buffer_size` samples in milliseconds
#[inline]
pub fn buffer_to_milliseconds(buffer_size: usize, sample_rate: f32) -> f32 {
    buffer_size as f32 / (sample_rate / 1000.0)
}

/// Number of samples spanning `milliseconds`
#[inline]
pub fn milliseconds_to_buffer(milliseconds: f32, sample_rate: f32) -> usize {
    (milliseconds.max(0.0) * (sample_rate / 1000.0)) as usize
}

/// Length of `buffer_size` samples in seconds
#[inline]
pub fn buffer_to_seconds(buffer_size: usize, sample_rate: f32) -> f32 {
    buffer_size as f32 / sample_rate
}

/// Number of samples spanning `seconds`
#[inline]
pub fn seconds_to_buffer(seconds: f32, sample_rate: f32) -> usize {
    (seconds.max(0.0) * sample_rate) as usize
}

/// Samples in a single beat at `tempo` BPM
#[inline]
pub fn samples_per_beat(sample_rate: f32, tempo: f32) -> usize {
    ((sample_rate * 60.0) / tempo) as usize
}

/// Samples in a bar of `beat_amount` beats of note value `beat_unit`
///
/// `beat_unit` is the time signature denominator (4 for quarter notes).
#[inline]
pub fn samples_per_bar(sample_rate: f32, tempo: f32, beat_amount: u32, beat_unit: u32) -> usize {
    let beat = samples_per_beat(sample_rate, tempo);
    (beat * 4 / beat_unit.max(1) as usize) * beat_amount as usize
}

/// Samples in one subdivision of a 4/4 bar (16 for sixteenth notes)
#[inline]
pub fn samples_per_beat_division(sample_rate: f32, tempo: f32, subdivision: u32) -> usize {
    samples_per_bar(sample_rate, tempo, 4, 4) / subdivision.max(1) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_millisecond_round_trip() {
        assert_eq!(milliseconds_to_buffer(10.0, 48000.0), 480);
        assert!((buffer_to_milliseconds(480, 48000.0) - 10.0).abs() < 1e-4);
    }

    #[test]
    fn test_seconds_conversion() {
        assert_eq!(seconds_to_buffer(0.5, 44100.0), 22050);
        assert!((buffer_to_seconds(44100, 44100.0) - 1.0).abs() < 1e-6);
        assert_eq!(seconds_to_buffer(-1.0, 44100.0), 0);
    }

    #[test]
    fn test_tempo_math() {
        // 120 BPM at 44.1 kHz: half a second per beat
        assert_eq!(samples_per_beat(44100.0, 120.0), 22050);
        assert_eq!(samples_per_bar(44100.0, 120.0, 4, 4), 88200);
        assert_eq!(samples_per_bar(44100.0, 120.0, 6, 8), 66150);
        assert_eq!(samples_per_beat_division(44100.0, 120.0, 16), 5512);
    }
}
