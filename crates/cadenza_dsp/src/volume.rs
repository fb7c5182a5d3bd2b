//! Volume and Level Math
//!
//! Volumes are stored logarithmically throughout the engine and only
//! converted back to a linear multiplier at the point of multiplication.
//! Combining gains this way avoids the audible stacking error of summing
//! several linear fader positions.

/// Tiny offset added to detector inputs so `log10` never sees zero
pub const DC_OFFSET: f32 = 1.0e-25;

/// Upper bound (exclusive) for phase-like "amount" parameters
pub const MAX_PHASE: f32 = 1.0;

/// Output ceiling used by processors that guard against clipping
pub const MAX_OUTPUT: f32 = 0.98;

/// Exponent of the fader curve
const CURVE: f32 = 2.0;

/// Convert a linear fader position (0.0 - 1.0) to its logarithmic gain
#[inline]
pub fn to_log(value: f32) -> f32 {
    value.max(0.0).powf(CURVE)
}

/// Convert a logarithmic gain back to a linear fader position
#[inline]
pub fn to_linear(value: f32) -> f32 {
    value.max(0.0).powf(1.0 / CURVE)
}

/// Convert decibels to linear amplitude
/// Formula: amplitude = 10^(dB/20)
#[inline]
pub fn db_to_linear(db: f32) -> f32 {
    10.0_f32.powf(db / 20.0)
}

/// Convert linear amplitude to decibels
#[inline]
pub fn linear_to_db(linear: f32) -> f32 {
    20.0 * linear.log10()
}

/// Clamp a normalized parameter to 0.0 - 1.0
#[inline]
pub fn cap_param(value: f32) -> f32 {
    value.clamp(0.0, 1.0)
}

/// Clamp a sample to the nominal -1.0 - 1.0 range
#[inline]
pub fn cap_sample(value: f32) -> f32 {
    value.clamp(-1.0, 1.0)
}

/// Map `value` from the range 0 - `maximum` onto 0 - `maximum_scaled`
#[inline]
pub fn scale(value: f32, maximum: f32, maximum_scaled: f32) -> f32 {
    (value / maximum) * maximum_scaled
}
