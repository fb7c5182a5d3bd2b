//! Biquad Filter
//!
//! Second-order RBJ cookbook filter, one `DirectForm2Transposed` instance
//! per channel. Coefficients are recomputed on the control path whenever
//! cutoff, resonance or type change; `process()` only runs the filters.

use std::any::Any;

use biquad::{Biquad, Coefficients, DirectForm2Transposed, ToHertz, Type, Q_BUTTERWORTH_F32};

use crate::buffer::AudioBuffer;
use crate::error::DspError;
use crate::processor::AudioProcessor;

/// Lowest cutoff in Hz
pub const MIN_CUTOFF: f32 = 20.0;

const MIN_Q: f32 = 0.1;
const MAX_Q: f32 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterType {
    LowPass,
    HighPass,
    BandPass,
}

impl FilterType {
    fn to_biquad(self) -> Type<f32> {
        match self {
            FilterType::LowPass => Type::LowPass,
            FilterType::HighPass => Type::HighPass,
            FilterType::BandPass => Type::BandPass,
        }
    }
}

pub struct Filter {
    sample_rate: f32,
    filter_type: FilterType,
    cutoff: f32,
    q: f32,
    filters: [DirectForm2Transposed<f32>; 2],
}

impl Filter {
    /// Create a filter with Butterworth resonance
    pub fn new(filter_type: FilterType, cutoff: f32, sample_rate: f32) -> Result<Self, DspError> {
        if sample_rate <= 0.0 {
            return Err(DspError::InvalidSampleRate(sample_rate));
        }
        let cutoff = Self::clamp_cutoff(cutoff, sample_rate);
        let coefficients = Self::coefficients(filter_type, cutoff, Q_BUTTERWORTH_F32, sample_rate)?;

        Ok(Self {
            sample_rate,
            filter_type,
            cutoff,
            q: Q_BUTTERWORTH_F32,
            filters: [
                DirectForm2Transposed::<f32>::new(coefficients),
                DirectForm2Transposed::<f32>::new(coefficients),
            ],
        })
    }

    /// Keeps the cutoff clear of DC and safely below Nyquist
    fn clamp_cutoff(cutoff: f32, sample_rate: f32) -> f32 {
        cutoff.clamp(MIN_CUTOFF, sample_rate * 0.45)
    }

    fn coefficients(
        filter_type: FilterType,
        cutoff: f32,
        q: f32,
        sample_rate: f32,
    ) -> Result<Coefficients<f32>, DspError> {
        Coefficients::<f32>::from_params(filter_type.to_biquad(), sample_rate.hz(), cutoff.hz(), q)
            .map_err(|_| DspError::InvalidFilterParameters {
                cutoff,
                sample_rate,
            })
    }

    fn update(&mut self) {
        // clamped parameters always yield valid coefficients; keep the
        // previous ones otherwise
        if let Ok(coefficients) =
            Self::coefficients(self.filter_type, self.cutoff, self.q, self.sample_rate)
        {
            for filter in &mut self.filters {
                filter.update_coefficients(coefficients);
            }
        }
    }

    pub fn filter_type(&self) -> FilterType {
        self.filter_type
    }

    pub fn set_filter_type(&mut self, filter_type: FilterType) {
        if filter_type != self.filter_type {
            self.filter_type = filter_type;
            self.update();
        }
    }

    pub fn cutoff(&self) -> f32 {
        self.cutoff
    }

    pub fn set_cutoff(&mut self, cutoff: f32) {
        let cutoff = Self::clamp_cutoff(cutoff, self.sample_rate);
        if cutoff != self.cutoff {
            self.cutoff = cutoff;
            self.update();
        }
    }

    pub fn resonance(&self) -> f32 {
        self.q
    }

    pub fn set_resonance(&mut self, q: f32) {
        let q = q.clamp(MIN_Q, MAX_Q);
        if q != self.q {
            self.q = q;
            self.update();
        }
    }
}

impl AudioProcessor for Filter {
    fn process(&mut self, buffer: &mut AudioBuffer, is_mono_source: bool) {
        let channels = if is_mono_source { 1 } else { buffer.amount_of_channels() };
        for c in 0..channels {
            let filter = &mut self.filters[c];
            for sample in buffer.channel_mut(c) {
                *sample = filter.run(*sample);
            }
        }
        if is_mono_source {
            buffer.apply_mono_source();
        }
    }

    fn reset(&mut self) {
        for filter in &mut self.filters {
            filter.reset_state();
        }
    }

    fn name(&self) -> &'static str {
        "Filter"
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
