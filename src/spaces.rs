//! Shape and bounds metadata for actions and observations.

use rand::Rng;
use serde::Serialize;

use crate::articulation::ArticulatorSpec;
use crate::config::EnvConfig;
use crate::observation::Observation;

/// An n-dimensional box with per-element bounds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoxSpace {
    pub low: Vec<f32>,
    pub high: Vec<f32>,
    pub shape: Vec<usize>,
}

impl BoxSpace {
    /// A box with the same bounds for every element.
    pub fn uniform(low: f32, high: f32, shape: &[usize]) -> Self {
        let len = shape.iter().product();
        Self {
            low: vec![low; len],
            high: vec![high; len],
            shape: shape.to_vec(),
        }
    }

    /// Number of scalar elements.
    pub fn len(&self) -> usize {
        self.low.len()
    }

    pub fn is_empty(&self) -> bool {
        self.low.is_empty()
    }

    pub fn contains(&self, values: &[f32]) -> bool {
        values.len() == self.len()
            && values
                .iter()
                .zip(self.low.iter().zip(&self.high))
                .all(|(v, (lo, hi))| lo <= v && v <= hi)
    }

    /// Draw a uniform sample. Every bound must be finite.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<f32> {
        self.low
            .iter()
            .zip(&self.high)
            .map(|(&lo, &hi)| lo + (hi - lo) * rng.gen::<f32>())
            .collect()
    }
}

/// Normalized action box, `[-1, 1]` per controlled articulator.
pub type ActionSpace = BoxSpace;

pub(crate) fn action_space(specs: &[ArticulatorSpec]) -> ActionSpace {
    BoxSpace::uniform(-1.0, 1.0, &[specs.len()])
}

/// Layout of an [`Observation`], in the order [`Observation::to_vec`] flattens it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObservationSpace {
    pub generated_spectrogram: BoxSpace,
    pub target_spectrogram: BoxSpace,
    pub generated_wave: BoxSpace,
    pub target_wave: BoxSpace,
    pub articulation: BoxSpace,
    pub frequency: BoxSpace,
}

impl ObservationSpace {
    pub fn from_config(config: &EnvConfig) -> Self {
        let spectrogram_shape = [config.feature_channels(), config.frames_per_window()];
        let (freq_lo, freq_hi) = (0.0, config.sample_rate as f32 / 2.0);

        Self {
            generated_spectrogram: BoxSpace::uniform(0.0, f32::INFINITY, &spectrogram_shape),
            target_spectrogram: BoxSpace::uniform(0.0, f32::INFINITY, &spectrogram_shape),
            generated_wave: BoxSpace::uniform(-1.0, 1.0, &[config.block_size]),
            target_wave: BoxSpace::uniform(-1.0, 1.0, &[config.block_size]),
            articulation: BoxSpace {
                low: config.articulators.iter().map(|s| s.min).collect(),
                high: config.articulators.iter().map(|s| s.max).collect(),
                shape: vec![config.articulators.len()],
            },
            frequency: BoxSpace::uniform(freq_lo, freq_hi, &[1]),
        }
    }

    fn parts(&self) -> [&BoxSpace; 6] {
        [
            &self.generated_spectrogram,
            &self.target_spectrogram,
            &self.generated_wave,
            &self.target_wave,
            &self.articulation,
            &self.frequency,
        ]
    }

    /// Length of the flattened observation vector.
    pub fn flat_len(&self) -> usize {
        self.parts().iter().map(|p| p.len()).sum()
    }

    /// Whether every component of `obs` has the declared shape.
    pub fn matches_shape(&self, obs: &Observation) -> bool {
        let dims = |space: &BoxSpace| (space.shape[0], space.shape[1]);
        obs.generated_spectrogram.dim() == dims(&self.generated_spectrogram)
            && obs.target_spectrogram.dim() == dims(&self.target_spectrogram)
            && obs.generated_wave.len() == self.generated_wave.len()
            && obs.target_wave.len() == self.target_wave.len()
            && obs.articulation.len() == self.articulation.len()
    }

    /// Whether `obs` has the declared shape and every value lies within bounds.
    pub fn contains(&self, obs: &Observation) -> bool {
        if !self.matches_shape(obs) {
            return false;
        }
        let values = obs.to_vec();
        if values.len() != self.flat_len() {
            return false;
        }
        let mut offset = 0;
        for part in self.parts() {
            if !part.contains(&values[offset..offset + part.len()]) {
                return false;
            }
            offset += part.len();
        }
        true
    }
}
