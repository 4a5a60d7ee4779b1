use ndarray::Array2;
use serde::Serialize;

use crate::articulation::{ArticulatorSpec, ArticulatoryState};
use crate::config::EnvConfig;
use crate::spectrogram::{trailing_window, FeatureExtractor};

/// What the agent sees after `reset` and every `step`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Observation {
    /// Features of the trailing generated-audio window, `(channels, frames)`.
    pub generated_spectrogram: Array2<f32>,
    /// Features of the target window the next block will be scored against.
    pub target_spectrogram: Array2<f32>,
    /// The most recent generated block.
    pub generated_wave: Vec<f32>,
    /// The target block the agent should produce next.
    pub target_wave: Vec<f32>,
    /// Values of the controlled articulators, in action order.
    pub articulation: Vec<f32>,
    pub frequency_hz: f32,
}

impl Observation {
    /// Flatten into one vector, in [`ObservationSpace`](crate::ObservationSpace) order.
    pub fn to_vec(&self) -> Vec<f32> {
        let mut out = Vec::with_capacity(
            self.generated_spectrogram.len()
                + self.target_spectrogram.len()
                + self.generated_wave.len()
                + self.target_wave.len()
                + self.articulation.len()
                + 1,
        );
        out.extend(self.generated_spectrogram.iter());
        out.extend(self.target_spectrogram.iter());
        out.extend_from_slice(&self.generated_wave);
        out.extend_from_slice(&self.target_wave);
        out.extend_from_slice(&self.articulation);
        out.push(self.frequency_hz);
        out
    }
}

/// Derives observations from the episode's audio.
pub struct ObservationBuilder {
    extractor: FeatureExtractor,
    window_size: usize,
    block_size: usize,
    specs: Vec<ArticulatorSpec>,
    default_frequency: f32,
}

impl ObservationBuilder {
    pub fn from_config(config: &EnvConfig) -> Self {
        Self {
            extractor: FeatureExtractor::new(
                config.features,
                config.n_fft,
                config.hop_length,
                config.sample_rate,
            ),
            window_size: config.window_size,
            block_size: config.block_size,
            specs: config.articulators.clone(),
            default_frequency: config.default_frequency,
        }
    }

    pub fn extractor(&self) -> &FeatureExtractor {
        &self.extractor
    }

    /// Features of the `window_size` samples ending at `end`, silence-padded.
    pub fn window_features(&self, samples: &[f32], end: usize) -> Array2<f32> {
        self.extractor
            .extract(&trailing_window(samples, end, self.window_size))
    }

    /// Features of the trailing window of `buffer`.
    pub fn features(&self, buffer: &[f32]) -> Array2<f32> {
        self.window_features(buffer, buffer.len())
    }

    /// Full observation for an episode whose generated audio is `buffer`.
    ///
    /// The target side looks one block ahead of the buffer: it shows the
    /// segment the next `step` will be scored against.
    pub fn build(
        &self,
        buffer: &[f32],
        target: &[f32],
        state: &ArticulatoryState,
    ) -> Observation {
        self.build_with_features(self.features(buffer), buffer, target, state)
    }

    /// Like [`build`](Self::build), reusing `generated` as the features of
    /// `buffer`'s trailing window.
    pub fn build_with_features(
        &self,
        generated: Array2<f32>,
        buffer: &[f32],
        target: &[f32],
        state: &ArticulatoryState,
    ) -> Observation {
        let end = buffer.len();
        let next_end = end + self.block_size;
        Observation {
            generated_spectrogram: generated,
            target_spectrogram: self.window_features(target, next_end),
            generated_wave: trailing_window(buffer, end, self.block_size),
            target_wave: trailing_window(target, next_end, self.block_size),
            articulation: state.values_of(&self.specs),
            frequency_hz: state.to_params(self.default_frequency).frequency_hz,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FeatureKind;

    fn small_config() -> EnvConfig {
        EnvConfig {
            block_size: 256,
            window_size: 512,
            n_fft: 256,
            hop_length: 64,
            sample_rate: 16_000,
            ..Default::default()
        }
    }

    #[test]
    fn empty_buffer_gives_padded_silence() {
        let config = small_config();
        let builder = ObservationBuilder::from_config(&config);
        let features = builder.features(&[]);
        assert_eq!(
            features.dim(),
            (config.feature_channels(), config.frames_per_window())
        );
        assert!(features.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn short_buffer_matches_explicit_left_padding() {
        let builder = ObservationBuilder::from_config(&small_config());
        let buffer: Vec<f32> = (0..300).map(|i| (i as f32 * 0.05).sin()).collect();
        let mut padded = vec![0.0; 212];
        padded.extend_from_slice(&buffer);
        assert_eq!(builder.features(&buffer), builder.extractor().extract(&padded));
    }

    #[test]
    fn observation_looks_one_block_ahead_in_target() {
        let config = small_config();
        let builder = ObservationBuilder::from_config(&config);
        let target: Vec<f32> = (0..1000).map(|i| i as f32).collect();
        let buffer = vec![0.5; 256];
        let state = ArticulatoryState::initial(&config.articulators);

        let obs = builder.build(&buffer, &target, &state);
        assert_eq!(obs.target_wave[0], 256.0);
        assert_eq!(obs.target_wave[255], 511.0);
        assert_eq!(obs.generated_wave, buffer);
        assert_eq!(obs.frequency_hz, 400.0);
        assert_eq!(obs.articulation.len(), 8);
    }

    #[test]
    fn mel_features_keep_configured_shape() {
        let config = EnvConfig {
            features: FeatureKind::Log1pMel { n_mels: 24 },
            ..small_config()
        };
        let builder = ObservationBuilder::from_config(&config);
        let buffer: Vec<f32> = (0..700).map(|i| (i as f32 * 0.3).sin()).collect();
        assert_eq!(builder.features(&buffer).dim(), (24, 5));
    }
}
