//! Environment configuration.
//!
//! Everything that shapes an episode is resolved from an [`EnvConfig`] once,
//! when the environment is constructed. Configs can be built in code through
//! [`EnvConfigBuilder`] or loaded from JSON.

use std::path::{Path, PathBuf};

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

use crate::articulation::{Articulator, ArticulatorSpec};
use crate::error::EnvError;

/// How an action component turns into a new articulator value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MappingMode {
    /// The action selects a position inside the articulator's range.
    #[default]
    Absolute,
    /// The action moves the articulator relative to its previous value.
    Delta,
    /// The action accelerates the articulator; velocity is integrated each step.
    Acceleration,
}

/// Feature extractor applied to audio windows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FeatureKind {
    /// STFT magnitude, `n_fft / 2 + 1` bins per frame.
    #[default]
    Magnitude,
    /// `ln(1 + mel power)` over `n_mels` triangular filters.
    Log1pMel { n_mels: usize },
}

/// Distance used to score generated audio against the target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewardMetric {
    /// Negative mean squared error between feature windows. Range `(-inf, 0]`.
    #[default]
    SpectralDistance,
    /// Negative mean absolute error between feature windows. Range `(-inf, 0]`.
    SpectralL1,
    /// Pearson correlation of the current block against the target block. Range `[-1, 1]`.
    Correlation,
}

impl RewardMetric {
    /// The best and worst rewards the metric can produce, as `(low, high)`.
    pub fn range(self) -> (f64, f64) {
        match self {
            RewardMetric::SpectralDistance | RewardMetric::SpectralL1 => (f64::NEG_INFINITY, 0.0),
            RewardMetric::Correlation => (-1.0, 1.0),
        }
    }
}

/// What happens when the target does not divide evenly into blocks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TailPolicy {
    /// The final partial segment is padded with silence and scored normally.
    #[default]
    PadSilence,
    /// The episode ends before the partial segment, after `len / block_size` steps.
    Truncate,
    /// The partial segment is padded and scored, then the episode ends, after
    /// `ceil(len / block_size)` steps.
    PadAndStop,
}

/// Where target references come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TargetSource {
    /// WAV files, mixed down to mono and resampled to the environment rate.
    Files { paths: Vec<PathBuf> },
    /// In-memory waveforms already at the environment rate.
    Waveforms { waveforms: Vec<Vec<f32>> },
    /// A generated sine tone.
    Sine {
        frequency_hz: f32,
        amplitude: f32,
        num_samples: usize,
    },
}

impl Default for TargetSource {
    fn default() -> Self {
        TargetSource::Sine {
            frequency_hz: 220.0,
            amplitude: 0.5,
            num_samples: 44_100,
        }
    }
}

/// Configuration of a [`VocalEnv`](crate::VocalEnv).
///
/// Defaults follow the classic vocal-tract gym setup: 44.1 kHz audio,
/// 1024-sample blocks, a 1024-point STFT with a 256-sample hop, and all eight
/// articulators under absolute control.
///
/// ```
/// use tract_gym::{EnvConfigBuilder, MappingMode};
///
/// let config = EnvConfigBuilder::default()
///     .max_steps(20usize)
///     .mapping_mode(MappingMode::Delta)
///     .build()?;
/// assert_eq!(config.block_size, 1024);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Builder)]
#[builder(default, setter(into), build_fn(private, name = "build_unvalidated"))]
#[serde(default)]
pub struct EnvConfig {
    /// Step budget of one episode.
    pub max_steps: usize,
    /// Number of action components; must equal `articulators.len()`.
    pub action_dimensionality: usize,
    pub sample_rate: u32,
    /// Samples produced per synthesizer call.
    pub block_size: usize,
    /// Trailing observation window, in samples.
    pub window_size: usize,
    pub n_fft: usize,
    pub hop_length: usize,
    pub features: FeatureKind,
    pub mapping_mode: MappingMode,
    /// Multiplier on the half-range step taken by delta and acceleration modes.
    pub delta_scale: f32,
    /// Weight kept from the previous articulator value, in `[0, 1)`.
    pub smoothing: f32,
    /// Glottal frequency at zero pitch shift, in Hz.
    pub default_frequency: f32,
    /// Controlled articulators, in action order.
    pub articulators: Vec<ArticulatorSpec>,
    pub target_source: TargetSource,
    pub tail_policy: TailPolicy,
    pub reward_metric: RewardMetric,
    /// Reward given for steps that have no target audio left to match.
    pub missing_target_penalty: f64,
    /// Ends the episode early once a step's reward reaches this value.
    #[builder(setter(into, strip_option))]
    pub success_threshold: Option<f64>,
    /// Seed for target selection; `reset(Some(seed))` overrides it.
    pub seed: u64,
}

impl Default for EnvConfig {
    fn default() -> Self {
        let articulators: Vec<ArticulatorSpec> =
            Articulator::ALL.iter().map(|&a| ArticulatorSpec::new(a)).collect();
        Self {
            max_steps: 44,
            action_dimensionality: articulators.len(),
            sample_rate: 44_100,
            block_size: 1024,
            window_size: 2048,
            n_fft: 1024,
            hop_length: 256,
            features: FeatureKind::default(),
            mapping_mode: MappingMode::default(),
            delta_scale: 1.0,
            smoothing: 0.0,
            default_frequency: 400.0,
            articulators,
            target_source: TargetSource::default(),
            tail_policy: TailPolicy::default(),
            reward_metric: RewardMetric::default(),
            missing_target_penalty: -1.0,
            success_threshold: None,
            seed: 0,
        }
    }
}

impl EnvConfigBuilder {
    /// Build the config and run [`EnvConfig::validate`] on it.
    pub fn build(&self) -> Result<EnvConfig, EnvError> {
        let config = self.build_unvalidated()?;
        config.validate()?;
        Ok(config)
    }
}

impl EnvConfig {
    /// Parse a config from a JSON string. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, EnvError> {
        let config: EnvConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config from a JSON file.
    pub fn from_json_file(path: &Path) -> Result<Self, EnvError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// Number of STFT frames in one observation window.
    pub fn frames_per_window(&self) -> usize {
        crate::spectrogram::frame_count(self.window_size, self.n_fft, self.hop_length)
    }

    /// Number of feature channels per frame.
    pub fn feature_channels(&self) -> usize {
        match self.features {
            FeatureKind::Magnitude => crate::spectrogram::rfft_channel_num(self.n_fft),
            FeatureKind::Log1pMel { n_mels } => n_mels,
        }
    }

    /// Check the config for contradictions that would break an episode.
    pub fn validate(&self) -> Result<(), EnvError> {
        let fail = |msg: String| Err(EnvError::Config(msg));

        if self.max_steps == 0 {
            return fail("max_steps must be at least 1".into());
        }
        if self.sample_rate == 0 || self.block_size == 0 {
            return fail("sample_rate and block_size must be positive".into());
        }
        if self.articulators.is_empty() {
            return fail("at least one articulator must be controlled".into());
        }
        if self.action_dimensionality != self.articulators.len() {
            return fail(format!(
                "action_dimensionality is {} but {} articulators are configured",
                self.action_dimensionality,
                self.articulators.len()
            ));
        }
        for (i, spec) in self.articulators.iter().enumerate() {
            if self.articulators[..i]
                .iter()
                .any(|other| other.articulator == spec.articulator)
            {
                return fail(format!("articulator {:?} is listed twice", spec.articulator));
            }
            spec.validate()?;
        }
        if self.n_fft == 0 || self.hop_length == 0 {
            return fail("n_fft and hop_length must be positive".into());
        }
        if self.window_size < self.n_fft {
            return fail(format!(
                "window_size ({}) must be at least n_fft ({})",
                self.window_size, self.n_fft
            ));
        }
        if self.window_size < self.block_size {
            return fail(format!(
                "window_size ({}) must cover at least one block ({})",
                self.window_size, self.block_size
            ));
        }
        if let FeatureKind::Log1pMel { n_mels } = self.features {
            if n_mels == 0 || n_mels > crate::spectrogram::rfft_channel_num(self.n_fft) {
                return fail(format!(
                    "n_mels must be between 1 and {}",
                    crate::spectrogram::rfft_channel_num(self.n_fft)
                ));
            }
        }
        if !(0.0..1.0).contains(&self.smoothing) {
            return fail(format!("smoothing must be in [0, 1), got {}", self.smoothing));
        }
        if !self.delta_scale.is_finite() || self.delta_scale <= 0.0 {
            return fail(format!("delta_scale must be positive, got {}", self.delta_scale));
        }
        if !self.default_frequency.is_finite() || self.default_frequency <= 0.0 {
            return fail(format!(
                "default_frequency must be positive, got {}",
                self.default_frequency
            ));
        }
        let top_pitch = self
            .articulators
            .iter()
            .find(|spec| spec.articulator == Articulator::PitchShift)
            .map_or(Articulator::PitchShift.default_initial(), |spec| spec.max);
        let top_frequency = self.default_frequency * top_pitch.exp2();
        let nyquist = self.sample_rate as f32 / 2.0;
        if top_frequency > nyquist {
            return fail(format!(
                "pitch range reaches {top_frequency} Hz, above the {nyquist} Hz Nyquist limit"
            ));
        }
        if !self.missing_target_penalty.is_finite() {
            return fail("missing_target_penalty must be finite".into());
        }
        if let Some(threshold) = self.success_threshold {
            if !threshold.is_finite() {
                return fail("success_threshold must be finite".into());
            }
        }
        Ok(())
    }
}
