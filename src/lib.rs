//! # tract-gym
//!
//! A reinforcement-learning environment built around an articulatory
//! vocal-tract synthesizer. An agent drives the tract shape, pitch and
//! tenseness one block at a time and is rewarded for sounding like a target
//! utterance.
//!
//! ## Features
//!
//! - **Step-based episodes**: `reset` / `step` with a fixed step budget
//! - **Pluggable synthesizers**: anything implementing [`VocalTract`]
//! - **Spectral observations**: STFT magnitude or log1p-mel features over a trailing window
//! - **Deterministic**: seeded target selection, no hidden randomness
//!
//! ## Quick Start
//!
//! ```toml
//! [dependencies]
//! tract-gym = { version = "2026.2", features = ["formant"] }
//! ```
//!
//! ```ignore
//! use tract_gym::{engines::formant::FormantTract, EnvConfig, Environment, VocalEnv};
//!
//! let config = EnvConfig::default();
//! let engine = FormantTract::new(config.sample_rate, config.block_size);
//! let mut env = VocalEnv::new(config, engine)?;
//!
//! let _obs = env.reset(Some(7))?;
//! let action = vec![0.0; env.action_space().len()];
//! let result = env.step(&action)?;
//! println!("reward {} done {}", result.reward, result.done);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod articulation;
pub mod config;
pub mod engines;
pub mod env;
pub mod error;
pub mod observation;
pub mod reward;
pub mod spaces;
pub mod spectrogram;
pub mod target;

pub use articulation::{ActionMapper, Articulator, ArticulatorSpec, ArticulatoryState};
pub use config::{
    EnvConfig, EnvConfigBuilder, FeatureKind, MappingMode, RewardMetric, TailPolicy, TargetSource,
};
pub use env::{EpisodeState, Environment, StepInfo, StepResult, VocalEnv};
pub use error::EnvError;
pub use observation::{Observation, ObservationBuilder};
pub use reward::{RewardEvaluator, RewardOutcome};
pub use spaces::{ActionSpace, BoxSpace, ObservationSpace};
pub use target::{TargetBank, TargetReference};

/// Physically valid control values for one synthesizer call.
///
/// Produced by the [`ActionMapper`] from a clamped [`ArticulatoryState`], so
/// every field is already inside its articulator's bounds.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct SynthParams {
    /// Glottal frequency in Hz
    pub frequency_hz: f32,
    /// Glottal tenseness, 0 (breathy) to 1 (pressed)
    pub tenseness: f32,
    pub trachea: f32,
    pub epiglottis: f32,
    pub velum: f32,
    /// Position of the tongue body along the tract, in tract segments
    pub tongue_index: f32,
    pub tongue_diameter: f32,
    pub lips: f32,
}

/// Common interface for articulatory synthesizers.
///
/// An engine is stateful: resonator and filter memory carries from one
/// [`advance`](VocalTract::advance) call to the next, so it must be
/// [`reset`](VocalTract::reset) at the start of every episode.
pub trait VocalTract {
    /// Output sample rate in Hz.
    fn sample_rate(&self) -> u32;

    /// Number of samples produced by every `advance` call.
    fn block_size(&self) -> usize;

    /// Clear all internal state so the next block starts from silence.
    fn reset(&mut self) -> Result<(), Box<dyn std::error::Error>>;

    /// Synthesize the next block of audio with the given parameters.
    fn advance(&mut self, params: &SynthParams) -> Result<Vec<f32>, Box<dyn std::error::Error>>;
}

impl<T: VocalTract + ?Sized> VocalTract for Box<T> {
    fn sample_rate(&self) -> u32 {
        (**self).sample_rate()
    }

    fn block_size(&self) -> usize {
        (**self).block_size()
    }

    fn reset(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        (**self).reset()
    }

    fn advance(&mut self, params: &SynthParams) -> Result<Vec<f32>, Box<dyn std::error::Error>> {
        (**self).advance(params)
    }
}
