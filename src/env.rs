//! The episode controller.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;

use crate::articulation::{ActionMapper, ArticulatoryState};
use crate::config::{EnvConfig, TailPolicy};
use crate::error::EnvError;
use crate::observation::{Observation, ObservationBuilder};
use crate::reward::RewardEvaluator;
use crate::spaces::{self, ActionSpace, ObservationSpace};
use crate::target::{TargetBank, TargetReference};
use crate::{SynthParams, VocalTract};

/// Lifecycle of an episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EpisodeState {
    /// Constructed, never reset.
    Uninitialized,
    /// Accepting `step` calls.
    Running,
    /// Terminated; `reset` is required before stepping again.
    Done,
}

/// Diagnostics returned with every step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepInfo {
    /// Steps completed in this episode, including this one.
    pub step: usize,
    pub reward_components: BTreeMap<String, f64>,
    /// Action components that were clamped into `[-1, 1]`.
    pub clamped_components: usize,
    pub target_exhausted: bool,
    /// The success threshold ended the episode.
    pub success: bool,
    /// Parameters sent to the synthesizer.
    pub params: SynthParams,
}

/// Everything one `step` returns.
#[derive(Debug, Clone)]
pub struct StepResult {
    pub observation: Observation,
    pub reward: f64,
    pub done: bool,
    /// The episode ran out of steps rather than reaching the success threshold.
    pub truncated: bool,
    pub info: StepInfo,
}

/// Common interface for step-based environments.
pub trait Environment {
    /// Start a new episode and return its first observation.
    ///
    /// `Some(seed)` reseeds target selection; `None` continues the current stream.
    fn reset(&mut self, seed: Option<u64>) -> Result<Observation, EnvError>;

    /// Advance the episode by one action.
    fn step(&mut self, action: &[f32]) -> Result<StepResult, EnvError>;

    fn action_space(&self) -> &ActionSpace;

    fn observation_space(&self) -> &ObservationSpace;
}

/// Vocal-tract imitation environment.
///
/// Owns one synthesizer; run one `VocalEnv` per worker for parallel rollouts.
pub struct VocalEnv<T: VocalTract> {
    config: EnvConfig,
    engine: T,
    mapper: ActionMapper,
    observer: ObservationBuilder,
    evaluator: RewardEvaluator,
    targets: TargetBank,
    action_space: ActionSpace,
    observation_space: ObservationSpace,

    state: EpisodeState,
    articulation: ArticulatoryState,
    audio: Vec<f32>,
    target: Option<TargetReference>,
    current_step: usize,
    episode_steps: usize,
}

impl<T: VocalTract> VocalEnv<T> {
    /// Build an environment, checking the config, the engine contract and
    /// the observation shape up front.
    pub fn new(config: EnvConfig, engine: T) -> Result<Self, EnvError> {
        config.validate()?;

        if engine.sample_rate() != config.sample_rate {
            return Err(EnvError::Config(format!(
                "engine runs at {} Hz but sample_rate is {}",
                engine.sample_rate(),
                config.sample_rate
            )));
        }
        if engine.block_size() != config.block_size {
            return Err(EnvError::Config(format!(
                "engine produces {}-sample blocks but block_size is {}",
                engine.block_size(),
                config.block_size
            )));
        }

        let targets = TargetBank::load(&config.target_source, config.sample_rate, config.seed)?;
        let needed = config.max_steps * config.block_size;
        if targets.shortest() < needed {
            log::warn!(
                "Shortest target has {} samples, fewer than the {} an episode of {} steps covers",
                targets.shortest(),
                needed,
                config.max_steps
            );
        }

        let mapper = ActionMapper::from_config(&config);
        let observer = ObservationBuilder::from_config(&config);
        let evaluator = RewardEvaluator::from_config(&config);
        let action_space = spaces::action_space(&config.articulators);
        let observation_space = ObservationSpace::from_config(&config);
        let articulation = ArticulatoryState::initial(&config.articulators);

        let probe = observer.build(&[], &[], &articulation);
        if !observation_space.matches_shape(&probe)
            || probe.to_vec().len() != observation_space.flat_len()
        {
            return Err(EnvError::Config(format!(
                "feature extractor produced a {:?} spectrogram, observation space declares {:?}",
                probe.generated_spectrogram.dim(),
                observation_space.generated_spectrogram.shape
            )));
        }

        log::info!(
            "Vocal environment ready: {} Hz, {}-sample blocks, {} steps, {} action dims, {} observation values",
            config.sample_rate,
            config.block_size,
            config.max_steps,
            action_space.len(),
            observation_space.flat_len()
        );

        Ok(Self {
            episode_steps: config.max_steps,
            config,
            engine,
            mapper,
            observer,
            evaluator,
            targets,
            action_space,
            observation_space,
            state: EpisodeState::Uninitialized,
            articulation,
            audio: Vec::new(),
            target: None,
            current_step: 0,
        })
    }

    pub fn config(&self) -> &EnvConfig {
        &self.config
    }

    pub fn episode_state(&self) -> EpisodeState {
        self.state
    }

    pub fn articulation(&self) -> &ArticulatoryState {
        &self.articulation
    }

    /// Audio generated so far in this episode.
    pub fn audio(&self) -> &[f32] {
        &self.audio
    }

    pub fn target(&self) -> Option<&TargetReference> {
        self.target.as_ref()
    }

    pub fn current_step(&self) -> usize {
        self.current_step
    }

    /// Step budget of the current episode, after the tail policy is applied.
    pub fn max_steps(&self) -> usize {
        self.episode_steps
    }

    pub fn reward_range(&self) -> (f64, f64) {
        let (low, high) = self.evaluator.metric().range();
        let penalty = self.config.missing_target_penalty;
        (low.min(penalty), high.max(penalty))
    }

    fn episode_length(&self, target: &TargetReference) -> usize {
        match self.config.tail_policy {
            TailPolicy::PadSilence => self.config.max_steps,
            TailPolicy::Truncate => self
                .config
                .max_steps
                .min((target.len() / self.config.block_size).max(1)),
            TailPolicy::PadAndStop => self
                .config
                .max_steps
                .min(target.segments(self.config.block_size)),
        }
    }
}

impl<T: VocalTract> Environment for VocalEnv<T> {
    fn reset(&mut self, seed: Option<u64>) -> Result<Observation, EnvError> {
        if let Some(seed) = seed {
            self.targets.reseed(seed);
        }

        self.engine.reset().map_err(EnvError::Engine)?;
        self.articulation = ArticulatoryState::initial(self.mapper.specs());
        self.audio.clear();
        self.current_step = 0;

        let target = self.targets.select();
        self.episode_steps = self.episode_length(&target);
        log::debug!(
            "Reset: target {} ({} samples), {} steps",
            target.index,
            target.len(),
            self.episode_steps
        );

        let observation = self
            .observer
            .build(&self.audio, &target.samples, &self.articulation);
        self.target = Some(target);
        self.state = EpisodeState::Running;
        Ok(observation)
    }

    fn step(&mut self, action: &[f32]) -> Result<StepResult, EnvError> {
        let target: Arc<[f32]> = match (self.state, &self.target) {
            (EpisodeState::Running, Some(target)) => Arc::clone(&target.samples),
            _ => return Err(EnvError::InvalidState(self.state)),
        };

        let mapped = self.mapper.map(action, &self.articulation)?;
        let block = self.engine.advance(&mapped.params).map_err(EnvError::Engine)?;
        if block.len() != self.config.block_size {
            return Err(EnvError::BlockLength {
                expected: self.config.block_size,
                actual: block.len(),
            });
        }

        self.articulation = mapped.state;
        self.audio.extend_from_slice(&block);

        let step_index = self.current_step + 1;
        let generated = self.observer.features(&self.audio);
        let outcome = self
            .evaluator
            .evaluate_with_features(&self.audio, &generated, &target, step_index);
        let observation = self
            .observer
            .build_with_features(generated, &self.audio, &target, &self.articulation);
        self.current_step = step_index;

        let success = !outcome.target_exhausted
            && self
                .config
                .success_threshold
                .is_some_and(|threshold| outcome.reward >= threshold);
        let out_of_steps = self.current_step >= self.episode_steps;
        let done = success || out_of_steps;
        if done {
            self.state = EpisodeState::Done;
        }

        log::trace!(
            "Step {}/{}: reward {:.5}, done {}",
            self.current_step,
            self.episode_steps,
            outcome.reward,
            done
        );

        Ok(StepResult {
            observation,
            reward: outcome.reward,
            done,
            truncated: out_of_steps && !success,
            info: StepInfo {
                step: self.current_step,
                reward_components: outcome.components,
                clamped_components: mapped.clamped,
                target_exhausted: outcome.target_exhausted,
                success,
                params: mapped.params,
            },
        })
    }

    fn action_space(&self) -> &ActionSpace {
        &self.action_space
    }

    fn observation_space(&self) -> &ObservationSpace {
        &self.observation_space
    }
}
