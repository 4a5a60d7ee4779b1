//! Articulators and the mapping from agent actions onto them.

use serde::{Deserialize, Serialize};

use crate::config::MappingMode;
use crate::error::EnvError;
use crate::SynthParams;

/// A physical control of the vocal tract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Articulator {
    /// Pitch relative to the default frequency, in octaves.
    PitchShift,
    Tenseness,
    Trachea,
    Epiglottis,
    Velum,
    TongueIndex,
    TongueDiameter,
    Lips,
}

impl Articulator {
    pub const COUNT: usize = 8;

    pub const ALL: [Articulator; Self::COUNT] = [
        Articulator::PitchShift,
        Articulator::Tenseness,
        Articulator::Trachea,
        Articulator::Epiglottis,
        Articulator::Velum,
        Articulator::TongueIndex,
        Articulator::TongueDiameter,
        Articulator::Lips,
    ];

    fn index(self) -> usize {
        self as usize
    }

    /// Physical `(min, max)` range of the articulator.
    pub fn default_bounds(self) -> (f32, f32) {
        match self {
            Articulator::PitchShift => (-1.0, 1.0),
            Articulator::Tenseness => (0.0, 1.0),
            Articulator::Trachea | Articulator::Epiglottis | Articulator::Velum => (0.0, 3.5),
            Articulator::TongueIndex => (12.0, 40.0),
            Articulator::TongueDiameter => (0.0, 3.5),
            Articulator::Lips => (0.0, 1.5),
        }
    }

    /// Resting value: a neutral open vowel at the default pitch.
    pub fn default_initial(self) -> f32 {
        match self {
            Articulator::PitchShift => 0.0,
            Articulator::Tenseness => 0.6,
            Articulator::Trachea => 0.6,
            Articulator::Epiglottis => 1.1,
            Articulator::Velum => 0.01,
            Articulator::TongueIndex => 20.0,
            Articulator::TongueDiameter => 2.0,
            Articulator::Lips => 1.5,
        }
    }
}

/// Bounds and starting value of one controlled articulator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ArticulatorSpec {
    pub articulator: Articulator,
    pub min: f32,
    pub max: f32,
    pub initial: f32,
}

impl ArticulatorSpec {
    /// Spec with the articulator's physical bounds and resting value.
    pub fn new(articulator: Articulator) -> Self {
        let (min, max) = articulator.default_bounds();
        Self {
            articulator,
            min,
            max,
            initial: articulator.default_initial(),
        }
    }

    pub fn with_bounds(articulator: Articulator, min: f32, max: f32, initial: f32) -> Self {
        Self {
            articulator,
            min,
            max,
            initial,
        }
    }

    fn half_range(&self) -> f32 {
        (self.max - self.min) * 0.5
    }

    pub(crate) fn validate(&self) -> Result<(), EnvError> {
        if !(self.min.is_finite() && self.max.is_finite() && self.min < self.max) {
            return Err(EnvError::Config(format!(
                "{:?}: bounds [{}, {}] are not a finite, non-empty range",
                self.articulator, self.min, self.max
            )));
        }
        if !(self.min..=self.max).contains(&self.initial) {
            return Err(EnvError::Config(format!(
                "{:?}: initial value {} lies outside [{}, {}]",
                self.articulator, self.initial, self.min, self.max
            )));
        }
        Ok(())
    }
}

/// Per-episode tract configuration.
///
/// Holds a value for every [`Articulator`], including the ones the agent does
/// not control, plus the velocities used by [`MappingMode::Acceleration`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ArticulatoryState {
    values: [f32; Articulator::COUNT],
    velocities: [f32; Articulator::COUNT],
}

impl ArticulatoryState {
    /// Resting state, with controlled articulators at their configured initial values.
    pub fn initial(specs: &[ArticulatorSpec]) -> Self {
        let mut values = Articulator::ALL.map(Articulator::default_initial);
        for spec in specs {
            values[spec.articulator.index()] = spec.initial;
        }
        Self {
            values,
            velocities: [0.0; Articulator::COUNT],
        }
    }

    pub fn get(&self, articulator: Articulator) -> f32 {
        self.values[articulator.index()]
    }

    pub fn velocity(&self, articulator: Articulator) -> f32 {
        self.velocities[articulator.index()]
    }

    /// Values of the given articulators, in order.
    pub fn values_of(&self, specs: &[ArticulatorSpec]) -> Vec<f32> {
        specs.iter().map(|s| self.get(s.articulator)).collect()
    }

    /// Synthesizer parameters for this state.
    pub fn to_params(&self, default_frequency: f32) -> SynthParams {
        SynthParams {
            frequency_hz: default_frequency * self.get(Articulator::PitchShift).exp2(),
            tenseness: self.get(Articulator::Tenseness),
            trachea: self.get(Articulator::Trachea),
            epiglottis: self.get(Articulator::Epiglottis),
            velum: self.get(Articulator::Velum),
            tongue_index: self.get(Articulator::TongueIndex),
            tongue_diameter: self.get(Articulator::TongueDiameter),
            lips: self.get(Articulator::Lips),
        }
    }
}

/// Output of one [`ActionMapper::map`] call.
#[derive(Debug, Clone, Copy)]
pub struct Mapped {
    pub params: SynthParams,
    pub state: ArticulatoryState,
    /// Number of action components that fell outside `[-1, 1]` or were not finite.
    pub clamped: usize,
}

/// Turns normalized actions into bounded articulator values.
#[derive(Debug, Clone)]
pub struct ActionMapper {
    specs: Vec<ArticulatorSpec>,
    mode: MappingMode,
    delta_scale: f32,
    smoothing: f32,
    default_frequency: f32,
}

impl ActionMapper {
    pub fn new(
        specs: Vec<ArticulatorSpec>,
        mode: MappingMode,
        delta_scale: f32,
        smoothing: f32,
        default_frequency: f32,
    ) -> Self {
        Self {
            specs,
            mode,
            delta_scale,
            smoothing,
            default_frequency,
        }
    }

    pub fn from_config(config: &crate::EnvConfig) -> Self {
        Self::new(
            config.articulators.clone(),
            config.mapping_mode,
            config.delta_scale,
            config.smoothing,
            config.default_frequency,
        )
    }

    pub fn specs(&self) -> &[ArticulatorSpec] {
        &self.specs
    }

    /// Map `action` onto the state following `prev`.
    ///
    /// Out-of-range components are clamped to `[-1, 1]` and non-finite ones
    /// read as `0.0`; the only failure is a wrong number of components.
    pub fn map(&self, action: &[f32], prev: &ArticulatoryState) -> Result<Mapped, EnvError> {
        if action.len() != self.specs.len() {
            return Err(EnvError::ActionShape {
                expected: self.specs.len(),
                actual: action.len(),
            });
        }

        let mut state = *prev;
        let mut clamped = 0;

        for (spec, &raw) in self.specs.iter().zip(action) {
            let a = if raw.is_finite() { raw.clamp(-1.0, 1.0) } else { 0.0 };
            if a != raw {
                clamped += 1;
            }

            let idx = spec.articulator.index();
            let previous = prev.values[idx];
            let target = match self.mode {
                MappingMode::Absolute => spec.min + (a + 1.0) * spec.half_range(),
                MappingMode::Delta => previous + a * spec.half_range() * self.delta_scale,
                MappingMode::Acceleration => {
                    let velocity =
                        prev.velocities[idx] + a * spec.half_range() * self.delta_scale;
                    state.velocities[idx] = velocity;
                    previous + velocity
                }
            };

            let bounded = target.clamp(spec.min, spec.max);
            if bounded != target {
                // Hitting a wall stops the articulator.
                state.velocities[idx] = 0.0;
            }
            let smoothed = self.smoothing * previous + (1.0 - self.smoothing) * bounded;
            state.values[idx] = smoothed.clamp(spec.min, spec.max);
        }

        log::trace!("mapped action {action:?} -> {:?} ({clamped} clamped)", state.values);

        Ok(Mapped {
            params: state.to_params(self.default_frequency),
            state,
            clamped,
        })
    }
}
