use crate::{SynthParams, VocalTract};

use super::glottis::Glottis;
use super::resonator::Resonator;

/// Bandwidths of F1..F3, in Hz.
const FORMANT_BANDWIDTHS: [f32; 3] = [80.0, 100.0, 140.0];
/// Relative level of F1..F3 in the oral mix.
const FORMANT_GAINS: [f32; 3] = [1.0, 0.6, 0.3];
const NASAL_FORMANT_HZ: f32 = 270.0;
const NASAL_BANDWIDTH_HZ: f32 = 100.0;
/// Resonators are retuned every this many samples.
const RETUNE_INTERVAL: usize = 16;
const DEFAULT_SEED: u64 = 0x7ac7;

/// Acoustic targets derived from one parameter set.
#[derive(Debug, Clone, Copy)]
struct Targets {
    frequency: f32,
    tenseness: f32,
    aspiration: f32,
    oral_gain: f32,
    nasal_mix: f32,
    formants: [f32; 3],
}

impl Targets {
    fn from_params(p: &SynthParams) -> Self {
        let unit = |v: f32, max: f32| (v / max).clamp(0.0, 1.0);
        let open = unit(p.tongue_diameter, 3.5);
        let front = unit(p.tongue_index - 12.0, 28.0);
        let rounding = 1.0 - unit(p.lips, 1.5);
        let pharynx = unit(p.epiglottis, 3.5);

        let f1 = (250.0 + 550.0 * open) * (1.0 + 0.15 * (1.0 - pharynx)) * (1.0 - 0.15 * rounding);
        let f2 = (800.0 + 1500.0 * front) * (1.0 - 0.25 * rounding);
        let f3 = (2300.0 + 500.0 * front) * (1.0 - 0.1 * rounding);

        Self {
            frequency: p.frequency_hz,
            tenseness: p.tenseness.clamp(0.0, 1.0),
            aspiration: (1.0 - p.tenseness.clamp(0.0, 1.0))
                * 0.25
                * (0.5 + 0.5 * unit(p.trachea, 3.5)),
            oral_gain: unit(p.lips, 0.15),
            nasal_mix: unit(p.velum, 3.5),
            formants: [f1, f2, f3],
        }
    }

    fn lerp(&self, to: &Self, t: f32) -> Self {
        let mix = |a: f32, b: f32| a + (b - a) * t;
        Self {
            frequency: mix(self.frequency, to.frequency),
            tenseness: mix(self.tenseness, to.tenseness),
            aspiration: mix(self.aspiration, to.aspiration),
            oral_gain: mix(self.oral_gain, to.oral_gain),
            nasal_mix: mix(self.nasal_mix, to.nasal_mix),
            formants: [
                mix(self.formants[0], to.formants[0]),
                mix(self.formants[1], to.formants[1]),
                mix(self.formants[2], to.formants[2]),
            ],
        }
    }
}

/// Formant vocal-tract engine.
///
/// # Quick Start
///
/// ```rust
/// use tract_gym::{engines::formant::FormantTract, VocalTract};
///
/// let tract = FormantTract::new(16_000, 256);
/// assert_eq!(tract.block_size(), 256);
/// ```
pub struct FormantTract {
    sample_rate: u32,
    block_size: usize,
    glottis: Glottis,
    formants: [Resonator; 3],
    nasal: Resonator,
    previous: Option<Targets>,
}

impl FormantTract {
    /// Create an engine producing `block_size` samples per call at `sample_rate`.
    pub fn new(sample_rate: u32, block_size: usize) -> Self {
        Self::with_seed(sample_rate, block_size, DEFAULT_SEED)
    }

    /// Create an engine whose aspiration noise is drawn from `seed`.
    pub fn with_seed(sample_rate: u32, block_size: usize, seed: u64) -> Self {
        Self {
            sample_rate,
            block_size,
            glottis: Glottis::new(seed),
            formants: [Resonator::default(); 3],
            nasal: Resonator::default(),
            previous: None,
        }
    }

    fn retune(&mut self, targets: &Targets) {
        let sr = self.sample_rate as f32;
        for ((resonator, &freq), &bw) in self
            .formants
            .iter_mut()
            .zip(&targets.formants)
            .zip(&FORMANT_BANDWIDTHS)
        {
            resonator.tune(freq, bw, sr);
        }
        self.nasal.tune(NASAL_FORMANT_HZ, NASAL_BANDWIDTH_HZ, sr);
    }
}

impl VocalTract for FormantTract {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn block_size(&self) -> usize {
        self.block_size
    }

    fn reset(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.glottis.reset();
        for resonator in &mut self.formants {
            resonator.reset();
        }
        self.nasal.reset();
        self.previous = None;
        Ok(())
    }

    fn advance(&mut self, params: &SynthParams) -> Result<Vec<f32>, Box<dyn std::error::Error>> {
        let to = Targets::from_params(params);
        let from = self.previous.unwrap_or(to);
        let sr = self.sample_rate as f32;
        let n = self.block_size;

        let mut block = Vec::with_capacity(n);
        for i in 0..n {
            let current = from.lerp(&to, (i + 1) as f32 / n as f32);
            if i % RETUNE_INTERVAL == 0 {
                self.retune(&current);
            }

            let source = self
                .glottis
                .next(current.frequency, current.tenseness, current.aspiration, sr);
            let oral: f32 = self
                .formants
                .iter_mut()
                .zip(&FORMANT_GAINS)
                .map(|(resonator, gain)| resonator.process(source) * gain)
                .sum();
            let nasal = self.nasal.process(source);

            let mixed = (1.0 - current.nasal_mix) * current.oral_gain * oral
                + current.nasal_mix * nasal;
            block.push((mixed * 0.8).tanh());
        }

        self.previous = Some(to);
        Ok(block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ArticulatoryState, EnvConfig};

    fn neutral() -> SynthParams {
        ArticulatoryState::initial(&EnvConfig::default().articulators).to_params(220.0)
    }

    fn energy(block: &[f32]) -> f32 {
        block.iter().map(|s| s * s).sum()
    }

    #[test]
    fn produces_bounded_blocks_of_fixed_length() {
        let mut tract = FormantTract::new(16_000, 256);
        for _ in 0..8 {
            let block = tract.advance(&neutral()).unwrap();
            assert_eq!(block.len(), 256);
            assert!(block.iter().all(|s| s.is_finite() && s.abs() <= 1.0));
        }
    }

    #[test]
    fn reset_restores_initial_output() {
        let mut tract = FormantTract::new(16_000, 128);
        let first: Vec<Vec<f32>> = (0..3).map(|_| tract.advance(&neutral()).unwrap()).collect();
        tract.reset().unwrap();
        let second: Vec<Vec<f32>> = (0..3).map(|_| tract.advance(&neutral()).unwrap()).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn voiced_output_is_audible() {
        let mut tract = FormantTract::new(16_000, 512);
        tract.advance(&neutral()).unwrap();
        let block = tract.advance(&neutral()).unwrap();
        assert!(energy(&block) > 1e-3);
    }

    #[test]
    fn closed_lips_without_nasal_flow_are_quieter() {
        let mut open = FormantTract::new(16_000, 512);
        let mut closed = FormantTract::new(16_000, 512);
        let shut = SynthParams {
            lips: 0.0,
            velum: 0.0,
            ..neutral()
        };
        open.advance(&neutral()).unwrap();
        closed.advance(&shut).unwrap();
        let loud = energy(&open.advance(&neutral()).unwrap());
        let quiet = energy(&closed.advance(&shut).unwrap());
        assert!(quiet < loud * 0.1);
    }

    #[test]
    fn drives_a_full_episode_reproducibly() {
        use crate::{Environment, VocalEnv};

        let config = EnvConfig {
            sample_rate: 16_000,
            block_size: 256,
            window_size: 512,
            n_fft: 256,
            hop_length: 64,
            max_steps: 6,
            ..Default::default()
        };
        let run = || {
            let tract = FormantTract::new(config.sample_rate, config.block_size);
            let mut env = VocalEnv::new(config.clone(), tract).unwrap();
            env.reset(Some(1)).unwrap();
            let mut rewards = Vec::new();
            for i in 0..6 {
                let action = vec![(i as f32 * 0.3).sin(); 8];
                let result = env.step(&action).unwrap();
                assert!(result.reward.is_finite());
                rewards.push(result.reward);
            }
            (rewards, env.audio().to_vec())
        };
        let (rewards, audio) = run();
        assert_eq!(audio.len(), 6 * 256);
        assert_eq!((rewards, audio), run());
    }

    #[test]
    fn tongue_position_changes_the_sound() {
        let mut back = FormantTract::new(16_000, 256);
        let mut front = FormantTract::new(16_000, 256);
        let fronted = SynthParams {
            tongue_index: 38.0,
            ..neutral()
        };
        assert_ne!(
            back.advance(&neutral()).unwrap(),
            front.advance(&fronted).unwrap()
        );
    }
}
