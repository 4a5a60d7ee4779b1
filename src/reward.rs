use std::collections::BTreeMap;

use ndarray::Array2;

use crate::config::{EnvConfig, RewardMetric};
use crate::spectrogram::{trailing_window, FeatureExtractor};

/// Reward of one step, with the raw numbers it was computed from.
#[derive(Debug, Clone, PartialEq)]
pub struct RewardOutcome {
    pub reward: f64,
    pub components: BTreeMap<String, f64>,
    /// The step's segment starts past the end of the target.
    pub target_exhausted: bool,
}

/// Scores generated audio against the target reference.
pub struct RewardEvaluator {
    extractor: FeatureExtractor,
    metric: RewardMetric,
    block_size: usize,
    window_size: usize,
    missing_target_penalty: f64,
}

impl RewardEvaluator {
    pub fn from_config(config: &EnvConfig) -> Self {
        Self {
            extractor: FeatureExtractor::new(
                config.features,
                config.n_fft,
                config.hop_length,
                config.sample_rate,
            ),
            metric: config.reward_metric,
            block_size: config.block_size,
            window_size: config.window_size,
            missing_target_penalty: config.missing_target_penalty,
        }
    }

    pub fn metric(&self) -> RewardMetric {
        self.metric
    }

    /// Reward after `step_index` steps, i.e. for the block ending at
    /// `step_index * block_size`. Both sides are windowed identically, with
    /// silence before the first sample and after the end of the target.
    pub fn evaluate(&self, buffer: &[f32], target: &[f32], step_index: usize) -> RewardOutcome {
        self.score(buffer, None, target, step_index)
    }

    /// Like [`evaluate`](Self::evaluate), with the features of the generated
    /// window ending at `step_index * block_size` already computed.
    pub fn evaluate_with_features(
        &self,
        buffer: &[f32],
        generated: &Array2<f32>,
        target: &[f32],
        step_index: usize,
    ) -> RewardOutcome {
        self.score(buffer, Some(generated), target, step_index)
    }

    fn score(
        &self,
        buffer: &[f32],
        generated: Option<&Array2<f32>>,
        target: &[f32],
        step_index: usize,
    ) -> RewardOutcome {
        let end = step_index * self.block_size;
        let segment_start = end.saturating_sub(self.block_size);
        let mut components = BTreeMap::new();

        if segment_start >= target.len() {
            components.insert("penalty".to_string(), self.missing_target_penalty);
            return RewardOutcome {
                reward: self.missing_target_penalty,
                components,
                target_exhausted: true,
            };
        }

        let generated_block = trailing_window(buffer, end, self.block_size);
        let target_block = trailing_window(target, end, self.block_size);
        components.insert("generated_rms".to_string(), rms(&generated_block));
        components.insert("target_rms".to_string(), rms(&target_block));

        let reward = match self.metric {
            RewardMetric::SpectralDistance | RewardMetric::SpectralL1 => {
                let extracted;
                let generated = match generated {
                    Some(features) => features,
                    None => {
                        extracted = self
                            .extractor
                            .extract(&trailing_window(buffer, end, self.window_size));
                        &extracted
                    }
                };
                let wanted = self
                    .extractor
                    .extract(&trailing_window(target, end, self.window_size));
                let n = generated.len().max(1) as f64;
                let (mse, mae) = generated.iter().zip(wanted.iter()).fold(
                    (0.0f64, 0.0f64),
                    |(sq, abs), (&g, &w)| {
                        let d = (g - w) as f64;
                        (sq + d * d, abs + d.abs())
                    },
                );
                let (mse, mae) = (mse / n, mae / n);
                components.insert("spectral_mse".to_string(), mse);
                components.insert("spectral_mae".to_string(), mae);
                if self.metric == RewardMetric::SpectralDistance {
                    -mse
                } else {
                    -mae
                }
            }
            RewardMetric::Correlation => {
                let r = pearson(&generated_block, &target_block);
                components.insert("correlation".to_string(), r);
                r
            }
        };

        RewardOutcome {
            reward,
            components,
            target_exhausted: false,
        }
    }
}

fn rms(samples: &[f32]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
    (sum / samples.len() as f64).sqrt()
}

/// Pearson correlation; 0 when either side is constant.
fn pearson(a: &[f32], b: &[f32]) -> f64 {
    let n = a.len().min(b.len());
    if n == 0 {
        return 0.0;
    }
    let mean = |x: &[f32]| x[..n].iter().map(|&v| v as f64).sum::<f64>() / n as f64;
    let (ma, mb) = (mean(a), mean(b));

    let mut cov = 0.0;
    let mut va = 0.0;
    let mut vb = 0.0;
    for (&x, &y) in a[..n].iter().zip(&b[..n]) {
        let dx = x as f64 - ma;
        let dy = y as f64 - mb;
        cov += dx * dy;
        va += dx * dx;
        vb += dy * dy;
    }

    if va <= f64::EPSILON || vb <= f64::EPSILON {
        return 0.0;
    }
    (cov / (va.sqrt() * vb.sqrt())).clamp(-1.0, 1.0)
}
