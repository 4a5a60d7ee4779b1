//! Target references and where they come from.

use std::path::Path;
use std::sync::Arc;

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

use crate::config::TargetSource;
use crate::error::EnvError;

/// The utterance an episode is scored against. Shared and immutable.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetReference {
    /// Position of this target in its bank.
    pub index: usize,
    pub samples: Arc<[f32]>,
}

impl TargetReference {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Number of `block_size` segments, counting a final partial one.
    /// At least 1 for a non-empty target.
    pub fn segments(&self, block_size: usize) -> usize {
        self.len().div_ceil(block_size)
    }
}

/// All candidate targets, loaded once, plus the seeded generator that picks
/// one per episode.
pub struct TargetBank {
    waveforms: Vec<Arc<[f32]>>,
    rng: Pcg32,
}

impl TargetBank {
    /// Load every target of `source`. Samples are clamped to `[-1, 1]`.
    pub fn load(source: &TargetSource, sample_rate: u32, seed: u64) -> Result<Self, EnvError> {
        let mut waveforms: Vec<Vec<f32>> = match source {
            TargetSource::Files { paths } => paths
                .iter()
                .map(|p| load_wav(p, sample_rate))
                .collect::<Result<_, _>>()?,
            TargetSource::Waveforms { waveforms } => waveforms.clone(),
            TargetSource::Sine {
                frequency_hz,
                amplitude,
                num_samples,
            } => vec![sine(*frequency_hz, *amplitude, *num_samples, sample_rate)],
        };

        if waveforms.is_empty() {
            return Err(EnvError::Config("target source provides no targets".into()));
        }
        if let Some(i) = waveforms.iter().position(|w| w.is_empty()) {
            return Err(EnvError::Config(format!("target {i} has no samples")));
        }

        for (i, waveform) in waveforms.iter_mut().enumerate() {
            let clipped = waveform.iter().filter(|s| s.abs() > 1.0).count();
            if clipped > 0 {
                log::warn!("Target {i}: clamping {clipped} samples into [-1, 1]");
                waveform.iter_mut().for_each(|s| *s = s.clamp(-1.0, 1.0));
            }
        }

        log::info!("Loaded {} target(s)", waveforms.len());
        Ok(Self {
            waveforms: waveforms.into_iter().map(Arc::from).collect(),
            rng: Pcg32::seed_from_u64(seed),
        })
    }

    pub fn len(&self) -> usize {
        self.waveforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waveforms.is_empty()
    }

    /// Length of the shortest target, in samples.
    pub fn shortest(&self) -> usize {
        self.waveforms.iter().map(|w| w.len()).min().unwrap_or(0)
    }

    pub fn reseed(&mut self, seed: u64) {
        self.rng = Pcg32::seed_from_u64(seed);
    }

    /// Pick the target for the next episode.
    pub fn select(&mut self) -> TargetReference {
        let index = if self.waveforms.len() == 1 {
            0
        } else {
            self.rng.gen_range(0..self.waveforms.len())
        };
        TargetReference {
            index,
            samples: Arc::clone(&self.waveforms[index]),
        }
    }
}

fn sine(frequency_hz: f32, amplitude: f32, num_samples: usize, sample_rate: u32) -> Vec<f32> {
    let step = 2.0 * std::f64::consts::PI * frequency_hz as f64 / sample_rate as f64;
    (0..num_samples)
        .map(|i| (amplitude as f64 * (step * i as f64).sin()) as f32)
        .collect()
}

/// Read a WAV file as mono samples in `[-1, 1]` at `sample_rate`.
pub fn load_wav(path: &Path, sample_rate: u32) -> Result<Vec<f32>, EnvError> {
    let reader = hound::WavReader::open(path)?;
    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Int => {
            let max_val = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max_val))
                .collect::<Result<_, _>>()?
        }
        hound::SampleFormat::Float => reader.into_samples::<f32>().collect::<Result<_, _>>()?,
    };

    let mono: Vec<f32> = interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect();

    let samples = if spec.sample_rate == sample_rate {
        mono
    } else {
        log::warn!(
            "Resampling {} from {} Hz to {} Hz",
            path.display(),
            spec.sample_rate,
            sample_rate
        );
        resample_linear(&mono, spec.sample_rate, sample_rate)
    };

    Ok(samples.into_iter().map(|s| s.clamp(-1.0, 1.0)).collect())
}

/// Linear-interpolation resampler. Output length is `round(len * to / from)`.
pub fn resample_linear(samples: &[f32], from: u32, to: u32) -> Vec<f32> {
    if samples.is_empty() || from == to {
        return samples.to_vec();
    }
    let ratio = from as f64 / to as f64;
    let out_len = ((samples.len() as f64) * to as f64 / from as f64).round() as usize;
    let last = samples.len() - 1;

    (0..out_len)
        .map(|i| {
            let pos = i as f64 * ratio;
            let lo = (pos.floor() as usize).min(last);
            let hi = (lo + 1).min(last);
            let frac = (pos - lo as f64) as f32;
            samples[lo] + (samples[hi] - samples[lo]) * frac
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn write_wav(path: &Path, rate: u32, channels: u16, frames: &[i16]) {
        let spec = hound::WavSpec {
            channels,
            sample_rate: rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for &s in frames {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn loads_stereo_int_wav_as_mono() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        write_wav(&path, 8_000, 2, &[16384, 0, -16384, -16384, 32767, 32767]);

        let samples = load_wav(&path, 8_000).unwrap();
        assert_eq!(samples.len(), 3);
        assert!((samples[0] - 0.25).abs() < 1e-4);
        assert!((samples[1] + 0.5).abs() < 1e-4);
        assert!(samples[2] <= 1.0);
    }

    #[test]
    fn resamples_to_environment_rate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mono.wav");
        write_wav(&path, 8_000, 1, &[0; 800]);
        assert_eq!(load_wav(&path, 16_000).unwrap().len(), 1600);
    }

    #[test]
    fn linear_resampling_interpolates() {
        let up = resample_linear(&[0.0, 1.0], 1, 2);
        assert_eq!(up, vec![0.0, 0.5, 1.0, 1.0]);
        assert_eq!(resample_linear(&[1.0; 10], 4, 2).len(), 5);
    }

    #[test]
    fn missing_file_is_an_error() {
        let source = TargetSource::Files {
            paths: vec![PathBuf::from("/nonexistent/target.wav")],
        };
        assert!(TargetBank::load(&source, 44_100, 0).is_err());
    }

    #[test]
    fn empty_source_is_a_config_error() {
        let source = TargetSource::Waveforms { waveforms: vec![] };
        assert!(matches!(
            TargetBank::load(&source, 44_100, 0),
            Err(EnvError::Config(_))
        ));
    }

    #[test]
    fn selection_is_reproducible_per_seed() {
        let source = TargetSource::Waveforms {
            waveforms: (1..=6).map(|n| vec![0.1; n]).collect(),
        };
        let mut a = TargetBank::load(&source, 16_000, 11).unwrap();
        let mut b = TargetBank::load(&source, 16_000, 11).unwrap();
        let picks_a: Vec<usize> = (0..20).map(|_| a.select().index).collect();
        let picks_b: Vec<usize> = (0..20).map(|_| b.select().index).collect();
        assert_eq!(picks_a, picks_b);
        assert!(picks_a.iter().any(|&i| i != picks_a[0]));

        a.reseed(11);
        assert_eq!(a.select().index, picks_a[0]);
    }

    #[test]
    fn sine_source_has_requested_length() {
        let source = TargetSource::Sine {
            frequency_hz: 100.0,
            amplitude: 0.5,
            num_samples: 480,
        };
        let mut bank = TargetBank::load(&source, 48_000, 0).unwrap();
        let target = bank.select();
        assert_eq!(target.len(), 480);
        assert_eq!(target.segments(256), 2);
        assert!(target.samples.iter().all(|s| s.abs() <= 0.5));
    }

    #[test]
    fn in_memory_and_sine_targets_are_clamped() {
        let loud = TargetSource::Sine {
            frequency_hz: 100.0,
            amplitude: 3.0,
            num_samples: 480,
        };
        let mut bank = TargetBank::load(&loud, 48_000, 0).unwrap();
        let target = bank.select();
        assert!(target.samples.iter().all(|s| s.abs() <= 1.0));
        assert!(target.samples.iter().any(|&s| s == 1.0));

        let raw = TargetSource::Waveforms {
            waveforms: vec![vec![2.0, -3.0, 0.25]],
        };
        let mut bank = TargetBank::load(&raw, 16_000, 0).unwrap();
        assert_eq!(&*bank.select().samples, &[1.0, -1.0, 0.25]);
    }
}
