//! Short-time spectral features.
//!
//! Frames are taken without centering: frame `k` covers samples
//! `k * hop .. k * hop + n_fft`, so a window of `len` samples yields
//! `1 + (len - n_fft) / hop` frames.

use std::f32::consts::PI;
use std::sync::Arc;

use ndarray::Array2;
use rustfft::{num_complex::Complex, Fft, FftPlanner};

use crate::config::FeatureKind;

/// Number of non-negative frequency bins of an `n_fft`-point real FFT.
pub fn rfft_channel_num(n_fft: usize) -> usize {
    n_fft / 2 + 1
}

/// Number of STFT frames that fit into `len` samples.
pub fn frame_count(len: usize, n_fft: usize, hop: usize) -> usize {
    if len < n_fft || hop == 0 {
        return 0;
    }
    1 + (len - n_fft) / hop
}

/// The `len` samples ending at `end`, with silence where the range falls
/// outside `samples` on either side.
pub fn trailing_window(samples: &[f32], end: usize, len: usize) -> Vec<f32> {
    let mut window = vec![0.0; len];
    let start = end as isize - len as isize;
    for (i, slot) in window.iter_mut().enumerate() {
        let src = start + i as isize;
        if src >= 0 && (src as usize) < samples.len() {
            *slot = samples[src as usize];
        }
    }
    window
}

/// Magnitude STFT with a periodic Hann window.
pub struct Stft {
    n_fft: usize,
    hop: usize,
    window: Vec<f32>,
    fft: Arc<dyn Fft<f32>>,
}

impl Stft {
    pub fn new(n_fft: usize, hop: usize) -> Self {
        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(n_fft);
        let window = (0..n_fft)
            .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f32 / n_fft as f32).cos()))
            .collect();
        Self {
            n_fft,
            hop,
            window,
            fft,
        }
    }

    pub fn channels(&self) -> usize {
        rfft_channel_num(self.n_fft)
    }

    /// Magnitude spectrogram, shape `(channels, frames)`.
    pub fn magnitude(&self, samples: &[f32]) -> Array2<f32> {
        let frames = frame_count(samples.len(), self.n_fft, self.hop);
        let channels = self.channels();
        let mut out = Array2::zeros((channels, frames));
        let mut buffer = vec![Complex::new(0.0f32, 0.0); self.n_fft];

        for frame in 0..frames {
            let offset = frame * self.hop;
            for (i, slot) in buffer.iter_mut().enumerate() {
                *slot = Complex::new(samples[offset + i] * self.window[i], 0.0);
            }
            self.fft.process(&mut buffer);
            for (bin, c) in buffer.iter().take(channels).enumerate() {
                out[[bin, frame]] = c.norm();
            }
        }

        out
    }
}

fn hz_to_mel(hz: f32) -> f32 {
    2595.0 * (1.0 + hz / 700.0).log10()
}

fn mel_to_hz(mel: f32) -> f32 {
    700.0 * (10f32.powf(mel / 2595.0) - 1.0)
}

/// Triangular mel filterbank (HTK scale) from 0 Hz to Nyquist, shape `(n_mels, channels)`.
pub fn mel_filterbank(n_mels: usize, n_fft: usize, sample_rate: u32) -> Array2<f32> {
    let channels = rfft_channel_num(n_fft);
    let nyquist = sample_rate as f32 / 2.0;
    let max_mel = hz_to_mel(nyquist);
    let edges: Vec<f32> = (0..n_mels + 2)
        .map(|i| mel_to_hz(max_mel * i as f32 / (n_mels + 1) as f32))
        .collect();
    let bin_hz = sample_rate as f32 / n_fft as f32;

    let mut bank = Array2::zeros((n_mels, channels));
    for m in 0..n_mels {
        let (lo, center, hi) = (edges[m], edges[m + 1], edges[m + 2]);
        for bin in 0..channels {
            let f = bin as f32 * bin_hz;
            let weight = if f > lo && f <= center {
                (f - lo) / (center - lo)
            } else if f > center && f < hi {
                (hi - f) / (hi - center)
            } else {
                0.0
            };
            bank[[m, bin]] = weight;
        }
    }
    bank
}

/// Turns a window of samples into a `(channels, frames)` feature matrix.
pub struct FeatureExtractor {
    stft: Stft,
    mel: Option<Array2<f32>>,
}

impl FeatureExtractor {
    pub fn new(kind: FeatureKind, n_fft: usize, hop: usize, sample_rate: u32) -> Self {
        let mel = match kind {
            FeatureKind::Magnitude => None,
            FeatureKind::Log1pMel { n_mels } => Some(mel_filterbank(n_mels, n_fft, sample_rate)),
        };
        Self {
            stft: Stft::new(n_fft, hop),
            mel,
        }
    }

    pub fn extract(&self, samples: &[f32]) -> Array2<f32> {
        let magnitude = self.stft.magnitude(samples);
        match &self.mel {
            None => magnitude,
            Some(bank) => {
                let power = magnitude.mapv(|m| m * m);
                let mut mel = bank.dot(&power);
                mel.mapv_inplace(f32::ln_1p);
                mel
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_and_frame_counts() {
        assert_eq!(rfft_channel_num(1024), 513);
        assert_eq!(rfft_channel_num(256), 129);
        assert_eq!(rfft_channel_num(400), 201);
        assert_eq!(rfft_channel_num(501), 251);

        assert_eq!(frame_count(2048, 1024, 256), 5);
        assert_eq!(frame_count(1024, 512, 128), 5);
        assert_eq!(frame_count(1000, 1024, 256), 0);
    }

    #[test]
    fn trailing_window_pads_both_sides() {
        let samples = [1.0, 2.0, 3.0];
        assert_eq!(trailing_window(&samples, 3, 5), vec![0.0, 0.0, 1.0, 2.0, 3.0]);
        assert_eq!(trailing_window(&samples, 5, 4), vec![2.0, 3.0, 0.0, 0.0]);
        assert_eq!(trailing_window(&[], 0, 3), vec![0.0; 3]);
    }

    #[test]
    fn stft_shape_and_peak_bin() {
        let n_fft = 256;
        let stft = Stft::new(n_fft, 64);
        // Exactly bin 16 of a 256-point FFT.
        let wave: Vec<f32> = (0..1024)
            .map(|i| (2.0 * PI * 16.0 * i as f32 / n_fft as f32).sin())
            .collect();
        let spec = stft.magnitude(&wave);
        assert_eq!(spec.dim(), (129, frame_count(1024, 256, 64)));

        let column = spec.column(0);
        let peak = column
            .iter()
            .enumerate()
            .fold((0, 0.0f32), |best, (i, &v)| if v > best.1 { (i, v) } else { best })
            .0;
        assert_eq!(peak, 16);
    }

    #[test]
    fn silence_has_zero_features() {
        for (kind, channels) in [
            (FeatureKind::Magnitude, 257),
            (FeatureKind::Log1pMel { n_mels: 32 }, 32),
        ] {
            let extractor = FeatureExtractor::new(kind, 512, 128, 16_000);
            let features = extractor.extract(&vec![0.0; 1024]);
            assert_eq!(features.dim(), (channels, 5));
            assert!(features.iter().all(|&v| v == 0.0));
        }
    }

    #[test]
    fn mel_filterbank_covers_spectrum() {
        let bank = mel_filterbank(40, 1024, 44_100);
        assert_eq!(bank.dim(), (40, 513));
        for row in bank.rows() {
            let peak = row.iter().cloned().fold(0.0f32, f32::max);
            assert!(peak > 0.0 && peak <= 1.0);
        }
    }

    #[test]
    fn extraction_is_deterministic() {
        let extractor = FeatureExtractor::new(FeatureKind::Log1pMel { n_mels: 20 }, 256, 64, 8_000);
        let wave: Vec<f32> = (0..512).map(|i| ((i * 7919) % 97) as f32 / 97.0 - 0.5).collect();
        assert_eq!(extractor.extract(&wave), extractor.extract(&wave));
    }
}
