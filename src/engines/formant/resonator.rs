use std::f32::consts::PI;

/// Bandpass biquad with unity peak gain, transposed direct form II.
#[derive(Debug, Clone, Copy)]
pub(super) struct Resonator {
    b0: f32,
    b2: f32,
    a1: f32,
    a2: f32,
    z1: f32,
    z2: f32,
}

impl Default for Resonator {
    fn default() -> Self {
        Self {
            b0: 1.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
            z1: 0.0,
            z2: 0.0,
        }
    }
}

impl Resonator {
    pub(super) fn reset(&mut self) {
        *self = Self::default();
    }

    /// Retune to `freq_hz` with bandwidth `bandwidth_hz`. Filter memory is kept.
    pub(super) fn tune(&mut self, freq_hz: f32, bandwidth_hz: f32, sample_rate: f32) {
        let freq = freq_hz.clamp(40.0, sample_rate * 0.45);
        let q = (freq / bandwidth_hz.max(1.0)).max(0.1);
        let w0 = 2.0 * PI * freq / sample_rate;
        let alpha = w0.sin() / (2.0 * q);
        let a0 = 1.0 + alpha;

        self.b0 = alpha / a0;
        self.b2 = -alpha / a0;
        self.a1 = -2.0 * w0.cos() / a0;
        self.a2 = (1.0 - alpha) / a0;
    }

    pub(super) fn process(&mut self, x: f32) -> f32 {
        let y = self.b0 * x + self.z1;
        self.z1 = -self.a1 * y + self.z2;
        self.z2 = self.b2 * x - self.a2 * y;
        y
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn energy_at(freq: f32, tuned: f32) -> f32 {
        let sr = 16_000.0;
        let mut r = Resonator::default();
        r.tune(tuned, 80.0, sr);
        (0..4000)
            .map(|i| r.process((2.0 * PI * freq * i as f32 / sr).sin()))
            .skip(2000)
            .map(|y| y * y)
            .sum()
    }

    #[test]
    fn passes_its_center_frequency() {
        assert!(energy_at(700.0, 700.0) > 10.0 * energy_at(2500.0, 700.0));
    }

    #[test]
    fn reset_clears_memory() {
        let mut r = Resonator::default();
        r.tune(500.0, 60.0, 16_000.0);
        r.process(1.0);
        r.reset();
        assert_eq!(r.process(0.0), 0.0);
    }
}
