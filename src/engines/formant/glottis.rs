use std::f32::consts::PI;

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

/// Rosenberg glottal flow pulse with aspiration noise.
pub(super) struct Glottis {
    phase: f32,
    dc: f32,
    rng: Pcg32,
    seed: u64,
}

impl Glottis {
    pub(super) fn new(seed: u64) -> Self {
        Self {
            phase: 0.0,
            dc: 0.0,
            rng: Pcg32::seed_from_u64(seed),
            seed,
        }
    }

    pub(super) fn reset(&mut self) {
        *self = Self::new(self.seed);
    }

    /// Next source sample at `frequency_hz`.
    ///
    /// Higher tenseness shortens the open phase (brighter, louder voice) and
    /// lowers the aspiration level.
    pub(super) fn next(
        &mut self,
        frequency_hz: f32,
        tenseness: f32,
        aspiration: f32,
        sample_rate: f32,
    ) -> f32 {
        let open_quotient = 0.8 - 0.4 * tenseness;
        let rise = open_quotient * 0.6;
        let fall = open_quotient - rise;

        let flow = if self.phase < rise {
            0.5 * (1.0 - (PI * self.phase / rise).cos())
        } else if self.phase < open_quotient {
            (0.5 * PI * (self.phase - rise) / fall).cos()
        } else {
            0.0
        };

        self.phase += frequency_hz / sample_rate;
        if self.phase >= 1.0 {
            self.phase -= self.phase.floor();
        }

        let voiced = flow * tenseness.sqrt();
        let noise = (self.rng.gen::<f32>() * 2.0 - 1.0) * aspiration * flow.max(0.2);
        let sample = voiced + noise;

        // One-pole DC blocker.
        self.dc += 0.005 * (sample - self.dc);
        sample - self.dc
    }
}
