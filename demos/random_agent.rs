use std::time::Instant;

use rand::SeedableRng;
use rand_pcg::Pcg32;

use tract_gym::{
    engines::formant::FormantTract, EnvConfigBuilder, Environment, MappingMode, TargetSource,
    VocalEnv,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let config = EnvConfigBuilder::default()
        .sample_rate(16_000u32)
        .block_size(512usize)
        .window_size(1024usize)
        .n_fft(512usize)
        .hop_length(128usize)
        .max_steps(30usize)
        .mapping_mode(MappingMode::Delta)
        .delta_scale(0.1f32)
        .target_source(TargetSource::Sine {
            frequency_hz: 220.0,
            amplitude: 0.3,
            num_samples: 16_000,
        })
        .build()?;

    let engine = FormantTract::new(config.sample_rate, config.block_size);
    let mut env = VocalEnv::new(config, engine)?;
    let mut rng = Pcg32::seed_from_u64(42);

    for episode in 0..3 {
        let start = Instant::now();
        env.reset(Some(episode))?;

        let mut total = 0.0;
        loop {
            let action = env.action_space().sample(&mut rng);
            let result = env.step(&action)?;
            total += result.reward;
            if result.done {
                break;
            }
        }

        println!(
            "Episode {episode}: {} steps, return {total:.4}, {:.2?}",
            env.current_step(),
            start.elapsed()
        );
    }

    Ok(())
}
