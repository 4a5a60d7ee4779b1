//! Source-filter formant synthesizer.
//!
//! A small, dependency-free stand-in for a full waveguide vocal tract. A
//! glottal pulse train (open quotient driven by tenseness, plus aspiration
//! noise) is shaped by three oral formant resonators and one nasal
//! resonator. Formant frequencies are derived from the articulators:
//!
//! | Articulator | Effect |
//! |---|---|
//! | `tongue_diameter` | opening of the tract, raises F1 |
//! | `tongue_index` | front/back tongue position, raises F2 and F3 toward the lips |
//! | `lips` | rounding lowers F2/F3; closing mutes the output |
//! | `epiglottis` | pharyngeal narrowing, raises F1 when small |
//! | `velum` | mixes in the nasal resonance |
//! | `trachea` | couples aspiration noise into the source |
//!
//! Parameters are interpolated linearly across each block from the previous
//! block's values, so consecutive blocks join without clicks. All state,
//! including the noise generator, is restored by `reset`, so output is
//! reproducible per episode.
//!
//! # Example
//!
//! ```rust
//! use tract_gym::{engines::formant::FormantTract, ArticulatoryState, EnvConfig, VocalTract};
//!
//! let config = EnvConfig::default();
//! let mut tract = FormantTract::new(config.sample_rate, config.block_size);
//! let params = ArticulatoryState::initial(&config.articulators).to_params(400.0);
//! let block = tract.advance(&params)?;
//! assert_eq!(block.len(), 1024);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod engine;
mod glottis;
mod resonator;

pub use engine::FormantTract;
