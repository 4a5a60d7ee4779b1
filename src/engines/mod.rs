//! Articulatory synthesizer engines.
//!
//! This module contains implementations of [`VocalTract`](crate::VocalTract).
//!
//! # Available Engines
//!
//! Enable engines via Cargo features:
//! - `formant` - Source-filter formant synthesizer (pure Rust, enabled by default)

#[cfg(feature = "formant")]
pub mod formant;
