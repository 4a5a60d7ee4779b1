use crate::env::EpisodeState;

#[derive(thiserror::Error, Debug)]
pub enum EnvError {
    #[error("step() called while the episode is {0:?}. Call reset() first.")]
    InvalidState(EpisodeState),
    #[error("Action has {actual} components, expected {expected}")]
    ActionShape { expected: usize, actual: usize },
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("Synthesizer error: {0}")]
    Engine(Box<dyn std::error::Error>),
    #[error("Synthesizer returned {actual} samples, expected a block of {expected}")]
    BlockLength { expected: usize, actual: usize },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<crate::config::EnvConfigBuilderError> for EnvError {
    fn from(err: crate::config::EnvConfigBuilderError) -> Self {
        EnvError::Config(err.to_string())
    }
}
