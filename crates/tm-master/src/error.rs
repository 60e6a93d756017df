use thiserror::Error;

use tm_audio::AudioError;
use tm_engine::EngineError;

#[derive(Debug, Error)]
pub enum MasterError {
    #[error(transparent)]
    Audio(#[from] AudioError),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
