//! Engine error type.

use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    /// A setting outside the supported range that can't be clamped.
    #[error("unsupported {setting}: {value}")]
    Configuration { setting: &'static str, value: u32 },
    /// A seek or lookup that names something the song doesn't have.
    #[error("song has no {what} {index}")]
    DataIntegrity { what: &'static str, index: usize },
}
