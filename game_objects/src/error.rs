//! Errors raised while loading content definitions.

use composition_core::EngineError;
use thiserror::Error;

/// Failure while reading or applying a content file.
#[derive(Debug, Error)]
pub enum ContentError {
    #[error("failed to read content file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid content file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error(transparent)]
    Engine(#[from] EngineError),
}
