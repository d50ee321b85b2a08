use std::path::PathBuf;
use std::time::Duration;

use runlab_payload_codec::DecodeError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoreError>;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("interpreter was not ready after {waited:?}")]
    InterpreterNotReady { waited: Duration },

    #[error("failed to decode withheld content of exercise `{exercise}`: {source}")]
    WithheldContent {
        exercise: String,
        #[source]
        source: DecodeError,
    },

    #[error(transparent)]
    Sandbox(#[from] SandboxError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SandboxError {
    /// A guard installed for the run was removed or replaced by user code.
    #[error("sandbox integrity violated: `{capability}` was rebound during the run")]
    Integrity { capability: String },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error(
        "feedback profile `{profile}` cannot shorten below its limit: {head} + {tail} + {marker} > {limit}"
    )]
    ProfileTooTight {
        profile: &'static str,
        head: usize,
        tail: usize,
        marker: usize,
        limit: usize,
    },

    #[error("`{field}` must be greater than zero")]
    Zero { field: &'static str },
}
