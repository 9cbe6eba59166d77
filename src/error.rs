use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("could not find a configuration directory")]
    NoConfigDir,

    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("settings file '{path}' is not valid JSON: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode settings document: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("failed to serialize setting {group}.{key}: {source}")]
    Serialize {
        group: &'static str,
        key: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("invalid URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("URL '{0}' has no host")]
    MissingHost(String),

    #[error("request failed: {0}")]
    Transport(String),

    #[error("unsupported authentication scheme '{0}'")]
    UnsupportedChallenge(String),

    #[error("failed to read response body: {0}")]
    Body(#[from] io::Error),
}
