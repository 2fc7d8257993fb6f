use thiserror::Error;

#[derive(Error, Debug)]
pub enum RetroSynError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("HTTP request error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("failed to decode JSON response: {0}")]
    JsonDecodeError(serde_json::Error),

    #[error("cache file corrupt at {path}: {source}")]
    CacheCorrupt {
        path: String,
        source: serde_json::Error,
    },

    #[error("failed to write cache atomically at {path}: {reason}")]
    CacheWriteError { path: String, reason: String },

    #[error("reaction block could not be parsed: {reason}")]
    ReactionParseError { reason: String },

    #[error("empty corpus: no documents were acquired for '{material}'")]
    EmptyCorpus { material: String },

    #[error("failed to serialize tree snapshot: {0}")]
    TreeSerializationError(serde_json::Error),

    #[error("failed to write output to {path}: {source}")]
    OutputWriteError {
        path: String,
        source: std::io::Error,
    },

    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("LLM response missing expected section: {0}")]
    LlmResponseFormatError(String),
}

pub type Result<T> = std::result::Result<T, RetroSynError>;

impl RetroSynError {
    /// True for errors that the component contracts (AO, NR, document
    /// fetch) are expected to swallow and degrade from, rather than
    /// propagate. See spec §7.
    pub fn is_transient(&self) -> bool {
        matches!(self, RetroSynError::HttpError(_) | RetroSynError::IoError(_))
    }
}
