use thiserror::Error;

#[derive(Debug, Error)]
pub enum PilotError {
    #[error("Configuration error: {0}")]
    Config(String),

    /// Model unreachable or answered with a non-success status.
    #[error("LLM provider error: {0}")]
    LlmProvider(String),

    /// Empty reply or a reply that does not parse into one action.
    #[error("Malformed model response ({reason}): {raw}")]
    MalformedResponse { reason: String, raw: String },

    #[error("Perception error: {0}")]
    Perception(String),

    #[error("Executor error: {0}")]
    Executor(String),

    #[error("A run is already active")]
    Busy,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("TOML deserialize error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSer(#[from] toml::ser::Error),
}

impl PilotError {
    pub fn malformed(reason: impl Into<String>, raw: impl Into<String>) -> Self {
        Self::MalformedResponse {
            reason: reason.into(),
            raw: raw.into(),
        }
    }
}

pub type PilotResult<T> = Result<T, PilotError>;
