use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChatError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Index load failed: {0}")]
    IndexLoad(#[from] IndexLoadError),

    #[error("Embedding failed: {0}")]
    Embedding(String),

    #[error("{0}")]
    Generation(#[from] GenerationError),

    #[error("Config error: {0}")]
    Config(String),
}

/// Failures while reconstructing a persisted chunk index. Fatal at startup.
#[derive(Error, Debug)]
pub enum IndexLoadError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed index: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("corrupt index: {0}")]
    Corrupt(String),
}

/// Categorized outcome of a failed generation-service call.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GenerationError {
    #[error("API key is missing. Set {0} to proceed.")]
    MissingApiKey(&'static str),

    #[error("API error {status}: {body}")]
    Status { status: u16, body: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("malformed API response: {0}")]
    Malformed(String),
}

impl GenerationError {
    /// Statuses worth another attempt: rate limiting and upstream unavailability.
    pub fn is_retryable(&self) -> bool {
        match self {
            GenerationError::Status { status, .. } => {
                matches!(status, 429 | 500 | 502 | 503 | 504)
            }
            GenerationError::Transport(_) => true,
            GenerationError::MissingApiKey(_) | GenerationError::Malformed(_) => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, ChatError>;
