use thiserror::Error;

/// Every failure the data layer can surface to a controller.
///
/// Clone so one in-flight outcome can be handed to every waiter.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ShelfError {
    /// Network or I/O failure; no envelope was received.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The body was not an envelope, or `data` did not have the expected shape.
    #[error("malformed response: {0}")]
    Decode(String),

    /// An envelope arrived with a non-success `code`.
    #[error("{message} (code {code})")]
    Api { code: u16, message: String },

    #[error("batch refresh needs at least one item id")]
    EmptyBatch,

    #[error("cannot {action} while identification is {phase}")]
    InvalidTransition {
        action: &'static str,
        phase: &'static str,
    },

    #[error("candidate {provider}:{id} is not among the current search results")]
    UnknownCandidate { provider: String, id: String },

    #[error("client not configured: {0}")]
    NotConfigured(String),

    #[error("invalid url: {0}")]
    InvalidUrl(String),
}

impl ShelfError {
    /// Server-provided code for application failures.
    pub fn code(&self) -> Option<u16> {
        match self {
            ShelfError::Api { code, .. } => Some(*code),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ShelfError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ShelfError::Decode(e.to_string())
        } else {
            ShelfError::Transport(e.to_string())
        }
    }
}

impl From<serde_json::Error> for ShelfError {
    fn from(e: serde_json::Error) -> Self {
        ShelfError::Decode(e.to_string())
    }
}

impl From<url::ParseError> for ShelfError {
    fn from(e: url::ParseError) -> Self {
        ShelfError::InvalidUrl(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ShelfError>;
