use serde_json::Value;

/// Errors surfaced by the resolvers and converters.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Transport failure or non-success HTTP status
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Push channel transport failure
    #[error("push channel error: {0}")]
    Channel(#[from] tokio_tungstenite::tungstenite::Error),

    /// Push channel ended before a terminal message arrived
    #[error("push channel for job {job_id} closed before completion")]
    ChannelClosed { job_id: String },

    /// Response did not have the expected shape
    #[error("validation error: {0}")]
    Validation(String),

    /// Failure reported by the remote service, payload kept intact
    #[error("backend reported failure: {0}")]
    Backend(Value),

    #[error("job {job_id} did not complete within {secs}s")]
    Timeout { job_id: String, secs: u64 },

    /// Every backend tried by a cascade failed
    #[error("no backend could resolve the url: {0}")]
    AllBackendsFailed(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("config error: {0}")]
    Config(String),
}

impl Error {
    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }

    /// Backend payload, when the failure was reported by the remote service.
    pub fn backend_payload(&self) -> Option<&Value> {
        match self {
            Error::Backend(payload) => Some(payload),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
