use crate::rpc::JsonRpcError;
use thiserror::Error;

/// Error thrown when talking to a node.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Thrown if the request failed
    #[error(transparent)]
    HttpError(#[from] reqwest::Error),
    /// An error reply from the node
    #[error(transparent)]
    JsonRpcError(#[from] JsonRpcError),
    #[error("deserialization error: {err}. Response: {text}")]
    SerdeJson {
        err: serde_json::Error,
        text: String,
    },
    #[error("unknown chain: {0}")]
    UnknownChain(String),
    #[error("invalid node response: {0}")]
    InvalidResponse(String),
}

/// Error thrown when querying the verified-source API.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error(transparent)]
    HttpError(#[from] reqwest::Error),
    #[error("api error: {message} {result}")]
    ErrorResponse { message: String, result: String },
    #[error("invalid status code {0} after retries")]
    BadStatusCode(u16),
    #[error(transparent)]
    Serde(#[from] serde_json::Error),
    #[error("unknown chain: {0}")]
    UnknownChain(String),
}
