use thiserror::Error;
use txlens_providers::ProviderError;

/// Pipeline errors. Only the node being unreachable, a malformed transaction
/// hash or corrupt raw data are fatal; decoding stages degrade instead.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("invalid transaction hash provided: {0}")]
    InvalidTransactionHash(String),
    #[error("node request failed: {0}")]
    Node(#[from] ProviderError),
    #[error("call tree exceeds the recursion limit in {0}")]
    RecursionLimit(&'static str),
    #[error("decoding exceeded the configured time budget")]
    Timeout,
}
