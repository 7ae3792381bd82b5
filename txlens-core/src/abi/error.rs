use thiserror::Error;

/// Errors raised while encoding values into ABI words.
///
/// Decoding never surfaces errors: malformed payloads degrade into raw
/// `unknown` arguments instead.
#[derive(Debug, Error)]
pub enum AbiError {
    #[error("cannot encode type `{0}`")]
    UnsupportedType(String),
    #[error("value does not match type `{0}`")]
    TypeMismatch(String),
    #[error(transparent)]
    InvalidHex(#[from] hex::FromHexError),
}
