use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AbiError {
    #[error("malformed signature '{signature}': {reason}")]
    MalformedSignature { signature: String, reason: String },
    #[error("invalid hex '{value}': {reason}")]
    InvalidHex { value: String, reason: String },
    #[error("{what} must be {expected} bytes, got {actual}")]
    InvalidLength {
        what: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("abi decode error: {0}")]
    Decode(String),
    #[error("artifact error: {0}")]
    Artifact(String),
}

impl AbiError {
    pub(crate) fn malformed(signature: impl Into<String>, reason: impl Into<String>) -> Self {
        AbiError::MalformedSignature {
            signature: signature.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_hex(value: &str, err: hex::FromHexError) -> Self {
        AbiError::InvalidHex {
            value: value.to_string(),
            reason: err.to_string(),
        }
    }
}
