/// Error types for OOXML operations.
use thiserror::Error;

/// Result type for OOXML operations.
pub type Result<T> = std::result::Result<T, OoxmlError>;

/// Error types for OOXML operations.
#[derive(Error, Debug)]
pub enum OoxmlError {
    /// OPC package error
    #[error("OPC error: {0}")]
    Opc(#[from] crate::ooxml::opc::error::OpcError),

    /// A part exists but is not well-formed XML of the expected vocabulary
    #[error("Failed to decode {part}: {reason}")]
    Decode { part: String, reason: String },

    /// XML writing error
    #[error("XML error: {0}")]
    Xml(String),

    /// Part not found
    #[error("Part not found: {0}")]
    PartNotFound(String),

    /// Hash algorithm name outside XOR, MD4, MD5, SHA-1, SHA-256, SHA-384, SHA-512
    #[error("Unsupported hash algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// Password empty or longer than the field limit
    #[error("Password length must be between 1 and {max} characters")]
    InvalidPasswordLength { max: usize },

    /// Unprotect with a password was requested on an unprotected workbook
    #[error("Workbook has no protection set")]
    NotProtected,

    /// Password verification failed
    #[error("Provided password does not match the workbook protection password")]
    WrongPassword,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl OoxmlError {
    pub(crate) fn decode(part: &str, reason: impl ToString) -> Self {
        OoxmlError::Decode {
            part: part.to_string(),
            reason: reason.to_string(),
        }
    }
}
