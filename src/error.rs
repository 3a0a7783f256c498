// Error taxonomy for the RSA engine
// Every failure surfaced to a caller goes through RsaError

use thiserror::Error;

/// Result type used across the engine
pub type RsaResult<T> = Result<T, RsaError>;

/// Errors that can occur during prime generation, key derivation,
/// encryption and decryption
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RsaError {
    /// Bit length, round count or another request field is out of range
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// The prime search gave up before finding a candidate
    #[error("Prime generation failed: {0}")]
    PrimalityFailure(String),

    /// p == q, or one of the primes failed the final re-check
    #[error("Invalid prime pair: {0}")]
    InvalidPrimePair(String),

    /// Public exponent not coprime with the totient
    #[error("Invalid exponent: {0}")]
    InvalidExponent(String),

    /// Block value out of range for the modulus, or malformed
    #[error("Invalid block: {0}")]
    InvalidBlock(String),

    /// Required primes or keys are not available
    #[error("Missing prerequisite: {0}")]
    MissingPrerequisite(String),

    /// The request named a session that was never created or was deleted
    #[error("Unknown session: {0}")]
    SessionNotFound(String),

    #[error("Operation timed out: {0}")]
    Timeout(String),

    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl RsaError {
    /// Machine-readable kind used in error responses
    pub fn kind(&self) -> &'static str {
        match self {
            RsaError::InvalidParameter(_) => "invalid_parameter",
            RsaError::PrimalityFailure(_) => "primality_failure",
            RsaError::InvalidPrimePair(_) => "invalid_prime_pair",
            RsaError::InvalidExponent(_) => "invalid_exponent",
            RsaError::InvalidBlock(_) => "invalid_block",
            RsaError::MissingPrerequisite(_) => "missing_prerequisite",
            RsaError::SessionNotFound(_) => "session_not_found",
            RsaError::Timeout(_) => "timeout",
            RsaError::Cancelled(_) => "cancelled",
            RsaError::Internal(_) => "internal",
        }
    }

    /// Human-readable detail without the kind prefix
    pub fn detail(&self) -> &str {
        match self {
            RsaError::InvalidParameter(d)
            | RsaError::PrimalityFailure(d)
            | RsaError::InvalidPrimePair(d)
            | RsaError::InvalidExponent(d)
            | RsaError::InvalidBlock(d)
            | RsaError::MissingPrerequisite(d)
            | RsaError::SessionNotFound(d)
            | RsaError::Timeout(d)
            | RsaError::Cancelled(d)
            | RsaError::Internal(d) => d,
        }
    }

    /// HTTP-style status code for the request layer
    pub fn status(&self) -> u16 {
        match self {
            RsaError::InvalidParameter(_)
            | RsaError::InvalidPrimePair(_)
            | RsaError::InvalidExponent(_)
            | RsaError::InvalidBlock(_)
            | RsaError::MissingPrerequisite(_) => 400,
            RsaError::SessionNotFound(_) => 404,
            RsaError::Timeout(_) => 504,
            RsaError::PrimalityFailure(_) | RsaError::Cancelled(_) | RsaError::Internal(_) => 500,
        }
    }
}
