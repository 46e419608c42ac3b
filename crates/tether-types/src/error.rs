use thiserror::Error;

/// How a failure should be treated by whoever owns the retry decision.
///
/// Components never retry on their own; they return typed errors and the
/// observer maps the class to an acknowledgement decision.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// A content address, directory link, or index entry is absent.
    NotFound,
    /// Deserialization or parsing failed. Never retryable.
    Malformed,
    /// Network, timeout, or storage unavailability. Always retryable.
    Transient,
    /// Fetched bytes do not hash to the requested address.
    IntegrityViolation,
}

impl ErrorClass {
    /// Only transient failures are worth redelivering.
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::Transient)
    }

    /// Short lowercase label used in log fields.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not-found",
            Self::Malformed => "malformed",
            Self::Transient => "transient",
            Self::IntegrityViolation => "integrity-violation",
        }
    }
}

impl std::fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Implemented by every crate error so the class survives wrapping.
pub trait Classify {
    fn class(&self) -> ErrorClass;
}

/// Errors produced while parsing or validating foundation types.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid content address {value:?}: {reason}")]
    InvalidAddress { value: String, reason: String },

    #[error("invalid DID event {0:?}: expected <address>:<suffix>")]
    InvalidDidEvent(String),

    #[error("unsupported discovery hint: {0}")]
    InvalidHint(String),

    #[error("invalid anchor payload: {0}")]
    InvalidPayload(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl Classify for TypeError {
    fn class(&self) -> ErrorClass {
        ErrorClass::Malformed
    }
}
