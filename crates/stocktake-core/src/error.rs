use thiserror::Error;

/// Per-record normalization failure. Records that fail validation are
/// skipped and counted by the engine, never fatal to a run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("required field '{0}' is missing or empty")]
    MissingField(&'static str),

    #[error("field '{field}' has invalid value: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// Adapter-level error classification, used by the engine to decide
/// whether a failure aborts the run or is absorbed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceErrorKind {
    /// Missing or malformed credentials/configuration. Fatal, no retry.
    Configuration,
    /// Source unreachable or auth rejected. Fatal to the run; retried only
    /// by the rate-limited client's backoff, never at the engine level.
    Connectivity,
    /// Token bucket empty in non-blocking mode.
    RateLimited,
    /// Source returned a payload we could not interpret.
    MalformedPayload,
    Internal,
}

/// Structured source error carrying its classification and retryability.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} ({})", self.code())]
pub struct SourceError {
    kind: SourceErrorKind,
    message: String,
    retryable: bool,
}

impl SourceError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::Configuration,
            message: message.into(),
            retryable: false,
        }
    }

    pub fn connectivity(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::Connectivity,
            message: message.into(),
            retryable: true,
        }
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::RateLimited,
            message: message.into(),
            retryable: true,
        }
    }

    pub fn malformed_payload(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::MalformedPayload,
            message: message.into(),
            retryable: false,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::Internal,
            message: message.into(),
            retryable: false,
        }
    }

    pub const fn kind(&self) -> SourceErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn retryable(&self) -> bool {
        self.retryable
    }

    pub const fn code(&self) -> &'static str {
        match self.kind {
            SourceErrorKind::Configuration => "source.configuration",
            SourceErrorKind::Connectivity => "source.connectivity",
            SourceErrorKind::RateLimited => "source.rate_limited",
            SourceErrorKind::MalformedPayload => "source.malformed_payload",
            SourceErrorKind::Internal => "source.internal",
        }
    }
}
