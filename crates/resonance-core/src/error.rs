//! Error types for the annotation pipeline
//!
//! Provides one enum per concern:
//! - Structured response parsing (model text → typed record)
//! - Generative model collaborator failures
//! - Generation/analysis service failures
//! - Corpus persistence failures
//! - Annotation session transitions
//! - Configuration loading

use crate::session::SessionState;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Stable, transport-independent failure classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Caller supplied an empty required input
    EmptyInput,
    /// The generative collaborator failed (timeout, quota, transport)
    ExternalCallFailed,
    /// Model output was not a structured object
    Malformed,
    /// Model output lacked a required key
    MissingField,
    /// Model output carried a value outside the schema
    InvalidValue,
    /// Sample failed validation before persistence
    IncompleteSample,
    /// Corpus store could not be opened or written
    StoreUnavailable,
    /// Corpus store rejected the write for lack of permission
    PermissionDenied,
    /// Corpus store ran out of space
    DiskFull,
    /// Session operation not permitted in the current state
    InvalidTransition,
    /// Configuration could not be loaded
    Configuration,
}

impl ErrorKind {
    /// Wire token for this kind
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EmptyInput => "EmptyInput",
            Self::ExternalCallFailed => "ExternalCallFailed",
            Self::Malformed => "Malformed",
            Self::MissingField => "MissingField",
            Self::InvalidValue => "InvalidValue",
            Self::IncompleteSample => "IncompleteSample",
            Self::StoreUnavailable => "StoreUnavailable",
            Self::PermissionDenied => "PermissionDenied",
            Self::DiskFull => "DiskFull",
            Self::InvalidTransition => "InvalidTransition",
            Self::Configuration => "Configuration",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classified failure of the structured response parser
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseFailure {
    /// Output is not a JSON object
    #[error("malformed response: {reason}")]
    Malformed { reason: String },

    /// A required key is absent or null
    #[error("missing field `{field}`")]
    MissingField { field: &'static str },

    /// A key is present but its value violates the schema
    #[error("invalid value for `{field}`: {reason}")]
    InvalidValue {
        field: &'static str,
        reason: String,
    },
}

impl ParseFailure {
    /// Create malformed failure
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::Malformed {
            reason: reason.into(),
        }
    }

    /// Create invalid value failure
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field,
            reason: reason.into(),
        }
    }

    /// Failure classification
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Malformed { .. } => ErrorKind::Malformed,
            Self::MissingField { .. } => ErrorKind::MissingField,
            Self::InvalidValue { .. } => ErrorKind::InvalidValue,
        }
    }

    /// Name of the offending field, if the failure is field-specific
    #[must_use]
    pub fn field(&self) -> Option<&'static str> {
        match self {
            Self::Malformed { .. } => None,
            Self::MissingField { field } | Self::InvalidValue { field, .. } => Some(field),
        }
    }
}

/// Opaque failure reported by a generative model collaborator
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModelError {
    /// Request exceeded its deadline
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// Provider answered with a non-success status (quota, bad request, ...)
    #[error("provider returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// Connection or decoding failure
    #[error("transport error: {0}")]
    Transport(String),

    /// Provider answered without any text
    #[error("provider returned no text")]
    EmptyResponse,
}

/// Errors from the generation and analysis services
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ServiceError {
    /// Required input was empty; no model call was made
    #[error("empty input: `{field}` must not be empty")]
    EmptyInput { field: &'static str },

    /// The generative collaborator failed
    #[error("external call failed: {0}")]
    ExternalCallFailed(#[from] ModelError),

    /// The collaborator answered, but not with the expected structure
    #[error(transparent)]
    Parse(#[from] ParseFailure),
}

impl ServiceError {
    /// Failure classification
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::EmptyInput { .. } => ErrorKind::EmptyInput,
            Self::ExternalCallFailed(_) => ErrorKind::ExternalCallFailed,
            Self::Parse(failure) => failure.kind(),
        }
    }

    /// Check if re-issuing the same call may succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ExternalCallFailed(_))
    }
}

/// Errors from the training corpus writer
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Sample failed validation; nothing was written
    #[error("incomplete sample: {reason}")]
    IncompleteSample { reason: String },

    /// Store could not be opened or written
    #[error("corpus store unavailable at {path}: {source}")]
    StoreUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Store rejected the write
    #[error("permission denied appending to {path}: {source}")]
    PermissionDenied {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Store is out of space
    #[error("disk full while appending to {path}: {source}")]
    DiskFull {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl StoreError {
    /// Create incomplete sample error
    pub fn incomplete(reason: impl Into<String>) -> Self {
        Self::IncompleteSample {
            reason: reason.into(),
        }
    }

    /// Classify an I/O error raised while appending to `path`
    pub fn from_io(path: impl AsRef<Path>, source: io::Error) -> Self {
        let path = path.as_ref().to_path_buf();
        match source.kind() {
            io::ErrorKind::PermissionDenied | io::ErrorKind::ReadOnlyFilesystem => {
                Self::PermissionDenied { path, source }
            }
            io::ErrorKind::StorageFull | io::ErrorKind::FileTooLarge | io::ErrorKind::WriteZero => {
                Self::DiskFull { path, source }
            }
            _ => Self::StoreUnavailable { path, source },
        }
    }

    /// Failure classification
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::IncompleteSample { .. } => ErrorKind::IncompleteSample,
            Self::StoreUnavailable { .. } => ErrorKind::StoreUnavailable,
            Self::PermissionDenied { .. } => ErrorKind::PermissionDenied,
            Self::DiskFull { .. } => ErrorKind::DiskFull,
        }
    }
}

/// Errors from an annotation session
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Operation not allowed from the current state
    #[error("cannot {action} while the session is {state}")]
    InvalidTransition {
        state: SessionState,
        action: &'static str,
    },

    /// Generation or analysis failed
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// Persisting the reviewed sample failed
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl SessionError {
    /// Failure classification
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidTransition { .. } => ErrorKind::InvalidTransition,
            Self::Service(e) => e.kind(),
            Self::Store(e) => e.kind(),
        }
    }
}

/// Errors while loading configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("io error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Config file is not valid TOML for this schema
    #[error("invalid config in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// Override value could not be interpreted
    #[error("invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },

    /// Credential variable is unset or empty
    #[error("environment variable {var} is not set")]
    MissingApiKey { var: String },
}

/// Combined annotator error
#[derive(Debug, thiserror::Error)]
pub enum AnnotatorError {
    #[error("service error: {0}")]
    Service(#[from] ServiceError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("session error: {0}")]
    Session(#[from] SessionError),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}

impl AnnotatorError {
    /// Failure classification
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Service(e) => e.kind(),
            Self::Store(e) => e.kind(),
            Self::Session(e) => e.kind(),
            Self::Config(_) => ErrorKind::Configuration,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_failure_display() {
        let err = ParseFailure::MissingField {
            field: "resulting_type",
        };
        assert_eq!(err.to_string(), "missing field `resulting_type`");
        assert_eq!(err.kind(), ErrorKind::MissingField);
        assert_eq!(err.field(), Some("resulting_type"));
    }

    #[test]
    fn service_error_kinds() {
        assert_eq!(
            ServiceError::EmptyInput { field: "topic" }.kind(),
            ErrorKind::EmptyInput
        );
        assert_eq!(
            ServiceError::from(ParseFailure::malformed("not json")).kind(),
            ErrorKind::Malformed
        );
        assert_eq!(
            ServiceError::from(ModelError::EmptyResponse).kind(),
            ErrorKind::ExternalCallFailed
        );
    }

    #[test]
    fn only_external_failures_are_retryable() {
        assert!(ServiceError::from(ModelError::Timeout(Duration::from_secs(30))).is_retryable());
        assert!(!ServiceError::EmptyInput { field: "topic" }.is_retryable());
        assert!(!ServiceError::from(ParseFailure::invalid("resulting_strength", "1.5")).is_retryable());
    }

    #[test]
    fn store_error_classifies_io_kinds() {
        let denied = StoreError::from_io("corpus.jsonl", io::Error::from(io::ErrorKind::PermissionDenied));
        assert_eq!(denied.kind(), ErrorKind::PermissionDenied);

        let full = StoreError::from_io("corpus.jsonl", io::Error::from(io::ErrorKind::StorageFull));
        assert_eq!(full.kind(), ErrorKind::DiskFull);

        let missing = StoreError::from_io("corpus.jsonl", io::Error::from(io::ErrorKind::NotFound));
        assert_eq!(missing.kind(), ErrorKind::StoreUnavailable);
    }

    #[test]
    fn annotator_error_conversions() {
        let err: AnnotatorError = StoreError::incomplete("label missing").into();
        assert!(matches!(err, AnnotatorError::Store(_)));
        assert_eq!(err.kind(), ErrorKind::IncompleteSample);
        assert_eq!(err.kind().to_string(), "IncompleteSample");
    }
}
