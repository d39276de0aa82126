//! Error types for awsmgr.

use std::fmt;
use std::io;
use thiserror::Error;

/// Result type for awsmgr operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Remote service an error originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Service {
    /// CloudWatch Logs.
    Logs,
    /// S3 object storage.
    S3,
    /// SNS notifications.
    Sns,
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Logs => write!(f, "logs"),
            Self::S3 => write!(f, "s3"),
            Self::Sns => write!(f, "sns"),
        }
    }
}

/// Error type for awsmgr operations.
#[derive(Debug, Error)]
pub enum Error {
    /// A remote call failed (service error, transport error, throttling...).
    #[error("{service} {operation} failed: {message}")]
    Remote {
        /// Service the call was sent to.
        service: Service,
        /// SDK operation name (e.g. `DeleteBucket`).
        operation: &'static str,
        /// Service error code, when the service returned one.
        code: Option<String>,
        /// Human-readable error with its source chain.
        message: String,
    },

    /// A resource the operation depends on does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// I/O error (local file upload/download).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Argument rejected before any remote call was made.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// SDK configuration could not be resolved.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The async runtime backing the SDK could not be started.
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// The embedding application asked the operation to stop.
    #[error("Operation interrupted")]
    Interrupted,
}

impl Error {
    /// Build a remote error without a service error code.
    pub fn remote(service: Service, operation: &'static str, message: impl Into<String>) -> Self {
        Self::Remote {
            service,
            operation,
            code: None,
            message: message.into(),
        }
    }

    /// Whether this is a remote call failure.
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote { .. })
    }

    /// Service error code of a remote failure, if any.
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Remote { code, .. } => code.as_deref(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_display_includes_service_and_operation() {
        let err = Error::remote(Service::S3, "CreateBucket", "access denied");
        assert_eq!(err.to_string(), "s3 CreateBucket failed: access denied");
        assert!(err.is_remote());
        assert!(err.code().is_none());
    }

    #[test]
    fn test_code_only_for_remote() {
        let err = Error::Remote {
            service: Service::Sns,
            operation: "Publish",
            code: Some("NotFound".to_string()),
            message: "topic does not exist".to_string(),
        };
        assert_eq!(err.code(), Some("NotFound"));
        assert!(Error::NotFound("bucket".into()).code().is_none());
    }

    #[test]
    fn test_io_error_converts() {
        let err: Error = io::Error::new(io::ErrorKind::NotFound, "missing").into();
        assert!(matches!(err, Error::Io(_)));
        assert!(!err.is_remote());
    }
}
