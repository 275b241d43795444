//! Error types for pool operations
use std::time::Duration;

use thiserror::Error;

use crate::request::Origin;

/// Result type for pool operations
pub type Result<T> = std::result::Result<T, Error>;

/// Opaque error produced by factory callbacks.
///
/// Creation errors are never delivered to acquire callers; they surface only
/// through [`PoolEvent::CreateError`](crate::PoolEvent::CreateError).
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Error type for pool operations.
///
/// Every acquire failure carries the [`Origin`] of the `acquire` call that
/// created the request, so timeouts of long-queued requests can be traced
/// back to their call site.
#[derive(Error, Debug, Clone)]
pub enum Error {
    /// Pool configuration is invalid
    #[error("Configuration error: {message}")]
    Configuration {
        /// The error message
        message: String,
    },

    /// The pool is draining and accepts no new requests
    #[error("Pool is draining, acquire rejected (requested at {origin})")]
    AcquireDuringDraining {
        /// Call site of the rejected acquire
        origin: Origin,
    },

    /// The request's deadline passed before a resource became available
    #[error("Acquire timed out after {timeout:?} (requested at {origin})")]
    AcquireTimeout {
        /// Call site of the timed-out acquire
        origin: Origin,
        /// The timeout the request was enqueued with
        timeout: Duration,
    },

    /// The queued request was cancelled by a drain
    #[error("Acquire aborted by drain (requested at {origin})")]
    AbortedByDrain {
        /// Call site of the aborted acquire
        origin: Origin,
    },

    /// The pending-request cap was reached
    #[error("Request queue is full: {limit} requests already pending (requested at {origin})")]
    MaxRequestsLimit {
        /// Call site of the rejected acquire
        origin: Origin,
        /// The configured `max_requests` cap
        limit: usize,
    },
}

impl Error {
    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Stable machine-readable label for this error.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Configuration { .. } => "CONFIGURATION_ERROR",
            Self::AcquireDuringDraining { .. } => "ACQUIRE_DURING_DRAINING",
            Self::AcquireTimeout { .. } => "ACQUIRE_TIMEOUT_ERROR",
            Self::AbortedByDrain { .. } => "ACQUIRE_ABORTED_BY_DRAIN",
            Self::MaxRequestsLimit { .. } => "MAX_REQUESTS_LIMIT",
        }
    }

    /// Get the captured call site of the acquire that failed (if any)
    #[must_use]
    pub fn origin(&self) -> Option<Origin> {
        match self {
            Self::Configuration { .. } => None,
            Self::AcquireDuringDraining { origin }
            | Self::AcquireTimeout { origin, .. }
            | Self::AbortedByDrain { origin }
            | Self::MaxRequestsLimit { origin, .. } => Some(*origin),
        }
    }

    /// Check if this error is retryable
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::AcquireTimeout { .. } => true,
            Self::MaxRequestsLimit { .. } => true,
            Self::Configuration { .. }
            | Self::AcquireDuringDraining { .. }
            | Self::AbortedByDrain { .. } => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[track_caller]
    fn origin() -> Origin {
        Origin::capture()
    }

    #[test]
    fn codes_are_stable() {
        assert_eq!(Error::configuration("bad").code(), "CONFIGURATION_ERROR");
        assert_eq!(
            Error::AcquireDuringDraining { origin: origin() }.code(),
            "ACQUIRE_DURING_DRAINING"
        );
        assert_eq!(
            Error::AcquireTimeout {
                origin: origin(),
                timeout: Duration::from_secs(1),
            }
            .code(),
            "ACQUIRE_TIMEOUT_ERROR"
        );
        assert_eq!(
            Error::AbortedByDrain { origin: origin() }.code(),
            "ACQUIRE_ABORTED_BY_DRAIN"
        );
        assert_eq!(
            Error::MaxRequestsLimit {
                origin: origin(),
                limit: 4,
            }
            .code(),
            "MAX_REQUESTS_LIMIT"
        );
    }

    #[test]
    fn timeout_and_queue_full_are_retryable() {
        assert!(Error::AcquireTimeout {
            origin: origin(),
            timeout: Duration::from_secs(1),
        }
        .is_retryable());
        assert!(Error::MaxRequestsLimit {
            origin: origin(),
            limit: 1,
        }
        .is_retryable());
        assert!(!Error::AbortedByDrain { origin: origin() }.is_retryable());
        assert!(!Error::AcquireDuringDraining { origin: origin() }.is_retryable());
    }

    #[test]
    fn acquire_errors_carry_their_origin() {
        let err = Error::AbortedByDrain { origin: origin() };
        let origin = err.origin().expect("acquire errors carry an origin");
        assert!(origin.file().ends_with("error.rs"));
        assert!(err.to_string().contains("error.rs"));
    }

    #[test]
    fn configuration_error_has_no_origin() {
        assert!(Error::configuration("max must be nonzero").origin().is_none());
    }
}
