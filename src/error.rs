//! Error types for the metareg SDK
//!
//! This module defines the typed error surface callers observe, using
//! `thiserror` for ergonomic error handling. Transport failures from the
//! underlying HTTP client are always mapped into one of these variants;
//! callers never see a raw `reqwest::Error`.

use thiserror::Error;

/// Boxed error preserved as the cause of a transport-level failure.
pub type Cause = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Main error type for metareg operations
///
/// The first three variants are transport-level and always carry the
/// original cause. [`MetaregError::Http`] is protocol-level and carries the
/// status code and the server-supplied body text instead of a cause.
#[derive(Error, Debug)]
pub enum MetaregError {
    /// Could not reach the server (DNS failure, refused connection, reset).
    #[error("connection error: {message}")]
    Connection {
        /// Human-readable description of the failure
        message: String,
        /// The underlying transport error
        #[source]
        cause: Cause,
    },

    /// An individual attempt exceeded its per-call timeout.
    #[error("timeout: {message}")]
    Timeout {
        /// Human-readable description of the failure
        message: String,
        /// The underlying transport error
        #[source]
        cause: Cause,
    },

    /// The transport gave up following a redirect chain.
    #[error("too many redirects: {message}")]
    TooManyRedirects {
        /// Human-readable description of the failure
        message: String,
        /// The underlying transport error
        #[source]
        cause: Cause,
    },

    /// The server answered with a status code of 400 or above.
    #[error("HTTP {status_code}: {message}")]
    Http {
        /// The HTTP status code returned by the server
        status_code: u16,
        /// The response body text, verbatim
        message: String,
    },

    /// The credential exchange was rejected by the authorization server.
    #[error("authorization error: {message}")]
    Authorization {
        /// Human-readable description of the rejection
        message: String,
        /// The underlying cause, when the failure was transport-level
        #[source]
        cause: Option<Cause>,
    },

    /// Invalid or incomplete SDK configuration (e.g. a client-credentials
    /// grant requested without an identity and secret).
    #[error("configuration error: {0}")]
    Config(String),
}

impl MetaregError {
    /// Returns `true` when a retry of the failed call could succeed.
    ///
    /// Connection failures, timeouts and redirect loops are transient.
    /// HTTP errors are transient except for the 400-499 range, where the
    /// server has rejected the request itself and a retry cannot help --
    /// with the single exception of 429 (rate limited). Authorization and
    /// configuration errors are never retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            MetaregError::Connection { .. }
            | MetaregError::Timeout { .. }
            | MetaregError::TooManyRedirects { .. } => true,
            MetaregError::Http { status_code, .. } => {
                !(400..500).contains(status_code) || *status_code == 429
            }
            MetaregError::Authorization { .. } | MetaregError::Config(_) => false,
        }
    }

    /// Classifies a transport error into the typed taxonomy.
    ///
    /// `reqwest` reports timeouts, connection failures and exceeded
    /// redirect limits on the same error type; this inspects the flags in
    /// that order. Anything unrecognized is treated as a connection
    /// failure so the caller still receives a typed error.
    pub fn from_transport(err: reqwest::Error) -> Self {
        let message = err.to_string();
        if err.is_timeout() {
            MetaregError::Timeout {
                message,
                cause: Box::new(err),
            }
        } else if err.is_redirect() {
            MetaregError::TooManyRedirects {
                message,
                cause: Box::new(err),
            }
        } else {
            MetaregError::Connection {
                message,
                cause: Box::new(err),
            }
        }
    }
}

impl From<reqwest::Error> for MetaregError {
    fn from(err: reqwest::Error) -> Self {
        MetaregError::from_transport(err)
    }
}

/// Result type alias for metareg operations
pub type Result<T> = std::result::Result<T, MetaregError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn io_cause(msg: &str) -> Cause {
        Box::new(std::io::Error::new(
            std::io::ErrorKind::Other,
            msg.to_string(),
        ))
    }

    #[test]
    fn test_connection_error_display() {
        let error = MetaregError::Connection {
            message: "refused".to_string(),
            cause: io_cause("refused"),
        };
        assert_eq!(error.to_string(), "connection error: refused");
    }

    #[test]
    fn test_http_error_display() {
        let error = MetaregError::Http {
            status_code: 403,
            message: "some json value".to_string(),
        };
        assert_eq!(error.to_string(), "HTTP 403: some json value");
    }

    #[test]
    fn test_authorization_error_display() {
        let error = MetaregError::Authorization {
            message: "invalid_client".to_string(),
            cause: None,
        };
        assert_eq!(error.to_string(), "authorization error: invalid_client");
    }

    #[test]
    fn test_transport_errors_are_retryable() {
        let conn = MetaregError::Connection {
            message: "x".to_string(),
            cause: io_cause("x"),
        };
        let timeout = MetaregError::Timeout {
            message: "x".to_string(),
            cause: io_cause("x"),
        };
        let redirects = MetaregError::TooManyRedirects {
            message: "x".to_string(),
            cause: io_cause("x"),
        };
        assert!(conn.is_retryable());
        assert!(timeout.is_retryable());
        assert!(redirects.is_retryable());
    }

    #[test]
    fn test_client_errors_are_fatal_except_429() {
        let forbidden = MetaregError::Http {
            status_code: 403,
            message: String::new(),
        };
        let not_found = MetaregError::Http {
            status_code: 404,
            message: String::new(),
        };
        let rate_limited = MetaregError::Http {
            status_code: 429,
            message: String::new(),
        };
        assert!(!forbidden.is_retryable());
        assert!(!not_found.is_retryable());
        assert!(rate_limited.is_retryable());
    }

    #[test]
    fn test_server_errors_are_retryable() {
        for status in [500u16, 502, 503] {
            let error = MetaregError::Http {
                status_code: status,
                message: String::new(),
            };
            assert!(error.is_retryable(), "HTTP {} should be retryable", status);
        }
    }

    #[test]
    fn test_authorization_and_config_are_never_retryable() {
        let auth = MetaregError::Authorization {
            message: "rejected".to_string(),
            cause: Some(io_cause("rejected")),
        };
        let config = MetaregError::Config("missing secret".to_string());
        assert!(!auth.is_retryable());
        assert!(!config.is_retryable());
    }

    #[test]
    fn test_cause_is_preserved_as_source() {
        use std::error::Error as _;
        let error = MetaregError::Timeout {
            message: "slow".to_string(),
            cause: io_cause("slow"),
        };
        assert!(error.source().is_some());
    }

    #[test]
    fn test_http_error_has_no_source() {
        use std::error::Error as _;
        let error = MetaregError::Http {
            status_code: 500,
            message: "boom".to_string(),
        };
        assert!(error.source().is_none());
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<MetaregError>();
    }
}
