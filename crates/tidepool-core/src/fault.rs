// SPDX-FileCopyrightText: 2026 Tidepool Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Faults raised by external collaborators.
//!
//! A [`Fault`] captures the *shape* of a failure (connection drop, timeout,
//! HTTP status, explicitly typed error) without committing to a category.
//! Categorisation into an [`ErrorType`] happens in the resilience crate.

use std::time::Duration;

use thiserror::Error;

use crate::types::ErrorType;

/// A failure reported by the publishing transport or another collaborator.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Fault {
    /// A fault whose category is already known to the raiser.
    #[error("{error_type}: {message}")]
    Typed {
        error_type: ErrorType,
        message: String,
        retry_after: Option<Duration>,
    },

    /// The connection could not be established or was dropped.
    #[error("connection failed: {0}")]
    Connection(String),

    /// The remote side did not answer within the allotted time.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The remote side answered with a non-success HTTP status.
    #[error("HTTP {status}: {message}")]
    Http {
        status: u16,
        message: String,
        retry_after: Option<Duration>,
    },

    /// Anything else.
    #[error("{0}")]
    Other(String),
}

impl Fault {
    /// Shorthand for an explicitly typed fault without a retry-after hint.
    pub fn typed(error_type: ErrorType, message: impl Into<String>) -> Self {
        Fault::Typed {
            error_type,
            message: message.into(),
            retry_after: None,
        }
    }

    /// Shorthand for an HTTP status fault without a retry-after hint.
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Fault::Http {
            status,
            message: message.into(),
            retry_after: None,
        }
    }

    /// The server-supplied retry-after hint, if the fault carries one.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Fault::Typed { retry_after, .. } | Fault::Http { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_after_only_on_typed_and_http() {
        let rate_limited = Fault::Http {
            status: 429,
            message: "slow down".into(),
            retry_after: Some(Duration::from_secs(30)),
        };
        assert_eq!(rate_limited.retry_after(), Some(Duration::from_secs(30)));
        assert_eq!(Fault::Connection("reset".into()).retry_after(), None);
        assert_eq!(Fault::Timeout(Duration::from_secs(1)).retry_after(), None);
    }

    #[test]
    fn display_includes_status() {
        let fault = Fault::http(503, "unavailable");
        assert_eq!(fault.to_string(), "HTTP 503: unavailable");
        let typed = Fault::typed(ErrorType::QuotaExceeded, "daily cap");
        assert_eq!(typed.to_string(), "quota_exceeded: daily cap");
    }
}
