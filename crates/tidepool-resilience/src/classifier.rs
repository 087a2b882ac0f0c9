// SPDX-FileCopyrightText: 2026 Tidepool Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fault classification.
//!
//! Precedence: an explicitly typed fault wins; then connection and timeout
//! failures are network errors; then HTTP status (429 rate limit, 401
//! authentication, 5xx temporary, other 4xx validation); anything else is
//! unknown.

use std::time::Duration;

use tidepool_core::{ErrorType, Fault, TidepoolError};

/// Errors that can be placed in the [`ErrorType`] taxonomy.
pub trait Classify {
    /// The category this error belongs to.
    fn error_type(&self) -> ErrorType;

    /// A server-supplied delay to wait before retrying, if any.
    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

/// Classify a collaborator fault.
pub fn classify(fault: &Fault) -> ErrorType {
    match fault {
        Fault::Typed { error_type, .. } => *error_type,
        Fault::Connection(_) | Fault::Timeout(_) => ErrorType::NetworkError,
        Fault::Http { status, .. } => classify_status(*status),
        Fault::Other(_) => ErrorType::UnknownError,
    }
}

fn classify_status(status: u16) -> ErrorType {
    match status {
        429 => ErrorType::RateLimit,
        401 => ErrorType::AuthenticationError,
        500..=599 => ErrorType::TemporaryError,
        400..=499 => ErrorType::ValidationError,
        _ => ErrorType::UnknownError,
    }
}

impl Classify for Fault {
    fn error_type(&self) -> ErrorType {
        classify(self)
    }

    fn retry_after(&self) -> Option<Duration> {
        Fault::retry_after(self)
    }
}

impl Classify for TidepoolError {
    fn error_type(&self) -> ErrorType {
        match self {
            TidepoolError::Fault(fault) => classify(fault),
            TidepoolError::Timeout { .. } => ErrorType::NetworkError,
            TidepoolError::CircuitOpen { .. } => ErrorType::TemporaryError,
            TidepoolError::NotFound { .. } | TidepoolError::InvalidTransition { .. } => {
                ErrorType::ValidationError
            }
            TidepoolError::Config(_) => ErrorType::PermanentError,
            TidepoolError::Storage { .. } | TidepoolError::Internal(_) => ErrorType::UnknownError,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            TidepoolError::Fault(fault) => fault.retry_after(),
            TidepoolError::CircuitOpen { retry_in, .. } => Some(*retry_in),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_fault_wins_over_shape() {
        let fault = Fault::Typed {
            error_type: ErrorType::QuotaExceeded,
            message: "HTTP 429 daily cap".into(),
            retry_after: None,
        };
        assert_eq!(classify(&fault), ErrorType::QuotaExceeded);
    }

    #[test]
    fn transport_failures_are_network_errors() {
        assert_eq!(
            classify(&Fault::Connection("connection reset".into())),
            ErrorType::NetworkError
        );
        assert_eq!(
            classify(&Fault::Timeout(Duration::from_secs(30))),
            ErrorType::NetworkError
        );
    }

    #[test]
    fn http_status_table() {
        let cases = [
            (429, ErrorType::RateLimit),
            (401, ErrorType::AuthenticationError),
            (500, ErrorType::TemporaryError),
            (503, ErrorType::TemporaryError),
            (400, ErrorType::ValidationError),
            (403, ErrorType::ValidationError),
            (404, ErrorType::ValidationError),
            (302, ErrorType::UnknownError),
        ];
        for (status, expected) in cases {
            assert_eq!(classify(&Fault::http(status, "x")), expected, "status {status}");
        }
    }

    #[test]
    fn anything_else_is_unknown() {
        assert_eq!(classify(&Fault::Other("???".into())), ErrorType::UnknownError);
    }

    #[test]
    fn workspace_errors_classify_through_faults() {
        let err = TidepoolError::from(Fault::Http {
            status: 429,
            message: "slow down".into(),
            retry_after: Some(Duration::from_secs(120)),
        });
        assert_eq!(err.error_type(), ErrorType::RateLimit);
        assert_eq!(Classify::retry_after(&err), Some(Duration::from_secs(120)));

        let timeout = TidepoolError::Timeout {
            duration: Duration::from_secs(5),
        };
        assert_eq!(timeout.error_type(), ErrorType::NetworkError);
        assert_eq!(
            TidepoolError::Config("bad".into()).error_type(),
            ErrorType::PermanentError
        );
    }
}
