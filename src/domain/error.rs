//! Error taxonomy shared by every flow.
//!
//! Backend failures are never surfaced as raw transport errors: each one is
//! classified into a closed [`ErrorCode`] with retry guidance and returned
//! as a typed [`ErrorResult`], so callers always receive a uniform shape.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for all fallible client operations.
pub type ClientResult<T> = Result<T, ErrorResult>;

/// Closed set of client-visible error codes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// No HTTP response was received (connect failure, timeout).
    #[serde(rename = "NETWORK_ERROR")]
    NetworkError,
    /// Request rejected for malformed or out-of-range input.
    #[serde(rename = "VALIDATION_ERROR")]
    ValidationError,
    /// The source balance cannot cover amount plus fee.
    #[serde(rename = "INSUFFICIENT_BALANCE")]
    InsufficientBalance,
    /// A KYC tier or transaction ceiling was exceeded.
    #[serde(rename = "LIMIT_EXCEEDED")]
    LimitExceeded,
    /// The second-factor code was rejected.
    #[serde(rename = "INVALID_2FA_CODE")]
    Invalid2faCode,
    /// The transaction PIN or password was rejected.
    #[serde(rename = "INVALID_PASSWORDPIN")]
    InvalidPasswordPin,
    /// Missing, expired, or insufficient credentials.
    #[serde(rename = "UNAUTHORIZED")]
    Unauthorized,
    /// A gateway upstream of the backend failed (502/503/504).
    #[serde(rename = "UPSTREAM_ERROR")]
    UpstreamError,
    /// The backend itself failed (other 5xx).
    #[serde(rename = "SERVER_ERROR")]
    ServerError,
    /// The backend recognized this idempotency key or request as a repeat.
    #[serde(rename = "DUPLICATE_REQUEST")]
    DuplicateRequest,
    /// The referenced resource does not exist.
    #[serde(rename = "NOT_FOUND")]
    NotFound,
    /// Anything that could not be classified.
    #[serde(rename = "UNKNOWN")]
    Unknown,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NetworkError => "NETWORK_ERROR",
            Self::ValidationError => "VALIDATION_ERROR",
            Self::InsufficientBalance => "INSUFFICIENT_BALANCE",
            Self::LimitExceeded => "LIMIT_EXCEEDED",
            Self::Invalid2faCode => "INVALID_2FA_CODE",
            Self::InvalidPasswordPin => "INVALID_PASSWORDPIN",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::UpstreamError => "UPSTREAM_ERROR",
            Self::ServerError => "SERVER_ERROR",
            Self::DuplicateRequest => "DUPLICATE_REQUEST",
            Self::NotFound => "NOT_FOUND",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Whether a retry of the same logical action (with the same
    /// idempotency key) is worthwhile.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::NetworkError | Self::UpstreamError | Self::ServerError
        )
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A classified failure, constructed fresh per failed call.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq)]
#[error("{code}: {message}")]
pub struct ErrorResult {
    pub code: ErrorCode,
    pub message: String,
    /// HTTP status of the failed call, if a response was received.
    pub http_status: Option<u16>,
    pub retryable: bool,
}

impl ErrorResult {
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>, http_status: Option<u16>) -> Self {
        Self {
            code,
            message: message.into(),
            http_status,
            retryable: code.is_retryable(),
        }
    }

    /// A local (pre-network) validation failure.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationError, message, None)
    }

    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NetworkError, message, None)
    }

    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message, None)
    }

    #[must_use]
    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unknown, message, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_codes() {
        assert!(ErrorCode::NetworkError.is_retryable());
        assert!(ErrorCode::UpstreamError.is_retryable());
        assert!(ErrorCode::ServerError.is_retryable());

        assert!(!ErrorCode::ValidationError.is_retryable());
        assert!(!ErrorCode::InsufficientBalance.is_retryable());
        assert!(!ErrorCode::Invalid2faCode.is_retryable());
        assert!(!ErrorCode::Unauthorized.is_retryable());
        assert!(!ErrorCode::DuplicateRequest.is_retryable());
        assert!(!ErrorCode::Unknown.is_retryable());
    }

    #[test]
    fn test_error_result_carries_retry_flag_from_code() {
        let err = ErrorResult::new(ErrorCode::UpstreamError, "bad gateway", Some(502));
        assert!(err.retryable);
        assert_eq!(err.http_status, Some(502));

        let err = ErrorResult::validation("amount must be positive");
        assert!(!err.retryable);
        assert!(err.http_status.is_none());
    }

    #[test]
    fn test_display_includes_code_and_message() {
        let err = ErrorResult::new(ErrorCode::Invalid2faCode, "invalid 2fa code", Some(401));
        assert_eq!(err.to_string(), "INVALID_2FA_CODE: invalid 2fa code");
    }

    #[test]
    fn test_code_serialization_is_screaming_snake_case() {
        let json = serde_json::to_string(&ErrorCode::InsufficientBalance).unwrap();
        assert_eq!(json, "\"INSUFFICIENT_BALANCE\"");
    }
}
