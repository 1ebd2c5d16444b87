//! Table-driven classification of backend failures.
//!
//! Backend error messages are free text and differently nested across
//! endpoints, so classification is an explicit, ordered rule table rather
//! than cascading conditionals: the priority order is auditable here and
//! testable in isolation. `classify` is a pure function and never panics;
//! any unexpected shape resolves to the flow's fallback code.

use serde_json::Value;

use crate::domain::{ErrorCode, ErrorResult};

/// Which operation produced the failure. Determines the fallback code and
/// the message used when the body carries none.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Quote,
    Commit,
    Withdrawal,
    Status,
    Balances,
}

impl Flow {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Quote => "quote request",
            Self::Commit => "quote commit",
            Self::Withdrawal => "withdrawal",
            Self::Status => "status lookup",
            Self::Balances => "balance fetch",
        }
    }
}

/// How a network call failed, before classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawFailure {
    /// No HTTP response at all (connect error, timeout).
    NoResponse { detail: String },
    /// A response arrived; `body` may be absent, plain text, or JSON of
    /// any nesting.
    Response { status: u16, body: String },
}

struct MessageRule {
    needles: &'static [&'static str],
    code: ErrorCode,
}

/// First match wins, top to bottom: the most specific business condition
/// sits above the generic ones (a message naming both "2FA" and "limit"
/// is a 2FA failure, not a limit failure).
const MESSAGE_RULES: &[MessageRule] = &[
    MessageRule {
        needles: &["2fa", "two-factor", "two factor", "otp"],
        code: ErrorCode::Invalid2faCode,
    },
    MessageRule {
        needles: &["pin", "password"],
        code: ErrorCode::InvalidPasswordPin,
    },
    MessageRule {
        needles: &["insufficient balance", "insufficient funds"],
        code: ErrorCode::InsufficientBalance,
    },
    MessageRule {
        needles: &["limit exceeded", "exceeds limit", "limit reached"],
        code: ErrorCode::LimitExceeded,
    },
    MessageRule {
        needles: &["duplicate", "already processed", "already submitted"],
        code: ErrorCode::DuplicateRequest,
    },
];

/// Classify a raw failure into the closed error taxonomy.
pub fn classify(flow: Flow, raw: &RawFailure) -> ErrorResult {
    match raw {
        RawFailure::NoResponse { detail } => ErrorResult::new(
            ErrorCode::NetworkError,
            format!("{} received no response: {}", flow.name(), detail),
            None,
        ),
        RawFailure::Response { status, body } => classify_response(flow, *status, body),
    }
}

fn classify_response(flow: Flow, status: u16, body: &str) -> ErrorResult {
    let message = extract_message(body)
        .unwrap_or_else(|| format!("{} failed with status {}", flow.name(), status));

    let code = match status {
        400..=499 => match_message(&message).unwrap_or(match status {
            400 | 422 => ErrorCode::ValidationError,
            401 | 403 => ErrorCode::Unauthorized,
            404 => ErrorCode::NotFound,
            409 => ErrorCode::DuplicateRequest,
            _ => ErrorCode::Unknown,
        }),
        502 | 503 | 504 => ErrorCode::UpstreamError,
        500..=599 => ErrorCode::ServerError,
        // A 2xx whose envelope carried success=false still lands here.
        _ => match_message(&message).unwrap_or(ErrorCode::Unknown),
    };

    ErrorResult::new(code, message, Some(status))
}

fn match_message(message: &str) -> Option<ErrorCode> {
    let lowered = message.to_lowercase();
    MESSAGE_RULES
        .iter()
        .find(|rule| rule.needles.iter().any(|needle| lowered.contains(needle)))
        .map(|rule| rule.code)
}

/// Pull a human-readable message out of whatever the backend sent.
///
/// Endpoints disagree on nesting: some return `{success, message}`, some
/// `{error: {message}}`, some wrap everything in `data`, and some return
/// plain text. Dig through the known keys in order, else fall back to the
/// raw body.
fn extract_message(body: &str) -> Option<String> {
    fn dig(value: &Value, depth: u8) -> Option<String> {
        if depth == 0 {
            return None;
        }
        match value {
            Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
            Value::Object(map) => ["message", "error", "detail", "data"]
                .iter()
                .find_map(|key| map.get(*key).and_then(|v| dig(v, depth - 1))),
            _ => None,
        }
    }

    if let Ok(value) = serde_json::from_str::<Value>(body) {
        if let Some(message) = dig(&value, 4) {
            return Some(message);
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        None
    } else {
        // Plain-text body; keep it short enough for a user-facing message.
        Some(trimmed.chars().take(200).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(status: u16, body: &str) -> RawFailure {
        RawFailure::Response {
            status,
            body: body.to_string(),
        }
    }

    #[test]
    fn test_no_response_is_retryable_network_error() {
        let raw = RawFailure::NoResponse {
            detail: "connection refused".to_string(),
        };
        let err = classify(Flow::Commit, &raw);
        assert_eq!(err.code, ErrorCode::NetworkError);
        assert!(err.retryable);
        assert!(err.http_status.is_none());
    }

    #[test]
    fn test_classification_is_deterministic() {
        let raw = response(400, r#"{"success":false,"message":"insufficient balance"}"#);
        let first = classify(Flow::Withdrawal, &raw);
        let second = classify(Flow::Withdrawal, &raw);
        assert_eq!(first, second);
        assert_eq!(first.code, ErrorCode::InsufficientBalance);
    }

    #[test]
    fn test_401_with_2fa_message_beats_unauthorized() {
        let raw = response(401, r#"{"success":false,"message":"invalid 2fa code"}"#);
        let err = classify(Flow::Withdrawal, &raw);
        assert_eq!(err.code, ErrorCode::Invalid2faCode);
        assert!(!err.retryable);
    }

    #[test]
    fn test_rule_priority_most_specific_first() {
        // Mentions both 2FA and a limit; the 2FA rule sits higher.
        let raw = response(
            400,
            r#"{"message":"invalid 2fa code, daily limit exceeded"}"#,
        );
        assert_eq!(classify(Flow::Commit, &raw).code, ErrorCode::Invalid2faCode);

        // PIN rule outranks the limit rule.
        let raw = response(400, r#"{"message":"wrong pin, limit exceeded"}"#);
        assert_eq!(
            classify(Flow::Commit, &raw).code,
            ErrorCode::InvalidPasswordPin
        );
    }

    #[test]
    fn test_limit_exceeded_match() {
        let raw = response(400, r#"{"message":"transaction limit exceeded for tier 1"}"#);
        let err = classify(Flow::Commit, &raw);
        assert_eq!(err.code, ErrorCode::LimitExceeded);
        assert!(!err.retryable);
    }

    #[test]
    fn test_bare_401_is_unauthorized() {
        let raw = response(401, r#"{"message":"token expired"}"#);
        assert_eq!(classify(Flow::Quote, &raw).code, ErrorCode::Unauthorized);
    }

    #[test]
    fn test_404_maps_to_not_found() {
        let raw = response(404, r#"{"message":"quote not found"}"#);
        assert_eq!(classify(Flow::Status, &raw).code, ErrorCode::NotFound);
    }

    #[test]
    fn test_409_maps_to_duplicate() {
        let raw = response(409, "");
        assert_eq!(
            classify(Flow::Commit, &raw).code,
            ErrorCode::DuplicateRequest
        );
    }

    #[test]
    fn test_gateway_statuses_are_retryable_upstream_errors() {
        for status in [502, 503, 504] {
            let err = classify(Flow::Balances, &response(status, ""));
            assert_eq!(err.code, ErrorCode::UpstreamError, "status {}", status);
            assert!(err.retryable);
        }
    }

    #[test]
    fn test_other_5xx_is_retryable_server_error() {
        let err = classify(Flow::Quote, &response(500, "Internal Server Error"));
        assert_eq!(err.code, ErrorCode::ServerError);
        assert!(err.retryable);
    }

    #[test]
    fn test_garbled_body_does_not_panic_and_falls_back() {
        let err = classify(Flow::Quote, &response(400, "<html>not json</html>"));
        assert_eq!(err.code, ErrorCode::ValidationError);

        let err = classify(Flow::Quote, &response(418, "{{{{"));
        assert_eq!(err.code, ErrorCode::Unknown);
    }

    #[test]
    fn test_message_extraction_handles_nesting() {
        let nested = r#"{"success":false,"error":{"message":"insufficient funds"}}"#;
        let err = classify(Flow::Commit, &response(400, nested));
        assert_eq!(err.code, ErrorCode::InsufficientBalance);
        assert_eq!(err.message, "insufficient funds");

        let double = r#"{"data":{"error":"limit exceeded"}}"#;
        let err = classify(Flow::Commit, &response(400, double));
        assert_eq!(err.code, ErrorCode::LimitExceeded);
    }

    #[test]
    fn test_soft_failure_on_2xx_still_matches_rules() {
        let raw = response(200, r#"{"success":false,"message":"insufficient balance"}"#);
        assert_eq!(
            classify(Flow::Commit, &raw).code,
            ErrorCode::InsufficientBalance
        );
    }

    #[test]
    fn test_empty_body_uses_flow_message() {
        let err = classify(Flow::Balances, &response(500, ""));
        assert!(err.message.contains("balance fetch"));
        assert_eq!(err.http_status, Some(500));
    }
}
