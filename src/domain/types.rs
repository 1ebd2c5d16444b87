//! Domain types with validation support.

use chrono::{DateTime, Duration, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::error::ErrorResult;

/// Which leg of the pair the quoted amount denominates.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum QuoteSide {
    Buy,
    Sell,
    /// Amount is denominated in the source asset.
    SourceGiven,
    /// Amount is denominated in the target asset.
    TargetGiven,
}

impl QuoteSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Buy => "buy",
            Self::Sell => "sell",
            Self::SourceGiven => "source_given",
            Self::TargetGiven => "target_given",
        }
    }
}

impl std::str::FromStr for QuoteSide {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "buy" => Ok(Self::Buy),
            "sell" => Ok(Self::Sell),
            "source_given" => Ok(Self::SourceGiven),
            "target_given" => Ok(Self::TargetGiven),
            _ => Err(format!("Invalid quote side: {}", s)),
        }
    }
}

impl std::fmt::Display for QuoteSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle of a server-priced quote.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum QuoteStatus {
    /// Priced and committable until expiry.
    #[default]
    Open,
    /// Committed; the quote can never be accepted again.
    Accepted,
    /// Expiry elapsed before commit.
    Expired,
}

impl QuoteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Accepted => "accepted",
            Self::Expired => "expired",
        }
    }
}

impl std::str::FromStr for QuoteStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "open" => Ok(Self::Open),
            "accepted" => Ok(Self::Accepted),
            "expired" => Ok(Self::Expired),
            _ => Err(format!("Invalid quote status: {}", s)),
        }
    }
}

impl std::fmt::Display for QuoteStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A short-lived, server-priced conversion proposal.
///
/// `rate` and `expires_at` are authoritative from the server; the client
/// never recomputes or extrapolates them. Only `status` changes after
/// creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Quote {
    pub id: String,
    pub from_asset: String,
    pub to_asset: String,
    pub amount: f64,
    pub side: QuoteSide,
    pub rate: f64,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub status: QuoteStatus,
}

impl Quote {
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Whether a commit attempt is still allowed.
    #[must_use]
    pub fn is_committable(&self, now: DateTime<Utc>) -> bool {
        self.status == QuoteStatus::Open && !self.is_expired(now)
    }
}

/// What kind of value movement a transfer request represents.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TransferKind {
    Swap,
    Withdrawal,
    InternalTransfer,
}

impl TransferKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Swap => "swap",
            Self::Withdrawal => "withdrawal",
            Self::InternalTransfer => "internal_transfer",
        }
    }
}

impl std::fmt::Display for TransferKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Transfer lifecycle.
///
/// `Created` exists only client-side, before the request is sent. The
/// remaining states come from the server; the mapping is closed and an
/// unrecognized server string is an error, never an invented status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
    #[default]
    Created,
    Submitted,
    Pending,
    Processing,
    Success,
    Failed,
}

impl TransferStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Submitted => "submitted",
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failed)
    }
}

impl std::str::FromStr for TransferStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "created" => Ok(Self::Created),
            "submitted" => Ok(Self::Submitted),
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "success" => Ok(Self::Success),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("Invalid transfer status: {}", s)),
        }
    }
}

impl std::fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Client-generated token deduplicating repeated delivery of one logical
/// state-changing request.
///
/// The only constructors produce a non-empty value, so a transfer can never
/// reach submission without one. Generate exactly one key per user action
/// and reuse it across every retry of that action.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    /// A fresh UUID-v4 key. No I/O, no failure mode.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Restore a previously issued key (e.g. when resuming a retried
    /// action). Rejects empty input rather than minting a replacement.
    pub fn parse(value: impl Into<String>) -> Result<Self, ErrorResult> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(ErrorResult::validation("idempotency key must not be empty"));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for IdempotencyKey {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where a withdrawal or internal transfer delivers value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Destination {
    /// An on-chain address on an optional named network.
    External {
        address: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        network: Option<String>,
    },
    /// Another user of the same wallet, addressed by username.
    Internal { username: String },
}

impl Destination {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::External { address, .. } => address.trim().is_empty(),
            Self::Internal { username } => username.trim().is_empty(),
        }
    }
}

/// Required length of the 2FA code and the transaction PIN.
pub const AUTH_CODE_LEN: usize = 6;

fn is_numeric_code(value: &str, len: usize) -> bool {
    value.len() == len && value.bytes().all(|b| b.is_ascii_digit())
}

/// Second-factor code plus transaction PIN, both fixed-length numeric.
///
/// Held as secrets; exposed only when the wire request is built.
#[derive(Debug, Clone)]
pub struct AuthProof {
    pub two_fa_code: SecretString,
    pub pin: SecretString,
}

impl AuthProof {
    #[must_use]
    pub fn new(two_fa_code: impl Into<String>, pin: impl Into<String>) -> Self {
        Self {
            two_fa_code: SecretString::from(two_fa_code.into()),
            pin: SecretString::from(pin.into()),
        }
    }

    /// Format check only; correctness is the server's call.
    pub fn validate_format(&self) -> Result<(), ErrorResult> {
        if !is_numeric_code(self.two_fa_code.expose_secret(), AUTH_CODE_LEN) {
            return Err(ErrorResult::validation(format!(
                "2FA code must be exactly {} digits",
                AUTH_CODE_LEN
            )));
        }
        if !is_numeric_code(self.pin.expose_secret(), AUTH_CODE_LEN) {
            return Err(ErrorResult::validation(format!(
                "PIN must be exactly {} digits",
                AUTH_CODE_LEN
            )));
        }
        Ok(())
    }
}

/// Request to price a conversion or transfer.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct QuoteRequest {
    #[validate(length(min = 1, message = "Source asset is required"))]
    pub from_asset: String,
    #[validate(length(min = 1, message = "Target asset is required"))]
    pub to_asset: String,
    #[validate(range(min = 0.000000001, message = "Amount must be greater than 0"))]
    pub amount: f64,
    pub side: QuoteSide,
}

impl QuoteRequest {
    #[must_use]
    pub fn new(
        from_asset: impl Into<String>,
        to_asset: impl Into<String>,
        amount: f64,
        side: QuoteSide,
    ) -> Self {
        Self {
            from_asset: from_asset.into(),
            to_asset: to_asset.into(),
            amount,
            side,
        }
    }
}

/// Request to move value out of the wallet without a quote step.
#[derive(Debug, Clone, Validate)]
pub struct WithdrawalSpec {
    pub kind: TransferKind,
    #[validate(length(min = 1, message = "Source asset is required"))]
    pub source_asset: String,
    #[validate(range(min = 0.000000001, message = "Amount must be greater than 0"))]
    pub amount: f64,
    pub destination: Destination,
    pub auth: AuthProof,
}

impl WithdrawalSpec {
    /// All client-side format checks, run before any network call.
    pub fn validate_format(&self) -> Result<(), ErrorResult> {
        self.validate()
            .map_err(|e| ErrorResult::validation(e.to_string()))?;
        if self.destination.is_empty() {
            return Err(ErrorResult::validation("destination must not be empty"));
        }
        self.auth.validate_format()
    }
}

/// A submitted (or locally created) transfer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransferRequest {
    pub transaction_id: String,
    pub idempotency_key: String,
    pub kind: TransferKind,
    pub source_asset: String,
    pub destination_asset: String,
    pub amount: f64,
    #[serde(default)]
    pub fee: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<Destination>,
    #[serde(default)]
    pub status: TransferStatus,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

/// One asset's balance as last observed from the server ledger.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BalanceSnapshot {
    pub asset: String,
    pub native_balance: f64,
    pub usd_value: f64,
    #[serde(default = "Utc::now")]
    pub fetched_at: DateTime<Utc>,
}

impl BalanceSnapshot {
    /// Fresh means strictly younger than the TTL; anything at or past the
    /// TTL is stale and must be re-fetched, never silently reused.
    #[must_use]
    pub fn is_fresh(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.fetched_at < ttl
    }
}
