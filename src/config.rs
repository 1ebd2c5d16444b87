//! Client configuration.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use secrecy::SecretString;

/// Bounded retry policy for retryable commit failures.
///
/// Retries always reuse the idempotency key of the original attempt, so a
/// duplicate delivery resolves to a single logical transfer server-side.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Cap on the exponential backoff between attempts.
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            max_backoff: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    /// Backoff before attempt `attempt` (1-based; attempt 1 has no wait).
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        let exp = (attempt - 2).min(8);
        let backoff = Duration::from_secs(1 << exp);
        backoff.min(self.max_backoff)
    }
}

/// Configuration for [`crate::TransferService`] and [`crate::HttpBackend`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the wallet REST backend.
    pub base_url: String,
    /// Bearer token attached to every request.
    pub api_token: SecretString,
    /// Per-request timeout. A timeout classifies as a retryable
    /// network error.
    pub request_timeout: Duration,
    /// How long a cached balance snapshot stays fresh. Flows differ
    /// (short for trading screens, long for passive displays), so this is
    /// configuration rather than a constant.
    pub balance_ttl: Duration,
    /// When set, every quote must have exactly one leg equal to this
    /// asset (the fiat proxy leg of on/off-ramp flows).
    pub settlement_asset: Option<String>,
    /// Retry policy for retryable commit failures.
    pub retry: RetryPolicy,
    /// Optional on-disk mirror of last-known balances for offline
    /// fallback.
    pub mirror_path: Option<PathBuf>,
    /// Mirrors older than this are discarded instead of served.
    pub offline_max_age: Duration,
}

impl ClientConfig {
    #[must_use]
    pub fn new(base_url: impl Into<String>, api_token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_token: SecretString::from(api_token.into()),
            request_timeout: Duration::from_secs(30),
            balance_ttl: Duration::from_secs(120),
            settlement_asset: None,
            retry: RetryPolicy::default(),
            mirror_path: None,
            offline_max_age: Duration::from_secs(24 * 60 * 60),
        }
    }

    /// Read configuration from the environment.
    ///
    /// `WALLET_API_URL` and `WALLET_API_TOKEN` are required; everything
    /// else falls back to defaults.
    pub fn from_env() -> Result<Self> {
        let base_url = env::var("WALLET_API_URL").context("WALLET_API_URL not set")?;
        let api_token = env::var("WALLET_API_TOKEN").context("WALLET_API_TOKEN not set")?;

        let mut config = Self::new(base_url, api_token);

        if let Some(secs) = read_env_u64("WALLET_REQUEST_TIMEOUT_SECS") {
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = read_env_u64("WALLET_BALANCE_TTL_SECS") {
            config.balance_ttl = Duration::from_secs(secs);
        }
        config.settlement_asset = env::var("WALLET_SETTLEMENT_ASSET")
            .ok()
            .filter(|a| !a.is_empty());
        if let Some(attempts) = read_env_u64("WALLET_COMMIT_MAX_ATTEMPTS") {
            config.retry.max_attempts = attempts.max(1) as u32;
        }
        config.mirror_path = env::var("WALLET_BALANCE_MIRROR_PATH")
            .ok()
            .filter(|p| !p.is_empty())
            .map(PathBuf::from);
        if let Some(hours) = read_env_u64("WALLET_OFFLINE_MAX_AGE_HOURS") {
            config.offline_max_age = Duration::from_secs(hours * 60 * 60);
        }

        Ok(config)
    }

    #[must_use]
    pub fn with_settlement_asset(mut self, asset: impl Into<String>) -> Self {
        self.settlement_asset = Some(asset.into());
        self
    }

    #[must_use]
    pub fn with_balance_ttl(mut self, ttl: Duration) -> Self {
        self.balance_ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_mirror_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.mirror_path = Some(path.into());
        self
    }
}

fn read_env_u64(name: &str) -> Option<u64> {
    env::var(name).ok().and_then(|v| v.parse::<u64>().ok())
}
