//! Mock implementations for testing.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::domain::{
    BalanceSnapshot, ClientResult, ErrorResult, IdempotencyKey, Quote, QuoteRequest, QuoteStatus,
    TransferRequest, TransferStatus, WalletBackend, WithdrawalSpec,
};

/// Configuration for mock behavior.
#[derive(Debug, Clone, Default)]
pub struct MockConfig {
    /// Fail every call with this error.
    pub failure: Option<ErrorResult>,
    /// Fail only balance fetches with this error.
    pub fetch_failure: Option<ErrorResult>,
    /// Artificial latency before each balance fetch resolves; used to
    /// hold a fetch in flight while a second caller arrives.
    pub fetch_latency: Option<Duration>,
    /// Seconds until generated quotes expire.
    pub quote_ttl_secs: i64,
    /// Status reported for freshly committed transfers.
    pub commit_status: TransferStatus,
}

impl MockConfig {
    #[must_use]
    pub fn success() -> Self {
        Self {
            failure: None,
            fetch_failure: None,
            fetch_latency: None,
            quote_ttl_secs: 60,
            commit_status: TransferStatus::Success,
        }
    }

    #[must_use]
    pub fn failing(error: ErrorResult) -> Self {
        Self {
            failure: Some(error),
            ..Self::success()
        }
    }
}

/// Per-method call counters.
#[derive(Debug, Default)]
pub struct CallCounts {
    pub create_quote: AtomicUsize,
    pub accept_quote: AtomicUsize,
    pub submit_withdrawal: AtomicUsize,
    pub get_transfer: AtomicUsize,
    pub fetch_balances: AtomicUsize,
}

impl CallCounts {
    pub fn total(&self) -> usize {
        self.create_quote.load(Ordering::Relaxed)
            + self.accept_quote.load(Ordering::Relaxed)
            + self.submit_withdrawal.load(Ordering::Relaxed)
            + self.get_transfer.load(Ordering::Relaxed)
            + self.fetch_balances.load(Ordering::Relaxed)
    }
}

/// In-memory wallet backend with failure injection and call accounting.
///
/// Commits are idempotent the way the real backend is: a repeated
/// idempotency key returns the transfer created by the first delivery
/// instead of creating a second one.
pub struct MockBackend {
    config: MockConfig,
    pub counts: CallCounts,
    balances: Mutex<Vec<BalanceSnapshot>>,
    quotes: Mutex<HashMap<String, Quote>>,
    transfers_by_key: Mutex<HashMap<String, TransferRequest>>,
    transfers_by_id: Mutex<HashMap<String, TransferRequest>>,
    observed_keys: Mutex<Vec<String>>,
    /// Errors consumed one per commit attempt before commits succeed;
    /// lets a test script "fail once, then succeed".
    scripted_commit_errors: Mutex<VecDeque<ErrorResult>>,
}

impl MockBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(MockConfig::success())
    }

    #[must_use]
    pub fn with_config(config: MockConfig) -> Self {
        Self {
            config,
            counts: CallCounts::default(),
            balances: Mutex::new(Vec::new()),
            quotes: Mutex::new(HashMap::new()),
            transfers_by_key: Mutex::new(HashMap::new()),
            transfers_by_id: Mutex::new(HashMap::new()),
            observed_keys: Mutex::new(Vec::new()),
            scripted_commit_errors: Mutex::new(VecDeque::new()),
        }
    }

    #[must_use]
    pub fn failing(error: ErrorResult) -> Self {
        Self::with_config(MockConfig::failing(error))
    }

    pub fn set_balances(&self, balances: Vec<BalanceSnapshot>) {
        *self.balances.lock().unwrap() = balances;
    }

    /// Queue an error for the next commit attempt(s); once drained,
    /// commits succeed again.
    pub fn script_commit_error(&self, error: ErrorResult) {
        self.scripted_commit_errors.lock().unwrap().push_back(error);
    }

    /// Idempotency keys seen across all commit attempts, in order.
    pub fn observed_keys(&self) -> Vec<String> {
        self.observed_keys.lock().unwrap().clone()
    }

    /// Number of distinct transfers actually created.
    pub fn created_transfers(&self) -> usize {
        self.transfers_by_id.lock().unwrap().len()
    }

    pub fn fetch_count(&self) -> usize {
        self.counts.fetch_balances.load(Ordering::Relaxed)
    }

    fn check_failure(&self) -> ClientResult<()> {
        match &self.config.failure {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    fn commit(
        &self,
        key: &IdempotencyKey,
        kind: crate::domain::TransferKind,
        source_asset: String,
        destination_asset: String,
        amount: f64,
    ) -> ClientResult<TransferRequest> {
        self.observed_keys
            .lock()
            .unwrap()
            .push(key.as_str().to_string());
        self.check_failure()?;
        if let Some(error) = self.scripted_commit_errors.lock().unwrap().pop_front() {
            return Err(error);
        }

        // Duplicate delivery resolves to the first outcome.
        if let Some(existing) = self.transfers_by_key.lock().unwrap().get(key.as_str()) {
            return Ok(existing.clone());
        }

        let now = Utc::now();
        let transfer = TransferRequest {
            transaction_id: format!("tx_{}", Uuid::new_v4()),
            idempotency_key: key.as_str().to_string(),
            kind,
            source_asset,
            destination_asset,
            amount,
            fee: 0.0,
            destination: None,
            status: self.config.commit_status,
            created_at: now,
            updated_at: now,
        };
        self.transfers_by_key
            .lock()
            .unwrap()
            .insert(key.as_str().to_string(), transfer.clone());
        self.transfers_by_id
            .lock()
            .unwrap()
            .insert(transfer.transaction_id.clone(), transfer.clone());
        Ok(transfer)
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WalletBackend for MockBackend {
    async fn create_quote(&self, request: &QuoteRequest) -> ClientResult<Quote> {
        self.counts.create_quote.fetch_add(1, Ordering::Relaxed);
        self.check_failure()?;

        let quote = Quote {
            id: format!("q_{}", Uuid::new_v4()),
            from_asset: request.from_asset.clone(),
            to_asset: request.to_asset.clone(),
            amount: request.amount,
            side: request.side,
            rate: 18.0,
            expires_at: Utc::now() + chrono::Duration::seconds(self.config.quote_ttl_secs),
            status: QuoteStatus::Open,
        };
        self.quotes
            .lock()
            .unwrap()
            .insert(quote.id.clone(), quote.clone());
        Ok(quote)
    }

    async fn accept_quote(
        &self,
        quote_id: &str,
        key: &IdempotencyKey,
    ) -> ClientResult<TransferRequest> {
        self.counts.accept_quote.fetch_add(1, Ordering::Relaxed);

        let quote = self
            .quotes
            .lock()
            .unwrap()
            .get(quote_id)
            .cloned()
            .ok_or_else(|| ErrorResult::not_found(format!("quote {} not found", quote_id)))?;
        self.commit(
            key,
            crate::domain::TransferKind::Swap,
            quote.from_asset,
            quote.to_asset,
            quote.amount,
        )
    }

    async fn submit_withdrawal(
        &self,
        spec: &WithdrawalSpec,
        key: &IdempotencyKey,
    ) -> ClientResult<TransferRequest> {
        self.counts.submit_withdrawal.fetch_add(1, Ordering::Relaxed);
        self.commit(
            key,
            spec.kind,
            spec.source_asset.clone(),
            spec.source_asset.clone(),
            spec.amount,
        )
    }

    async fn get_transfer(&self, transaction_id: &str) -> ClientResult<TransferRequest> {
        self.counts.get_transfer.fetch_add(1, Ordering::Relaxed);
        self.check_failure()?;
        self.transfers_by_id
            .lock()
            .unwrap()
            .get(transaction_id)
            .cloned()
            .ok_or_else(|| ErrorResult::not_found(format!("transfer {} not found", transaction_id)))
    }

    async fn fetch_balances(&self) -> ClientResult<Vec<BalanceSnapshot>> {
        self.counts.fetch_balances.fetch_add(1, Ordering::Relaxed);
        if let Some(latency) = self.config.fetch_latency {
            tokio::time::sleep(latency).await;
        }
        self.check_failure()?;
        if let Some(error) = &self.config.fetch_failure {
            return Err(error.clone());
        }
        Ok(self.balances.lock().unwrap().clone())
    }
}
