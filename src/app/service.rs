//! Quote/commit transfer orchestration.
//!
//! Every asset movement is a two-phase flow: negotiate a [`Quote`] with a
//! locked rate, then commit it under an idempotency key. The service
//! validates locally before spending a network round trip, retries
//! retryable commit failures with the same key, and keeps the balance
//! cache coherent after settlement.

use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};
use validator::Validate;

use crate::app::cache::BalanceCache;
use crate::config::{ClientConfig, RetryPolicy};
use crate::domain::{
    BalanceSnapshot, ClientResult, ErrorCode, ErrorResult, IdempotencyKey, Quote, QuoteRequest,
    QuoteSide, TransferRequest, WalletBackend, WithdrawalSpec,
};

/// Client-side orchestrator for quotes, commits, withdrawals, status
/// reads and balances.
pub struct TransferService {
    backend: Arc<dyn WalletBackend>,
    cache: Arc<BalanceCache>,
    settlement_asset: Option<String>,
    retry: RetryPolicy,
    cancel: CancellationToken,
}

impl TransferService {
    #[must_use]
    pub fn new(backend: Arc<dyn WalletBackend>, config: &ClientConfig) -> Self {
        let cache = Arc::new(BalanceCache::new(Arc::clone(&backend), config));
        Self {
            backend,
            cache,
            settlement_asset: config.settlement_asset.clone(),
            retry: config.retry,
            cancel: CancellationToken::new(),
        }
    }

    /// The balance cache backing this service.
    #[must_use]
    pub fn cache(&self) -> &Arc<BalanceCache> {
        &self.cache
    }

    /// Cancel every in-flight and future request on this service.
    ///
    /// A commit interrupted mid-flight may still have reached the
    /// backend, so its outcome is reported as unknown rather than
    /// failed; [`Self::get_status`] on a fresh service resolves it.
    pub fn cancel_all_requests(&self) {
        info!("Cancelling all in-flight requests");
        self.cancel.cancel();
    }

    /// Request a rate-locked quote for an asset pair.
    ///
    /// Structurally invalid requests are rejected locally without any
    /// network traffic.
    #[instrument(
        skip(self, request),
        fields(from = %request.from_asset, to = %request.to_asset, side = %request.side)
    )]
    pub async fn create_quote(&self, request: &QuoteRequest) -> ClientResult<Quote> {
        self.validate_quote_request(request)?;
        let quote = self.guarded(self.backend.create_quote(request)).await?;
        info!(quote_id = %quote.id, rate = quote.rate, "Quote received");
        Ok(quote)
    }

    /// Commit a previously negotiated quote.
    ///
    /// An expired or non-open quote is rejected locally; the caller
    /// should negotiate a fresh one. Retryable failures are retried
    /// with the same idempotency key, so at most one logical transfer
    /// results.
    #[instrument(skip(self, quote, key), fields(quote_id = %quote.id))]
    pub async fn accept_quote(
        &self,
        quote: &Quote,
        key: &IdempotencyKey,
    ) -> ClientResult<TransferRequest> {
        let now = Utc::now();
        if !quote.is_committable(now) {
            let message = if quote.is_expired(now) {
                "quote has expired; request a new quote before committing"
            } else {
                "quote is no longer open; request a new quote before committing"
            };
            return Err(ErrorResult::validation(message));
        }

        let backend = Arc::clone(&self.backend);
        let quote_id = quote.id.clone();
        let key = key.clone();
        let transfer = self
            .commit_with_retry("accept_quote", move || {
                let backend = Arc::clone(&backend);
                let quote_id = quote_id.clone();
                let key = key.clone();
                async move { backend.accept_quote(&quote_id, &key).await }
            })
            .await?;

        info!(
            transaction_id = %transfer.transaction_id,
            status = %transfer.status,
            "Quote committed"
        );
        self.settle_caches(&transfer).await;
        Ok(transfer)
    }

    /// Negotiate and commit in one call, generating a fresh idempotency
    /// key for the commit leg.
    #[instrument(skip(self))]
    pub async fn execute_swap(
        &self,
        from_asset: &str,
        to_asset: &str,
        amount: f64,
        side: QuoteSide,
    ) -> ClientResult<TransferRequest> {
        let request = QuoteRequest::new(from_asset, to_asset, amount, side);
        let quote = self.create_quote(&request).await?;
        let key = IdempotencyKey::new();
        self.accept_quote(&quote, &key).await
    }

    /// Submit an external or internal withdrawal.
    ///
    /// Destination and second-factor format problems are caught locally
    /// so the sensitive payload is only sent once it can plausibly
    /// succeed.
    #[instrument(skip(self, spec, key), fields(kind = %spec.kind, asset = %spec.source_asset))]
    pub async fn submit_withdrawal(
        &self,
        spec: &WithdrawalSpec,
        key: &IdempotencyKey,
    ) -> ClientResult<TransferRequest> {
        spec.validate_format()?;

        let backend = Arc::clone(&self.backend);
        let spec = spec.clone();
        let key = key.clone();
        let transfer = self
            .commit_with_retry("submit_withdrawal", move || {
                let backend = Arc::clone(&backend);
                let spec = spec.clone();
                let key = key.clone();
                async move { backend.submit_withdrawal(&spec, &key).await }
            })
            .await?;

        info!(
            transaction_id = %transfer.transaction_id,
            status = %transfer.status,
            "Withdrawal submitted"
        );
        self.settle_caches(&transfer).await;
        Ok(transfer)
    }

    /// Current state of a transfer, straight from the backend.
    #[instrument(skip(self))]
    pub async fn get_status(&self, transaction_id: &str) -> ClientResult<TransferRequest> {
        self.guarded(self.backend.get_transfer(transaction_id))
            .await
    }

    /// Balance for one asset, served from cache while fresh.
    pub async fn get_balance(&self, asset: &str) -> ClientResult<BalanceSnapshot> {
        self.cache.get(asset).await
    }

    /// All balances, served from cache while fresh.
    pub async fn get_balances(&self) -> ClientResult<Vec<BalanceSnapshot>> {
        self.cache.get_all().await
    }

    /// Bypass the TTL and fetch a fresh snapshot now.
    pub async fn refresh_balances(&self) -> ClientResult<Vec<BalanceSnapshot>> {
        self.cache.force_refresh().await
    }

    /// Drop every cached balance; the next read goes to the network.
    pub async fn invalidate_balances(&self) {
        self.cache.invalidate_all().await;
    }

    fn validate_quote_request(&self, request: &QuoteRequest) -> ClientResult<()> {
        request
            .validate()
            .map_err(|e| ErrorResult::validation(e.to_string()))?;
        if request.from_asset == request.to_asset {
            return Err(ErrorResult::validation(
                "source and target assets must differ",
            ));
        }
        if let Some(settlement) = &self.settlement_asset {
            let legs = [&request.from_asset, &request.to_asset];
            let settlement_legs = legs.iter().filter(|a| **a == settlement).count();
            if settlement_legs != 1 {
                return Err(ErrorResult::validation(format!(
                    "exactly one leg of the pair must be the settlement asset {}",
                    settlement
                )));
            }
        }
        Ok(())
    }

    /// Run a commit closure under the retry policy.
    ///
    /// The closure captures the idempotency key, so every attempt
    /// presents the same one and a retry after an ambiguous delivery
    /// cannot double-spend.
    async fn commit_with_retry<T, F, Fut>(&self, operation: &str, mut call: F) -> ClientResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ClientResult<T>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let backoff = self.retry.backoff(attempt);
            if !backoff.is_zero() {
                tokio::time::sleep(backoff).await;
            }

            match self.guarded(call()).await {
                Ok(value) => return Ok(value),
                Err(e) if e.retryable && attempt < self.retry.max_attempts => {
                    warn!(
                        operation,
                        attempt,
                        error = %e,
                        "Retryable commit failure; retrying with the same idempotency key"
                    );
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Race a backend call against cancellation.
    async fn guarded<T>(&self, call: impl Future<Output = ClientResult<T>>) -> ClientResult<T> {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(cancelled_error()),
            result = call => result,
        }
    }

    /// Invalidate the settled assets and refresh the cache.
    ///
    /// Invalidation happens before the commit result is returned, so a
    /// read immediately after a commit never sees a pre-transfer
    /// balance. The follow-up refresh is best effort.
    async fn settle_caches(&self, transfer: &TransferRequest) {
        self.cache.invalidate(&transfer.source_asset).await;
        self.cache.invalidate(&transfer.destination_asset).await;
        if let Err(e) = self.cache.force_refresh().await {
            warn!(error = %e, "Post-commit balance refresh failed; cache refills on next read");
        }
    }
}

fn cancelled_error() -> ErrorResult {
    ErrorResult::new(
        ErrorCode::Unknown,
        "request cancelled before a response arrived; the outcome is unknown, poll the \
         transfer status to resolve it",
        None,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::QuoteStatus;
    use crate::test_utils::MockBackend;

    fn service(backend: Arc<MockBackend>) -> TransferService {
        TransferService::new(backend, &ClientConfig::new("http://localhost:1", "token"))
    }

    fn open_quote() -> Quote {
        Quote {
            id: "q_local".to_string(),
            from_asset: "BTC".to_string(),
            to_asset: "USDT".to_string(),
            amount: 0.5,
            side: QuoteSide::Sell,
            rate: 60_000.0,
            expires_at: Utc::now() + chrono::Duration::seconds(30),
            status: QuoteStatus::Open,
        }
    }

    #[tokio::test]
    async fn test_same_asset_pair_rejected_locally() {
        let backend = Arc::new(MockBackend::new());
        let service = service(Arc::clone(&backend));

        let request = QuoteRequest {
            from_asset: "BTC".to_string(),
            to_asset: "BTC".to_string(),
            amount: 1.0,
            side: QuoteSide::Buy,
        };
        let err = service.create_quote(&request).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);
        assert_eq!(backend.counts.total(), 0);
    }

    #[tokio::test]
    async fn test_settlement_asset_must_appear_on_exactly_one_leg() {
        let backend = Arc::new(MockBackend::new());
        let config = ClientConfig::new("http://localhost:1", "token").with_settlement_asset("USDT");
        let service =
            TransferService::new(Arc::clone(&backend) as Arc<dyn WalletBackend>, &config);

        let neither = QuoteRequest {
            from_asset: "BTC".to_string(),
            to_asset: "ETH".to_string(),
            amount: 1.0,
            side: QuoteSide::Buy,
        };
        assert_eq!(
            service.create_quote(&neither).await.unwrap_err().code,
            ErrorCode::ValidationError
        );

        let one_leg = QuoteRequest {
            from_asset: "BTC".to_string(),
            to_asset: "USDT".to_string(),
            amount: 1.0,
            side: QuoteSide::Sell,
        };
        assert!(service.create_quote(&one_leg).await.is_ok());
    }

    #[tokio::test]
    async fn test_expired_quote_rejected_without_backend_call() {
        let backend = Arc::new(MockBackend::new());
        let service = service(Arc::clone(&backend));

        let mut quote = open_quote();
        quote.expires_at = Utc::now() - chrono::Duration::seconds(1);

        let err = service
            .accept_quote(&quote, &IdempotencyKey::new())
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);
        assert!(err.message.contains("expired"));
        assert_eq!(backend.counts.total(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_commit_reports_unknown_outcome() {
        let backend = Arc::new(MockBackend::new());
        let service = service(backend);
        service.cancel_all_requests();

        let err = service.get_status("tx_whatever").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::Unknown);
        assert!(!err.retryable);
        assert!(err.message.contains("poll"));
    }
}
