//! Domain traits defining contracts for external systems.

use async_trait::async_trait;

use super::error::ClientResult;
use super::types::{
    BalanceSnapshot, IdempotencyKey, Quote, QuoteRequest, TransferRequest, WithdrawalSpec,
};

/// Transport seam to the wallet REST backend.
///
/// Implementations perform the network I/O and return failures already
/// classified into [`super::ErrorResult`]; orchestration above this trait
/// never sees a raw transport error. State-changing calls carry the
/// caller's idempotency key so repeated delivery of the same logical
/// request deduplicates server-side.
#[async_trait]
pub trait WalletBackend: Send + Sync {
    /// Request a provisional quote for the given pair, amount, and side.
    async fn create_quote(&self, request: &QuoteRequest) -> ClientResult<Quote>;

    /// Commit a previously obtained quote.
    async fn accept_quote(
        &self,
        quote_id: &str,
        key: &IdempotencyKey,
    ) -> ClientResult<TransferRequest>;

    /// Submit a withdrawal or internal transfer that has no quote step.
    async fn submit_withdrawal(
        &self,
        spec: &WithdrawalSpec,
        key: &IdempotencyKey,
    ) -> ClientResult<TransferRequest>;

    /// Fetch the current state of a submitted transfer. Read-only.
    async fn get_transfer(&self, transaction_id: &str) -> ClientResult<TransferRequest>;

    /// Fetch the full per-asset balance set.
    async fn fetch_balances(&self) -> ClientResult<Vec<BalanceSnapshot>>;
}
