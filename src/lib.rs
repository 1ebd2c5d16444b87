//! Client-side orchestration for wallet asset transfers.
//!
//! This crate implements the quote/commit layer shared by swaps, fiat
//! on/off-ramp conversions, external withdrawals, and internal transfers:
//! it shapes requests, attaches idempotency keys, classifies backend
//! failures into a stable taxonomy, and keeps a local balance cache
//! coherent with the server ledger after each commit.
//!
//! The transport seam is the [`domain::WalletBackend`] trait; the default
//! implementation is [`infra::HttpBackend`] over the wallet REST API.
//! All orchestration lives in [`app::TransferService`].

pub mod app;
pub mod config;
pub mod domain;
pub mod infra;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use app::{BalanceCache, TransferService};
pub use config::{ClientConfig, RetryPolicy};
pub use domain::{
    AuthProof, BalanceSnapshot, ClientResult, Destination, ErrorCode, ErrorResult, IdempotencyKey,
    Quote, QuoteRequest, QuoteSide, QuoteStatus, TransferKind, TransferRequest, TransferStatus,
    WalletBackend, WithdrawalSpec,
};
pub use infra::HttpBackend;
