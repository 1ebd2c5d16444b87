//! Application layer: orchestration and caching.

pub mod cache;
pub mod service;

pub use cache::BalanceCache;
pub use service::TransferService;
