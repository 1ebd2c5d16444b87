//! HTTP transport to the wallet REST backend.

pub mod classify;
pub mod client;

pub use classify::{Flow, RawFailure, classify};
pub use client::{HttpBackend, IDEMPOTENCY_HEADER};
