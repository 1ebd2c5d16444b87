//! Infrastructure layer implementations.

pub mod http;
pub mod mirror;

pub use http::{HttpBackend, IDEMPOTENCY_HEADER};
pub use mirror::BalanceMirror;
