//! Test utilities shared by unit and integration tests.

pub mod mocks;

pub use mocks::{CallCounts, MockBackend, MockConfig};
