//! Shared utilities for feature modules
//!
//! - **retry**: bounded caller-side retry for transactional commands
//! - **test_helpers**: store fixtures and fault injection (test-only)

pub mod retry;

#[cfg(test)]
pub mod test_helpers;

pub use retry::{retry_transactional, RetryPolicy, Retryable};
