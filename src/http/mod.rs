//! HTTP client layer — `AccountHttp` with per-endpoint retry policies.

pub mod client;
pub mod retry;

pub use client::{AccountHttp, QueryPairs};
pub use retry::{RetryConfig, RetryPolicy};
