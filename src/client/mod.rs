// src/client/mod.rs
mod api;
mod retry;

pub use api::{ApiClient, ApiError, RequestOptions};
pub use retry::{RetryDecision, RetryStrategy};
