//! HTTP clients for the external services the simulated business depends on.
//!
//! The bank opens accounts, grants loans, and moves money. The truck market
//! lists truck variants and takes orders. Both are reached over JSON/HTTP
//! with a bounded per-request timeout; neither is retried here. Retry and
//! fallback policy belongs to the caller.
//!
//! # Modules
//!
//! - [`bank`] -- [`BankClient`]
//! - [`market`] -- [`MarketClient`]
//! - [`http`] -- Shared request plumbing and [`HttpClientConfig`]
//! - [`error`] -- [`ClientError`]

pub mod bank;
pub mod error;
pub mod http;
pub mod market;

pub use bank::BankClient;
pub use error::ClientError;
pub use http::HttpClientConfig;
pub use market::MarketClient;
