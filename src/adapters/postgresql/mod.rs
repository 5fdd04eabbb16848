//! PostgreSQL integration
//!
//! Provides the pooled client and the [`PostgresStore`] implementation of
//! the key-value store.

pub mod client;
pub mod store;

pub use client::PostgreSQLClient;
pub use store::PostgresStore;
