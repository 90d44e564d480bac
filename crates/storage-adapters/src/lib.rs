//! # storage-adapters
//!
//! Concrete implementations of the domain ports, one module per backing
//! system, each behind its own feature so deployments compile only what
//! they run against.

#[cfg(feature = "db-postgres")]
pub mod postgres;

#[cfg(feature = "redis")]
pub mod valkey;

#[cfg(feature = "search-meili")]
pub mod meili;

#[cfg(feature = "docs-mongo")]
pub mod mongo;

#[cfg(feature = "mq-rabbit")]
pub mod rabbit;
