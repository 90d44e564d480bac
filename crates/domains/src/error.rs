//! # AppError
//!
//! Centralized error handling for pinboard. Maps domain-specific failures to
//! actionable error types; the web layer translates each variant to exactly
//! one status code.

use thiserror::Error;

/// The primary error type for all domain operations.
#[derive(Error, Debug)]
pub enum AppError {
    /// Resource absent or soft-deleted (e.g. Board, Article, Comment)
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Malformed request body, params, or headers
    #[error("{0}")]
    Validation(String),

    /// Missing, malformed, expired, or revoked credential
    #[error("{0}")]
    Unauthenticated(String),

    /// Ownership/role check failed
    #[error("{0}")]
    Forbidden(String),

    /// Uniqueness violation (e.g. duplicate username/email)
    #[error("{0}")]
    Conflict(String),

    /// Cooldown active for this identity and action kind
    #[error("{0}")]
    RateLimited(String),

    /// Infrastructure failure (DB down, store timeout)
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Infrastructure failure from any store/client error.
    pub fn internal(err: impl std::fmt::Display) -> Self {
        AppError::Internal(err.to_string())
    }
}

/// A specialized Result type for pinboard logic.
pub type Result<T> = std::result::Result<T, AppError>;
