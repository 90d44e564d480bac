//! # auth-adapters
//!
//! Credential primitives behind the domain's auth ports: argon2 password
//! hashing, and HS256 bearer tokens behind the `auth-jwt` feature.

use argon2::password_hash::{rand_core::OsRng, PasswordHash, SaltString};
use argon2::password_hash::{PasswordHasher as _, PasswordVerifier as _};
use argon2::Argon2;

use domains::{AppError, PasswordHasher, Result};

#[cfg(feature = "auth-jwt")]
mod jwt;
#[cfg(feature = "auth-jwt")]
pub use jwt::JwtTokenProvider;

/// Argon2id with the crate's default parameters. Hashes are PHC strings, so
/// parameters can be tightened later without invalidating stored hashes.
#[derive(Debug, Default, Clone)]
pub struct Argon2PasswordHasher;

impl PasswordHasher for Argon2PasswordHasher {
    fn hash(&self, plain: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(plain.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(AppError::internal)
    }

    fn verify(&self, plain: &str, hash: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(hash) else {
            return false;
        };
        Argon2::default()
            .verify_password(plain.as_bytes(), &parsed)
            .is_ok()
    }
}
