//! HS256 bearer tokens. Claims carry the username as `sub` plus issue and
//! expiry epochs; revocation lives in the token blacklist, not here.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};

use domains::{AppError, Result, TokenClaims, TokenProvider};

pub struct JwtTokenProvider {
    secret: SecretString,
    expire_minutes: i64,
}

impl JwtTokenProvider {
    pub fn new(secret: SecretString, expire_minutes: i64) -> Self {
        Self {
            secret,
            expire_minutes,
        }
    }
}

impl TokenProvider for JwtTokenProvider {
    fn issue(&self, username: &str) -> Result<String> {
        let now = Utc::now();
        let claims = TokenClaims {
            sub: username.to_string(),
            iat: now.timestamp(),
            exp: (now + Duration::minutes(self.expire_minutes)).timestamp(),
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.expose_secret().as_bytes()),
        )
        .map_err(AppError::internal)
    }

    fn decode(&self, token: &str) -> Result<TokenClaims> {
        decode::<TokenClaims>(
            token,
            &DecodingKey::from_secret(self.secret.expose_secret().as_bytes()),
            &Validation::default(),
        )
        .map(|data| data.claims)
        .map_err(|err| match err.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                AppError::Unauthenticated("Token has expired".to_string())
            }
            _ => AppError::Unauthenticated("Invalid token".to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> JwtTokenProvider {
        JwtTokenProvider::new(SecretString::from("test-secret"), 60)
    }

    #[test]
    fn test_issue_then_decode() {
        let tokens = provider();
        let token = tokens.issue("alice").unwrap();
        let claims = tokens.decode(&token).unwrap();
        assert_eq!(claims.sub, "alice");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = provider().issue("alice").unwrap();
        let other = JwtTokenProvider::new(SecretString::from("other-secret"), 60);
        assert!(matches!(
            other.decode(&token),
            Err(AppError::Unauthenticated(_))
        ));
    }
}
