//! Identity use cases: sign-up, login, bearer-token authentication with
//! revocation, and account deletion.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use domains::{
    AppError, NewUser, PasswordHasher, Result, TokenBlacklist, TokenProvider, User, UserRepo,
    UserRole,
};

use crate::access::authorize_account_delete;

#[derive(Clone)]
pub struct UserService {
    users: Arc<dyn UserRepo>,
    hasher: Arc<dyn PasswordHasher>,
    tokens: Arc<dyn TokenProvider>,
    blacklist: Arc<dyn TokenBlacklist>,
}

impl UserService {
    pub fn new(
        users: Arc<dyn UserRepo>,
        hasher: Arc<dyn PasswordHasher>,
        tokens: Arc<dyn TokenProvider>,
        blacklist: Arc<dyn TokenBlacklist>,
    ) -> Self {
        Self {
            users,
            hasher,
            tokens,
            blacklist,
        }
    }

    pub async fn sign_up(&self, username: String, email: String, password: String) -> Result<User> {
        let password_hash = self.hasher.hash(&password)?;
        self.users
            .insert(NewUser {
                username,
                email,
                password_hash,
                role: UserRole::Member,
            })
            .await
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<String> {
        let user = self
            .users
            .find_active_by_username(username)
            .await?
            .filter(|user| self.hasher.verify(password, &user.password_hash))
            .ok_or_else(|| {
                AppError::Unauthenticated("Invalid username or password".to_string())
            })?;

        self.users.record_login(user.id, Utc::now()).await?;
        self.tokens.issue(&user.username)
    }

    /// Extracts the bearer token from an `Authorization` header value.
    /// Format problems are validation errors, not authentication failures.
    pub fn parse_bearer(header: &str) -> Result<&str> {
        let (scheme, token) = header.split_once(' ').ok_or_else(|| {
            AppError::Validation("Invalid authorization header format".to_string())
        })?;
        if !scheme.eq_ignore_ascii_case("bearer") {
            return Err(AppError::Validation(
                "Invalid authentication scheme".to_string(),
            ));
        }
        Ok(token)
    }

    /// Resolves a presented `Authorization` header to its active user.
    pub async fn authenticate(&self, header: &str) -> Result<User> {
        let token = Self::parse_bearer(header)?;
        if self.blacklist.is_revoked(token).await? {
            return Err(AppError::Unauthenticated(
                "Token has been revoked".to_string(),
            ));
        }
        let claims = self.tokens.decode(token)?;
        self.users
            .find_active_by_username(&claims.sub)
            .await?
            .ok_or_else(|| AppError::Unauthenticated("User not found".to_string()))
    }

    /// Optional authentication: any failure degrades to anonymous.
    pub async fn authenticate_optional(&self, header: Option<&str>) -> Option<User> {
        match header {
            Some(header) => self.authenticate(header).await.ok(),
            None => None,
        }
    }

    /// Revokes the presented token until its natural expiry.
    pub async fn logout_all(&self, header: &str) -> Result<()> {
        let token = Self::parse_bearer(header)?;
        let claims = self.tokens.decode(token)?;
        let remaining = claims.exp - Utc::now().timestamp();
        if remaining > 0 {
            self.blacklist
                .revoke(token, Duration::from_secs(remaining as u64))
                .await?;
        }
        Ok(())
    }

    pub async fn list(&self) -> Result<Vec<User>> {
        self.users.list_active().await
    }

    pub async fn delete_account(&self, caller: &User, user_id: i64) -> Result<()> {
        authorize_account_delete(user_id, caller)?;
        if self.users.find_active_by_id(user_id).await?.is_none() {
            return Err(AppError::NotFound("User"));
        }
        self.users.soft_delete(user_id, Utc::now()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use domains::{
        Lifecycle, MockPasswordHasher, MockTokenBlacklist, MockTokenProvider, MockUserRepo,
        TokenClaims,
    };
    use mockall::predicate::eq;

    fn user(id: i64, username: &str, role: UserRole) -> User {
        let now = Utc::now();
        User {
            id,
            username: username.to_string(),
            email: format!("{username}@test.com"),
            password_hash: "HASH".to_string(),
            role,
            last_login: None,
            lifecycle: Lifecycle::default(),
            created_at: now,
            updated_at: now,
        }
    }

    fn service(
        users: MockUserRepo,
        hasher: MockPasswordHasher,
        tokens: MockTokenProvider,
        blacklist: MockTokenBlacklist,
    ) -> UserService {
        UserService::new(
            Arc::new(users),
            Arc::new(hasher),
            Arc::new(tokens),
            Arc::new(blacklist),
        )
    }

    #[tokio::test]
    async fn test_sign_up_stores_hash_not_password() {
        let mut hasher = MockPasswordHasher::new();
        hasher
            .expect_hash()
            .with(eq("pw123"))
            .returning(|_| Ok("HASH".to_string()));
        let mut users = MockUserRepo::new();
        users
            .expect_insert()
            .withf(|new| new.password_hash == "HASH" && new.role == UserRole::Member)
            .returning(|new| {
                let mut created = user(1, &new.username, new.role);
                created.email = new.email;
                Ok(created)
            });

        let created = service(
            users,
            hasher,
            MockTokenProvider::new(),
            MockTokenBlacklist::new(),
        )
        .sign_up("alice".into(), "alice@x.com".into(), "pw123".into())
        .await
        .unwrap();
        assert_eq!(created.username, "alice");
    }

    #[tokio::test]
    async fn test_login_rejects_wrong_password() {
        let mut users = MockUserRepo::new();
        users
            .expect_find_active_by_username()
            .returning(|name| Ok(Some(user(1, name, UserRole::Member))));
        users.expect_record_login().times(0);
        let mut hasher = MockPasswordHasher::new();
        hasher.expect_verify().returning(|_, _| false);

        let err = service(
            users,
            hasher,
            MockTokenProvider::new(),
            MockTokenBlacklist::new(),
        )
        .login("alice", "wrong")
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Unauthenticated(_)));
    }

    #[tokio::test]
    async fn test_authenticate_rejects_revoked_token() {
        let mut blacklist = MockTokenBlacklist::new();
        blacklist
            .expect_is_revoked()
            .with(eq("tok"))
            .returning(|_| Ok(true));
        let mut tokens = MockTokenProvider::new();
        tokens.expect_decode().times(0);

        let err = service(
            MockUserRepo::new(),
            MockPasswordHasher::new(),
            tokens,
            blacklist,
        )
        .authenticate("Bearer tok")
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Unauthenticated(_)));
    }

    #[tokio::test]
    async fn test_malformed_header_is_validation_error() {
        let svc = service(
            MockUserRepo::new(),
            MockPasswordHasher::new(),
            MockTokenProvider::new(),
            MockTokenBlacklist::new(),
        );
        assert!(matches!(
            svc.authenticate("garbage").await.unwrap_err(),
            AppError::Validation(_)
        ));
        assert!(matches!(
            svc.authenticate("Basic dXNlcg==").await.unwrap_err(),
            AppError::Validation(_)
        ));
    }

    #[tokio::test]
    async fn test_logout_all_revokes_until_expiry() {
        let mut tokens = MockTokenProvider::new();
        tokens.expect_decode().returning(|_| {
            let now = Utc::now().timestamp();
            Ok(TokenClaims {
                sub: "alice".to_string(),
                iat: now,
                exp: now + 600,
            })
        });
        let mut blacklist = MockTokenBlacklist::new();
        blacklist
            .expect_revoke()
            .withf(|token, ttl| token == "tok" && *ttl <= Duration::from_secs(600))
            .times(1)
            .returning(|_, _| Ok(()));

        service(
            MockUserRepo::new(),
            MockPasswordHasher::new(),
            tokens,
            blacklist,
        )
        .logout_all("Bearer tok")
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_member_cannot_delete_other_account() {
        let svc = service(
            MockUserRepo::new(),
            MockPasswordHasher::new(),
            MockTokenProvider::new(),
            MockTokenBlacklist::new(),
        );
        let err = svc
            .delete_account(&user(2, "bob", UserRole::Member), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_admin_deletes_other_account() {
        let mut users = MockUserRepo::new();
        users
            .expect_find_active_by_id()
            .with(eq(1))
            .returning(|id| Ok(Some(user(id, "alice", UserRole::Member))));
        users
            .expect_soft_delete()
            .with(eq(1), mockall::predicate::always())
            .times(1)
            .returning(|_, _| Ok(()));

        service(
            users,
            MockPasswordHasher::new(),
            MockTokenProvider::new(),
            MockTokenBlacklist::new(),
        )
        .delete_account(&user(9, "root", UserRole::Admin), 1)
        .await
        .unwrap();
    }
}
