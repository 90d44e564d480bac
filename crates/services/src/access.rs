//! Ownership checks shared by the mutation paths.

use domains::{AppError, Result, User, UserRole};

/// Only the original author may edit or delete an entity. Role carries no
/// weight here, admin included.
pub fn authorize_mutation(owner_id: Option<i64>, caller: &User) -> Result<()> {
    if owner_id == Some(caller.id) {
        return Ok(());
    }
    Err(AppError::Forbidden("no permission".to_string()))
}

/// Account deletion is the one place administrators may act on another
/// user's behalf.
pub fn authorize_account_delete(target_id: i64, caller: &User) -> Result<()> {
    if caller.id == target_id || caller.role == UserRole::Admin {
        return Ok(());
    }
    Err(AppError::Forbidden("no permission".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use domains::Lifecycle;

    fn user(id: i64, role: UserRole) -> User {
        let now = Utc::now();
        User {
            id,
            username: format!("user{id}"),
            email: format!("user{id}@test.com"),
            password_hash: String::new(),
            role,
            last_login: None,
            lifecycle: Lifecycle::default(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_owner_may_mutate() {
        assert!(authorize_mutation(Some(1), &user(1, UserRole::Member)).is_ok());
    }

    #[test]
    fn test_admin_may_not_mutate_others_entities() {
        let err = authorize_mutation(Some(1), &user(2, UserRole::Admin)).unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[test]
    fn test_ownerless_entity_rejects_everyone() {
        assert!(authorize_mutation(None, &user(1, UserRole::Member)).is_err());
    }

    #[test]
    fn test_admin_may_delete_other_account() {
        assert!(authorize_account_delete(1, &user(2, UserRole::Admin)).is_ok());
        assert!(authorize_account_delete(1, &user(2, UserRole::Member)).is_err());
    }
}
