//! API key authentication against the static key set.
//!
//! Key issuance is out of scope: four well-known keys map to one user per
//! tier. Tests may register extra users.

use chrono::TimeZone;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::HashMap;

use crate::common::ApiError;

use super::models::{User, UserTier};

/// Validates `X-API-Key` values and resolves users.
pub struct AuthService {
    users: RwLock<HashMap<String, User>>,
}

impl AuthService {
    /// Create a service seeded with the static test keys.
    pub fn new() -> Self {
        let mut users = HashMap::new();
        for user in static_users() {
            users.insert(user.api_key.clone(), user);
        }
        Self {
            users: RwLock::new(users),
        }
    }

    /// Resolve an API key to its user.
    ///
    /// Fails with `AUTH_INVALID_KEY` for unknown keys and deactivated
    /// accounts.
    pub fn validate_api_key(&self, api_key: &str) -> Result<User, ApiError> {
        let users = self.users.read();
        let user = users
            .get(api_key)
            .ok_or(ApiError::InvalidApiKey { reason: None })?;

        if !user.is_active {
            return Err(ApiError::InvalidApiKey {
                reason: Some("User account is deactivated".to_string()),
            });
        }

        Ok(user.clone())
    }

    /// Look up a user by id rather than key.
    pub fn user_by_id(&self, user_id: &str) -> Option<User> {
        self.users
            .read()
            .values()
            .find(|user| user.id == user_id)
            .cloned()
    }

    /// All known users, for dashboard/admin snapshots.
    pub fn all_users(&self) -> Vec<User> {
        let mut users: Vec<User> = self.users.read().values().cloned().collect();
        users.sort_by(|a, b| a.id.cmp(&b.id));
        users
    }

    /// Enforce a minimum tier for an operation.
    pub fn require_tier(&self, user: &User, minimum: UserTier) -> Result<(), ApiError> {
        if user.tier < minimum {
            return Err(ApiError::InsufficientTier {
                current: user.tier,
                required: minimum,
                details: None,
            });
        }
        Ok(())
    }

    /// Register an additional user (tests).
    pub fn add_user(&self, user: User) {
        self.users.write().insert(user.api_key.clone(), user);
    }
}

impl Default for AuthService {
    fn default() -> Self {
        Self::new()
    }
}

/// One static user per tier, keyed by the well-known test API keys.
fn static_users() -> Vec<User> {
    let created_at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    vec![
        User {
            id: "user_free_001".to_string(),
            email: "free@test.com".to_string(),
            tier: UserTier::Free,
            api_key: "free_test_key".to_string(),
            created_at,
            is_active: true,
        },
        User {
            id: "user_dev_001".to_string(),
            email: "developer@test.com".to_string(),
            tier: UserTier::Developer,
            api_key: "dev_test_key".to_string(),
            created_at,
            is_active: true,
        },
        User {
            id: "user_pro_001".to_string(),
            email: "pro@test.com".to_string(),
            tier: UserTier::Pro,
            api_key: "pro_test_key".to_string(),
            created_at,
            is_active: true,
        },
        User {
            id: "user_ent_001".to_string(),
            email: "enterprise@test.com".to_string(),
            tier: UserTier::Enterprise,
            api_key: "enterprise_test_key".to_string(),
            created_at,
            is_active: true,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_known_keys() {
        let auth = AuthService::new();
        let user = auth.validate_api_key("dev_test_key").unwrap();
        assert_eq!(user.id, "user_dev_001");
        assert_eq!(user.tier, UserTier::Developer);
    }

    #[test]
    fn test_validate_unknown_key() {
        let auth = AuthService::new();
        let error = auth.validate_api_key("nope").unwrap_err();
        assert_eq!(error.code(), "AUTH_INVALID_KEY");
    }

    #[test]
    fn test_validate_deactivated_user() {
        let auth = AuthService::new();
        auth.add_user(User {
            id: "user_gone_001".to_string(),
            email: "gone@test.com".to_string(),
            tier: UserTier::Pro,
            api_key: "gone_test_key".to_string(),
            created_at: Utc::now(),
            is_active: false,
        });
        let error = auth.validate_api_key("gone_test_key").unwrap_err();
        assert_eq!(error.code(), "AUTH_INVALID_KEY");
    }

    #[test]
    fn test_require_tier() {
        let auth = AuthService::new();
        let dev = auth.validate_api_key("dev_test_key").unwrap();
        assert!(auth.require_tier(&dev, UserTier::Developer).is_ok());
        let error = auth.require_tier(&dev, UserTier::Pro).unwrap_err();
        assert_eq!(error.code(), "AUTH_INSUFFICIENT_TIER");
    }

    #[test]
    fn test_user_by_id() {
        let auth = AuthService::new();
        assert!(auth.user_by_id("user_ent_001").is_some());
        assert!(auth.user_by_id("user_unknown").is_none());
    }
}
