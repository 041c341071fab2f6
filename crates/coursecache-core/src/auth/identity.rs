use parking_lot::RwLock;
use tracing::debug;

use crate::error::{CacheError, Result};
use crate::models::{User, UserRole};

#[derive(Debug, Default)]
pub struct AuthState {
    user: RwLock<Option<User>>,
}

impl AuthState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(user: User) -> Self {
        Self {
            user: RwLock::new(Some(user)),
        }
    }

    /// Replace the current identity (after a login elsewhere)
    pub fn set_user(&self, user: User) {
        debug!(user_id = user.id, role = %user.role, "Identity set");
        *self.user.write() = Some(user);
    }

    /// Forget the current identity (after a logout elsewhere)
    pub fn clear(&self) {
        *self.user.write() = None;
    }

    pub fn current_user(&self) -> Option<User> {
        self.user.read().clone()
    }

    pub fn user_id(&self) -> Option<i64> {
        self.user.read().as_ref().map(|u| u.id)
    }

    /// The current user id, or `Unauthenticated` without touching the network.
    pub fn require_user_id(&self) -> Result<i64> {
        self.user_id().ok_or(CacheError::Unauthenticated)
    }

    pub fn role(&self) -> Option<UserRole> {
        self.user.read().as_ref().map(|u| u.role)
    }

    pub fn is_admin(&self) -> bool {
        self.role() == Some(UserRole::Admin)
    }

    pub fn is_teacher(&self) -> bool {
        self.role() == Some(UserRole::Teacher)
    }
}
