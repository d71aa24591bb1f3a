//! The authenticated caller, as resolved outside the core.

use common::UserId;

use crate::error::{DomainError, Result};

/// Who is performing an operation.
///
/// Authentication and role resolution happen upstream; the core only reads
/// the resolved user id and the pre-checked administrator flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: UserId,
    pub is_admin: bool,
}

impl Actor {
    pub fn customer(user_id: UserId) -> Self {
        Self {
            user_id,
            is_admin: false,
        }
    }

    pub fn admin(user_id: UserId) -> Self {
        Self {
            user_id,
            is_admin: true,
        }
    }

    /// Administrators see everything; customers only what they own.
    pub fn can_access(&self, owner: UserId) -> bool {
        self.is_admin || self.user_id == owner
    }

    pub fn ensure_access(&self, owner: UserId, action: &str) -> Result<()> {
        if self.can_access(owner) {
            Ok(())
        } else {
            Err(DomainError::Forbidden(format!("not allowed to {action}")))
        }
    }
}

/// Fails with `Forbidden` unless the caller was resolved as an administrator.
pub fn require_admin(is_admin: bool, action: &str) -> Result<()> {
    if is_admin {
        Ok(())
    } else {
        Err(DomainError::Forbidden(format!(
            "administrator role required to {action}"
        )))
    }
}
