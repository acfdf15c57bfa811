//! Role checks over the identity/role store.

use std::sync::Arc;

use crate::domain::ports::{Role, RoleStore};
use crate::{Result, StorefrontError};

#[derive(Clone)]
pub struct AccessControl { store: Arc<dyn RoleStore> }

impl AccessControl {
    pub fn new(store: Arc<dyn RoleStore>) -> Self { Self { store } }

    /// Role tags for a user; a user without a profile is a customer.
    pub async fn roles(&self, user_id: &str) -> Result<Vec<Role>> {
        Ok(match self.store.roles(user_id).await? {
            Some(roles) if !roles.is_empty() => roles,
            _ => vec![Role::Customer],
        })
    }

    pub async fn require_any(&self, user_id: &str, allowed: &[Role]) -> Result<()> {
        let roles = self.roles(user_id).await?;
        if roles.iter().any(|r| allowed.contains(r)) { return Ok(()); }
        let wanted: Vec<&str> = allowed.iter().map(Role::as_tag).collect();
        Err(StorefrontError::Forbidden(format!("user {user_id} needs one of: {}", wanted.join(", "))))
    }

    pub async fn require_admin(&self, user_id: &str) -> Result<()> { self.require_any(user_id, &[Role::Admin]).await }

    pub async fn require_staff(&self, user_id: &str) -> Result<()> { self.require_any(user_id, &[Role::Admin, Role::TeamMember]).await }
}
