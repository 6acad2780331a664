// libs/shared/database/src/identity.rs
use async_trait::async_trait;
use std::collections::HashMap;
use uuid::Uuid;

use shared_models::ActorRole;

use crate::store::StoreError;

/// Resolves a caller id to its role for authorization checks. Backed by
/// whatever identity provider fronts the deployment; the core only needs
/// this one lookup.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn role_of(&self, user_id: Uuid) -> Result<Option<ActorRole>, StoreError>;
}

/// Fixed in-memory directory, used by tests and embedded deployments.
#[derive(Debug, Default)]
pub struct StaticDirectory {
    roles: HashMap<Uuid, ActorRole>,
}

impl StaticDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn assign(&mut self, user_id: Uuid, role: ActorRole) {
        self.roles.insert(user_id, role);
    }
}

#[async_trait]
impl IdentityResolver for StaticDirectory {
    async fn role_of(&self, user_id: Uuid) -> Result<Option<ActorRole>, StoreError> {
        Ok(self.roles.get(&user_id).copied())
    }
}
