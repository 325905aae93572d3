//! User registry behind an injected [`UserStore`].
//!
//! [`UserRegistry`] implements the create/read/update/delete/list rules; the
//! store only holds records. [`memory::InMemoryUserStore`] is the default
//! backend; data does not survive a restart.

pub mod memory;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::RegistryError;

pub use memory::InMemoryUserStore;

pub const DEFAULT_ROLE: &str = "user";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: String,
}

/// Fields to change on update. `None` leaves a field untouched.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UserPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<String>,
}

/// Storage capability for user records.
pub trait UserStore: Send + Sync {
    fn get(&self, id: &str) -> Option<User>;

    /// Insert or replace the record with `user.id`.
    fn put(&self, user: User);

    /// Apply `change` to the record with `id` in place and return the result.
    ///
    /// Returns `None` without inserting anything when no such record exists.
    /// The lookup and the change happen under one lock.
    fn modify(&self, id: &str, change: &mut dyn FnMut(&mut User)) -> Option<User>;

    /// Remove and return the record, if present.
    fn delete(&self, id: &str) -> Option<User>;

    /// All records, oldest first.
    fn list(&self) -> Vec<User>;
}

#[derive(Clone)]
pub struct UserRegistry {
    store: Arc<dyn UserStore>,
}

impl UserRegistry {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self { store }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryUserStore::new()))
    }

    pub fn create(&self, name: &str, email: &str, role: Option<&str>) -> Result<User, RegistryError> {
        let user = User {
            id: Uuid::new_v4().to_string(),
            name: required("name", name)?,
            email: required("email", email)?,
            role: role
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .unwrap_or(DEFAULT_ROLE)
                .to_string(),
        };
        self.store.put(user.clone());
        tracing::debug!(user_id = %user.id, "User created");
        Ok(user)
    }

    pub fn read(&self, id: &str) -> Result<User, RegistryError> {
        self.store
            .get(id)
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))
    }

    pub fn list(&self) -> Vec<User> {
        self.store.list()
    }

    pub fn update(&self, id: &str, patch: UserPatch) -> Result<User, RegistryError> {
        let name = patch.name.map(|n| required("name", &n)).transpose()?;
        let email = patch.email.map(|e| required("email", &e)).transpose()?;
        let role = patch.role.map(|r| required("role", &r)).transpose()?;

        self.store
            .modify(id, &mut |user: &mut User| {
                if let Some(name) = &name {
                    user.name = name.clone();
                }
                if let Some(email) = &email {
                    user.email = email.clone();
                }
                if let Some(role) = &role {
                    user.role = role.clone();
                }
            })
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))
    }

    pub fn delete(&self, id: &str) -> Result<User, RegistryError> {
        let removed = self
            .store
            .delete(id)
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;
        tracing::debug!(user_id = %id, "User deleted");
        Ok(removed)
    }
}

fn required(field: &'static str, value: &str) -> Result<String, RegistryError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(RegistryError::InvalidField {
            field,
            message: "must not be empty".to_string(),
        });
    }
    Ok(trimmed.to_string())
}
