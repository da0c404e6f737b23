//! In-memory user repository used by service and handler tests.

use crate::db::repositories::user::{DuplicateEmail, UserRepository};
use crate::models::{User, UserChanges};
use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Mirrors the `cms.users` constraints: serial ids and unique emails.
#[derive(Default)]
pub struct InMemoryUserRepository {
    users: RwLock<Vec<User>>,
}

impl InMemoryUserRepository {
    pub fn boxed() -> Arc<dyn UserRepository> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn create(&self, user: &User) -> Result<User> {
        let mut users = self.users.write().await;
        if users.iter().any(|u| u.email == user.email) {
            return Err(DuplicateEmail.into());
        }

        let now = Utc::now();
        let mut created = user.clone();
        created.id = users.iter().map(|u| u.id).max().unwrap_or(0) + 1;
        created.created_at = now;
        created.updated_at = now;
        users.push(created.clone());
        Ok(created)
    }

    async fn get_by_id(&self, id: i32) -> Result<Option<User>> {
        let users = self.users.read().await;
        Ok(users.iter().find(|u| u.id == id).cloned())
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        let users = self.users.read().await;
        Ok(users.iter().find(|u| u.email == email).cloned())
    }

    async fn update(&self, id: i32, changes: &UserChanges) -> Result<Option<User>> {
        let mut users = self.users.write().await;

        if let Some(email) = &changes.email {
            if users.iter().any(|u| u.id != id && &u.email == email) {
                return Err(DuplicateEmail.into());
            }
        }

        let Some(user) = users.iter_mut().find(|u| u.id == id) else {
            return Ok(None);
        };
        if changes.is_empty() {
            return Ok(Some(user.clone()));
        }

        if let Some(name) = &changes.name {
            user.name = name.clone();
        }
        if let Some(email) = &changes.email {
            user.email = email.clone();
        }
        if let Some(hash) = &changes.password_hash {
            user.password_hash = hash.clone();
        }
        if let Some(address) = &changes.address {
            user.address = address.clone();
        }
        if let Some(status) = changes.status {
            user.status = status;
        }
        if let Some(is_admin) = changes.is_admin {
            user.is_admin = is_admin;
        }
        user.updated_at = Utc::now();

        Ok(Some(user.clone()))
    }

    async fn delete(&self, id: i32) -> Result<bool> {
        let mut users = self.users.write().await;
        let before = users.len();
        users.retain(|u| u.id != id);
        Ok(users.len() < before)
    }

    async fn list(&self) -> Result<Vec<User>> {
        let users = self.users.read().await;
        let mut all = users.clone();
        all.sort_by_key(|u| u.id);
        Ok(all)
    }
}
