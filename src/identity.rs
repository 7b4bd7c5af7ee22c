// Copyright 2025 Cowboy AI, LLC.

//! Identity collaborator
//!
//! The engine never reads ambient session state. Callers resolve the acting
//! user from their session or token and pass an [`ActingUser`] into every
//! command; the engine treats it as trusted input. The [`UserDirectory`] is
//! consulted only to validate assignees and to resolve eligible approvers.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::errors::WorkflowResult;
use crate::identifiers::UserId;
use crate::roles::Role;

/// A user known to the directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// User identifier
    pub id: UserId,
    /// Full display name
    pub full_name: String,
    /// Email address
    pub email: String,
    /// Site the user belongs to
    pub site: String,
    /// Discipline code
    pub discipline: String,
    /// Workflow role
    pub role: Role,
}

impl User {
    /// Create a user
    pub fn new(
        id: u64,
        full_name: impl Into<String>,
        email: impl Into<String>,
        site: impl Into<String>,
        discipline: impl Into<String>,
        role: Role,
    ) -> Self {
        Self {
            id: UserId(id),
            full_name: full_name.into(),
            email: email.into(),
            site: site.into(),
            discipline: discipline.into(),
            role,
        }
    }

    /// The acting-user view of this user
    pub fn acting(&self) -> ActingUser {
        ActingUser {
            id: self.id,
            full_name: self.full_name.clone(),
            role: self.role,
            site: self.site.clone(),
        }
    }
}

/// The user on whose behalf a command runs, resolved by the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActingUser {
    /// User identifier
    pub id: UserId,
    /// Full display name, stamped on stage records
    pub full_name: String,
    /// Role from the session
    pub role: Role,
    /// Site from the session
    pub site: String,
}

/// User lookup used for assignment validation and approver eligibility
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Find a user by ID
    async fn find_user(&self, id: UserId) -> WorkflowResult<Option<User>>;

    /// Users whose role satisfies `required` and covers `site`
    async fn eligible_users(&self, required: Role, site: &str) -> WorkflowResult<Vec<User>>;
}

/// In-memory user directory
#[derive(Clone, Default)]
pub struct InMemoryUserDirectory {
    users: Arc<RwLock<HashMap<UserId, User>>>,
}

impl InMemoryUserDirectory {
    /// Create an empty directory
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a directory pre-populated with `users`
    pub fn with_users(users: impl IntoIterator<Item = User>) -> Self {
        let map = users.into_iter().map(|u| (u.id, u)).collect();
        Self {
            users: Arc::new(RwLock::new(map)),
        }
    }

    /// Add or replace a user
    pub async fn upsert(&self, user: User) {
        self.users.write().await.insert(user.id, user);
    }

    /// Remove a user
    pub async fn remove(&self, id: UserId) -> Option<User> {
        self.users.write().await.remove(&id)
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn find_user(&self, id: UserId) -> WorkflowResult<Option<User>> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn eligible_users(&self, required: Role, site: &str) -> WorkflowResult<Vec<User>> {
        let users = self.users.read().await;
        let mut eligible: Vec<User> = users
            .values()
            .filter(|u| u.role.satisfies(required) && u.role.covers_site(&u.site, site))
            .cloned()
            .collect();
        eligible.sort_by_key(|u| u.id);
        Ok(eligible)
    }
}
