//! Identity collaborator: user lookup and role resolution.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Coarse role resolved once when a user record is loaded, instead of
/// re-matching free-text `level`/`position` strings on every access check.
/// `Owner` and `Admin` both bypass per-document permission checks.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Owner,
    Admin,
    Member,
}

impl Role {
    /// Map the directory's free-text `level`/`position` fields to a role.
    pub fn from_fields(level: Option<&str>, position: Option<&str>) -> Self {
        if position.is_some_and(|p| p.eq_ignore_ascii_case("ceo")) {
            return Role::Owner;
        }
        if position.is_some_and(|p| p.eq_ignore_ascii_case("admin"))
            || level.is_some_and(|l| l.eq_ignore_ascii_case("admin"))
        {
            return Role::Admin;
        }
        Role::Member
    }

    /// Whether this role short-circuits every access check to true.
    pub fn is_admin(self) -> bool {
        matches!(self, Role::Owner | Role::Admin)
    }
}

/// The slice of a user record the resolver needs.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub division: Option<String>,
    pub role: Role,
    pub is_active: bool,
}

impl UserProfile {
    pub fn member(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            email: None,
            division: None,
            role: Role::Member,
            is_active: true,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_division(mut self, division: impl Into<String>) -> Self {
        self.division = Some(division.into());
        self
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }
}

/// User lookup backing the access resolver. Implementations typically wrap
/// an employee database; the in-memory variant below serves tests and
/// embedded use.
#[async_trait]
pub trait Directory: Send + Sync {
    async fn lookup(&self, user_id: &str) -> Option<UserProfile>;
}

#[derive(Default)]
pub struct InMemoryDirectory {
    users: RwLock<HashMap<String, UserProfile>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, profile: UserProfile) {
        self.users.write().insert(profile.id.clone(), profile);
    }
}

#[async_trait]
impl Directory for InMemoryDirectory {
    async fn lookup(&self, user_id: &str) -> Option<UserProfile> {
        self.users.read().get(user_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_resolution_from_directory_fields() {
        assert_eq!(Role::from_fields(Some("admin"), None), Role::Admin);
        assert_eq!(Role::from_fields(Some("Admin"), Some("Team Member")), Role::Admin);
        assert_eq!(Role::from_fields(None, Some("CEO")), Role::Owner);
        assert_eq!(Role::from_fields(None, Some("Admin")), Role::Admin);
        assert_eq!(Role::from_fields(Some("senior"), Some("Div Lead")), Role::Member);
        assert_eq!(Role::from_fields(None, None), Role::Member);
    }

    #[tokio::test]
    async fn directory_lookup() {
        let dir = InMemoryDirectory::new();
        dir.insert(UserProfile::member("u1", "Sam").with_division("Developer"));
        let user = dir.lookup("u1").await.unwrap();
        assert_eq!(user.name, "Sam");
        assert_eq!(user.division.as_deref(), Some("Developer"));
        assert!(dir.lookup("missing").await.is_none());
    }
}
