//! Document records and permission grants.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Different kinds of documents managed by the store.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Folder,
    File,
}

impl DocumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Folder => "folder",
            DocumentKind::File => "file",
        }
    }
}

/// Grantable permission level. Editor is a strict superset of viewer.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum PermissionLevel {
    Viewer,
    Editor,
}

impl PermissionLevel {
    /// Whether a stored grant at this level meets the required level.
    pub fn satisfies(self, required: PermissionLevel) -> bool {
        match required {
            PermissionLevel::Viewer => true,
            PermissionLevel::Editor => self == PermissionLevel::Editor,
        }
    }
}

/// Per-user grant recorded on a document. Unique by `user_id`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserGrant {
    pub user_id: String,
    pub user_name: String,
    pub user_email: String,
    pub level: PermissionLevel,
}

/// Division-wide grant recorded on a document. Unique by `division_id`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DivisionGrant {
    pub division_id: String,
    pub level: PermissionLevel,
}

/// A node in the drive tree; either a folder or a file.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub name: String,
    pub kind: DocumentKind,
    /// Fixed at creation; ownership transfer is not supported.
    pub owner_id: String,
    #[serde(default)]
    pub category: Option<String>,
    /// `None` marks a root-level item.
    #[serde(default)]
    pub parent_id: Option<Uuid>,
    /// Ancestor names from the root down to (excluding) this node.
    /// Derived; recomputed whenever ancestry changes.
    #[serde(default)]
    pub path: Vec<String>,
    /// Opaque payload; the core never interprets it.
    #[serde(default)]
    pub content: serde_json::Value,
    /// Cached count of active immediate children. Meaningful for folders.
    #[serde(default)]
    pub item_count: u64,
    #[serde(default)]
    pub user_grants: Vec<UserGrant>,
    #[serde(default)]
    pub division_grants: Vec<DivisionGrant>,
    /// Soft-delete marker; records are never physically removed here.
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub last_modified_by: Option<String>,
}

impl Document {
    pub fn new(
        name: impl Into<String>,
        kind: DocumentKind,
        owner_id: impl Into<String>,
        parent_id: Option<Uuid>,
    ) -> Self {
        let now = Utc::now();
        let owner_id = owner_id.into();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            kind,
            last_modified_by: Some(owner_id.clone()),
            owner_id,
            category: None,
            parent_id,
            path: Vec::new(),
            content: serde_json::Value::Null,
            item_count: 0,
            user_grants: Vec::new(),
            division_grants: Vec::new(),
            deleted_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn is_active(&self) -> bool {
        self.deleted_at.is_none()
    }

    pub fn is_folder(&self) -> bool {
        self.kind == DocumentKind::Folder
    }

    /// Level of the direct grant for the given user, if any.
    pub fn user_grant(&self, user_id: &str) -> Option<PermissionLevel> {
        self.user_grants
            .iter()
            .find(|g| g.user_id == user_id)
            .map(|g| g.level)
    }

    /// Level of the direct grant for the given division, if any.
    pub fn division_grant(&self, division_id: &str) -> Option<PermissionLevel> {
        self.division_grants
            .iter()
            .find(|g| g.division_id == division_id)
            .map(|g| g.level)
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn editor_satisfies_viewer() {
        assert!(PermissionLevel::Editor.satisfies(PermissionLevel::Viewer));
        assert!(PermissionLevel::Editor.satisfies(PermissionLevel::Editor));
        assert!(PermissionLevel::Viewer.satisfies(PermissionLevel::Viewer));
        assert!(!PermissionLevel::Viewer.satisfies(PermissionLevel::Editor));
    }

    #[test]
    fn grant_lookup_by_principal() {
        let mut doc = Document::new("spec.doc", DocumentKind::File, "u1", None);
        doc.user_grants.push(UserGrant {
            user_id: "u2".into(),
            user_name: "Pat".into(),
            user_email: "pat@example.com".into(),
            level: PermissionLevel::Viewer,
        });
        doc.division_grants.push(DivisionGrant {
            division_id: "Finance".into(),
            level: PermissionLevel::Editor,
        });
        assert_eq!(doc.user_grant("u2"), Some(PermissionLevel::Viewer));
        assert_eq!(doc.user_grant("u3"), None);
        assert_eq!(doc.division_grant("Finance"), Some(PermissionLevel::Editor));
        assert_eq!(doc.division_grant("Marketing"), None);
    }
}
