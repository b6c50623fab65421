//! High-level drive facade: async, lock-guarded entry points over the store,
//! access resolver, tree maintainer, listings, and history. Access *filtering*
//! (listings, search) happens here; access *enforcement* for mutations is left
//! to the caller, who checks `check_document_access` first and decides how to
//! refuse.

use crate::access::{self, AccessSummary};
use crate::error::{DriveError, Result};
use crate::events::{DriveEvent, EventBus};
use crate::identity::{Directory, UserProfile};
use crate::listing::{self, SearchPage};
use crate::model::{DivisionGrant, Document, DocumentKind, PermissionLevel, UserGrant};
use crate::storage::history::{EditEvent, HistoryStore, Revision, RevisionAction};
use crate::storage::DocumentStore;
use crate::tree::{self, Breadcrumb};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

/// Fields for a new document. Missing content defaults to null.
#[derive(Clone, Debug)]
pub struct CreateDocument {
    pub name: String,
    pub kind: DocumentKind,
    pub category: Option<String>,
    pub content: Option<Value>,
    pub parent_id: Option<Uuid>,
}

/// Partial update. The outer `Option` means "leave unchanged"; for `category`
/// and `parent_id` the inner `Option` carries an explicit clear-to-none.
#[derive(Clone, Debug, Default)]
pub struct UpdateDocument {
    pub name: Option<String>,
    pub category: Option<Option<String>>,
    pub content: Option<Value>,
    pub parent_id: Option<Option<Uuid>>,
}

#[derive(Clone)]
pub struct DriveService {
    store: Arc<RwLock<DocumentStore>>,
    history: Arc<RwLock<HistoryStore>>,
    directory: Arc<dyn Directory>,
    events: EventBus,
}

impl DriveService {
    /// Open (or create) a drive rooted at `dir`, with documents and history
    /// in sibling subdirectories.
    pub fn open(dir: impl AsRef<Path>, directory: Arc<dyn Directory>) -> Result<Self> {
        let dir = dir.as_ref();
        let store = DocumentStore::open(dir.join("documents"))?;
        let history = HistoryStore::open(dir.join("history"))?;
        Ok(Self {
            store: Arc::new(RwLock::new(store)),
            history: Arc::new(RwLock::new(history)),
            directory,
            events: EventBus::new(),
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DriveEvent> {
        self.events.subscribe()
    }

    async fn user(&self, user_id: &str) -> Option<UserProfile> {
        self.directory.lookup(user_id).await
    }

    /// Display name for history entries; unknown editors fall back to their id.
    async fn editor_name(&self, editor_id: &str) -> String {
        self.user(editor_id)
            .await
            .map(|u| u.name)
            .unwrap_or_else(|| editor_id.to_string())
    }

    // ---- reads ----

    pub async fn check_document_access(
        &self,
        doc_id: Uuid,
        user_id: &str,
        required: PermissionLevel,
    ) -> bool {
        let Some(user) = self.user(user_id).await else {
            return false;
        };
        let store = self.store.read().await;
        access::check_access(&store, doc_id, &user, required)
    }

    pub async fn document_access_summary(&self, doc_id: Uuid, user_id: &str) -> AccessSummary {
        let Some(user) = self.user(user_id).await else {
            return AccessSummary::default();
        };
        let store = self.store.read().await;
        access::access_summary(&store, doc_id, &user)
    }

    /// Level of the direct grant (owner, user, or division) on the document,
    /// ignoring inheritance and role bypass.
    pub async fn effective_permission(
        &self,
        doc_id: Uuid,
        user_id: &str,
    ) -> Option<PermissionLevel> {
        let user = self.user(user_id).await?;
        let store = self.store.read().await;
        let doc = store.get_active(doc_id)?;
        access::effective_permission(doc, &user)
    }

    /// Active document by id, gated on viewer access. Denial is reported as
    /// `NotFound`, same as a missing or soft-deleted document; this read does
    /// not disclose whether an inaccessible id exists.
    pub async fn get_document(&self, doc_id: Uuid, user_id: &str) -> Result<Document> {
        let user = self
            .user(user_id)
            .await
            .ok_or(DriveError::NotFound(doc_id))?;
        let store = self.store.read().await;
        if !access::check_access(&store, doc_id, &user, PermissionLevel::Viewer) {
            return Err(DriveError::NotFound(doc_id));
        }
        store
            .get_active(doc_id)
            .cloned()
            .ok_or(DriveError::NotFound(doc_id))
    }

    pub async fn documents_by_parent(
        &self,
        parent_id: Option<Uuid>,
        user_id: &str,
    ) -> Vec<Document> {
        let Some(user) = self.user(user_id).await else {
            return Vec::new();
        };
        let store = self.store.read().await;
        listing::list_by_parent(&store, parent_id, &user)
    }

    pub async fn search_documents(
        &self,
        query: &str,
        kinds: Option<&[DocumentKind]>,
        limit: usize,
        offset: usize,
        user_id: &str,
    ) -> SearchPage {
        let Some(user) = self.user(user_id).await else {
            return SearchPage {
                items: Vec::new(),
                total: 0,
                offset,
                limit,
            };
        };
        let store = self.store.read().await;
        listing::search(&store, query, kinds, limit, offset, &user)
    }

    pub async fn breadcrumbs(&self, folder_id: Option<Uuid>) -> Vec<Breadcrumb> {
        tree::breadcrumbs(&*self.store.read().await, folder_id)
    }

    /// Ancestor ids root-to-leaf, including the document itself.
    pub async fn folder_path_ids(&self, doc_id: Uuid) -> Result<Vec<Uuid>> {
        tree::ancestor_path_ids(&*self.store.read().await, doc_id)
    }

    /// On-demand count of active direct children, for active folders only.
    /// Recomputed live rather than served from the maintained cache.
    pub async fn item_count(&self, folder_id: Uuid) -> Option<u64> {
        let store = self.store.read().await;
        store
            .get_active(folder_id)
            .filter(|d| d.is_folder())
            .map(|_| store.active_child_count(folder_id))
    }

    pub async fn distinct_kinds(&self) -> Vec<String> {
        listing::distinct_kinds(&*self.store.read().await)
    }

    pub async fn distinct_categories(&self, search: Option<&str>) -> Vec<String> {
        listing::distinct_categories(&*self.store.read().await, search)
    }

    pub async fn edit_history(&self, doc_id: Uuid) -> Vec<EditEvent> {
        self.history.read().await.edit_history(doc_id)
    }

    pub async fn revisions(&self, doc_id: Uuid) -> Vec<Revision> {
        self.history.read().await.revisions(doc_id)
    }

    // ---- mutations ----

    pub async fn create_document(&self, payload: CreateDocument, owner_id: &str) -> Result<Document> {
        let editor_name = self.editor_name(owner_id).await;
        let mut store = self.store.write().await;
        if let Some(parent) = payload.parent_id {
            match store.get_active(parent) {
                Some(p) if p.is_folder() => {}
                Some(_) => {
                    return Err(DriveError::InvalidOperation(
                        "parent is not a folder".into(),
                    ))
                }
                None => return Err(DriveError::ParentNotFound(parent)),
            }
        }
        let mut doc = Document::new(payload.name, payload.kind, owner_id, payload.parent_id);
        doc.category = payload.category;
        if let Some(content) = payload.content {
            doc.content = content;
        }
        let id = store.insert(doc)?;
        tree::apply_path(&mut store, id)?;
        tree::refresh_item_count(&mut store, payload.parent_id)?;
        let doc = store
            .get(id)
            .cloned()
            .ok_or(DriveError::NotFound(id))?;
        drop(store);

        let mut history = self.history.write().await;
        history.record_revision(
            id,
            RevisionAction::Created,
            json!({}),
            serde_json::to_value(&doc)?,
            Some(owner_id),
        )?;
        history.record_edit(id, owner_id, &editor_name)?;
        drop(history);

        tracing::info!(%id, name = %doc.name, kind = doc.kind.as_str(), "document created");
        self.events.send(DriveEvent::Created { id });
        Ok(doc)
    }

    /// Apply a partial update. A revision is recorded when any field changed,
    /// or unconditionally when `commit` is set (an explicit checkpoint).
    pub async fn update_document(
        &self,
        doc_id: Uuid,
        patch: UpdateDocument,
        editor_id: &str,
        commit: bool,
    ) -> Result<Document> {
        let editor_name = self.editor_name(editor_id).await;
        let mut store = self.store.write().await;
        {
            let doc = store.get_active(doc_id).ok_or(DriveError::NotFound(doc_id))?;
            if let Some(new_parent) = patch.parent_id {
                if new_parent != doc.parent_id {
                    tree::validate_move(&store, doc_id, new_parent)?;
                }
            }
        }

        let mut changes = serde_json::Map::new();
        let (old_parent, parent_changed, rename_folder);
        {
            let doc = store.get_mut(doc_id).ok_or(DriveError::NotFound(doc_id))?;
            old_parent = doc.parent_id;
            if let Some(name) = patch.name {
                if name != doc.name {
                    changes.insert("name".into(), json!({"old": doc.name, "new": name}));
                    doc.name = name;
                }
            }
            if let Some(category) = patch.category {
                if category != doc.category {
                    changes.insert(
                        "category".into(),
                        json!({"old": doc.category, "new": category}),
                    );
                    doc.category = category;
                }
            }
            if let Some(content) = patch.content {
                if content != doc.content {
                    changes.insert(
                        "content".into(),
                        json!({"old": doc.content, "new": content}),
                    );
                    doc.content = content;
                }
            }
            if let Some(new_parent) = patch.parent_id {
                if new_parent != doc.parent_id {
                    changes.insert(
                        "parent_id".into(),
                        json!({"old": doc.parent_id, "new": new_parent}),
                    );
                    doc.parent_id = new_parent;
                }
            }
            parent_changed = doc.parent_id != old_parent;
            rename_folder = doc.is_folder() && changes.contains_key("name");
            doc.last_modified_by = Some(editor_id.to_string());
            doc.touch();
        }
        store.save(doc_id)?;

        if parent_changed {
            tree::apply_path(&mut store, doc_id)?;
            tree::refresh_item_count(&mut store, old_parent)?;
            let new_parent = store.get(doc_id).and_then(|d| d.parent_id);
            tree::refresh_item_count(&mut store, new_parent)?;
        }
        if parent_changed || rename_folder {
            tree::refresh_descendant_paths(&mut store, doc_id)?;
        }
        let doc = store
            .get(doc_id)
            .cloned()
            .ok_or(DriveError::NotFound(doc_id))?;
        drop(store);

        let mut history = self.history.write().await;
        if !changes.is_empty() || commit {
            history.record_revision(
                doc_id,
                RevisionAction::Updated,
                Value::Object(changes.clone()),
                serde_json::to_value(&doc)?,
                Some(editor_id),
            )?;
        }
        history.record_edit(doc_id, editor_id, &editor_name)?;
        drop(history);

        tracing::info!(%doc_id, changed = ?changes.keys().collect::<Vec<_>>(), "document updated");
        if parent_changed {
            self.events.send(DriveEvent::Moved {
                id: doc_id,
                new_parent: doc.parent_id,
            });
        } else {
            self.events.send(DriveEvent::Updated { id: doc_id });
        }
        Ok(doc)
    }

    /// Soft-delete a document and, for folders, the whole subtree under it.
    /// Returns the record as it stood after deletion.
    pub async fn delete_document(&self, doc_id: Uuid, editor_id: &str) -> Result<Document> {
        let editor_name = self.editor_name(editor_id).await;
        let mut store = self.store.write().await;
        let snapshot = {
            let doc = store.get_active(doc_id).ok_or(DriveError::NotFound(doc_id))?;
            serde_json::to_value(doc)?
        };
        let parent = store.get(doc_id).and_then(|d| d.parent_id);
        if let Some(doc) = store.get_mut(doc_id) {
            doc.last_modified_by = Some(editor_id.to_string());
        }
        tree::soft_delete(&mut store, doc_id)?;
        tree::refresh_item_count(&mut store, parent)?;
        let doc = store
            .get(doc_id)
            .cloned()
            .ok_or(DriveError::NotFound(doc_id))?;
        drop(store);

        let mut history = self.history.write().await;
        history.record_revision(
            doc_id,
            RevisionAction::Deleted,
            json!({}),
            snapshot,
            Some(editor_id),
        )?;
        history.record_edit(doc_id, editor_id, &editor_name)?;
        drop(history);

        tracing::info!(%doc_id, "document deleted");
        self.events.send(DriveEvent::Deleted { id: doc_id });
        Ok(doc)
    }

    /// Grant or re-level a per-user permission. Grantee display fields are
    /// resolved through the directory when available.
    pub async fn add_user_permission(
        &self,
        doc_id: Uuid,
        user_id: &str,
        level: PermissionLevel,
    ) -> Result<()> {
        let profile = self.user(user_id).await;
        let grant = UserGrant {
            user_id: user_id.to_string(),
            user_name: profile
                .as_ref()
                .map(|u| u.name.clone())
                .unwrap_or_else(|| user_id.to_string()),
            user_email: profile.and_then(|u| u.email).unwrap_or_default(),
            level,
        };
        self.store.write().await.set_user_grant(doc_id, grant)?;
        tracing::debug!(%doc_id, user_id, ?level, "user permission set");
        self.events.send(DriveEvent::Shared {
            id: doc_id,
            principal: user_id.to_string(),
        });
        Ok(())
    }

    pub async fn remove_user_permission(&self, doc_id: Uuid, user_id: &str) -> Result<()> {
        self.store.write().await.remove_user_grant(doc_id, user_id)?;
        tracing::debug!(%doc_id, user_id, "user permission removed");
        self.events.send(DriveEvent::Unshared {
            id: doc_id,
            principal: user_id.to_string(),
        });
        Ok(())
    }

    pub async fn add_division_permission(
        &self,
        doc_id: Uuid,
        division_id: &str,
        level: PermissionLevel,
    ) -> Result<()> {
        let grant = DivisionGrant {
            division_id: division_id.to_string(),
            level,
        };
        self.store.write().await.set_division_grant(doc_id, grant)?;
        tracing::debug!(%doc_id, division_id, ?level, "division permission set");
        self.events.send(DriveEvent::Shared {
            id: doc_id,
            principal: division_id.to_string(),
        });
        Ok(())
    }

    pub async fn remove_division_permission(&self, doc_id: Uuid, division_id: &str) -> Result<()> {
        self.store
            .write()
            .await
            .remove_division_grant(doc_id, division_id)?;
        tracing::debug!(%doc_id, division_id, "division permission removed");
        self.events.send(DriveEvent::Unshared {
            id: doc_id,
            principal: division_id.to_string(),
        });
        Ok(())
    }
}
