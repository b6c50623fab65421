//! File-backed document store. Documents are stored individually on disk as
//! JSON and loaded at startup; soft-deleted records stay on disk.

pub mod history;

use crate::error::{DriveError, Result};
use crate::model::{DivisionGrant, Document, UserGrant};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use uuid::Uuid;

pub struct DocumentStore {
    docs: HashMap<Uuid, Document>,
    dir: PathBuf,
}

impl DocumentStore {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        let mut docs = HashMap::new();
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) != Some("json") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let Ok(id) = Uuid::parse_str(stem) else {
                continue;
            };
            let data = std::fs::read_to_string(&path)?;
            match serde_json::from_str::<Document>(&data) {
                Ok(doc) => {
                    docs.insert(id, doc);
                }
                Err(err) => tracing::warn!(%id, %err, "skipping unreadable document file"),
            }
        }
        Ok(Self { docs, dir })
    }

    /// Directory where documents are persisted.
    pub fn data_dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, id: Uuid) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    /// Persist the current state of a document to disk.
    pub fn save(&self, id: Uuid) -> Result<()> {
        let doc = self.docs.get(&id).ok_or(DriveError::NotFound(id))?;
        std::fs::write(self.path(id), serde_json::to_vec_pretty(doc)?)?;
        Ok(())
    }

    pub fn insert(&mut self, doc: Document) -> Result<Uuid> {
        let id = doc.id;
        self.docs.insert(id, doc);
        self.save(id)?;
        Ok(id)
    }

    pub fn get(&self, id: Uuid) -> Option<&Document> {
        self.docs.get(&id)
    }

    /// Like [`get`](Self::get) but treats soft-deleted documents as absent.
    pub fn get_active(&self, id: Uuid) -> Option<&Document> {
        self.docs.get(&id).filter(|d| d.is_active())
    }

    /// Mutable access. Callers are responsible for [`save`](Self::save) after
    /// mutating.
    pub fn get_mut(&mut self, id: Uuid) -> Option<&mut Document> {
        self.docs.get_mut(&id)
    }

    /// Iterate over every document, soft-deleted ones included.
    pub fn iter(&self) -> impl Iterator<Item = &Document> {
        self.docs.values()
    }

    /// Iterate over active (not soft-deleted) documents.
    pub fn active(&self) -> impl Iterator<Item = &Document> {
        self.docs.values().filter(|d| d.is_active())
    }

    /// Active immediate children of `parent`, or active roots for `None`.
    pub fn children_of(&self, parent: Option<Uuid>) -> Vec<&Document> {
        self.docs
            .values()
            .filter(|d| d.is_active() && d.parent_id == parent)
            .collect()
    }

    pub fn active_child_count(&self, folder: Uuid) -> u64 {
        self.docs
            .values()
            .filter(|d| d.is_active() && d.parent_id == Some(folder))
            .count() as u64
    }

    /// Add or replace the per-user grant on a document. At most one grant per
    /// user is kept.
    pub fn set_user_grant(&mut self, id: Uuid, grant: UserGrant) -> Result<()> {
        let doc = self
            .docs
            .get_mut(&id)
            .filter(|d| d.is_active())
            .ok_or(DriveError::NotFound(id))?;
        doc.user_grants.retain(|g| g.user_id != grant.user_id);
        doc.user_grants.push(grant);
        doc.touch();
        self.save(id)
    }

    pub fn remove_user_grant(&mut self, id: Uuid, user_id: &str) -> Result<()> {
        let doc = self
            .docs
            .get_mut(&id)
            .filter(|d| d.is_active())
            .ok_or(DriveError::NotFound(id))?;
        doc.user_grants.retain(|g| g.user_id != user_id);
        doc.touch();
        self.save(id)
    }

    /// Add or replace the division grant on a document. At most one grant per
    /// division is kept.
    pub fn set_division_grant(&mut self, id: Uuid, grant: DivisionGrant) -> Result<()> {
        let doc = self
            .docs
            .get_mut(&id)
            .filter(|d| d.is_active())
            .ok_or(DriveError::NotFound(id))?;
        doc.division_grants.retain(|g| g.division_id != grant.division_id);
        doc.division_grants.push(grant);
        doc.touch();
        self.save(id)
    }

    pub fn remove_division_grant(&mut self, id: Uuid, division_id: &str) -> Result<()> {
        let doc = self
            .docs
            .get_mut(&id)
            .filter(|d| d.is_active())
            .ok_or(DriveError::NotFound(id))?;
        doc.division_grants.retain(|g| g.division_id != division_id);
        doc.touch();
        self.save(id)
    }
}
