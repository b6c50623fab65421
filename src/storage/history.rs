//! Edit-history recording: coalesced "who touched this recently" events and
//! full append-only revisions. The two are deliberately separate; revisions
//! are the audit trail and are never coalesced.

use crate::error::{DriveError, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use uuid::Uuid;

/// Default span within which repeated edits by the same editor collapse
/// into a single event.
pub const DEFAULT_COALESCE_WINDOW_SECS: i64 = 600;

/// Coalesced editor-activity marker.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct EditEvent {
    pub document_id: Uuid,
    pub editor_id: String,
    pub editor_name: String,
    pub at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RevisionAction {
    Created,
    Updated,
    Deleted,
}

/// Full snapshot of a document at the time of a structural change.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Revision {
    pub document_id: Uuid,
    /// Monotonically increasing per document, starting at 1.
    pub revision: u64,
    pub action: RevisionAction,
    /// Old/new pairs for each changed field.
    pub changes: serde_json::Value,
    pub snapshot: serde_json::Value,
    pub editor_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Default, Serialize, Deserialize)]
struct DocumentHistory {
    #[serde(default)]
    events: Vec<EditEvent>,
    #[serde(default)]
    revisions: Vec<Revision>,
}

/// File-backed history store, one JSON file per document.
pub struct HistoryStore {
    dir: PathBuf,
    entries: HashMap<Uuid, DocumentHistory>,
    window: Duration,
}

impl HistoryStore {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        let mut entries = HashMap::new();
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
            match serde_json::from_str::<DocumentHistory>(&data) {
                Ok(history) => {
                    entries.insert(id, history);
                }
                Err(err) => tracing::warn!(%id, %err, "skipping unreadable history file"),
            }
        }
        Ok(Self {
            dir,
            entries,
            window: Duration::seconds(DEFAULT_COALESCE_WINDOW_SECS),
        })
    }

    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    fn path(&self, id: Uuid) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    fn save(&self, id: Uuid) -> Result<()> {
        let entry = self.entries.get(&id).ok_or(DriveError::NotFound(id))?;
        std::fs::write(self.path(id), serde_json::to_vec_pretty(entry)?)?;
        Ok(())
    }

    pub fn record_edit(&mut self, document_id: Uuid, editor_id: &str, editor_name: &str) -> Result<()> {
        self.record_edit_at(document_id, editor_id, editor_name, Utc::now())
    }

    /// Record an edit with an explicit timestamp. If the most recent event is
    /// by the same editor and within the coalescing window, its timestamp is
    /// updated in place instead of appending a new event.
    pub fn record_edit_at(
        &mut self,
        document_id: Uuid,
        editor_id: &str,
        editor_name: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let entry = self.entries.entry(document_id).or_default();
        match entry.events.last_mut() {
            Some(last) if last.editor_id == editor_id && now - last.at <= self.window => {
                last.at = now;
            }
            _ => entry.events.push(EditEvent {
                document_id,
                editor_id: editor_id.to_string(),
                editor_name: editor_name.to_string(),
                at: now,
            }),
        }
        self.save(document_id)
    }

    /// Coalesced events, newest first.
    pub fn edit_history(&self, document_id: Uuid) -> Vec<EditEvent> {
        let mut events = self
            .entries
            .get(&document_id)
            .map(|e| e.events.clone())
            .unwrap_or_default();
        events.reverse();
        events
    }

    /// Append a revision and return its number.
    pub fn record_revision(
        &mut self,
        document_id: Uuid,
        action: RevisionAction,
        changes: serde_json::Value,
        snapshot: serde_json::Value,
        editor_id: Option<&str>,
    ) -> Result<u64> {
        let entry = self.entries.entry(document_id).or_default();
        let revision = entry.revisions.len() as u64 + 1;
        entry.revisions.push(Revision {
            document_id,
            revision,
            action,
            changes,
            snapshot,
            editor_id: editor_id.map(|s| s.to_string()),
            created_at: Utc::now(),
        });
        self.save(document_id)?;
        Ok(revision)
    }

    /// Revisions in ascending revision order.
    pub fn revisions(&self, document_id: Uuid) -> Vec<Revision> {
        self.entries
            .get(&document_id)
            .map(|e| e.revisions.clone())
            .unwrap_or_default()
    }
}
