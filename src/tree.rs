//! Tree maintenance around documents: cached-path materialization,
//! item-count refresh, cascading soft-delete, and ancestor walks. Every walk
//! carries a visited-set guard so a corrupted cycle fails safely instead of
//! looping forever.

use crate::error::{DriveError, Result};
use crate::storage::DocumentStore;
use chrono::Utc;
use serde::Serialize;
use std::collections::HashSet;
use uuid::Uuid;

/// Name of the synthetic root entry prefixed to every breadcrumb trail.
pub const ROOT_BREADCRUMB_NAME: &str = "Documents";

/// Recompute a document's cached `path` from its parent: the parent's path
/// plus the parent's name, or empty for a root-level item.
pub fn apply_path(store: &mut DocumentStore, id: Uuid) -> Result<()> {
    let parent_id = store.get(id).ok_or(DriveError::NotFound(id))?.parent_id;
    let path = match parent_id {
        Some(pid) => {
            let parent = store.get_active(pid).ok_or(DriveError::ParentNotFound(pid))?;
            if !parent.is_folder() {
                return Err(DriveError::InvalidOperation(format!(
                    "parent '{pid}' is not a folder"
                )));
            }
            let mut path = parent.path.clone();
            path.push(parent.name.clone());
            path
        }
        None => Vec::new(),
    };
    if let Some(doc) = store.get_mut(id) {
        doc.path = path;
    }
    store.save(id)
}

/// Re-apply paths to every active descendant after a rename or move.
pub fn refresh_descendant_paths(store: &mut DocumentStore, id: Uuid) -> Result<()> {
    let mut visited = HashSet::from([id]);
    let mut queue: Vec<Uuid> = store.children_of(Some(id)).into_iter().map(|d| d.id).collect();
    while let Some(child) = queue.pop() {
        if !visited.insert(child) {
            continue;
        }
        apply_path(store, child)?;
        queue.extend(store.children_of(Some(child)).into_iter().map(|d| d.id));
    }
    Ok(())
}

/// Recompute and store the active-immediate-children count of a folder.
/// A `None` or missing/deleted folder id is a no-op.
pub fn refresh_item_count(store: &mut DocumentStore, folder_id: Option<Uuid>) -> Result<()> {
    let Some(folder_id) = folder_id else {
        return Ok(());
    };
    if store.get_active(folder_id).is_none() {
        return Ok(());
    }
    let count = store.active_child_count(folder_id);
    if let Some(folder) = store.get_mut(folder_id) {
        folder.item_count = count;
        folder.touch();
    }
    store.save(folder_id)
}

/// Mark a document deleted and cascade, pre-order, to all active
/// descendants. One timestamp covers the whole cascade.
pub fn soft_delete(store: &mut DocumentStore, id: Uuid) -> Result<()> {
    store.get_active(id).ok_or(DriveError::NotFound(id))?;
    let now = Utc::now();
    let mut visited = HashSet::new();
    let mut queue = vec![id];
    while let Some(current) = queue.pop() {
        if !visited.insert(current) {
            continue;
        }
        if store.get_active(current).is_none() {
            continue;
        }
        let children: Vec<Uuid> = store
            .children_of(Some(current))
            .into_iter()
            .map(|d| d.id)
            .collect();
        if let Some(doc) = store.get_mut(current) {
            doc.deleted_at = Some(now);
            doc.updated_at = now;
        }
        store.save(current)?;
        queue.extend(children);
    }
    Ok(())
}

/// Ids from the root down to `id` inclusive, in root-to-leaf order.
pub fn ancestor_path_ids(store: &DocumentStore, id: Uuid) -> Result<Vec<Uuid>> {
    store.get_active(id).ok_or(DriveError::NotFound(id))?;
    let mut ids = vec![id];
    let mut visited = HashSet::from([id]);
    let mut current = store.get(id).and_then(|d| d.parent_id);
    while let Some(pid) = current {
        if !visited.insert(pid) {
            break;
        }
        let Some(parent) = store.get_active(pid) else {
            break;
        };
        ids.push(pid);
        current = parent.parent_id;
    }
    ids.reverse();
    Ok(ids)
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct Breadcrumb {
    /// `None` marks the synthetic root entry.
    pub id: Option<Uuid>,
    pub name: String,
    pub path: Vec<String>,
}

/// Breadcrumb trail from the synthetic root down to the given folder. An
/// unknown folder id yields just the root entry.
pub fn breadcrumbs(store: &DocumentStore, folder_id: Option<Uuid>) -> Vec<Breadcrumb> {
    let mut crumbs = vec![Breadcrumb {
        id: None,
        name: ROOT_BREADCRUMB_NAME.to_string(),
        path: Vec::new(),
    }];
    let Some(folder_id) = folder_id else {
        return crumbs;
    };
    let Ok(ids) = ancestor_path_ids(store, folder_id) else {
        return crumbs;
    };
    for id in ids {
        if let Some(doc) = store.get_active(id) {
            crumbs.push(Breadcrumb {
                id: Some(doc.id),
                name: doc.name.clone(),
                path: doc.path.clone(),
            });
        }
    }
    crumbs
}

/// All ids in the active subtree rooted at `id`, the root included.
pub fn descendant_ids(store: &DocumentStore, id: Uuid) -> Vec<Uuid> {
    let mut ids = Vec::new();
    let mut visited = HashSet::new();
    let mut queue = vec![id];
    while let Some(current) = queue.pop() {
        if !visited.insert(current) {
            continue;
        }
        ids.push(current);
        queue.extend(store.children_of(Some(current)).into_iter().map(|d| d.id));
    }
    ids
}

/// Reject invalid re-parenting before any mutation: self-parenting, a
/// missing or non-folder destination, and moving a folder into its own
/// descendant.
pub fn validate_move(store: &DocumentStore, id: Uuid, new_parent: Option<Uuid>) -> Result<()> {
    let Some(pid) = new_parent else {
        return Ok(());
    };
    if pid == id {
        return Err(DriveError::InvalidOperation(
            "document cannot be its own parent".into(),
        ));
    }
    let parent = store.get_active(pid).ok_or(DriveError::ParentNotFound(pid))?;
    if !parent.is_folder() {
        return Err(DriveError::InvalidOperation(format!(
            "parent '{pid}' is not a folder"
        )));
    }
    let moving_folder = store.get(id).is_some_and(|d| d.is_folder());
    if moving_folder && descendant_ids(store, id).contains(&pid) {
        return Err(DriveError::InvalidOperation(
            "cannot move a folder into its own descendant".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Document, DocumentKind};

    fn store() -> (DocumentStore, tempfile::TempDir) {
        let tempdir = tempfile::tempdir().unwrap();
        let store = DocumentStore::open(tempdir.path()).unwrap();
        (store, tempdir)
    }

    fn add(
        store: &mut DocumentStore,
        name: &str,
        kind: DocumentKind,
        parent: Option<Uuid>,
    ) -> Uuid {
        let id = store
            .insert(Document::new(name, kind, "u1", parent))
            .unwrap();
        apply_path(store, id).unwrap();
        id
    }

    #[test]
    fn paths_follow_ancestry() {
        let (mut store, _dir) = store();
        let root = add(&mut store, "Projects", DocumentKind::Folder, None);
        let sub = add(&mut store, "Alpha", DocumentKind::Folder, Some(root));
        let doc = add(&mut store, "spec.doc", DocumentKind::File, Some(sub));

        assert!(store.get(root).unwrap().path.is_empty());
        assert_eq!(store.get(sub).unwrap().path, vec!["Projects"]);
        assert_eq!(store.get(doc).unwrap().path, vec!["Projects", "Alpha"]);
    }

    #[test]
    fn rename_propagates_to_descendant_paths() {
        let (mut store, _dir) = store();
        let root = add(&mut store, "Projects", DocumentKind::Folder, None);
        let sub = add(&mut store, "Alpha", DocumentKind::Folder, Some(root));
        let doc = add(&mut store, "spec.doc", DocumentKind::File, Some(sub));

        store.get_mut(root).unwrap().name = "Archive".into();
        store.save(root).unwrap();
        refresh_descendant_paths(&mut store, root).unwrap();

        assert_eq!(store.get(sub).unwrap().path, vec!["Archive"]);
        assert_eq!(store.get(doc).unwrap().path, vec!["Archive", "Alpha"]);
    }

    #[test]
    fn apply_path_rejects_missing_parent() {
        let (mut store, _dir) = store();
        let id = store
            .insert(Document::new(
                "orphan.doc",
                DocumentKind::File,
                "u1",
                Some(Uuid::new_v4()),
            ))
            .unwrap();
        assert!(matches!(
            apply_path(&mut store, id),
            Err(DriveError::ParentNotFound(_))
        ));
    }

    #[test]
    fn soft_delete_cascades_to_subtree() {
        let (mut store, _dir) = store();
        let f = add(&mut store, "F", DocumentKind::Folder, None);
        let c1 = add(&mut store, "C1", DocumentKind::File, Some(f));
        let c2 = add(&mut store, "C2", DocumentKind::Folder, Some(f));
        let c3 = add(&mut store, "C3", DocumentKind::File, Some(c2));
        let untouched = add(&mut store, "other", DocumentKind::File, None);

        soft_delete(&mut store, f).unwrap();

        for id in [f, c1, c2, c3] {
            assert!(store.get(id).unwrap().is_deleted());
        }
        assert!(store.get(untouched).unwrap().is_active());
        assert!(store.children_of(Some(f)).is_empty());
        assert!(store.children_of(Some(c2)).is_empty());
    }

    #[test]
    fn item_count_tracks_active_children() {
        let (mut store, _dir) = store();
        let f = add(&mut store, "F", DocumentKind::Folder, None);
        let a = add(&mut store, "a", DocumentKind::File, Some(f));
        let _b = add(&mut store, "b", DocumentKind::File, Some(f));

        refresh_item_count(&mut store, Some(f)).unwrap();
        assert_eq!(store.get(f).unwrap().item_count, 2);

        soft_delete(&mut store, a).unwrap();
        refresh_item_count(&mut store, Some(f)).unwrap();
        assert_eq!(store.get(f).unwrap().item_count, 1);
    }

    #[test]
    fn breadcrumbs_start_with_synthetic_root() {
        let (mut store, _dir) = store();
        let root = add(&mut store, "Projects", DocumentKind::Folder, None);
        let sub = add(&mut store, "Alpha", DocumentKind::Folder, Some(root));

        let crumbs = breadcrumbs(&store, Some(sub));
        assert_eq!(crumbs.len(), 3);
        assert_eq!(crumbs[0].id, None);
        assert_eq!(crumbs[0].name, ROOT_BREADCRUMB_NAME);
        assert_eq!(crumbs[1].id, Some(root));
        assert_eq!(crumbs[2].id, Some(sub));
        assert_eq!(crumbs[2].path, vec!["Projects"]);

        assert_eq!(breadcrumbs(&store, None).len(), 1);
        assert_eq!(breadcrumbs(&store, Some(Uuid::new_v4())).len(), 1);
    }

    #[test]
    fn ancestor_ids_run_root_to_leaf() {
        let (mut store, _dir) = store();
        let root = add(&mut store, "A", DocumentKind::Folder, None);
        let mid = add(&mut store, "B", DocumentKind::Folder, Some(root));
        let leaf = add(&mut store, "c.doc", DocumentKind::File, Some(mid));

        assert_eq!(ancestor_path_ids(&store, leaf).unwrap(), vec![root, mid, leaf]);
        assert_eq!(ancestor_path_ids(&store, root).unwrap(), vec![root]);
    }

    #[test]
    fn move_validation_rejects_self_and_descendants() {
        let (mut store, _dir) = store();
        let a = add(&mut store, "A", DocumentKind::Folder, None);
        let b = add(&mut store, "B", DocumentKind::Folder, Some(a));
        let file = add(&mut store, "f.doc", DocumentKind::File, Some(a));

        assert!(matches!(
            validate_move(&store, a, Some(a)),
            Err(DriveError::InvalidOperation(_))
        ));
        assert!(matches!(
            validate_move(&store, a, Some(b)),
            Err(DriveError::InvalidOperation(_))
        ));
        assert!(matches!(
            validate_move(&store, b, Some(file)),
            Err(DriveError::InvalidOperation(_))
        ));
        assert!(matches!(
            validate_move(&store, b, Some(Uuid::new_v4())),
            Err(DriveError::ParentNotFound(_))
        ));
        assert!(validate_move(&store, b, None).is_ok());
    }

    #[test]
    fn descendant_walk_survives_a_corrupted_cycle() {
        let (mut store, _dir) = store();
        let a = add(&mut store, "A", DocumentKind::Folder, None);
        let b = add(&mut store, "B", DocumentKind::Folder, Some(a));
        store.get_mut(a).unwrap().parent_id = Some(b);

        let ids = descendant_ids(&store, a);
        assert_eq!(ids.len(), 2);
        assert!(refresh_descendant_paths(&mut store, a).is_ok());
    }
}
