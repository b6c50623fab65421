//! Permission resolution. Direct and inherited checks are separate
//! primitives on purpose: deciding whether a user may manage sharing on a
//! node uses direct-only, while deciding whether a user may view it uses
//! direct-or-inherited. Fusing them would over- or under-grant depending on
//! the call site.

use crate::identity::UserProfile;
use crate::model::{Document, PermissionLevel};
use crate::storage::DocumentStore;
use serde::Serialize;
use std::collections::HashSet;
use uuid::Uuid;

/// Whether the user holds the required level on this document itself:
/// owner, admin, a direct user grant, or a grant to the user's division.
pub fn has_direct_access(doc: &Document, user: &UserProfile, required: PermissionLevel) -> bool {
    if !user.is_active {
        return false;
    }
    if user.role.is_admin() {
        return true;
    }
    if doc.owner_id == user.id {
        return true;
    }
    if doc.user_grant(&user.id).is_some_and(|l| l.satisfies(required)) {
        return true;
    }
    user.division
        .as_deref()
        .and_then(|d| doc.division_grant(d))
        .is_some_and(|l| l.satisfies(required))
}

/// Whether some ancestor folder grants the required level directly. Walks
/// `parent_id` links upward with a visited-set guard; non-folder ancestors
/// are skipped, and a missing or deleted ancestor terminates the walk (a
/// living document cannot have a dead parent under the tree invariant).
pub fn has_inherited_access(
    store: &DocumentStore,
    doc: &Document,
    user: &UserProfile,
    required: PermissionLevel,
) -> bool {
    if !user.is_active {
        return false;
    }
    if user.role.is_admin() {
        return true;
    }
    let mut visited = HashSet::from([doc.id]);
    let mut current = doc.parent_id;
    while let Some(id) = current {
        if !visited.insert(id) {
            break;
        }
        let Some(ancestor) = store.get_active(id) else {
            break;
        };
        if ancestor.is_folder() && has_direct_access(ancestor, user, required) {
            return true;
        }
        current = ancestor.parent_id;
    }
    false
}

/// The single authority consulted by every read/write endpoint: direct OR
/// inherited. A missing or soft-deleted document yields `false`, never an
/// error; callers needing a 404/403 distinction must check existence first.
pub fn check_access(
    store: &DocumentStore,
    doc_id: Uuid,
    user: &UserProfile,
    required: PermissionLevel,
) -> bool {
    let Some(doc) = store.get_active(doc_id) else {
        return false;
    };
    has_direct_access(doc, user, required) || has_inherited_access(store, doc, user, required)
}

/// Effective-access breakdown for one user on one document.
#[derive(Clone, Copy, Debug, Default, Serialize)]
pub struct AccessSummary {
    pub can_view: bool,
    pub can_edit: bool,
    pub can_delete: bool,
    pub is_owner: bool,
    pub direct_view: bool,
    pub direct_edit: bool,
    pub inherited_view: bool,
    pub inherited_edit: bool,
}

/// Compute direct and inherited booleans independently for both levels,
/// exposing the breakdown alongside the aggregates. Deletion requires
/// ownership of the document or of an ancestor, or admin.
pub fn access_summary(store: &DocumentStore, doc_id: Uuid, user: &UserProfile) -> AccessSummary {
    let Some(doc) = store.get_active(doc_id) else {
        return AccessSummary::default();
    };
    let direct_view = has_direct_access(doc, user, PermissionLevel::Viewer);
    let direct_edit = has_direct_access(doc, user, PermissionLevel::Editor);
    let inherited_view = has_inherited_access(store, doc, user, PermissionLevel::Viewer);
    let inherited_edit = has_inherited_access(store, doc, user, PermissionLevel::Editor);
    let is_owner = user.is_active && doc.owner_id == user.id;
    let can_delete =
        user.is_active && (user.role.is_admin() || is_owner || owns_ancestor(store, doc, user));
    AccessSummary {
        can_view: direct_view || inherited_view,
        can_edit: direct_edit || inherited_edit,
        can_delete,
        is_owner,
        direct_view,
        direct_edit,
        inherited_view,
        inherited_edit,
    }
}

/// Direct highest level only: owner maps to editor, else a direct user
/// grant, else a direct division grant, else none. Inherited access and the
/// admin override are deliberately not folded in, so callers deciding
/// whether a user may manage sharing on this exact node are not fooled by
/// ancestor grants.
pub fn effective_permission(doc: &Document, user: &UserProfile) -> Option<PermissionLevel> {
    if !user.is_active || doc.is_deleted() {
        return None;
    }
    if doc.owner_id == user.id {
        return Some(PermissionLevel::Editor);
    }
    if let Some(level) = doc.user_grant(&user.id) {
        return Some(level);
    }
    user.division.as_deref().and_then(|d| doc.division_grant(d))
}

fn owns_ancestor(store: &DocumentStore, doc: &Document, user: &UserProfile) -> bool {
    let mut visited = HashSet::from([doc.id]);
    let mut current = doc.parent_id;
    while let Some(id) = current {
        if !visited.insert(id) {
            break;
        }
        let Some(ancestor) = store.get_active(id) else {
            break;
        };
        if ancestor.owner_id == user.id {
            return true;
        }
        current = ancestor.parent_id;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Role;
    use crate::model::{DivisionGrant, DocumentKind, UserGrant};
    use crate::tree;

    fn store() -> (DocumentStore, tempfile::TempDir) {
        let tempdir = tempfile::tempdir().unwrap();
        let store = DocumentStore::open(tempdir.path()).unwrap();
        (store, tempdir)
    }

    fn add(
        store: &mut DocumentStore,
        name: &str,
        kind: DocumentKind,
        owner: &str,
        parent: Option<Uuid>,
    ) -> Uuid {
        let id = store.insert(Document::new(name, kind, owner, parent)).unwrap();
        tree::apply_path(store, id).unwrap();
        id
    }

    fn user_grant(user_id: &str, level: PermissionLevel) -> UserGrant {
        UserGrant {
            user_id: user_id.into(),
            user_name: user_id.into(),
            user_email: format!("{user_id}@example.com"),
            level,
        }
    }

    #[test]
    fn ownership_implies_full_access() {
        let (mut store, _dir) = store();
        let owner = UserProfile::member("u1", "Sam");
        let id = add(&mut store, "notes.doc", DocumentKind::File, "u1", None);
        assert!(check_access(&store, id, &owner, PermissionLevel::Editor));
        assert!(check_access(&store, id, &owner, PermissionLevel::Viewer));
    }

    #[test]
    fn admin_short_circuits_everything() {
        let (mut store, _dir) = store();
        let admin = UserProfile::member("root", "Root").with_role(Role::Admin);
        let id = add(&mut store, "private.doc", DocumentKind::File, "u1", None);
        assert!(check_access(&store, id, &admin, PermissionLevel::Editor));
        // but admin is a bypass, not a direct grant
        assert_eq!(effective_permission(store.get(id).unwrap(), &admin), None);
    }

    #[test]
    fn inactive_user_has_no_access_even_as_owner() {
        let (mut store, _dir) = store();
        let mut owner = UserProfile::member("u1", "Sam");
        owner.is_active = false;
        let id = add(&mut store, "notes.doc", DocumentKind::File, "u1", None);
        assert!(!check_access(&store, id, &owner, PermissionLevel::Viewer));
        assert_eq!(effective_permission(store.get(id).unwrap(), &owner), None);
    }

    #[test]
    fn viewer_grant_does_not_satisfy_editor() {
        let (mut store, _dir) = store();
        let user = UserProfile::member("u2", "Pat");
        let id = add(&mut store, "plan.doc", DocumentKind::File, "u1", None);
        store
            .set_user_grant(id, user_grant("u2", PermissionLevel::Viewer))
            .unwrap();
        assert!(check_access(&store, id, &user, PermissionLevel::Viewer));
        assert!(!check_access(&store, id, &user, PermissionLevel::Editor));
    }

    #[test]
    fn division_grant_inherits_through_folders() {
        let (mut store, _dir) = store();
        let projects = add(&mut store, "Projects", DocumentKind::Folder, "u1", None);
        let alpha = add(&mut store, "Alpha", DocumentKind::Folder, "u1", Some(projects));
        let doc = add(&mut store, "design.doc", DocumentKind::File, "u1", Some(alpha));
        store
            .set_division_grant(
                alpha,
                DivisionGrant {
                    division_id: "Eng".into(),
                    level: PermissionLevel::Viewer,
                },
            )
            .unwrap();

        let u2 = UserProfile::member("u2", "Pat").with_division("Eng");
        assert!(check_access(&store, doc, &u2, PermissionLevel::Viewer));
        assert!(!check_access(&store, doc, &u2, PermissionLevel::Editor));

        // no grant on the child itself
        assert_eq!(effective_permission(store.get(doc).unwrap(), &u2), None);
    }

    #[test]
    fn effective_permission_is_direct_only() {
        let (mut store, _dir) = store();
        let folder = add(&mut store, "Shared", DocumentKind::Folder, "u1", None);
        let doc = add(&mut store, "inner.doc", DocumentKind::File, "u1", Some(folder));
        store
            .set_user_grant(folder, user_grant("u2", PermissionLevel::Editor))
            .unwrap();

        let u2 = UserProfile::member("u2", "Pat");
        assert!(check_access(&store, doc, &u2, PermissionLevel::Editor));
        assert_eq!(effective_permission(store.get(doc).unwrap(), &u2), None);
        assert_eq!(
            effective_permission(store.get(folder).unwrap(), &u2),
            Some(PermissionLevel::Editor)
        );
    }

    #[test]
    fn user_and_division_grants_are_ored() {
        let (mut store, _dir) = store();
        let id = add(&mut store, "budget.doc", DocumentKind::File, "u1", None);
        store
            .set_user_grant(id, user_grant("u2", PermissionLevel::Viewer))
            .unwrap();
        store
            .set_division_grant(
                id,
                DivisionGrant {
                    division_id: "Finance".into(),
                    level: PermissionLevel::Editor,
                },
            )
            .unwrap();
        // the weaker user grant must not shadow the division editor grant
        let u2 = UserProfile::member("u2", "Pat").with_division("Finance");
        assert!(check_access(&store, id, &u2, PermissionLevel::Editor));
    }

    #[test]
    fn missing_or_deleted_document_resolves_false() {
        let (mut store, _dir) = store();
        let user = UserProfile::member("u1", "Sam");
        assert!(!check_access(&store, Uuid::new_v4(), &user, PermissionLevel::Viewer));

        let id = add(&mut store, "gone.doc", DocumentKind::File, "u1", None);
        store.get_mut(id).unwrap().deleted_at = Some(chrono::Utc::now());
        assert!(!check_access(&store, id, &user, PermissionLevel::Viewer));
    }

    #[test]
    fn summary_breaks_out_direct_and_inherited() {
        let (mut store, _dir) = store();
        let folder = add(&mut store, "Specs", DocumentKind::Folder, "u1", None);
        let doc = add(&mut store, "v1.doc", DocumentKind::File, "u1", Some(folder));
        store
            .set_user_grant(folder, user_grant("u2", PermissionLevel::Viewer))
            .unwrap();

        let u2 = UserProfile::member("u2", "Pat");
        let summary = access_summary(&store, doc, &u2);
        assert!(summary.can_view);
        assert!(!summary.can_edit);
        assert!(!summary.direct_view);
        assert!(summary.inherited_view);
        assert!(!summary.is_owner);
        assert!(!summary.can_delete);

        let owner = UserProfile::member("u1", "Sam");
        let summary = access_summary(&store, doc, &owner);
        assert!(summary.is_owner);
        assert!(summary.can_delete);
    }

    #[test]
    fn ancestor_walk_survives_a_corrupted_cycle() {
        let (mut store, _dir) = store();
        let a = add(&mut store, "A", DocumentKind::Folder, "u1", None);
        let b = add(&mut store, "B", DocumentKind::Folder, "u1", Some(a));
        // corrupt the tree: A now claims B as its parent
        store.get_mut(a).unwrap().parent_id = Some(b);

        let stranger = UserProfile::member("u9", "Eve");
        let doc = store.get(b).unwrap();
        assert!(!has_inherited_access(&store, doc, &stranger, PermissionLevel::Viewer));
    }
}
