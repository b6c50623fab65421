//! Parent-filtered listing and access-filtered search. Pagination happens
//! after access filtering: inherited access is per-user state that cannot be
//! pushed into a storage query without replicating the resolver there, so
//! correctness of `total` wins over query-time efficiency.

use crate::access::{check_access, effective_permission, has_inherited_access};
use crate::identity::UserProfile;
use crate::model::{Document, DocumentKind, PermissionLevel};
use crate::storage::DocumentStore;
use serde::Serialize;
use std::collections::HashSet;
use uuid::Uuid;

/// Active children of `parent_id` (or active roots for `None`) the user may
/// view. Root listings additionally surface directly-shared items from
/// elsewhere in the tree. Ordered by name, case-insensitive.
pub fn list_by_parent(
    store: &DocumentStore,
    parent_id: Option<Uuid>,
    user: &UserProfile,
) -> Vec<Document> {
    let mut items: Vec<Document> = store
        .children_of(parent_id)
        .into_iter()
        .filter(|d| check_access(store, d.id, user, PermissionLevel::Viewer))
        .cloned()
        .collect();
    if parent_id.is_none() {
        let seen: HashSet<Uuid> = items.iter().map(|d| d.id).collect();
        for doc in virtual_root_entries(store, user) {
            if !seen.contains(&doc.id) {
                items.push(doc);
            }
        }
    }
    items.sort_by_key(|d| d.name.to_lowercase());
    items
}

/// Virtual-root injection: documents anywhere in the tree that the user
/// holds a direct grant on (owner, user grant, or division grant) but cannot
/// reach through ancestor-folder inheritance. A product rule, not a tree
/// property; kept in its own function so it can be toggled without touching
/// the access algorithm.
pub fn virtual_root_entries(store: &DocumentStore, user: &UserProfile) -> Vec<Document> {
    if !user.is_active {
        return Vec::new();
    }
    store
        .active()
        .filter(|d| d.parent_id.is_some())
        .filter(|d| effective_permission(d, user).is_some())
        .filter(|d| !has_inherited_access(store, d, user, PermissionLevel::Viewer))
        .cloned()
        .collect()
}

#[derive(Clone, Debug, Serialize)]
pub struct SearchPage {
    pub items: Vec<Document>,
    /// Count of accessible matches, not raw matches.
    pub total: usize,
    pub offset: usize,
    pub limit: usize,
}

/// Case-insensitive substring search over name and category among active
/// documents, optionally narrowed by kind, then access-filtered and
/// paginated. Newest-modified first.
pub fn search(
    store: &DocumentStore,
    query: &str,
    kinds: Option<&[DocumentKind]>,
    limit: usize,
    offset: usize,
    user: &UserProfile,
) -> SearchPage {
    let needle = query.to_lowercase();
    let mut matches: Vec<&Document> = store
        .active()
        .filter(|d| {
            d.name.to_lowercase().contains(&needle)
                || d.category
                    .as_deref()
                    .is_some_and(|c| c.to_lowercase().contains(&needle))
        })
        .filter(|d| kinds.map_or(true, |ks| ks.contains(&d.kind)))
        .filter(|d| check_access(store, d.id, user, PermissionLevel::Viewer))
        .collect();
    matches.sort_by(|a, b| {
        b.updated_at
            .cmp(&a.updated_at)
            .then_with(|| b.created_at.cmp(&a.created_at))
    });
    let total = matches.len();
    let items = matches.into_iter().skip(offset).take(limit).cloned().collect();
    SearchPage {
        items,
        total,
        offset,
        limit,
    }
}

/// Distinct kinds among active documents, sorted.
pub fn distinct_kinds(store: &DocumentStore) -> Vec<String> {
    let set: HashSet<&'static str> = store.active().map(|d| d.kind.as_str()).collect();
    let mut kinds: Vec<String> = set.into_iter().map(str::to_string).collect();
    kinds.sort();
    kinds
}

/// Distinct categories among active documents, optionally filtered by a
/// case-insensitive substring. A search term with no match echoes back as
/// the sole suggestion.
pub fn distinct_categories(store: &DocumentStore, search: Option<&str>) -> Vec<String> {
    let mut set: HashSet<String> = store.active().filter_map(|d| d.category.clone()).collect();
    if let Some(term) = search {
        let needle = term.to_lowercase();
        set.retain(|c| c.to_lowercase().contains(&needle));
        if set.is_empty() {
            return vec![term.to_string()];
        }
    }
    let mut values: Vec<String> = set.into_iter().collect();
    values.sort();
    values
}
