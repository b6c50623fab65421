//! Core engine for a hierarchical document drive: permission resolution,
//! tree maintenance, listing/search, and edit-history recording.

pub mod access;
pub mod error;
pub mod events;
pub mod identity;
pub mod listing;
pub mod model;
pub mod service;
pub mod storage;
pub mod tree;
