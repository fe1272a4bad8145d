//! # Local Store Contract
//!
//! The backend-agnostic persistence interface the rest of the system is
//! written against.
//!
//! ## Overview
//!
//! Implementations must make every operation atomic with respect to every
//! other operation on the same store instance: no interleaved partial
//! read-modify-write. Backends with row-level transactions (SQLite) rely on
//! the database for this; whole-document backends must serialize all mutating
//! calls through a single writer. Concurrent reads are allowed.
//!
//! Every mutating operation leaves the entity `Pending` with a refreshed
//! `updated_at`. The only path to `Synced` is [`LocalStore::mark_synced`],
//! which is a compare-and-set on `updated_at`: if the entity changed after
//! the caller captured its snapshot, the call is a no-op and the entity stays
//! pending for the next sync cycle.

use crate::error::Result;
use crate::models::{CardId, ListId, TodoCard, TodoList};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// The two synchronizable entity kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    List,
    Card,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::List => "list",
            EntityKind::Card => "card",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// All currently pending entities, as captured by [`LocalStore::get_unsynced`].
///
/// This is also the wire shape of a sync batch: it serializes to
/// `{ "lists": [...], "cards": [...] }`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnsyncedBatch {
    pub lists: Vec<TodoList>,
    pub cards: Vec<TodoCard>,
}

impl UnsyncedBatch {
    pub fn is_empty(&self) -> bool {
        self.lists.is_empty() && self.cards.is_empty()
    }

    pub fn len(&self) -> usize {
        self.lists.len() + self.cards.len()
    }
}

/// Backend-agnostic persistence contract for todo entities.
///
/// # Errors
///
/// All operations report I/O failures as `StoreError`; a failed mutation is
/// not applied (no partial state).
#[async_trait]
pub trait LocalStore: Send + Sync {
    /// Full snapshot read of all lists.
    async fn get_all_lists(&self) -> Result<Vec<TodoList>>;

    /// Full snapshot read of all cards.
    async fn get_all_cards(&self) -> Result<Vec<TodoCard>>;

    /// Read a single list by id.
    async fn get_list(&self, id: &ListId) -> Result<Option<TodoList>>;

    /// Read a single card by id.
    async fn get_card(&self, id: &CardId) -> Result<Option<TodoCard>>;

    /// Read the cards belonging to one list.
    async fn get_cards_for_list(&self, list_id: &ListId) -> Result<Vec<TodoCard>>;

    /// Insert-or-replace a list by id.
    ///
    /// Rejects names that are empty or duplicate another list's name
    /// case-insensitively. Always stamps `updated_at` from the store clock
    /// and resets the sync state to pending. Returns the persisted entity.
    async fn upsert_list(&self, list: TodoList) -> Result<TodoList>;

    /// Insert-or-replace a card by id.
    ///
    /// Rejects texts that are empty or duplicate another card's text
    /// case-insensitively within the same list, and cards whose `list_id`
    /// does not reference a live list. Always stamps `updated_at` and resets
    /// the sync state to pending. Returns the persisted entity.
    async fn upsert_card(&self, card: TodoCard) -> Result<TodoCard>;

    /// Flip a card's completion flag.
    ///
    /// Counts as a mutation: stamps `updated_at` and resets to pending.
    async fn toggle_card(&self, id: &CardId) -> Result<TodoCard>;

    /// Remove a list and cascade-delete all cards referencing it.
    async fn delete_list(&self, id: &ListId) -> Result<()>;

    /// Remove a single card.
    async fn delete_card(&self, id: &CardId) -> Result<()>;

    /// All entities whose latest state the remote store has not acknowledged.
    async fn get_unsynced(&self) -> Result<UnsyncedBatch>;

    /// Mark one entity synced, but only if its `updated_at` still equals
    /// `observed_updated_at`. Otherwise the call is a no-op and the entity
    /// remains pending for the next cycle. A missing entity (deleted since
    /// the snapshot) is also a no-op.
    ///
    /// Returns whether the entity was actually marked.
    async fn mark_synced(
        &self,
        kind: EntityKind,
        id: &str,
        observed_updated_at: i64,
    ) -> Result<bool>;

    /// Number of entities currently pending.
    async fn count_unsynced(&self) -> Result<u64>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_kind_strings() {
        assert_eq!(EntityKind::List.as_str(), "list");
        assert_eq!(EntityKind::Card.as_str(), "card");
    }

    #[test]
    fn test_empty_batch() {
        let batch = UnsyncedBatch::default();
        assert!(batch.is_empty());
        assert_eq!(batch.len(), 0);
    }

    #[test]
    fn test_batch_wire_shape() {
        let batch = UnsyncedBatch::default();
        let json = serde_json::to_string(&batch).unwrap();
        assert_eq!(json, r#"{"lists":[],"cards":[]}"#);
    }
}
