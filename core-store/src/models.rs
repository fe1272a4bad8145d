//! Domain models for todo lists and cards
//!
//! This module contains the two synchronizable entity kinds with their
//! validation rules and sync-state field.

use crate::error::{Result, StoreError};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Maximum accepted length for a list name, in bytes.
pub const MAX_NAME_LEN: usize = 255;

/// Maximum accepted length for a card text, in bytes.
pub const MAX_TEXT_LEN: usize = 1024;

// =============================================================================
// ID Types
// =============================================================================

/// Unique identifier for a todo list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ListId(Uuid);

impl ListId {
    /// Create a new random list ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a list ID from a string
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not a valid UUID
    pub fn from_string(s: &str) -> Result<Self> {
        Ok(Self(
            Uuid::parse_str(s).map_err(|e| StoreError::InvalidId(e.to_string()))?,
        ))
    }

    /// Get the string representation of this ID
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for ListId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ListId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a todo card
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CardId(Uuid);

impl CardId {
    /// Create a new random card ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a card ID from a string
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not a valid UUID
    pub fn from_string(s: &str) -> Result<Self> {
        Ok(Self(
            Uuid::parse_str(s).map_err(|e| StoreError::InvalidId(e.to_string()))?,
        ))
    }

    /// Get the string representation of this ID
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for CardId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Sync State
// =============================================================================

/// Per-entity flag indicating whether the latest local state has been
/// acknowledged by the remote store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncState {
    /// Local state has not been acknowledged by the remote store
    Pending,
    /// The remote store acknowledged this exact local state
    Synced,
}

impl SyncState {
    /// Get the integer flag used for database storage (`is_synced` column)
    pub fn as_flag(&self) -> i64 {
        match self {
            SyncState::Pending => 0,
            SyncState::Synced => 1,
        }
    }

    /// Parse the integer flag from database storage
    pub fn from_flag(flag: i64) -> Self {
        if flag == 0 {
            SyncState::Pending
        } else {
            SyncState::Synced
        }
    }

    /// Whether this entity still needs to be transmitted
    pub fn is_pending(&self) -> bool {
        matches!(self, SyncState::Pending)
    }
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncState::Pending => write!(f, "pending"),
            SyncState::Synced => write!(f, "synced"),
        }
    }
}

// =============================================================================
// Entities
// =============================================================================

/// A todo list owning zero or more cards.
///
/// List names are unique case-insensitively across all lists; the uniqueness
/// check happens in the store at write time against current local state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TodoList {
    pub id: ListId,
    pub name: String,
    /// Unix milliseconds of the last local mutation. Refreshed by the store
    /// on every upsert; also the compare-and-set token for mark-synced.
    pub updated_at: i64,
    pub sync_state: SyncState,
}

impl TodoList {
    /// Create a new pending list with a fresh ID.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the name is empty or too long.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        validate_list_name(&name)?;
        Ok(Self {
            id: ListId::new(),
            name,
            updated_at: Utc::now().timestamp_millis(),
            sync_state: SyncState::Pending,
        })
    }

    /// Return this list with a new name, revalidated.
    ///
    /// The store refreshes `updated_at` and resets the sync state when the
    /// renamed list is upserted.
    pub fn renamed(mut self, name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        validate_list_name(&name)?;
        self.name = name;
        Ok(self)
    }
}

/// A single todo card belonging to a list.
///
/// Card texts are unique case-insensitively among the cards of the same list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TodoCard {
    pub id: CardId,
    pub list_id: ListId,
    pub text: String,
    pub completed: bool,
    pub created_at: i64,
    /// Unix milliseconds of the last local mutation. Refreshed by the store
    /// on every upsert; also the compare-and-set token for mark-synced.
    pub updated_at: i64,
    pub sync_state: SyncState,
}

impl TodoCard {
    /// Create a new pending, uncompleted card with a fresh ID.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the text is empty or too long.
    pub fn new(list_id: ListId, text: impl Into<String>) -> Result<Self> {
        let text = text.into();
        validate_card_text(&text)?;
        let now = Utc::now().timestamp_millis();
        Ok(Self {
            id: CardId::new(),
            list_id,
            text,
            completed: false,
            created_at: now,
            updated_at: now,
            sync_state: SyncState::Pending,
        })
    }

    /// Return this card with new text, revalidated.
    pub fn with_text(mut self, text: impl Into<String>) -> Result<Self> {
        let text = text.into();
        validate_card_text(&text)?;
        self.text = text;
        Ok(self)
    }
}

// =============================================================================
// Validation
// =============================================================================

/// Validate a list name: non-empty (ignoring whitespace) and within length.
pub fn validate_list_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(StoreError::validation("name", "list name cannot be empty"));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(StoreError::validation(
            "name",
            format!("list name exceeds {} bytes", MAX_NAME_LEN),
        ));
    }
    Ok(())
}

/// Validate a card text: non-empty (ignoring whitespace) and within length.
pub fn validate_card_text(text: &str) -> Result<()> {
    if text.trim().is_empty() {
        return Err(StoreError::validation("text", "card text cannot be empty"));
    }
    if text.len() > MAX_TEXT_LEN {
        return Err(StoreError::validation(
            "text",
            format!("card text exceeds {} bytes", MAX_TEXT_LEN),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_list_is_pending() {
        let list = TodoList::new("Groceries").unwrap();
        assert_eq!(list.name, "Groceries");
        assert!(list.sync_state.is_pending());
        assert!(list.updated_at > 0);
    }

    #[test]
    fn test_empty_list_name_rejected() {
        assert!(TodoList::new("").is_err());
        assert!(TodoList::new("   ").is_err());
    }

    #[test]
    fn test_oversized_list_name_rejected() {
        let name = "x".repeat(MAX_NAME_LEN + 1);
        let err = TodoList::new(name).unwrap_err();
        assert!(matches!(err, StoreError::Validation { .. }));
    }

    #[test]
    fn test_new_card_defaults() {
        let list = TodoList::new("Groceries").unwrap();
        let card = TodoCard::new(list.id, "Milk").unwrap();

        assert_eq!(card.list_id, list.id);
        assert!(!card.completed);
        assert_eq!(card.created_at, card.updated_at);
        assert!(card.sync_state.is_pending());
    }

    #[test]
    fn test_empty_card_text_rejected() {
        let list = TodoList::new("Groceries").unwrap();
        assert!(TodoCard::new(list.id, "\t\n").is_err());
    }

    #[test]
    fn test_sync_state_flag_round_trip() {
        assert_eq!(SyncState::from_flag(SyncState::Pending.as_flag()), SyncState::Pending);
        assert_eq!(SyncState::from_flag(SyncState::Synced.as_flag()), SyncState::Synced);
    }

    #[test]
    fn test_id_string_round_trip() {
        let id = ListId::new();
        let parsed = ListId::from_string(&id.as_str()).unwrap();
        assert_eq!(id, parsed);

        assert!(CardId::from_string("not-a-uuid").is_err());
    }

    #[test]
    fn test_camel_case_wire_format() {
        let list = TodoList::new("Groceries").unwrap();
        let card = TodoCard::new(list.id, "Milk").unwrap();

        let json = serde_json::to_string(&card).unwrap();
        assert!(json.contains("\"listId\""));
        assert!(json.contains("\"createdAt\""));
        assert!(json.contains("\"updatedAt\""));
        assert!(json.contains("\"syncState\":\"pending\""));
    }
}
