//! # SQLite Store Backend
//!
//! `LocalStore` implementation backed by a SQLite connection pool.
//!
//! ## Overview
//!
//! Each logical operation runs inside one transaction, so the uniqueness
//! check and the write it guards cannot interleave with another writer.
//! Cascade deletion of cards is delegated to the `ON DELETE CASCADE` foreign
//! key (enforced because the pool enables `foreign_keys`).
//!
//! The store stamps `updated_at` from an injected [`Clock`]; production code
//! uses the system clock, tests inject a manual one to make the mark-synced
//! compare-and-set deterministic.

use crate::error::{Result, StoreError};
use crate::models::{
    validate_card_text, validate_list_name, CardId, ListId, SyncState, TodoCard, TodoList,
};
use crate::store::{EntityKind, LocalStore, UnsyncedBatch};
use async_trait::async_trait;
use bridge_traits::{Clock, SystemClock};
use sqlx::{FromRow, SqlitePool};
use std::sync::Arc;
use tracing::debug;

/// SQLite implementation of [`LocalStore`]
pub struct SqliteLocalStore {
    pool: SqlitePool,
    clock: Arc<dyn Clock>,
}

impl SqliteLocalStore {
    /// Create a new store over an initialized pool (see [`crate::db::create_pool`])
    pub fn new(pool: SqlitePool) -> Self {
        Self::with_clock(pool, Arc::new(SystemClock))
    }

    /// Create a new store with an injected time source
    pub fn with_clock(pool: SqlitePool, clock: Arc<dyn Clock>) -> Self {
        Self { pool, clock }
    }
}

// ============================================================================
// Row Mapping
// ============================================================================

/// Database row representation of a list
#[derive(Debug, FromRow)]
struct ListRow {
    id: String,
    name: String,
    updated_at: i64,
    is_synced: i64,
}

impl TryFrom<ListRow> for TodoList {
    type Error = StoreError;

    fn try_from(row: ListRow) -> Result<Self> {
        Ok(TodoList {
            id: ListId::from_string(&row.id)?,
            name: row.name,
            updated_at: row.updated_at,
            sync_state: SyncState::from_flag(row.is_synced),
        })
    }
}

/// Database row representation of a card
#[derive(Debug, FromRow)]
struct CardRow {
    id: String,
    text: String,
    list_id: String,
    completed: i64,
    created_at: i64,
    updated_at: i64,
    is_synced: i64,
}

impl TryFrom<CardRow> for TodoCard {
    type Error = StoreError;

    fn try_from(row: CardRow) -> Result<Self> {
        Ok(TodoCard {
            id: CardId::from_string(&row.id)?,
            list_id: ListId::from_string(&row.list_id)?,
            text: row.text,
            completed: row.completed != 0,
            created_at: row.created_at,
            updated_at: row.updated_at,
            sync_state: SyncState::from_flag(row.is_synced),
        })
    }
}

const SELECT_LIST: &str = "SELECT id, name, updated_at, is_synced FROM lists";
const SELECT_CARD: &str =
    "SELECT id, text, list_id, completed, created_at, updated_at, is_synced FROM cards";

// ============================================================================
// LocalStore Implementation
// ============================================================================

#[async_trait]
impl LocalStore for SqliteLocalStore {
    async fn get_all_lists(&self) -> Result<Vec<TodoList>> {
        let rows = sqlx::query_as::<_, ListRow>(&format!("{} ORDER BY name", SELECT_LIST))
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(TodoList::try_from).collect()
    }

    async fn get_all_cards(&self) -> Result<Vec<TodoCard>> {
        let rows = sqlx::query_as::<_, CardRow>(&format!("{} ORDER BY created_at", SELECT_CARD))
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(TodoCard::try_from).collect()
    }

    async fn get_list(&self, id: &ListId) -> Result<Option<TodoList>> {
        let row = sqlx::query_as::<_, ListRow>(&format!("{} WHERE id = ?", SELECT_LIST))
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        row.map(TodoList::try_from).transpose()
    }

    async fn get_card(&self, id: &CardId) -> Result<Option<TodoCard>> {
        let row = sqlx::query_as::<_, CardRow>(&format!("{} WHERE id = ?", SELECT_CARD))
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        row.map(TodoCard::try_from).transpose()
    }

    async fn get_cards_for_list(&self, list_id: &ListId) -> Result<Vec<TodoCard>> {
        let rows = sqlx::query_as::<_, CardRow>(&format!(
            "{} WHERE list_id = ? ORDER BY created_at",
            SELECT_CARD
        ))
        .bind(list_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TodoCard::try_from).collect()
    }

    async fn upsert_list(&self, list: TodoList) -> Result<TodoList> {
        validate_list_name(&list.name)?;

        eprintln!("DBG upsert_list begin");
        let mut tx = self.pool.begin().await?;
        eprintln!("DBG upsert_list got conn");

        let duplicates: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM lists WHERE LOWER(name) = LOWER(?) AND id != ?",
        )
        .bind(&list.name)
        .bind(list.id.as_str())
        .fetch_one(&mut *tx)
        .await?;

        if duplicates > 0 {
            return Err(StoreError::validation(
                "name",
                format!("a list named '{}' already exists", list.name),
            ));
        }

        let persisted = TodoList {
            updated_at: self.clock.unix_timestamp_millis(),
            sync_state: SyncState::Pending,
            ..list
        };

        sqlx::query(
            r#"
            INSERT INTO lists (id, name, updated_at, is_synced)
            VALUES (?, ?, ?, ?)
            ON CONFLICT (id) DO UPDATE SET
                name = excluded.name,
                updated_at = excluded.updated_at,
                is_synced = excluded.is_synced
            "#,
        )
        .bind(persisted.id.as_str())
        .bind(&persisted.name)
        .bind(persisted.updated_at)
        .bind(persisted.sync_state.as_flag())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        eprintln!("DBG upsert_list committed");

        debug!(list_id = %persisted.id, "List upserted");
        Ok(persisted)
    }

    async fn upsert_card(&self, card: TodoCard) -> Result<TodoCard> {
        validate_card_text(&card.text)?;

        let mut tx = self.pool.begin().await?;

        let list_exists: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM lists WHERE id = ?")
            .bind(card.list_id.as_str())
            .fetch_one(&mut *tx)
            .await?;

        if list_exists == 0 {
            return Err(StoreError::not_found("list", card.list_id));
        }

        let duplicates: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM cards WHERE list_id = ? AND LOWER(text) = LOWER(?) AND id != ?",
        )
        .bind(card.list_id.as_str())
        .bind(&card.text)
        .bind(card.id.as_str())
        .fetch_one(&mut *tx)
        .await?;

        if duplicates > 0 {
            return Err(StoreError::validation(
                "text",
                format!("a card with text '{}' already exists in this list", card.text),
            ));
        }

        let persisted = TodoCard {
            updated_at: self.clock.unix_timestamp_millis(),
            sync_state: SyncState::Pending,
            ..card
        };

        sqlx::query(
            r#"
            INSERT INTO cards (id, text, list_id, completed, created_at, updated_at, is_synced)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (id) DO UPDATE SET
                text = excluded.text,
                list_id = excluded.list_id,
                completed = excluded.completed,
                updated_at = excluded.updated_at,
                is_synced = excluded.is_synced
            "#,
        )
        .bind(persisted.id.as_str())
        .bind(&persisted.text)
        .bind(persisted.list_id.as_str())
        .bind(persisted.completed as i64)
        .bind(persisted.created_at)
        .bind(persisted.updated_at)
        .bind(persisted.sync_state.as_flag())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        debug!(card_id = %persisted.id, list_id = %persisted.list_id, "Card upserted");
        Ok(persisted)
    }

    async fn toggle_card(&self, id: &CardId) -> Result<TodoCard> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, CardRow>(&format!("{} WHERE id = ?", SELECT_CARD))
            .bind(id.as_str())
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| StoreError::not_found("card", id))?;

        let mut card = TodoCard::try_from(row)?;
        card.completed = !card.completed;
        card.updated_at = self.clock.unix_timestamp_millis();
        card.sync_state = SyncState::Pending;

        sqlx::query("UPDATE cards SET completed = ?, updated_at = ?, is_synced = ? WHERE id = ?")
            .bind(card.completed as i64)
            .bind(card.updated_at)
            .bind(card.sync_state.as_flag())
            .bind(card.id.as_str())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        debug!(card_id = %card.id, completed = card.completed, "Card toggled");
        Ok(card)
    }

    async fn delete_list(&self, id: &ListId) -> Result<()> {
        // Cards go with the list via ON DELETE CASCADE
        let result = sqlx::query("DELETE FROM lists WHERE id = ?")
            .bind(id.as_str())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("list", id));
        }

        debug!(list_id = %id, "List deleted");
        Ok(())
    }

    async fn delete_card(&self, id: &CardId) -> Result<()> {
        let result = sqlx::query("DELETE FROM cards WHERE id = ?")
            .bind(id.as_str())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("card", id));
        }

        debug!(card_id = %id, "Card deleted");
        Ok(())
    }

    async fn get_unsynced(&self) -> Result<UnsyncedBatch> {
        let list_rows = sqlx::query_as::<_, ListRow>(&format!(
            "{} WHERE is_synced = 0 ORDER BY updated_at",
            SELECT_LIST
        ))
        .fetch_all(&self.pool)
        .await?;

        let card_rows = sqlx::query_as::<_, CardRow>(&format!(
            "{} WHERE is_synced = 0 ORDER BY updated_at",
            SELECT_CARD
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(UnsyncedBatch {
            lists: list_rows
                .into_iter()
                .map(TodoList::try_from)
                .collect::<Result<Vec<_>>>()?,
            cards: card_rows
                .into_iter()
                .map(TodoCard::try_from)
                .collect::<Result<Vec<_>>>()?,
        })
    }

    async fn mark_synced(
        &self,
        kind: EntityKind,
        id: &str,
        observed_updated_at: i64,
    ) -> Result<bool> {
        let query = match kind {
            EntityKind::List => "UPDATE lists SET is_synced = 1 WHERE id = ? AND updated_at = ?",
            EntityKind::Card => "UPDATE cards SET is_synced = 1 WHERE id = ? AND updated_at = ?",
        };

        let result = sqlx::query(query)
            .bind(id)
            .bind(observed_updated_at)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            // Entity was mutated or deleted after the snapshot; it stays
            // pending and the next cycle retransmits it.
            debug!(kind = %kind, id, "mark_synced skipped, snapshot is stale");
            return Ok(false);
        }

        Ok(true)
    }

    async fn count_unsynced(&self) -> Result<u64> {
        let lists: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM lists WHERE is_synced = 0")
            .fetch_one(&self.pool)
            .await?;
        let cards: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM cards WHERE is_synced = 0")
            .fetch_one(&self.pool)
            .await?;

        Ok((lists + cards) as u64)
    }
}

// ============================================================================
// Tests
// ============================================================================
