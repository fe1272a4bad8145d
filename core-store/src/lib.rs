//! # Local Store
//!
//! Durable persistence for todo lists and cards, independent of the physical
//! medium.
//!
//! ## Overview
//!
//! This crate is the single source of truth for persisted entities. It
//! provides:
//! - Domain models with validation (`models`)
//! - The backend-agnostic [`LocalStore`](store::LocalStore) trait (`store`)
//! - A SQLite backend with row-level transactions (`sqlite`)
//! - A whole-document JSON backend with a single-writer queue (`document`)
//!
//! Every mutation stamps the entity `updated_at` from an injected
//! [`Clock`](bridge_traits::Clock) and resets it to pending; the sync engine
//! later marks entities synced with a compare-and-set on that timestamp so an
//! acknowledgement can never clobber a newer local mutation.

pub mod db;
pub mod document;
pub mod error;
pub mod models;
pub mod sqlite;
pub mod store;

pub use db::{create_pool, create_test_pool, DatabaseConfig};
pub use document::JsonDocumentStore;
pub use error::{Result, StoreError};
pub use models::{CardId, ListId, SyncState, TodoCard, TodoList};
pub use sqlite::SqliteLocalStore;
pub use store::{EntityKind, LocalStore, UnsyncedBatch};
