//! # Sync Module
//!
//! Best-effort synchronization of locally-mutated entities against the remote
//! store under intermittent connectivity.
//!
//! ## Overview
//!
//! This module manages the outbound sync path:
//! - Snapshotting pending entities from the local store
//! - Transmitting them as a single batch with retry/backoff
//! - Marking acknowledged entities synced without clobbering newer mutations
//! - Driving the cycle on a timer and on reconnect events
//!
//! ## Components
//!
//! - **Sync Engine** (`engine`): The core state machine (Idle / Syncing /
//!   Backoff) with single-flight gating
//! - **Transport** (`transport`): Batch transmission with a closed
//!   connectivity/application failure classification
//! - **Remote API** (`remote`): Per-entity CRUD calls for immediate
//!   propagation outside the batch path
//! - **Scheduler** (`scheduler`): Periodic ticks plus reconnect triggers

pub mod engine;
pub mod error;
pub mod remote;
pub mod scheduler;
pub mod transport;

pub use engine::{EngineState, SyncConfig, SyncEngine, SyncOutcome};
pub use error::{Result, SyncError};
pub use remote::{LastSaved, RemoteApi};
pub use scheduler::SyncScheduler;
pub use transport::{HttpSyncTransport, SyncResponse, SyncTransport, TransportError};
