//! # Sync Engine State Machine
//!
//! Reconciles locally-mutated entities against the remote store.
//!
//! ## State Machine
//!
//! ```text
//!         ┌──────────────────────────────┐
//!         ▼                              │
//!       Idle ──(trigger, gate free)──▶ Syncing ──(success / connectivity
//!         ▲                              │ ▲       loss / retries spent)──▶ Idle
//!         │                              ▼ │
//!         └───────────────────── Backoff(n)┘
//! ```
//!
//! ## Cycle
//!
//! 1. A trigger (scheduler tick, reconnect signal, or explicit call) enters
//!    through [`SyncEngine::sync_now`]. The state acts as a single-flight
//!    gate: triggers arriving while a cycle is running are dropped, not
//!    queued.
//! 2. The cycle snapshots all pending entities from the store, capturing each
//!    entity's `updated_at` at snapshot time.
//! 3. The whole snapshot is transmitted as one batch.
//! 4. Connectivity failures end the cycle without consuming a retry; the
//!    entities stay pending until the next tick or reconnect.
//! 5. Application failures retry the *same* batch with exponential backoff,
//!    up to the configured budget, then abandon it until the next tick.
//! 6. On success, each snapshot entity is marked synced with a
//!    compare-and-set on its captured `updated_at`, so an entity mutated
//!    while the batch was in flight stays pending.

use crate::error::Result;
use crate::transport::{SyncTransport, TransportError};
use core_runtime::events::{CoreEvent, EventBus, SyncEvent};
use core_store::{EntityKind, LocalStore, UnsyncedBatch};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

/// Sync engine tuning knobs
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Maximum transmission attempts per batch before it is abandoned
    pub max_retries: u32,

    /// Base delay for exponential backoff between attempts
    pub backoff_base: Duration,

    /// Maximum number of entities (lists + cards) per batch
    pub max_batch_size: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_base: Duration::from_millis(1000),
            max_batch_size: 50,
        }
    }
}

/// Engine state, doubling as the single-flight gate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// No cycle in flight
    Idle,
    /// A batch is being assembled or transmitted
    Syncing,
    /// Waiting out the delay before retry number `n` of the current batch
    Backoff(u32),
}

/// What a [`SyncEngine::sync_now`] invocation did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Another cycle was in flight; this trigger was dropped
    AlreadyRunning,
    /// No entities were pending
    NothingToSync,
    /// The batch was acknowledged; `synced` entities were marked
    Completed { synced: usize },
    /// Connectivity loss; the cycle ended without consuming a retry
    Deferred,
    /// Retry budget exhausted; the batch stays pending for a later cycle
    Abandoned { attempts: u32 },
}

/// The offline-first synchronization engine.
///
/// One instance is constructed by the application root and shared (via `Arc`)
/// with whatever needs to trigger or observe it. At most one batch is in
/// flight per instance at any time.
pub struct SyncEngine {
    config: SyncConfig,
    store: Arc<dyn LocalStore>,
    transport: Arc<dyn SyncTransport>,
    event_bus: Arc<EventBus>,
    state: Mutex<EngineState>,
}

impl SyncEngine {
    pub fn new(
        config: SyncConfig,
        store: Arc<dyn LocalStore>,
        transport: Arc<dyn SyncTransport>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            config,
            store,
            transport,
            event_bus,
            state: Mutex::new(EngineState::Idle),
        }
    }

    /// Current engine state
    pub async fn state(&self) -> EngineState {
        *self.state.lock().await
    }

    /// Run one sync cycle, unless one is already in flight.
    ///
    /// Triggers arriving while the engine is not idle are dropped rather
    /// than queued; whatever is pending then is picked up by the next
    /// idle-triggering event.
    ///
    /// # Errors
    ///
    /// Returns a store error if the snapshot read or a mark-synced write
    /// fails. Transport failures are not errors here; they are absorbed into
    /// the outcome per the retry policy.
    #[instrument(skip(self))]
    pub async fn sync_now(&self) -> Result<SyncOutcome> {
        if !self.try_begin().await {
            debug!("Sync already in flight, dropping trigger");
            return Ok(SyncOutcome::AlreadyRunning);
        }

        let outcome = self.run_cycle().await;
        self.set_state(EngineState::Idle).await;

        match &outcome {
            Ok(outcome) => debug!(?outcome, "Sync cycle finished"),
            Err(error) => warn!(%error, "Sync cycle failed"),
        }

        outcome
    }

    /// Single-flight gate: move Idle → Syncing, or report the engine busy.
    async fn try_begin(&self) -> bool {
        let mut state = self.state.lock().await;
        if *state == EngineState::Idle {
            *state = EngineState::Syncing;
            true
        } else {
            false
        }
    }

    async fn set_state(&self, next: EngineState) {
        *self.state.lock().await = next;
    }

    async fn run_cycle(&self) -> Result<SyncOutcome> {
        let batch = truncate_batch(self.store.get_unsynced().await?, self.config.max_batch_size);

        if batch.is_empty() {
            debug!("Nothing pending, sync cycle is a no-op");
            return Ok(SyncOutcome::NothingToSync);
        }

        // The snapshot this cycle acknowledges against: `updated_at` captured
        // at assembly time, not whatever the entities hold by the time the
        // server responds.
        let snapshot: Vec<(EntityKind, String, i64)> = batch
            .lists
            .iter()
            .map(|list| (EntityKind::List, list.id.as_str(), list.updated_at))
            .chain(
                batch
                    .cards
                    .iter()
                    .map(|card| (EntityKind::Card, card.id.as_str(), card.updated_at)),
            )
            .collect();

        info!(
            lists = batch.lists.len(),
            cards = batch.cards.len(),
            "Transmitting sync batch"
        );
        self.emit(SyncEvent::Started {
            lists: batch.lists.len(),
            cards: batch.cards.len(),
        });

        let mut attempts: u32 = 0;
        loop {
            attempts += 1;
            eprintln!("DBG loop attempt {}", attempts);

            match self.transport.push_batch(&batch).await {
                Ok(()) => {
                    eprintln!("DBG push Ok, marking synced");
                    let mut synced = 0usize;
                    for (kind, id, observed_updated_at) in &snapshot {
                        eprintln!("DBG mark_synced {:?} {}", kind, id);
                        if self
                            .store
                            .mark_synced(*kind, id, *observed_updated_at)
                            .await?
                        {
                            synced += 1;
                        }
                    }

                    eprintln!("DBG all marks done, synced={}", synced);
                    info!(synced, batch = snapshot.len(), "Sync batch acknowledged");
                    self.emit(SyncEvent::Completed { synced });
                    return Ok(SyncOutcome::Completed { synced });
                }

                Err(TransportError::Connectivity(reason)) => {
                    // No retry counter movement: resume on reconnect or tick
                    debug!(%reason, "Connectivity loss during sync, deferring");
                    self.emit(SyncEvent::Deferred { reason });
                    return Ok(SyncOutcome::Deferred);
                }

                Err(TransportError::Application(message)) => {
                    if attempts >= self.config.max_retries {
                        warn!(attempts, %message, "Sync batch abandoned after retries");
                        self.emit(SyncEvent::Abandoned { attempts, message });
                        return Ok(SyncOutcome::Abandoned { attempts });
                    }

                    let delay = self.config.backoff_base * 2u32.pow(attempts - 1);
                    debug!(
                        attempt = attempts,
                        delay_ms = delay.as_millis() as u64,
                        %message,
                        "Application failure, backing off before resending the batch"
                    );

                    self.set_state(EngineState::Backoff(attempts)).await;
                    tokio::time::sleep(delay).await;
                    self.set_state(EngineState::Syncing).await;
                    // Loop around and resend the same batch, not a fresh snapshot
                }
            }
        }
    }

    fn emit(&self, event: SyncEvent) {
        self.event_bus.emit(CoreEvent::Sync(event)).ok();
    }
}

/// Cap a batch at `max` entities, lists first.
///
/// Lists go first because cards reference them; a card whose list has never
/// reached the server would be rejected by strict backends. The remainder
/// stays pending and is picked up by subsequent cycles.
fn truncate_batch(mut batch: UnsyncedBatch, max: usize) -> UnsyncedBatch {
    if batch.len() <= max {
        return batch;
    }

    if batch.lists.len() >= max {
        batch.lists.truncate(max);
        batch.cards.clear();
    } else {
        let room = max - batch.lists.len();
        batch.cards.truncate(room);
    }

    batch
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_store::{TodoCard, TodoList};

    fn batch_of(lists: usize, cards: usize) -> UnsyncedBatch {
        let mut batch = UnsyncedBatch::default();
        for i in 0..lists {
            batch
                .lists
                .push(TodoList::new(format!("List {}", i)).unwrap());
        }
        let list_id = batch
            .lists
            .first()
            .map(|l| l.id)
            .unwrap_or_else(core_store::ListId::new);
        for i in 0..cards {
            batch
                .cards
                .push(TodoCard::new(list_id, format!("Card {}", i)).unwrap());
        }
        batch
    }

    #[test]
    fn test_config_defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.backoff_base, Duration::from_millis(1000));
        assert_eq!(config.max_batch_size, 50);
    }

    #[test]
    fn test_truncate_noop_when_under_limit() {
        let batch = truncate_batch(batch_of(2, 3), 50);
        assert_eq!(batch.len(), 5);
    }

    #[test]
    fn test_truncate_prefers_lists() {
        let batch = truncate_batch(batch_of(3, 10), 5);
        assert_eq!(batch.lists.len(), 3);
        assert_eq!(batch.cards.len(), 2);

        let lists_only = truncate_batch(batch_of(10, 10), 5);
        assert_eq!(lists_only.lists.len(), 5);
        assert!(lists_only.cards.is_empty());
    }
}
