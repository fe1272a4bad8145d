//! # Sync Scheduler
//!
//! Decides *when* to invoke the sync engine.
//!
//! ## Overview
//!
//! Two background tasks share one engine:
//!
//! - A periodic ticker (default every 30 s) that triggers a cycle when the
//!   device is online. Missed ticks are skipped, not replayed.
//! - A reconnect listener over the network monitor's change stream that
//!   triggers an immediate cycle on the Offline→Online transition and mirrors
//!   both transitions onto the event bus.
//!
//! Both paths delegate single-flight enforcement to the engine: simultaneous
//! triggers produce exactly one outbound batch, the loser is dropped.
//!
//! Teardown via [`SyncScheduler::shutdown`] stops future invocations only.
//! Cycles are spawned as detached tasks, so work already dispatched runs to
//! completion and its result is still applied through the shared engine.

use crate::engine::SyncEngine;
use crate::error::Result;
use bridge_traits::{NetworkMonitor, NetworkStatus};
use core_runtime::events::{CoreEvent, EventBus, NetworkEvent};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Drives the sync engine on a timer and on reconnect events
pub struct SyncScheduler {
    ticker: JoinHandle<()>,
    reconnect: JoinHandle<()>,
}

impl SyncScheduler {
    /// Start the scheduler tasks.
    ///
    /// # Errors
    ///
    /// Returns a bridge error if the network monitor's change stream cannot
    /// be subscribed.
    pub async fn start(
        engine: Arc<SyncEngine>,
        monitor: Arc<dyn NetworkMonitor>,
        event_bus: Arc<EventBus>,
        sync_interval: Duration,
    ) -> Result<Self> {
        let mut changes = monitor.subscribe_changes().await?;

        let ticker = {
            let engine = engine.clone();
            let monitor = monitor.clone();

            tokio::spawn(async move {
                let mut interval = tokio::time::interval(sync_interval);
                interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
                // tokio intervals fire immediately; swallow that first tick so
                // cycles start one interval after startup, like the original
                // scheduling contract
                interval.tick().await;

                loop {
                    interval.tick().await;

                    if !monitor.is_connected().await {
                        debug!("Scheduled tick skipped while offline");
                        continue;
                    }

                    spawn_cycle(&engine, "tick");
                }
            })
        };

        let reconnect = {
            let engine = engine.clone();
            let event_bus = event_bus.clone();

            tokio::spawn(async move {
                while let Some(status) = changes.next().await {
                    match status {
                        NetworkStatus::Connected => {
                            info!("Connectivity restored, triggering immediate sync");
                            event_bus.emit(CoreEvent::Network(NetworkEvent::Online)).ok();
                            spawn_cycle(&engine, "reconnect");
                        }
                        NetworkStatus::Disconnected | NetworkStatus::Indeterminate => {
                            debug!(?status, "Connectivity lost");
                            event_bus
                                .emit(CoreEvent::Network(NetworkEvent::Offline))
                                .ok();
                        }
                    }
                }

                debug!("Network change stream closed");
            })
        };

        Ok(Self { ticker, reconnect })
    }

    /// Cancel the timer and the reconnect subscription.
    ///
    /// Idempotent. Does not cancel an in-flight network call; a cycle already
    /// dispatched completes (or fails) asynchronously.
    pub fn shutdown(&self) {
        self.ticker.abort();
        self.reconnect.abort();
    }
}

impl Drop for SyncScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Fire a cycle without tying its lifetime to the scheduler task.
fn spawn_cycle(engine: &Arc<SyncEngine>, trigger: &'static str) {
    let engine = engine.clone();

    tokio::spawn(async move {
        if let Err(error) = engine.sync_now().await {
            warn!(trigger, %error, "Sync cycle error");
        }
    });
}
