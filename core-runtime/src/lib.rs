//! # Core Runtime
//!
//! Shared runtime infrastructure for the Todo Platform Core: configuration,
//! the event bus, and logging setup.
//!
//! ## Overview
//!
//! - **Configuration** (`config`): builder-constructed [`CoreConfig`] with
//!   fail-fast validation and desktop defaults for bridge capabilities
//! - **Events** (`events`): typed broadcast [`EventBus`](events::EventBus)
//!   connecting the sync engine and scheduler to observers
//! - **Logging** (`logging`): `tracing-subscriber` initialization with
//!   env-filter support and pretty/JSON/compact output

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use config::{CoreConfig, CoreConfigBuilder, StoreBackend};
pub use error::{Error, Result};
pub use events::{CoreEvent, EventBus, NetworkEvent, SyncEvent};
pub use logging::{init_logging, LogFormat, LoggingConfig};
