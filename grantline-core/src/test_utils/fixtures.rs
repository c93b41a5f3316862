//! Engines and entity ladders for tests

use crate::config::{Config, MessagingKind, StorageBackendKind};
use crate::engine::Engine;
use crate::ops::{AllowAll, CollectingSink, CommandResult, Operations, Sender};
use crate::propagation::LocalBus;
use crate::store::MemoryBackend;
use std::sync::Arc;
use std::time::Duration;

/// Groups of the `staff` ladder, lowest first
pub const STAFF_LADDER: [&str; 3] = ["helper", "mod", "admin"];

/// In-memory config with a short store timeout
pub fn memory_config() -> Config {
    let mut config = Config::default();
    config.store.backend = StorageBackendKind::Memory;
    config.store.operation_timeout = Duration::from_secs(2);
    config.propagation.messaging_service = MessagingKind::Local;
    config
}

/// An engine plus an operations handle that records every message
pub struct TestNode {
    pub engine: Engine,
    pub ops: Operations,
    pub sink: Arc<CollectingSink>,
}

impl TestNode {
    /// Start a node over a shared backend and bus
    pub async fn start(backend: &MemoryBackend, bus: &LocalBus) -> Self {
        Self::start_with(memory_config(), backend, bus).await
    }

    pub async fn start_with(config: Config, backend: &MemoryBackend, bus: &LocalBus) -> Self {
        let engine = Engine::start(config, Arc::new(backend.clone()), Arc::new(bus.clone()))
            .await
            .expect("engine starts");
        let sink = Arc::new(CollectingSink::new());
        let ops = engine.operations(Arc::new(AllowAll), sink.clone());
        Self { engine, ops, sink }
    }

    /// Start a node with its own backend and bus
    pub async fn standalone() -> Self {
        Self::start(&MemoryBackend::new(), &LocalBus::new(64)).await
    }

    pub fn console(&self) -> Sender {
        Sender::console()
    }

    /// Create the staff groups and the `staff` track holding them in order
    pub async fn staff_ladder(&self) {
        let console = Sender::console();
        for group in STAFF_LADDER {
            assert_eq!(
                self.ops.create_group(&console, group).await,
                CommandResult::Success
            );
        }
        assert_eq!(
            self.ops.create_track(&console, "staff").await,
            CommandResult::Success
        );
        for group in STAFF_LADDER {
            assert_eq!(
                self.ops.track_append(&console, "staff", group).await,
                CommandResult::Success
            );
        }
        self.sink.take();
    }
}
