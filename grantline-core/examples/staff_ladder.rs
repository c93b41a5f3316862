//! Walk a user up and down a promotion track on an in-memory node
//!
//! Run with:
//! ```bash
//! cargo run --example staff_ladder
//! ```

use grantline_core::config::{Config, StorageBackendKind};
use grantline_core::logging::{init_logging_with_config, LogConfig, LogLevel};
use grantline_core::ops::{AllowAll, Sender, TracingSink};
use grantline_core::Engine;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging_with_config(LogConfig::new(LogLevel::Debug))?;

    let mut config = Config::default();
    config.store.backend = StorageBackendKind::Memory;
    let engine = Engine::from_config(config).await?;
    let ops = engine.operations(Arc::new(AllowAll), Arc::new(TracingSink));
    let console = Sender::console();

    for group in ["helper", "mod", "admin"] {
        ops.create_group(&console, group).await;
    }
    ops.create_track(&console, "staff").await;
    for group in ["helper", "mod", "admin"] {
        ops.track_append(&console, "staff", group).await;
    }
    ops.group_set_permission(&console, "mod", "chat.mute", true, None)
        .await;

    let uuid = Uuid::new_v4();
    engine.login(uuid, "Luck").await;

    for _ in 0..2 {
        ops.promote(&console, "Luck", "staff", None).await;
    }
    info!(result = %engine.check(uuid, "chat.mute").await, "Moderator can mute");

    ops.demote(&console, "Luck", "staff", None).await;
    info!(result = %engine.check(uuid, "chat.mute").await, "Helper can mute");

    engine.shutdown().await;
    Ok(())
}
