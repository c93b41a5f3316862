//! Grantline core
//!
//! Permission holders (users and groups), promotion tracks, inheritance-aware
//! resolution, an async store gateway and cluster update propagation.

pub mod config;
pub mod engine;
pub mod logging;
pub mod manager;
pub mod metrics;
pub mod model;
pub mod ops;
pub mod propagation;
pub mod resolve;
pub mod store;
pub mod tracks;

#[doc(hidden)]
pub mod test_utils;

pub use config::Config;
pub use engine::{Engine, EngineError, EngineState};
pub use logging::{init_logging, LogLevel};
pub use model::{Group, Node, PermissionHolder, Track, User};
pub use ops::{CommandResult, Message, MessageSink, Operations, Sender};
pub use resolve::{QueryContext, Tristate};
