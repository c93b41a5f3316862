//! Asynchronous store gateway
//!
//! `Datastore` is the only way entities reach persistence. Backends implement
//! `StorageBackend` over raw records; the gateway adds (de)serialization,
//! timeouts, per-key write ordering, expiry pruning and outcome reporting.

mod backend;
mod errors;
mod file;
mod gateway;
mod memory;
mod outcome;
mod sequencer;

pub use backend::{EntityKey, EntityKind, StorageBackend};
pub use errors::{StoreError, StoreResult};
pub use file::FileBackend;
pub use gateway::{backend_from_config, Datastore, Pending, StoredEntity};
pub use memory::MemoryBackend;
pub use outcome::{Completion, LoadOutcome, WriteOutcome};
