//! Cluster update propagation
//!
//! After a successful mutation the operations layer calls
//! `UpdatePropagator::run_update_task`; every other node's `UpdateListener`
//! reloads the affected entities. Reloads are idempotent, so duplicate or
//! reordered signals only cost an extra load.

mod error;
mod listener;
mod messaging;
mod propagator;
mod signal;

pub use error::PropagationError;
pub use listener::{Reloader, UpdateListener};
pub use messaging::{messaging_from_config, LocalBus, MessagingService, NoopMessaging};
pub use propagator::UpdatePropagator;
pub use signal::{UpdateScope, UpdateSignal};
