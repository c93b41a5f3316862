//! Resolution engine
//!
//! Computes a holder's effective permissions from its own nodes and the nodes
//! of every group it inherits from, filtered by context and expiry.
//!
//! ## Priority
//!
//! 1. The holder's own nodes
//! 2. Groups in breadth-first order of reference; the first value seen for a
//!    permission wins
//! 3. Within one holder, context-scoped nodes win over unscoped ones
//!
//! A membership node that resolves to `false` at higher priority blocks
//! inheritance from that group.

pub mod cache;
pub mod context;
pub mod engine;
pub mod registry;
pub mod resolved;

pub use cache::ResolvedCache;
pub use context::{QueryContext, ResolutionOptions};
pub use engine::{GroupSource, Resolver};
pub use registry::PermissionRegistry;
pub use resolved::{ResolvedPermissions, Tristate};
