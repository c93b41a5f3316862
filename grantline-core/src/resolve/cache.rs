//! Cache of resolved permission views.
//!
//! Readers get the last computed snapshot (an `Arc`) and may keep using it
//! while the entity is mutated; mutations and reloads invalidate entries so
//! the next lookup recomputes.
//!
//! Every invalidation bumps a generation counter. A view is only stored when
//! no invalidation happened since the caller read the generation, so a view
//! computed from state that was replaced mid-resolution is never cached.

use super::context::QueryContext;
use super::resolved::ResolvedPermissions;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use uuid::Uuid;

#[derive(Debug, Default)]
pub struct ResolvedCache {
    entries: RwLock<HashMap<(Uuid, QueryContext), Arc<ResolvedPermissions>>>,
    generation: AtomicU64,
}

impl ResolvedCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, user: Uuid, query: &QueryContext) -> Option<Arc<ResolvedPermissions>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(user, query.clone()))
            .cloned()
    }

    /// Current generation; read it before gathering the inputs of a view
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Cache `resolved` if nothing was invalidated since `generation`.
    /// The view is returned either way.
    pub fn insert(
        &self,
        user: Uuid,
        query: QueryContext,
        resolved: ResolvedPermissions,
        generation: u64,
    ) -> Arc<ResolvedPermissions> {
        let resolved = Arc::new(resolved);
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        // invalidations bump the counter under this lock
        if self.generation() == generation {
            entries.insert((user, query), resolved.clone());
        }
        resolved
    }

    /// Drop every cached view of one user
    pub fn invalidate_user(&self, user: Uuid) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        self.generation.fetch_add(1, Ordering::SeqCst);
        entries.retain(|(uuid, _), _| *uuid != user);
    }

    /// Drop everything (group changes can affect any user)
    pub fn invalidate_all(&self) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        self.generation.fetch_add(1, Ordering::SeqCst);
        entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
