//! In-memory entity caches
//!
//! Each cached entity sits behind its own `tokio::sync::RwLock`, giving one
//! writer at a time per identity. Operations hold the write lock from mutation
//! until the save has been issued, so two local mutations of one entity never
//! interleave.

use crate::model::{Group, Track, User};
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Entities with a stable cache key
pub trait Identified: Clone + Send + Sync + 'static {
    type Id: Clone + Eq + Hash + Ord + fmt::Display + Send + Sync + 'static;

    fn id(&self) -> Self::Id;
}

impl Identified for User {
    type Id = Uuid;

    fn id(&self) -> Uuid {
        self.uuid()
    }
}

impl Identified for Group {
    type Id = String;

    fn id(&self) -> String {
        self.name().to_string()
    }
}

impl Identified for Track {
    type Id = String;

    fn id(&self) -> String {
        self.name().to_string()
    }
}

/// Handle to one cached entity
pub type Shared<T> = Arc<RwLock<T>>;

pub struct EntityCache<T: Identified> {
    entries: RwLock<HashMap<T::Id, Shared<T>>>,
}

pub type UserManager = EntityCache<User>;
pub type GroupManager = EntityCache<Group>;
pub type TrackManager = EntityCache<Track>;

impl<T: Identified> Default for EntityCache<T> {
    fn default() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl<T: Identified> EntityCache<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, id: &T::Id) -> Option<Shared<T>> {
        self.entries.read().await.get(id).cloned()
    }

    pub async fn contains(&self, id: &T::Id) -> bool {
        self.entries.read().await.contains_key(id)
    }

    /// Cache an entity loaded after a cache miss
    ///
    /// If another task cached the same entity in the meantime its handle wins
    /// and `entity` is dropped, since that handle may already carry
    /// mutations newer than the copy that was loaded.
    pub async fn get_or_insert(&self, entity: T) -> Shared<T> {
        self.entries
            .write()
            .await
            .entry(entity.id())
            .or_insert_with(|| Arc::new(RwLock::new(entity)))
            .clone()
    }

    /// Cache a freshly loaded entity
    ///
    /// An existing handle is updated in place, so callers already holding it
    /// observe the new state.
    pub async fn insert_or_replace(&self, entity: T) -> Shared<T> {
        let id = entity.id();
        let existing = {
            let mut entries = self.entries.write().await;
            match entries.get(&id) {
                Some(shared) => shared.clone(),
                None => {
                    let shared = Arc::new(RwLock::new(entity));
                    entries.insert(id, shared.clone());
                    return shared;
                }
            }
        };
        // the map lock is released before waiting on the entity
        *existing.write().await = entity;
        existing
    }

    pub async fn remove(&self, id: &T::Id) -> Option<Shared<T>> {
        self.entries.write().await.remove(id)
    }

    /// Cached ids, sorted
    pub async fn ids(&self) -> Vec<T::Id> {
        let mut ids: Vec<T::Id> = self.entries.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub async fn handles(&self) -> Vec<Shared<T>> {
        self.entries.read().await.values().cloned().collect()
    }

    /// Point-in-time copies of every cached entity
    pub async fn snapshot(&self) -> Vec<T> {
        let mut entities = Vec::new();
        for handle in self.handles().await {
            entities.push(handle.read().await.clone());
        }
        entities
    }

    /// Replace the whole cache with `entities`
    pub async fn replace_all(&self, entities: Vec<T>) {
        let mut ids = Vec::with_capacity(entities.len());
        for entity in entities {
            ids.push(entity.id());
            self.insert_or_replace(entity).await;
        }
        self.entries.write().await.retain(|id, _| ids.contains(id));
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

impl EntityCache<Group> {
    /// Groups keyed by name, as the resolver consumes them
    pub async fn resolution_view(&self) -> HashMap<String, Group> {
        self.snapshot()
            .await
            .into_iter()
            .map(|group| (group.name().to_string(), group))
            .collect()
    }
}
