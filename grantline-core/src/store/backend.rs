//! Storage backend trait
//!
//! Backends store opaque JSON records under an `EntityKey`. They know nothing
//! about entities, ordering or timeouts; the gateway layers those on top.

use super::errors::StoreResult;
use async_trait::async_trait;
use std::fmt;

/// Record families kept by a backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKind {
    User,
    /// Lowercased user name to UUID index
    UserName,
    Group,
    Track,
}

impl EntityKind {
    pub const ALL: [EntityKind; 4] = [
        EntityKind::User,
        EntityKind::UserName,
        EntityKind::Group,
        EntityKind::Track,
    ];

    /// Directory / namespace name
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::User => "users",
            EntityKind::UserName => "usernames",
            EntityKind::Group => "groups",
            EntityKind::Track => "tracks",
        }
    }
}

/// Address of a single stored record
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityKey {
    pub kind: EntityKind,
    pub id: String,
}

impl EntityKey {
    pub fn new(kind: EntityKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }

    pub fn user(uuid: uuid::Uuid) -> Self {
        Self::new(EntityKind::User, uuid.to_string())
    }

    pub fn user_name(name: &str) -> Self {
        Self::new(EntityKind::UserName, name.to_lowercase())
    }

    pub fn group(name: &str) -> Self {
        Self::new(EntityKind::Group, name.to_lowercase())
    }

    pub fn track(name: &str) -> Self {
        Self::new(EntityKind::Track, name.to_lowercase())
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind.as_str(), self.id)
    }
}

/// Persistence backend for serialized entity records
///
/// Implementations must replace records atomically: a reader sees either the
/// previous record or the new one, never a partial write.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Read a record; `Ok(None)` when it does not exist
    async fn read(&self, key: &EntityKey) -> StoreResult<Option<Vec<u8>>>;

    /// Create or replace a record
    async fn write(&self, key: &EntityKey, data: Vec<u8>) -> StoreResult<()>;

    /// Delete a record, returning whether it existed
    async fn remove(&self, key: &EntityKey) -> StoreResult<bool>;

    /// Ids of every record of `kind`, sorted
    async fn list(&self, kind: EntityKind) -> StoreResult<Vec<String>>;
}
