/*
    gateway.rs - Asynchronous store gateway

    Every operation is scheduled on the runtime the gateway was created on
    and returns a `Pending` handle immediately. The handle completes exactly
    once, either by awaiting it or through `Pending::then`.

    Saves serialize the entity when they are issued, not when they run, and
    take a per-key ticket at the same moment. Together with the write
    sequencer this guarantees that a save issued later is never overwritten
    by one issued earlier.

    A backend write that exceeds the operation timeout is reported as
    `Timeout`, but it is not cancelled: it keeps its key's slot until it
    settles, so it may still land, though never after a later write. A
    timed-out write is therefore indeterminate.
*/

use super::backend::{EntityKey, EntityKind, StorageBackend};
use super::errors::{StoreError, StoreResult};
use super::file::FileBackend;
use super::memory::MemoryBackend;
use super::outcome::{Completion, LoadOutcome, WriteOutcome};
use super::sequencer::{Sequenced, Ticket, WriteSequencer};
use crate::config::{StorageBackendKind, StoreConfig};
use crate::metrics::{
    Timer, STORE_DELETE, STORE_DURATION, STORE_FAILED, STORE_LOAD, STORE_SAVE, STORE_SUPERSEDED,
};
use crate::model::{Group, PermissionHolder, Timestamp, Track, User};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

/// Build the backend named by the store configuration
pub fn backend_from_config(config: &StoreConfig) -> StoreResult<Arc<dyn StorageBackend>> {
    Ok(match config.backend {
        StorageBackendKind::Memory => Arc::new(MemoryBackend::new()),
        StorageBackendKind::File => Arc::new(FileBackend::new(&config.data_dir)?),
    })
}

/// Handle to a scheduled store operation
///
/// Resolves to the operation's outcome. If the task is dropped before
/// reporting, resolves to the `Abandoned` failure instead of hanging.
#[must_use = "store operations report their outcome through the pending handle"]
pub struct Pending<T> {
    rx: oneshot::Receiver<T>,
    runtime: Handle,
}

impl<T: Completion> Future for Pending<T> {
    type Output = T;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<T> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|result| result.unwrap_or_else(|_| T::abandoned()))
    }
}

impl<T: Completion + Send + 'static> Pending<T> {
    /// Run `callback` with the outcome on a runtime worker
    pub fn then<F>(self, callback: F) -> JoinHandle<()>
    where
        F: FnOnce(T) + Send + 'static,
    {
        let runtime = self.runtime.clone();
        runtime.spawn(async move { callback(self.await) })
    }
}

/// Entities the gateway knows how to persist
pub trait StoredEntity: Serialize + DeserializeOwned + Send + 'static {
    fn store_key(&self) -> EntityKey;

    /// Drop expired state after loading; returns whether anything changed
    fn prune(&mut self, _now: Timestamp) -> bool {
        false
    }

    fn mark_persisted(&mut self);
}

impl StoredEntity for User {
    fn store_key(&self) -> EntityKey {
        EntityKey::user(self.uuid())
    }

    fn prune(&mut self, now: Timestamp) -> bool {
        !self.prune_expired(now).is_empty()
    }

    fn mark_persisted(&mut self) {
        self.mark_clean();
    }
}

impl StoredEntity for Group {
    fn store_key(&self) -> EntityKey {
        EntityKey::group(self.name())
    }

    fn prune(&mut self, now: Timestamp) -> bool {
        !self.prune_expired(now).is_empty()
    }

    fn mark_persisted(&mut self) {
        self.mark_clean();
    }
}

impl StoredEntity for Track {
    fn store_key(&self) -> EntityKey {
        EntityKey::track(self.name())
    }

    fn mark_persisted(&mut self) {
        self.mark_clean();
    }
}

struct Inner {
    backend: Arc<dyn StorageBackend>,
    timeout: Duration,
    sequencer: WriteSequencer,
}

/// The sole persistence boundary for users, groups and tracks
#[derive(Clone)]
pub struct Datastore {
    inner: Arc<Inner>,
    runtime: Handle,
}

impl Datastore {
    /// Create a gateway over `backend`. Must be called from within a tokio runtime.
    pub fn new(backend: Arc<dyn StorageBackend>, timeout: Duration) -> StoreResult<Self> {
        let runtime = Handle::try_current().map_err(|e| StoreError::Runtime(e.to_string()))?;
        Ok(Self {
            inner: Arc::new(Inner {
                backend,
                timeout,
                sequencer: WriteSequencer::default(),
            }),
            runtime,
        })
    }

    /// Build the configured backend and a gateway over it
    pub fn from_config(config: &StoreConfig) -> StoreResult<Self> {
        Self::new(backend_from_config(config)?, config.operation_timeout)
    }

    pub fn backend_name(&self) -> &'static str {
        self.inner.backend.name()
    }

    fn spawn<T, Fut>(&self, task: Fut) -> Pending<T>
    where
        T: Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.runtime.spawn(async move {
            // the caller may have dropped the handle; nothing to report to
            let _ = tx.send(task.await);
        });
        Pending {
            rx,
            runtime: self.runtime.clone(),
        }
    }

    fn ready<T: Send + 'static>(&self, value: T) -> Pending<T> {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(value);
        Pending {
            rx,
            runtime: self.runtime.clone(),
        }
    }

    // -- users --

    pub fn load_user(&self, uuid: Uuid) -> Pending<LoadOutcome<User>> {
        let inner = self.inner.clone();
        self.spawn(async move {
            inner
                .load_entity(EntityKey::user(uuid), |user: &User| user.uuid() == uuid)
                .await
        })
    }

    /// Load a user, creating it as a member of `default_group` if absent.
    /// A changed display name is recorded and saved.
    pub fn create_and_load_user(
        &self,
        uuid: Uuid,
        name: &str,
        default_group: &str,
    ) -> Pending<LoadOutcome<User>> {
        let inner = self.inner.clone();
        let name = name.to_string();
        let default_group = default_group.to_string();
        self.spawn(async move {
            let key = EntityKey::user(uuid);
            let mut user = match inner.load_entity(key, |user: &User| user.uuid() == uuid).await {
                LoadOutcome::Found(user) => user,
                LoadOutcome::NotFound => {
                    debug!(%uuid, %name, "Creating user");
                    User::new(uuid, name.clone(), &default_group)
                }
                LoadOutcome::Failed(err) => return LoadOutcome::Failed(err),
            };
            user.set_name(name);

            if user.is_dirty() {
                let write = match inner.prepare_user_save(&user) {
                    Ok(write) => write,
                    Err(err) => return LoadOutcome::Failed(err),
                };
                if let WriteOutcome::Failed(err) = inner.apply_user_save(write).await {
                    return LoadOutcome::Failed(err);
                }
                user.mark_clean();
            }
            LoadOutcome::Found(user)
        })
    }

    /// Resolve a user name through the name index
    pub fn lookup_user(&self, name: &str) -> Pending<LoadOutcome<Uuid>> {
        let inner = self.inner.clone();
        let key = EntityKey::user_name(name);
        self.spawn(async move { inner.read_record::<Uuid>(&key).await })
    }

    pub fn save_user(&self, user: &User) -> Pending<WriteOutcome> {
        match self.inner.prepare_user_save(user) {
            Ok(write) => {
                let inner = self.inner.clone();
                self.spawn(async move { inner.apply_user_save(write).await })
            }
            Err(err) => self.ready(WriteOutcome::Failed(err)),
        }
    }

    pub fn delete_user(&self, user: &User) -> Pending<WriteOutcome> {
        let ticket = self.inner.sequencer.ticket(EntityKey::user(user.uuid()));
        let index = self.inner.sequencer.ticket(EntityKey::user_name(user.name()));
        let inner = self.inner.clone();
        self.spawn(async move {
            let outcome = inner.remove_record(ticket).await;
            if outcome.is_success() {
                if let WriteOutcome::Failed(err) = inner.remove_record(index).await {
                    warn!(error = %err, "Failed to remove user name index entry");
                }
            }
            outcome
        })
    }

    pub fn list_user_ids(&self) -> Pending<StoreResult<Vec<Uuid>>> {
        let inner = self.inner.clone();
        self.spawn(async move {
            let ids = inner.list_ids(EntityKind::User).await?;
            Ok(ids.iter().filter_map(|id| id.parse().ok()).collect())
        })
    }

    // -- groups --

    pub fn load_group(&self, name: &str) -> Pending<LoadOutcome<Group>> {
        let inner = self.inner.clone();
        let name = name.to_lowercase();
        self.spawn(async move {
            let key = EntityKey::group(&name);
            inner.load_entity(key, |group: &Group| group.name() == name).await
        })
    }

    /// Load a group, creating and persisting an empty one if absent
    pub fn create_and_load_group(&self, name: &str) -> Pending<LoadOutcome<Group>> {
        let inner = self.inner.clone();
        let name = name.to_lowercase();
        self.spawn(async move {
            let key = EntityKey::group(&name);
            match inner.load_entity(key, |group: &Group| group.name() == name).await {
                LoadOutcome::NotFound => match Group::new(&name) {
                    Ok(group) => inner.create_entity(group).await,
                    Err(err) => LoadOutcome::Failed(err.into()),
                },
                other => other,
            }
        })
    }

    pub fn save_group(&self, group: &Group) -> Pending<WriteOutcome> {
        self.save_entity(group)
    }

    pub fn delete_group(&self, name: &str) -> Pending<WriteOutcome> {
        self.delete_entity(EntityKey::group(name))
    }

    pub fn load_all_groups(&self) -> Pending<StoreResult<Vec<Group>>> {
        let inner = self.inner.clone();
        self.spawn(async move { inner.load_all(EntityKind::Group).await })
    }

    // -- tracks --

    pub fn load_track(&self, name: &str) -> Pending<LoadOutcome<Track>> {
        let inner = self.inner.clone();
        let name = name.to_lowercase();
        self.spawn(async move {
            let key = EntityKey::track(&name);
            inner.load_entity(key, |track: &Track| track.name() == name).await
        })
    }

    /// Load a track, creating and persisting an empty one if absent
    pub fn create_and_load_track(&self, name: &str) -> Pending<LoadOutcome<Track>> {
        let inner = self.inner.clone();
        let name = name.to_lowercase();
        self.spawn(async move {
            let key = EntityKey::track(&name);
            match inner.load_entity(key, |track: &Track| track.name() == name).await {
                LoadOutcome::NotFound => match Track::new(&name) {
                    Ok(track) => inner.create_entity(track).await,
                    Err(err) => LoadOutcome::Failed(err.into()),
                },
                other => other,
            }
        })
    }

    pub fn save_track(&self, track: &Track) -> Pending<WriteOutcome> {
        self.save_entity(track)
    }

    pub fn delete_track(&self, name: &str) -> Pending<WriteOutcome> {
        self.delete_entity(EntityKey::track(name))
    }

    pub fn load_all_tracks(&self) -> Pending<StoreResult<Vec<Track>>> {
        let inner = self.inner.clone();
        self.spawn(async move { inner.load_all(EntityKind::Track).await })
    }

    // -- generic --

    fn save_entity<E: StoredEntity>(&self, entity: &E) -> Pending<WriteOutcome> {
        match serde_json::to_vec_pretty(entity) {
            Ok(data) => {
                let ticket = self.inner.sequencer.ticket(entity.store_key());
                let inner = self.inner.clone();
                self.spawn(async move { inner.write_record(ticket, data).await })
            }
            Err(err) => self.ready(WriteOutcome::Failed(err.into())),
        }
    }

    fn delete_entity(&self, key: EntityKey) -> Pending<WriteOutcome> {
        let ticket = self.inner.sequencer.ticket(key);
        let inner = self.inner.clone();
        self.spawn(async move { inner.remove_record(ticket).await })
    }
}

/// A user save captured at issue time
struct UserWrite {
    uuid: Uuid,
    name: String,
    ticket: Ticket,
    data: Vec<u8>,
    index: Ticket,
    index_data: Vec<u8>,
}

impl Inner {
    async fn timed<T, Fut>(&self, operation: Fut) -> StoreResult<T>
    where
        Fut: Future<Output = StoreResult<T>>,
    {
        let timer = Timer::new(STORE_DURATION);
        let result = match tokio::time::timeout(self.timeout, operation).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout(self.timeout)),
        };
        timer.stop();
        result
    }

    async fn read_record<T: DeserializeOwned>(&self, key: &EntityKey) -> LoadOutcome<T> {
        ::metrics::counter!(STORE_LOAD, "kind" => key.kind.as_str()).increment(1);
        let result = self
            .timed(self.backend.read(key))
            .await
            .and_then(|data| match data {
                Some(bytes) => Ok(Some(serde_json::from_slice::<T>(&bytes)?)),
                None => Ok(None),
            });

        match result {
            Ok(Some(value)) => {
                debug!(%key, "Loaded record");
                LoadOutcome::Found(value)
            }
            Ok(None) => {
                debug!(%key, "Record not found");
                LoadOutcome::NotFound
            }
            Err(err) => {
                ::metrics::counter!(STORE_FAILED).increment(1);
                warn!(%key, error = %err, "Failed to load record");
                LoadOutcome::Failed(err)
            }
        }
    }

    async fn load_entity<E, F>(&self, key: EntityKey, belongs: F) -> LoadOutcome<E>
    where
        E: StoredEntity,
        F: FnOnce(&E) -> bool,
    {
        match self.read_record::<E>(&key).await {
            LoadOutcome::Found(mut entity) => {
                if !belongs(&entity) {
                    ::metrics::counter!(STORE_FAILED).increment(1);
                    warn!(%key, "Stored record belongs to a different entity");
                    return LoadOutcome::Failed(StoreError::Corrupted {
                        key: key.to_string(),
                        reason: "record does not match its key".to_string(),
                    });
                }
                if entity.prune(Timestamp::now()) {
                    // stays dirty so the next save persists the pruned set
                    debug!(%key, "Pruned expired nodes on load");
                }
                LoadOutcome::Found(entity)
            }
            other => other,
        }
    }

    async fn create_entity<E: StoredEntity>(self: &Arc<Self>, mut entity: E) -> LoadOutcome<E> {
        let key = entity.store_key();
        let data = match serde_json::to_vec_pretty(&entity) {
            Ok(data) => data,
            Err(err) => return LoadOutcome::Failed(err.into()),
        };
        let ticket = self.sequencer.ticket(key.clone());
        match self.write_record(ticket, data).await {
            WriteOutcome::Failed(err) => LoadOutcome::Failed(err),
            _ => {
                debug!(%key, "Created entity");
                entity.mark_persisted();
                LoadOutcome::Found(entity)
            }
        }
    }

    async fn write_record(self: &Arc<Self>, ticket: Ticket, data: Vec<u8>) -> WriteOutcome {
        let key = ticket.key().clone();
        ::metrics::counter!(STORE_SAVE, "kind" => key.kind.as_str()).increment(1);

        let backend = self.backend.clone();
        let target = key.clone();
        let sequenced = self
            .sequenced(ticket, async move { backend.write(&target, data).await })
            .await;

        self.finish_write(&key, sequenced, "save")
    }

    async fn remove_record(self: &Arc<Self>, ticket: Ticket) -> WriteOutcome {
        let key = ticket.key().clone();
        ::metrics::counter!(STORE_DELETE, "kind" => key.kind.as_str()).increment(1);

        let backend = self.backend.clone();
        let target = key.clone();
        let sequenced = self
            .sequenced(ticket, async move {
                if !backend.remove(&target).await? {
                    debug!(key = %target, "Deleted record did not exist");
                }
                Ok(())
            })
            .await;

        self.finish_write(&key, sequenced, "delete")
    }

    /// Run `write` in ticket order on its own task
    ///
    /// The caller waits at most the operation timeout for the backend call.
    /// The task keeps the key's slot until `write` settles either way.
    async fn sequenced<Fut>(self: &Arc<Self>, ticket: Ticket, write: Fut) -> Sequenced<WriteOutcome>
    where
        Fut: Future<Output = StoreResult<()>> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let inner = self.clone();
        tokio::spawn(async move {
            let timeout = inner.timeout;
            let mut report = Some(tx);
            let reporter = &mut report;
            let ran = inner
                .sequencer
                .run(ticket, || async move {
                    let timer = Timer::new(STORE_DURATION);
                    tokio::pin!(write);
                    let landed = match tokio::time::timeout(timeout, &mut write).await {
                        Ok(result) => {
                            let landed = result.is_ok();
                            let outcome = match result {
                                Ok(()) => WriteOutcome::Applied,
                                Err(err) => WriteOutcome::Failed(err),
                            };
                            if let Some(tx) = reporter.take() {
                                let _ = tx.send(Sequenced::Ran(outcome));
                            }
                            landed
                        }
                        Err(_) => {
                            if let Some(tx) = reporter.take() {
                                let _ = tx.send(Sequenced::Ran(WriteOutcome::Failed(
                                    StoreError::Timeout(timeout),
                                )));
                            }
                            let landed = write.await.is_ok();
                            debug!(landed, "Timed out write settled");
                            landed
                        }
                    };
                    timer.stop();
                    ((), landed)
                })
                .await;
            if let (Sequenced::Skipped, Some(tx)) = (ran, report.take()) {
                let _ = tx.send(Sequenced::Skipped);
            }
        });

        rx.await
            .unwrap_or_else(|_| Sequenced::Ran(WriteOutcome::abandoned()))
    }

    fn finish_write(
        &self,
        key: &EntityKey,
        sequenced: Sequenced<WriteOutcome>,
        operation: &'static str,
    ) -> WriteOutcome {
        match sequenced {
            Sequenced::Ran(WriteOutcome::Failed(err)) => {
                ::metrics::counter!(STORE_FAILED).increment(1);
                warn!(%key, operation, error = %err, "Store write failed");
                WriteOutcome::Failed(err)
            }
            Sequenced::Ran(outcome) => {
                debug!(%key, operation, "Store write applied");
                outcome
            }
            Sequenced::Skipped => {
                ::metrics::counter!(STORE_SUPERSEDED).increment(1);
                debug!(%key, operation, "Store write superseded by a later one");
                WriteOutcome::Superseded
            }
        }
    }

    fn prepare_user_save(&self, user: &User) -> StoreResult<UserWrite> {
        let data = serde_json::to_vec_pretty(user)?;
        let index_data = serde_json::to_vec(&user.uuid())?;
        Ok(UserWrite {
            uuid: user.uuid(),
            name: user.name().to_string(),
            ticket: self.sequencer.ticket(user.store_key()),
            data,
            index: self.sequencer.ticket(EntityKey::user_name(user.name())),
            index_data,
        })
    }

    async fn apply_user_save(self: &Arc<Self>, write: UserWrite) -> WriteOutcome {
        let key = write.ticket.key().clone();
        let previous = match self.read_record::<User>(&key).await {
            LoadOutcome::Found(stored) => Some(stored.name().to_string()),
            _ => None,
        };

        let outcome = self.write_record(write.ticket, write.data).await;
        if outcome.is_success() {
            if let WriteOutcome::Failed(err) = self.write_record(write.index, write.index_data).await
            {
                warn!(error = %err, "Failed to update user name index");
            }
            if let Some(previous) = previous.filter(|p| !p.eq_ignore_ascii_case(&write.name)) {
                self.release_user_name(write.uuid, &previous).await;
            }
        }
        outcome
    }

    /// Remove the index entry for a user's former name, unless another user
    /// has claimed the name since
    async fn release_user_name(self: &Arc<Self>, uuid: Uuid, name: &str) {
        let key = EntityKey::user_name(name);
        if let LoadOutcome::Found(owner) = self.read_record::<Uuid>(&key).await {
            if owner != uuid {
                return;
            }
            let ticket = self.sequencer.ticket(key);
            if let WriteOutcome::Failed(err) = self.remove_record(ticket).await {
                warn!(%uuid, name, error = %err, "Failed to remove former user name");
            } else {
                debug!(%uuid, name, "Released former user name");
            }
        }
    }

    async fn list_ids(&self, kind: EntityKind) -> StoreResult<Vec<String>> {
        self.timed(self.backend.list(kind)).await.map_err(|err| {
            ::metrics::counter!(STORE_FAILED).increment(1);
            warn!(kind = kind.as_str(), error = %err, "Failed to list records");
            err
        })
    }

    async fn load_all<E: StoredEntity>(&self, kind: EntityKind) -> StoreResult<Vec<E>> {
        let mut entities = Vec::new();
        for id in self.list_ids(kind).await? {
            let key = EntityKey::new(kind, id.clone());
            match self
                .load_entity(key, |entity: &E| entity.store_key().id == id)
                .await
            {
                LoadOutcome::Found(entity) => entities.push(entity),
                // deleted between listing and reading
                LoadOutcome::NotFound => {}
                LoadOutcome::Failed(err) => return Err(err),
            }
        }
        Ok(entities)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Node, NodeKey};

    fn memory_store() -> (MemoryBackend, Datastore) {
        let backend = MemoryBackend::new();
        let store = Datastore::new(Arc::new(backend.clone()), Duration::from_secs(5)).unwrap();
        (backend, store)
    }

    #[tokio::test]
    async fn test_load_missing_is_not_found() {
        let (_, store) = memory_store();
        assert!(matches!(store.load_group("admin").await, LoadOutcome::NotFound));
        assert!(matches!(
            store.load_user(Uuid::new_v4()).await,
            LoadOutcome::NotFound
        ));
    }

    #[tokio::test]
    async fn test_failure_is_distinct_from_not_found() {
        let (backend, store) = memory_store();
        backend.set_failing(true);
        assert!(matches!(
            store.load_track("staff").await,
            LoadOutcome::Failed(StoreError::Backend(_))
        ));

        let group = Group::new("admin").unwrap();
        assert!(!store.save_group(&group).await.is_success());
    }

    #[tokio::test]
    async fn test_save_and_load_group() {
        let (_, store) = memory_store();
        let mut group = Group::new("Admin").unwrap();
        group.set_node(Node::new("server.stop", true));

        assert!(matches!(store.save_group(&group).await, WriteOutcome::Applied));

        let loaded = store.load_group("ADMIN").await.found().unwrap();
        assert_eq!(loaded.name(), "admin");
        assert!(loaded.has_node(&NodeKey::new("server.stop", None)));
        assert!(!loaded.is_dirty());
    }

    #[tokio::test]
    async fn test_create_and_load_persists_once() {
        let (backend, store) = memory_store();

        let track = store.create_and_load_track("staff").await.found().unwrap();
        assert!(!track.is_dirty());
        assert_eq!(backend.count(EntityKind::Track).await, 1);

        let again = store.create_and_load_track("staff").await;
        assert!(again.is_found());
        assert_eq!(backend.count(EntityKind::Track).await, 1);
    }

    #[tokio::test]
    async fn test_create_and_load_user_maintains_name_index() {
        let (_, store) = memory_store();
        let uuid = Uuid::new_v4();

        let user = store
            .create_and_load_user(uuid, "Notch", "default")
            .await
            .found()
            .unwrap();
        assert_eq!(user.primary_group(), "default");
        assert!(!user.is_dirty());

        let found = store.lookup_user("notch").await.found();
        assert_eq!(found, Some(uuid));

        let renamed = store
            .create_and_load_user(uuid, "Jeb", "default")
            .await
            .found()
            .unwrap();
        assert_eq!(renamed.name(), "Jeb");
        assert_eq!(store.lookup_user("jeb").await.found(), Some(uuid));
        assert!(matches!(store.lookup_user("notch").await, LoadOutcome::NotFound));
    }

    #[tokio::test]
    async fn test_former_name_claimed_by_another_user_is_kept() {
        let (_, store) = memory_store();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();

        store.create_and_load_user(first, "Dinnerbone", "default").await.found().unwrap();
        store.create_and_load_user(second, "Dinnerbone", "default").await.found().unwrap();
        store.create_and_load_user(first, "Grumm", "default").await.found().unwrap();

        assert_eq!(store.lookup_user("dinnerbone").await.found(), Some(second));
        assert_eq!(store.lookup_user("grumm").await.found(), Some(first));
    }

    #[tokio::test]
    async fn test_expired_nodes_pruned_on_load() {
        let (_, store) = memory_store();
        let mut group = Group::new("vip").unwrap();
        group.set_node(Node::new("fly", true).with_expiry(Timestamp::from_secs(1)));
        group.set_node(Node::new("chat.color", true));
        store.save_group(&group).await.into_result().unwrap();

        let loaded = store.load_group("vip").await.found().unwrap();
        assert!(!loaded.has_node(&NodeKey::new("fly", None)));
        assert!(loaded.has_node(&NodeKey::new("chat.color", None)));
        assert!(loaded.is_dirty());
    }

    #[tokio::test]
    async fn test_delete_is_total() {
        let (_, store) = memory_store();
        let group = Group::new("temp").unwrap();
        store.save_group(&group).await.into_result().unwrap();

        assert!(store.delete_group("temp").await.is_success());
        assert!(matches!(store.load_group("temp").await, LoadOutcome::NotFound));
        // deleting again is not an error
        assert!(store.delete_group("temp").await.is_success());
    }

    #[tokio::test]
    async fn test_corrupted_record_is_failure() {
        let (backend, store) = memory_store();
        let data = serde_json::to_vec(&Group::new("other").unwrap()).unwrap();
        backend
            .write(&EntityKey::group("admin"), data)
            .await
            .unwrap();

        assert!(matches!(
            store.load_group("admin").await,
            LoadOutcome::Failed(StoreError::Corrupted { .. })
        ));
    }

    #[tokio::test]
    async fn test_then_delivers_outcome() {
        let (_, store) = memory_store();
        let (tx, rx) = oneshot::channel();

        store
            .load_group("missing")
            .then(move |outcome| {
                let _ = tx.send(matches!(outcome, LoadOutcome::NotFound));
            })
            .await
            .unwrap();

        assert!(rx.await.unwrap());
    }

    #[tokio::test]
    async fn test_later_save_wins_under_latency() {
        let (backend, store) = memory_store();
        backend.set_write_delay(Duration::from_millis(20));

        let mut group = Group::new("builders").unwrap();
        let mut pending = Vec::new();
        for i in 0..5 {
            group.set_node(Node::new(format!("build.{}", i), true));
            pending.push(store.save_group(&group));
        }
        for outcome in futures::future::join_all(pending).await {
            assert!(outcome.is_success());
        }

        let loaded = store.load_group("builders").await.found().unwrap();
        assert_eq!(loaded.nodes().len(), 5);
    }

    #[tokio::test]
    async fn test_operation_timeout() {
        let backend = MemoryBackend::new();
        backend.set_write_delay(Duration::from_millis(200));
        let store = Datastore::new(Arc::new(backend), Duration::from_millis(10)).unwrap();

        let outcome = store.save_track(&Track::new("slow").unwrap()).await;
        assert!(matches!(
            outcome,
            WriteOutcome::Failed(StoreError::Timeout(_))
        ));
    }

    /// Runs writes on a detached task, like file writes on the blocking pool,
    /// so dropping the write future does not stop the write
    struct DetachedWrites(MemoryBackend);

    #[async_trait::async_trait]
    impl StorageBackend for DetachedWrites {
        fn name(&self) -> &'static str {
            "detached"
        }

        async fn read(&self, key: &EntityKey) -> StoreResult<Option<Vec<u8>>> {
            self.0.read(key).await
        }

        async fn write(&self, key: &EntityKey, data: Vec<u8>) -> StoreResult<()> {
            let backend = self.0.clone();
            let key = key.clone();
            tokio::spawn(async move { backend.write(&key, data).await })
                .await
                .map_err(|err| StoreError::Backend(err.to_string()))?
        }

        async fn remove(&self, key: &EntityKey) -> StoreResult<bool> {
            self.0.remove(key).await
        }

        async fn list(&self, kind: EntityKind) -> StoreResult<Vec<String>> {
            self.0.list(kind).await
        }
    }

    #[tokio::test]
    async fn test_timed_out_write_never_lands_after_later_one() {
        let backend = MemoryBackend::new();
        let detached = Arc::new(DetachedWrites(backend.clone()));
        let store = Datastore::new(detached, Duration::from_millis(20)).unwrap();

        let mut group = Group::new("slow").unwrap();
        group.set_node(Node::new("old", true));
        backend.set_write_delay(Duration::from_millis(100));
        let outcome = store.save_group(&group).await;
        assert!(matches!(outcome, WriteOutcome::Failed(StoreError::Timeout(_))));

        // the first write is still in flight; the newer one queues behind it
        backend.set_write_delay(Duration::ZERO);
        group.set_node(Node::new("new", true));
        assert!(matches!(store.save_group(&group).await, WriteOutcome::Applied));

        // long enough for any stray write to have landed
        tokio::time::sleep(Duration::from_millis(150)).await;
        let loaded = store.load_group("slow").await.found().unwrap();
        assert!(loaded.has_node(&NodeKey::new("new", None)));
        assert_eq!(loaded.nodes().len(), 2);
    }

    #[test]
    fn test_requires_runtime() {
        let result = Datastore::new(Arc::new(MemoryBackend::new()), Duration::from_secs(1));
        assert!(matches!(result, Err(StoreError::Runtime(_))));
    }
}
