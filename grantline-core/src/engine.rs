/*
    engine.rs - Wiring of the store gateway, caches and propagation

    `Engine::start` loads every group and track into the local caches,
    makes sure the default group exists and spawns the update listener.
    Users are cached on demand (login or first operation touching them).
*/

use crate::config::{Config, ConfigError};
use crate::manager::{GroupManager, Shared, TrackManager, UserManager};
use crate::model::{PermissionHolder, User};
use crate::ops::{Authorizer, MessageSink, Operations};
use crate::propagation::{
    messaging_from_config, MessagingService, PropagationError, Reloader, UpdateListener,
    UpdatePropagator, UpdateScope,
};
use crate::resolve::{
    PermissionRegistry, QueryContext, ResolutionOptions, ResolvedCache, ResolvedPermissions,
    Resolver, Tristate,
};
use crate::store::{backend_from_config, Datastore, LoadOutcome, StorageBackend, StoreError};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

/// How long `shutdown` waits for the listener to stop
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Propagation error: {0}")]
    Propagation(#[from] PropagationError),

    #[error("Default group '{0}' could not be created")]
    DefaultGroup(String),
}

/// Shared state behind the engine and every `Operations` handle
pub struct EngineState {
    pub(crate) config: Config,
    pub(crate) datastore: Datastore,
    pub(crate) users: UserManager,
    pub(crate) groups: GroupManager,
    pub(crate) tracks: TrackManager,
    pub(crate) propagator: UpdatePropagator,
    pub(crate) resolved: ResolvedCache,
    pub(crate) registry: PermissionRegistry,
}

impl EngineState {
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn datastore(&self) -> &Datastore {
        &self.datastore
    }

    pub fn users(&self) -> &UserManager {
        &self.users
    }

    pub fn groups(&self) -> &GroupManager {
        &self.groups
    }

    pub fn tracks(&self) -> &TrackManager {
        &self.tracks
    }

    pub fn registry(&self) -> &PermissionRegistry {
        &self.registry
    }

    pub fn node_id(&self) -> Uuid {
        self.propagator.origin()
    }

    pub fn default_group(&self) -> &str {
        &self.config.node.default_group
    }

    /// Query context of this node
    pub fn local_context(&self) -> QueryContext {
        QueryContext::from_option(self.config.server_context().as_deref())
    }

    /// Fire-and-forget cluster notification
    pub(crate) fn propagate(&self, scope: UpdateScope) {
        self.propagator.run_update_task(scope);
    }

    /// Resolved view of `user`, served from the cache when fresh
    pub async fn resolve(&self, user: &User, query: &QueryContext) -> Arc<ResolvedPermissions> {
        if let Some(resolved) = self.resolved.get(user.uuid(), query) {
            return resolved;
        }
        let generation = self.resolved.generation();
        let groups = self.groups.resolution_view().await;
        let options = ResolutionOptions::from(&self.config.resolution);
        let resolved = Resolver::new(&groups, options).resolve(user, query);
        self.resolved.insert(user.uuid(), query.clone(), resolved, generation)
    }

    /// Check one permission, recording it in the registry
    pub async fn check(&self, user: &User, permission: &str, query: &QueryContext) -> Tristate {
        let result = self.resolve(user, query).await.check(permission);
        self.registry.offer(permission);
        trace!(
            user = %user.name(),
            permission,
            context = %query,
            result = %result,
            "Permission check"
        );
        result
    }

    async fn reload_user(&self, uuid: Uuid) {
        // only users already cached on this node matter
        let Some(handle) = self.users.get(&uuid).await else {
            return;
        };
        let mut user = handle.write().await;
        match self.datastore.load_user(uuid).await {
            LoadOutcome::Found(loaded) => *user = loaded,
            LoadOutcome::NotFound => {
                drop(user);
                self.users.remove(&uuid).await;
            }
            LoadOutcome::Failed(err) => {
                warn!(%uuid, error = %err, "Failed to reload user");
            }
        }
        self.resolved.invalidate_user(uuid);
    }

    async fn reload_group(&self, name: &str) {
        let id = name.to_string();
        match self.groups.get(&id).await {
            Some(handle) => {
                let mut group = handle.write().await;
                match self.datastore.load_group(name).await {
                    LoadOutcome::Found(loaded) => *group = loaded,
                    LoadOutcome::NotFound => {
                        drop(group);
                        self.groups.remove(&id).await;
                    }
                    LoadOutcome::Failed(err) => {
                        warn!(group = name, error = %err, "Failed to reload group");
                    }
                }
            }
            None => {
                if let LoadOutcome::Found(loaded) = self.datastore.load_group(name).await {
                    self.groups.insert_or_replace(loaded).await;
                }
            }
        }
        // inheritance means any user may be affected
        self.resolved.invalidate_all();
    }

    async fn reload_track(&self, name: &str) {
        let id = name.to_string();
        match self.tracks.get(&id).await {
            Some(handle) => {
                let mut track = handle.write().await;
                match self.datastore.load_track(name).await {
                    LoadOutcome::Found(loaded) => *track = loaded,
                    LoadOutcome::NotFound => {
                        drop(track);
                        self.tracks.remove(&id).await;
                    }
                    LoadOutcome::Failed(err) => {
                        warn!(track = name, error = %err, "Failed to reload track");
                    }
                }
            }
            None => {
                if let LoadOutcome::Found(loaded) = self.datastore.load_track(name).await {
                    self.tracks.insert_or_replace(loaded).await;
                }
            }
        }
    }

    /// Reload all groups and tracks plus every cached user
    async fn reload_all(&self) -> Result<(), StoreError> {
        let groups = self.datastore.load_all_groups().await?;
        self.groups.replace_all(groups).await;
        let tracks = self.datastore.load_all_tracks().await?;
        self.tracks.replace_all(tracks).await;

        for uuid in self.users.ids().await {
            self.reload_user(uuid).await;
        }
        self.resolved.invalidate_all();
        Ok(())
    }
}

#[async_trait]
impl Reloader for EngineState {
    async fn reload(&self, scope: &UpdateScope) {
        debug!(%scope, "Reloading from store");
        match scope {
            UpdateScope::All => {
                if let Err(err) = self.reload_all().await {
                    warn!(error = %err, "Full reload failed");
                }
            }
            UpdateScope::User(uuid) => self.reload_user(*uuid).await,
            UpdateScope::Group(name) => self.reload_group(name).await,
            UpdateScope::Track(name) => self.reload_track(name).await,
        }
    }
}

/// A running node
pub struct Engine {
    state: Arc<EngineState>,
    shutdown: broadcast::Sender<()>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl Engine {
    /// Start a node over `backend`, exchanging update signals through `messaging`
    pub async fn start(
        config: Config,
        backend: Arc<dyn StorageBackend>,
        messaging: Arc<dyn MessagingService>,
    ) -> Result<Self, EngineError> {
        config.validate()?;

        let datastore = Datastore::new(backend, config.store.operation_timeout)?;
        let propagator = UpdatePropagator::new(Uuid::new_v4(), messaging.clone())?;
        let node_id = propagator.origin();
        let dedup_capacity = config.propagation.dedup_capacity;

        let default_group = config.node.default_group.clone();
        match datastore.create_and_load_group(&default_group).await {
            LoadOutcome::Found(_) => {}
            LoadOutcome::NotFound => return Err(EngineError::DefaultGroup(default_group)),
            LoadOutcome::Failed(err) => return Err(err.into()),
        }

        let state = Arc::new(EngineState {
            config,
            datastore,
            users: UserManager::new(),
            groups: GroupManager::new(),
            tracks: TrackManager::new(),
            propagator,
            resolved: ResolvedCache::new(),
            registry: PermissionRegistry::new(),
        });

        // subscribe before loading so no signal slips between load and listen
        let signals = messaging.subscribe();
        state.reload_all().await?;

        let (shutdown, shutdown_rx) = broadcast::channel(1);
        let listener = UpdateListener::new(
            node_id,
            signals,
            shutdown_rx,
            dedup_capacity,
            state.clone(),
        );
        let listener = tokio::spawn(listener.run());

        info!(
            node = %node_id,
            backend = state.datastore.backend_name(),
            messaging = messaging.name(),
            groups = state.groups.len().await,
            tracks = state.tracks.len().await,
            "Engine started"
        );

        Ok(Self {
            state,
            shutdown,
            listener: Mutex::new(Some(listener)),
        })
    }

    /// Start with the backend and messaging service named in `config`
    pub async fn from_config(config: Config) -> Result<Self, EngineError> {
        let backend = backend_from_config(&config.store)?;
        let messaging = messaging_from_config(&config.propagation);
        Self::start(config, backend, messaging).await
    }

    pub fn state(&self) -> &Arc<EngineState> {
        &self.state
    }

    pub fn node_id(&self) -> Uuid {
        self.state.node_id()
    }

    /// Command-verb surface bound to an authorizer and message sink
    pub fn operations(
        &self,
        authorizer: Arc<dyn Authorizer>,
        sink: Arc<dyn MessageSink>,
    ) -> Operations {
        Operations::new(self.state.clone(), authorizer, sink)
    }

    /// Load (or create) a user and keep it cached on this node
    pub async fn login(&self, uuid: Uuid, name: &str) -> LoadOutcome<Shared<User>> {
        let outcome = self
            .state
            .datastore
            .create_and_load_user(uuid, name, self.state.default_group())
            .await;
        match outcome {
            LoadOutcome::Found(user) => {
                let handle = self.state.users.get_or_insert(user).await;
                {
                    // an already cached copy stays authoritative, apart from the name
                    let mut cached = handle.write().await;
                    if cached.name() != name {
                        let clean = !cached.is_dirty();
                        cached.set_name(name);
                        if clean {
                            cached.mark_clean();
                        }
                    }
                }
                self.state.resolved.invalidate_user(uuid);
                LoadOutcome::Found(handle)
            }
            LoadOutcome::NotFound => LoadOutcome::NotFound,
            LoadOutcome::Failed(err) => LoadOutcome::Failed(err),
        }
    }

    /// Drop a user from the local caches
    pub async fn logout(&self, uuid: Uuid) {
        self.state.users.remove(&uuid).await;
        self.state.resolved.invalidate_user(uuid);
    }

    /// Check a cached user's permission in this node's context
    pub async fn check(&self, uuid: Uuid, permission: &str) -> Tristate {
        let Some(handle) = self.state.users.get(&uuid).await else {
            return Tristate::Undefined;
        };
        let user = handle.read().await;
        self.state
            .check(&user, permission, &self.state.local_context())
            .await
    }

    /// Whether a cached user has unsaved changes
    pub async fn is_user_dirty(&self, uuid: Uuid) -> bool {
        match self.state.users.get(&uuid).await {
            Some(handle) => handle.read().await.is_dirty(),
            None => false,
        }
    }

    /// Stop the update listener
    pub async fn shutdown(&self) {
        info!(node = %self.node_id(), "Shutting down engine");
        // the listener may already be gone if the bus closed
        let _ = self.shutdown.send(());

        if let Some(listener) = self.listener.lock().await.take() {
            match tokio::time::timeout(SHUTDOWN_TIMEOUT, listener).await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => warn!(error = %err, "Update listener task failed"),
                Err(_) => warn!("Update listener did not stop in time"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Node, NodeKey};
    use crate::propagation::NoopMessaging;
    use crate::store::{EntityKind, MemoryBackend};

    async fn start(backend: &MemoryBackend) -> Engine {
        Engine::start(
            Config::default(),
            Arc::new(backend.clone()),
            Arc::new(NoopMessaging::new()),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_start_creates_default_group() {
        let backend = MemoryBackend::new();
        let engine = start(&backend).await;

        assert_eq!(backend.count(EntityKind::Group).await, 1);
        assert!(engine.state().groups().contains(&"default".to_string()).await);
        engine.shutdown().await;
    }

    #[tokio::test]
    async fn test_start_fails_when_store_unavailable() {
        let backend = MemoryBackend::new();
        backend.set_failing(true);
        let result = Engine::start(
            Config::default(),
            Arc::new(backend),
            Arc::new(NoopMessaging::new()),
        )
        .await;
        assert!(matches!(result, Err(EngineError::Store(_))));
    }

    #[tokio::test]
    async fn test_login_and_check() {
        let backend = MemoryBackend::new();
        let engine = start(&backend).await;

        {
            let handle = engine.state().groups().get(&"default".to_string()).await.unwrap();
            handle.write().await.set_node(Node::new("chat.send", true));
        }

        let uuid = Uuid::new_v4();
        let user = engine.login(uuid, "alice").await.found().unwrap();
        assert!(user
            .read()
            .await
            .has_node(&NodeKey::group("default", None)));

        assert_eq!(engine.check(uuid, "chat.send").await, Tristate::True);
        assert_eq!(engine.check(uuid, "chat.mute").await, Tristate::Undefined);
        assert!(engine.state().registry().known().contains(&"chat.send".to_string()));

        engine.logout(uuid).await;
        assert_eq!(engine.check(uuid, "chat.send").await, Tristate::Undefined);
        engine.shutdown().await;
    }

    #[tokio::test]
    async fn test_login_keeps_cached_handle_and_renames() {
        let backend = MemoryBackend::new();
        let engine = start(&backend).await;
        let uuid = Uuid::new_v4();

        let first = engine.login(uuid, "alice").await.found().unwrap();
        let again = engine.login(uuid, "Alicia").await.found().unwrap();
        assert!(Arc::ptr_eq(&first, &again));
        assert_eq!(again.read().await.name(), "Alicia");
        assert!(!engine.is_user_dirty(uuid).await);

        let datastore = engine.state().datastore();
        assert_eq!(datastore.lookup_user("alicia").await.found(), Some(uuid));
        assert!(matches!(
            datastore.lookup_user("alice").await,
            LoadOutcome::NotFound
        ));
        engine.shutdown().await;
    }
}
