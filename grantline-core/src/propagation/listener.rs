//! Receiving side of cluster update propagation

use super::signal::{UpdateScope, UpdateSignal};
use crate::metrics::{SIGNALS_DUPLICATE, SIGNALS_RECEIVED};
use async_trait::async_trait;
use hashlink::LruCache;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Reloads cached entities from the store
#[async_trait]
pub trait Reloader: Send + Sync {
    async fn reload(&self, scope: &UpdateScope);
}

/// Applies update signals from other nodes to the local caches
pub struct UpdateListener {
    origin: Uuid,
    signals: broadcast::Receiver<UpdateSignal>,
    shutdown: broadcast::Receiver<()>,
    seen: LruCache<Uuid, ()>,
    reloader: Arc<dyn Reloader>,
}

impl UpdateListener {
    pub fn new(
        origin: Uuid,
        signals: broadcast::Receiver<UpdateSignal>,
        shutdown: broadcast::Receiver<()>,
        dedup_capacity: usize,
        reloader: Arc<dyn Reloader>,
    ) -> Self {
        Self {
            origin,
            signals,
            shutdown,
            seen: LruCache::new(dedup_capacity.max(1)),
            reloader,
        }
    }

    /// Receive until shutdown or until the channel closes
    pub async fn run(mut self) {
        info!(origin = %self.origin, "Update listener started");
        loop {
            tokio::select! {
                _ = self.shutdown.recv() => break,
                received = self.signals.recv() => match received {
                    Ok(signal) => {
                        self.handle(signal).await;
                    }
                    Err(RecvError::Lagged(missed)) => {
                        // specific signals were lost; only a full reload is safe
                        warn!(missed, "Update listener lagged, reloading everything");
                        self.reloader.reload(&UpdateScope::All).await;
                    }
                    Err(RecvError::Closed) => break,
                },
            }
        }
        info!(origin = %self.origin, "Update listener stopped");
    }

    /// Apply one signal; returns whether it caused a reload
    pub async fn handle(&mut self, signal: UpdateSignal) -> bool {
        if signal.origin == self.origin {
            return false;
        }
        ::metrics::counter!(SIGNALS_RECEIVED).increment(1);

        if self.seen.get(&signal.id).is_some() {
            ::metrics::counter!(SIGNALS_DUPLICATE).increment(1);
            debug!(id = %signal.id, "Dropping duplicate update signal");
            return false;
        }
        self.seen.insert(signal.id, ());

        info!(id = %signal.id, from = %signal.origin, scope = %signal.scope, "Received update signal");
        self.reloader.reload(&signal.scope).await;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct RecordingReloader {
        scopes: Mutex<Vec<UpdateScope>>,
    }

    #[async_trait]
    impl Reloader for RecordingReloader {
        async fn reload(&self, scope: &UpdateScope) {
            self.scopes.lock().await.push(scope.clone());
        }
    }

    fn listener(origin: Uuid, reloader: Arc<RecordingReloader>) -> UpdateListener {
        let (_signals_tx, signals) = broadcast::channel(8);
        let (_shutdown_tx, shutdown) = broadcast::channel(1);
        UpdateListener::new(origin, signals, shutdown, 2, reloader)
    }

    #[tokio::test]
    async fn test_duplicates_and_own_signals_ignored() {
        let origin = Uuid::new_v4();
        let reloader = Arc::new(RecordingReloader::default());
        let mut listener = listener(origin, reloader.clone());

        let remote = UpdateSignal::new(Uuid::new_v4(), UpdateScope::Group("admin".to_string()));
        assert!(listener.handle(remote.clone()).await);
        assert!(!listener.handle(remote).await);
        assert!(!listener.handle(UpdateSignal::new(origin, UpdateScope::All)).await);

        assert_eq!(
            *reloader.scopes.lock().await,
            vec![UpdateScope::Group("admin".to_string())]
        );
    }

    #[tokio::test]
    async fn test_seen_ids_are_bounded() {
        let reloader = Arc::new(RecordingReloader::default());
        let mut listener = listener(Uuid::new_v4(), reloader.clone());
        let peer = Uuid::new_v4();

        let first = UpdateSignal::new(peer, UpdateScope::All);
        listener.handle(first.clone()).await;
        listener.handle(UpdateSignal::new(peer, UpdateScope::All)).await;
        listener.handle(UpdateSignal::new(peer, UpdateScope::All)).await;

        // evicted from the two-entry window, so handled again
        assert!(listener.handle(first).await);
        assert_eq!(reloader.scopes.lock().await.len(), 4);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let reloader = Arc::new(RecordingReloader::default());
        let (signals_tx, signals) = broadcast::channel(8);
        let (shutdown_tx, shutdown) = broadcast::channel(1);
        let listener = UpdateListener::new(Uuid::new_v4(), signals, shutdown, 16, reloader.clone());

        let task = tokio::spawn(listener.run());
        signals_tx
            .send(UpdateSignal::new(Uuid::new_v4(), UpdateScope::All))
            .unwrap();

        crate::test_utils::eventually(|| {
            let reloader = reloader.clone();
            async move { reloader.scopes.lock().await.len() == 1 }
        })
        .await;

        shutdown_tx.send(()).unwrap();
        tokio::time::timeout(std::time::Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
    }
}
