//! Messaging services that carry update signals between nodes

use super::error::PropagationError;
use super::signal::UpdateSignal;
use crate::config::{MessagingKind, PropagationConfig};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::broadcast;

#[async_trait]
pub trait MessagingService: Send + Sync {
    fn name(&self) -> &'static str;

    /// Deliver `signal` to every subscriber, including other nodes
    async fn publish(&self, signal: UpdateSignal) -> Result<(), PropagationError>;

    fn subscribe(&self) -> broadcast::Receiver<UpdateSignal>;
}

/// Build the configured messaging service
pub fn messaging_from_config(config: &PropagationConfig) -> Arc<dyn MessagingService> {
    match config.messaging_service {
        MessagingKind::None => Arc::new(NoopMessaging::new()),
        MessagingKind::Local => Arc::new(LocalBus::new(config.channel_capacity)),
    }
}

/// In-process broadcast bus. Clones share the channel, so engines in one
/// process that share a bus behave like nodes of one cluster.
#[derive(Clone)]
pub struct LocalBus {
    tx: broadcast::Sender<UpdateSignal>,
}

impl LocalBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[async_trait]
impl MessagingService for LocalBus {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn publish(&self, signal: UpdateSignal) -> Result<(), PropagationError> {
        // no subscribers is not an error: nobody needs to reload
        let _ = self.tx.send(signal);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<UpdateSignal> {
        self.tx.subscribe()
    }
}

/// Single-node setup: publishing goes nowhere
pub struct NoopMessaging {
    tx: broadcast::Sender<UpdateSignal>,
}

impl NoopMessaging {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }
}

impl Default for NoopMessaging {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessagingService for NoopMessaging {
    fn name(&self) -> &'static str {
        "none"
    }

    async fn publish(&self, _signal: UpdateSignal) -> Result<(), PropagationError> {
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<UpdateSignal> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::propagation::UpdateScope;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_local_bus_fans_out() {
        let bus = LocalBus::new(8);
        let mut first = bus.subscribe();
        let mut second = bus.clone().subscribe();

        let signal = UpdateSignal::new(Uuid::new_v4(), UpdateScope::All);
        bus.publish(signal.clone()).await.unwrap();

        assert_eq!(first.recv().await.unwrap(), signal);
        assert_eq!(second.recv().await.unwrap(), signal);
    }

    #[tokio::test]
    async fn test_publish_without_subscribers() {
        let bus = LocalBus::new(8);
        assert_eq!(bus.subscriber_count(), 0);
        assert!(bus
            .publish(UpdateSignal::new(Uuid::new_v4(), UpdateScope::All))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_noop_never_delivers() {
        let noop = NoopMessaging::new();
        let mut rx = noop.subscribe();
        noop.publish(UpdateSignal::new(Uuid::new_v4(), UpdateScope::All))
            .await
            .unwrap();
        assert!(rx.try_recv().is_err());
    }
}
