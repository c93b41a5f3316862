//! Publishing side of cluster update propagation

use super::error::PropagationError;
use super::messaging::MessagingService;
use super::signal::{UpdateScope, UpdateSignal};
use crate::metrics::SIGNALS_SENT;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

/// Announces successful mutations so other nodes reload the affected entity
#[derive(Clone)]
pub struct UpdatePropagator {
    origin: Uuid,
    messaging: Arc<dyn MessagingService>,
    runtime: Handle,
}

impl UpdatePropagator {
    pub fn new(origin: Uuid, messaging: Arc<dyn MessagingService>) -> Result<Self, PropagationError> {
        let runtime = Handle::try_current().map_err(|e| PropagationError::Runtime(e.to_string()))?;
        Ok(Self {
            origin,
            messaging,
            runtime,
        })
    }

    /// Id this node stamps on its signals
    pub fn origin(&self) -> Uuid {
        self.origin
    }

    pub fn messaging(&self) -> &Arc<dyn MessagingService> {
        &self.messaging
    }

    /// Schedule a signal for `scope` and return immediately.
    ///
    /// Failures are logged, never reported to the caller: the mutation has
    /// already been persisted and other nodes converge on their next reload.
    pub fn run_update_task(&self, scope: UpdateScope) -> JoinHandle<()> {
        let signal = UpdateSignal::new(self.origin, scope);
        let messaging = self.messaging.clone();

        self.runtime.spawn(async move {
            let service = messaging.name();
            match messaging.publish(signal.clone()).await {
                Ok(()) => {
                    ::metrics::counter!(SIGNALS_SENT).increment(1);
                    debug!(id = %signal.id, scope = %signal.scope, service, "Published update signal");
                }
                Err(e) => {
                    warn!(id = %signal.id, scope = %signal.scope, service, error = %e, "Failed to publish update signal");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::propagation::LocalBus;

    #[tokio::test]
    async fn test_run_update_task_publishes_with_origin() {
        let bus = LocalBus::new(8);
        let mut rx = bus.subscribe();
        let origin = Uuid::new_v4();
        let propagator = UpdatePropagator::new(origin, Arc::new(bus)).unwrap();

        propagator
            .run_update_task(UpdateScope::Track("staff".to_string()))
            .await
            .unwrap();

        let signal = rx.recv().await.unwrap();
        assert_eq!(signal.origin, origin);
        assert_eq!(signal.scope, UpdateScope::Track("staff".to_string()));
    }

    #[tokio::test]
    async fn test_each_task_gets_fresh_id() {
        let bus = LocalBus::new(8);
        let mut rx = bus.subscribe();
        let propagator = UpdatePropagator::new(Uuid::new_v4(), Arc::new(bus)).unwrap();

        propagator.run_update_task(UpdateScope::All).await.unwrap();
        propagator.run_update_task(UpdateScope::All).await.unwrap();

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_ne!(first.id, second.id);
    }
}
