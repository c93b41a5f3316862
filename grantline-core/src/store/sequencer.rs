//! Per-key ordering of writes
//!
//! Each write takes a ticket from its key's slot at the moment it is issued.
//! Applying a write holds the slot's lock, and a write whose ticket is older
//! than the last applied one is skipped. Writes to one key therefore never
//! land out of issue order, while writes to different keys run in parallel.

use super::backend::EntityKey;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Mutex as AsyncMutex;

#[derive(Default)]
struct Slot {
    issued: AtomicU64,
    applied: AsyncMutex<u64>,
}

/// Position of a write in its key's issue order
pub(crate) struct Ticket {
    key: EntityKey,
    number: u64,
    slot: Arc<Slot>,
}

impl Ticket {
    pub(crate) fn key(&self) -> &EntityKey {
        &self.key
    }
}

/// What happened to a ticketed write
pub(crate) enum Sequenced<T> {
    Ran(T),
    Skipped,
}

#[derive(Default)]
pub(crate) struct WriteSequencer {
    slots: Mutex<HashMap<EntityKey, Arc<Slot>>>,
}

impl WriteSequencer {
    fn slots(&self) -> MutexGuard<'_, HashMap<EntityKey, Arc<Slot>>> {
        // the map is only mutated by single inserts/removes, so a poisoned
        // guard still holds a consistent map
        self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Take the next ticket for `key`. Must be called synchronously when the
    /// write is issued.
    pub(crate) fn ticket(&self, key: EntityKey) -> Ticket {
        let slot = self.slots().entry(key.clone()).or_default().clone();
        let number = slot.issued.fetch_add(1, Ordering::SeqCst) + 1;
        Ticket { key, number, slot }
    }

    /// Run `write` in ticket order. `write` returns whether it took effect;
    /// a failed write does not advance the applied position.
    pub(crate) async fn run<T, F, Fut>(&self, ticket: Ticket, write: F) -> Sequenced<T>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = (T, bool)>,
    {
        let result = {
            let mut applied = ticket.slot.applied.lock().await;
            if *applied > ticket.number {
                Sequenced::Skipped
            } else {
                let (value, took_effect) = write().await;
                if took_effect {
                    *applied = ticket.number;
                }
                Sequenced::Ran(value)
            }
        };
        self.release(ticket);
        result
    }

    fn release(&self, ticket: Ticket) {
        let mut slots = self.slots();
        // one reference in the map plus the ticket's own
        if Arc::strong_count(&ticket.slot) == 2 {
            slots.remove(&ticket.key);
        }
    }

    #[cfg(test)]
    pub(crate) fn active_keys(&self) -> usize {
        self.slots().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[tokio::test]
    async fn test_older_ticket_is_skipped_after_newer_applied() {
        let sequencer = WriteSequencer::default();
        let first = sequencer.ticket(EntityKey::group("admin"));
        let second = sequencer.ticket(EntityKey::group("admin"));

        let ran = sequencer.run(second, || async { ("second", true) }).await;
        assert!(matches!(ran, Sequenced::Ran("second")));

        let ran = sequencer.run(first, || async { ("first", true) }).await;
        assert!(matches!(ran, Sequenced::Skipped));
        assert_eq!(sequencer.active_keys(), 0);
    }

    #[tokio::test]
    async fn test_failed_write_does_not_block_older_retry() {
        let sequencer = WriteSequencer::default();
        let first = sequencer.ticket(EntityKey::track("staff"));
        let second = sequencer.ticket(EntityKey::track("staff"));

        let ran = sequencer.run(second, || async { ((), false) }).await;
        assert!(matches!(ran, Sequenced::Ran(())));

        let ran = sequencer.run(first, || async { ((), true) }).await;
        assert!(matches!(ran, Sequenced::Ran(())));
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let sequencer = WriteSequencer::default();
        let calls = AtomicUsize::new(0);

        let a = sequencer.ticket(EntityKey::group("a"));
        let b = sequencer.ticket(EntityKey::group("b"));
        assert_eq!(sequencer.active_keys(), 2);

        for ticket in [b, a] {
            let ran = sequencer
                .run(ticket, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    ((), true)
                })
                .await;
            assert!(matches!(ran, Sequenced::Ran(())));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
