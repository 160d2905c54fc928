//! Per-ticket mutual exclusion.
//!
//! Every status change and assignment for a ticket runs while holding that
//! ticket's lock, so two writers can never both read the same version and both
//! save. Locks for different tickets never contend.
//!
//! Entries are created on first use and removed when the last holder or waiter
//! lets go, so the registry only ever contains tickets that are being worked on.

use dashmap::DashMap;
use helpdesk_core::types::TicketId;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

type Registry = DashMap<TicketId, Arc<Mutex<()>>>;

/// Keyed async mutex over ticket ids. Cheap to clone; clones share state.
#[derive(Debug, Clone, Default)]
pub struct TicketLocks {
    registry: Arc<Registry>,
}

/// Exclusive access to one ticket. Released on drop.
#[derive(Debug)]
pub struct TicketGuard {
    id: TicketId,
    guard: Option<OwnedMutexGuard<()>>,
    registry: Arc<Registry>,
}

impl TicketLocks {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to `id`.
    pub async fn lock(&self, id: TicketId) -> TicketGuard {
        // The shard lock must be released before awaiting the mutex.
        let mutex = Arc::clone(
            self.registry
                .entry(id)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .value(),
        );
        let guard = mutex.lock_owned().await;
        TicketGuard {
            id,
            guard: Some(guard),
            registry: Arc::clone(&self.registry),
        }
    }

    /// Number of tickets currently locked or waited on.
    #[must_use]
    pub fn len(&self) -> usize {
        self.registry.len()
    }

    /// True when no ticket is locked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }
}

impl TicketGuard {
    /// The locked ticket.
    #[must_use]
    pub const fn ticket_id(&self) -> TicketId {
        self.id
    }
}

impl Drop for TicketGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Only the registry's own reference left means nobody holds or awaits it.
        self.registry
            .remove_if(&self.id, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn registry_is_cleaned_up_after_release() {
        let locks = TicketLocks::new();
        {
            let guard = locks.lock(TicketId::new(1)).await;
            assert_eq!(guard.ticket_id(), TicketId::new(1));
            assert_eq!(locks.len(), 1);
        }
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn different_tickets_do_not_block() {
        let locks = TicketLocks::new();
        let _first = locks.lock(TicketId::new(1)).await;
        let second = tokio::time::timeout(Duration::from_millis(50), locks.lock(TicketId::new(2))).await;
        assert!(second.is_ok());
    }

    #[tokio::test]
    async fn same_ticket_is_serialized() {
        let locks = TicketLocks::new();
        let inside = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let locks = locks.clone();
                let inside = Arc::clone(&inside);
                let max_seen = Arc::clone(&max_seen);
                tokio::spawn(async move {
                    let _guard = locks.lock(TicketId::new(7)).await;
                    let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                    max_seen.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(2)).await;
                    inside.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();

        for task in tasks {
            assert!(task.await.is_ok());
        }
        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
        assert!(locks.is_empty());
    }
}
