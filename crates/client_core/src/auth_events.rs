//! Fan-out of auth-state transitions to standing subscribers.
//!
//! A subscriber holds an [`AuthSubscription`]. Splitting it yields the
//! [`SubscriptionHandle`], whose drop removes the listener from the hub, and
//! the [`AuthEvents`] receiver, which ends once the handle is released.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex,
    },
};

use shared::protocol::AuthChange;
use tokio::sync::mpsc;
use tracing::debug;

#[derive(Default)]
struct Listeners {
    senders: Mutex<HashMap<u64, mpsc::UnboundedSender<AuthChange>>>,
    next_id: AtomicU64,
}

#[derive(Clone, Default)]
pub struct AuthEventHub {
    listeners: Arc<Listeners>,
}

impl AuthEventHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> AuthSubscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.listeners.next_id.fetch_add(1, Ordering::Relaxed);
        lock_senders(&self.listeners).insert(id, tx);
        debug!(subscription_id = id, "auth subscription registered");
        AuthSubscription {
            handle: SubscriptionHandle {
                id,
                listeners: Arc::clone(&self.listeners),
            },
            events: AuthEvents { rx },
        }
    }

    /// Delivers `change` to every registered listener, pruning receivers
    /// that went away without unsubscribing.
    pub fn emit(&self, change: AuthChange) {
        let mut senders = lock_senders(&self.listeners);
        senders.retain(|_, tx| tx.send(change.clone()).is_ok());
        debug!(
            event = ?change.event,
            listeners = senders.len(),
            "auth change emitted"
        );
    }

    pub fn active_subscriptions(&self) -> usize {
        lock_senders(&self.listeners).len()
    }
}

fn lock_senders(
    listeners: &Listeners,
) -> std::sync::MutexGuard<'_, HashMap<u64, mpsc::UnboundedSender<AuthChange>>> {
    listeners
        .senders
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub struct AuthSubscription {
    handle: SubscriptionHandle,
    events: AuthEvents,
}

impl AuthSubscription {
    pub fn split(self) -> (SubscriptionHandle, AuthEvents) {
        (self.handle, self.events)
    }

    pub async fn recv(&mut self) -> Option<AuthChange> {
        self.events.recv().await
    }

    pub fn unsubscribe(self) {
        drop(self);
    }
}

/// Owns the registration; unsubscribes exactly once, on drop.
pub struct SubscriptionHandle {
    id: u64,
    listeners: Arc<Listeners>,
}

impl SubscriptionHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        if lock_senders(&self.listeners).remove(&self.id).is_some() {
            debug!(subscription_id = self.id, "auth subscription released");
        }
    }
}

pub struct AuthEvents {
    rx: mpsc::UnboundedReceiver<AuthChange>,
}

impl AuthEvents {
    pub async fn recv(&mut self) -> Option<AuthChange> {
        self.rx.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::protocol::AuthChangeEvent;

    #[tokio::test]
    async fn delivers_changes_to_every_subscriber() {
        let hub = AuthEventHub::new();
        let mut first = hub.subscribe();
        let mut second = hub.subscribe();

        hub.emit(AuthChange::signed_out());

        assert_eq!(
            first.recv().await.map(|change| change.event),
            Some(AuthChangeEvent::SignedOut)
        );
        assert_eq!(
            second.recv().await.map(|change| change.event),
            Some(AuthChangeEvent::SignedOut)
        );
    }

    #[tokio::test]
    async fn dropping_the_handle_unsubscribes_and_ends_the_stream() {
        let hub = AuthEventHub::new();
        let (handle, mut events) = hub.subscribe().split();
        assert_eq!(hub.active_subscriptions(), 1);

        handle.unsubscribe();
        assert_eq!(hub.active_subscriptions(), 0);
        assert!(events.recv().await.is_none());

        hub.emit(AuthChange::signed_out());
        assert_eq!(hub.active_subscriptions(), 0);
    }

    #[test]
    fn emit_prunes_listeners_whose_receiver_was_dropped() {
        let hub = AuthEventHub::new();
        let (handle, events) = hub.subscribe().split();
        drop(events);

        hub.emit(AuthChange::signed_out());
        assert_eq!(hub.active_subscriptions(), 0);

        // Releasing an already-pruned registration is a no-op.
        drop(handle);
        assert_eq!(hub.active_subscriptions(), 0);
    }
}
