//! Fan-out hub delivering board change events to live subscribers.

use crate::types::BoardId;
use crossbeam_channel::{bounded, Sender, TrySendError};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use super::types::{
    BoardEvent, DropReason, PublishReport, SubscriptionConfig, SubscriptionHandle, SubscriptionId,
};

/// Result of offering one event to one subscriber.
enum Delivery {
    Delivered,
    Full,
    Disconnected,
}

/// Internal subscription state.
struct Subscriber {
    config: SubscriptionConfig,
    sender: Sender<BoardEvent>,
}

impl Subscriber {
    /// Offer an event without blocking.
    fn offer(&self, event: BoardEvent) -> Delivery {
        match self.sender.try_send(event) {
            Ok(()) => Delivery::Delivered,
            Err(TrySendError::Full(_)) => Delivery::Full,
            Err(TrySendError::Disconnected(_)) => Delivery::Disconnected,
        }
    }
}

/// Tracks live subscriptions and fans out change events.
///
/// The registry has its own lock, independent of any board lock. Publishing
/// never blocks on a subscriber: a full buffer already holds an unread
/// change signal, so the new one is coalesced into it.
pub struct ChangeHub {
    /// Active subscriptions by ID.
    subscriptions: RwLock<HashMap<SubscriptionId, Subscriber>>,
    /// Counter for generating subscription IDs.
    next_id: AtomicU64,
}

impl ChangeHub {
    pub fn new() -> Self {
        Self {
            subscriptions: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a subscription. It receives every publish from now on and
    /// nothing from before.
    pub fn subscribe(&self, config: SubscriptionConfig) -> SubscriptionHandle {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let (sender, receiver) = bounded(config.buffer_size.max(1));

        tracing::debug!(subscription = id.0, filter = ?config.filter, "subscribed");
        self.subscriptions
            .write()
            .insert(id, Subscriber { config, sender });

        SubscriptionHandle { id, receiver }
    }

    /// Register a subscription on every board.
    pub fn subscribe_all(&self) -> SubscriptionHandle {
        self.subscribe(SubscriptionConfig::default())
    }

    /// Register a subscription on one board.
    pub fn subscribe_board(&self, board: BoardId) -> SubscriptionHandle {
        self.subscribe(SubscriptionConfig::board(board))
    }

    /// Remove a subscription. Returns false if it was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let removed = self.subscriptions.write().remove(&id);
        match removed {
            Some(sub) => {
                // Best effort; the receiver may already be gone or full
                let _ = sub.offer(BoardEvent::Dropped {
                    reason: DropReason::Unsubscribed,
                });
                tracing::debug!(subscription = id.0, "unsubscribed");
                true
            }
            None => false,
        }
    }

    /// Deliver one change event for `board` to every matching subscriber.
    pub fn publish(&self, board: BoardId) -> PublishReport {
        let mut report = PublishReport::default();
        let mut disconnected = Vec::new();

        {
            let subs = self.subscriptions.read();
            for (id, sub) in subs.iter() {
                if !sub.config.filter.matches(board) {
                    continue;
                }
                match sub.offer(BoardEvent::Changed) {
                    Delivery::Delivered => report.delivered += 1,
                    Delivery::Full => report.coalesced += 1,
                    Delivery::Disconnected => disconnected.push(*id),
                }
            }
        }

        if !disconnected.is_empty() {
            let mut subs = self.subscriptions.write();
            for id in disconnected {
                if subs.remove(&id).is_some() {
                    report.removed += 1;
                }
            }
        }

        tracing::debug!(
            board = %board,
            delivered = report.delivered,
            coalesced = report.coalesced,
            removed = report.removed,
            "published board change"
        );

        report
    }

    /// Drop every subscription, telling each one why.
    pub fn shutdown(&self) -> usize {
        let drained: Vec<Subscriber> = self.subscriptions.write().drain().map(|(_, s)| s).collect();
        for sub in &drained {
            let _ = sub.offer(BoardEvent::Dropped {
                reason: DropReason::Shutdown,
            });
        }
        drained.len()
    }

    /// Number of registered subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.read().len()
    }
}

impl Default for ChangeHub {
    fn default() -> Self {
        Self::new()
    }
}
