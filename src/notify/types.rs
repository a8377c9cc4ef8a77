//! Subscription types for board change notifications.

use crate::types::BoardId;
use serde::{Deserialize, Serialize};

/// Configuration for a subscription.
#[derive(Clone, Debug)]
pub struct SubscriptionConfig {
    /// Max unread events held for the subscriber.
    /// Default: 64
    pub buffer_size: usize,

    /// Which boards this subscriber hears about.
    pub filter: SubscriptionFilter,
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self {
            buffer_size: 64,
            filter: SubscriptionFilter::All,
        }
    }
}

impl SubscriptionConfig {
    /// Subscribe to a single board.
    pub fn board(board: BoardId) -> Self {
        Self {
            filter: SubscriptionFilter::Board(board),
            ..Default::default()
        }
    }
}

/// Topic filter for a subscription.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SubscriptionFilter {
    /// Every board.
    #[default]
    All,
    /// One board only.
    Board(BoardId),
}

impl SubscriptionFilter {
    pub fn matches(&self, board: BoardId) -> bool {
        match self {
            SubscriptionFilter::All => true,
            SubscriptionFilter::Board(id) => *id == board,
        }
    }
}

/// Events delivered to subscribers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BoardEvent {
    /// Board contents changed; refetch.
    Changed,

    /// Subscription was removed by the hub.
    Dropped { reason: DropReason },
}

/// Why a subscription was dropped.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// Explicitly unsubscribed.
    Unsubscribed,
    /// Hub is shutting down.
    Shutdown,
}

/// Outcome of one publish.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PublishReport {
    /// Subscribers that got the event.
    pub delivered: usize,
    /// Subscribers whose buffer was full; they already have a pending signal.
    pub coalesced: usize,
    /// Subscribers found disconnected and removed.
    pub removed: usize,
}

/// Unique identifier for a subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// Handle to receive a subscription's events.
///
/// Dropping the handle disconnects it; the hub forgets it on the next
/// publish.
pub struct SubscriptionHandle {
    pub id: SubscriptionId,
    /// Channel to receive events.
    pub receiver: crossbeam_channel::Receiver<BoardEvent>,
}

impl SubscriptionHandle {
    /// Receive the next event (blocking).
    pub fn recv(&self) -> Result<BoardEvent, crossbeam_channel::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive an event (non-blocking).
    pub fn try_recv(&self) -> Result<BoardEvent, crossbeam_channel::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Receive with timeout.
    pub fn recv_timeout(
        &self,
        timeout: std::time::Duration,
    ) -> Result<BoardEvent, crossbeam_channel::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Take every event currently queued.
    pub fn drain(&self) -> Vec<BoardEvent> {
        self.receiver.try_iter().collect()
    }
}
