//! Real-time change notification for boards.
//!
//! Subscribers register with the [`ChangeHub`] and receive a payload-free
//! [`BoardEvent::Changed`] after every committed mutation. Events are a
//! prompt to refetch, not a replication stream:
//! - Delivery is best-effort, at most once per live subscriber
//! - A new subscription sees only future events (no replay)
//! - Subscriptions can filter to a single board
//!
//! # Example
//!
//! ```ignore
//! let hub = ChangeHub::new();
//! let handle = hub.subscribe_board(board_id);
//!
//! loop {
//!     match handle.recv() {
//!         Ok(BoardEvent::Changed) => refetch(board_id),
//!         Ok(BoardEvent::Dropped { .. }) | Err(_) => break,
//!     }
//! }
//! ```

mod hub;
mod types;

pub use hub::ChangeHub;
pub use types::{
    BoardEvent, DropReason, PublishReport, SubscriptionConfig, SubscriptionFilter,
    SubscriptionHandle, SubscriptionId,
};
