//! # Board Sync
//!
//! Dense, per-board ordered lists of work items that stay consistent under
//! concurrent mutation, with real-time change notification.
//!
//! ## Core Concepts
//!
//! - **Boards**: Containers of items, each with its own ordering
//! - **Positions**: Zero-based and dense; a board of N items uses exactly `0..N`
//! - **Coordinator**: Serializes mutations per board and writes each as one batch
//! - **Notifications**: A payload-free "changed" event after every committed write
//!
//! ## Example
//!
//! ```ignore
//! use boardsync::{Coordinator, FileItemStore, FileStoreConfig, ItemDetails};
//!
//! let store = FileItemStore::open_or_create(FileStoreConfig {
//!     path: "./boards".into(),
//!     ..Default::default()
//! })?;
//! let board = store.create_board("Sprint", Some("green"))?.id;
//!
//! let coordinator = Coordinator::new(store);
//! let events = coordinator.subscribe_board(board);
//!
//! let a = coordinator.append_item(board, ItemDetails::titled("Write docs"))?;
//! let b = coordinator.append_item(board, ItemDetails::titled("Ship it"))?;
//! coordinator.move_item(board, b.id, 0)?;
//!
//! assert_eq!(events.drain().len(), 3);
//! ```

pub mod coordinator;
pub mod error;
pub mod notify;
pub mod ordering;
pub mod store;
pub mod types;

// Re-exports
pub use coordinator::{Coordinator, CoordinatorConfig};
pub use error::{BoardError, Result, StoreError, StoreResult};
pub use notify::{
    BoardEvent, ChangeHub, DropReason, PublishReport, SubscriptionConfig, SubscriptionFilter,
    SubscriptionHandle, SubscriptionId,
};
pub use ordering::{BoardGuard, BoardLocks, OrderedList, PositionChange, PositionPolicy};
pub use store::{
    BatchOp, FileItemStore, FileStoreConfig, InMemoryItemStore, ItemStore, Journal, JournalEntry,
    TableOp, WriteBatch,
};
pub use types::*;
