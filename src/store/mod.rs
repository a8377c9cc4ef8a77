//! Item storage.
//!
//! The coordinator talks to storage only through [`ItemStore`]. Two
//! reference implementations are provided:
//! - [`InMemoryItemStore`]: volatile, for tests and embedding
//! - [`FileItemStore`]: replays an append-only journal on open
//!
//! Both apply each call as one all-or-nothing unit, so a reader never sees
//! half of a [`WriteBatch`].

mod file;
mod journal;
mod memory;
mod table;

pub use file::{FileItemStore, FileStoreConfig};
pub use journal::{Journal, JournalEntry};
pub use memory::InMemoryItemStore;
pub use table::TableOp;

use crate::error::StoreResult;
use crate::ordering::PositionChange;
use crate::types::{BoardId, Item, ItemDetails, ItemId, NewItem, Position};
use serde::{Deserialize, Serialize};

/// Storage contract consumed by the coordinator.
///
/// Implementations must be safe to call from many threads. They do not
/// enforce position density; that is the coordinator's job.
pub trait ItemStore: Send + Sync {
    /// Whether a board exists.
    fn board_exists(&self, board: BoardId) -> StoreResult<bool>;

    /// Get an item by ID.
    fn get_item(&self, id: ItemId) -> StoreResult<Option<Item>>;

    /// All items of a board ordered by position.
    fn list_items_by_board(&self, board: BoardId) -> StoreResult<Vec<Item>>;

    /// Create an item, assigning its ID and creation time.
    fn create_item(&self, item: NewItem) -> StoreResult<Item>;

    /// Set a single item's position.
    fn update_item_position(&self, id: ItemId, position: Position) -> StoreResult<()>;

    /// Replace an item's payload. Position and board are untouched.
    fn update_item_details(&self, id: ItemId, details: ItemDetails) -> StoreResult<()>;

    /// Delete an item.
    fn delete_item(&self, id: ItemId) -> StoreResult<()>;

    /// Apply a batch of position updates and deletions atomically.
    fn apply_batch(&self, batch: WriteBatch) -> StoreResult<()>;
}

/// One write inside a [`WriteBatch`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatchOp {
    SetPosition { item: ItemId, position: Position },
    Delete { item: ItemId },
}

/// Writes that must become visible together.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WriteBatch {
    ops: Vec<BatchOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Batch that applies a position plan.
    pub fn from_changes(changes: &[PositionChange]) -> Self {
        let mut batch = Self::new();
        for change in changes {
            batch = batch.set_position(change.item, change.to);
        }
        batch
    }

    pub fn set_position(mut self, item: ItemId, position: Position) -> Self {
        self.ops.push(BatchOp::SetPosition { item, position });
        self
    }

    pub fn delete(mut self, item: ItemId) -> Self {
        self.ops.push(BatchOp::Delete { item });
        self
    }

    pub fn ops(&self) -> &[BatchOp] {
        &self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Lower into table ops.
    pub(crate) fn into_table_ops(self) -> Vec<TableOp> {
        self.ops
            .into_iter()
            .map(|op| match op {
                BatchOp::SetPosition { item, position } => TableOp::SetPosition { item, position },
                BatchOp::Delete { item } => TableOp::DeleteItem(item),
            })
            .collect()
    }
}

impl<S: ItemStore + ?Sized> ItemStore for std::sync::Arc<S> {
    fn board_exists(&self, board: BoardId) -> StoreResult<bool> {
        (**self).board_exists(board)
    }

    fn get_item(&self, id: ItemId) -> StoreResult<Option<Item>> {
        (**self).get_item(id)
    }

    fn list_items_by_board(&self, board: BoardId) -> StoreResult<Vec<Item>> {
        (**self).list_items_by_board(board)
    }

    fn create_item(&self, item: NewItem) -> StoreResult<Item> {
        (**self).create_item(item)
    }

    fn update_item_position(&self, id: ItemId, position: Position) -> StoreResult<()> {
        (**self).update_item_position(id, position)
    }

    fn update_item_details(&self, id: ItemId, details: ItemDetails) -> StoreResult<()> {
        (**self).update_item_details(id, details)
    }

    fn delete_item(&self, id: ItemId) -> StoreResult<()> {
        (**self).delete_item(id)
    }

    fn apply_batch(&self, batch: WriteBatch) -> StoreResult<()> {
        (**self).apply_batch(batch)
    }
}
