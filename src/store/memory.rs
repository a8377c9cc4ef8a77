//! Volatile item store.

use super::table::{ItemTable, TableOp};
use super::{ItemStore, WriteBatch};
use crate::error::{StoreError, StoreResult};
use crate::types::{Board, BoardId, Item, ItemDetails, ItemId, NewItem, Position, Timestamp};
use parking_lot::RwLock;

/// Called with the ops of a write after validation and before they are
/// applied. An error aborts the write.
pub(crate) type CommitHook<'a> = &'a dyn Fn(&[TableOp]) -> StoreResult<()>;

fn no_hook(_: &[TableOp]) -> StoreResult<()> {
    Ok(())
}

/// Item store held entirely in memory.
pub struct InMemoryItemStore {
    table: RwLock<ItemTable>,
}

impl InMemoryItemStore {
    pub fn new() -> Self {
        Self {
            table: RwLock::new(ItemTable::new()),
        }
    }

    /// Create a board.
    pub fn create_board(&self, name: &str, color: Option<&str>) -> StoreResult<Board> {
        self.create_board_with(name, color, &no_hook)
    }

    /// Delete a board and every item on it.
    pub fn delete_board(&self, board: BoardId) -> StoreResult<()> {
        self.write_with(|_| Ok((vec![TableOp::DeleteBoard(board)], ())), &no_hook)
    }

    /// Get a board by ID.
    pub fn get_board(&self, board: BoardId) -> Option<Board> {
        self.table.read().board(board).cloned()
    }

    /// All boards ordered by ID.
    pub fn list_boards(&self) -> Vec<Board> {
        self.table.read().boards()
    }

    /// Total number of items across boards.
    pub fn item_count(&self) -> usize {
        self.table.read().item_count()
    }

    /// Build ops under the write lock, validate, run the hook, then apply.
    pub(crate) fn write_with<T>(
        &self,
        build: impl FnOnce(&mut ItemTable) -> StoreResult<(Vec<TableOp>, T)>,
        hook: CommitHook<'_>,
    ) -> StoreResult<T> {
        let mut table = self.table.write();
        let (ops, value) = build(&mut *table)?;
        table.check(&ops)?;
        hook(&ops)?;
        table.apply(ops);
        Ok(value)
    }

    /// Apply ops read back from a journal.
    pub(crate) fn replay(&self, ops: Vec<TableOp>) -> StoreResult<()> {
        self.table.write().commit(ops)
    }

    pub(crate) fn create_board_with(
        &self,
        name: &str,
        color: Option<&str>,
        hook: CommitHook<'_>,
    ) -> StoreResult<Board> {
        self.write_with(
            |table| {
                let board = Board {
                    id: table.allocate_board_id(),
                    name: name.to_string(),
                    color: color.map(str::to_string),
                };
                Ok((vec![TableOp::CreateBoard(board.clone())], board))
            },
            hook,
        )
    }

    pub(crate) fn create_item_with(&self, new: NewItem, hook: CommitHook<'_>) -> StoreResult<Item> {
        self.write_with(
            |table| {
                if table.board(new.board_id).is_none() {
                    return Err(StoreError::BoardNotFound(new.board_id));
                }
                let item = Item {
                    id: table.allocate_item_id(),
                    board_id: new.board_id,
                    position: new.position,
                    created: Timestamp::now(),
                    details: new.details,
                };
                Ok((vec![TableOp::CreateItem(item.clone())], item))
            },
            hook,
        )
    }

    pub(crate) fn commit_with(&self, ops: Vec<TableOp>, hook: CommitHook<'_>) -> StoreResult<()> {
        self.write_with(|_| Ok((ops, ())), hook)
    }
}

impl Default for InMemoryItemStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ItemStore for InMemoryItemStore {
    fn board_exists(&self, board: BoardId) -> StoreResult<bool> {
        Ok(self.table.read().board(board).is_some())
    }

    fn get_item(&self, id: ItemId) -> StoreResult<Option<Item>> {
        Ok(self.table.read().item(id).cloned())
    }

    fn list_items_by_board(&self, board: BoardId) -> StoreResult<Vec<Item>> {
        Ok(self.table.read().items_on(board))
    }

    fn create_item(&self, item: NewItem) -> StoreResult<Item> {
        self.create_item_with(item, &no_hook)
    }

    fn update_item_position(&self, id: ItemId, position: Position) -> StoreResult<()> {
        self.commit_with(vec![TableOp::SetPosition { item: id, position }], &no_hook)
    }

    fn update_item_details(&self, id: ItemId, details: ItemDetails) -> StoreResult<()> {
        self.commit_with(vec![TableOp::SetDetails { item: id, details }], &no_hook)
    }

    fn delete_item(&self, id: ItemId) -> StoreResult<()> {
        self.commit_with(vec![TableOp::DeleteItem(id)], &no_hook)
    }

    fn apply_batch(&self, batch: WriteBatch) -> StoreResult<()> {
        if batch.is_empty() {
            return Ok(());
        }
        self.commit_with(batch.into_table_ops(), &no_hook)
    }
}
