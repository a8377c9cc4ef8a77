//! In-memory item table shared by the reference stores.

use crate::error::{StoreError, StoreResult};
use crate::types::{Board, BoardId, Item, ItemDetails, ItemId, Position};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};

/// One primitive table mutation. A store call commits a list of these
/// all-or-nothing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum TableOp {
    CreateBoard(Board),
    DeleteBoard(BoardId),
    CreateItem(Item),
    SetPosition { item: ItemId, position: Position },
    SetDetails { item: ItemId, details: ItemDetails },
    DeleteItem(ItemId),
}

/// Boards and items, indexed by board.
#[derive(Debug, Default)]
pub struct ItemTable {
    boards: HashMap<BoardId, Board>,
    items: HashMap<ItemId, Item>,
    by_board: HashMap<BoardId, BTreeSet<ItemId>>,
    next_board_id: u64,
    next_item_id: u64,
}

impl ItemTable {
    pub fn new() -> Self {
        Self {
            next_board_id: 1,
            next_item_id: 1,
            ..Default::default()
        }
    }

    pub fn allocate_board_id(&mut self) -> BoardId {
        let id = BoardId(self.next_board_id);
        self.next_board_id += 1;
        id
    }

    pub fn allocate_item_id(&mut self) -> ItemId {
        let id = ItemId(self.next_item_id);
        self.next_item_id += 1;
        id
    }

    pub fn board(&self, id: BoardId) -> Option<&Board> {
        self.boards.get(&id)
    }

    pub fn boards(&self) -> Vec<Board> {
        let mut boards: Vec<Board> = self.boards.values().cloned().collect();
        boards.sort_by_key(|b| b.id);
        boards
    }

    pub fn item(&self, id: ItemId) -> Option<&Item> {
        self.items.get(&id)
    }

    /// Items of a board ordered by position.
    pub fn items_on(&self, board: BoardId) -> Vec<Item> {
        let mut items: Vec<Item> = self
            .by_board
            .get(&board)
            .map(|ids| ids.iter().filter_map(|id| self.items.get(id)).cloned().collect())
            .unwrap_or_default();
        items.sort_by_key(|item| (item.position, item.id));
        items
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// Validate a list of ops against the table without changing it.
    ///
    /// Ops are checked in order, so a batch may create and then touch an
    /// item, but may not touch an item it already deleted.
    pub fn check(&self, ops: &[TableOp]) -> StoreResult<()> {
        let mut created_boards: HashSet<BoardId> = HashSet::new();
        let mut deleted_boards: HashSet<BoardId> = HashSet::new();
        let mut created_items: HashSet<ItemId> = HashSet::new();
        let mut deleted_items: HashSet<ItemId> = HashSet::new();

        let board_live = |id: BoardId, created: &HashSet<BoardId>, deleted: &HashSet<BoardId>| {
            !deleted.contains(&id) && (created.contains(&id) || self.boards.contains_key(&id))
        };
        let item_live = |id: ItemId, created: &HashSet<ItemId>, deleted: &HashSet<ItemId>| {
            !deleted.contains(&id) && (created.contains(&id) || self.items.contains_key(&id))
        };

        for op in ops {
            match op {
                TableOp::CreateBoard(board) => {
                    if board_live(board.id, &created_boards, &deleted_boards) {
                        return Err(StoreError::Corruption(format!(
                            "board {} already exists",
                            board.id
                        )));
                    }
                    created_boards.insert(board.id);
                }
                TableOp::DeleteBoard(id) => {
                    if !board_live(*id, &created_boards, &deleted_boards) {
                        return Err(StoreError::BoardNotFound(*id));
                    }
                    deleted_boards.insert(*id);
                }
                TableOp::CreateItem(item) => {
                    if !board_live(item.board_id, &created_boards, &deleted_boards) {
                        return Err(StoreError::BoardNotFound(item.board_id));
                    }
                    if item_live(item.id, &created_items, &deleted_items) {
                        return Err(StoreError::Corruption(format!(
                            "item {} already exists",
                            item.id
                        )));
                    }
                    created_items.insert(item.id);
                }
                TableOp::SetPosition { item, .. }
                | TableOp::SetDetails { item, .. }
                | TableOp::DeleteItem(item) => {
                    if !item_live(*item, &created_items, &deleted_items) {
                        return Err(StoreError::ItemNotFound(*item));
                    }
                    if matches!(op, TableOp::DeleteItem(_)) {
                        deleted_items.insert(*item);
                    }
                }
            }
        }

        Ok(())
    }

    /// Apply ops that already passed [`ItemTable::check`].
    pub fn apply(&mut self, ops: Vec<TableOp>) {
        for op in ops {
            match op {
                TableOp::CreateBoard(board) => {
                    self.next_board_id = self.next_board_id.max(board.id.0 + 1);
                    self.by_board.entry(board.id).or_default();
                    self.boards.insert(board.id, board);
                }
                TableOp::DeleteBoard(id) => {
                    self.boards.remove(&id);
                    if let Some(ids) = self.by_board.remove(&id) {
                        for item in ids {
                            self.items.remove(&item);
                        }
                    }
                }
                TableOp::CreateItem(item) => {
                    self.next_item_id = self.next_item_id.max(item.id.0 + 1);
                    self.by_board.entry(item.board_id).or_default().insert(item.id);
                    self.items.insert(item.id, item);
                }
                TableOp::SetPosition { item, position } => {
                    if let Some(existing) = self.items.get_mut(&item) {
                        existing.position = position;
                    }
                }
                TableOp::SetDetails { item, details } => {
                    if let Some(existing) = self.items.get_mut(&item) {
                        existing.details = details;
                    }
                }
                TableOp::DeleteItem(item) => {
                    if let Some(removed) = self.items.remove(&item) {
                        if let Some(ids) = self.by_board.get_mut(&removed.board_id) {
                            ids.remove(&item);
                        }
                    }
                }
            }
        }
    }

    /// Check then apply.
    pub fn commit(&mut self, ops: Vec<TableOp>) -> StoreResult<()> {
        self.check(&ops)?;
        self.apply(ops);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Timestamp;

    fn board(id: u64) -> Board {
        Board {
            id: BoardId(id),
            name: format!("board-{}", id),
            color: None,
        }
    }

    fn item(id: u64, board: u64, pos: u64) -> Item {
        Item {
            id: ItemId(id),
            board_id: BoardId(board),
            position: Position(pos),
            created: Timestamp(0),
            details: ItemDetails::titled(format!("item-{}", id)),
        }
    }

    #[test]
    fn test_commit_is_all_or_nothing() {
        let mut table = ItemTable::new();
        table
            .commit(vec![TableOp::CreateBoard(board(1)), TableOp::CreateItem(item(1, 1, 0))])
            .unwrap();

        let result = table.commit(vec![
            TableOp::SetPosition {
                item: ItemId(1),
                position: Position(5),
            },
            TableOp::SetPosition {
                item: ItemId(99),
                position: Position(0),
            },
        ]);

        assert!(matches!(result, Err(StoreError::ItemNotFound(ItemId(99)))));
        assert_eq!(table.item(ItemId(1)).unwrap().position, Position(0));
    }

    #[test]
    fn test_cannot_touch_item_deleted_in_same_batch() {
        let mut table = ItemTable::new();
        table
            .commit(vec![TableOp::CreateBoard(board(1)), TableOp::CreateItem(item(1, 1, 0))])
            .unwrap();

        let result = table.check(&[
            TableOp::DeleteItem(ItemId(1)),
            TableOp::SetPosition {
                item: ItemId(1),
                position: Position(0),
            },
        ]);
        assert!(matches!(result, Err(StoreError::ItemNotFound(ItemId(1)))));
    }

    #[test]
    fn test_items_on_is_ordered_and_isolated() {
        let mut table = ItemTable::new();
        table
            .commit(vec![
                TableOp::CreateBoard(board(1)),
                TableOp::CreateBoard(board(2)),
                TableOp::CreateItem(item(1, 1, 1)),
                TableOp::CreateItem(item(2, 1, 0)),
                TableOp::CreateItem(item(3, 2, 0)),
            ])
            .unwrap();

        let ids: Vec<ItemId> = table.items_on(BoardId(1)).iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![ItemId(2), ItemId(1)]);
        assert_eq!(table.items_on(BoardId(2)).len(), 1);
        assert!(table.items_on(BoardId(3)).is_empty());
    }

    #[test]
    fn test_delete_board_drops_its_items() {
        let mut table = ItemTable::new();
        table
            .commit(vec![
                TableOp::CreateBoard(board(1)),
                TableOp::CreateItem(item(1, 1, 0)),
                TableOp::CreateItem(item(2, 1, 1)),
            ])
            .unwrap();

        table.commit(vec![TableOp::DeleteBoard(BoardId(1))]).unwrap();

        assert!(table.board(BoardId(1)).is_none());
        assert_eq!(table.item_count(), 0);
    }

    #[test]
    fn test_replayed_ids_advance_allocators() {
        let mut table = ItemTable::new();
        table
            .commit(vec![TableOp::CreateBoard(board(4)), TableOp::CreateItem(item(10, 4, 0))])
            .unwrap();

        assert_eq!(table.allocate_board_id(), BoardId(5));
        assert_eq!(table.allocate_item_id(), ItemId(11));
    }
}
