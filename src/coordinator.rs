//! Mutation coordinator tying the store, ordering, and notification together.

use crate::error::{BoardError, Result};
use crate::notify::{ChangeHub, SubscriptionHandle, SubscriptionId};
use crate::ordering::{BoardLocks, OrderedList, PositionPolicy};
use crate::store::{ItemStore, WriteBatch};
use crate::types::{BoardId, Item, ItemDetails, ItemId, NewItem};
use std::sync::Arc;

/// Coordinator configuration.
#[derive(Clone, Debug, Default)]
pub struct CoordinatorConfig {
    /// How out-of-range move targets are handled.
    pub position_policy: PositionPolicy,
}

/// Entry point for every board mutation.
///
/// Each mutation runs as:
/// 1. take the board's lock
/// 2. check the board and item exist
/// 3. plan new positions from a fresh snapshot
/// 4. write the plan to the store as one batch
/// 5. release the lock and publish one change event
///
/// A failure in steps 2-4 returns before anything is published.
pub struct Coordinator<S> {
    store: S,
    hub: Arc<ChangeHub>,
    locks: BoardLocks,
    config: CoordinatorConfig,
}

impl<S: ItemStore> Coordinator<S> {
    /// Create a coordinator with its own hub and default config.
    pub fn new(store: S) -> Self {
        Self::with_config(store, CoordinatorConfig::default())
    }

    pub fn with_config(store: S, config: CoordinatorConfig) -> Self {
        Self::with_hub(store, Arc::new(ChangeHub::new()), config)
    }

    /// Create a coordinator publishing to an existing hub.
    pub fn with_hub(store: S, hub: Arc<ChangeHub>, config: CoordinatorConfig) -> Self {
        Self {
            store,
            hub,
            locks: BoardLocks::new(),
            config,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn hub(&self) -> &Arc<ChangeHub> {
        &self.hub
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    // --- Ordered mutations ---

    /// Add an item at the end of a board.
    pub fn append_item(&self, board: BoardId, details: ItemDetails) -> Result<Item> {
        let guard = self.locks.lock(board);

        let list = self.snapshot(board)?;
        let position = list.append_position();

        let item = self.store.create_item(NewItem {
            board_id: board,
            position,
            details,
        })?;

        drop(guard);
        tracing::debug!(board = %board, item = %item.id, position = %position, "appended item");
        self.hub.publish(board);

        Ok(item)
    }

    /// Move an item to `target`, shifting the items in between.
    ///
    /// Out-of-range targets are clamped or rejected per
    /// [`CoordinatorConfig::position_policy`]. Moving onto the current
    /// position writes nothing but still counts as a change.
    pub fn move_item(&self, board: BoardId, item: ItemId, target: i64) -> Result<()> {
        let guard = self.locks.lock(board);

        let list = self.snapshot(board)?;
        let from = list
            .position_of(item)
            .ok_or(BoardError::ItemNotFound(item))?;
        let to = list.resolve_target(target, self.config.position_policy)?;

        let plan = list.plan_move(item, to)?;
        if !plan.is_empty() {
            self.store.apply_batch(WriteBatch::from_changes(&plan))?;
        }

        drop(guard);
        tracing::debug!(
            board = %board,
            item = %item,
            from = %from,
            to = %to,
            shifted = plan.len().saturating_sub(1),
            "moved item"
        );
        self.hub.publish(board);

        Ok(())
    }

    /// Delete an item and close the gap it leaves.
    pub fn remove_item(&self, board: BoardId, item: ItemId) -> Result<()> {
        let guard = self.locks.lock(board);

        let list = self.snapshot(board)?;
        let plan = list.plan_remove(item)?;

        let batch = WriteBatch::from_changes(&plan).delete(item);
        self.store.apply_batch(batch)?;

        drop(guard);
        tracing::debug!(board = %board, item = %item, shifted = plan.len(), "removed item");
        self.hub.publish(board);

        Ok(())
    }

    // --- Payload mutations ---

    /// Replace an item's title, description, priority, due date, and
    /// assignee. Completion is left as is; use [`Coordinator::toggle_complete`].
    pub fn update_item(&self, item: ItemId, details: ItemDetails) -> Result<Item> {
        self.modify_details(item, |current| ItemDetails {
            is_completed: current.is_completed,
            ..details
        })
    }

    /// Flip an item's completion flag.
    pub fn toggle_complete(&self, item: ItemId) -> Result<Item> {
        self.modify_details(item, |current| ItemDetails {
            is_completed: !current.is_completed,
            ..current.clone()
        })
    }

    fn modify_details(
        &self,
        id: ItemId,
        change: impl FnOnce(&ItemDetails) -> ItemDetails,
    ) -> Result<Item> {
        let board = self.get_item(id)?.board_id;
        let guard = self.locks.lock(board);

        // Re-read under the lock; the item may have been removed meanwhile
        let mut item = self.get_item(id)?;
        let details = change(&item.details);
        self.store.update_item_details(id, details.clone())?;
        item.details = details;

        drop(guard);
        tracing::debug!(board = %board, item = %id, "updated item details");
        self.hub.publish(board);

        Ok(item)
    }

    // --- Reads ---

    /// Get an item.
    pub fn get_item(&self, item: ItemId) -> Result<Item> {
        self.store
            .get_item(item)?
            .ok_or(BoardError::ItemNotFound(item))
    }

    /// Items of a board ordered by position.
    pub fn list_items(&self, board: BoardId) -> Result<Vec<Item>> {
        self.ensure_board(board)?;
        Ok(self.store.list_items_by_board(board)?)
    }

    /// Check that a board's positions are dense.
    pub fn audit_board(&self, board: BoardId) -> Result<()> {
        let list = self.snapshot(board)?;
        if list.is_dense() {
            return Ok(());
        }

        let positions = list.positions();
        tracing::warn!(board = %board, positions = ?positions, "board positions are not dense");
        Err(BoardError::DensityViolation { board, positions })
    }

    // --- Subscriptions ---

    /// Subscribe to changes on every board.
    pub fn subscribe(&self) -> SubscriptionHandle {
        self.hub.subscribe_all()
    }

    /// Subscribe to changes on one board.
    pub fn subscribe_board(&self, board: BoardId) -> SubscriptionHandle {
        self.hub.subscribe_board(board)
    }

    /// Unsubscribe; a no-op if already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.hub.unsubscribe(id);
    }

    // --- Internal ---

    fn ensure_board(&self, board: BoardId) -> Result<()> {
        if self.store.board_exists(board)? {
            Ok(())
        } else {
            Err(BoardError::BoardNotFound(board))
        }
    }

    /// Read a board's current order.
    fn snapshot(&self, board: BoardId) -> Result<OrderedList> {
        self.ensure_board(board)?;
        let items = self.store.list_items_by_board(board)?;
        Ok(OrderedList::from_items(board, &items))
    }
}
