//! Position planning for a single board's ordered list.

use crate::error::{BoardError, Result};
use crate::types::{BoardId, Item, ItemId, Position};

/// What to do with a move target outside `[0, len-1]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum PositionPolicy {
    /// Silently clamp to the nearest bound.
    #[default]
    Clamp,
    /// Fail with [`BoardError::InvalidPosition`].
    Reject,
}

/// A single item's position change, produced by a plan.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PositionChange {
    pub item: ItemId,
    pub from: Position,
    pub to: Position,
}

/// Snapshot of one board's order, used to plan mutations.
///
/// Plans assume the snapshot is dense (positions `0..len`). The list never
/// re-checks that on its own; call [`OrderedList::is_dense`] for diagnostics.
#[derive(Clone, Debug)]
pub struct OrderedList {
    board: BoardId,
    /// `(item, position)` sorted by position.
    entries: Vec<(ItemId, Position)>,
}

impl OrderedList {
    /// Build from a board's items in any order.
    pub fn from_items(board: BoardId, items: &[Item]) -> Self {
        let mut entries: Vec<(ItemId, Position)> = items
            .iter()
            .filter(|item| item.board_id == board)
            .map(|item| (item.id, item.position))
            .collect();
        entries.sort_by_key(|(id, pos)| (*pos, *id));
        Self { board, entries }
    }

    /// Empty list for a board.
    pub fn empty(board: BoardId) -> Self {
        Self {
            board,
            entries: Vec::new(),
        }
    }

    pub fn board(&self) -> BoardId {
        self.board
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Current position of an item, if it is on this board.
    pub fn position_of(&self, item: ItemId) -> Option<Position> {
        self.entries
            .iter()
            .find(|(id, _)| *id == item)
            .map(|(_, pos)| *pos)
    }

    /// Item ids in position order.
    pub fn order(&self) -> Vec<ItemId> {
        self.entries.iter().map(|(id, _)| *id).collect()
    }

    /// Positions in ascending order.
    pub fn positions(&self) -> Vec<Position> {
        self.entries.iter().map(|(_, pos)| *pos).collect()
    }

    /// True if positions are exactly `0..len` with no gaps or repeats.
    pub fn is_dense(&self) -> bool {
        self.entries
            .iter()
            .enumerate()
            .all(|(i, (_, pos))| pos.as_usize() == i)
    }

    /// Position for a newly appended item: one past the current maximum.
    pub fn append_position(&self) -> Position {
        self.entries
            .iter()
            .map(|(_, pos)| *pos)
            .max()
            .map(Position::next)
            .unwrap_or_default()
    }

    /// Resolve a caller-supplied target into a valid position for this list.
    ///
    /// The list must be non-empty (a move always targets an existing item).
    pub fn resolve_target(&self, requested: i64, policy: PositionPolicy) -> Result<Position> {
        let len = self.len();
        let last = len.saturating_sub(1) as i64;

        if (0..=last).contains(&requested) && len > 0 {
            return Ok(Position(requested as u64));
        }

        match policy {
            PositionPolicy::Clamp => Ok(Position(requested.clamp(0, last) as u64)),
            PositionPolicy::Reject => Err(BoardError::InvalidPosition { requested, len }),
        }
    }

    /// Plan moving `item` to `target`.
    ///
    /// Only the items whose position actually changes appear in the plan,
    /// the moved item included. Moving onto the current position yields an
    /// empty plan.
    pub fn plan_move(&self, item: ItemId, target: Position) -> Result<Vec<PositionChange>> {
        let old = self
            .position_of(item)
            .ok_or(BoardError::ItemNotFound(item))?;

        let mut changes = Vec::new();

        if target < old {
            for (id, pos) in &self.entries {
                if *pos >= target && *pos < old {
                    changes.push(PositionChange {
                        item: *id,
                        from: *pos,
                        to: pos.next(),
                    });
                }
            }
        } else if target > old {
            for (id, pos) in &self.entries {
                if *pos > old && *pos <= target {
                    changes.push(PositionChange {
                        item: *id,
                        from: *pos,
                        to: pos.prev().unwrap_or_default(),
                    });
                }
            }
        } else {
            return Ok(changes);
        }

        changes.push(PositionChange {
            item,
            from: old,
            to: target,
        });
        Ok(changes)
    }

    /// Plan the shifts that close the gap left by removing `item`.
    ///
    /// The removed item itself is not part of the plan.
    pub fn plan_remove(&self, item: ItemId) -> Result<Vec<PositionChange>> {
        let removed = self
            .position_of(item)
            .ok_or(BoardError::ItemNotFound(item))?;

        Ok(self
            .entries
            .iter()
            .filter(|(_, pos)| *pos > removed)
            .map(|(id, pos)| PositionChange {
                item: *id,
                from: *pos,
                to: pos.prev().unwrap_or_default(),
            })
            .collect())
    }

    /// Apply a plan to this snapshot.
    pub fn apply(&mut self, changes: &[PositionChange]) {
        for change in changes {
            if let Some(entry) = self.entries.iter_mut().find(|(id, _)| *id == change.item) {
                entry.1 = change.to;
            }
        }
        self.entries.sort_by_key(|(id, pos)| (*pos, *id));
    }

    /// Insert an item at a position without shifting anything.
    pub fn insert(&mut self, item: ItemId, position: Position) {
        self.entries.push((item, position));
        self.entries.sort_by_key(|(id, pos)| (*pos, *id));
    }

    /// Drop an item from the snapshot without shifting anything.
    pub fn remove(&mut self, item: ItemId) {
        self.entries.retain(|(id, _)| *id != item);
    }
}
