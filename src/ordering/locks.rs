//! Per-board mutual exclusion.

use crate::types::BoardId;
use parking_lot::lock_api::ArcMutexGuard;
use parking_lot::{Mutex, RawMutex};
use std::collections::HashMap;
use std::sync::Arc;

/// Registry of one mutex per board.
///
/// Mutators of the same board serialize on that board's mutex; different
/// boards never contend beyond the brief registry lookup. A board's entry
/// lives only while some guard holds or waits on it, so the registry stays
/// the size of the set of boards currently being mutated.
#[derive(Default)]
pub struct BoardLocks {
    locks: Mutex<HashMap<BoardId, Arc<Mutex<()>>>>,
}

/// Held for the duration of one board's critical section.
pub struct BoardGuard<'a> {
    registry: &'a BoardLocks,
    board: BoardId,
    guard: Option<ArcMutexGuard<RawMutex, ()>>,
}

impl BoardGuard<'_> {
    pub fn board(&self) -> BoardId {
        self.board
    }
}

impl Drop for BoardGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.registry.release(self.board);
    }
}

impl BoardLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get (or create) the mutex for a board.
    fn lock_for(&self, board: BoardId) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock();
        Arc::clone(
            locks
                .entry(board)
                .or_insert_with(|| Arc::new(Mutex::new(()))),
        )
    }

    /// Drop the board's entry if only the registry still references it.
    ///
    /// Holders and waiters keep their own `Arc`, cloned under the registry
    /// lock, so the count cannot rise while we look at it.
    fn release(&self, board: BoardId) {
        let mut locks = self.locks.lock();
        if matches!(locks.get(&board), Some(lock) if Arc::strong_count(lock) == 1) {
            locks.remove(&board);
        }
    }

    /// Block until this thread holds the board's lock.
    pub fn lock(&self, board: BoardId) -> BoardGuard<'_> {
        let guard = self.lock_for(board).lock_arc();
        BoardGuard {
            registry: self,
            board,
            guard: Some(guard),
        }
    }

    /// Take the board's lock only if nobody holds it.
    pub fn try_lock(&self, board: BoardId) -> Option<BoardGuard<'_>> {
        let guard = self.lock_for(board).try_lock_arc();
        match guard {
            Some(guard) => Some(BoardGuard {
                registry: self,
                board,
                guard: Some(guard),
            }),
            None => {
                self.release(board);
                None
            }
        }
    }

    /// Number of boards with a registered lock.
    pub fn len(&self) -> usize {
        self.locks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
