//! Ordered list management for boards.
//!
//! Keeps each board's item positions a dense total order (`0..N`):
//! - [`OrderedList`] plans appends, moves, and removals from a snapshot
//! - [`BoardLocks`] serializes mutators of the same board
//!
//! Plans are lists of [`PositionChange`]s; the caller writes them to the
//! store as one batch while holding the board's lock.

mod list;
mod locks;

pub use list::{OrderedList, PositionChange, PositionPolicy};
pub use locks::{BoardGuard, BoardLocks};
