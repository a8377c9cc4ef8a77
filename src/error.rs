//! Error types for board mutations and item stores.

use crate::types::{BoardId, ItemId, Position};
use thiserror::Error;

/// Errors raised by an [`ItemStore`](crate::store::ItemStore) implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Item not found in store: {0}")]
    ItemNotFound(ItemId),

    #[error("Board not found in store: {0}")]
    BoardNotFound(BoardId),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Corruption detected: {0}")]
    Corruption(String),

    #[error("Invalid store format: {0}")]
    InvalidFormat(String),

    #[error("Store already exists at {0}")]
    AlreadyExists(String),

    #[error("Store is locked by another process")]
    Locked,

    #[error("Store not initialized")]
    NotInitialized,
}

impl From<rmp_serde::encode::Error> for StoreError {
    fn from(e: rmp_serde::encode::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

impl From<rmp_serde::decode::Error> for StoreError {
    fn from(e: rmp_serde::decode::Error) -> Self {
        StoreError::Deserialization(e.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

/// Errors surfaced by the mutation coordinator.
#[derive(Debug, Error)]
pub enum BoardError {
    #[error("Board not found: {0}")]
    BoardNotFound(BoardId),

    /// The item does not exist, or exists on a different board.
    #[error("Item not found: {0}")]
    ItemNotFound(ItemId),

    #[error("Invalid position {requested} (board has {len} items)")]
    InvalidPosition { requested: i64, len: usize },

    #[error("Board {board} positions are not dense: {positions:?}")]
    DensityViolation {
        board: BoardId,
        positions: Vec<Position>,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl BoardError {
    /// True for the user-correctable "board or item absent" class.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            BoardError::BoardNotFound(_)
                | BoardError::ItemNotFound(_)
                | BoardError::Store(StoreError::BoardNotFound(_))
                | BoardError::Store(StoreError::ItemNotFound(_))
        )
    }
}

/// Result type for coordinator operations.
pub type Result<T> = std::result::Result<T, BoardError>;

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;
