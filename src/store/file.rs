//! Journal-backed item store.

use super::journal::Journal;
use super::memory::InMemoryItemStore;
use super::table::TableOp;
use super::{ItemStore, WriteBatch};
use crate::error::{StoreError, StoreResult};
use crate::types::{Board, BoardId, Item, ItemDetails, ItemId, NewItem, Position};
use fs2::FileExt;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

/// Magic bytes for the store manifest.
const STORE_MAGIC: &[u8; 4] = b"BSS\0";

/// Current store format version.
const STORE_VERSION: u8 = 1;

const JOURNAL_FILE: &str = "boards.journal";

/// File store configuration.
#[derive(Clone, Debug)]
pub struct FileStoreConfig {
    /// Directory holding the manifest, lock, and journal.
    pub path: PathBuf,

    /// Whether to create the store if it doesn't exist.
    pub create_if_missing: bool,

    /// fsync each journal entry before applying it.
    pub sync_writes: bool,
}

impl Default for FileStoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./boards"),
            create_if_missing: true,
            sync_writes: true,
        }
    }
}

/// Item store that journals every write to disk.
///
/// The full table lives in memory; the journal is the durable copy and is
/// replayed on open. A write is appended to the journal before it becomes
/// visible, so a failed append leaves both memory and disk unchanged.
pub struct FileItemStore {
    config: FileStoreConfig,

    /// Lock file for exclusive access.
    _lock_file: File,

    memory: InMemoryItemStore,

    journal: Journal,
}

impl FileItemStore {
    /// Open an existing store or create a new one.
    pub fn open_or_create(config: FileStoreConfig) -> StoreResult<Self> {
        if config.path.join("MANIFEST").exists() {
            Self::open(config)
        } else if config.create_if_missing {
            Self::create(config)
        } else {
            Err(StoreError::NotInitialized)
        }
    }

    /// Create a new store. Fails if the directory already holds one.
    pub fn create(config: FileStoreConfig) -> StoreResult<Self> {
        fs::create_dir_all(&config.path)?;
        let lock_file = Self::acquire_lock(&config.path)?;

        let journal_path = config.path.join(JOURNAL_FILE);
        if config.path.join("MANIFEST").exists() || journal_path.exists() {
            return Err(StoreError::AlreadyExists(config.path.display().to_string()));
        }

        Self::write_manifest(&config.path)?;
        let (journal, _) = Journal::open(journal_path, config.sync_writes)?;

        tracing::info!(path = %config.path.display(), "created board store");

        Ok(Self {
            config,
            _lock_file: lock_file,
            memory: InMemoryItemStore::new(),
            journal,
        })
    }

    /// Open an existing store, replaying its journal.
    pub fn open(config: FileStoreConfig) -> StoreResult<Self> {
        Self::verify_manifest(&config.path)?;

        let lock_file = Self::acquire_lock(&config.path)?;
        let (journal, entries) =
            Journal::open(config.path.join(JOURNAL_FILE), config.sync_writes)?;

        let memory = InMemoryItemStore::new();
        let replayed = entries.len();
        for entry in entries {
            let seq = entry.seq;
            memory.replay(entry.ops).map_err(|e| {
                StoreError::Corruption(format!("journal entry {} does not apply: {}", seq, e))
            })?;
        }

        tracing::info!(
            path = %config.path.display(),
            entries = replayed,
            items = memory.item_count(),
            "opened board store"
        );

        Ok(Self {
            config,
            _lock_file: lock_file,
            memory,
            journal,
        })
    }

    /// Create a board.
    pub fn create_board(&self, name: &str, color: Option<&str>) -> StoreResult<Board> {
        self.memory
            .create_board_with(name, color, &|ops| self.log(ops))
    }

    /// Delete a board and every item on it.
    pub fn delete_board(&self, board: BoardId) -> StoreResult<()> {
        self.memory
            .commit_with(vec![TableOp::DeleteBoard(board)], &|ops| self.log(ops))
    }

    /// Get a board by ID.
    pub fn get_board(&self, board: BoardId) -> Option<Board> {
        self.memory.get_board(board)
    }

    /// All boards ordered by ID.
    pub fn list_boards(&self) -> Vec<Board> {
        self.memory.list_boards()
    }

    /// Total number of items across boards.
    pub fn item_count(&self) -> usize {
        self.memory.item_count()
    }

    /// Store directory.
    pub fn path(&self) -> &Path {
        &self.config.path
    }

    fn log(&self, ops: &[TableOp]) -> StoreResult<()> {
        self.journal.append(ops).map(|_| ())
    }

    fn write_manifest(path: &Path) -> StoreResult<()> {
        use std::io::Write;

        let mut file = File::create(path.join("MANIFEST"))?;
        file.write_all(STORE_MAGIC)?;
        file.write_all(&[STORE_VERSION])?;
        file.sync_all()?;

        Ok(())
    }

    fn verify_manifest(path: &Path) -> StoreResult<()> {
        use std::io::Read;

        let mut file = File::open(path.join("MANIFEST"))?;

        let mut magic = [0u8; 4];
        file.read_exact(&mut magic)?;
        if &magic != STORE_MAGIC {
            return Err(StoreError::InvalidFormat("Invalid store magic".into()));
        }

        let mut version = [0u8; 1];
        file.read_exact(&mut version)?;
        if version[0] != STORE_VERSION {
            return Err(StoreError::InvalidFormat(format!(
                "Unsupported store version: {}",
                version[0]
            )));
        }

        Ok(())
    }

    fn acquire_lock(path: &Path) -> StoreResult<File> {
        let lock_file = File::create(path.join("LOCK"))?;

        lock_file
            .try_lock_exclusive()
            .map_err(|_| StoreError::Locked)?;

        Ok(lock_file)
    }
}

impl ItemStore for FileItemStore {
    fn board_exists(&self, board: BoardId) -> StoreResult<bool> {
        self.memory.board_exists(board)
    }

    fn get_item(&self, id: ItemId) -> StoreResult<Option<Item>> {
        self.memory.get_item(id)
    }

    fn list_items_by_board(&self, board: BoardId) -> StoreResult<Vec<Item>> {
        self.memory.list_items_by_board(board)
    }

    fn create_item(&self, item: NewItem) -> StoreResult<Item> {
        self.memory.create_item_with(item, &|ops| self.log(ops))
    }

    fn update_item_position(&self, id: ItemId, position: Position) -> StoreResult<()> {
        self.memory.commit_with(
            vec![TableOp::SetPosition { item: id, position }],
            &|ops| self.log(ops),
        )
    }

    fn update_item_details(&self, id: ItemId, details: ItemDetails) -> StoreResult<()> {
        self.memory.commit_with(
            vec![TableOp::SetDetails { item: id, details }],
            &|ops| self.log(ops),
        )
    }

    fn delete_item(&self, id: ItemId) -> StoreResult<()> {
        self.memory
            .commit_with(vec![TableOp::DeleteItem(id)], &|ops| self.log(ops))
    }

    fn apply_batch(&self, batch: WriteBatch) -> StoreResult<()> {
        if batch.is_empty() {
            return Ok(());
        }
        self.memory
            .commit_with(batch.into_table_ops(), &|ops| self.log(ops))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config(dir: &TempDir) -> FileStoreConfig {
        FileStoreConfig {
            path: dir.path().join("store"),
            create_if_missing: true,
            sync_writes: true,
        }
    }

    fn new_item(board: BoardId, pos: u64, title: &str) -> NewItem {
        NewItem {
            board_id: board,
            position: Position(pos),
            details: ItemDetails::titled(title),
        }
    }

    #[test]
    fn test_reopen_restores_items() {
        let dir = TempDir::new().unwrap();

        let (board, a, b) = {
            let store = FileItemStore::open_or_create(config(&dir)).unwrap();
            let board = store.create_board("Backlog", Some("blue")).unwrap();
            let a = store.create_item(new_item(board.id, 0, "a")).unwrap();
            let b = store.create_item(new_item(board.id, 1, "b")).unwrap();
            store
                .apply_batch(
                    WriteBatch::new()
                        .set_position(b.id, Position(0))
                        .set_position(a.id, Position(1)),
                )
                .unwrap();
            (board, a, b)
        };

        let store = FileItemStore::open_or_create(config(&dir)).unwrap();
        assert_eq!(store.get_board(board.id).unwrap().name, "Backlog");

        let order: Vec<ItemId> = store
            .list_items_by_board(board.id)
            .unwrap()
            .iter()
            .map(|i| i.id)
            .collect();
        assert_eq!(order, vec![b.id, a.id]);

        // New ids continue after replayed ones
        let c = store.create_item(new_item(board.id, 2, "c")).unwrap();
        assert!(c.id > b.id);
    }

    #[test]
    fn test_rejected_write_is_not_journaled() {
        let dir = TempDir::new().unwrap();

        {
            let store = FileItemStore::create(config(&dir)).unwrap();
            let board = store.create_board("b", None).unwrap();
            store.create_item(new_item(board.id, 0, "a")).unwrap();
            assert!(store.delete_item(ItemId(77)).is_err());
        }

        let store = FileItemStore::open(config(&dir)).unwrap();
        assert_eq!(store.item_count(), 1);
    }

    #[test]
    fn test_create_refuses_existing_store() {
        let dir = TempDir::new().unwrap();

        let board = {
            let store = FileItemStore::create(config(&dir)).unwrap();
            let board = store.create_board("kept", None).unwrap();
            store.create_item(new_item(board.id, 0, "a")).unwrap();
            board
        };

        assert!(matches!(
            FileItemStore::create(config(&dir)),
            Err(StoreError::AlreadyExists(_))
        ));

        // Existing data is untouched and still opens
        let store = FileItemStore::open(config(&dir)).unwrap();
        assert!(store.board_exists(board.id).unwrap());
        assert_eq!(store.item_count(), 1);
    }

    #[test]
    fn test_create_refuses_orphaned_journal() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir);
        fs::create_dir_all(&config.path).unwrap();
        fs::write(config.path.join(JOURNAL_FILE), b"BSJ\0\x01").unwrap();

        assert!(matches!(
            FileItemStore::create(config.clone()),
            Err(StoreError::AlreadyExists(_))
        ));
        assert!(!config.path.join("MANIFEST").exists());
    }

    #[test]
    fn test_second_open_is_locked() {
        let dir = TempDir::new().unwrap();
        let _store = FileItemStore::create(config(&dir)).unwrap();

        assert!(matches!(
            FileItemStore::open(config(&dir)),
            Err(StoreError::Locked)
        ));
    }

    #[test]
    fn test_missing_store_without_create() {
        let dir = TempDir::new().unwrap();
        let result = FileItemStore::open_or_create(FileStoreConfig {
            create_if_missing: false,
            ..config(&dir)
        });
        assert!(matches!(result, Err(StoreError::NotInitialized)));
    }

    #[test]
    fn test_delete_board_survives_reopen() {
        let dir = TempDir::new().unwrap();

        let board = {
            let store = FileItemStore::create(config(&dir)).unwrap();
            let board = store.create_board("tmp", None).unwrap();
            store.create_item(new_item(board.id, 0, "a")).unwrap();
            store.delete_board(board.id).unwrap();
            board
        };

        let store = FileItemStore::open(config(&dir)).unwrap();
        assert!(!store.board_exists(board.id).unwrap());
        assert_eq!(store.item_count(), 0);
        assert_eq!(store.path(), dir.path().join("store"));
    }
}
