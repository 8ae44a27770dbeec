//! Snapshot-file storage driver.
//!
//! A [`FileStore`] serves reads and writes from an in-memory store and
//! persists the whole state as one snapshot file when a unit of work
//! commits. The file is replaced atomically: the snapshot is written to a
//! sibling temp file, synced, then renamed over the old one.
//!
//! Units of work are serialized by a gate lock. A failed unit restores the
//! state as of its start, which is the last committed state.

use std::ffi::OsString;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::{debug, warn};

use super::{MemoryStore, StorageDriver, StoreStats};
use crate::codec::{decode_snapshot, encode_snapshot, encode_snapshot_compressed};
use crate::error::{CatalogError, StorageError};
use crate::model::{Id, Item, ItemKind, RichVersion, StructureVersion, TagMap, VersionSuccessor};

/// A store persisted as a single snapshot file.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    compression_level: Option<i32>,
    memory: MemoryStore,
    gate: Mutex<()>,
}

impl FileStore {
    /// Opens the snapshot at `path`, or starts empty when it does not exist.
    ///
    /// With a `compression_level`, commits write zstd-compressed snapshots.
    /// Either form is accepted on open.
    pub fn open(path: impl Into<PathBuf>, compression_level: Option<i32>) -> Result<Self, StorageError> {
        let path = path.into();
        let memory = match fs::read(&path) {
            Ok(bytes) => {
                let state = decode_snapshot(&bytes)?;
                debug!(path = %path.display(), bytes = bytes.len(), "snapshot loaded");
                MemoryStore::from_state(state)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => MemoryStore::new(),
            Err(source) => return Err(StorageError::Io { path, source }),
        };
        Ok(Self {
            path,
            compression_level,
            memory,
            gate: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The in-memory store serving reads.
    pub fn memory(&self) -> &MemoryStore {
        &self.memory
    }

    pub fn stats(&self) -> StoreStats {
        self.memory.stats()
    }

    /// Sibling file the next snapshot is written to before the rename: the
    /// full file name plus `.tmp`, so `a.pcat` and `a.json` never share one.
    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().map(OsString::from).unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    /// Writes the current state to the snapshot file.
    pub fn commit(&self) -> Result<(), StorageError> {
        let state = self.memory.snapshot();
        let bytes = match self.compression_level {
            Some(level) => encode_snapshot_compressed(&state, level)?,
            None => encode_snapshot(&state)?,
        };

        let tmp = self.temp_path();
        let mut file = fs::File::create(&tmp).map_err(io_error(&tmp))?;
        file.write_all(&bytes).map_err(io_error(&tmp))?;
        file.sync_all().map_err(io_error(&tmp))?;
        drop(file);
        fs::rename(&tmp, &self.path).map_err(io_error(&self.path))?;

        debug!(path = %self.path.display(), bytes = bytes.len(), "snapshot committed");
        Ok(())
    }
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> StorageError {
    let path = path.to_path_buf();
    move |source| StorageError::Io { path, source }
}

impl StorageDriver for FileStore {
    fn insert_item(&self, item: &Item) -> Result<(), StorageError> {
        self.memory.insert_item(item)
    }

    fn item(&self, id: Id) -> Result<Option<Item>, StorageError> {
        self.memory.item(id)
    }

    fn item_by_source_key(
        &self,
        kind: ItemKind,
        source_key: &str,
    ) -> Result<Option<Item>, StorageError> {
        self.memory.item_by_source_key(kind, source_key)
    }

    fn item_tags(&self, id: Id) -> Result<Option<TagMap>, StorageError> {
        self.memory.item_tags(id)
    }

    fn insert_version(&self, id: Id, item_id: Id) -> Result<(), StorageError> {
        self.memory.insert_version(id, item_id)
    }

    fn version_exists(&self, id: Id) -> Result<bool, StorageError> {
        self.memory.version_exists(id)
    }

    fn insert_rich_version(&self, version: &RichVersion) -> Result<(), StorageError> {
        self.memory.insert_rich_version(version)
    }

    fn rich_version(&self, id: Id) -> Result<Option<RichVersion>, StorageError> {
        self.memory.rich_version(id)
    }

    fn insert_structure_version(&self, structure: &StructureVersion) -> Result<(), StorageError> {
        self.memory.insert_structure_version(structure)
    }

    fn structure_version(&self, id: Id) -> Result<Option<StructureVersion>, StorageError> {
        self.memory.structure_version(id)
    }

    fn insert_successor(&self, item_id: Id, edge: &VersionSuccessor) -> Result<(), StorageError> {
        self.memory.insert_successor(item_id, edge)
    }

    fn successor(&self, edge_id: Id) -> Result<Option<VersionSuccessor>, StorageError> {
        self.memory.successor(edge_id)
    }

    fn history_edge_ids(&self, item_id: Id) -> Result<Vec<Id>, StorageError> {
        self.memory.history_edge_ids(item_id)
    }

    fn delete_successor(&self, item_id: Id, edge_id: Id) -> Result<(), StorageError> {
        self.memory.delete_successor(item_id, edge_id)
    }

    fn delete_version_row(&self, id: Id) -> Result<(), StorageError> {
        self.memory.delete_version_row(id)
    }

    fn delete_type_rows(&self, id: Id, kind: ItemKind) -> Result<(), StorageError> {
        self.memory.delete_type_rows(id, kind)
    }

    fn delete_tag_rows(&self, owner_id: Id) -> Result<(), StorageError> {
        self.memory.delete_tag_rows(owner_id)
    }

    fn unit_of_work<T, F>(&self, f: F) -> Result<T, CatalogError>
    where
        F: FnOnce() -> Result<T, CatalogError>,
    {
        let _gate = self.gate.lock();
        let committed = self.memory.snapshot();
        let result = f().and_then(|value| {
            self.commit()?;
            Ok(value)
        });
        if let Err(e) = &result {
            warn!(path = %self.path.display(), error = %e, "unit of work failed, restoring last commit");
            self.memory.replace(committed);
        }
        result
    }
}
