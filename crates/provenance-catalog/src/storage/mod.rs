//! Storage driver contract and bundled drivers.
//!
//! The catalog engine reaches persisted state only through
//! [`StorageDriver`]. A backend implements the relation-level operations
//! below; history algorithms, validation and id allocation stay in the
//! engine.
//!
//! Lookups return `Option` so that "no such row" is a value, never an error.
//! Deletes of rows that do not exist succeed.

pub mod file;
pub mod memory;
pub mod state;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use state::{ItemRow, RichVersionRow, StoreState, StoreStats};

use crate::error::{CatalogError, StorageError};
use crate::model::{Id, Item, ItemKind, RichVersion, StructureVersion, TagMap, VersionSuccessor};

/// Operations the catalog engine requires from a storage backend.
pub trait StorageDriver: Send + Sync {
    // ==================== Items ====================

    /// Persists an item row and its tags.
    ///
    /// Fails with [`StorageError::Conflict`] when another item of the same
    /// kind already uses the source key.
    fn insert_item(&self, item: &Item) -> Result<(), StorageError>;

    fn item(&self, id: Id) -> Result<Option<Item>, StorageError>;

    fn item_by_source_key(
        &self,
        kind: ItemKind,
        source_key: &str,
    ) -> Result<Option<Item>, StorageError>;

    /// Tags of an item; `None` when the item does not exist.
    fn item_tags(&self, id: Id) -> Result<Option<TagMap>, StorageError>;

    // ==================== Versions ====================

    /// Registers a bare version id under `item_id`.
    fn insert_version(&self, id: Id, item_id: Id) -> Result<(), StorageError>;

    fn version_exists(&self, id: Id) -> Result<bool, StorageError>;

    /// Persists the rich fields, details and tags of a registered version.
    fn insert_rich_version(&self, version: &RichVersion) -> Result<(), StorageError>;

    fn rich_version(&self, id: Id) -> Result<Option<RichVersion>, StorageError>;

    /// Persists the schema of a registered structure version.
    fn insert_structure_version(&self, structure: &StructureVersion) -> Result<(), StorageError>;

    fn structure_version(&self, id: Id) -> Result<Option<StructureVersion>, StorageError>;

    // ==================== Successors ====================

    /// Persists a successor edge as part of `item_id`'s history.
    fn insert_successor(&self, item_id: Id, edge: &VersionSuccessor) -> Result<(), StorageError>;

    fn successor(&self, edge_id: Id) -> Result<Option<VersionSuccessor>, StorageError>;

    /// Ids of every successor edge in `item_id`'s history.
    fn history_edge_ids(&self, item_id: Id) -> Result<Vec<Id>, StorageError>;

    fn delete_successor(&self, item_id: Id, edge_id: Id) -> Result<(), StorageError>;

    // ==================== Deletes ====================

    /// Deletes the version row and its rich version row.
    fn delete_version_row(&self, id: Id) -> Result<(), StorageError>;

    /// Deletes kind-specific rows: version details, or the attribute rows
    /// of a structure version.
    fn delete_type_rows(&self, id: Id, kind: ItemKind) -> Result<(), StorageError>;

    fn delete_tag_rows(&self, owner_id: Id) -> Result<(), StorageError>;

    // ==================== Transactions ====================

    /// Runs `f` as one unit of work: committed when it returns `Ok`,
    /// abandoned when it returns `Err`.
    ///
    /// The default runs `f` with no transactional guarantee.
    fn unit_of_work<T, F>(&self, f: F) -> Result<T, CatalogError>
    where
        F: FnOnce() -> Result<T, CatalogError>,
        Self: Sized,
    {
        f()
    }
}
