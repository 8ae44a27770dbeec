//! In-memory storage driver.
//!
//! The reference implementation of [`StorageDriver`]. All relations sit
//! behind one `RwLock`, so each call observes a consistent state.

use parking_lot::RwLock;

use super::{StorageDriver, StoreState, StoreStats};
use crate::error::StorageError;
use crate::model::{Id, Item, ItemKind, RichVersion, StructureVersion, TagMap, VersionSuccessor};

/// Thread-safe in-memory store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<StoreState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding `state`.
    pub fn from_state(mut state: StoreState) -> Self {
        state.reindex();
        Self {
            state: RwLock::new(state),
        }
    }

    /// Returns a copy of the full contents.
    pub fn snapshot(&self) -> StoreState {
        self.state.read().clone()
    }

    /// Replaces the full contents.
    pub fn replace(&self, mut state: StoreState) {
        state.reindex();
        *self.state.write() = state;
    }

    pub fn stats(&self) -> StoreStats {
        self.state.read().stats()
    }

    /// Every item, version and successor id in the store.
    pub fn ids(&self) -> Vec<Id> {
        self.state.read().ids().collect()
    }

    /// Clears all data
    pub fn clear(&self) {
        *self.state.write() = StoreState::default();
    }
}

impl StorageDriver for MemoryStore {
    fn insert_item(&self, item: &Item) -> Result<(), StorageError> {
        self.state.write().insert_item(item)
    }

    fn item(&self, id: Id) -> Result<Option<Item>, StorageError> {
        Ok(self.state.read().item(id))
    }

    fn item_by_source_key(
        &self,
        kind: ItemKind,
        source_key: &str,
    ) -> Result<Option<Item>, StorageError> {
        Ok(self.state.read().item_by_source_key(kind, source_key))
    }

    fn item_tags(&self, id: Id) -> Result<Option<TagMap>, StorageError> {
        Ok(self.state.read().item_tags(id))
    }

    fn insert_version(&self, id: Id, item_id: Id) -> Result<(), StorageError> {
        self.state.write().insert_version(id, item_id)
    }

    fn version_exists(&self, id: Id) -> Result<bool, StorageError> {
        Ok(self.state.read().versions.contains_key(&id))
    }

    fn insert_rich_version(&self, version: &RichVersion) -> Result<(), StorageError> {
        self.state.write().insert_rich_version(version)
    }

    fn rich_version(&self, id: Id) -> Result<Option<RichVersion>, StorageError> {
        self.state.read().rich_version(id)
    }

    fn insert_structure_version(&self, structure: &StructureVersion) -> Result<(), StorageError> {
        self.state.write().insert_structure_version(structure)
    }

    fn structure_version(&self, id: Id) -> Result<Option<StructureVersion>, StorageError> {
        Ok(self.state.read().structure_versions.get(&id).cloned())
    }

    fn insert_successor(&self, item_id: Id, edge: &VersionSuccessor) -> Result<(), StorageError> {
        self.state.write().insert_successor(item_id, edge)
    }

    fn successor(&self, edge_id: Id) -> Result<Option<VersionSuccessor>, StorageError> {
        Ok(self.state.read().successors.get(&edge_id).copied())
    }

    fn history_edge_ids(&self, item_id: Id) -> Result<Vec<Id>, StorageError> {
        Ok(self.state.read().history_edge_ids(item_id))
    }

    fn delete_successor(&self, item_id: Id, edge_id: Id) -> Result<(), StorageError> {
        self.state.write().delete_successor(item_id, edge_id);
        Ok(())
    }

    fn delete_version_row(&self, id: Id) -> Result<(), StorageError> {
        self.state.write().delete_version_row(id);
        Ok(())
    }

    fn delete_type_rows(&self, id: Id, kind: ItemKind) -> Result<(), StorageError> {
        self.state.write().delete_type_rows(id, kind);
        Ok(())
    }

    fn delete_tag_rows(&self, owner_id: Id) -> Result<(), StorageError> {
        self.state.write().delete_tag_rows(owner_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ItemExtra, Tag, VersionDetails, tag_map};

    fn item(id: Id, kind: ItemKind, key: &str) -> Item {
        Item {
            id,
            kind,
            name: key.into(),
            source_key: key.into(),
            tags: tag_map([Tag::valued(id, "env", "prod")]),
            extra: ItemExtra::None,
        }
    }

    #[test]
    fn test_item_lookup() {
        let store = MemoryStore::new();
        store.insert_item(&item(1, ItemKind::Node, "a")).unwrap();
        assert_eq!(store.item(1).unwrap().unwrap().source_key, "a");
        assert_eq!(store.item(2).unwrap(), None);
        assert_eq!(store.item_tags(1).unwrap().unwrap().len(), 1);
        assert_eq!(store.item_tags(2).unwrap(), None);
        assert!(store.item_by_source_key(ItemKind::Node, "a").unwrap().is_some());
        assert!(store.item_by_source_key(ItemKind::Edge, "a").unwrap().is_none());
    }

    #[test]
    fn test_rich_version_rows() {
        let store = MemoryStore::new();
        store.insert_item(&item(1, ItemKind::Graph, "g")).unwrap();
        let version = RichVersion {
            id: 10,
            item_id: 1,
            tags: tag_map([Tag::valued(10, "n", 3)]),
            structure_version_id: None,
            reference: None,
            reference_parameters: Default::default(),
            details: VersionDetails::Graph {
                edge_version_ids: vec![4],
            },
        };
        assert!(matches!(
            store.insert_rich_version(&version),
            Err(StorageError::MissingRow { relation: "versions", .. })
        ));
        store.insert_version(10, 1).unwrap();
        store.insert_rich_version(&version).unwrap();
        assert_eq!(store.rich_version(10).unwrap(), Some(version));

        store.delete_type_rows(10, ItemKind::Graph).unwrap();
        store.delete_tag_rows(10).unwrap();
        store.delete_version_row(10).unwrap();
        assert_eq!(store.rich_version(10).unwrap(), None);
        assert!(!store.version_exists(10).unwrap());
        assert_eq!(store.stats().tag_owners, 1);
    }

    #[test]
    fn test_successor_history() {
        let store = MemoryStore::new();
        store.insert_item(&item(1, ItemKind::Node, "a")).unwrap();
        store
            .insert_successor(1, &VersionSuccessor::new(20, 0, 10))
            .unwrap();
        store
            .insert_successor(1, &VersionSuccessor::new(21, 10, 11))
            .unwrap();
        assert_eq!(store.history_edge_ids(1).unwrap(), vec![20, 21]);
        assert_eq!(store.successor(21).unwrap().unwrap().from_id, 10);
        store.delete_successor(1, 20).unwrap();
        assert_eq!(store.history_edge_ids(1).unwrap(), vec![21]);
        assert!(store.history_edge_ids(2).unwrap().is_empty());
    }

    #[test]
    fn test_snapshot_and_replace() {
        let store = MemoryStore::new();
        store.insert_item(&item(1, ItemKind::Node, "a")).unwrap();
        let snapshot = store.snapshot();
        store.clear();
        assert_eq!(store.stats().items, 0);
        store.replace(snapshot);
        assert!(store.item_by_source_key(ItemKind::Node, "a").unwrap().is_some());
        assert_eq!(store.ids(), vec![1]);
    }
}
