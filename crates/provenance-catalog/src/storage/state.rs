//! Relation-shaped store contents.
//!
//! [`StoreState`] holds one map per logical relation. Both the in-memory
//! driver and the snapshot codec work on it directly.

use std::collections::{BTreeMap, BTreeSet};

use rustc_hash::FxHashMap;

use crate::error::StorageError;
use crate::model::{
    Id, Item, ItemExtra, ItemKind, RichVersion, StructureVersion, TagMap, VersionDetails,
    VersionSuccessor,
};

/// An `items` row. Tags live in the tag relation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemRow {
    pub kind: ItemKind,
    pub name: String,
    pub source_key: String,
    pub extra: ItemExtra,
}

/// A `rich_versions` row. Tags and kind-specific details live elsewhere.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RichVersionRow {
    pub structure_version_id: Option<Id>,
    pub reference: Option<String>,
    pub reference_parameters: BTreeMap<String, String>,
}

/// Row counts per relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StoreStats {
    pub items: usize,
    pub tag_owners: usize,
    pub versions: usize,
    pub rich_versions: usize,
    pub structure_versions: usize,
    pub successors: usize,
}

/// The full contents of a store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreState {
    pub items: BTreeMap<Id, ItemRow>,
    /// owner id -> tags, for items and versions alike
    pub tags: BTreeMap<Id, TagMap>,
    /// version id -> owning item id
    pub versions: BTreeMap<Id, Id>,
    pub rich_versions: BTreeMap<Id, RichVersionRow>,
    /// kind-specific rows of rich versions
    pub details: BTreeMap<Id, VersionDetails>,
    pub structure_versions: BTreeMap<Id, StructureVersion>,
    pub successors: BTreeMap<Id, VersionSuccessor>,
    /// item id -> ids of its successor edges
    pub histories: BTreeMap<Id, BTreeSet<Id>>,
    source_keys: FxHashMap<(ItemKind, String), Id>,
}

impl StoreState {
    /// Rebuilds the source key index from the item rows.
    pub fn reindex(&mut self) {
        self.source_keys = self
            .items
            .iter()
            .map(|(id, row)| ((row.kind, row.source_key.clone()), *id))
            .collect();
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            items: self.items.len(),
            tag_owners: self.tags.len(),
            versions: self.versions.len(),
            rich_versions: self.rich_versions.len(),
            structure_versions: self.structure_versions.len(),
            successors: self.successors.len(),
        }
    }

    /// Every item, version and successor id in the store.
    pub fn ids(&self) -> impl Iterator<Item = Id> + '_ {
        self.items
            .keys()
            .chain(self.versions.keys())
            .chain(self.successors.keys())
            .copied()
    }

    pub fn insert_item(&mut self, item: &Item) -> Result<(), StorageError> {
        if self.items.contains_key(&item.id) {
            return Err(StorageError::DuplicateRow {
                relation: "items",
                id: item.id,
            });
        }
        let index_key = (item.kind, item.source_key.clone());
        if self.source_keys.contains_key(&index_key) {
            return Err(StorageError::Conflict {
                relation: "items",
                key: item.source_key.clone(),
            });
        }
        self.items.insert(
            item.id,
            ItemRow {
                kind: item.kind,
                name: item.name.clone(),
                source_key: item.source_key.clone(),
                extra: item.extra,
            },
        );
        self.source_keys.insert(index_key, item.id);
        self.put_tags(item.id, &item.tags);
        Ok(())
    }

    pub fn item(&self, id: Id) -> Option<Item> {
        let row = self.items.get(&id)?;
        Some(Item {
            id,
            kind: row.kind,
            name: row.name.clone(),
            source_key: row.source_key.clone(),
            tags: self.tags.get(&id).cloned().unwrap_or_default(),
            extra: row.extra,
        })
    }

    pub fn item_by_source_key(&self, kind: ItemKind, source_key: &str) -> Option<Item> {
        let id = self.source_keys.get(&(kind, source_key.to_string()))?;
        self.item(*id)
    }

    pub fn item_tags(&self, id: Id) -> Option<TagMap> {
        self.items
            .contains_key(&id)
            .then(|| self.tags.get(&id).cloned().unwrap_or_default())
    }

    pub fn insert_version(&mut self, id: Id, item_id: Id) -> Result<(), StorageError> {
        if self.versions.contains_key(&id) {
            return Err(StorageError::DuplicateRow {
                relation: "versions",
                id,
            });
        }
        if !self.items.contains_key(&item_id) {
            return Err(StorageError::MissingRow {
                relation: "items",
                id: item_id,
            });
        }
        self.versions.insert(id, item_id);
        Ok(())
    }

    pub fn insert_rich_version(&mut self, version: &RichVersion) -> Result<(), StorageError> {
        self.require_version(version.id)?;
        if self.rich_versions.contains_key(&version.id) {
            return Err(StorageError::DuplicateRow {
                relation: "rich_versions",
                id: version.id,
            });
        }
        self.rich_versions.insert(
            version.id,
            RichVersionRow {
                structure_version_id: version.structure_version_id,
                reference: version.reference.clone(),
                reference_parameters: version.reference_parameters.clone(),
            },
        );
        self.details.insert(version.id, version.details.clone());
        self.put_tags(version.id, &version.tags);
        Ok(())
    }

    pub fn rich_version(&self, id: Id) -> Result<Option<RichVersion>, StorageError> {
        let Some(row) = self.rich_versions.get(&id) else {
            return Ok(None);
        };
        let item_id = *self.versions.get(&id).ok_or(StorageError::MissingRow {
            relation: "versions",
            id,
        })?;
        let details = self.details.get(&id).cloned().ok_or(StorageError::MissingRow {
            relation: "version_details",
            id,
        })?;
        Ok(Some(RichVersion {
            id,
            item_id,
            tags: self.tags.get(&id).cloned().unwrap_or_default(),
            structure_version_id: row.structure_version_id,
            reference: row.reference.clone(),
            reference_parameters: row.reference_parameters.clone(),
            details,
        }))
    }

    pub fn insert_structure_version(
        &mut self,
        structure: &StructureVersion,
    ) -> Result<(), StorageError> {
        self.require_version(structure.id)?;
        if self.structure_versions.contains_key(&structure.id) {
            return Err(StorageError::DuplicateRow {
                relation: "structure_versions",
                id: structure.id,
            });
        }
        self.structure_versions
            .insert(structure.id, structure.clone());
        Ok(())
    }

    pub fn insert_successor(
        &mut self,
        item_id: Id,
        edge: &VersionSuccessor,
    ) -> Result<(), StorageError> {
        if self.successors.contains_key(&edge.id) {
            return Err(StorageError::DuplicateRow {
                relation: "version_successor",
                id: edge.id,
            });
        }
        if !self.items.contains_key(&item_id) {
            return Err(StorageError::MissingRow {
                relation: "items",
                id: item_id,
            });
        }
        self.successors.insert(edge.id, *edge);
        self.histories.entry(item_id).or_default().insert(edge.id);
        Ok(())
    }

    pub fn history_edge_ids(&self, item_id: Id) -> Vec<Id> {
        self.histories
            .get(&item_id)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn delete_successor(&mut self, item_id: Id, edge_id: Id) {
        self.successors.remove(&edge_id);
        if let Some(ids) = self.histories.get_mut(&item_id) {
            ids.remove(&edge_id);
            if ids.is_empty() {
                self.histories.remove(&item_id);
            }
        }
    }

    pub fn delete_version_row(&mut self, id: Id) {
        self.versions.remove(&id);
        self.rich_versions.remove(&id);
    }

    pub fn delete_type_rows(&mut self, id: Id, kind: ItemKind) {
        if kind.takes_rich_versions() {
            self.details.remove(&id);
        } else {
            self.structure_versions.remove(&id);
        }
    }

    pub fn delete_tag_rows(&mut self, owner_id: Id) {
        self.tags.remove(&owner_id);
    }

    fn require_version(&self, id: Id) -> Result<(), StorageError> {
        if self.versions.contains_key(&id) {
            Ok(())
        } else {
            Err(StorageError::MissingRow {
                relation: "versions",
                id,
            })
        }
    }

    fn put_tags(&mut self, owner_id: Id, tags: &TagMap) {
        if !tags.is_empty() {
            self.tags.insert(owner_id, tags.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Tag;

    fn node(id: Id, key: &str) -> Item {
        Item {
            id,
            kind: ItemKind::Node,
            name: key.to_string(),
            source_key: key.to_string(),
            tags: crate::model::tag_map([Tag::valued(id, "team", "core")]),
            extra: ItemExtra::None,
        }
    }

    #[test]
    fn test_source_key_unique_per_kind() {
        let mut state = StoreState::default();
        state.insert_item(&node(1, "k")).unwrap();
        assert!(matches!(
            state.insert_item(&node(2, "k")),
            Err(StorageError::Conflict { .. })
        ));
        let mut graph = node(3, "k");
        graph.kind = ItemKind::Graph;
        state.insert_item(&graph).unwrap();
        assert_eq!(state.item_by_source_key(ItemKind::Graph, "k").unwrap().id, 3);
    }

    #[test]
    fn test_version_requires_item() {
        let mut state = StoreState::default();
        assert!(matches!(
            state.insert_version(10, 1),
            Err(StorageError::MissingRow { relation: "items", .. })
        ));
    }

    #[test]
    fn test_reindex_restores_lookup() {
        let mut state = StoreState::default();
        state.insert_item(&node(1, "k")).unwrap();
        let mut copy = StoreState {
            items: state.items.clone(),
            tags: state.tags.clone(),
            ..StoreState::default()
        };
        assert!(copy.item_by_source_key(ItemKind::Node, "k").is_none());
        copy.reindex();
        assert_eq!(copy.item_by_source_key(ItemKind::Node, "k"), state.item(1));
    }

    #[test]
    fn test_deletes_are_idempotent() {
        let mut state = StoreState::default();
        state.insert_item(&node(1, "k")).unwrap();
        state.insert_version(10, 1).unwrap();
        state
            .insert_successor(1, &VersionSuccessor::new(20, 0, 10))
            .unwrap();
        state.delete_successor(1, 20);
        state.delete_successor(1, 20);
        state.delete_version_row(10);
        state.delete_version_row(10);
        assert!(state.history_edge_ids(1).is_empty());
        assert!(state.versions.is_empty());
    }
}
