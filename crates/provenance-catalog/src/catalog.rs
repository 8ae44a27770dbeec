//! The catalog engine.
//!
//! [`Catalog`] owns a storage driver and an id generator and exposes the
//! item and version entry points. Every mutation is validated before the
//! first write, runs inside the driver's unit of work and, when it touches
//! a history, holds that item's lock. Mutations of different items do not
//! contend on the catalog, although a driver may still serialize its units
//! of work.

use std::collections::BTreeMap;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tracing::{debug, info};

use crate::config::CatalogConfig;
use crate::error::{CatalogError, StorageError, ValidationError};
use crate::history::{History, TruncationReport};
use crate::id_gen::IdGenerator;
use crate::model::{
    EMPTY_ROOT, GroundType, Id, Item, ItemExtra, ItemKind, NewItem, NewVersion, RichVersion,
    StructureVersion, TagMap, VersionDetails, VersionHistoryDag, reown_tags,
};
use crate::storage::{FileStore, MemoryStore, StorageDriver};
use crate::validate::{validate_attributes, validate_details, validate_item_extra, validate_structure_tags};

/// Table size below which dead entries are left in place.
const LOCK_TABLE_MIN_PRUNE: usize = 64;

/// One lock per item id, created on first use.
///
/// The table holds weak references, so a lock lives only while some caller
/// holds it. Dead entries are swept whenever the table doubles past its size
/// after the previous sweep.
#[derive(Debug)]
struct ItemLocks {
    table: Mutex<LockTable>,
}

#[derive(Debug)]
struct LockTable {
    locks: FxHashMap<Id, Weak<Mutex<()>>>,
    prune_at: usize,
}

impl Default for ItemLocks {
    fn default() -> Self {
        Self {
            table: Mutex::new(LockTable {
                locks: FxHashMap::default(),
                prune_at: LOCK_TABLE_MIN_PRUNE,
            }),
        }
    }
}

impl ItemLocks {
    fn get(&self, item_id: Id) -> Arc<Mutex<()>> {
        let mut table = self.table.lock();
        if let Some(lock) = table.locks.get(&item_id).and_then(Weak::upgrade) {
            return lock;
        }
        let lock = Arc::new(Mutex::new(()));
        table.locks.insert(item_id, Arc::downgrade(&lock));
        if table.locks.len() >= table.prune_at {
            table.locks.retain(|_, weak| weak.strong_count() > 0);
            table.prune_at = (table.locks.len() * 2).max(LOCK_TABLE_MIN_PRUNE);
        }
        lock
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.table.lock().locks.len()
    }
}

/// The versioned item catalog.
#[derive(Debug)]
pub struct Catalog<S> {
    store: S,
    ids: IdGenerator,
    locks: ItemLocks,
}

impl Catalog<MemoryStore> {
    /// Creates a catalog over a fresh in-memory store.
    pub fn in_memory(config: &CatalogConfig) -> Result<Self, CatalogError> {
        config.validate()?;
        Ok(Self::new(MemoryStore::new(), IdGenerator::from_config(config)?))
    }
}

impl Catalog<FileStore> {
    /// Opens the snapshot file named by `config.snapshot_path`.
    ///
    /// Id counters resume past every id already in the snapshot.
    pub fn open(config: &CatalogConfig) -> Result<Self, CatalogError> {
        config.validate()?;
        let path = config
            .snapshot_path
            .clone()
            .ok_or_else(|| CatalogError::Config("snapshot_path is required for a file-backed catalog".into()))?;
        let store = FileStore::open(path, config.compression_level)?;
        let ids = IdGenerator::from_config(config)?;
        for id in store.memory().ids() {
            ids.observe(id);
        }
        info!(
            path = %store.path().display(),
            items = store.stats().items,
            versions = store.stats().versions,
            "catalog opened"
        );
        Ok(Self::new(store, ids))
    }
}

impl<S: StorageDriver> Catalog<S> {
    pub fn new(store: S, ids: IdGenerator) -> Self {
        Self {
            store,
            ids,
            locks: ItemLocks::default(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn ids(&self) -> &IdGenerator {
        &self.ids
    }

    fn history_ops(&self) -> History<'_, S> {
        History::new(&self.store, &self.ids)
    }

    // ==================== Items ====================

    /// Creates an item. Its tags are re-owned by the new id.
    ///
    /// Fails with [`CatalogError::ItemAlreadyExists`] when an item of the
    /// same kind already uses the source key.
    pub fn create_item(&self, new: NewItem) -> Result<Item, CatalogError> {
        validate_item_extra(new.kind, &new.extra)?;
        if let ItemExtra::Edge {
            from_node_id,
            to_node_id,
        } = new.extra
        {
            self.require_node(from_node_id)?;
            self.require_node(to_node_id)?;
        }
        if self.store.item_by_source_key(new.kind, &new.source_key)?.is_some() {
            return Err(CatalogError::ItemAlreadyExists {
                kind: new.kind,
                source_key: new.source_key,
            });
        }

        let id = self.ids.generate_item_id()?;
        let item = Item {
            id,
            kind: new.kind,
            name: new.name,
            source_key: new.source_key,
            tags: reown_tags(&new.tags, id)?,
            extra: new.extra,
        };
        self.store.unit_of_work(|| match self.store.insert_item(&item) {
            Err(StorageError::Conflict { .. }) => Err(CatalogError::ItemAlreadyExists {
                kind: item.kind,
                source_key: item.source_key.clone(),
            }),
            other => Ok(other?),
        })?;

        info!(item_id = id, kind = %item.kind, source_key = %item.source_key, "item created");
        Ok(item)
    }

    pub fn item(&self, id: Id) -> Result<Item, CatalogError> {
        self.store.item(id)?.ok_or(CatalogError::ItemNotFound(id))
    }

    pub fn item_by_source_key(&self, kind: ItemKind, source_key: &str) -> Result<Item, CatalogError> {
        self.store
            .item_by_source_key(kind, source_key)?
            .ok_or_else(|| CatalogError::SourceKeyNotFound {
                kind,
                source_key: source_key.to_string(),
            })
    }

    pub fn item_tags(&self, id: Id) -> Result<TagMap, CatalogError> {
        self.store.item_tags(id)?.ok_or(CatalogError::ItemNotFound(id))
    }

    fn require_node(&self, id: Id) -> Result<(), CatalogError> {
        match self.store.item(id)? {
            Some(item) if item.kind == ItemKind::Node => Ok(()),
            _ => Err(CatalogError::ItemNotFound(id)),
        }
    }

    // ==================== Versions ====================

    /// Creates a rich version of `item_id` derived from `parent_ids`.
    ///
    /// No parents roots the version at the item; several parents add one
    /// successor edge each. Tags are re-owned by the new version and, when
    /// a structure version is named, checked against its schema. Every
    /// check and every id allocation runs before the first write.
    pub fn create_version(
        &self,
        item_id: Id,
        new: NewVersion,
        parent_ids: &[Id],
    ) -> Result<RichVersion, CatalogError> {
        let item = self.item(item_id)?;
        if !item.kind.takes_rich_versions() {
            return Err(ValidationError::KindMismatch {
                kind: item.kind,
                details: new.details.name(),
            }
            .into());
        }
        validate_details(item.kind, &new.details)?;
        for referenced in referenced_versions(&new.details) {
            if !self.store.version_exists(referenced)? {
                return Err(CatalogError::VersionNotFound(referenced));
            }
        }
        if let Some(structure_version_id) = new.structure_version_id {
            let structure = self.structure_version(structure_version_id)?;
            validate_structure_tags(&structure, &new.tags)?;
        }

        let id = self.ids.generate_version_id()?;
        let version = RichVersion {
            id,
            item_id,
            tags: reown_tags(&new.tags, id)?,
            structure_version_id: new.structure_version_id,
            reference: new.reference,
            reference_parameters: new.reference_parameters,
            details: new.details,
        };

        let lock = self.locks.get(item_id);
        let _guard = lock.lock();
        let history = self.history_ops();
        self.store.unit_of_work(|| {
            let mut dag = history.retrieve(item_id)?;
            let edges = history.plan_edges(&dag, parent_ids, id)?;
            self.store.insert_version(id, item_id)?;
            self.store.insert_rich_version(&version)?;
            history.insert_edges(&mut dag, item_id, &edges)?;
            Ok(())
        })?;

        info!(item_id, version_id = id, kind = %item.kind, parents = parent_ids.len(), "version created");
        Ok(version)
    }

    /// Creates a version of the structure item `structure_id` declaring
    /// `attributes` as its schema.
    pub fn create_structure_version(
        &self,
        structure_id: Id,
        attributes: BTreeMap<String, GroundType>,
        parent_ids: &[Id],
    ) -> Result<StructureVersion, CatalogError> {
        let item = self.item(structure_id)?;
        if item.kind != ItemKind::Structure {
            return Err(ValidationError::KindMismatch {
                kind: item.kind,
                details: ItemKind::Structure.name(),
            }
            .into());
        }
        validate_attributes(&attributes)?;

        let id = self.ids.generate_version_id()?;
        let structure = StructureVersion {
            id,
            structure_id,
            attributes,
        };

        let lock = self.locks.get(structure_id);
        let _guard = lock.lock();
        let history = self.history_ops();
        self.store.unit_of_work(|| {
            let mut dag = history.retrieve(structure_id)?;
            let edges = history.plan_edges(&dag, parent_ids, id)?;
            self.store.insert_version(id, structure_id)?;
            self.store.insert_structure_version(&structure)?;
            history.insert_edges(&mut dag, structure_id, &edges)?;
            Ok(())
        })?;

        info!(
            item_id = structure_id,
            version_id = id,
            attributes = structure.attributes.len(),
            "structure version created"
        );
        Ok(structure)
    }

    pub fn version(&self, id: Id) -> Result<RichVersion, CatalogError> {
        self.store.rich_version(id)?.ok_or(CatalogError::VersionNotFound(id))
    }

    pub fn structure_version(&self, id: Id) -> Result<StructureVersion, CatalogError> {
        self.store
            .structure_version(id)?
            .ok_or(CatalogError::VersionNotFound(id))
    }

    // ==================== Histories ====================

    /// Loads the history of an existing item. An item without versions has
    /// the empty history.
    pub fn history(&self, item_id: Id) -> Result<VersionHistoryDag, CatalogError> {
        if self.store.item(item_id)?.is_none() {
            return Err(CatalogError::ItemNotFound(item_id));
        }
        self.history_ops().retrieve(item_id)
    }

    /// The current heads of an item's history, ascending.
    pub fn leaves(&self, item_id: Id) -> Result<Vec<Id>, CatalogError> {
        let dag = self.history(item_id)?;
        Ok(self.history_ops().leaves(&dag))
    }

    /// Deletes every version of `item_id` more than `num_levels` levels
    /// behind the current leaves.
    ///
    /// See [`History::truncate`]. A file-backed store restores its last
    /// commit when the pass fails; the in-memory store keeps whatever was
    /// deleted before the failure.
    pub fn truncate(&self, item_id: Id, num_levels: usize) -> Result<TruncationReport, CatalogError> {
        if num_levels == 0 {
            return Err(ValidationError::ZeroTruncationDepth.into());
        }
        let item = self.item(item_id)?;

        let lock = self.locks.get(item_id);
        let _guard = lock.lock();
        let history = self.history_ops();
        let report = self.store.unit_of_work(|| {
            let mut dag = history.retrieve(item_id)?;
            history.truncate(&mut dag, num_levels, item.kind)
        })?;

        if report.is_noop() {
            debug!(item_id, num_levels, "truncation found nothing to delete");
        } else {
            info!(
                item_id,
                num_levels,
                kept = report.kept.len(),
                reattached = report.reattached.len(),
                deleted = report.deleted.len(),
                "history truncated"
            );
        }
        Ok(report)
    }
}

/// Version ids named inside kind-specific details, which must exist.
fn referenced_versions(details: &VersionDetails) -> Vec<Id> {
    let ids: Vec<Id> = match details {
        VersionDetails::Node => Vec::new(),
        VersionDetails::Edge {
            from_node_version_start_id,
            from_node_version_end_id,
            to_node_version_start_id,
            to_node_version_end_id,
        } => [
            Some(*from_node_version_start_id),
            *from_node_version_end_id,
            Some(*to_node_version_start_id),
            *to_node_version_end_id,
        ]
        .into_iter()
        .flatten()
        .collect(),
        VersionDetails::LineageEdge {
            from_rich_version_id,
            to_rich_version_id,
            ..
        } => vec![*from_rich_version_id, *to_rich_version_id],
        VersionDetails::Graph { .. } | VersionDetails::LineageGraph { .. } => details.member_ids().to_vec(),
    };
    ids.into_iter().filter(|id| *id != EMPTY_ROOT).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::model::{ItemBuilder, Tag, Value, VersionBuilder};

    fn catalog() -> Catalog<MemoryStore> {
        Catalog::in_memory(&CatalogConfig::default()).unwrap()
    }

    #[test]
    fn test_create_item_reowns_tags() {
        let catalog = catalog();
        let item = catalog
            .create_item(ItemBuilder::new(ItemKind::Node, "orders").tag("team", "core").build())
            .unwrap();
        assert_eq!(item.tags["team"].owner_id(), item.id);
        assert_eq!(catalog.item_tags(item.id).unwrap(), item.tags);
        assert_eq!(catalog.item_by_source_key(ItemKind::Node, "orders").unwrap(), item);
    }

    #[test]
    fn test_duplicate_source_key() {
        let catalog = catalog();
        catalog.create_item(ItemBuilder::new(ItemKind::Node, "k").build()).unwrap();
        let err = catalog
            .create_item(ItemBuilder::new(ItemKind::Node, "k").build())
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::ItemAlreadyExists);
        assert!(catalog.create_item(ItemBuilder::new(ItemKind::Graph, "k").build()).is_ok());
    }

    #[test]
    fn test_edge_item_needs_nodes() {
        let catalog = catalog();
        let a = catalog.create_item(ItemBuilder::new(ItemKind::Node, "a").build()).unwrap();
        let err = catalog
            .create_item(ItemBuilder::new(ItemKind::Edge, "a->?").endpoints(a.id, 12345).build())
            .unwrap_err();
        assert!(matches!(err, CatalogError::ItemNotFound(12345)));
        assert!(matches!(
            catalog.create_item(ItemBuilder::new(ItemKind::Edge, "bare").build()),
            Err(CatalogError::Validation(ValidationError::MissingEdgeEndpoints))
        ));
    }

    #[test]
    fn test_versions_and_leaves() {
        let catalog = catalog();
        let item = catalog.create_item(ItemBuilder::new(ItemKind::Node, "n").build()).unwrap();
        assert!(catalog.leaves(item.id).unwrap().is_empty());

        let v1 = catalog.create_version(item.id, VersionBuilder::node().build(), &[]).unwrap();
        let v2 = catalog.create_version(item.id, VersionBuilder::node().build(), &[v1.id]).unwrap();
        let v3 = catalog.create_version(item.id, VersionBuilder::node().build(), &[v1.id]).unwrap();
        assert_eq!(catalog.leaves(item.id).unwrap(), vec![v2.id, v3.id]);

        let merge = catalog
            .create_version(item.id, VersionBuilder::node().tag("merged", true).build(), &[v2.id, v3.id])
            .unwrap();
        assert_eq!(catalog.leaves(item.id).unwrap(), vec![merge.id]);
        assert_eq!(catalog.history(item.id).unwrap().parents_of(merge.id), vec![v2.id, v3.id]);
        assert_eq!(catalog.version(merge.id).unwrap().tags["merged"].owner_id(), merge.id);
    }

    #[test]
    fn test_unknown_parent_writes_nothing() {
        let catalog = catalog();
        let item = catalog.create_item(ItemBuilder::new(ItemKind::Node, "n").build()).unwrap();
        let err = catalog
            .create_version(item.id, VersionBuilder::node().build(), &[999])
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::ParentNotInDag);
        assert_eq!(catalog.store().stats().versions, 0);
        assert!(catalog.history(item.id).unwrap().is_empty());
    }

    #[test]
    fn test_exhausted_edge_ids_write_nothing() {
        let catalog = catalog();
        let node = catalog.create_item(ItemBuilder::new(ItemKind::Node, "n").build()).unwrap();
        let structure = catalog
            .create_item(ItemBuilder::new(ItemKind::Structure, "s").build())
            .unwrap();

        let ids = catalog.ids();
        let last_successor = (2u64 << (ids.machine_shift() - 2)) | ids.max_counter();
        ids.observe(last_successor);
        assert_eq!(ids.decompose(last_successor).namespace, Some(crate::IdNamespace::Successor));

        assert!(matches!(
            catalog.create_version(node.id, VersionBuilder::node().build(), &[]),
            Err(CatalogError::IdSpaceExhausted { namespace: "successor" })
        ));
        assert!(matches!(
            catalog.create_structure_version(structure.id, BTreeMap::new(), &[]),
            Err(CatalogError::IdSpaceExhausted { .. })
        ));
        let stats = catalog.store().stats();
        assert_eq!(stats.versions, 0);
        assert_eq!(stats.rich_versions, 0);
        assert_eq!(stats.structure_versions, 0);
        assert!(catalog.history(node.id).unwrap().is_empty());
    }

    #[test]
    fn test_item_lock_table_stays_bounded() {
        let locks = ItemLocks::default();
        let held = locks.get(1);
        assert!(Arc::ptr_eq(&held, &locks.get(1)));

        for item_id in 2..10_000 {
            let lock = locks.get(item_id);
            drop(lock.lock());
        }
        assert!(locks.len() <= 2 * LOCK_TABLE_MIN_PRUNE);
        // A held lock survives every sweep.
        assert!(Arc::ptr_eq(&held, &locks.get(1)));
    }

    #[test]
    fn test_versions_of_many_items_do_not_grow_locks() {
        let catalog = catalog();
        for i in 0..500 {
            let item = catalog
                .create_item(ItemBuilder::new(ItemKind::Node, format!("n{}", i)).build())
                .unwrap();
            catalog.create_version(item.id, VersionBuilder::node().build(), &[]).unwrap();
        }
        assert!(catalog.locks.len() <= 2 * LOCK_TABLE_MIN_PRUNE);
    }

    #[test]
    fn test_wrong_kind_details_rejected() {
        let catalog = catalog();
        let item = catalog.create_item(ItemBuilder::new(ItemKind::Graph, "g").build()).unwrap();
        let err = catalog
            .create_version(item.id, VersionBuilder::node().build(), &[])
            .unwrap_err();
        assert!(matches!(
            err,
            CatalogError::Validation(ValidationError::KindMismatch { kind: ItemKind::Graph, .. })
        ));
        assert_eq!(catalog.store().stats().versions, 0);
    }

    #[test]
    fn test_graph_members_must_exist() {
        let catalog = catalog();
        let item = catalog.create_item(ItemBuilder::new(ItemKind::Graph, "g").build()).unwrap();
        assert!(matches!(
            catalog.create_version(item.id, VersionBuilder::graph([42]).build(), &[]),
            Err(CatalogError::VersionNotFound(42))
        ));
    }

    #[test]
    fn test_structure_schema_enforced() {
        let catalog = catalog();
        let structure = catalog
            .create_item(ItemBuilder::new(ItemKind::Structure, "schema").build())
            .unwrap();
        let attrs = BTreeMap::from([("intfield".to_string(), GroundType::Integer)]);
        let sv = catalog.create_structure_version(structure.id, attrs, &[]).unwrap();
        assert_eq!(catalog.leaves(structure.id).unwrap(), vec![sv.id]);

        let node = catalog.create_item(ItemBuilder::new(ItemKind::Node, "n").build()).unwrap();
        let ok = VersionBuilder::node()
            .with_tag(Tag::new(EMPTY_ROOT, "intfield", Some(Value::Integer(1)), Some(GroundType::Integer)).unwrap())
            .structure_version(sv.id)
            .build();
        assert!(catalog.create_version(node.id, ok, &[]).is_ok());

        let wrong = VersionBuilder::node().tag("intfield", "1").structure_version(sv.id).build();
        let err = catalog.create_version(node.id, wrong, &[]).unwrap_err();
        assert_eq!(err.to_string(), "tag intfield has wrong type: expected INTEGER, found STRING");

        assert!(matches!(
            catalog.create_version(structure.id, VersionBuilder::node().build(), &[]),
            Err(CatalogError::Validation(ValidationError::KindMismatch { .. }))
        ));
        assert!(matches!(
            catalog.create_structure_version(node.id, BTreeMap::new(), &[]),
            Err(CatalogError::Validation(ValidationError::KindMismatch { .. }))
        ));
    }

    #[test]
    fn test_truncate_validates_first() {
        let catalog = catalog();
        assert!(matches!(
            catalog.truncate(1, 0),
            Err(CatalogError::Validation(ValidationError::ZeroTruncationDepth))
        ));
        assert!(matches!(catalog.truncate(1, 2), Err(CatalogError::ItemNotFound(1))));
    }

    #[test]
    fn test_missing_lookups() {
        let catalog = catalog();
        assert_eq!(catalog.item(7).unwrap_err().code(), ErrorCode::ItemNotFound);
        assert_eq!(catalog.version(7).unwrap_err().code(), ErrorCode::VersionNotFound);
        assert!(matches!(catalog.history(7), Err(CatalogError::ItemNotFound(7))));
        assert!(matches!(
            catalog.item_by_source_key(ItemKind::Node, "nope"),
            Err(CatalogError::SourceKeyNotFound { .. })
        ));
    }
}
