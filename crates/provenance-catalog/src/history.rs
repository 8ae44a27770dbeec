//! History mutation: edge insertion with parent validation, leaf queries
//! and level-bounded truncation.
//!
//! [`History`] borrows a storage driver and an id generator. It holds no
//! state between calls; every mutation works on a [`VersionHistoryDag`]
//! freshly loaded with [`History::retrieve`], and callers serialize
//! mutations of one item.

use std::collections::VecDeque;

use rustc_hash::FxHashSet;
use tracing::{debug, warn};

use crate::error::{CatalogError, StorageError, ValidationError};
use crate::id_gen::IdGenerator;
use crate::model::{EMPTY_ROOT, Id, ItemKind, VersionHistoryDag, VersionSuccessor};
use crate::storage::StorageDriver;

/// Outcome of a truncation pass.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TruncationReport {
    /// Versions left in the history, ascending.
    pub kept: Vec<Id>,
    /// Versions re-rooted onto [`EMPTY_ROOT`], ascending.
    pub reattached: Vec<Id>,
    /// Deleted versions, in deletion order.
    pub deleted: Vec<Id>,
}

impl TruncationReport {
    /// True when the pass changed nothing.
    pub fn is_noop(&self) -> bool {
        self.reattached.is_empty() && self.deleted.is_empty()
    }
}

/// History operations over one storage driver.
#[derive(Debug)]
pub struct History<'a, S> {
    store: &'a S,
    ids: &'a IdGenerator,
}

impl<'a, S: StorageDriver> History<'a, S> {
    pub fn new(store: &'a S, ids: &'a IdGenerator) -> Self {
        Self { store, ids }
    }

    /// Creates the empty history of a new item. Nothing is persisted until
    /// the first edge.
    pub fn create(&self, item_id: Id) -> VersionHistoryDag {
        VersionHistoryDag::new(item_id)
    }

    /// Loads every persisted edge of `item_id`.
    ///
    /// An item without versions yields the empty history.
    pub fn retrieve(&self, item_id: Id) -> Result<VersionHistoryDag, CatalogError> {
        let edge_ids = self.store.history_edge_ids(item_id)?;
        let mut edges = Vec::with_capacity(edge_ids.len());
        for edge_id in edge_ids {
            let edge = self.store.successor(edge_id)?.ok_or(StorageError::MissingRow {
                relation: "version_successor",
                id: edge_id,
            })?;
            edges.push(edge);
        }
        Ok(VersionHistoryDag::from_edges(item_id, edges))
    }

    /// Fails unless every non-root parent is a vertex of `dag`.
    pub fn check_parents(&self, dag: &VersionHistoryDag, parent_ids: &[Id]) -> Result<(), CatalogError> {
        match parent_ids.iter().find(|p| !dag.contains_vertex(**p)) {
            Some(parent_id) => Err(CatalogError::ParentNotInDag {
                parent_id: *parent_id,
                item_id: dag.item_id(),
            }),
            None => Ok(()),
        }
    }

    /// Adds the edge `parent_id -> child_id` to the history of `item_id`.
    ///
    /// The parent is checked first; on failure nothing is persisted and
    /// `dag` is unchanged. Repeated calls add parallel edges.
    pub fn add_edge(
        &self,
        dag: &mut VersionHistoryDag,
        parent_id: Id,
        child_id: Id,
        item_id: Id,
    ) -> Result<VersionSuccessor, CatalogError> {
        self.check_parents(dag, &[parent_id])?;
        let edge = VersionSuccessor::new(self.ids.generate_successor_id()?, parent_id, child_id);
        self.insert_edges(dag, item_id, &[edge])?;
        Ok(edge)
    }

    /// Adds one edge per parent, after checking all of them. No parents
    /// means a single edge from [`EMPTY_ROOT`].
    pub fn add_edges(
        &self,
        dag: &mut VersionHistoryDag,
        parent_ids: &[Id],
        child_id: Id,
        item_id: Id,
    ) -> Result<Vec<VersionSuccessor>, CatalogError> {
        let edges = self.plan_edges(dag, parent_ids, child_id)?;
        self.insert_edges(dag, item_id, &edges)?;
        Ok(edges)
    }

    /// Checks `parent_ids` against `dag` and allocates one edge id per
    /// parent without writing anything. No parents means a single edge
    /// from [`EMPTY_ROOT`].
    pub fn plan_edges(
        &self,
        dag: &VersionHistoryDag,
        parent_ids: &[Id],
        child_id: Id,
    ) -> Result<Vec<VersionSuccessor>, CatalogError> {
        let parent_ids = if parent_ids.is_empty() {
            &[EMPTY_ROOT][..]
        } else {
            parent_ids
        };
        self.check_parents(dag, parent_ids)?;
        parent_ids
            .iter()
            .map(|parent_id| Ok(VersionSuccessor::new(self.ids.generate_successor_id()?, *parent_id, child_id)))
            .collect()
    }

    /// Persists edges from [`History::plan_edges`] and records them in `dag`.
    pub fn insert_edges(
        &self,
        dag: &mut VersionHistoryDag,
        item_id: Id,
        edges: &[VersionSuccessor],
    ) -> Result<(), CatalogError> {
        for edge in edges {
            self.store.insert_successor(item_id, edge)?;
            dag.insert_edge(*edge);
            debug!(item_id, edge_id = edge.id, from_id = edge.from_id, to_id = edge.to_id, "successor edge added");
        }
        Ok(())
    }

    /// The current heads of the history, ascending.
    pub fn leaves(&self, dag: &VersionHistoryDag) -> Vec<Id> {
        dag.leaves()
    }

    /// Keeps the `num_levels` newest levels of `dag` and deletes the rest.
    ///
    /// Level 0 is the leaves; level `n + 1` is the parents of level `n`. A
    /// version reachable from a leaf in fewer than `num_levels` hops is
    /// never deleted. Versions of the deepest kept level that lose all
    /// their parents are re-rooted onto [`EMPTY_ROOT`]. Everything above is
    /// deleted breadth-first, together with its edges, tags and rows.
    ///
    /// Storage failures abort the pass and are returned; the driver's unit
    /// of work decides whether earlier deletes survive.
    pub fn truncate(
        &self,
        dag: &mut VersionHistoryDag,
        num_levels: usize,
        kind: ItemKind,
    ) -> Result<TruncationReport, CatalogError> {
        if num_levels == 0 {
            return Err(ValidationError::ZeroTruncationDepth.into());
        }

        let mut level: FxHashSet<Id> = dag.leaves().into_iter().collect();
        let mut kept = level.clone();
        for _ in 1..num_levels {
            let next = parents_of_level(dag, &level);
            if next.is_empty() {
                return Ok(noop_report(dag));
            }
            kept.extend(next.iter().copied());
            level = next;
        }
        let last_level = level;
        let seed: Vec<Id> = parents_of_level(dag, &last_level)
            .into_iter()
            .filter(|v| !kept.contains(v))
            .collect();
        if seed.is_empty() {
            return Ok(noop_report(dag));
        }

        let item_id = dag.item_id();
        let mut report = TruncationReport::default();
        let result = self
            .reattach(dag, &last_level, &kept, &mut report)
            .and_then(|()| self.delete_from(dag, seed, &kept, kind, &mut report));
        if let Err(e) = result {
            warn!(
                item_id,
                num_levels,
                deleted = report.deleted.len(),
                error = %e,
                "truncation interrupted"
            );
            return Err(e);
        }

        report.kept = dag.versions();
        report.reattached.sort_unstable();
        Ok(report)
    }

    /// Cuts the edges from deleted parents into the kept frontier, rooting
    /// any frontier version left without a parent.
    fn reattach(
        &self,
        dag: &mut VersionHistoryDag,
        last_level: &FxHashSet<Id>,
        kept: &FxHashSet<Id>,
        report: &mut TruncationReport,
    ) -> Result<(), CatalogError> {
        let item_id = dag.item_id();
        let mut frontier: Vec<Id> = last_level.iter().copied().collect();
        frontier.sort_unstable();
        for v in frontier {
            for edge in dag.edges_into(v) {
                if edge.from_id != EMPTY_ROOT && !kept.contains(&edge.from_id) {
                    self.store.delete_successor(item_id, edge.id)?;
                    dag.remove_edge(edge.id);
                }
            }
            if dag.parents_of(v).is_empty() {
                self.add_edge(dag, EMPTY_ROOT, v, item_id)?;
                report.reattached.push(v);
            }
        }
        Ok(())
    }

    fn delete_from(
        &self,
        dag: &mut VersionHistoryDag,
        seed: Vec<Id>,
        kept: &FxHashSet<Id>,
        kind: ItemKind,
        report: &mut TruncationReport,
    ) -> Result<(), CatalogError> {
        let item_id = dag.item_id();
        let mut visited: FxHashSet<Id> = seed.iter().copied().collect();
        let mut queue: VecDeque<Id> = seed.into();
        while let Some(v) = queue.pop_front() {
            let parents = dag.parents_of(v);
            for edge in dag.edges_into(v) {
                self.store.delete_successor(item_id, edge.id)?;
                dag.remove_edge(edge.id);
            }
            self.store.delete_type_rows(v, kind)?;
            self.store.delete_tag_rows(v)?;
            self.store.delete_version_row(v)?;
            report.deleted.push(v);
            debug!(item_id, version_id = v, "version deleted");

            for parent in parents {
                if parent != EMPTY_ROOT && !kept.contains(&parent) && visited.insert(parent) {
                    queue.push_back(parent);
                }
            }
        }
        Ok(())
    }
}

fn parents_of_level(dag: &VersionHistoryDag, level: &FxHashSet<Id>) -> FxHashSet<Id> {
    level
        .iter()
        .flat_map(|v| dag.parents_of(*v))
        .filter(|p| *p != EMPTY_ROOT)
        .collect()
}

fn noop_report(dag: &VersionHistoryDag) -> TruncationReport {
    TruncationReport {
        kept: dag.versions(),
        ..TruncationReport::default()
    }
}
