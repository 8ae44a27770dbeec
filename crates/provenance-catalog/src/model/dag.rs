//! In-memory ancestry graph of one item.
//!
//! A [`VersionHistoryDag`] is a value: it is loaded from the storage driver,
//! mutated locally and discarded. Edges are kept in id order; parent and
//! child lookups go through hash indices of edge ids.

use std::collections::BTreeMap;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::model::{EMPTY_ROOT, Id, VersionSuccessor};

/// The full set of successor edges for one item.
#[derive(Debug, Clone, Default)]
pub struct VersionHistoryDag {
    item_id: Id,
    edges: BTreeMap<Id, VersionSuccessor>,
    /// vertex -> ids of edges ending at it
    incoming: FxHashMap<Id, Vec<Id>>,
    /// vertex -> ids of edges starting at it
    outgoing: FxHashMap<Id, Vec<Id>>,
}

impl VersionHistoryDag {
    /// Creates the empty history of `item_id`.
    pub fn new(item_id: Id) -> Self {
        Self {
            item_id,
            ..Self::default()
        }
    }

    /// Builds a history from already-persisted edges.
    pub fn from_edges(item_id: Id, edges: impl IntoIterator<Item = VersionSuccessor>) -> Self {
        let mut dag = Self::new(item_id);
        for edge in edges {
            dag.insert_edge(edge);
        }
        dag
    }

    pub fn item_id(&self) -> Id {
        self.item_id
    }

    /// Number of edges.
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Edges in ascending edge id order.
    pub fn edges(&self) -> impl Iterator<Item = &VersionSuccessor> {
        self.edges.values()
    }

    pub fn edge(&self, edge_id: Id) -> Option<&VersionSuccessor> {
        self.edges.get(&edge_id)
    }

    /// Whether `v` is a vertex of this history. [`EMPTY_ROOT`] always is.
    pub fn contains_vertex(&self, v: Id) -> bool {
        v == EMPTY_ROOT || self.incoming.contains_key(&v) || self.outgoing.contains_key(&v)
    }

    /// Distinct parents of `v` in ascending order, [`EMPTY_ROOT`] included.
    pub fn parents_of(&self, v: Id) -> Vec<Id> {
        self.neighbours(&self.incoming, v, |e| e.from_id)
    }

    /// Distinct children of `v` in ascending order.
    pub fn children_of(&self, v: Id) -> Vec<Id> {
        self.neighbours(&self.outgoing, v, |e| e.to_id)
    }

    /// Edges ending at `v`, in ascending edge id order.
    pub fn edges_into(&self, v: Id) -> Vec<VersionSuccessor> {
        let mut out: Vec<VersionSuccessor> = self
            .incoming
            .get(&v)
            .into_iter()
            .flatten()
            .filter_map(|id| self.edges.get(id).copied())
            .collect();
        out.sort_unstable();
        out
    }

    /// Versions with no child, in ascending order. The root is never a leaf.
    pub fn leaves(&self) -> Vec<Id> {
        let mut leaves: Vec<Id> = self
            .incoming
            .keys()
            .copied()
            .filter(|v| *v != EMPTY_ROOT && !self.outgoing.contains_key(v))
            .collect();
        leaves.sort_unstable();
        leaves
    }

    /// All versions in ascending order, without the root.
    pub fn versions(&self) -> Vec<Id> {
        let set: FxHashSet<Id> = self
            .incoming
            .keys()
            .chain(self.outgoing.keys())
            .copied()
            .filter(|v| *v != EMPTY_ROOT)
            .collect();
        let mut out: Vec<Id> = set.into_iter().collect();
        out.sort_unstable();
        out
    }

    /// Adds an edge without any validation.
    pub fn insert_edge(&mut self, edge: VersionSuccessor) {
        if let Some(old) = self.edges.insert(edge.id, edge) {
            self.unindex(&old);
        }
        self.incoming.entry(edge.to_id).or_default().push(edge.id);
        self.outgoing.entry(edge.from_id).or_default().push(edge.id);
    }

    /// Removes an edge by id, returning it if it was present.
    pub fn remove_edge(&mut self, edge_id: Id) -> Option<VersionSuccessor> {
        let edge = self.edges.remove(&edge_id)?;
        self.unindex(&edge);
        Some(edge)
    }

    fn unindex(&mut self, edge: &VersionSuccessor) {
        detach(&mut self.incoming, edge.to_id, edge.id);
        detach(&mut self.outgoing, edge.from_id, edge.id);
    }

    fn neighbours(
        &self,
        index: &FxHashMap<Id, Vec<Id>>,
        v: Id,
        pick: impl Fn(&VersionSuccessor) -> Id,
    ) -> Vec<Id> {
        let mut out: Vec<Id> = index
            .get(&v)
            .into_iter()
            .flatten()
            .filter_map(|id| self.edges.get(id).map(&pick))
            .collect();
        out.sort_unstable();
        out.dedup();
        out
    }
}

fn detach(index: &mut FxHashMap<Id, Vec<Id>>, vertex: Id, edge_id: Id) {
    if let Some(ids) = index.get_mut(&vertex) {
        ids.retain(|id| *id != edge_id);
        if ids.is_empty() {
            index.remove(&vertex);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn e(id: Id, from: Id, to: Id) -> VersionSuccessor {
        VersionSuccessor::new(id, from, to)
    }

    #[test]
    fn test_empty_dag() {
        let dag = VersionHistoryDag::new(7);
        assert!(dag.is_empty());
        assert!(dag.leaves().is_empty());
        assert!(dag.contains_vertex(EMPTY_ROOT));
        assert!(!dag.contains_vertex(1));
    }

    #[test]
    fn test_linear_chain() {
        let dag = VersionHistoryDag::from_edges(1, [e(10, 0, 1), e(11, 1, 2), e(12, 2, 3)]);
        assert_eq!(dag.leaves(), vec![3]);
        assert_eq!(dag.parents_of(2), vec![1]);
        assert_eq!(dag.parents_of(1), vec![EMPTY_ROOT]);
        assert_eq!(dag.children_of(EMPTY_ROOT), vec![1]);
        assert_eq!(dag.versions(), vec![1, 2, 3]);
    }

    #[test]
    fn test_diamond() {
        let dag = VersionHistoryDag::from_edges(
            1,
            [e(10, 0, 1), e(11, 1, 2), e(12, 1, 3), e(13, 2, 4), e(14, 3, 4)],
        );
        assert_eq!(dag.leaves(), vec![4]);
        assert_eq!(dag.parents_of(4), vec![2, 3]);
        assert_eq!(dag.children_of(1), vec![2, 3]);
        assert_eq!(dag.edges_into(4), vec![e(13, 2, 4), e(14, 3, 4)]);
    }

    #[test]
    fn test_duplicate_edges_between_same_pair() {
        let dag = VersionHistoryDag::from_edges(1, [e(10, 0, 1), e(11, 0, 1)]);
        assert_eq!(dag.len(), 2);
        assert_eq!(dag.parents_of(1), vec![EMPTY_ROOT]);
        assert_eq!(dag.edges_into(1).len(), 2);
    }

    #[test]
    fn test_remove_edge_updates_indices() {
        let mut dag = VersionHistoryDag::from_edges(1, [e(10, 0, 1), e(11, 1, 2)]);
        assert_eq!(dag.remove_edge(11), Some(e(11, 1, 2)));
        assert_eq!(dag.leaves(), vec![1]);
        assert!(!dag.contains_vertex(2));
        assert_eq!(dag.remove_edge(11), None);
    }

    #[test]
    fn test_reinserting_edge_id_replaces() {
        let mut dag = VersionHistoryDag::from_edges(1, [e(10, 0, 1)]);
        dag.insert_edge(e(10, 0, 2));
        assert_eq!(dag.len(), 1);
        assert!(!dag.contains_vertex(1));
        assert_eq!(dag.leaves(), vec![2]);
    }
}
