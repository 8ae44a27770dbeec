//! Items: named entities whose history is tracked as a version DAG.

use std::fmt;

use crate::model::{Id, TagMap};

/// The kind of an item.
///
/// Kinds differ only in the extra fields their items and versions carry;
/// history handling is identical for all of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum ItemKind {
    Node = 1,
    Edge = 2,
    Graph = 3,
    Structure = 4,
    LineageEdge = 5,
    LineageGraph = 6,
}

impl ItemKind {
    pub const ALL: [ItemKind; 6] = [
        ItemKind::Node,
        ItemKind::Edge,
        ItemKind::Graph,
        ItemKind::Structure,
        ItemKind::LineageEdge,
        ItemKind::LineageGraph,
    ];

    /// Creates an ItemKind from its wire representation.
    pub fn from_u8(v: u8) -> Option<ItemKind> {
        match v {
            1 => Some(ItemKind::Node),
            2 => Some(ItemKind::Edge),
            3 => Some(ItemKind::Graph),
            4 => Some(ItemKind::Structure),
            5 => Some(ItemKind::LineageEdge),
            6 => Some(ItemKind::LineageGraph),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ItemKind::Node => "node",
            ItemKind::Edge => "edge",
            ItemKind::Graph => "graph",
            ItemKind::Structure => "structure",
            ItemKind::LineageEdge => "lineage_edge",
            ItemKind::LineageGraph => "lineage_graph",
        }
    }

    /// Structure items take structure versions instead of rich versions.
    pub fn takes_rich_versions(self) -> bool {
        self != ItemKind::Structure
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Kind-specific item fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ItemExtra {
    #[default]
    None,
    /// Endpoints of an edge item.
    Edge { from_node_id: Id, to_node_id: Id },
}

/// A persisted item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub id: Id,
    pub kind: ItemKind,
    pub name: String,
    /// Caller-supplied external key, unique per kind.
    pub source_key: String,
    /// Tags fixed at creation, owned by `id`.
    pub tags: TagMap,
    pub extra: ItemExtra,
}
