//! Versions: immutable snapshots belonging to an item.

use std::collections::BTreeMap;

use crate::model::{GroundType, Id, ItemKind, TagMap};

/// A bare version row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Version {
    pub id: Id,
    pub item_id: Id,
}

/// Kind-specific version fields.
///
/// The variant must match the kind of the owning item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum VersionDetails {
    #[default]
    Node,
    Edge {
        from_node_version_start_id: Id,
        from_node_version_end_id: Option<Id>,
        to_node_version_start_id: Id,
        to_node_version_end_id: Option<Id>,
    },
    Graph {
        edge_version_ids: Vec<Id>,
    },
    LineageEdge {
        from_rich_version_id: Id,
        to_rich_version_id: Id,
        principal_id: Option<Id>,
    },
    LineageGraph {
        lineage_edge_version_ids: Vec<Id>,
    },
}

impl VersionDetails {
    /// Returns the item kind these details belong to.
    pub fn kind(&self) -> ItemKind {
        match self {
            VersionDetails::Node => ItemKind::Node,
            VersionDetails::Edge { .. } => ItemKind::Edge,
            VersionDetails::Graph { .. } => ItemKind::Graph,
            VersionDetails::LineageEdge { .. } => ItemKind::LineageEdge,
            VersionDetails::LineageGraph { .. } => ItemKind::LineageGraph,
        }
    }

    pub fn name(&self) -> &'static str {
        self.kind().name()
    }

    /// Member version ids held in membership rows.
    pub fn member_ids(&self) -> &[Id] {
        match self {
            VersionDetails::Graph { edge_version_ids } => edge_version_ids,
            VersionDetails::LineageGraph {
                lineage_edge_version_ids,
            } => lineage_edge_version_ids,
            _ => &[],
        }
    }
}

/// A version carrying tags, an optional schema and an optional reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RichVersion {
    pub id: Id,
    pub item_id: Id,
    /// Tags owned by `id`.
    pub tags: TagMap,
    pub structure_version_id: Option<Id>,
    pub reference: Option<String>,
    pub reference_parameters: BTreeMap<String, String>,
    pub details: VersionDetails,
}

impl RichVersion {
    pub fn kind(&self) -> ItemKind {
        self.details.kind()
    }
}

/// A schema: required tag keys, each with a mandatory value type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructureVersion {
    pub id: Id,
    /// The owning structure item.
    pub structure_id: Id,
    pub attributes: BTreeMap<String, GroundType>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_details_kind_and_members() {
        let graph = VersionDetails::Graph {
            edge_version_ids: vec![4, 5],
        };
        assert_eq!(graph.kind(), ItemKind::Graph);
        assert_eq!(graph.member_ids(), &[4, 5]);
        assert!(VersionDetails::Node.member_ids().is_empty());
        assert_eq!(VersionDetails::default().kind(), ItemKind::Node);
    }
}
