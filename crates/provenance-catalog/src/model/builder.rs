//! Builder API for new items and versions.
//!
//! Builders collect the caller-controlled fields of an entity. Ids and tag
//! owners are assigned by the catalog on creation.
//!
//! # Example
//!
//! ```rust
//! use provenance_catalog::model::builder::{ItemBuilder, VersionBuilder};
//! use provenance_catalog::ItemKind;
//!
//! let item = ItemBuilder::new(ItemKind::Node, "warehouse/orders")
//!     .name("orders")
//!     .tag("owner", "data-eng")
//!     .build();
//!
//! let version = VersionBuilder::node()
//!     .tag("rows", 1_200_i64)
//!     .reference("s3://bucket/orders/2024-01-01")
//!     .build();
//! assert_eq!(item.tags.len(), 1);
//! assert_eq!(version.tags.len(), 1);
//! ```

use std::collections::BTreeMap;

use crate::model::{EMPTY_ROOT, Id, ItemExtra, ItemKind, Tag, TagMap, Value, VersionDetails};

/// Caller-supplied fields of an item to create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewItem {
    pub kind: ItemKind,
    pub name: String,
    pub source_key: String,
    pub tags: TagMap,
    pub extra: ItemExtra,
}

/// Caller-supplied fields of a rich version to create.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NewVersion {
    pub tags: TagMap,
    pub structure_version_id: Option<Id>,
    pub reference: Option<String>,
    pub reference_parameters: BTreeMap<String, String>,
    pub details: VersionDetails,
}

/// Builder for a [`NewItem`].
#[derive(Debug, Clone)]
pub struct ItemBuilder {
    item: NewItem,
}

impl ItemBuilder {
    /// Creates a builder for an item of `kind` with the given source key.
    pub fn new(kind: ItemKind, source_key: impl Into<String>) -> Self {
        let source_key = source_key.into();
        Self {
            item: NewItem {
                kind,
                name: source_key.clone(),
                source_key,
                tags: TagMap::new(),
                extra: ItemExtra::None,
            },
        }
    }

    /// Sets the display name (defaults to the source key).
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.item.name = name.into();
        self
    }

    /// Adds a valued tag.
    pub fn tag(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let tag = Tag::valued(EMPTY_ROOT, key, value);
        self.item.tags.insert(tag.key().to_string(), tag);
        self
    }

    /// Adds a tag without a value.
    pub fn flag(mut self, key: impl Into<String>) -> Self {
        let tag = Tag::flag(EMPTY_ROOT, key);
        self.item.tags.insert(tag.key().to_string(), tag);
        self
    }

    /// Adds a prebuilt tag.
    pub fn with_tag(mut self, tag: Tag) -> Self {
        self.item.tags.insert(tag.key().to_string(), tag);
        self
    }

    /// Sets the endpoints of an edge item.
    pub fn endpoints(mut self, from_node_id: Id, to_node_id: Id) -> Self {
        self.item.extra = ItemExtra::Edge {
            from_node_id,
            to_node_id,
        };
        self
    }

    pub fn build(self) -> NewItem {
        self.item
    }
}

/// Builder for a [`NewVersion`].
#[derive(Debug, Clone, Default)]
pub struct VersionBuilder {
    version: NewVersion,
}

impl VersionBuilder {
    /// Creates a builder with the given kind-specific details.
    pub fn new(details: VersionDetails) -> Self {
        Self {
            version: NewVersion {
                details,
                ..NewVersion::default()
            },
        }
    }

    /// Creates a builder for a node version.
    pub fn node() -> Self {
        Self::new(VersionDetails::Node)
    }

    /// Creates a builder for a graph version over the given edge versions.
    pub fn graph(edge_version_ids: impl IntoIterator<Item = Id>) -> Self {
        Self::new(VersionDetails::Graph {
            edge_version_ids: edge_version_ids.into_iter().collect(),
        })
    }

    /// Creates a builder for a lineage graph version.
    pub fn lineage_graph(lineage_edge_version_ids: impl IntoIterator<Item = Id>) -> Self {
        Self::new(VersionDetails::LineageGraph {
            lineage_edge_version_ids: lineage_edge_version_ids.into_iter().collect(),
        })
    }

    /// Adds a valued tag.
    pub fn tag(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let tag = Tag::valued(EMPTY_ROOT, key, value);
        self.version.tags.insert(tag.key().to_string(), tag);
        self
    }

    /// Adds a tag without a value.
    pub fn flag(mut self, key: impl Into<String>) -> Self {
        let tag = Tag::flag(EMPTY_ROOT, key);
        self.version.tags.insert(tag.key().to_string(), tag);
        self
    }

    /// Adds a prebuilt tag.
    pub fn with_tag(mut self, tag: Tag) -> Self {
        self.version.tags.insert(tag.key().to_string(), tag);
        self
    }

    /// Declares the structure version the tags must satisfy.
    pub fn structure_version(mut self, structure_version_id: Id) -> Self {
        self.version.structure_version_id = Some(structure_version_id);
        self
    }

    /// Sets the external reference (a path, URL, commit, ...).
    pub fn reference(mut self, reference: impl Into<String>) -> Self {
        self.version.reference = Some(reference.into());
        self
    }

    pub fn reference_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.version
            .reference_parameters
            .insert(key.into(), value.into());
        self
    }

    pub fn build(self) -> NewVersion {
        self.version
    }
}
