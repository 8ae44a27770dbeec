//! Data model types for the catalog.
//!
//! This module contains all the core types:
//! - Identifiers and the root sentinel
//! - Ground types, values and tags
//! - Items, versions and structure versions
//! - Successor edges and the per-item history DAG
//! - Builders for new items and versions

pub mod builder;
pub mod dag;
pub mod id;
pub mod item;
pub mod successor;
pub mod tag;
pub mod value;
pub mod version;

pub use builder::{ItemBuilder, NewItem, NewVersion, VersionBuilder};
pub use dag::VersionHistoryDag;
pub use id::{EMPTY_ROOT, Id, format_id, parse_id};
pub use item::{Item, ItemExtra, ItemKind};
pub use successor::VersionSuccessor;
pub use tag::{Tag, TagMap, reown_tags, tag_map};
pub use value::{GroundType, Value};
pub use version::{RichVersion, StructureVersion, Version, VersionDetails};
