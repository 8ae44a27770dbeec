//! Provenance catalog: versioned items, derivation histories and typed tags.
//!
//! This crate tracks named entities (items) and, for each item, an
//! append-only history of immutable versions connected by successor edges
//! into a directed acyclic graph.
//!
//! # Overview
//!
//! The catalog is built around a few rules:
//! - **Immutable versions**: versions are only ever created or truncated away
//! - **Validated ancestry**: an edge may only start at a version already in
//!   the item's history, or at the item root
//! - **Bounded history**: truncation keeps the newest levels and re-roots them
//!
//! # Quick Start
//!
//! ```rust
//! use provenance_catalog::{Catalog, CatalogConfig, ItemKind};
//! use provenance_catalog::model::builder::{ItemBuilder, VersionBuilder};
//!
//! let catalog = Catalog::in_memory(&CatalogConfig::default()).unwrap();
//! let item = catalog
//!     .create_item(ItemBuilder::new(ItemKind::Node, "warehouse/orders").build())
//!     .unwrap();
//!
//! let v1 = catalog.create_version(item.id, VersionBuilder::node().build(), &[]).unwrap();
//! let v2 = catalog.create_version(item.id, VersionBuilder::node().build(), &[v1.id]).unwrap();
//! assert_eq!(catalog.leaves(item.id).unwrap(), vec![v2.id]);
//!
//! let report = catalog.truncate(item.id, 1).unwrap();
//! assert_eq!(report.deleted, vec![v1.id]);
//! ```
//!
//! # Modules
//!
//! - [`model`]: Core data types (Item, Version, Tag, VersionHistoryDag)
//! - [`catalog`]: The engine and its entry points
//! - [`history`]: Edge insertion, leaves and truncation
//! - [`storage`]: The storage driver contract, in-memory and file drivers
//! - [`codec`]: Binary snapshot encoding with compression support
//! - [`validate`]: Schema and kind validation
//! - [`id_gen`]: Machine-partitioned id allocation
//! - [`config`], [`telemetry`]: Settings and logging setup
//! - [`error`]: Error types
//! - [`limits`]: Bounds for snapshot decoding
//!
//! # Snapshot Format
//!
//! The file driver persists a whole store as one snapshot:
//! - Uncompressed: `PCAT` magic + version + body + SHA-256
//! - Compressed: `PCATZ` magic + uncompressed size + zstd data
//!
//! The decoder detects both forms.

pub mod catalog;
pub mod codec;
pub mod config;
pub mod error;
pub mod history;
pub mod id_gen;
pub mod limits;
pub mod model;
pub mod storage;
pub mod telemetry;
pub mod validate;

// Re-export commonly used types at crate root
pub use catalog::Catalog;
pub use codec::{decode_snapshot, encode_snapshot, encode_snapshot_compressed};
pub use config::CatalogConfig;
pub use error::{
    CatalogError, CatalogResult, DecodeError, EncodeError, ErrorCode, StorageError, ValidationError,
};
pub use history::{History, TruncationReport};
pub use id_gen::{IdGenerator, IdNamespace, IdParts};
pub use model::{
    EMPTY_ROOT, GroundType, Id, Item, ItemBuilder, ItemExtra, ItemKind, NewItem, NewVersion,
    RichVersion, StructureVersion, Tag, TagMap, Value, Version, VersionBuilder, VersionDetails,
    VersionHistoryDag, VersionSuccessor, format_id, parse_id, tag_map,
};
pub use storage::{FileStore, MemoryStore, StorageDriver, StoreState, StoreStats};
pub use telemetry::{LogConfig, LogFormat, LogLevel, init_logging};
pub use validate::{validate_attributes, validate_details, validate_item_extra, validate_structure_tags};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
