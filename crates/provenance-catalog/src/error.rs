//! Error types for the catalog engine, validation, storage drivers and the
//! snapshot codec.

use std::path::PathBuf;

use thiserror::Error;

use crate::model::{GroundType, Id, ItemKind};

/// Error classes surfaced to API layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Tag/value-type mismatch, schema violation or malformed request.
    Validation,
    /// The requested item does not exist.
    ItemNotFound,
    /// The requested version does not exist.
    VersionNotFound,
    /// An item with the same source key already exists.
    ItemAlreadyExists,
    /// A non-root parent is absent from the item's history.
    ParentNotInDag,
    /// The storage driver failed.
    Storage,
    /// Misconfiguration or an exhausted id space.
    Internal,
}

impl ErrorCode {
    /// Returns the stable code string (e.g., "ITEM_NOT_FOUND").
    pub fn code(&self) -> &'static str {
        match self {
            ErrorCode::Validation => "VALIDATION",
            ErrorCode::ItemNotFound => "ITEM_NOT_FOUND",
            ErrorCode::VersionNotFound => "VERSION_NOT_FOUND",
            ErrorCode::ItemAlreadyExists => "ITEM_ALREADY_EXISTS",
            ErrorCode::ParentNotInDag => "PARENT_NOT_IN_DAG",
            ErrorCode::Storage => "STORAGE",
            ErrorCode::Internal => "INTERNAL",
        }
    }

    /// Returns the HTTP status an API layer should map this class to.
    pub fn http_status(&self) -> u16 {
        match self {
            ErrorCode::Validation | ErrorCode::ParentNotInDag => 400,
            ErrorCode::ItemNotFound | ErrorCode::VersionNotFound => 404,
            ErrorCode::ItemAlreadyExists => 409,
            ErrorCode::Storage | ErrorCode::Internal => 500,
        }
    }
}

/// A request that violates a tag, schema or history invariant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("tag {key} has a value but no value type")]
    ValueWithoutType { key: String },

    #[error("tag {key} declares type {value_type} but has no value")]
    TypeWithoutValue { key: String, value_type: GroundType },

    #[error("tag {key} value does not match its declared type: expected {expected}, found {found}")]
    ValueTypeMismatch {
        key: String,
        expected: GroundType,
        found: GroundType,
    },

    #[error("tag keys must not be empty")]
    EmptyTagKey,

    #[error("tag stored under {map_key:?} is keyed {tag_key:?}")]
    TagKeyMismatch { map_key: String, tag_key: String },

    #[error("cannot parse {text:?} as {ground_type}")]
    UnparsableValue { text: String, ground_type: GroundType },

    #[error("unknown ground type {name:?}")]
    UnknownGroundType { name: String },

    #[error("no tags were specified even though structure version {structure_version_id} requires {required}")]
    NoTagsSpecified {
        structure_version_id: Id,
        required: usize,
    },

    #[error("no tag with key {key} was specified")]
    MissingTag { key: String },

    #[error("tag {key} has no value")]
    TagWithoutValue { key: String },

    #[error("tag {key} has wrong type: expected {expected}, found {found}")]
    WrongTagType {
        key: String,
        expected: GroundType,
        found: GroundType,
    },

    #[error("structure attribute keys must not be empty")]
    EmptyAttributeKey,

    #[error("{kind} items cannot hold {details} version details")]
    KindMismatch { kind: ItemKind, details: &'static str },

    #[error("edge endpoints are only valid on edge items, not {kind} items")]
    UnexpectedEdgeEndpoints { kind: ItemKind },

    #[error("edge items require from/to node endpoints")]
    MissingEdgeEndpoints,

    #[error("truncation must keep at least one level")]
    ZeroTruncationDepth,
}

/// Error raised by a storage driver.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("snapshot decode failed: {0}")]
    Decode(#[from] DecodeError),

    #[error("snapshot encode failed: {0}")]
    Encode(#[from] EncodeError),

    #[error("{relation} row {id} already exists")]
    DuplicateRow { relation: &'static str, id: Id },

    #[error("unique constraint on {relation} violated by {key:?}")]
    Conflict { relation: &'static str, key: String },

    #[error("{relation} row {id} is referenced but missing")]
    MissingRow { relation: &'static str, id: Id },

    #[error("backend failure: {0}")]
    Backend(String),
}

/// Error returned by the catalog engine.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("item {0} not found")]
    ItemNotFound(Id),

    #[error("{kind} with source key {source_key:?} not found")]
    SourceKeyNotFound { kind: ItemKind, source_key: String },

    #[error("version {0} not found")]
    VersionNotFound(Id),

    #[error("{kind} with source key {source_key:?} already exists")]
    ItemAlreadyExists { kind: ItemKind, source_key: String },

    #[error("parent {parent_id} is not in item {item_id}'s history")]
    ParentNotInDag { parent_id: Id, item_id: Id },

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("{namespace} id space exhausted")]
    IdSpaceExhausted { namespace: &'static str },
}

impl CatalogError {
    /// Returns the error class for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            CatalogError::Validation(_) => ErrorCode::Validation,
            CatalogError::ItemNotFound(_) | CatalogError::SourceKeyNotFound { .. } => {
                ErrorCode::ItemNotFound
            }
            CatalogError::VersionNotFound(_) => ErrorCode::VersionNotFound,
            CatalogError::ItemAlreadyExists { .. } => ErrorCode::ItemAlreadyExists,
            CatalogError::ParentNotInDag { .. } => ErrorCode::ParentNotInDag,
            CatalogError::Storage(_) => ErrorCode::Storage,
            CatalogError::Config(_) | CatalogError::IdSpaceExhausted { .. } => ErrorCode::Internal,
        }
    }
}

/// Result alias used throughout the engine.
pub type CatalogResult<T> = Result<T, CatalogError>;

/// Error during snapshot decoding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("invalid magic bytes: expected PCAT or PCATZ, found {found:?}")]
    InvalidMagic { found: [u8; 4] },

    #[error("unsupported snapshot version: {version}")]
    UnsupportedVersion { version: u8 },

    #[error("unexpected end of input while reading {context}")]
    UnexpectedEof { context: &'static str },

    #[error("varint exceeds maximum length (10 bytes)")]
    VarintTooLong,

    #[error("varint overflow (value exceeds u64)")]
    VarintOverflow,

    #[error("{field} length {len} exceeds maximum {max}")]
    LengthExceedsLimit {
        field: &'static str,
        len: usize,
        max: usize,
    },

    #[error("invalid UTF-8 in {field}")]
    InvalidUtf8 { field: &'static str },

    #[error("invalid {field} tag: {tag}")]
    InvalidEnumTag { field: &'static str, tag: u8 },

    #[error("invalid bool value: {value} (expected 0x00 or 0x01)")]
    InvalidBool { value: u8 },

    #[error("malformed snapshot: {context}")]
    MalformedEncoding { context: &'static str },

    #[error("snapshot checksum mismatch")]
    ChecksumMismatch,

    #[error("{count} trailing bytes after snapshot body")]
    TrailingBytes { count: usize },

    #[error("zstd decompression failed: {0}")]
    DecompressionFailed(String),

    #[error("decompressed size {actual} doesn't match declared {declared}")]
    UncompressedSizeMismatch { declared: usize, actual: usize },
}

/// Error during snapshot encoding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    #[error("{field} length {len} exceeds maximum {max}")]
    LengthExceedsLimit {
        field: &'static str,
        len: usize,
        max: usize,
    },

    #[error("zstd compression failed: {0}")]
    CompressionFailed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(CatalogError::ItemNotFound(7).code(), ErrorCode::ItemNotFound);
        assert_eq!(
            CatalogError::ParentNotInDag { parent_id: 1, item_id: 2 }.code().code(),
            "PARENT_NOT_IN_DAG"
        );
        assert_eq!(
            CatalogError::ItemAlreadyExists {
                kind: ItemKind::Node,
                source_key: "k".into()
            }
            .code()
            .http_status(),
            409
        );
        assert_eq!(ErrorCode::VersionNotFound.http_status(), 404);
    }

    #[test]
    fn test_wrong_type_message_names_key_and_types() {
        let err = ValidationError::WrongTagType {
            key: "intfield".into(),
            expected: GroundType::Integer,
            found: GroundType::String,
        };
        assert_eq!(
            err.to_string(),
            "tag intfield has wrong type: expected INTEGER, found STRING"
        );
    }

    #[test]
    fn test_parent_message() {
        let err = CatalogError::ParentNotInDag { parent_id: 5, item_id: 9 };
        assert_eq!(err.to_string(), "parent 5 is not in item 9's history");
    }
}
