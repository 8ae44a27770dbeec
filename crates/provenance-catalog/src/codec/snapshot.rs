//! Snapshot encoding/decoding.
//!
//! A snapshot is the binary image of a whole [`StoreState`]:
//!
//! - Uncompressed: `PCAT` magic, format version, body, SHA-256 of every
//!   preceding byte
//! - Compressed: `PCATZ` magic, uncompressed size, zstd frame of the
//!   uncompressed form
//!
//! The body is a fixed sequence of count-prefixed sections, one per
//! relation, each in ascending id order.

use std::collections::BTreeMap;
use std::io::Read;

use sha2::{Digest, Sha256};

use crate::codec::primitives::{Reader, Writer};
use crate::error::{DecodeError, EncodeError};
use crate::limits::{
    CHECKSUM_LEN, FORMAT_VERSION, MAGIC_COMPRESSED, MAGIC_UNCOMPRESSED, MAX_RECORDS,
    MAX_SNAPSHOT_SIZE, MAX_STRING_LEN,
};
use crate::model::{
    GroundType, Id, ItemExtra, ItemKind, StructureVersion, Tag, TagMap, Value, VersionDetails,
    VersionSuccessor,
};
use crate::storage::{ItemRow, RichVersionRow, StoreState};

// Value tags
const VALUE_NONE: u8 = 0;
const VALUE_STRING: u8 = 1;
const VALUE_INTEGER: u8 = 2;
const VALUE_LONG: u8 = 3;
const VALUE_BOOLEAN: u8 = 4;

// Item extra tags
const EXTRA_NONE: u8 = 0;
const EXTRA_EDGE: u8 = 1;

// =============================================================================
// DECODING
// =============================================================================

/// Decodes a snapshot, compressed or not.
pub fn decode_snapshot(input: &[u8]) -> Result<StoreState, DecodeError> {
    if input.len() < MAGIC_UNCOMPRESSED.len() {
        return Err(DecodeError::UnexpectedEof { context: "magic" });
    }

    if input.starts_with(MAGIC_COMPRESSED) {
        let decompressed = decompress_zstd(&input[MAGIC_COMPRESSED.len()..])?;
        decode_uncompressed(&decompressed)
    } else if input.starts_with(MAGIC_UNCOMPRESSED) {
        if input.len() > MAX_SNAPSHOT_SIZE {
            return Err(DecodeError::LengthExceedsLimit {
                field: "snapshot",
                len: input.len(),
                max: MAX_SNAPSHOT_SIZE,
            });
        }
        decode_uncompressed(input)
    } else {
        let mut found = [0u8; 4];
        found.copy_from_slice(&input[0..4]);
        Err(DecodeError::InvalidMagic { found })
    }
}

fn decode_uncompressed(data: &[u8]) -> Result<StoreState, DecodeError> {
    let mut header = Reader::new(data);
    let magic = header.read_bytes(MAGIC_UNCOMPRESSED.len(), "magic")?;
    if magic != MAGIC_UNCOMPRESSED {
        let mut found = [0u8; 4];
        found.copy_from_slice(magic);
        return Err(DecodeError::InvalidMagic { found });
    }
    let version = header.read_byte("version")?;
    if version != FORMAT_VERSION {
        return Err(DecodeError::UnsupportedVersion { version });
    }
    if header.remaining_len() < CHECKSUM_LEN {
        return Err(DecodeError::UnexpectedEof { context: "checksum" });
    }

    let (covered, checksum) = data.split_at(data.len() - CHECKSUM_LEN);
    if Sha256::digest(covered).as_slice() != checksum {
        return Err(DecodeError::ChecksumMismatch);
    }

    let mut reader = Reader::new(&covered[header.position()..]);
    let mut state = StoreState::default();
    decode_items(&mut reader, &mut state)?;
    decode_tags(&mut reader, &mut state)?;
    decode_versions(&mut reader, &mut state)?;
    decode_rich_versions(&mut reader, &mut state)?;
    decode_details(&mut reader, &mut state)?;
    decode_structure_versions(&mut reader, &mut state)?;
    decode_successors(&mut reader, &mut state)?;
    decode_histories(&mut reader, &mut state)?;

    if !reader.is_empty() {
        return Err(DecodeError::TrailingBytes {
            count: reader.remaining_len(),
        });
    }

    state.reindex();
    Ok(state)
}

fn decompress_zstd(compressed: &[u8]) -> Result<Vec<u8>, DecodeError> {
    // Read uncompressed size
    let mut reader = Reader::new(compressed);
    let declared_size = reader.read_varint("uncompressed_size")? as usize;

    if declared_size > MAX_SNAPSHOT_SIZE {
        return Err(DecodeError::LengthExceedsLimit {
            field: "uncompressed_size",
            len: declared_size,
            max: MAX_SNAPSHOT_SIZE,
        });
    }

    let compressed_data = &compressed[reader.position()..];

    let decoder = zstd::Decoder::new(compressed_data)
        .map_err(|e| DecodeError::DecompressionFailed(e.to_string()))?;

    // One byte past the declared size is enough to detect a lying header.
    let mut decompressed = Vec::with_capacity(declared_size);
    decoder
        .take(declared_size as u64 + 1)
        .read_to_end(&mut decompressed)
        .map_err(|e| DecodeError::DecompressionFailed(e.to_string()))?;

    if decompressed.len() != declared_size {
        return Err(DecodeError::UncompressedSizeMismatch {
            declared: declared_size,
            actual: decompressed.len(),
        });
    }

    Ok(decompressed)
}

fn insert_unique<V>(
    map: &mut BTreeMap<Id, V>,
    id: Id,
    value: V,
    context: &'static str,
) -> Result<(), DecodeError> {
    if map.insert(id, value).is_some() {
        return Err(DecodeError::MalformedEncoding { context });
    }
    Ok(())
}

fn decode_kind(reader: &mut Reader<'_>) -> Result<ItemKind, DecodeError> {
    let tag = reader.read_byte("item_kind")?;
    ItemKind::from_u8(tag).ok_or(DecodeError::InvalidEnumTag {
        field: "item_kind",
        tag,
    })
}

fn decode_ground_type(reader: &mut Reader<'_>) -> Result<GroundType, DecodeError> {
    let tag = reader.read_byte("ground_type")?;
    GroundType::from_u8(tag).ok_or(DecodeError::InvalidEnumTag {
        field: "ground_type",
        tag,
    })
}

fn decode_items(reader: &mut Reader<'_>, state: &mut StoreState) -> Result<(), DecodeError> {
    let count = reader.read_count(MAX_RECORDS, "items")?;
    for _ in 0..count {
        let id = reader.read_id("item_id")?;
        let kind = decode_kind(reader)?;
        let name = reader.read_string(MAX_STRING_LEN, "item_name")?;
        let source_key = reader.read_string(MAX_STRING_LEN, "source_key")?;
        let extra = match reader.read_byte("item_extra")? {
            EXTRA_NONE => ItemExtra::None,
            EXTRA_EDGE => ItemExtra::Edge {
                from_node_id: reader.read_id("from_node_id")?,
                to_node_id: reader.read_id("to_node_id")?,
            },
            tag => {
                return Err(DecodeError::InvalidEnumTag {
                    field: "item_extra",
                    tag,
                });
            }
        };
        let row = ItemRow {
            kind,
            name,
            source_key,
            extra,
        };
        insert_unique(&mut state.items, id, row, "duplicate item id")?;
    }
    Ok(())
}

fn decode_tags(reader: &mut Reader<'_>, state: &mut StoreState) -> Result<(), DecodeError> {
    let owners = reader.read_count(MAX_RECORDS, "tag_owners")?;
    for _ in 0..owners {
        let owner_id = reader.read_id("tag_owner")?;
        let count = reader.read_count(MAX_RECORDS, "tags")?;
        let mut tags = TagMap::new();
        for _ in 0..count {
            let key = reader.read_string(MAX_STRING_LEN, "tag_key")?;
            let tag = match decode_value(reader)? {
                Some(value) => Tag::valued(owner_id, key.clone(), value),
                None => Tag::flag(owner_id, key.clone()),
            };
            if tags.insert(key, tag).is_some() {
                return Err(DecodeError::MalformedEncoding {
                    context: "duplicate tag key",
                });
            }
        }
        insert_unique(&mut state.tags, owner_id, tags, "duplicate tag owner")?;
    }
    Ok(())
}

fn decode_value(reader: &mut Reader<'_>) -> Result<Option<Value>, DecodeError> {
    let value = match reader.read_byte("value_type")? {
        VALUE_NONE => return Ok(None),
        VALUE_STRING => Value::String(reader.read_string(MAX_STRING_LEN, "tag_value")?),
        VALUE_INTEGER => {
            let wide = reader.read_signed_varint("tag_value")?;
            let narrow = i32::try_from(wide).map_err(|_| DecodeError::MalformedEncoding {
                context: "INTEGER tag value out of range",
            })?;
            Value::Integer(narrow)
        }
        VALUE_LONG => Value::Long(reader.read_signed_varint("tag_value")?),
        VALUE_BOOLEAN => Value::Boolean(reader.read_bool("tag_value")?),
        tag => {
            return Err(DecodeError::InvalidEnumTag {
                field: "value_type",
                tag,
            });
        }
    };
    Ok(Some(value))
}

fn decode_versions(reader: &mut Reader<'_>, state: &mut StoreState) -> Result<(), DecodeError> {
    let count = reader.read_count(MAX_RECORDS, "versions")?;
    for _ in 0..count {
        let id = reader.read_id("version_id")?;
        let item_id = reader.read_id("version_item_id")?;
        insert_unique(&mut state.versions, id, item_id, "duplicate version id")?;
    }
    Ok(())
}

fn decode_rich_versions(reader: &mut Reader<'_>, state: &mut StoreState) -> Result<(), DecodeError> {
    let count = reader.read_count(MAX_RECORDS, "rich_versions")?;
    for _ in 0..count {
        let id = reader.read_id("rich_version_id")?;
        let structure_version_id = reader.read_opt_id("structure_version_id")?;
        let reference = if reader.read_bool("reference")? {
            Some(reader.read_string(MAX_STRING_LEN, "reference")?)
        } else {
            None
        };
        let params = reader.read_count(MAX_RECORDS, "reference_parameters")?;
        let mut reference_parameters = BTreeMap::new();
        for _ in 0..params {
            let key = reader.read_string(MAX_STRING_LEN, "reference_parameter_key")?;
            let value = reader.read_string(MAX_STRING_LEN, "reference_parameter_value")?;
            reference_parameters.insert(key, value);
        }
        let row = RichVersionRow {
            structure_version_id,
            reference,
            reference_parameters,
        };
        insert_unique(&mut state.rich_versions, id, row, "duplicate rich version id")?;
    }
    Ok(())
}

fn decode_details(reader: &mut Reader<'_>, state: &mut StoreState) -> Result<(), DecodeError> {
    let count = reader.read_count(MAX_RECORDS, "version_details")?;
    for _ in 0..count {
        let id = reader.read_id("details_id")?;
        let details = match decode_kind(reader)? {
            ItemKind::Node => VersionDetails::Node,
            ItemKind::Edge => VersionDetails::Edge {
                from_node_version_start_id: reader.read_id("from_node_version_start_id")?,
                from_node_version_end_id: reader.read_opt_id("from_node_version_end_id")?,
                to_node_version_start_id: reader.read_id("to_node_version_start_id")?,
                to_node_version_end_id: reader.read_opt_id("to_node_version_end_id")?,
            },
            ItemKind::Graph => VersionDetails::Graph {
                edge_version_ids: reader.read_id_vec("edge_version_ids")?,
            },
            ItemKind::LineageEdge => VersionDetails::LineageEdge {
                from_rich_version_id: reader.read_id("from_rich_version_id")?,
                to_rich_version_id: reader.read_id("to_rich_version_id")?,
                principal_id: reader.read_opt_id("principal_id")?,
            },
            ItemKind::LineageGraph => VersionDetails::LineageGraph {
                lineage_edge_version_ids: reader.read_id_vec("lineage_edge_version_ids")?,
            },
            ItemKind::Structure => {
                return Err(DecodeError::InvalidEnumTag {
                    field: "version_details",
                    tag: ItemKind::Structure as u8,
                });
            }
        };
        insert_unique(&mut state.details, id, details, "duplicate version details")?;
    }
    Ok(())
}

fn decode_structure_versions(
    reader: &mut Reader<'_>,
    state: &mut StoreState,
) -> Result<(), DecodeError> {
    let count = reader.read_count(MAX_RECORDS, "structure_versions")?;
    for _ in 0..count {
        let id = reader.read_id("structure_version_id")?;
        let structure_id = reader.read_id("structure_id")?;
        let attrs = reader.read_count(MAX_RECORDS, "attributes")?;
        let mut attributes = BTreeMap::new();
        for _ in 0..attrs {
            let key = reader.read_string(MAX_STRING_LEN, "attribute_key")?;
            attributes.insert(key, decode_ground_type(reader)?);
        }
        let structure = StructureVersion {
            id,
            structure_id,
            attributes,
        };
        insert_unique(
            &mut state.structure_versions,
            id,
            structure,
            "duplicate structure version id",
        )?;
    }
    Ok(())
}

fn decode_successors(reader: &mut Reader<'_>, state: &mut StoreState) -> Result<(), DecodeError> {
    let count = reader.read_count(MAX_RECORDS, "successors")?;
    for _ in 0..count {
        let id = reader.read_id("successor_id")?;
        let from_id = reader.read_id("successor_from")?;
        let to_id = reader.read_id("successor_to")?;
        let edge = VersionSuccessor::new(id, from_id, to_id);
        insert_unique(&mut state.successors, id, edge, "duplicate successor id")?;
    }
    Ok(())
}

fn decode_histories(reader: &mut Reader<'_>, state: &mut StoreState) -> Result<(), DecodeError> {
    let count = reader.read_count(MAX_RECORDS, "histories")?;
    for _ in 0..count {
        let item_id = reader.read_id("history_item_id")?;
        let edge_ids = reader.read_id_vec("history_edges")?;
        for edge_id in &edge_ids {
            if !state.successors.contains_key(edge_id) {
                return Err(DecodeError::MalformedEncoding {
                    context: "history references unknown successor",
                });
            }
        }
        let edges = edge_ids.into_iter().collect();
        insert_unique(&mut state.histories, item_id, edges, "duplicate history")?;
    }
    Ok(())
}

// =============================================================================
// ENCODING
// =============================================================================

/// Encodes a store as an uncompressed snapshot.
pub fn encode_snapshot(state: &StoreState) -> Result<Vec<u8>, EncodeError> {
    let mut writer = Writer::with_capacity(1024);
    writer.write_bytes(MAGIC_UNCOMPRESSED);
    writer.write_byte(FORMAT_VERSION);

    encode_items(&mut writer, state)?;
    encode_tags(&mut writer, state)?;
    encode_versions(&mut writer, state)?;
    encode_rich_versions(&mut writer, state)?;
    encode_details(&mut writer, state)?;
    encode_structure_versions(&mut writer, state)?;
    encode_successors(&mut writer, state)?;
    encode_histories(&mut writer, state)?;

    check_len("snapshot", writer.len() + CHECKSUM_LEN, MAX_SNAPSHOT_SIZE)?;
    let checksum = Sha256::digest(writer.as_bytes());
    writer.write_bytes(checksum.as_slice());
    Ok(writer.into_bytes())
}

/// Encodes a store as a zstd-compressed snapshot.
pub fn encode_snapshot_compressed(state: &StoreState, level: i32) -> Result<Vec<u8>, EncodeError> {
    let uncompressed = encode_snapshot(state)?;

    let compressed = zstd::encode_all(uncompressed.as_slice(), level)
        .map_err(|e| EncodeError::CompressionFailed(e.to_string()))?;

    let mut writer = Writer::with_capacity(5 + 10 + compressed.len());
    writer.write_bytes(MAGIC_COMPRESSED);
    writer.write_varint(uncompressed.len() as u64);
    writer.write_bytes(&compressed);

    Ok(writer.into_bytes())
}

fn check_len(field: &'static str, len: usize, max: usize) -> Result<(), EncodeError> {
    if len > max {
        return Err(EncodeError::LengthExceedsLimit { field, len, max });
    }
    Ok(())
}

fn write_count(writer: &mut Writer, field: &'static str, len: usize) -> Result<(), EncodeError> {
    check_len(field, len, MAX_RECORDS)?;
    writer.write_varint(len as u64);
    Ok(())
}

fn write_str(writer: &mut Writer, field: &'static str, s: &str) -> Result<(), EncodeError> {
    check_len(field, s.len(), MAX_STRING_LEN)?;
    writer.write_string(s);
    Ok(())
}

fn write_ids(writer: &mut Writer, field: &'static str, ids: &[Id]) -> Result<(), EncodeError> {
    check_len(field, ids.len(), MAX_RECORDS)?;
    writer.write_id_vec(ids);
    Ok(())
}

fn encode_items(writer: &mut Writer, state: &StoreState) -> Result<(), EncodeError> {
    write_count(writer, "items", state.items.len())?;
    for (id, row) in &state.items {
        writer.write_id(*id);
        writer.write_byte(row.kind as u8);
        write_str(writer, "item_name", &row.name)?;
        write_str(writer, "source_key", &row.source_key)?;
        match row.extra {
            ItemExtra::None => writer.write_byte(EXTRA_NONE),
            ItemExtra::Edge {
                from_node_id,
                to_node_id,
            } => {
                writer.write_byte(EXTRA_EDGE);
                writer.write_id(from_node_id);
                writer.write_id(to_node_id);
            }
        }
    }
    Ok(())
}

fn encode_tags(writer: &mut Writer, state: &StoreState) -> Result<(), EncodeError> {
    write_count(writer, "tag_owners", state.tags.len())?;
    for (owner_id, tags) in &state.tags {
        writer.write_id(*owner_id);
        write_count(writer, "tags", tags.len())?;
        for (key, tag) in tags {
            write_str(writer, "tag_key", key)?;
            encode_value(writer, tag.value())?;
        }
    }
    Ok(())
}

fn encode_value(writer: &mut Writer, value: Option<&Value>) -> Result<(), EncodeError> {
    match value {
        None => writer.write_byte(VALUE_NONE),
        Some(Value::String(s)) => {
            writer.write_byte(VALUE_STRING);
            write_str(writer, "tag_value", s)?;
        }
        Some(Value::Integer(v)) => {
            writer.write_byte(VALUE_INTEGER);
            writer.write_signed_varint(i64::from(*v));
        }
        Some(Value::Long(v)) => {
            writer.write_byte(VALUE_LONG);
            writer.write_signed_varint(*v);
        }
        Some(Value::Boolean(v)) => {
            writer.write_byte(VALUE_BOOLEAN);
            writer.write_bool(*v);
        }
    }
    Ok(())
}

fn encode_versions(writer: &mut Writer, state: &StoreState) -> Result<(), EncodeError> {
    write_count(writer, "versions", state.versions.len())?;
    for (id, item_id) in &state.versions {
        writer.write_id(*id);
        writer.write_id(*item_id);
    }
    Ok(())
}

fn encode_rich_versions(writer: &mut Writer, state: &StoreState) -> Result<(), EncodeError> {
    write_count(writer, "rich_versions", state.rich_versions.len())?;
    for (id, row) in &state.rich_versions {
        writer.write_id(*id);
        writer.write_opt_id(row.structure_version_id);
        match &row.reference {
            Some(reference) => {
                writer.write_bool(true);
                write_str(writer, "reference", reference)?;
            }
            None => writer.write_bool(false),
        }
        write_count(writer, "reference_parameters", row.reference_parameters.len())?;
        for (key, value) in &row.reference_parameters {
            write_str(writer, "reference_parameter_key", key)?;
            write_str(writer, "reference_parameter_value", value)?;
        }
    }
    Ok(())
}

fn encode_details(writer: &mut Writer, state: &StoreState) -> Result<(), EncodeError> {
    write_count(writer, "version_details", state.details.len())?;
    for (id, details) in &state.details {
        writer.write_id(*id);
        writer.write_byte(details.kind() as u8);
        match details {
            VersionDetails::Node => {}
            VersionDetails::Edge {
                from_node_version_start_id,
                from_node_version_end_id,
                to_node_version_start_id,
                to_node_version_end_id,
            } => {
                writer.write_id(*from_node_version_start_id);
                writer.write_opt_id(*from_node_version_end_id);
                writer.write_id(*to_node_version_start_id);
                writer.write_opt_id(*to_node_version_end_id);
            }
            VersionDetails::Graph { edge_version_ids } => {
                write_ids(writer, "edge_version_ids", edge_version_ids)?;
            }
            VersionDetails::LineageEdge {
                from_rich_version_id,
                to_rich_version_id,
                principal_id,
            } => {
                writer.write_id(*from_rich_version_id);
                writer.write_id(*to_rich_version_id);
                writer.write_opt_id(*principal_id);
            }
            VersionDetails::LineageGraph {
                lineage_edge_version_ids,
            } => {
                write_ids(writer, "lineage_edge_version_ids", lineage_edge_version_ids)?;
            }
        }
    }
    Ok(())
}

fn encode_structure_versions(writer: &mut Writer, state: &StoreState) -> Result<(), EncodeError> {
    write_count(writer, "structure_versions", state.structure_versions.len())?;
    for (id, structure) in &state.structure_versions {
        writer.write_id(*id);
        writer.write_id(structure.structure_id);
        write_count(writer, "attributes", structure.attributes.len())?;
        for (key, ground_type) in &structure.attributes {
            write_str(writer, "attribute_key", key)?;
            writer.write_byte(*ground_type as u8);
        }
    }
    Ok(())
}

fn encode_successors(writer: &mut Writer, state: &StoreState) -> Result<(), EncodeError> {
    write_count(writer, "successors", state.successors.len())?;
    for edge in state.successors.values() {
        writer.write_id(edge.id);
        writer.write_id(edge.from_id);
        writer.write_id(edge.to_id);
    }
    Ok(())
}

fn encode_histories(writer: &mut Writer, state: &StoreState) -> Result<(), EncodeError> {
    write_count(writer, "histories", state.histories.len())?;
    for (item_id, edge_ids) in &state.histories {
        writer.write_id(*item_id);
        let ids: Vec<Id> = edge_ids.iter().copied().collect();
        write_ids(writer, "history_edges", &ids)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Item, RichVersion, tag_map};

    fn sample_state() -> StoreState {
        let mut state = StoreState::default();
        state
            .insert_item(&Item {
                id: 1,
                kind: ItemKind::Edge,
                name: "orders -> invoices".into(),
                source_key: "orders/invoices".into(),
                tags: tag_map([Tag::valued(1, "owner", "ops"), Tag::flag(1, "pii")]),
                extra: ItemExtra::Edge {
                    from_node_id: 5,
                    to_node_id: 6,
                },
            })
            .unwrap();
        state.insert_version(10, 1).unwrap();
        state
            .insert_rich_version(&RichVersion {
                id: 10,
                item_id: 1,
                tags: tag_map([
                    Tag::valued(10, "rows", -4i64),
                    Tag::valued(10, "shard", i32::MIN),
                    Tag::valued(10, "ok", true),
                ]),
                structure_version_id: Some(99),
                reference: Some("s3://b/k".into()),
                reference_parameters: [("region".to_string(), "eu".to_string())].into(),
                details: VersionDetails::Edge {
                    from_node_version_start_id: 7,
                    from_node_version_end_id: None,
                    to_node_version_start_id: 8,
                    to_node_version_end_id: Some(9),
                },
            })
            .unwrap();
        state
            .insert_successor(1, &VersionSuccessor::new(20, 0, 10))
            .unwrap();
        state
    }

    #[test]
    fn test_snapshot_roundtrip() {
        let state = sample_state();
        let bytes = encode_snapshot(&state).unwrap();
        assert_eq!(&bytes[0..4], b"PCAT");
        assert_eq!(bytes[4], FORMAT_VERSION);
        assert_eq!(decode_snapshot(&bytes).unwrap(), state);
    }

    #[test]
    fn test_compressed_matches_uncompressed() {
        let state = sample_state();
        let compressed = encode_snapshot_compressed(&state, 3).unwrap();
        assert_eq!(&compressed[0..5], b"PCATZ");
        let decoded = decode_snapshot(&compressed).unwrap();
        assert_eq!(decoded, decode_snapshot(&encode_snapshot(&state).unwrap()).unwrap());
        assert_eq!(
            decoded.item_by_source_key(ItemKind::Edge, "orders/invoices").map(|i| i.id),
            Some(1)
        );
    }

    #[test]
    fn test_empty_state() {
        let bytes = encode_snapshot(&StoreState::default()).unwrap();
        assert_eq!(decode_snapshot(&bytes).unwrap(), StoreState::default());
    }

    #[test]
    fn test_corruption_detected() {
        let mut bytes = encode_snapshot(&sample_state()).unwrap();
        let mid = bytes.len() / 2;
        bytes[mid] ^= 0xFF;
        assert_eq!(decode_snapshot(&bytes), Err(DecodeError::ChecksumMismatch));
    }

    #[test]
    fn test_invalid_magic() {
        assert!(matches!(
            decode_snapshot(b"XXXXXXXX"),
            Err(DecodeError::InvalidMagic { .. })
        ));
        assert!(matches!(
            decode_snapshot(b"PC"),
            Err(DecodeError::UnexpectedEof { .. })
        ));
    }

    #[test]
    fn test_unsupported_version() {
        let mut data = Vec::new();
        data.extend_from_slice(MAGIC_UNCOMPRESSED);
        data.push(99);
        data.extend_from_slice(&[0u8; 100]);
        assert_eq!(
            decode_snapshot(&data),
            Err(DecodeError::UnsupportedVersion { version: 99 })
        );
    }

    #[test]
    fn test_truncated_input() {
        let bytes = encode_snapshot(&sample_state()).unwrap();
        assert!(decode_snapshot(&bytes[..bytes.len() - 40]).is_err());
        assert!(matches!(
            decode_snapshot(&bytes[..6]),
            Err(DecodeError::UnexpectedEof { context: "checksum" })
        ));
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let mut body = encode_snapshot(&StoreState::default()).unwrap();
        body.truncate(body.len() - CHECKSUM_LEN);
        body.push(0);
        let checksum = Sha256::digest(&body);
        body.extend_from_slice(checksum.as_slice());
        assert_eq!(
            decode_snapshot(&body),
            Err(DecodeError::TrailingBytes { count: 1 })
        );
    }

    #[test]
    fn test_compressed_size_mismatch() {
        let inner = encode_snapshot(&StoreState::default()).unwrap();
        let compressed = zstd::encode_all(inner.as_slice(), 1).unwrap();
        let mut data = Vec::new();
        data.extend_from_slice(MAGIC_COMPRESSED);
        let mut writer = Writer::new();
        writer.write_varint(inner.len() as u64 + 7);
        data.extend_from_slice(writer.as_bytes());
        data.extend_from_slice(&compressed);
        assert!(matches!(
            decode_snapshot(&data),
            Err(DecodeError::UncompressedSizeMismatch { .. })
        ));
    }
}
