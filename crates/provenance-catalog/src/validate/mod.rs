//! Semantic validation for new items and versions.
//!
//! Tag invariants are enforced when a [`Tag`](crate::Tag) is constructed.
//! The checks here need more context: the declared schema of a structure
//! version, or the kind of the owning item. They run once, at creation time,
//! before anything is persisted.

use std::collections::BTreeMap;

use crate::error::ValidationError;
use crate::model::{GroundType, ItemExtra, ItemKind, StructureVersion, TagMap, VersionDetails};

/// Validates version tags against a structure version's schema.
///
/// Every attribute must be present as a tag with a value of the declared
/// type. Tags not mentioned in the schema pass through unchecked.
pub fn validate_structure_tags(
    structure: &StructureVersion,
    tags: &TagMap,
) -> Result<(), ValidationError> {
    if tags.is_empty() && !structure.attributes.is_empty() {
        return Err(ValidationError::NoTagsSpecified {
            structure_version_id: structure.id,
            required: structure.attributes.len(),
        });
    }

    for (key, expected) in &structure.attributes {
        let tag = tags.get(key).ok_or_else(|| ValidationError::MissingTag {
            key: key.clone(),
        })?;
        let found = tag
            .value_type()
            .ok_or_else(|| ValidationError::TagWithoutValue { key: key.clone() })?;
        if found != *expected {
            return Err(ValidationError::WrongTagType {
                key: key.clone(),
                expected: *expected,
                found,
            });
        }
    }

    Ok(())
}

/// Validates that version details match the owning item's kind.
pub fn validate_details(kind: ItemKind, details: &VersionDetails) -> Result<(), ValidationError> {
    if details.kind() != kind {
        return Err(ValidationError::KindMismatch {
            kind,
            details: details.name(),
        });
    }
    Ok(())
}

/// Validates that kind-specific item fields match the item's kind.
pub fn validate_item_extra(kind: ItemKind, extra: &ItemExtra) -> Result<(), ValidationError> {
    match (kind, extra) {
        (ItemKind::Edge, ItemExtra::Edge { .. }) => Ok(()),
        (ItemKind::Edge, ItemExtra::None) => Err(ValidationError::MissingEdgeEndpoints),
        (_, ItemExtra::Edge { .. }) => Err(ValidationError::UnexpectedEdgeEndpoints { kind }),
        (_, ItemExtra::None) => Ok(()),
    }
}

/// Validates the attribute map of a new structure version.
pub fn validate_attributes(
    attributes: &BTreeMap<String, GroundType>,
) -> Result<(), ValidationError> {
    if attributes.keys().any(String::is_empty) {
        return Err(ValidationError::EmptyAttributeKey);
    }
    Ok(())
}
