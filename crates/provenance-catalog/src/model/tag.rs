//! Typed key/value tags.
//!
//! A tag is owned by exactly one item or version. Its value type is derived
//! from the value, so a tag can never carry a value of one type while
//! claiming another.

use std::collections::BTreeMap;

use crate::error::ValidationError;
use crate::model::{GroundType, Id, Value};

/// Tags keyed by tag key, in deterministic order.
pub type TagMap = BTreeMap<String, Tag>;

/// A key/value pair attached to an item or a version.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Tag {
    owner_id: Id,
    key: String,
    value: Option<Value>,
}

impl Tag {
    /// Creates a tag, checking the value against its declared type.
    ///
    /// `value` and `value_type` must either both be present or both be
    /// absent, and a present value must have the declared type.
    pub fn new(
        owner_id: Id,
        key: impl Into<String>,
        value: Option<Value>,
        value_type: Option<GroundType>,
    ) -> Result<Self, ValidationError> {
        let key = key.into();
        if key.is_empty() {
            return Err(ValidationError::EmptyTagKey);
        }
        match (&value, value_type) {
            (None, None) => {}
            (Some(_), None) => return Err(ValidationError::ValueWithoutType { key }),
            (None, Some(value_type)) => {
                return Err(ValidationError::TypeWithoutValue { key, value_type });
            }
            (Some(v), Some(expected)) => {
                let found = v.ground_type();
                if found != expected {
                    return Err(ValidationError::ValueTypeMismatch {
                        key,
                        expected,
                        found,
                    });
                }
            }
        }
        Ok(Self {
            owner_id,
            key,
            value,
        })
    }

    /// Creates a tag holding `value`; the type is taken from the value.
    pub fn valued(owner_id: Id, key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            owner_id,
            key: key.into(),
            value: Some(value.into()),
        }
    }

    /// Creates a tag with neither value nor type.
    pub fn flag(owner_id: Id, key: impl Into<String>) -> Self {
        Self {
            owner_id,
            key: key.into(),
            value: None,
        }
    }

    /// Creates a tag by parsing `text` as `value_type`.
    pub fn parse(
        owner_id: Id,
        key: impl Into<String>,
        text: &str,
        value_type: GroundType,
    ) -> Result<Self, ValidationError> {
        let value = value_type.parse(text)?;
        Self::new(owner_id, key, Some(value), Some(value_type))
    }

    pub fn owner_id(&self) -> Id {
        self.owner_id
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    /// Returns the value type, present exactly when a value is present.
    pub fn value_type(&self) -> Option<GroundType> {
        self.value.as_ref().map(Value::ground_type)
    }

    /// Returns a copy of this tag owned by `owner_id`.
    pub fn with_owner(&self, owner_id: Id) -> Self {
        Self {
            owner_id,
            ..self.clone()
        }
    }
}

/// Builds a [`TagMap`] keyed by each tag's own key; later duplicates win.
pub fn tag_map(tags: impl IntoIterator<Item = Tag>) -> TagMap {
    tags.into_iter().map(|t| (t.key.clone(), t)).collect()
}

/// Rewrites every tag's owner to `owner_id` after checking map keys.
///
/// Each entry must be stored under its own tag key, and no key may be empty.
pub fn reown_tags(tags: &TagMap, owner_id: Id) -> Result<TagMap, ValidationError> {
    let mut out = TagMap::new();
    for (map_key, tag) in tags {
        if tag.key.is_empty() {
            return Err(ValidationError::EmptyTagKey);
        }
        if *map_key != tag.key {
            return Err(ValidationError::TagKeyMismatch {
                map_key: map_key.clone(),
                tag_key: tag.key.clone(),
            });
        }
        out.insert(map_key.clone(), tag.with_owner(owner_id));
    }
    Ok(out)
}
