//! Ground types and tag values.
//!
//! The value type set is closed: every tag value is a string, a 32-bit
//! integer, a 64-bit long or a boolean.

use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;

/// Value types a tag or structure attribute may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum GroundType {
    String = 1,
    Integer = 2,
    Long = 3,
    Boolean = 4,
}

impl GroundType {
    /// All ground types, in wire order.
    pub const ALL: [GroundType; 4] = [
        GroundType::String,
        GroundType::Integer,
        GroundType::Long,
        GroundType::Boolean,
    ];

    /// Creates a GroundType from its wire representation.
    pub fn from_u8(v: u8) -> Option<GroundType> {
        match v {
            1 => Some(GroundType::String),
            2 => Some(GroundType::Integer),
            3 => Some(GroundType::Long),
            4 => Some(GroundType::Boolean),
            _ => None,
        }
    }

    /// Returns the canonical upper-case name.
    pub fn name(self) -> &'static str {
        match self {
            GroundType::String => "STRING",
            GroundType::Integer => "INTEGER",
            GroundType::Long => "LONG",
            GroundType::Boolean => "BOOLEAN",
        }
    }

    /// Resolves a type name case-insensitively ("string", "INTEGER", ...).
    pub fn from_name(name: &str) -> Result<GroundType, ValidationError> {
        let trimmed = name.trim();
        GroundType::ALL
            .into_iter()
            .find(|t| t.name().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| ValidationError::UnknownGroundType {
                name: name.to_string(),
            })
    }

    /// Parses text into a value of this type.
    pub fn parse(self, text: &str) -> Result<Value, ValidationError> {
        let unparsable = || ValidationError::UnparsableValue {
            text: text.to_string(),
            ground_type: self,
        };
        match self {
            GroundType::String => Ok(Value::String(text.to_string())),
            GroundType::Integer => text.trim().parse().map(Value::Integer).map_err(|_| unparsable()),
            GroundType::Long => text.trim().parse().map(Value::Long).map_err(|_| unparsable()),
            GroundType::Boolean => {
                let t = text.trim();
                if t.eq_ignore_ascii_case("true") {
                    Ok(Value::Boolean(true))
                } else if t.eq_ignore_ascii_case("false") {
                    Ok(Value::Boolean(false))
                } else {
                    Err(unparsable())
                }
            }
        }
    }
}

impl fmt::Display for GroundType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for GroundType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        GroundType::from_name(s)
    }
}

/// A typed tag value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
    String(String),
    Integer(i32),
    Long(i64),
    Boolean(bool),
}

impl Value {
    /// Returns the ground type of this value.
    pub fn ground_type(&self) -> GroundType {
        match self {
            Value::String(_) => GroundType::String,
            Value::Integer(_) => GroundType::Integer,
            Value::Long(_) => GroundType::Long,
            Value::Boolean(_) => GroundType::Boolean,
        }
    }
}

/// Plain text form; `ground_type().parse(&v.to_string())` yields `v` again.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => f.write_str(s),
            Value::Integer(v) => write!(f, "{}", v),
            Value::Long(v) => write!(f, "{}", v),
            Value::Boolean(v) => write!(f, "{}", v),
        }
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Long(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}
