//! Core type definitions for restsync.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// The domain payload of an entity: a JSON object of field name to value.
pub type Attributes = Map<String, Value>;

/// Query parameters recorded with, and sent for, read requests.
pub type QueryParams = Map<String, Value>;

/// Server-assigned identifier of an entity.
///
/// Servers key records by integers or by strings (UUIDs, slugs); both are
/// carried verbatim. `1` and `"1"` are different identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResourceId {
    /// Integer identifier.
    Int(i64),
    /// String identifier.
    Str(String),
}

impl ResourceId {
    /// Reads an identifier out of a JSON value.
    ///
    /// Returns `None` for anything that cannot key a record (null, floats,
    /// booleans, arrays, objects).
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_i64().map(ResourceId::Int),
            Value::String(s) => Some(ResourceId::Str(s.clone())),
            _ => None,
        }
    }

    /// Converts the identifier back into a JSON value.
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            ResourceId::Int(n) => Value::from(*n),
            ResourceId::Str(s) => Value::String(s.clone()),
        }
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceId::Int(n) => write!(f, "{n}"),
            ResourceId::Str(s) => f.write_str(s),
        }
    }
}

impl From<i64> for ResourceId {
    fn from(value: i64) -> Self {
        ResourceId::Int(value)
    }
}

impl From<i32> for ResourceId {
    fn from(value: i32) -> Self {
        ResourceId::Int(i64::from(value))
    }
}

impl From<u32> for ResourceId {
    fn from(value: u32) -> Self {
        ResourceId::Int(i64::from(value))
    }
}

impl From<&str> for ResourceId {
    fn from(value: &str) -> Self {
        ResourceId::Str(value.to_string())
    }
}

impl From<String> for ResourceId {
    fn from(value: String) -> Self {
        ResourceId::Str(value)
    }
}

/// Locally generated identifier for a record the server has not seen yet.
///
/// Client IDs are allocated when a create request is issued and stay on the
/// slot after the server assigns a [`ResourceId`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(pub u64);

impl ClientId {
    /// Creates a client ID from a raw value.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cid:{}", self.0)
    }
}
