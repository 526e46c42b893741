//! Store wire types: attribute values and items.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single attribute value as understood by the key-value store.
///
/// Serialized in the externally tagged form (`{"S": "R1"}`, `{"N": 10.0}`),
/// which is also how the SQLite backend persists items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    /// String attribute.
    S(String),
    /// Number attribute.
    N(f64),
    /// Nested map attribute.
    M(BTreeMap<String, AttributeValue>),
}

impl AttributeValue {
    /// Borrow the string payload, if this is a string attribute.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::S(s) => Some(s),
            _ => None,
        }
    }

    /// The number payload, if this is a number attribute.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::N(n) => Some(*n),
            _ => None,
        }
    }

    /// Borrow the map payload, if this is a map attribute.
    pub fn as_map(&self) -> Option<&BTreeMap<String, AttributeValue>> {
        match self {
            Self::M(m) => Some(m),
            _ => None,
        }
    }
}

/// A stored item (or a primary key): attribute name → value.
pub type Item = BTreeMap<String, AttributeValue>;
