//! Table provisioning types: key schema, attribute definitions, billing.

use serde::{Deserialize, Serialize};

use crate::record::{Record, RecordVariant};

/// Partition-key attribute shared by every censuskv table.
pub const REGION_ATTRIBUTE: &str = "RegionID";

/// Two-attribute primary key: partition (HASH) key holds the region id,
/// sort (RANGE) key holds the table/partition id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySchema {
    pub partition_key: String,
    pub sort_key: String,
}

impl KeySchema {
    pub fn for_variant(variant: RecordVariant) -> Self {
        Self {
            partition_key: REGION_ATTRIBUTE.into(),
            sort_key: variant.sort_key_attribute().into(),
        }
    }

    /// Derive the key schema from a sample record.
    pub fn from_sample(record: &Record) -> Self {
        Self::for_variant(RecordVariant::of(record))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttributeType {
    /// String.
    S,
    /// Number.
    N,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeDefinition {
    pub name: String,
    pub attribute_type: AttributeType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyType {
    Hash,
    Range,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySchemaElement {
    pub name: String,
    pub key_type: KeyType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BillingMode {
    /// On-demand capacity.
    #[default]
    PayPerRequest,
    Provisioned,
}

impl std::fmt::Display for BillingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PayPerRequest => write!(f, "PAY_PER_REQUEST"),
            Self::Provisioned => write!(f, "PROVISIONED"),
        }
    }
}

/// A create-table request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSpec {
    pub name: String,
    pub attributes: Vec<AttributeDefinition>,
    pub key_schema: Vec<KeySchemaElement>,
    pub billing_mode: BillingMode,
}

impl TableSpec {
    /// Build the fixed two-attribute table spec for `key`.
    pub fn new(name: impl Into<String>, key: &KeySchema) -> Self {
        Self {
            name: name.into(),
            attributes: vec![
                AttributeDefinition {
                    name: key.sort_key.clone(),
                    attribute_type: AttributeType::S,
                },
                AttributeDefinition {
                    name: key.partition_key.clone(),
                    attribute_type: AttributeType::S,
                },
            ],
            key_schema: vec![
                KeySchemaElement {
                    name: key.partition_key.clone(),
                    key_type: KeyType::Hash,
                },
                KeySchemaElement {
                    name: key.sort_key.clone(),
                    key_type: KeyType::Range,
                },
            ],
            billing_mode: BillingMode::PayPerRequest,
        }
    }

    /// Derive a table spec from one sample record.
    pub fn from_sample(name: impl Into<String>, sample: &Record) -> Self {
        Self::new(name, &KeySchema::from_sample(sample))
    }

    /// Recover the primary key described by this spec.
    ///
    /// Returns `None` if the spec lacks a HASH or RANGE element.
    pub fn key(&self) -> Option<KeySchema> {
        let find = |kt: KeyType| {
            self.key_schema
                .iter()
                .find(|e| e.key_type == kt)
                .map(|e| e.name.clone())
        };
        Some(KeySchema {
            partition_key: find(KeyType::Hash)?,
            sort_key: find(KeyType::Range)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TableStatus {
    Creating,
    Active,
    Deleting,
}

impl std::fmt::Display for TableStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Creating => write!(f, "CREATING"),
            Self::Active => write!(f, "ACTIVE"),
            Self::Deleting => write!(f, "DELETING"),
        }
    }
}

/// What a store reports back after creating or deleting a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDescription {
    pub spec: TableSpec,
    pub status: TableStatus,
    pub item_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::KvPairs;

    #[test]
    fn geo_sample_uses_partition_id_sort_key() {
        let rec = Record::new("AUS", "G02", Some("STE".into()), KvPairs::new());
        let spec = TableSpec::from_sample("census", &rec);
        assert_eq!(spec.billing_mode, BillingMode::PayPerRequest);
        assert_eq!(spec.attributes.len(), 2);
        assert!(spec.attributes.iter().all(|a| a.attribute_type == AttributeType::S));
        assert_eq!(spec.key_schema[0].name, "RegionID");
        assert_eq!(spec.key_schema[0].key_type, KeyType::Hash);
        assert_eq!(spec.key_schema[1].name, "PartitionID");
        assert_eq!(spec.key_schema[1].key_type, KeyType::Range);
    }

    #[test]
    fn single_sample_uses_table_id_sort_key() {
        let rec = Record::new("AUS", "G02", None, KvPairs::new());
        let spec = TableSpec::from_sample("census", &rec);
        let key = spec.key().unwrap();
        assert_eq!(key.partition_key, "RegionID");
        assert_eq!(key.sort_key, "TableID");
    }

    #[test]
    fn billing_mode_display() {
        assert_eq!(BillingMode::PayPerRequest.to_string(), "PAY_PER_REQUEST");
    }
}
