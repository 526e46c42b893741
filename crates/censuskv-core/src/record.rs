//! Record model: the normalized document produced for every CSV data row.
//!
//! A [`Record`] carries the region identifier (first CSV column), the
//! table/partition identifier taken from the source file name, an optional
//! geographic level, and the numeric fields of the row. A [`DeleteRecord`]
//! is the key-only projection used by the delete path.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::str::FromStr;

use crate::error::InputError;
use crate::item::{AttributeValue, Item};
use crate::table::KeySchema;

/// Field name → numeric value, in CSV header order.
pub type KvPairs = IndexMap<String, f64>;

/// Attribute name under which the geographic level is stored.
pub const GEO_LEVEL_ATTRIBUTE: &str = "GeoLevel";

/// Attribute name under which the numeric fields are stored.
pub const KV_PAIRS_ATTRIBUTE: &str = "KVPairs";

/// Which record shape a source table produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecordVariant {
    /// Single-identifier tables: RegionID, PartitionID, KVPairs.
    Single,
    /// Geographically stratified tables: adds GeoLevel.
    #[default]
    GeoStratified,
}

impl RecordVariant {
    /// The variant a record was built with.
    pub fn of(record: &Record) -> Self {
        if record.geo_level.is_some() {
            Self::GeoStratified
        } else {
            Self::Single
        }
    }

    /// Name of the sort-key attribute tables of this variant use.
    pub fn sort_key_attribute(self) -> &'static str {
        match self {
            Self::Single => "TableID",
            Self::GeoStratified => "PartitionID",
        }
    }
}

impl std::fmt::Display for RecordVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Single => write!(f, "single"),
            Self::GeoStratified => write!(f, "geo"),
        }
    }
}

impl FromStr for RecordVariant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "single" => Ok(Self::Single),
            "geo" | "geo-stratified" => Ok(Self::GeoStratified),
            other => Err(format!("unknown record variant '{other}' (expected single|geo)")),
        }
    }
}

/// A normalized region record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    #[serde(rename = "RegionID")]
    pub region_id: String,
    /// Files written by single-identifier pipelines call this `TableID`.
    #[serde(rename = "PartitionID", alias = "TableID")]
    pub partition_id: String,
    #[serde(rename = "GeoLevel", default, skip_serializing_if = "Option::is_none")]
    pub geo_level: Option<String>,
    #[serde(rename = "KVPairs")]
    pub kv_pairs: KvPairs,
}

impl Record {
    pub fn new(
        region_id: impl Into<String>,
        partition_id: impl Into<String>,
        geo_level: Option<String>,
        kv_pairs: KvPairs,
    ) -> Self {
        Self {
            region_id: region_id.into(),
            partition_id: partition_id.into(),
            geo_level,
            kv_pairs,
        }
    }

    /// Marshal the record into a store item keyed by `schema`.
    pub fn to_item(&self, schema: &KeySchema) -> Result<Item, InputError> {
        let mut item = key_item(schema, &self.region_id, &self.partition_id)?;
        if let Some(geo) = &self.geo_level {
            item.insert(GEO_LEVEL_ATTRIBUTE.into(), AttributeValue::S(geo.clone()));
        }
        let pairs = self
            .kv_pairs
            .iter()
            .map(|(k, v)| (k.clone(), AttributeValue::N(*v)))
            .collect();
        item.insert(KV_PAIRS_ATTRIBUTE.into(), AttributeValue::M(pairs));
        Ok(item)
    }
}

/// Key-only projection of a [`Record`], used for deletes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteRecord {
    #[serde(rename = "RegionID")]
    pub region_id: String,
    #[serde(rename = "PartitionID")]
    pub partition_id: String,
}

impl DeleteRecord {
    /// Marshal into a primary key for `schema`.
    pub fn to_key(&self, schema: &KeySchema) -> Result<Item, InputError> {
        key_item(schema, &self.region_id, &self.partition_id)
    }
}

impl From<&Record> for DeleteRecord {
    fn from(r: &Record) -> Self {
        Self {
            region_id: r.region_id.clone(),
            partition_id: r.partition_id.clone(),
        }
    }
}

fn key_item(schema: &KeySchema, region_id: &str, partition_id: &str) -> Result<Item, InputError> {
    if region_id.is_empty() {
        return Err(InputError::MissingKey {
            attribute: schema.partition_key.clone(),
        });
    }
    if partition_id.is_empty() {
        return Err(InputError::MissingKey {
            attribute: schema.sort_key.clone(),
        });
    }
    let mut item = Item::new();
    item.insert(
        schema.partition_key.clone(),
        AttributeValue::S(region_id.to_string()),
    );
    item.insert(
        schema.sort_key.clone(),
        AttributeValue::S(partition_id.to_string()),
    );
    Ok(item)
}

/// Build a record and serialize it to JSON bytes.
///
/// Fails only if the field map cannot be serialized.
pub fn build_record(
    region_id: &str,
    partition_id: &str,
    geo_level: Option<&str>,
    kv_pairs: KvPairs,
) -> Result<Vec<u8>, InputError> {
    let record = Record::new(region_id, partition_id, geo_level.map(str::to_string), kv_pairs);
    Ok(serde_json::to_vec(&record)?)
}

/// Project records onto their primary-key fields, preserving order.
pub fn to_delete_projection(records: &[Record]) -> Vec<DeleteRecord> {
    records.iter().map(DeleteRecord::from).collect()
}

/// Read a JSON array of records (as written by the transformer).
pub fn read_records<R: Read>(reader: R) -> Result<Vec<Record>, InputError> {
    Ok(serde_json::from_reader(reader)?)
}

/// Open and parse a JSON record file.
pub fn load_records(path: impl AsRef<Path>) -> Result<Vec<Record>, InputError> {
    let file = File::open(path.as_ref())?;
    read_records(BufReader::new(file))
}
