//! Request validation shared by all backends.

use std::collections::HashSet;

use censuskv_core::error::StoreError;
use censuskv_core::item::{AttributeValue, Item};
use censuskv_core::partition::{WriteGroup, WriteRequest, MAX_BATCH_SIZE};
use censuskv_core::table::KeySchema;

/// `(partition key value, sort key value)`.
pub(crate) type PrimaryKey = (String, String);

/// Extract the primary key of `attrs` under `key`.
pub(crate) fn primary_key(attrs: &Item, key: &KeySchema) -> Result<PrimaryKey, StoreError> {
    let get = |name: &str| match attrs.get(name) {
        Some(AttributeValue::S(s)) if !s.is_empty() => Ok(s.clone()),
        Some(_) => Err(StoreError::Validation(format!(
            "One or more parameter values were invalid: key attribute {name} must be a non-empty string"
        ))),
        None => Err(StoreError::Validation(format!(
            "One or more parameter values were invalid: Missing the key {name} in the item"
        ))),
    };
    Ok((get(&key.partition_key)?, get(&key.sort_key)?))
}

/// Check a group against the batch-write rules and return each request's key.
pub(crate) fn validate_group(
    group: &WriteGroup,
    key: &KeySchema,
) -> Result<Vec<PrimaryKey>, StoreError> {
    if group.is_empty() {
        return Err(StoreError::Validation(
            "1 validation error detected: request items must contain at least one write request"
                .into(),
        ));
    }
    if group.len() > MAX_BATCH_SIZE {
        return Err(StoreError::Validation(format!(
            "Too many items requested for the BatchWriteItem call: {} > {MAX_BATCH_SIZE}",
            group.len()
        )));
    }

    let mut seen = HashSet::with_capacity(group.len());
    let mut keys = Vec::with_capacity(group.len());
    for request in &group.requests {
        let pk = primary_key(request.attributes(), key)?;
        if let WriteRequest::Delete { key: k } = request {
            if k.len() != 2 {
                return Err(StoreError::Validation(
                    "The provided key element does not match the schema".into(),
                ));
            }
        }
        if !seen.insert(pk.clone()) {
            return Err(StoreError::Validation(
                "Provided list of item keys contains duplicates".into(),
            ));
        }
        keys.push(pk);
    }
    Ok(keys)
}
