//! Key extraction, validation and range bounds for the in-memory backend.

use serde_json::Value;

use crate::condition::SortCondition;
use crate::encoding::{KeyValue, composite, string};
use crate::error::{EncodingError, StoreError, ValidationError};
use crate::types::{
    IndexDefinition, KeyDefinition, KeyType, MAX_PARTITION_KEY_SIZE, MAX_RECORD_SIZE,
    MAX_SORT_KEY_SIZE, Record, TableSchema,
};

/// Convert a JSON value to a [`KeyValue`] of the expected type.
pub fn json_to_key_value(
    val: &Value,
    key_type: KeyType,
    attr_name: &str,
) -> Result<KeyValue, ValidationError> {
    let mismatch = || ValidationError::KeyTypeMismatch {
        name: attr_name.to_string(),
        expected: key_type,
    };
    match key_type {
        KeyType::String => Ok(KeyValue::String(val.as_str().ok_or_else(mismatch)?.to_string())),
        KeyType::Number => Ok(KeyValue::Number(val.as_f64().ok_or_else(mismatch)?)),
    }
}

/// Extract a key value from a record by attribute name.
pub fn extract_key(record: &Record, key_def: &KeyDefinition) -> Result<KeyValue, ValidationError> {
    let val = record
        .get(&key_def.name)
        .ok_or_else(|| ValidationError::MissingKeyAttribute(key_def.name.clone()))?;
    json_to_key_value(val, key_def.key_type, &key_def.name)
}

/// Serialized size of a record in bytes, as counted against page budgets.
pub fn record_size(record: &Record) -> usize {
    serde_json::to_vec(record).map(|b| b.len()).unwrap_or(0)
}

/// Reject records larger than [`MAX_RECORD_SIZE`].
pub fn validate_record_size(record: &Record) -> Result<(), EncodingError> {
    let actual = record_size(record);
    if actual > MAX_RECORD_SIZE {
        return Err(EncodingError::RecordTooLarge {
            max: MAX_RECORD_SIZE,
            actual,
        });
    }
    Ok(())
}

fn key_value_byte_size(kv: &KeyValue) -> usize {
    match kv {
        KeyValue::String(s) => s.len(),
        KeyValue::Number(_) => 8,
    }
}

fn validate_key_size(kv: &KeyValue, max: usize) -> Result<(), EncodingError> {
    let actual = key_value_byte_size(kv);
    if actual > max {
        return Err(EncodingError::KeyTooLarge { max, actual });
    }
    Ok(())
}

/// Encode the primary key of a record (or key map) into its storage key.
pub fn primary_key_bytes(schema: &TableSchema, record: &Record) -> Result<Vec<u8>, StoreError> {
    let pk = extract_key(record, &schema.partition_key)?;
    validate_key_size(&pk, MAX_PARTITION_KEY_SIZE)?;
    let sk = match &schema.sort_key {
        Some(def) => {
            let sk = extract_key(record, def)?;
            validate_key_size(&sk, MAX_SORT_KEY_SIZE)?;
            Some(sk)
        }
        None => None,
    };
    Ok(composite::encode_composite(&pk, sk.as_ref())?)
}

/// Build the ordered key of a secondary index entry.
///
/// The entry key is the index key followed by the primary key bytes, so
/// entries sharing an index key stay unique and sort in primary key order.
/// Returns `Ok(None)` when the record lacks an index key attribute or holds
/// it with the wrong type; such records are left out of the index.
pub fn index_entry_key(
    index: &IndexDefinition,
    schema: &TableSchema,
    record: &Record,
) -> Result<Option<Vec<u8>>, StoreError> {
    let Ok(ipk) = extract_key(record, &index.partition_key) else {
        return Ok(None);
    };
    let isk = match &index.sort_key {
        Some(def) => match extract_key(record, def) {
            Ok(kv) => Some(kv),
            Err(_) => return Ok(None),
        },
        None => None,
    };
    let mut key = composite::encode_composite(&ipk, isk.as_ref())?;
    key.extend(primary_key_bytes(schema, record)?);
    Ok(Some(key))
}

/// The attributes a continuation token must carry for a table or index.
///
/// Index tokens carry the index key attributes as well as the primary key,
/// the same shape DynamoDB returns as `LastEvaluatedKey`.
pub fn token_key(schema: &TableSchema, index: Option<&IndexDefinition>, record: &Record) -> Record {
    let mut key = schema.key_of(record);
    if let Some(index) = index {
        let names =
            std::iter::once(&index.partition_key).chain(index.sort_key.as_ref());
        for def in names {
            if let Some(v) = record.get(&def.name) {
                key.insert(def.name.clone(), v.clone());
            }
        }
    }
    key
}

/// Reject key maps that cannot address a record.
pub fn validate_key_shape(key: &Record) -> Result<(), ValidationError> {
    if key.is_empty() {
        return Err(ValidationError::MalformedKey("key has no attributes".to_string()));
    }
    for (name, value) in key {
        if !value.is_string() && !value.is_number() {
            return Err(ValidationError::MalformedKey(format!(
                "key attribute '{name}' must be a string or number"
            )));
        }
    }
    Ok(())
}

/// Increment a byte string lexicographically.
///
/// Finds the rightmost byte < 0xFF, increments it, and truncates everything
/// after it. Returns `None` if all bytes are 0xFF.
pub fn increment_bytes(bytes: &[u8]) -> Option<Vec<u8>> {
    let mut result = bytes.to_vec();
    for i in (0..result.len()).rev() {
        if result[i] < 0xFF {
            result[i] += 1;
            result.truncate(i + 1);
            return Some(result);
        }
    }
    None
}

/// Inclusive start and exclusive end of a key range scan.
pub type ScanBounds = (Vec<u8>, Option<Vec<u8>>);

/// Compute the byte range covering a partition and optional sort condition.
///
/// Entry keys may carry trailing components after the sort key (index
/// entries append the primary key), so inclusive upper bounds append `0xFF`,
/// which sorts after every type tag.
pub fn compute_scan_bounds(
    partition: &KeyValue,
    sort: Option<(&SortCondition, KeyType, &str)>,
) -> Result<ScanBounds, StoreError> {
    let prefix = composite::encode_partition_prefix(partition)?;
    let part_end = increment_bytes(&prefix);

    let Some((cond, sk_type, sk_name)) = sort else {
        return Ok((prefix, part_end));
    };

    let encode = |v: &Value| -> Result<Vec<u8>, StoreError> {
        let sk = json_to_key_value(v, sk_type, sk_name)?;
        Ok(composite::encode_composite(partition, Some(&sk))?)
    };
    let inclusive_end = |v: &Value| -> Result<Vec<u8>, StoreError> {
        let mut end = encode(v)?;
        end.push(0xFF);
        Ok(end)
    };

    match cond {
        SortCondition::Eq(v) => Ok((encode(v)?, Some(inclusive_end(v)?))),
        SortCondition::Lt(v) => Ok((prefix, Some(encode(v)?))),
        SortCondition::Le(v) => Ok((prefix, Some(inclusive_end(v)?))),
        SortCondition::Gt(v) => Ok((inclusive_end(v)?, part_end)),
        SortCondition::Ge(v) => Ok((encode(v)?, part_end)),
        SortCondition::Between(lo, hi) => Ok((encode(lo)?, Some(inclusive_end(hi)?))),
        SortCondition::BeginsWith(p) => {
            if sk_type != KeyType::String {
                return Err(ValidationError::KeyTypeMismatch {
                    name: sk_name.to_string(),
                    expected: KeyType::String,
                }
                .into());
            }
            // The escaped prefix without its terminator bounds every string
            // that starts with it.
            let mut start = prefix;
            start.push(composite::TAG_STRING);
            let escaped = string::encode_string(p);
            start.extend_from_slice(&escaped[..escaped.len() - 2]);
            let end = increment_bytes(&start).or(part_end);
            Ok((start, end))
        }
    }
}
