//! Batch fetch of many records by key.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::accessor::TableAccessor;
use crate::error::{Result, StoreError};
use crate::query::QueryEngine;
use crate::store::keys::{extract_key, primary_key_bytes, validate_key_shape};
use crate::types::{Record, TableSchema};

/// Records found by a batch fetch, and the requested keys that were not.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BatchGetOutcome {
    pub items: Vec<Record>,
    pub missing: Vec<Record>,
}

/// Storage identity of a key: its encoded primary key bytes. Attributes
/// outside the key schema are ignored and numbers compare by value.
fn identity(schema: &TableSchema, record: &Record) -> Result<Vec<u8>> {
    Ok(primary_key_bytes(schema, record)?)
}

fn render(keys: &[Record]) -> String {
    keys.iter()
        .map(|key| serde_json::to_string(key).unwrap_or_default())
        .collect::<Vec<_>>()
        .join(", ")
}

impl QueryEngine {
    /// Fetch records for `keys` in fixed-size sub-batches.
    ///
    /// Each key is projected onto the table's primary key attributes first,
    /// so duplicates are fetched once and extra attributes are ignored.
    /// Unprocessed keys are resubmitted; a sub-batch that stops making
    /// progress for more than `max_batch_retries` attempts fails with
    /// `StoreUnavailable`. Keys with no record are logged and reported in
    /// [`BatchGetOutcome::missing`], not treated as errors.
    pub fn batch_get(&self, accessor: &TableAccessor, keys: &[Record]) -> Result<BatchGetOutcome> {
        for key in keys {
            validate_key_shape(key)?;
        }
        let schema = accessor.schema()?;

        let mut seen = HashSet::new();
        let mut unique = Vec::with_capacity(keys.len());
        for key in keys {
            for def in std::iter::once(&schema.partition_key).chain(schema.sort_key.as_ref()) {
                extract_key(key, def)?;
            }
            let key = schema.key_of(key);
            if seen.insert(identity(&schema, &key)?) {
                unique.push(key);
            }
        }

        let mut outcome = BatchGetOutcome::default();
        for chunk in unique.chunks(self.config().batch_size) {
            let found = self.fetch_sub_batch(accessor, chunk)?;

            let found_keys = found
                .iter()
                .map(|item| identity(&schema, item))
                .collect::<Result<HashSet<_>>>()?;
            let mut missing = Vec::new();
            for key in chunk {
                if !found_keys.contains(&identity(&schema, key)?) {
                    missing.push(key.clone());
                }
            }
            if !missing.is_empty() {
                warn!(
                    table = accessor.table(),
                    missing = missing.len(),
                    keys = %render(&missing),
                    "batch get: keys not found"
                );
            }

            outcome.items.extend(found);
            outcome.missing.extend(missing);
        }
        Ok(outcome)
    }

    fn fetch_sub_batch(&self, accessor: &TableAccessor, chunk: &[Record]) -> Result<Vec<Record>> {
        let max_retries = self.config().max_batch_retries;
        let mut found = Vec::with_capacity(chunk.len());
        let mut pending = chunk.to_vec();
        let mut stalled = 0u32;

        while !pending.is_empty() {
            let page = accessor.batch_get_page(&pending)?;
            let progressed = page.unprocessed_keys.len() < pending.len();
            found.extend(page.items);
            if !progressed {
                stalled += 1;
                if stalled > max_retries {
                    error!(
                        table = accessor.table(),
                        unprocessed = page.unprocessed_keys.len(),
                        retries = max_retries,
                        "batch get made no progress"
                    );
                    return Err(StoreError::Unavailable(format!(
                        "batch get left {} keys unprocessed after {max_retries} retries",
                        page.unprocessed_keys.len()
                    ))
                    .into());
                }
            }
            pending = page.unprocessed_keys;
        }
        Ok(found)
    }
}
