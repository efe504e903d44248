//! In-process store backend.
//!
//! Tables are ordered maps keyed by the order-preserving key encoding, with
//! one extra map per secondary index pointing back at primary keys. Paging
//! follows DynamoDB: a call evaluates at most `limit` records and at most
//! `max_page_bytes` of data, applies the filter to what it evaluated, and
//! hands back the key of the last evaluated record when more remain.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::ops::Bound;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::keys::{
    compute_scan_bounds, index_entry_key, json_to_key_value, primary_key_bytes, record_size,
    token_key, validate_record_size,
};
use super::{BatchGetPage, QueryInput, ScanInput, Store, StorePage};
use crate::error::StoreError;
use crate::filter::FilterExpr;
use crate::token::ContinuationToken;
use crate::types::{IndexDefinition, Record, TableSchema};
use crate::update::{UpdateAction, apply_updates, validate_changes};

/// Maximum number of keys a single batch-get call accepts.
pub const MAX_BATCH_GET_KEYS: usize = 100;

/// Per-call limits enforced by the memory backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreLimits {
    /// Most records one query or scan call evaluates.
    pub max_page_items: usize,
    /// Evaluated bytes after which a query or scan call stops.
    pub max_page_bytes: usize,
    /// Keys one batch-get call resolves; the rest come back unprocessed.
    pub batch_get_capacity: usize,
}

impl Default for StoreLimits {
    fn default() -> Self {
        Self {
            max_page_items: 1000,
            max_page_bytes: 1024 * 1024,
            batch_get_capacity: MAX_BATCH_GET_KEYS,
        }
    }
}

struct MemTable {
    schema: TableSchema,
    rows: BTreeMap<Vec<u8>, Record>,
    /// Index name to (entry key -> primary key bytes).
    indexes: HashMap<String, BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemTable {
    fn new(schema: TableSchema) -> Self {
        let indexes = schema
            .indexes
            .iter()
            .map(|idx| (idx.name.clone(), BTreeMap::new()))
            .collect();
        Self {
            schema,
            rows: BTreeMap::new(),
            indexes,
        }
    }

    fn insert(&mut self, record: Record) -> Result<(), StoreError> {
        validate_record_size(&record)?;
        let key = primary_key_bytes(&self.schema, &record)?;

        let mut entries = Vec::with_capacity(self.schema.indexes.len());
        for index in &self.schema.indexes {
            entries.push((
                index.name.clone(),
                index_entry_key(index, &self.schema, &record)?,
            ));
        }

        if let Some(old) = self.rows.remove(&key) {
            self.unindex(&old);
        }
        for (name, entry) in entries {
            if let (Some(entry), Some(map)) = (entry, self.indexes.get_mut(&name)) {
                map.insert(entry, key.clone());
            }
        }
        self.rows.insert(key, record);
        Ok(())
    }

    fn remove(&mut self, key: &[u8]) -> Option<Record> {
        let old = self.rows.remove(key)?;
        self.unindex(&old);
        Some(old)
    }

    fn unindex(&mut self, old: &Record) {
        for index in &self.schema.indexes {
            if let Ok(Some(entry)) = index_entry_key(index, &self.schema, old)
                && let Some(map) = self.indexes.get_mut(&index.name)
            {
                map.remove(&entry);
            }
        }
    }

    /// Resolve the bounds of a query against the base table or an index.
    fn query_bounds(
        &self,
        input: &QueryInput<'_>,
        index: Option<&IndexDefinition>,
    ) -> Result<(Bound<Vec<u8>>, Bound<Vec<u8>>), StoreError> {
        let (pk_def, sk_def) = match index {
            Some(idx) => (&idx.partition_key, idx.sort_key.as_ref()),
            None => (&self.schema.partition_key, self.schema.sort_key.as_ref()),
        };
        let cond = input.key_condition;
        if cond.partition_attribute != pk_def.name {
            return Err(StoreError::Fault(format!(
                "key condition partition attribute '{}' does not match key '{}'",
                cond.partition_attribute, pk_def.name
            )));
        }
        let sort = match (&cond.sort, sk_def) {
            (None, _) => None,
            (Some(sort), Some(def)) if sort.attribute == def.name => {
                Some((&sort.condition, def.key_type, def.name.as_str()))
            }
            (Some(sort), _) => {
                return Err(StoreError::Fault(format!(
                    "key condition sort attribute '{}' is not the sort key",
                    sort.attribute
                )));
            }
        };
        let partition = json_to_key_value(&cond.partition_value, pk_def.key_type, &pk_def.name)?;
        let (start, end) = compute_scan_bounds(&partition, sort)?;

        let resume = match input.start_token {
            Some(token) => Some(self.resume_key(token, index)?),
            None => None,
        };
        Ok(range_from(start, end, resume))
    }

    fn resume_key(
        &self,
        token: &ContinuationToken,
        index: Option<&IndexDefinition>,
    ) -> Result<Vec<u8>, StoreError> {
        match index {
            None => primary_key_bytes(&self.schema, token.key()),
            Some(idx) => index_entry_key(idx, &self.schema, token.key())?.ok_or_else(|| {
                StoreError::Fault(format!(
                    "start token lacks key attributes of index '{}'",
                    idx.name
                ))
            }),
        }
    }
}

/// Combine scan bounds with an exclusive resume point.
fn range_from(
    start: Vec<u8>,
    end: Option<Vec<u8>>,
    resume: Option<Vec<u8>>,
) -> (Bound<Vec<u8>>, Bound<Vec<u8>>) {
    let lower = match resume {
        Some(after) if after >= start => Bound::Excluded(after),
        _ => Bound::Included(start),
    };
    let upper = end.map_or(Bound::Unbounded, Bound::Excluded);
    (lower, upper)
}

/// `BTreeMap::range` panics on inverted bounds; those ranges are empty.
fn is_empty_range(lower: &Bound<Vec<u8>>, upper: &Bound<Vec<u8>>) -> bool {
    match (lower, upper) {
        (Bound::Included(lo), Bound::Excluded(hi)) => lo >= hi,
        (Bound::Excluded(lo), Bound::Excluded(hi)) => lo >= hi,
        _ => false,
    }
}

/// Read one page from an ordered run of records.
fn collect_page<'r>(
    records: impl Iterator<Item = &'r Record>,
    schema: &TableSchema,
    index: Option<&IndexDefinition>,
    filter: Option<&FilterExpr>,
    limit: usize,
    max_bytes: usize,
) -> Result<StorePage, StoreError> {
    let mut records = records.peekable();
    let mut page = StorePage::default();
    let mut evaluated = 0usize;
    let mut evaluated_bytes = 0usize;
    let mut last = None;

    while evaluated < limit && evaluated_bytes < max_bytes {
        let Some(record) = records.next() else {
            break;
        };
        let size = record_size(record);
        evaluated += 1;
        evaluated_bytes += size;
        last = Some(record);

        let keep = match filter {
            Some(expr) => expr.eval(record)?,
            None => true,
        };
        if keep {
            page.byte_size += size;
            page.items.push(record.clone());
        }
    }

    if records.peek().is_some() {
        page.next_token =
            last.map(|record| ContinuationToken::from_key(token_key(schema, index, record)));
    }
    Ok(page)
}

struct MemoryInner {
    tables: RwLock<HashMap<String, MemTable>>,
    limits: StoreLimits,
    calls: AtomicU64,
    /// Call number (1-based) to the error that call returns.
    faults: Mutex<BTreeMap<u64, StoreError>>,
}

/// An in-process [`Store`].
///
/// `MemoryStore` is cheaply clonable (`Arc`-based) and `Send + Sync`. Reads
/// run concurrently; writes are serialized by a single lock.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<MemoryInner>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_limits(StoreLimits::default())
    }

    pub fn with_limits(limits: StoreLimits) -> Self {
        Self {
            inner: Arc::new(MemoryInner {
                tables: RwLock::new(HashMap::new()),
                limits,
                calls: AtomicU64::new(0),
                faults: Mutex::new(BTreeMap::new()),
            }),
        }
    }

    pub fn limits(&self) -> StoreLimits {
        self.inner.limits
    }

    /// Create a table. Fails if a table with the same name exists.
    pub fn create_table(&self, schema: TableSchema) -> Result<(), StoreError> {
        let mut tables = self.inner.tables.write();
        if tables.contains_key(&schema.name) {
            return Err(StoreError::Fault(format!(
                "table '{}' already exists",
                schema.name
            )));
        }
        debug!(table = %schema.name, indexes = schema.indexes.len(), "table created");
        tables.insert(schema.name.clone(), MemTable::new(schema));
        Ok(())
    }

    /// Sorted names of all tables.
    pub fn list_tables(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.tables.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn item_count(&self, table: &str) -> usize {
        self.inner
            .tables
            .read()
            .get(table)
            .map_or(0, |t| t.rows.len())
    }

    /// Number of store calls served so far, including failed ones.
    pub fn calls(&self) -> u64 {
        self.inner.calls.load(Ordering::SeqCst)
    }

    /// Make the call after `successes` further calls fail with `err`.
    pub fn fail_after(&self, successes: u64, err: StoreError) {
        let at = self.calls() + successes + 1;
        self.inner.faults.lock().insert(at, err);
    }

    /// Make the next call fail with `err`.
    pub fn fail_next(&self, err: StoreError) {
        self.fail_after(0, err);
    }

    fn begin_call(&self, operation: &str, table: &str) -> Result<(), StoreError> {
        let call = self.inner.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(err) = self.inner.faults.lock().remove(&call) {
            debug!(operation, table, call, error = %err, "injected store failure");
            return Err(err);
        }
        Ok(())
    }

    fn read_table<T>(
        &self,
        table: &str,
        f: impl FnOnce(&MemTable) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let tables = self.inner.tables.read();
        f(tables.get(table).ok_or_else(|| unknown_table(table))?)
    }

    fn write_table<T>(
        &self,
        table: &str,
        f: impl FnOnce(&mut MemTable) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut tables = self.inner.tables.write();
        f(tables.get_mut(table).ok_or_else(|| unknown_table(table))?)
    }
}

fn unknown_table(table: &str) -> StoreError {
    StoreError::Fault(format!("table not found: {table}"))
}

fn check_limit(limit: usize) -> Result<(), StoreError> {
    if limit == 0 {
        return Err(StoreError::Fault("limit must be at least 1".to_string()));
    }
    Ok(())
}

impl Store for MemoryStore {
    /// Metadata lookup; not counted as a call and never fault-injected.
    fn describe_table(&self, table: &str) -> Result<TableSchema, StoreError> {
        self.read_table(table, |t| Ok(t.schema.clone()))
    }

    fn get_item(&self, table: &str, key: &Record) -> Result<Option<Record>, StoreError> {
        self.begin_call("get_item", table)?;
        self.read_table(table, |t| {
            let key = primary_key_bytes(&t.schema, key)?;
            Ok(t.rows.get(&key).cloned())
        })
    }

    fn put_item(&self, table: &str, item: Record) -> Result<(), StoreError> {
        self.begin_call("put_item", table)?;
        self.write_table(table, |t| t.insert(item))
    }

    fn update_item(
        &self,
        table: &str,
        key: &Record,
        changes: &[UpdateAction],
    ) -> Result<Record, StoreError> {
        self.begin_call("update_item", table)?;
        self.write_table(table, |t| {
            let key_map = t.schema.key_of(key);
            validate_changes(&key_map, changes)?;
            let key_bytes = primary_key_bytes(&t.schema, key)?;
            let mut record = t.rows.get(&key_bytes).cloned().unwrap_or(key_map);
            apply_updates(&mut record, changes)?;
            t.insert(record.clone())?;
            Ok(record)
        })
    }

    fn delete_item(&self, table: &str, key: &Record) -> Result<(), StoreError> {
        self.begin_call("delete_item", table)?;
        self.write_table(table, |t| {
            let key = primary_key_bytes(&t.schema, key)?;
            t.remove(&key);
            Ok(())
        })
    }

    fn batch_get_item(&self, table: &str, keys: &[Record]) -> Result<BatchGetPage, StoreError> {
        self.begin_call("batch_get_item", table)?;
        if keys.len() > MAX_BATCH_GET_KEYS {
            return Err(StoreError::Fault(format!(
                "batch get accepts at most {MAX_BATCH_GET_KEYS} keys (got {})",
                keys.len()
            )));
        }
        let capacity = self.inner.limits.batch_get_capacity.min(keys.len());
        self.read_table(table, |t| {
            let mut seen = HashSet::with_capacity(keys.len());
            let mut encoded = Vec::with_capacity(keys.len());
            for key in keys {
                let bytes = primary_key_bytes(&t.schema, key)?;
                if !seen.insert(bytes.clone()) {
                    return Err(StoreError::Fault(
                        "batch get contains duplicate keys".to_string(),
                    ));
                }
                encoded.push(bytes);
            }

            let items = encoded[..capacity]
                .iter()
                .filter_map(|bytes| t.rows.get(bytes).cloned())
                .collect();
            Ok(BatchGetPage {
                items,
                unprocessed_keys: keys[capacity..].to_vec(),
            })
        })
    }

    fn query(&self, input: &QueryInput<'_>) -> Result<StorePage, StoreError> {
        self.begin_call("query", input.table)?;
        check_limit(input.limit)?;
        let limits = self.inner.limits;
        let limit = input.limit.min(limits.max_page_items);

        self.read_table(input.table, |t| {
            let index = match input.index_name {
                Some(name) => Some(t.schema.index(name).ok_or_else(|| {
                    StoreError::Fault(format!("index not found: {name}"))
                })?),
                None => None,
            };
            let (lower, upper) = t.query_bounds(input, index)?;
            if is_empty_range(&lower, &upper) {
                return Ok(StorePage::default());
            }

            let page = match index {
                None => collect_page(
                    t.rows.range((lower, upper)).map(|(_, r)| r),
                    &t.schema,
                    None,
                    input.filter,
                    limit,
                    limits.max_page_bytes,
                )?,
                Some(idx) => {
                    let entries = t.indexes.get(&idx.name).ok_or_else(|| {
                        StoreError::Fault(format!("index not found: {}", idx.name))
                    })?;
                    collect_page(
                        entries
                            .range((lower, upper))
                            .filter_map(|(_, primary)| t.rows.get(primary)),
                        &t.schema,
                        Some(idx),
                        input.filter,
                        limit,
                        limits.max_page_bytes,
                    )?
                }
            };
            debug!(
                table = input.table,
                index = input.index_name,
                returned = page.items.len(),
                more = page.next_token.is_some(),
                "query page"
            );
            Ok(page)
        })
    }

    fn scan(&self, input: &ScanInput<'_>) -> Result<StorePage, StoreError> {
        self.begin_call("scan", input.table)?;
        check_limit(input.limit)?;
        let limits = self.inner.limits;
        let limit = input.limit.min(limits.max_page_items);

        self.read_table(input.table, |t| {
            let lower = match input.start_token {
                Some(token) => Bound::Excluded(primary_key_bytes(&t.schema, token.key())?),
                None => Bound::Unbounded,
            };
            let page = collect_page(
                t.rows.range((lower, Bound::Unbounded)).map(|(_, r)| r),
                &t.schema,
                None,
                input.filter,
                limit,
                limits.max_page_bytes,
            )?;
            debug!(
                table = input.table,
                returned = page.items.len(),
                more = page.next_token.is_some(),
                "scan page"
            );
            Ok(page)
        })
    }
}
