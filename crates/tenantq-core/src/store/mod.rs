//! The store seam: primitive, single-call operations on partitioned tables.
//!
//! A [`Store`] answers exactly one request per call. Paging loops, batch
//! retries and limit validation live above it, in the query engine.

pub mod keys;
pub mod memory;

use crate::condition::KeyCondition;
use crate::error::StoreError;
use crate::filter::FilterExpr;
use crate::token::ContinuationToken;
use crate::types::{Record, TableSchema};
use crate::update::UpdateAction;

pub use memory::{MemoryStore, StoreLimits};

/// One key-condition query page request.
#[derive(Debug, Clone, Copy)]
pub struct QueryInput<'a> {
    pub table: &'a str,
    pub key_condition: &'a KeyCondition,
    pub index_name: Option<&'a str>,
    pub filter: Option<&'a FilterExpr>,
    /// Maximum number of records to evaluate, before filtering.
    pub limit: usize,
    pub start_token: Option<&'a ContinuationToken>,
}

/// One full-table scan page request.
#[derive(Debug, Clone, Copy)]
pub struct ScanInput<'a> {
    pub table: &'a str,
    pub filter: Option<&'a FilterExpr>,
    /// Maximum number of records to evaluate, before filtering.
    pub limit: usize,
    pub start_token: Option<&'a ContinuationToken>,
}

/// A single page returned by the store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StorePage {
    pub items: Vec<Record>,
    /// Present when the store stopped before exhausting the key range.
    pub next_token: Option<ContinuationToken>,
    /// Serialized size of `items` in bytes.
    pub byte_size: usize,
}

/// Result of one batch-get call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchGetPage {
    pub items: Vec<Record>,
    /// Keys the store did not get to in this call. Callers resubmit them.
    pub unprocessed_keys: Vec<Record>,
}

/// Primitive operations of a partitioned key-value store.
pub trait Store: Send + Sync {
    /// Key schema and indexes of `table`.
    fn describe_table(&self, table: &str) -> Result<TableSchema, StoreError>;

    fn get_item(&self, table: &str, key: &Record) -> Result<Option<Record>, StoreError>;

    /// Insert or replace a record.
    fn put_item(&self, table: &str, item: Record) -> Result<(), StoreError>;

    /// Apply changes to the record at `key`, creating it if absent, and
    /// return the full updated record.
    fn update_item(
        &self,
        table: &str,
        key: &Record,
        changes: &[UpdateAction],
    ) -> Result<Record, StoreError>;

    /// Delete the record at `key`. Deleting a missing record is not an error.
    fn delete_item(&self, table: &str, key: &Record) -> Result<(), StoreError>;

    /// Fetch many records by key. Keys with no record are silently absent.
    fn batch_get_item(&self, table: &str, keys: &[Record]) -> Result<BatchGetPage, StoreError>;

    fn query(&self, input: &QueryInput<'_>) -> Result<StorePage, StoreError>;

    fn scan(&self, input: &ScanInput<'_>) -> Result<StorePage, StoreError>;
}
