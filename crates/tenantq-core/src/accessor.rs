//! Per-table access to the store.

use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::condition::KeyCondition;
use crate::error::{Error, Result, StoreError};
use crate::filter::FilterExpr;
use crate::store::keys::validate_key_shape;
use crate::store::{BatchGetPage, QueryInput, ScanInput, Store, StorePage};
use crate::token::ContinuationToken;
use crate::types::{Record, TableSchema};
use crate::update::{UpdateAction, validate_changes};

/// Primitive store operations bound to one physical table.
///
/// Store failures are logged with operation, table and key context and then
/// returned unchanged. Nothing here retries.
#[derive(Clone)]
pub struct TableAccessor {
    store: Arc<dyn Store>,
    table: String,
}

impl std::fmt::Debug for TableAccessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableAccessor")
            .field("table", &self.table)
            .finish_non_exhaustive()
    }
}

impl TableAccessor {
    pub fn new(store: Arc<dyn Store>, table: impl Into<String>) -> Self {
        Self {
            store,
            table: table.into(),
        }
    }

    /// Physical name of the wrapped table.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Key schema of the wrapped table, as the store reports it.
    pub fn schema(&self) -> Result<TableSchema> {
        self.store
            .describe_table(&self.table)
            .map_err(|e| self.report("describe_table", "", e))
    }

    pub fn get(&self, key: &Record) -> Result<Option<Record>> {
        validate_key_shape(key)?;
        let item = self
            .store
            .get_item(&self.table, key)
            .map_err(|e| self.report("get_item", &render(key), e))?;
        if item.is_none() {
            warn!(table = %self.table, key = %render(key), "item not found");
        }
        Ok(item)
    }

    pub fn put(&self, item: Record) -> Result<()> {
        let context = render(&item);
        self.store
            .put_item(&self.table, item)
            .map_err(|e| self.report("put_item", &context, e))
    }

    /// Apply `changes` to the record at `key` and return the updated record.
    pub fn update(&self, key: &Record, changes: &[UpdateAction]) -> Result<Record> {
        validate_key_shape(key)?;
        validate_changes(key, changes)?;
        self.store
            .update_item(&self.table, key, changes)
            .map_err(|e| self.report("update_item", &render(key), e))
    }

    pub fn delete(&self, key: &Record) -> Result<()> {
        validate_key_shape(key)?;
        self.store
            .delete_item(&self.table, key)
            .map_err(|e| self.report("delete_item", &render(key), e))
    }

    /// One batch-get call; unprocessed keys are returned, not retried.
    pub fn batch_get_page(&self, keys: &[Record]) -> Result<BatchGetPage> {
        let page = self
            .store
            .batch_get_item(&self.table, keys)
            .map_err(|e| self.report("batch_get_item", &format!("{} keys", keys.len()), e))?;
        debug!(
            table = %self.table,
            requested = keys.len(),
            found = page.items.len(),
            unprocessed = page.unprocessed_keys.len(),
            "batch get page"
        );
        Ok(page)
    }

    /// One key-condition query call.
    pub fn query_page(
        &self,
        key_condition: &KeyCondition,
        index_name: Option<&str>,
        filter: Option<&FilterExpr>,
        limit: usize,
        start_token: Option<&ContinuationToken>,
    ) -> Result<StorePage> {
        let input = QueryInput {
            table: &self.table,
            key_condition,
            index_name,
            filter,
            limit,
            start_token,
        };
        self.store.query(&input).map_err(|e| {
            let context = serde_json::to_string(key_condition).unwrap_or_default();
            self.report("query", &context, e)
        })
    }

    /// One full-table scan call.
    pub fn scan_page(
        &self,
        filter: Option<&FilterExpr>,
        limit: usize,
        start_token: Option<&ContinuationToken>,
    ) -> Result<StorePage> {
        let input = ScanInput {
            table: &self.table,
            filter,
            limit,
            start_token,
        };
        self.store.scan(&input).map_err(|e| {
            let context = filter
                .and_then(|f| serde_json::to_string(f).ok())
                .unwrap_or_default();
            self.report("scan", &context, e)
        })
    }

    fn report(&self, operation: &'static str, key: &str, err: StoreError) -> Error {
        match &err {
            StoreError::Unavailable(message) => error!(
                operation,
                table = %self.table,
                key,
                "store throttled or unreachable: {message}"
            ),
            StoreError::Fault(message) => error!(
                operation,
                table = %self.table,
                key,
                "store rejected request: {message}"
            ),
        }
        err.into()
    }
}

fn render(record: &Record) -> String {
    serde_json::to_string(record).unwrap_or_default()
}
