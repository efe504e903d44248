//! The paged query engine.
//!
//! One engine call may span many store calls. Pages are fetched strictly in
//! sequence and accumulated until one of three things happens: the requested
//! item count is reached, the store runs out of records, or the accumulated
//! byte size reaches the response ceiling. The page that crosses a ceiling is
//! kept whole.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::accessor::TableAccessor;
use crate::condition::KeyCondition;
use crate::config::EngineConfig;
use crate::error::{ConfigError, Result, StoreError, ValidationError};
use crate::filter::FilterExpr;
use crate::store::StorePage;
use crate::token::ContinuationToken;
use crate::types::Record;

/// A fully resolved key-condition query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryDescriptor {
    pub table: String,
    pub key_condition: KeyCondition,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<FilterExpr>,
    /// `None` applies the configured default.
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub start_token: Option<ContinuationToken>,
}

impl QueryDescriptor {
    pub fn new(table: impl Into<String>, key_condition: KeyCondition) -> Self {
        Self {
            table: table.into(),
            key_condition,
            index_name: None,
            filter: None,
            limit: None,
            start_token: None,
        }
    }

    pub fn index(mut self, name: impl Into<String>) -> Self {
        self.index_name = Some(name.into());
        self
    }

    pub fn filter(mut self, filter: FilterExpr) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn start_token(mut self, token: Option<ContinuationToken>) -> Self {
        self.start_token = token;
        self
    }
}

/// A full-table scan. Administrative listings only.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ScanRequest {
    pub table: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<FilterExpr>,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub start_token: Option<ContinuationToken>,
}

impl ScanRequest {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Self::default()
        }
    }
}

/// Items of one engine call plus the token to resume after them.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PageResult {
    pub items: Vec<Record>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_token: Option<ContinuationToken>,
}

/// Progress of one engine call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PagingState {
    Running,
    Done,
    Failed,
}

/// Running totals for one engine call.
#[derive(Debug)]
struct Accumulator {
    items: Vec<Record>,
    bytes: usize,
    pages: usize,
    token: Option<ContinuationToken>,
    limit: usize,
    ceiling: usize,
    state: PagingState,
}

impl Accumulator {
    fn new(limit: usize, ceiling: usize, start_token: Option<ContinuationToken>) -> Self {
        Self {
            items: Vec::new(),
            bytes: 0,
            pages: 0,
            token: start_token,
            limit,
            ceiling,
            state: PagingState::Running,
        }
    }

    /// Limit for the next store call.
    fn page_limit(&self, store_max: usize) -> usize {
        store_max.min(self.limit - self.items.len())
    }

    /// Fold one store page in and decide whether to continue.
    fn absorb(&mut self, page: StorePage, requested: usize) -> std::result::Result<(), StoreError> {
        if page.items.len() > requested {
            self.state = PagingState::Failed;
            return Err(StoreError::Fault(format!(
                "store returned {} items for a limit of {requested}",
                page.items.len()
            )));
        }
        if page.items.is_empty() && page.next_token.is_some() && page.next_token == self.token {
            self.state = PagingState::Failed;
            return Err(StoreError::Fault(
                "store returned an empty page with an unchanged continuation token".to_string(),
            ));
        }

        self.pages += 1;
        self.bytes += page.byte_size;
        self.items.extend(page.items);
        self.token = page.next_token;

        if self.items.len() >= self.limit || self.token.is_none() || self.bytes >= self.ceiling {
            self.state = PagingState::Done;
        }
        Ok(())
    }

    fn fail(&mut self) {
        self.state = PagingState::Failed;
    }

    fn finish(self) -> PageResult {
        PageResult {
            items: self.items,
            next_token: self.token,
        }
    }
}

/// Drives store calls for queries, scans and batch fetches.
#[derive(Debug, Clone, Default)]
pub struct QueryEngine {
    config: EngineConfig,
}

impl QueryEngine {
    /// An engine over `config`, rejecting limits it could never serve.
    pub fn new(config: EngineConfig) -> std::result::Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run a key-condition query to one bounded result page.
    pub fn query(&self, accessor: &TableAccessor, descriptor: &QueryDescriptor) -> Result<PageResult> {
        check_table(accessor, &descriptor.table)?;
        let limit = self.config.resolve_limit(descriptor.limit)?;
        let result = self.drive(limit, descriptor.start_token.clone(), |page_limit, token| {
            accessor.query_page(
                &descriptor.key_condition,
                descriptor.index_name.as_deref(),
                descriptor.filter.as_ref(),
                page_limit,
                token,
            )
        })?;
        debug!(
            table = accessor.table(),
            index = descriptor.index_name.as_deref(),
            items = result.items.len(),
            more = result.next_token.is_some(),
            "query complete"
        );
        Ok(result)
    }

    /// Scan a whole table to one bounded result page.
    pub fn scan(&self, accessor: &TableAccessor, request: &ScanRequest) -> Result<PageResult> {
        check_table(accessor, &request.table)?;
        let limit = self.config.resolve_limit(request.limit)?;
        let result = self.drive(limit, request.start_token.clone(), |page_limit, token| {
            accessor.scan_page(request.filter.as_ref(), page_limit, token)
        })?;
        debug!(
            table = accessor.table(),
            items = result.items.len(),
            more = result.next_token.is_some(),
            "scan complete"
        );
        Ok(result)
    }

    fn drive(
        &self,
        limit: usize,
        start_token: Option<ContinuationToken>,
        mut fetch: impl FnMut(usize, Option<&ContinuationToken>) -> Result<StorePage>,
    ) -> Result<PageResult> {
        let mut acc = Accumulator::new(limit, self.config.max_response_bytes, start_token);
        while acc.state == PagingState::Running {
            let page_limit = acc.page_limit(self.config.store_max_page_size);
            let page = match fetch(page_limit, acc.token.as_ref()) {
                Ok(page) => page,
                Err(err) => {
                    acc.fail();
                    debug!(pages = acc.pages, items = acc.items.len(), "discarding partial result");
                    return Err(err);
                }
            };
            acc.absorb(page, page_limit)?;
        }
        debug!(pages = acc.pages, bytes = acc.bytes, "paging finished");
        Ok(acc.finish())
    }
}

fn check_table(accessor: &TableAccessor, requested: &str) -> std::result::Result<(), ValidationError> {
    if requested != accessor.table() {
        return Err(ValidationError::TableMismatch {
            requested: requested.to_string(),
            accessor: accessor.table().to_string(),
        });
    }
    Ok(())
}
