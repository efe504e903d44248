//! # tenantq
//!
//! A bounded, paginated query engine for multi-tenant data held in a
//! partitioned key-value store.
//!
//! Callers describe what they want (a group's logs, narrowed by user, type
//! or time window) and get back one page of records plus an opaque token to
//! resume from. Underneath, the engine picks the base table or a composite
//! secondary index, then drives as many store calls as it takes to fill the
//! page without exceeding the item limit or the response byte ceiling.
//!
//! ## Quick Start
//!
//! ```
//! use std::sync::Arc;
//!
//! use serde_json::json;
//! use tenantq_core::accessor::TableAccessor;
//! use tenantq_core::predicate::LogFilters;
//! use tenantq_core::query::QueryEngine;
//! use tenantq_core::store::MemoryStore;
//! use tenantq_core::tables::LogsTable;
//!
//! let store = MemoryStore::new();
//! store.create_table(LogsTable::schema("logs")).unwrap();
//!
//! let logs = LogsTable::new(
//!     TableAccessor::new(Arc::new(store), "logs"),
//!     QueryEngine::default(),
//! );
//! logs.put_log(json!({
//!     "groupid": "group1",
//!     "created_at": "2024-01-01T00:00:00Z",
//!     "userid": "user1@example.com",
//!     "type": "login"
//! }).as_object().unwrap().clone()).unwrap();
//!
//! let page = logs
//!     .list_logs(&LogFilters::group("group1").user("user1@example.com"), Some(10), None)
//!     .unwrap();
//! assert_eq!(page.items.len(), 1);
//! assert!(page.next_token.is_none());
//! ```

pub mod accessor;
pub mod batch;
pub mod condition;
pub mod config;
pub mod encoding;
pub mod error;
pub mod filter;
pub mod predicate;
pub mod query;
pub mod store;
pub mod tables;
pub mod token;
pub mod types;
pub mod update;
