//! The repositories a server instance answers requests from.

use std::sync::Arc;

use tracing::info;

use tenantq_core::accessor::TableAccessor;
use tenantq_core::config::{EngineConfig, TableNaming};
use tenantq_core::error::{Result, ValidationError};
use tenantq_core::query::QueryEngine;
use tenantq_core::store::{MemoryStore, Store};
use tenantq_core::tables::{GroupsTable, LogsTable, UsersTable};
use tenantq_core::types::Record;

/// Logs, users and groups repositories over one store.
#[derive(Debug, Clone)]
pub struct Service {
    pub logs: LogsTable,
    pub users: UsersTable,
    pub groups: GroupsTable,
}

impl Service {
    /// Create the physical tables for `naming` in `store` and wire a
    /// repository onto each.
    pub fn bootstrap(store: &MemoryStore, naming: &TableNaming, config: EngineConfig) -> Result<Self> {
        let engine = QueryEngine::new(config)?;
        let logs = naming.full_table_name(LogsTable::NAME);
        let users = naming.full_table_name(UsersTable::NAME);
        let groups = naming.full_table_name(GroupsTable::NAME);

        store.create_table(LogsTable::schema(&logs))?;
        store.create_table(UsersTable::schema(&users))?;
        store.create_table(GroupsTable::schema(&groups))?;
        info!(%logs, %users, %groups, "tables created");

        let shared: Arc<dyn Store> = Arc::new(store.clone());
        Ok(Self {
            logs: LogsTable::new(TableAccessor::new(shared.clone(), logs), engine.clone()),
            users: UsersTable::new(TableAccessor::new(shared.clone(), users), engine),
            groups: GroupsTable::new(TableAccessor::new(shared, groups)),
        })
    }

    /// Store `item` in the logical table `table`.
    pub fn put_item(&self, table: &str, item: Record) -> Result<()> {
        match table {
            LogsTable::NAME => self.logs.put_log(item),
            UsersTable::NAME => self.users.create_user(item),
            GroupsTable::NAME => self.groups.put_group(item),
            other => Err(ValidationError::UnknownTable(other.to_string()).into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tenantq_core::error::Error;
    use tenantq_core::predicate::LogFilters;

    fn record(v: serde_json::Value) -> Record {
        v.as_object().unwrap().clone()
    }

    #[test]
    fn test_bootstrap_creates_physical_tables() {
        let store = MemoryStore::new();
        Service::bootstrap(&store, &TableNaming::default(), EngineConfig::default()).unwrap();
        assert_eq!(
            store.list_tables(),
            vec![
                "prototype-app-groups-devel",
                "prototype-app-logs-devel",
                "prototype-app-users-devel"
            ]
        );
        assert!(
            Service::bootstrap(&store, &TableNaming::default(), EngineConfig::default()).is_err()
        );
    }

    #[test]
    fn test_bad_config_creates_nothing() {
        let store = MemoryStore::new();
        let config = EngineConfig {
            store_max_page_size: 0,
            ..EngineConfig::default()
        };
        let err = Service::bootstrap(&store, &TableNaming::default(), config).unwrap_err();
        assert_eq!(err.kind(), "ConfigError");
        assert!(store.list_tables().is_empty());
    }

    #[test]
    fn test_put_item_routes_by_table() {
        let store = MemoryStore::new();
        let service =
            Service::bootstrap(&store, &TableNaming::new("app", "test"), EngineConfig::default())
                .unwrap();
        service
            .put_item(
                "logs",
                record(json!({"groupid": "g1", "created_at": "t1", "userid": "u1"})),
            )
            .unwrap();
        service
            .put_item("users", record(json!({"userid": "u1"})))
            .unwrap();
        service
            .put_item("groups", record(json!({"groupid": "g1"})))
            .unwrap();

        let page = service
            .logs
            .list_logs(&LogFilters::group("g1").user("u1"), None, None)
            .unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(store.item_count("app-users-test"), 1);

        let err = service.put_item("orders", Record::new()).unwrap_err();
        assert!(matches!(
            err,
            Error::Validation(ValidationError::UnknownTable(_))
        ));
    }
}
