//! Repositories for the logs, users and groups tables.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::accessor::TableAccessor;
use crate::batch::BatchGetOutcome;
use crate::error::{Result, ValidationError};
use crate::filter::FilterExpr;
use crate::predicate::{
    self, CREATED_AT, GROUP_ID, GROUP_TYPE, GROUP_USER, LOG_TYPE, LogFilters, TYPE_INDEX,
    USER_ID, USER_INDEX,
};
use crate::query::{PageResult, QueryEngine, ScanRequest};
use crate::token::ContinuationToken;
use crate::types::{IndexDefinition, KeyDefinition, Record, TableSchema};
use crate::update::UpdateAction;

fn single_key(name: &str, value: &str) -> Record {
    let mut key = Record::new();
    key.insert(name.to_string(), Value::from(value));
    key
}

/// Log records partitioned by group and ordered by creation time.
#[derive(Debug, Clone)]
pub struct LogsTable {
    accessor: TableAccessor,
    engine: QueryEngine,
}

impl LogsTable {
    pub const NAME: &'static str = "logs";

    /// Schema of the logs table and its two composite indexes.
    pub fn schema(physical_name: impl Into<String>) -> TableSchema {
        TableSchema {
            name: physical_name.into(),
            partition_key: KeyDefinition::string(GROUP_ID),
            sort_key: Some(KeyDefinition::string(CREATED_AT)),
            indexes: vec![
                IndexDefinition::new(
                    USER_INDEX,
                    KeyDefinition::string(GROUP_USER),
                    Some(KeyDefinition::string(CREATED_AT)),
                ),
                IndexDefinition::new(
                    TYPE_INDEX,
                    KeyDefinition::string(GROUP_TYPE),
                    Some(KeyDefinition::string(CREATED_AT)),
                ),
            ],
        }
    }

    pub fn new(accessor: TableAccessor, engine: QueryEngine) -> Self {
        Self { accessor, engine }
    }

    /// List logs of a group, newest last, optionally narrowed by user, type
    /// and time window.
    pub fn list_logs(
        &self,
        filters: &LogFilters,
        limit: Option<usize>,
        start_token: Option<ContinuationToken>,
    ) -> Result<PageResult> {
        let descriptor =
            predicate::build_descriptor(self.accessor.table(), filters, limit, start_token);
        self.engine.query(&self.accessor, &descriptor)
    }

    /// Store a log record, deriving the composite index attributes from its
    /// `groupid`, `userid` and `type`.
    pub fn put_log(&self, mut record: Record) -> Result<()> {
        let group = record
            .get(GROUP_ID)
            .and_then(Value::as_str)
            .ok_or_else(|| ValidationError::MissingKeyAttribute(GROUP_ID.to_string()))?
            .to_string();
        for (source, target) in [(USER_ID, GROUP_USER), (LOG_TYPE, GROUP_TYPE)] {
            let derived = record
                .get(source)
                .and_then(Value::as_str)
                .filter(|v| !v.is_empty())
                .map(|v| predicate::composite_value(&group, v));
            match derived {
                Some(value) => {
                    record.insert(target.to_string(), Value::from(value));
                }
                None => {
                    record.remove(target);
                }
            }
        }
        self.accessor.put(record)
    }
}

/// Fields a partial user update may change.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UserPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl UserPatch {
    fn actions(&self) -> Vec<UpdateAction> {
        let mut actions = Vec::new();
        if let Some(username) = &self.username {
            actions.push(UpdateAction::set("username", username.as_str()));
        }
        if let Some(email) = &self.email {
            actions.push(UpdateAction::set("email", email.as_str()));
        }
        actions
    }
}

/// User profiles keyed by `userid`.
#[derive(Debug, Clone)]
pub struct UsersTable {
    accessor: TableAccessor,
    engine: QueryEngine,
}

impl UsersTable {
    pub const NAME: &'static str = "users";

    pub fn schema(physical_name: impl Into<String>) -> TableSchema {
        TableSchema {
            name: physical_name.into(),
            partition_key: KeyDefinition::string(USER_ID),
            sort_key: None,
            indexes: vec![],
        }
    }

    pub fn new(accessor: TableAccessor, engine: QueryEngine) -> Self {
        Self { accessor, engine }
    }

    pub fn get_user(&self, userid: &str) -> Result<Option<Record>> {
        info!(userid, "fetching user");
        self.accessor.get(&single_key(USER_ID, userid))
    }

    pub fn batch_get_users(&self, userids: &[String]) -> Result<BatchGetOutcome> {
        info!(count = userids.len(), "batch fetching users");
        let keys: Vec<Record> = userids.iter().map(|id| single_key(USER_ID, id)).collect();
        self.engine.batch_get(&self.accessor, &keys)
    }

    /// Page through all users with a table scan, keeping those `filter`
    /// accepts. The limit counts evaluated users, so a filtered page may come
    /// back short with a token.
    pub fn list_users(
        &self,
        filter: Option<FilterExpr>,
        limit: Option<usize>,
        start_token: Option<ContinuationToken>,
    ) -> Result<PageResult> {
        let limit = self.engine.config().resolve_limit(limit)?;
        info!(limit, filtered = filter.is_some(), resumed = start_token.is_some(), "listing users");
        let request = ScanRequest {
            table: self.accessor.table().to_string(),
            filter,
            limit: Some(limit),
            start_token,
        };
        self.engine.scan(&self.accessor, &request)
    }

    pub fn create_user(&self, user: Record) -> Result<()> {
        let Some(userid) = user.get(USER_ID).and_then(Value::as_str) else {
            return Err(ValidationError::MissingKeyAttribute(USER_ID.to_string()).into());
        };
        info!(userid, "creating user");
        self.accessor.put(user)
    }

    /// Replace a user's record wholesale, keeping `userid` as given.
    pub fn replace_user(&self, userid: &str, mut data: Record) -> Result<()> {
        info!(userid, "replacing user");
        data.insert(USER_ID.to_string(), Value::from(userid));
        self.accessor.put(data)
    }

    /// Change `username` and/or `email`, returning the updated record.
    pub fn update_user_partial(&self, userid: &str, patch: &UserPatch) -> Result<Record> {
        info!(userid, ?patch, "partially updating user");
        let actions = patch.actions();
        if actions.is_empty() {
            return Err(ValidationError::EmptyUpdate.into());
        }
        self.accessor.update(&single_key(USER_ID, userid), &actions)
    }

    pub fn delete_user(&self, userid: &str) -> Result<()> {
        self.accessor.delete(&single_key(USER_ID, userid))?;
        info!(userid, "deleted user");
        Ok(())
    }
}

/// Groups keyed by `groupid`.
#[derive(Debug, Clone)]
pub struct GroupsTable {
    accessor: TableAccessor,
}

impl GroupsTable {
    pub const NAME: &'static str = "groups";

    pub fn schema(physical_name: impl Into<String>) -> TableSchema {
        TableSchema {
            name: physical_name.into(),
            partition_key: KeyDefinition::string(GROUP_ID),
            sort_key: None,
            indexes: vec![],
        }
    }

    pub fn new(accessor: TableAccessor) -> Self {
        Self { accessor }
    }

    pub fn get_group(&self, groupid: &str) -> Result<Option<Record>> {
        self.accessor.get(&single_key(GROUP_ID, groupid))
    }

    pub fn put_group(&self, group: Record) -> Result<()> {
        if !group.get(GROUP_ID).is_some_and(Value::is_string) {
            return Err(ValidationError::MissingKeyAttribute(GROUP_ID.to_string()).into());
        }
        self.accessor.put(group)
    }
}
