//! Core types: records, key definitions, table and index schemas.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A stored record: attribute name to value.
pub type Record = serde_json::Map<String, Value>;

/// Maximum record size in bytes (400KB, matching DynamoDB).
pub const MAX_RECORD_SIZE: usize = 400 * 1024;

/// Maximum partition key size in bytes (2048, matching DynamoDB).
pub const MAX_PARTITION_KEY_SIZE: usize = 2048;

/// Maximum sort key size in bytes (1024, matching DynamoDB).
pub const MAX_SORT_KEY_SIZE: usize = 1024;

/// The type of a key attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyType {
    String,
    Number,
}

/// A key attribute definition (name + type).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyDefinition {
    pub name: String,
    pub key_type: KeyType,
}

impl KeyDefinition {
    pub fn new(name: impl Into<String>, key_type: KeyType) -> Self {
        Self {
            name: name.into(),
            key_type,
        }
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, KeyType::String)
    }
}

/// A secondary index with its own partition key and optional sort key.
///
/// Composite indexes concatenate two filter dimensions into one partition
/// attribute (e.g. `groupid#userid`), which writers maintain on every record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDefinition {
    pub name: String,
    pub partition_key: KeyDefinition,
    pub sort_key: Option<KeyDefinition>,
}

impl IndexDefinition {
    pub fn new(
        name: impl Into<String>,
        partition_key: KeyDefinition,
        sort_key: Option<KeyDefinition>,
    ) -> Self {
        Self {
            name: name.into(),
            partition_key,
            sort_key,
        }
    }
}

/// Schema definition for a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: String,
    pub partition_key: KeyDefinition,
    pub sort_key: Option<KeyDefinition>,
    #[serde(default)]
    pub indexes: Vec<IndexDefinition>,
}

impl TableSchema {
    /// Look up a secondary index by name.
    pub fn index(&self, name: &str) -> Option<&IndexDefinition> {
        self.indexes.iter().find(|idx| idx.name == name)
    }

    /// Names of the primary key attributes.
    pub fn key_names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.partition_key.name.as_str())
            .chain(self.sort_key.as_ref().map(|sk| sk.name.as_str()))
    }

    /// Project a record onto its primary key attributes.
    ///
    /// Attributes missing from the record are skipped; callers validate
    /// presence separately.
    pub fn key_of(&self, record: &Record) -> Record {
        self.key_names()
            .filter_map(|name| record.get(name).map(|v| (name.to_string(), v.clone())))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn logs_like() -> TableSchema {
        TableSchema {
            name: "logs".to_string(),
            partition_key: KeyDefinition::string("groupid"),
            sort_key: Some(KeyDefinition::string("created_at")),
            indexes: vec![IndexDefinition::new(
                "by-user",
                KeyDefinition::string("groupid#userid"),
                Some(KeyDefinition::string("created_at")),
            )],
        }
    }

    #[test]
    fn test_key_of_projects_primary_key() {
        let schema = logs_like();
        let record = json!({
            "groupid": "g1",
            "created_at": "2024-01-01T00:00:00Z",
            "message": "hello"
        });
        let key = schema.key_of(record.as_object().unwrap());
        assert_eq!(key.len(), 2);
        assert_eq!(key["groupid"], "g1");
        assert!(!key.contains_key("message"));
    }

    #[test]
    fn test_index_lookup() {
        let schema = logs_like();
        assert!(schema.index("by-user").is_some());
        assert!(schema.index("missing").is_none());
    }
}
