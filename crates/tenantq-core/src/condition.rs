//! Key conditions for partitioned queries.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Sort key condition for queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortCondition {
    Eq(Value),
    Lt(Value),
    Le(Value),
    Gt(Value),
    Ge(Value),
    Between(Value, Value),
    BeginsWith(String),
}

/// A sort key condition bound to the attribute it constrains.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortKeyCondition {
    pub attribute: String,
    pub condition: SortCondition,
}

/// Partition key equality plus an optional sort key range.
///
/// Attribute names must match the key shape of the table or index the
/// query targets; the store rejects mismatches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyCondition {
    pub partition_attribute: String,
    pub partition_value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<SortKeyCondition>,
}

impl KeyCondition {
    pub fn partition_eq(attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            partition_attribute: attribute.into(),
            partition_value: value.into(),
            sort: None,
        }
    }

    pub fn and_sort(mut self, attribute: impl Into<String>, condition: SortCondition) -> Self {
        self.sort = Some(SortKeyCondition {
            attribute: attribute.into(),
            condition,
        });
        self
    }
}
