//! Maps log filters onto a key condition over the base table or an index.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::condition::{KeyCondition, SortCondition};
use crate::query::QueryDescriptor;
use crate::token::ContinuationToken;

pub const GROUP_ID: &str = "groupid";
pub const USER_ID: &str = "userid";
pub const LOG_TYPE: &str = "type";
pub const CREATED_AT: &str = "created_at";

/// Partition attribute of the user index, holding `"{groupid}#{userid}"`.
pub const GROUP_USER: &str = "groupid#userid";
/// Partition attribute of the type index, holding `"{groupid}#{type}"`.
pub const GROUP_TYPE: &str = "groupid#type";

pub const USER_INDEX: &str = "groupid-userid-created_at-index";
pub const TYPE_INDEX: &str = "groupid-type-created_at-index";

/// Caller-supplied filters for a log listing.
///
/// Empty strings count as absent.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LogFilters {
    pub group_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub log_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub begin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
}

impl LogFilters {
    pub fn group(group_id: impl Into<String>) -> Self {
        Self {
            group_id: group_id.into(),
            ..Self::default()
        }
    }

    pub fn user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn log_type(mut self, log_type: impl Into<String>) -> Self {
        self.log_type = Some(log_type.into());
        self
    }

    pub fn between(mut self, begin: Option<String>, end: Option<String>) -> Self {
        self.begin = begin;
        self.end = end;
        self
    }
}

/// Where a log query is served from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Route {
    BaseKey,
    UserCompositeIndex,
    TypeCompositeIndex,
}

impl Route {
    pub fn index_name(self) -> Option<&'static str> {
        match self {
            Route::BaseKey => None,
            Route::UserCompositeIndex => Some(USER_INDEX),
            Route::TypeCompositeIndex => Some(TYPE_INDEX),
        }
    }

    pub fn partition_attribute(self) -> &'static str {
        match self {
            Route::BaseKey => GROUP_ID,
            Route::UserCompositeIndex => GROUP_USER,
            Route::TypeCompositeIndex => GROUP_TYPE,
        }
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// Pick the route for a set of filters. A user filter wins over a type
/// filter; with neither, the base table is used.
pub fn route(filters: &LogFilters) -> Route {
    if present(&filters.user_id).is_some() {
        Route::UserCompositeIndex
    } else if present(&filters.log_type).is_some() {
        Route::TypeCompositeIndex
    } else {
        Route::BaseKey
    }
}

/// The composite partition value `"{left}#{right}"`.
pub fn composite_value(left: &str, right: &str) -> String {
    format!("{left}#{right}")
}

/// Sort key condition on `created_at` for an optional time window.
pub fn time_range(begin: Option<&str>, end: Option<&str>) -> Option<SortCondition> {
    match (begin, end) {
        (Some(b), Some(e)) => Some(SortCondition::Between(Value::from(b), Value::from(e))),
        (Some(b), None) => Some(SortCondition::Ge(Value::from(b))),
        (None, Some(e)) => Some(SortCondition::Le(Value::from(e))),
        (None, None) => None,
    }
}

/// The route and key condition for a set of filters.
pub fn key_condition(filters: &LogFilters) -> (Route, KeyCondition) {
    let route = route(filters);
    let group = filters.group_id.as_str();
    let partition_value = match route {
        Route::BaseKey => group.to_string(),
        Route::UserCompositeIndex => {
            composite_value(group, present(&filters.user_id).unwrap_or_default())
        }
        Route::TypeCompositeIndex => {
            composite_value(group, present(&filters.log_type).unwrap_or_default())
        }
    };
    let mut condition = KeyCondition::partition_eq(route.partition_attribute(), partition_value);
    if let Some(range) = time_range(present(&filters.begin), present(&filters.end)) {
        condition = condition.and_sort(CREATED_AT, range);
    }
    (route, condition)
}

/// Build the query descriptor for a log listing against `table`.
pub fn build_descriptor(
    table: &str,
    filters: &LogFilters,
    limit: Option<usize>,
    start_token: Option<ContinuationToken>,
) -> QueryDescriptor {
    let (route, condition) = key_condition(filters);
    let mut descriptor = QueryDescriptor::new(table, condition).start_token(start_token);
    descriptor.index_name = route.index_name().map(str::to_string);
    descriptor.limit = limit;
    descriptor
}
