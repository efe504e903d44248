//! Wire protocol: JSON-over-newlines request/response types.
//!
//! Each request is a single JSON line tagged by `op`; each response is a
//! single JSON line carrying either `"ok": true` or an `error` kind.

use serde::{Deserialize, Serialize};

use tenantq_core::error::Error;
use tenantq_core::filter::FilterExpr;
use tenantq_core::predicate::LogFilters;
use tenantq_core::tables::UserPatch;
use tenantq_core::token::ContinuationToken;
use tenantq_core::types::Record;

/// A request from a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    ListLogs {
        filters: LogFilters,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        limit: Option<usize>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        start_token: Option<ContinuationToken>,
    },
    ListUsers {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        filter: Option<FilterExpr>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        limit: Option<usize>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        start_token: Option<ContinuationToken>,
    },
    GetUser {
        userid: String,
    },
    BatchGetUsers {
        userids: Vec<String>,
    },
    GetGroup {
        groupid: String,
    },
    /// Store a record in one of the logical tables (`logs`, `users`, `groups`).
    PutItem {
        table: String,
        item: Record,
    },
    ReplaceUser {
        userid: String,
        item: Record,
    },
    UpdateUser {
        userid: String,
        patch: UserPatch,
    },
    DeleteUser {
        userid: String,
    },
}

/// A response to a client.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum Response {
    Ok(OkResponse),
    Error(ErrorResponse),
}

/// Successful response variants.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum OkResponse {
    Items {
        ok: bool,
        items: Vec<Record>,
        next_token: Option<ContinuationToken>,
    },
    Batch {
        ok: bool,
        items: Vec<Record>,
        missing: Vec<Record>,
    },
    Item {
        ok: bool,
        item: Option<Record>,
    },
    Empty {
        ok: bool,
    },
}

/// Error response. `error` is the stable error kind, `message` is for humans.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl Response {
    pub fn ok_empty() -> Self {
        Response::Ok(OkResponse::Empty { ok: true })
    }

    pub fn ok_item(item: Option<Record>) -> Self {
        Response::Ok(OkResponse::Item { ok: true, item })
    }

    pub fn ok_items(items: Vec<Record>, next_token: Option<ContinuationToken>) -> Self {
        Response::Ok(OkResponse::Items {
            ok: true,
            items,
            next_token,
        })
    }

    pub fn ok_batch(items: Vec<Record>, missing: Vec<Record>) -> Self {
        Response::Ok(OkResponse::Batch {
            ok: true,
            items,
            missing,
        })
    }

    pub fn error(error: impl Into<String>, message: impl Into<String>) -> Self {
        Response::Error(ErrorResponse {
            error: error.into(),
            message: message.into(),
        })
    }
}

impl From<Error> for Response {
    fn from(err: Error) -> Self {
        Response::error(err.kind(), err.to_string())
    }
}
