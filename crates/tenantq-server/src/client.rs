//! Client library for talking to a `tenantq-server` over its Unix socket.
//!
//! Each method serializes a JSON-line request, sends it, reads a JSON-line
//! response, and returns the parsed result.

use std::path::Path;

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::UnixStream;
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};

use tenantq_core::filter::FilterExpr;
use tenantq_core::predicate::LogFilters;
use tenantq_core::tables::UserPatch;
use tenantq_core::token::ContinuationToken;
use tenantq_core::types::Record;

use crate::error::ClientError;
use crate::protocol::{ErrorResponse, Request};

pub type Result<T> = std::result::Result<T, ClientError>;

/// One page of a log or user listing.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub items: Vec<Record>,
    pub next_token: Option<ContinuationToken>,
}

/// Users found by a batch fetch, and the keys that had no record.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchResult {
    pub items: Vec<Record>,
    pub missing: Vec<Record>,
}

/// Client for a tenantq server.
pub struct TenantqClient {
    reader: BufReader<OwnedReadHalf>,
    writer: BufWriter<OwnedWriteHalf>,
    line_buf: String,
}

impl TenantqClient {
    /// Connect to a tenantq server at the given Unix socket path.
    pub async fn connect(path: impl AsRef<Path>) -> Result<Self> {
        let stream = UnixStream::connect(path.as_ref()).await?;
        let (read_half, write_half) = stream.into_split();
        Ok(Self {
            reader: BufReader::new(read_half),
            writer: BufWriter::new(write_half),
            line_buf: String::new(),
        })
    }

    /// One page of a group's logs.
    pub async fn list_logs(
        &mut self,
        filters: LogFilters,
        limit: Option<usize>,
        start_token: Option<ContinuationToken>,
    ) -> Result<Page> {
        let resp = self
            .send_request(&Request::ListLogs {
                filters,
                limit,
                start_token,
            })
            .await?;
        page_from_response(&resp)
    }

    /// One page of all users, optionally narrowed by `filter`.
    pub async fn list_users(
        &mut self,
        filter: Option<FilterExpr>,
        limit: Option<usize>,
        start_token: Option<ContinuationToken>,
    ) -> Result<Page> {
        let resp = self
            .send_request(&Request::ListUsers {
                filter,
                limit,
                start_token,
            })
            .await?;
        page_from_response(&resp)
    }

    pub async fn get_user(&mut self, userid: &str) -> Result<Option<Record>> {
        let resp = self
            .send_request(&Request::GetUser {
                userid: userid.to_string(),
            })
            .await?;
        item_from_response(&resp)
    }

    pub async fn batch_get_users(&mut self, userids: &[&str]) -> Result<BatchResult> {
        let resp = self
            .send_request(&Request::BatchGetUsers {
                userids: userids.iter().map(|id| id.to_string()).collect(),
            })
            .await?;
        check_error(&resp)?;
        Ok(BatchResult {
            items: records(&resp, "items")?,
            missing: records(&resp, "missing")?,
        })
    }

    pub async fn get_group(&mut self, groupid: &str) -> Result<Option<Record>> {
        let resp = self
            .send_request(&Request::GetGroup {
                groupid: groupid.to_string(),
            })
            .await?;
        item_from_response(&resp)
    }

    /// Store a record in the logical table `table` (`logs`, `users` or `groups`).
    pub async fn put_item(&mut self, table: &str, item: Value) -> Result<()> {
        let Value::Object(item) = item else {
            return Err(ClientError::Protocol("item must be a JSON object".to_string()));
        };
        let resp = self
            .send_request(&Request::PutItem {
                table: table.to_string(),
                item,
            })
            .await?;
        check_error(&resp)
    }

    pub async fn replace_user(&mut self, userid: &str, item: Record) -> Result<()> {
        let resp = self
            .send_request(&Request::ReplaceUser {
                userid: userid.to_string(),
                item,
            })
            .await?;
        check_error(&resp)
    }

    /// Change a user's `username` and/or `email`; returns the updated record.
    pub async fn update_user(&mut self, userid: &str, patch: UserPatch) -> Result<Record> {
        let resp = self
            .send_request(&Request::UpdateUser {
                userid: userid.to_string(),
                patch,
            })
            .await?;
        item_from_response(&resp)?
            .ok_or_else(|| ClientError::Protocol("update returned no item".to_string()))
    }

    pub async fn delete_user(&mut self, userid: &str) -> Result<()> {
        let resp = self
            .send_request(&Request::DeleteUser {
                userid: userid.to_string(),
            })
            .await?;
        check_error(&resp)
    }

    async fn send_request(&mut self, req: &Request) -> Result<Value> {
        let mut data = serde_json::to_vec(req).map_err(ClientError::Serialization)?;
        data.push(b'\n');
        self.writer.write_all(&data).await?;
        self.writer.flush().await?;

        self.line_buf.clear();
        let n = self.reader.read_line(&mut self.line_buf).await?;
        if n == 0 {
            return Err(ClientError::Disconnected);
        }

        serde_json::from_str(self.line_buf.trim()).map_err(ClientError::Serialization)
    }
}

fn check_error(resp: &Value) -> Result<()> {
    if let Some(err) = resp.get("error") {
        return Err(ClientError::Server(ErrorResponse {
            error: err.as_str().unwrap_or("Unknown").to_string(),
            message: resp
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_string(),
        }));
    }
    Ok(())
}

fn item_from_response(resp: &Value) -> Result<Option<Record>> {
    check_error(resp)?;
    Ok(resp.get("item").and_then(Value::as_object).cloned())
}

fn records(resp: &Value, field: &str) -> Result<Vec<Record>> {
    let values = resp
        .get(field)
        .and_then(Value::as_array)
        .ok_or_else(|| ClientError::Protocol(format!("missing '{field}' array in response")))?;
    values
        .iter()
        .map(|v| {
            v.as_object()
                .cloned()
                .ok_or_else(|| ClientError::Protocol(format!("non-object entry in '{field}'")))
        })
        .collect()
}

fn page_from_response(resp: &Value) -> Result<Page> {
    check_error(resp)?;
    let next_token = match resp.get("next_token") {
        None | Some(Value::Null) => None,
        Some(token) => Some(
            serde_json::from_value(token.clone()).map_err(ClientError::Serialization)?,
        ),
    };
    Ok(Page {
        items: records(resp, "items")?,
        next_token,
    })
}
