//! Unix domain socket server over a [`Service`].
//!
//! Each connected client sends JSON-line requests and receives JSON-line
//! responses. Connections are served concurrently, one task each; no
//! pagination state is held between requests.

use std::path::PathBuf;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tracing::{debug, error, info, warn};

use crate::protocol::{Request, Response};
use crate::service::Service;

/// A tenantq server listening on a Unix socket.
pub struct TenantqServer {
    service: Service,
    socket_path: PathBuf,
}

impl TenantqServer {
    pub fn new(service: Service, socket_path: PathBuf) -> Self {
        Self {
            service,
            socket_path,
        }
    }

    /// Run the server, accepting connections until a shutdown signal is received.
    ///
    /// A stale socket file is removed before binding, and the socket file is
    /// removed again on SIGINT or SIGTERM.
    pub async fn run(&self) -> std::io::Result<()> {
        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path)?;
        }

        let listener = UnixListener::bind(&self.socket_path)?;
        info!(path = %self.socket_path.display(), "server listening");

        let accept_loop = async {
            loop {
                match listener.accept().await {
                    Ok((stream, _addr)) => {
                        let service = self.service.clone();
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(service, stream).await {
                                warn!(error = %e, "connection handler error");
                            }
                        });
                    }
                    Err(e) => {
                        error!(error = %e, "accept error");
                    }
                }
            }
        };

        tokio::select! {
            _ = accept_loop => {}
            _ = shutdown_signal() => {
                info!("shutdown signal received");
            }
        }

        if self.socket_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.socket_path) {
                warn!(error = %e, "failed to remove socket file on shutdown");
            } else {
                info!(path = %self.socket_path.display(), "socket file removed");
            }
        }

        Ok(())
    }
}

async fn handle_connection(service: Service, stream: UnixStream) -> std::io::Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    loop {
        line.clear();
        let n = reader.read_line(&mut line).await?;
        if n == 0 {
            break;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<Request>(trimmed) {
            Ok(req) => {
                // Store calls are synchronous and may block on locks.
                let service = service.clone();
                tokio::task::spawn_blocking(move || dispatch(&service, req))
                    .await
                    .unwrap_or_else(|e| Response::error("InternalError", e.to_string()))
            }
            Err(e) => Response::error("ParseError", e.to_string()),
        };

        let mut resp_bytes = match serde_json::to_vec(&response) {
            Ok(bytes) => bytes,
            Err(e) => format!(
                r#"{{"error":"SerializationError","message":{:?}}}"#,
                e.to_string()
            )
            .into_bytes(),
        };
        resp_bytes.push(b'\n');

        writer.write_all(&resp_bytes).await?;
        writer.flush().await?;
    }

    Ok(())
}

/// Answer one request. Every failure becomes an error response carrying the
/// error kind; nothing is retried here.
pub fn dispatch(service: &Service, req: Request) -> Response {
    debug!(?req, "dispatching request");
    let result = match req {
        Request::ListLogs {
            filters,
            limit,
            start_token,
        } => service
            .logs
            .list_logs(&filters, limit, start_token)
            .map(|page| Response::ok_items(page.items, page.next_token)),
        Request::ListUsers {
            filter,
            limit,
            start_token,
        } => service
            .users
            .list_users(filter, limit, start_token)
            .map(|page| Response::ok_items(page.items, page.next_token)),
        Request::GetUser { userid } => service.users.get_user(&userid).map(Response::ok_item),
        Request::BatchGetUsers { userids } => service
            .users
            .batch_get_users(&userids)
            .map(|outcome| Response::ok_batch(outcome.items, outcome.missing)),
        Request::GetGroup { groupid } => service.groups.get_group(&groupid).map(Response::ok_item),
        Request::PutItem { table, item } => service
            .put_item(&table, item)
            .map(|()| Response::ok_empty()),
        Request::ReplaceUser { userid, item } => service
            .users
            .replace_user(&userid, item)
            .map(|()| Response::ok_empty()),
        Request::UpdateUser { userid, patch } => service
            .users
            .update_user_partial(&userid, &patch)
            .map(|item| Response::ok_item(Some(item))),
        Request::DeleteUser { userid } => service
            .users
            .delete_user(&userid)
            .map(|()| Response::ok_empty()),
    };
    result.unwrap_or_else(Response::from)
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(e) => {
                warn!(error = %e, "failed to register SIGTERM handler");
                ctrl_c.await.ok();
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
    }
}
