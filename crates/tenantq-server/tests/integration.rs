//! Integration tests for tenantq-server: start server, connect client, verify ops.

use serde_json::json;
use tempfile::tempdir;
use tokio::time::{Duration, sleep};

use tenantq_core::config::{EngineConfig, TableNaming};
use tenantq_core::filter::FilterExpr;
use tenantq_core::predicate::LogFilters;
use tenantq_core::store::MemoryStore;
use tenantq_core::tables::UserPatch;
use tenantq_server::client::TenantqClient;
use tenantq_server::server::TenantqServer;
use tenantq_server::service::Service;

/// Start a server on a temp socket and return the socket path.
/// The server runs in a background tokio task.
async fn start_test_server() -> (tempfile::TempDir, std::path::PathBuf, MemoryStore) {
    let dir = tempdir().unwrap();
    let socket_path = dir.path().join("test.sock");

    let store = MemoryStore::new();
    let service =
        Service::bootstrap(&store, &TableNaming::default(), EngineConfig::default()).unwrap();
    let server = TenantqServer::new(service, socket_path.clone());

    tokio::spawn(async move {
        server.run().await.unwrap();
    });

    // Give the server a moment to bind.
    sleep(Duration::from_millis(50)).await;

    (dir, socket_path, store)
}

async fn seed_logs(client: &mut TenantqClient, count: usize) {
    for i in 0..count {
        let user = if i % 2 == 0 { "alice" } else { "bob" };
        client
            .put_item(
                "logs",
                json!({
                    "groupid": "group1",
                    "created_at": format!("2024-01-01T00:00:{i:02}Z"),
                    "userid": user,
                    "type": if i % 3 == 0 { "error" } else { "info" },
                    "seq": i
                }),
            )
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn test_user_crud() {
    let (_dir, sock, _store) = start_test_server().await;
    let mut client = TenantqClient::connect(&sock).await.unwrap();

    client
        .put_item(
            "users",
            json!({"userid": "u1", "username": "alice", "email": "alice@example.com"}),
        )
        .await
        .unwrap();

    let user = client.get_user("u1").await.unwrap().unwrap();
    assert_eq!(user["username"], "alice");
    assert!(client.get_user("nobody").await.unwrap().is_none());

    let updated = client
        .update_user(
            "u1",
            UserPatch {
                username: Some("alicia".into()),
                ..UserPatch::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated["username"], "alicia");
    assert_eq!(updated["email"], "alice@example.com");

    client.delete_user("u1").await.unwrap();
    assert!(client.get_user("u1").await.unwrap().is_none());
}

#[tokio::test]
async fn test_empty_patch_is_validation_error() {
    let (_dir, sock, _store) = start_test_server().await;
    let mut client = TenantqClient::connect(&sock).await.unwrap();

    let err = client
        .update_user("u1", UserPatch::default())
        .await
        .unwrap_err();
    assert_eq!(err.server_kind(), Some("ValidationError"));
}

#[tokio::test]
async fn test_list_logs_pages_through_token() {
    let (_dir, sock, _store) = start_test_server().await;
    let mut client = TenantqClient::connect(&sock).await.unwrap();
    seed_logs(&mut client, 12).await;

    let filters = LogFilters::group("group1").user("alice");
    let first = client
        .list_logs(filters.clone(), Some(4), None)
        .await
        .unwrap();
    assert_eq!(first.items.len(), 4);
    assert!(first.next_token.is_some());

    let second = client
        .list_logs(filters, Some(4), first.next_token)
        .await
        .unwrap();
    let seqs: Vec<u64> = second
        .items
        .iter()
        .map(|r| r["seq"].as_u64().unwrap())
        .collect();
    assert_eq!(seqs, vec![8, 10]);
    assert!(second.next_token.is_none());
}

#[tokio::test]
async fn test_list_logs_time_window_and_type() {
    let (_dir, sock, _store) = start_test_server().await;
    let mut client = TenantqClient::connect(&sock).await.unwrap();
    seed_logs(&mut client, 10).await;

    let filters = LogFilters::group("group1").log_type("error").between(
        Some("2024-01-01T00:00:02Z".into()),
        Some("2024-01-01T00:00:09Z".into()),
    );
    let page = client.list_logs(filters, None, None).await.unwrap();
    let seqs: Vec<u64> = page
        .items
        .iter()
        .map(|r| r["seq"].as_u64().unwrap())
        .collect();
    assert_eq!(seqs, vec![3, 6, 9]);
}

#[tokio::test]
async fn test_limit_out_of_range() {
    let (_dir, sock, _store) = start_test_server().await;
    let mut client = TenantqClient::connect(&sock).await.unwrap();

    let err = client
        .list_logs(LogFilters::group("group1"), Some(0), None)
        .await
        .unwrap_err();
    assert_eq!(err.server_kind(), Some("ValidationError"));

    let err = client.list_users(None, Some(1001), None).await.unwrap_err();
    assert_eq!(err.server_kind(), Some("ValidationError"));
}

#[tokio::test]
async fn test_batch_get_users_reports_missing() {
    let (_dir, sock, _store) = start_test_server().await;
    let mut client = TenantqClient::connect(&sock).await.unwrap();
    for id in ["u1", "u2", "u3"] {
        client
            .put_item("users", json!({"userid": id}))
            .await
            .unwrap();
    }

    let result = client
        .batch_get_users(&["u1", "ghost", "u3"])
        .await
        .unwrap();
    assert_eq!(result.items.len(), 2);
    assert_eq!(result.missing.len(), 1);
    assert_eq!(result.missing[0]["userid"], "ghost");
}

#[tokio::test]
async fn test_store_outage_surfaces_as_unavailable() {
    let (_dir, sock, store) = start_test_server().await;
    let mut client = TenantqClient::connect(&sock).await.unwrap();

    store.fail_next(tenantq_core::error::StoreError::Unavailable(
        "throttled".into(),
    ));
    let err = client.get_group("g1").await.unwrap_err();
    assert_eq!(err.server_kind(), Some("StoreUnavailable"));

    // The next call goes through.
    assert!(client.get_group("g1").await.unwrap().is_none());
}

#[tokio::test]
async fn test_unknown_table_and_non_object_item() {
    let (_dir, sock, _store) = start_test_server().await;
    let mut client = TenantqClient::connect(&sock).await.unwrap();

    let err = client
        .put_item("orders", json!({"id": 1}))
        .await
        .unwrap_err();
    assert_eq!(err.server_kind(), Some("ValidationError"));

    let err = client.put_item("users", json!([1, 2])).await.unwrap_err();
    assert!(matches!(
        err,
        tenantq_server::error::ClientError::Protocol(_)
    ));
}

#[tokio::test]
async fn test_concurrent_clients() {
    let (_dir, sock, _store) = start_test_server().await;
    let mut writer = TenantqClient::connect(&sock).await.unwrap();
    seed_logs(&mut writer, 20).await;

    let mut handles = Vec::new();
    for _ in 0..4 {
        let sock = sock.clone();
        handles.push(tokio::spawn(async move {
            let mut client = TenantqClient::connect(&sock).await.unwrap();
            let mut token = None;
            let mut total = 0;
            loop {
                let page = client
                    .list_logs(LogFilters::group("group1"), Some(6), token)
                    .await
                    .unwrap();
                total += page.items.len();
                token = page.next_token;
                if token.is_none() {
                    break;
                }
            }
            total
        }));
    }
    for handle in handles {
        assert_eq!(handle.await.unwrap(), 20);
    }
}

#[tokio::test]
async fn test_list_users_filtered() {
    let (_dir, sock, _store) = start_test_server().await;
    let mut client = TenantqClient::connect(&sock).await.unwrap();
    for (id, name) in [("u1", "alice"), ("u2", "bob"), ("u3", "alex")] {
        client
            .put_item("users", json!({"userid": id, "username": name}))
            .await
            .unwrap();
    }

    let filter = FilterExpr::begins_with(FilterExpr::attr("username"), "al");
    let page = client.list_users(Some(filter), None, None).await.unwrap();
    let mut ids: Vec<&str> = page
        .items
        .iter()
        .map(|u| u["userid"].as_str().unwrap())
        .collect();
    ids.sort();
    assert_eq!(ids, vec!["u1", "u3"]);
    assert!(page.next_token.is_none());
}
