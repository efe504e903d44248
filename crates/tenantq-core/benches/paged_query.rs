use std::sync::Arc;

use criterion::{Criterion, criterion_group, criterion_main};
use serde_json::json;
use tenantq_core::accessor::TableAccessor;
use tenantq_core::predicate::LogFilters;
use tenantq_core::query::QueryEngine;
use tenantq_core::store::{MemoryStore, StoreLimits};
use tenantq_core::tables::{LogsTable, UsersTable};

fn logs_table(limits: StoreLimits, count: usize) -> LogsTable {
    let store = MemoryStore::with_limits(limits);
    store.create_table(LogsTable::schema("logs")).unwrap();
    let logs = LogsTable::new(
        TableAccessor::new(Arc::new(store), "logs"),
        QueryEngine::default(),
    );
    for i in 0..count {
        let record = json!({
            "groupid": format!("group{}", i % 10),
            "created_at": format!("2024-01-01T{:02}:{:02}:{:02}Z", i / 3600, (i / 60) % 60, i % 60),
            "userid": format!("user{}@example.com", i % 30),
            "type": if i % 5 == 0 { "error" } else { "info" },
            "message": "x".repeat(64),
        });
        logs.put_log(record.as_object().unwrap().clone()).unwrap();
    }
    logs
}

fn bench_base_query(c: &mut Criterion) {
    let logs = logs_table(StoreLimits::default(), 20_000);
    let filters = LogFilters::group("group3");
    c.bench_function("list_logs_base_100", |b| {
        b.iter(|| logs.list_logs(&filters, Some(100), None).unwrap());
    });
}

fn bench_index_query(c: &mut Criterion) {
    let logs = logs_table(StoreLimits::default(), 20_000);
    let filters = LogFilters::group("group3").user("user13@example.com");
    c.bench_function("list_logs_user_index_100", |b| {
        b.iter(|| logs.list_logs(&filters, Some(100), None).unwrap());
    });
}

fn bench_many_small_pages(c: &mut Criterion) {
    let limits = StoreLimits {
        max_page_items: 10,
        ..StoreLimits::default()
    };
    let logs = logs_table(limits, 20_000);
    let filters = LogFilters::group("group3");
    c.bench_function("list_logs_1000_in_pages_of_10", |b| {
        b.iter(|| logs.list_logs(&filters, Some(1000), None).unwrap());
    });
}

fn bench_batch_get(c: &mut Criterion) {
    let store = MemoryStore::new();
    store.create_table(UsersTable::schema("users")).unwrap();
    let users = UsersTable::new(
        TableAccessor::new(Arc::new(store), "users"),
        QueryEngine::default(),
    );
    for i in 0..1_000 {
        let user = json!({"userid": format!("user{i}@example.com"), "username": "bench"});
        users.create_user(user.as_object().unwrap().clone()).unwrap();
    }
    let ids: Vec<String> = (0..500).map(|i| format!("user{}@example.com", i * 2)).collect();
    c.bench_function("batch_get_users_500", |b| {
        b.iter(|| users.batch_get_users(&ids).unwrap());
    });
}

criterion_group!(
    benches,
    bench_base_query,
    bench_index_query,
    bench_many_small_pages,
    bench_batch_get
);
criterion_main!(benches);
