//! Runs against a live MongoDB. Point `TEST_MONGODB_URI` at a disposable
//! server and run with `cargo test -- --ignored`.

mod common;

use chrono::{Duration, Utc};
use common::test_config;
use todo_service::config::StoreBackend;
use todo_service::models::{NewTodo, Priority, SortField, SortKey, TodoPatch, TodoQuery};
use todo_service::services::{ConnectionState, MongoTodoStore, StoreError, TodoStore};
use todo_service::startup::Application;

async fn connect() -> MongoTodoStore {
    let config = test_config(StoreBackend::Mongodb);
    let store = MongoTodoStore::connect(&config.mongodb.uri, &config.mongodb.database)
        .await
        .expect("MongoDB reachable at TEST_MONGODB_URI");
    store.initialize_indexes().await.expect("indexes created");
    store
}

fn new_todo(title: &str, priority: &str) -> NewTodo {
    NewTodo {
        title: title.to_string(),
        description: String::new(),
        priority: priority.to_string(),
        due_date: None,
    }
}

#[tokio::test]
#[ignore]
async fn crud_round_trip_against_mongodb() {
    let store = connect().await;
    assert_eq!(store.connection_info().state, ConnectionState::Connected);

    let created = store.create(new_todo("Buy milk", "medium")).await.unwrap();
    assert!(!created.completed);
    assert_eq!(created.priority, Priority::Medium);

    let fetched = store.get(&created.id.to_hex()).await.unwrap();
    assert_eq!(fetched, created);

    let toggled = store.toggle(&created.id.to_hex()).await.unwrap();
    assert!(toggled.completed);
    assert!(toggled.updated_at >= created.updated_at);

    let patch = TodoPatch {
        title: Some("Buy oat milk".to_string()),
        ..TodoPatch::default()
    };
    let updated = store.update(&created.id.to_hex(), patch).await.unwrap();
    assert_eq!(updated.title, "Buy oat milk");
    assert!(updated.completed);

    assert_eq!(store.delete_completed().await.unwrap(), 1);
    assert!(matches!(
        store.get(&created.id.to_hex()).await,
        Err(StoreError::NotFound)
    ));
    assert_eq!(store.delete_completed().await.unwrap(), 0);

    store.shutdown().await;
    assert_eq!(store.connection_info().state, ConnectionState::Disconnected);
}

#[tokio::test]
#[ignore]
async fn list_and_stats_against_mongodb() {
    let store = connect().await;

    for (title, priority) in [("b", "low"), ("a", "high"), ("c", "low")] {
        store.create(new_todo(title, priority)).await.unwrap();
    }
    let mut overdue = new_todo("late", "high");
    overdue.due_date = Some(Utc::now() - Duration::days(3));
    store.create(overdue).await.unwrap();

    let query = TodoQuery {
        priority: Some(Priority::Low),
        sort: vec![SortKey::descending(SortField::Title)],
        ..TodoQuery::default()
    };
    let titles: Vec<_> = store
        .list(&query)
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.title)
        .collect();
    assert_eq!(titles, vec!["c", "b"]);

    let stats = store.stats(Utc::now()).await.unwrap();
    assert_eq!(stats.total, 4);
    assert_eq!(stats.pending, 4);
    assert_eq!(stats.overdue, 1);
    assert_eq!(stats.priority["high"], 2);
    assert_eq!(stats.priority["medium"], 0);

    assert_eq!(store.collection_count().await.unwrap(), 1);
    store.ping().await.unwrap();
    store.shutdown().await;
}

#[tokio::test]
#[ignore]
async fn application_binds_random_port_with_mongodb() {
    let config = test_config(StoreBackend::Mongodb);

    let app = Application::build(config).await.expect("application builds");

    assert_ne!(app.port(), 0);
    assert_eq!(app.store().connection_info().state, ConnectionState::Connected);
    app.store().shutdown().await;
}

#[tokio::test]
#[ignore]
async fn unreachable_server_fails_startup() {
    let mut config = test_config(StoreBackend::Mongodb);
    config.mongodb.uri =
        "mongodb://127.0.0.1:1/?serverSelectionTimeoutMS=200&connectTimeoutMS=200".to_string();

    assert!(Application::build(config).await.is_err());
}
