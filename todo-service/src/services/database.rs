use super::monitor::ConnectionMonitor;
use super::store::{
    parse_id, ConnectionInfo, ConnectionState, ConnectionStateCell, StoreError, TodoStore,
};
use crate::models::{now, NewTodo, Todo, TodoPatch, TodoQuery, TodoStats};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, Bson, DateTime as BsonDateTime, Document},
    options::{
        ClientOptions, FindOneAndUpdateOptions, FindOptions, IndexOptions, ReturnDocument,
        ServerAddress,
    },
    event::sdam::SdamEventHandler,
    Client as MongoClient, Collection, Database, IndexModel,
};
use service_core::error::AppError;
use std::sync::Arc;
use std::time::{Duration, Instant};
use validator::Validate;

const TODOS_COLLECTION: &str = "todos";

/// MongoDB-backed store. Holds the process's only client; clones share it.
#[derive(Clone)]
pub struct MongoTodoStore {
    client: MongoClient,
    db: Database,
    host: Option<String>,
    port: Option<u16>,
    state: Arc<ConnectionStateCell>,
    monitor: Arc<ConnectionMonitor>,
}

impl MongoTodoStore {
    /// Connects and pings the server so a bad URI or unreachable cluster
    /// fails here, at startup, rather than on the first request.
    ///
    /// The database named in the URI wins over `default_database`. After
    /// startup the connection state follows the driver's server monitoring.
    pub async fn connect(uri: &str, default_database: &str) -> Result<Self, AppError> {
        let state = Arc::new(ConnectionStateCell::new(ConnectionState::Connecting));
        let monitor = Arc::new(ConnectionMonitor::new(state.clone()));

        let mut options = ClientOptions::parse(uri).await.map_err(|e| {
            tracing::error!("Failed to parse MongoDB connection string: {}", e);
            state.set(ConnectionState::Disconnected);
            AppError::from(e)
        })?;

        let (host, port) = match options.hosts.first() {
            Some(ServerAddress::Tcp { host, port }) => (Some(host.clone()), *port),
            _ => (None, None),
        };
        let database = options
            .default_database
            .clone()
            .unwrap_or_else(|| default_database.to_string());
        options.sdam_event_handler = Some(monitor.clone() as Arc<dyn SdamEventHandler>);

        let client = MongoClient::with_options(options).map_err(|e| {
            tracing::error!("Failed to create MongoDB client: {}", e);
            state.set(ConnectionState::Disconnected);
            AppError::from(e)
        })?;

        client
            .database("admin")
            .run_command(doc! { "ping": 1 }, None)
            .await
            .map_err(|e| {
                tracing::error!("Error connecting to MongoDB: {}", e);
                state.set(ConnectionState::Disconnected);
                AppError::from(e)
            })?;

        state.set(ConnectionState::Connected);
        tracing::info!(
            host = host.as_deref().unwrap_or("unknown"),
            database = %database,
            "MongoDB connected"
        );

        let db = client.database(&database);
        Ok(Self {
            client,
            db,
            host,
            port,
            state,
            monitor,
        })
    }

    pub async fn initialize_indexes(&self) -> Result<(), AppError> {
        tracing::info!("Creating MongoDB indexes for todo-service");

        let indexes = [
            ("completed_idx", doc! { "completed": 1 }),
            ("priority_idx", doc! { "priority": 1 }),
            ("created_at_idx", doc! { "createdAt": -1 }),
        ];

        for (name, keys) in indexes {
            let index = IndexModel::builder()
                .keys(keys)
                .options(IndexOptions::builder().name(name.to_string()).build())
                .build();

            self.todos().create_index(index, None).await.map_err(|e| {
                tracing::error!("Failed to create {} on todos collection: {}", name, e);
                AppError::from(e)
            })?;
        }

        Ok(())
    }

    pub fn todos(&self) -> Collection<Todo> {
        self.db.collection(TODOS_COLLECTION)
    }
}

fn filter_document(query: &TodoQuery) -> Document {
    let mut filter = Document::new();
    if let Some(completed) = query.completed {
        filter.insert("completed", completed);
    }
    if let Some(priority) = query.priority {
        filter.insert("priority", priority.as_str());
    }
    filter
}

fn sort_document(query: &TodoQuery) -> Document {
    let mut sort = Document::new();
    for key in &query.sort {
        sort.insert(key.field.as_str(), key.direction.as_i32());
    }
    sort.insert("_id", query.tie_break_direction().as_i32());
    sort
}

fn set_document(patch: &TodoPatch, updated_at: DateTime<Utc>) -> Document {
    let mut set = doc! { "updatedAt": BsonDateTime::from_chrono(updated_at) };
    if let Some(title) = &patch.title {
        set.insert("title", title.as_str());
    }
    if let Some(description) = &patch.description {
        set.insert("description", description.as_str());
    }
    if let Some(completed) = patch.completed {
        set.insert("completed", completed);
    }
    if let Some(priority) = patch.priority {
        set.insert("priority", priority.as_str());
    }
    if let Some(due_date) = patch.due_date {
        let value = due_date
            .map(|d| Bson::DateTime(BsonDateTime::from_chrono(d)))
            .unwrap_or(Bson::Null);
        set.insert("dueDate", value);
    }
    set
}

/// `$sum: 1` comes back as Int32 or Int64 depending on magnitude.
fn group_count(group: &Document) -> u64 {
    match group.get("count") {
        Some(Bson::Int32(n)) => *n as u64,
        Some(Bson::Int64(n)) => *n as u64,
        Some(Bson::Double(n)) => *n as u64,
        _ => 0,
    }
}

impl MongoTodoStore {
    async fn grouped_counts(&self, field: &str) -> Result<Vec<Document>, StoreError> {
        let pipeline = vec![doc! {
            "$group": { "_id": format!("${}", field), "count": { "$sum": 1 } }
        }];
        let cursor = self.todos().aggregate(pipeline, None).await?;
        Ok(cursor.try_collect().await?)
    }
}

#[async_trait]
impl TodoStore for MongoTodoStore {
    async fn list(&self, query: &TodoQuery) -> Result<Vec<Todo>, StoreError> {
        let options = FindOptions::builder().sort(sort_document(query)).build();
        let cursor = self.todos().find(filter_document(query), options).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn get(&self, id: &str) -> Result<Todo, StoreError> {
        let oid = parse_id(id)?;
        self.todos()
            .find_one(doc! { "_id": oid }, None)
            .await?
            .ok_or(StoreError::NotFound)
    }

    async fn create(&self, new_todo: NewTodo) -> Result<Todo, StoreError> {
        let todo = new_todo.into_todo()?;
        self.todos().insert_one(&todo, None).await?;
        Ok(todo)
    }

    async fn update(&self, id: &str, patch: TodoPatch) -> Result<Todo, StoreError> {
        let oid = parse_id(id)?;
        patch.validate()?;

        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        self.todos()
            .find_one_and_update(
                doc! { "_id": oid },
                doc! { "$set": set_document(&patch, now()) },
                options,
            )
            .await?
            .ok_or(StoreError::NotFound)
    }

    async fn toggle(&self, id: &str) -> Result<Todo, StoreError> {
        let oid = parse_id(id)?;

        // Pipeline update so the read-flip-write is a single atomic operation.
        let update = vec![doc! {
            "$set": {
                "completed": { "$not": ["$completed"] },
                "updatedAt": BsonDateTime::from_chrono(now()),
            }
        }];
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        self.todos()
            .find_one_and_update(doc! { "_id": oid }, update, options)
            .await?
            .ok_or(StoreError::NotFound)
    }

    async fn delete(&self, id: &str) -> Result<Todo, StoreError> {
        let oid = parse_id(id)?;
        self.todos()
            .find_one_and_delete(doc! { "_id": oid }, None)
            .await?
            .ok_or(StoreError::NotFound)
    }

    async fn delete_completed(&self) -> Result<u64, StoreError> {
        let result = self
            .todos()
            .delete_many(doc! { "completed": true }, None)
            .await?;
        Ok(result.deleted_count)
    }

    async fn stats(&self, now: DateTime<Utc>) -> Result<TodoStats, StoreError> {
        let (mut completed, mut pending) = (0, 0);
        for group in self.grouped_counts("completed").await? {
            match group.get_bool("_id") {
                Ok(true) => completed += group_count(&group),
                _ => pending += group_count(&group),
            }
        }

        let overdue = self
            .todos()
            .count_documents(
                doc! {
                    "completed": false,
                    "dueDate": { "$lt": BsonDateTime::from_chrono(now) },
                },
                None,
            )
            .await?;

        let by_priority = self
            .grouped_counts("priority")
            .await?
            .into_iter()
            .filter_map(|group| {
                let count = group_count(&group);
                group.get_str("_id").ok().map(|p| (p.to_string(), count))
            })
            .collect::<Vec<_>>();

        Ok(TodoStats::from_counts(completed, pending, overdue, by_priority))
    }

    fn connection_info(&self) -> ConnectionInfo {
        ConnectionInfo {
            state: self.state.get(),
            host: self.host.clone(),
            port: self.port,
            name: self.db.name().to_string(),
        }
    }

    async fn ping(&self) -> Result<Duration, StoreError> {
        let start = Instant::now();
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 }, None)
            .await
            .map_err(|e| {
                tracing::error!("MongoDB health check failed: {}", e);
                StoreError::from(e)
            })?;
        Ok(start.elapsed())
    }

    async fn collection_count(&self) -> Result<usize, StoreError> {
        Ok(self.db.list_collection_names(None).await?.len())
    }

    async fn shutdown(&self) {
        self.monitor.begin_shutdown();
        self.client.clone().shutdown().await;
        self.monitor.finish_shutdown();
        tracing::info!("MongoDB connection closed");
    }
}
