#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::Value;
use service_core::config::Config as CoreConfig;
use std::sync::Arc;
use todo_service::config::{CorsConfig, MongoConfig, StoreBackend, StoreConfig, TodoConfig};
use todo_service::services::MemoryTodoStore;
use todo_service::startup::{build_router, AppState};
use tower::util::ServiceExt;

/// Well-formed identifier that no test ever creates.
pub const MISSING_ID: &str = "65f1c0ffee0000000000beef";
pub const MALFORMED_ID: &str = "not-a-valid-id";

pub fn test_config(backend: StoreBackend) -> TodoConfig {
    TodoConfig {
        common: CoreConfig {
            port: 0,
            ..CoreConfig::default()
        },
        mongodb: MongoConfig {
            uri: std::env::var("TEST_MONGODB_URI")
                .unwrap_or_else(|_| "mongodb://localhost:27017".to_string()),
            database: format!("todo_test_{}", uuid::Uuid::new_v4().simple()),
        },
        store: StoreConfig { backend },
        environment: "test".to_string(),
        cors: CorsConfig {
            allowed_origins: Vec::new(),
        },
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: axum::http::HeaderMap,
    pub body: Value,
}

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryTodoStore>,
}

impl TestApp {
    pub fn spawn() -> Self {
        let config = test_config(StoreBackend::Memory);
        let store = Arc::new(MemoryTodoStore::new(config.mongodb.database.clone()));
        let router = build_router(AppState::new(config, store.clone()));

        TestApp { router, store }
    }

    pub async fn request(&self, method: Method, uri: &str, body: Option<Value>) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::String(
                String::from_utf8_lossy(&bytes).into_owned(),
            ))
        };

        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn get(&self, uri: &str) -> TestResponse {
        self.request(Method::GET, uri, None).await
    }

    pub async fn post(&self, uri: &str, body: Value) -> TestResponse {
        self.request(Method::POST, uri, Some(body)).await
    }

    pub async fn put(&self, uri: &str, body: Value) -> TestResponse {
        self.request(Method::PUT, uri, Some(body)).await
    }

    pub async fn patch(&self, uri: &str) -> TestResponse {
        self.request(Method::PATCH, uri, None).await
    }

    pub async fn delete(&self, uri: &str) -> TestResponse {
        self.request(Method::DELETE, uri, None).await
    }

    /// Creates a todo and returns its `data` object.
    pub async fn create_todo(&self, body: Value) -> Value {
        let response = self.post("/api/todos", body).await;
        assert_eq!(response.status, StatusCode::CREATED, "{}", response.body);
        response.body["data"].clone()
    }

    pub async fn toggle(&self, id: &str) -> Value {
        let response = self.patch(&format!("/api/todos/{}/toggle", id)).await;
        assert_eq!(response.status, StatusCode::OK, "{}", response.body);
        response.body["data"].clone()
    }
}

pub fn id_of(todo: &Value) -> String {
    todo["_id"].as_str().expect("todo has an _id").to_string()
}
