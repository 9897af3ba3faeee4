use crate::dtos::{CreateTodoRequest, TodoListParams, TodoResponse, UpdateTodoRequest};
use crate::models::{now, TodoQuery, TodoStats};
use crate::startup::AppState;
use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use metrics::counter;
use service_core::error::AppError;
use service_core::response::ApiResponse;

/// GET /api/todos
#[tracing::instrument(skip(state, params))]
pub async fn list_todos(
    State(state): State<AppState>,
    params: Result<Query<TodoListParams>, QueryRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Query(params) = params?;
    let query = TodoQuery::try_from(params)?;

    let todos = state.store.list(&query).await?;
    let count = todos.len();
    let todos: Vec<TodoResponse> = todos.into_iter().map(TodoResponse::from).collect();

    Ok(ApiResponse::success(todos).with_count(count))
}

/// GET /api/todos/:id
#[tracing::instrument(skip(state))]
pub async fn get_todo(
    State(state): State<AppState>,
    id: Result<Path<String>, PathRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Path(id) = id?;
    let todo = state.store.get(&id).await?;

    Ok(ApiResponse::success(TodoResponse::from(todo)))
}

/// POST /api/todos
#[tracing::instrument(skip(state, payload))]
pub async fn create_todo(
    State(state): State<AppState>,
    payload: Result<Json<CreateTodoRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(request) = payload?;
    let new_todo = request.into_new_todo()?;

    let todo = state.store.create(new_todo).await?;
    counter!("todos_created_total").increment(1);
    tracing::info!(todo_id = %todo.id, priority = %todo.priority, "Todo created");

    Ok((
        StatusCode::CREATED,
        ApiResponse::success(TodoResponse::from(todo)).with_message("Todo created successfully"),
    ))
}

/// PUT /api/todos/:id
#[tracing::instrument(skip(state, payload))]
pub async fn update_todo(
    State(state): State<AppState>,
    id: Result<Path<String>, PathRejection>,
    payload: Result<Json<UpdateTodoRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Path(id) = id?;
    let Json(request) = payload?;
    let patch = request.into_patch()?;

    let todo = state.store.update(&id, patch).await?;
    tracing::info!(todo_id = %todo.id, "Todo updated");

    Ok(ApiResponse::success(TodoResponse::from(todo)).with_message("Todo updated successfully"))
}

/// PATCH /api/todos/:id/toggle
#[tracing::instrument(skip(state))]
pub async fn toggle_todo(
    State(state): State<AppState>,
    id: Result<Path<String>, PathRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Path(id) = id?;
    let todo = state.store.toggle(&id).await?;

    let message = if todo.completed {
        "Todo marked as completed"
    } else {
        "Todo marked as incomplete"
    };
    tracing::info!(todo_id = %todo.id, completed = todo.completed, "Todo toggled");

    Ok(ApiResponse::success(TodoResponse::from(todo)).with_message(message))
}

/// DELETE /api/todos/:id
#[tracing::instrument(skip(state))]
pub async fn delete_todo(
    State(state): State<AppState>,
    id: Result<Path<String>, PathRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Path(id) = id?;
    let todo = state.store.delete(&id).await?;
    counter!("todos_deleted_total").increment(1);
    tracing::info!(todo_id = %todo.id, "Todo deleted");

    Ok(ApiResponse::success(TodoResponse::from(todo)).with_message("Todo deleted successfully"))
}

/// DELETE /api/todos
#[tracing::instrument(skip(state))]
pub async fn delete_completed_todos(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let deleted = state.store.delete_completed().await?;
    counter!("todos_deleted_total").increment(deleted);
    tracing::info!(deleted, "Completed todos deleted");

    Ok(ApiResponse::message(format!("{} completed todos deleted", deleted))
        .with_deleted_count(deleted))
}

/// GET /api/todos/stats/summary
#[tracing::instrument(skip(state))]
pub async fn todo_stats(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let stats: TodoStats = state.store.stats(now()).await?;

    Ok(ApiResponse::success(stats))
}
