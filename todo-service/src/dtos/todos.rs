use crate::models::{parse_due_date, NewTodo, Priority, SortKey, Todo, TodoPatch, TodoQuery};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use service_core::error::AppError;

const INVALID_PRIORITY: &str = "Priority must be low, medium, or high";
const INVALID_DUE_DATE: &str = "Invalid due date format";

/// Distinguishes an absent key (`None`) from an explicit `null` (`Some(None)`).
fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn to_rfc3339(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TodoResponse {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    pub description: String,
    pub completed: bool,
    pub priority: Priority,
    pub due_date: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Todo> for TodoResponse {
    fn from(todo: Todo) -> Self {
        Self {
            id: todo.id.to_hex(),
            due_date: todo.due_date().map(to_rfc3339),
            title: todo.title,
            description: todo.description,
            completed: todo.completed,
            priority: todo.priority,
            created_at: to_rfc3339(todo.created_at),
            updated_at: to_rfc3339(todo.updated_at),
        }
    }
}

/// Raw list query string. Empty values count as absent.
#[derive(Debug, Default, Deserialize)]
pub struct TodoListParams {
    pub completed: Option<String>,
    pub priority: Option<String>,
    pub sort: Option<String>,
}

impl TryFrom<TodoListParams> for TodoQuery {
    type Error = AppError;

    fn try_from(params: TodoListParams) -> Result<Self, Self::Error> {
        let mut query = TodoQuery::default();

        if let Some(completed) = non_empty(params.completed) {
            query.completed = Some(match completed.as_str() {
                "true" => true,
                "false" => false,
                _ => {
                    return Err(AppError::BadRequest(
                        "completed must be true or false".to_string(),
                    ))
                }
            });
        }

        if let Some(priority) = non_empty(params.priority) {
            query.priority = Some(
                priority
                    .parse()
                    .map_err(|_| AppError::BadRequest(INVALID_PRIORITY.to_string()))?,
            );
        }

        if let Some(sort) = non_empty(params.sort) {
            let keys = sort
                .split(',')
                .map(str::trim)
                .filter(|field| !field.is_empty())
                .map(|field| field.parse::<SortKey>().map_err(AppError::BadRequest))
                .collect::<Result<Vec<_>, _>>()?;
            if !keys.is_empty() {
                query.sort = keys;
            }
        }

        Ok(query)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTodoRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<String>,
    pub due_date: Option<String>,
}

impl CreateTodoRequest {
    /// Checks the title, then the due date. Priority is left for the store
    /// to validate so an unknown value surfaces as a validation error.
    pub fn into_new_todo(self) -> Result<NewTodo, AppError> {
        let title = self.title.as_deref().map(str::trim).unwrap_or_default();
        if title.is_empty() {
            return Err(AppError::BadRequest("Title is required".to_string()));
        }

        let due_date = match non_empty(self.due_date) {
            Some(raw) => Some(
                parse_due_date(&raw)
                    .ok_or_else(|| AppError::BadRequest(INVALID_DUE_DATE.to_string()))?,
            ),
            None => None,
        };

        Ok(NewTodo {
            title: title.to_string(),
            description: self
                .description
                .map(|d| d.trim().to_string())
                .unwrap_or_default(),
            priority: self
                .priority
                .filter(|p| !p.is_empty())
                .unwrap_or_else(|| Priority::default().to_string()),
            due_date,
        })
    }
}

/// Partial update body. Only keys present in the JSON are applied.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTodoRequest {
    #[serde(default, deserialize_with = "double_option")]
    pub title: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    pub completed: Option<bool>,
    #[serde(default, deserialize_with = "double_option")]
    pub priority: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub due_date: Option<Option<String>>,
}

impl UpdateTodoRequest {
    pub fn into_patch(self) -> Result<TodoPatch, AppError> {
        let mut patch = TodoPatch::default();

        if let Some(title) = self.title {
            let title = title.as_deref().map(str::trim).unwrap_or_default();
            if title.is_empty() {
                return Err(AppError::BadRequest("Title cannot be empty".to_string()));
            }
            patch.title = Some(title.to_string());
        }

        if let Some(description) = self.description {
            patch.description = Some(description.map(|d| d.trim().to_string()).unwrap_or_default());
        }

        patch.completed = self.completed;

        if let Some(priority) = self.priority {
            let priority = priority
                .and_then(|p| p.parse::<Priority>().ok())
                .ok_or_else(|| AppError::BadRequest(INVALID_PRIORITY.to_string()))?;
            patch.priority = Some(priority);
        }

        if let Some(due_date) = self.due_date {
            patch.due_date = Some(match non_empty(due_date) {
                None => None,
                Some(raw) => Some(
                    parse_due_date(&raw)
                        .ok_or_else(|| AppError::BadRequest(INVALID_DUE_DATE.to_string()))?,
                ),
            });
        }

        Ok(patch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SortDirection, SortField};
    use serde_json::json;

    fn update(body: serde_json::Value) -> Result<TodoPatch, AppError> {
        serde_json::from_value::<UpdateTodoRequest>(body)
            .unwrap()
            .into_patch()
    }

    #[test]
    fn list_params_convert_to_typed_query() {
        let query = TodoQuery::try_from(TodoListParams {
            completed: Some("false".into()),
            priority: Some("high".into()),
            sort: Some("-dueDate, title".into()),
        })
        .unwrap();

        assert_eq!(query.completed, Some(false));
        assert_eq!(query.priority, Some(Priority::High));
        assert_eq!(query.sort.len(), 2);
        assert_eq!(query.sort[0].field, SortField::DueDate);
        assert_eq!(query.sort[0].direction, SortDirection::Descending);
        assert_eq!(query.sort[1].field, SortField::Title);
    }

    #[test]
    fn list_params_reject_unknown_values() {
        for params in [
            TodoListParams {
                completed: Some("yes".into()),
                ..Default::default()
            },
            TodoListParams {
                priority: Some("urgent".into()),
                ..Default::default()
            },
            TodoListParams {
                sort: Some("-owner".into()),
                ..Default::default()
            },
        ] {
            assert!(matches!(
                TodoQuery::try_from(params),
                Err(AppError::BadRequest(_))
            ));
        }
    }

    #[test]
    fn whitespace_title_is_rejected_on_create() {
        let request = CreateTodoRequest {
            title: Some("   ".into()),
            priority: Some("high".into()),
            ..Default::default()
        };

        assert!(matches!(
            request.into_new_todo(),
            Err(AppError::BadRequest(ref m)) if m == "Title is required"
        ));
    }

    #[test]
    fn create_trims_and_defaults() {
        let new_todo = CreateTodoRequest {
            title: Some("  Buy milk ".into()),
            description: Some(" 2% ".into()),
            ..Default::default()
        }
        .into_new_todo()
        .unwrap();

        assert_eq!(new_todo.title, "Buy milk");
        assert_eq!(new_todo.description, "2%");
        assert_eq!(new_todo.priority, "medium");
        assert!(new_todo.due_date.is_none());
    }

    #[test]
    fn update_absent_keys_stay_absent() {
        let patch = update(json!({ "completed": true })).unwrap();

        assert_eq!(patch.completed, Some(true));
        assert!(patch.title.is_none());
        assert!(patch.description.is_none());
        assert!(patch.priority.is_none());
        assert!(patch.due_date.is_none());
    }

    #[test]
    fn update_null_or_empty_due_date_clears_it() {
        assert_eq!(update(json!({ "dueDate": null })).unwrap().due_date, Some(None));
        assert_eq!(update(json!({ "dueDate": "" })).unwrap().due_date, Some(None));
        assert!(update(json!({ "dueDate": "2030-05-01" }))
            .unwrap()
            .due_date
            .unwrap()
            .is_some());
    }

    #[test]
    fn update_rejects_bad_fields() {
        assert!(matches!(
            update(json!({ "title": "  " })),
            Err(AppError::BadRequest(ref m)) if m == "Title cannot be empty"
        ));
        assert!(matches!(
            update(json!({ "title": null })),
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            update(json!({ "priority": "urgent" })),
            Err(AppError::BadRequest(ref m)) if m == INVALID_PRIORITY
        ));
        assert!(matches!(
            update(json!({ "dueDate": "someday" })),
            Err(AppError::BadRequest(ref m)) if m == INVALID_DUE_DATE
        ));
    }
}
