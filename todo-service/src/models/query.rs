use super::{Priority, Todo};
use std::cmp::Ordering;

/// Fields a list may be sorted by, named as they are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    Title,
    Description,
    Completed,
    Priority,
    DueDate,
    CreatedAt,
    UpdatedAt,
}

impl SortField {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortField::Title => "title",
            SortField::Description => "description",
            SortField::Completed => "completed",
            SortField::Priority => "priority",
            SortField::DueDate => "dueDate",
            SortField::CreatedAt => "createdAt",
            SortField::UpdatedAt => "updatedAt",
        }
    }

    /// Orders two records on this field the way the document store does:
    /// strings and booleans by value, priority by its stored string, a
    /// missing due date before any date.
    fn compare(&self, a: &Todo, b: &Todo) -> Ordering {
        match self {
            SortField::Title => a.title.cmp(&b.title),
            SortField::Description => a.description.cmp(&b.description),
            SortField::Completed => a.completed.cmp(&b.completed),
            SortField::Priority => a.priority.as_str().cmp(b.priority.as_str()),
            SortField::DueDate => a.due_date.cmp(&b.due_date),
            SortField::CreatedAt => a.created_at.cmp(&b.created_at),
            SortField::UpdatedAt => a.updated_at.cmp(&b.updated_at),
        }
    }
}

impl std::str::FromStr for SortField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "title" => Ok(SortField::Title),
            "description" => Ok(SortField::Description),
            "completed" => Ok(SortField::Completed),
            "priority" => Ok(SortField::Priority),
            "dueDate" => Ok(SortField::DueDate),
            "createdAt" => Ok(SortField::CreatedAt),
            "updatedAt" => Ok(SortField::UpdatedAt),
            _ => Err(format!("Invalid sort field: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn as_i32(&self) -> i32 {
        match self {
            SortDirection::Ascending => 1,
            SortDirection::Descending => -1,
        }
    }

    fn apply(&self, ordering: Ordering) -> Ordering {
        match self {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortKey {
    pub field: SortField,
    pub direction: SortDirection,
}

impl SortKey {
    pub fn descending(field: SortField) -> Self {
        Self {
            field,
            direction: SortDirection::Descending,
        }
    }
}

/// `title` sorts ascending, `-title` descending.
impl std::str::FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (direction, name) = match s.strip_prefix('-') {
            Some(name) => (SortDirection::Descending, name),
            None => (SortDirection::Ascending, s),
        };
        Ok(Self {
            field: name.parse()?,
            direction,
        })
    }
}

/// Validated list options: filters that are `None` impose no constraint.
#[derive(Debug, Clone, PartialEq)]
pub struct TodoQuery {
    pub completed: Option<bool>,
    pub priority: Option<Priority>,
    pub sort: Vec<SortKey>,
}

impl Default for TodoQuery {
    fn default() -> Self {
        Self {
            completed: None,
            priority: None,
            sort: vec![SortKey::descending(SortField::CreatedAt)],
        }
    }
}

impl TodoQuery {
    pub fn matches(&self, todo: &Todo) -> bool {
        self.completed.map_or(true, |c| todo.completed == c)
            && self.priority.map_or(true, |p| todo.priority == p)
    }

    /// Identifiers break ties in the direction of the last key; they grow
    /// with insertion, so records created in the same millisecond keep
    /// their creation order under `-createdAt`.
    pub fn tie_break_direction(&self) -> SortDirection {
        self.sort
            .last()
            .map_or(SortDirection::Ascending, |key| key.direction)
    }

    pub fn compare(&self, a: &Todo, b: &Todo) -> Ordering {
        self.sort
            .iter()
            .map(|key| key.direction.apply(key.field.compare(a, b)))
            .find(|ordering| ordering.is_ne())
            .unwrap_or_else(|| self.tie_break_direction().apply(a.id.cmp(&b.id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewTodo;

    #[test]
    fn sort_key_prefix_sets_direction() {
        let key: SortKey = "-dueDate".parse().unwrap();
        assert_eq!(key.field, SortField::DueDate);
        assert_eq!(key.direction, SortDirection::Descending);

        let key: SortKey = "priority".parse().unwrap();
        assert_eq!(key.direction, SortDirection::Ascending);
    }

    #[test]
    fn unknown_sort_field_is_rejected() {
        assert_eq!(
            "-owner".parse::<SortKey>().unwrap_err(),
            "Invalid sort field: owner"
        );
    }

    fn todo(title: &str) -> Todo {
        NewTodo {
            title: title.to_string(),
            description: String::new(),
            priority: "medium".to_string(),
            due_date: None,
        }
        .into_todo()
        .unwrap()
    }

    #[test]
    fn same_millisecond_records_keep_creation_order() {
        let first = todo("first");
        let mut second = todo("second");
        second.created_at = first.created_at;

        let newest_first = TodoQuery::default();
        assert_eq!(newest_first.compare(&second, &first), Ordering::Less);

        let oldest_first = TodoQuery {
            sort: vec!["createdAt".parse().unwrap()],
            ..TodoQuery::default()
        };
        assert_eq!(oldest_first.compare(&first, &second), Ordering::Less);
    }

    #[test]
    fn default_query_is_newest_first() {
        let query = TodoQuery::default();
        assert_eq!(query.sort, vec![SortKey::descending(SortField::CreatedAt)]);
        assert!(query.completed.is_none());
        assert!(query.priority.is_none());
    }
}
