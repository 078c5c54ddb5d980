use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::{Validate, ValidationError, ValidationErrors};

pub const MAX_TITLE_LEN: usize = 255;
pub const MAX_DESCRIPTION_LEN: usize = 10_000;
pub const MAX_CATEGORY_LEN: usize = 100;

/// Page size used when the caller does not ask for one.
pub const DEFAULT_PAGE_SIZE: u32 = 50;
/// Larger page sizes are clamped down to this.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Represents the priority of a task.
/// Corresponds to the `task_priority` SQL enum.
#[derive(Debug, Default, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "task_priority", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    /// Low priority.
    Low,
    /// Medium priority.
    #[default]
    Medium,
    /// High priority.
    High,
}

/// Input structure for creating a task.
/// Contains validation rules for its fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct TaskInput {
    /// The title of the task.
    /// Must be between 1 and 255 characters and not only whitespace.
    #[validate(length(min = 1, max = 255), custom = "validate_not_blank")]
    pub title: String,

    /// An optional description for the task.
    #[validate(length(max = 10000))]
    pub description: Option<String>,

    /// Defaults to `medium` when omitted.
    pub priority: Option<TaskPriority>,

    /// Optional due date for the task.
    pub due_date: Option<DateTime<Utc>>,

    /// Optional list/category the task is filed under.
    #[validate(length(max = 100))]
    pub category: Option<String>,

    /// Optional manual ordering hint.
    pub position: Option<i32>,
}

/// Partial update for a task.
///
/// Each field is a mask entry: `None` leaves the stored value alone. For nullable
/// columns, `Some(None)` clears the value and `Some(Some(v))` sets it. In JSON an
/// absent key means "leave alone" and an explicit `null` means "clear". The title
/// cannot be cleared, so `"title": null` arrives as `Some(None)` and fails validation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskPatch {
    #[serde(default, deserialize_with = "deserialize_some")]
    pub title: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub description: Option<Option<String>>,
    #[serde(default)]
    pub completed: Option<bool>,
    #[serde(default)]
    pub priority: Option<TaskPriority>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub due_date: Option<Option<DateTime<Utc>>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub category: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub position: Option<Option<i32>>,
}

/// Wraps whatever is present, so `null` becomes `Some(None)` rather than `None`.
fn deserialize_some<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    T::deserialize(deserializer).map(Some)
}

impl TaskPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.completed.is_none()
            && self.priority.is_none()
            && self.due_date.is_none()
            && self.category.is_none()
            && self.position.is_none()
    }
}

impl Validate for TaskPatch {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        match &self.title {
            Some(None) => errors.add("title", ValidationError::new("required")),
            Some(Some(title)) => {
                if let Err(err) = check_length(title, 1, MAX_TITLE_LEN) {
                    errors.add("title", err);
                } else if let Err(err) = validate_not_blank(title) {
                    errors.add("title", err);
                }
            }
            None => {}
        }
        if let Some(Some(description)) = &self.description {
            if let Err(err) = check_length(description, 0, MAX_DESCRIPTION_LEN) {
                errors.add("description", err);
            }
        }
        if let Some(Some(category)) = &self.category {
            if let Err(err) = check_length(category, 0, MAX_CATEGORY_LEN) {
                errors.add("category", err);
            }
        }

        if errors.errors().is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank"));
    }
    Ok(())
}

fn check_length(value: &str, min: usize, max: usize) -> Result<(), ValidationError> {
    let len = value.chars().count();
    if len < min || len > max {
        let mut err = ValidationError::new("length");
        err.add_param("min".into(), &min);
        err.add_param("max".into(), &max);
        return Err(err);
    }
    Ok(())
}

/// Represents a task entity as stored in the database and returned by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Task {
    /// Unique identifier for the task (UUID v4).
    pub id: Uuid,
    /// Identifier of the user who owns the task.
    pub user_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub completed: bool,
    pub priority: TaskPriority,
    pub due_date: Option<DateTime<Utc>>,
    pub category: Option<String>,
    pub position: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Set when the task was last marked completed.
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Creates a new, not yet completed `Task` owned by `owner`.
    pub fn new(input: TaskInput, owner: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: owner,
            title: input.title,
            description: input.description,
            completed: false,
            priority: input.priority.unwrap_or_default(),
            due_date: input.due_date,
            category: input.category,
            position: input.position,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    /// Applies the fields present in `patch` and refreshes `updated_at`.
    ///
    /// A `"title": null` entry is ignored here; validation rejects it first.
    pub fn apply(&mut self, patch: &TaskPatch, now: DateTime<Utc>) {
        if let Some(Some(title)) = &patch.title {
            self.title = title.clone();
        }
        if let Some(description) = &patch.description {
            self.description = description.clone();
        }
        if let Some(priority) = patch.priority {
            self.priority = priority;
        }
        if let Some(due_date) = patch.due_date {
            self.due_date = due_date;
        }
        if let Some(category) = &patch.category {
            self.category = category.clone();
        }
        if let Some(position) = patch.position {
            self.position = position;
        }
        if let Some(completed) = patch.completed {
            match (self.completed, completed) {
                (false, true) => self.completed_at = Some(now),
                (true, false) => self.completed_at = None,
                _ => {}
            }
            self.completed = completed;
        }
        self.updated_at = now;
    }
}

/// Query parameters accepted when listing tasks.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct TaskQuery {
    /// Only tasks with this completion state.
    pub completed: Option<bool>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl TaskQuery {
    pub fn filter(&self) -> TaskFilter {
        TaskFilter {
            completed: self.completed,
        }
    }

    pub fn page(&self) -> Page {
        Page::new(self.limit, self.offset)
    }
}

/// Row filter applied on top of the owner predicate.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TaskFilter {
    pub completed: Option<bool>,
}

impl TaskFilter {
    pub fn matches(&self, task: &Task) -> bool {
        self.completed.map_or(true, |completed| task.completed == completed)
    }
}

/// A limit/offset window over an ordered listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: i64,
    pub offset: i64,
}

impl Page {
    /// Builds a page from caller input, clamping the limit into `1..=MAX_PAGE_SIZE`.
    pub fn new(limit: Option<u32>, offset: Option<u32>) -> Self {
        let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        Self {
            limit: i64::from(limit),
            offset: i64::from(offset.unwrap_or(0)),
        }
    }

    /// Every row. Only for internal callers; request input always goes through [`Page::new`].
    pub fn unbounded() -> Self {
        Self {
            limit: i64::MAX,
            offset: 0,
        }
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// Response body for a task listing.
#[derive(Debug, Serialize, Deserialize)]
pub struct TaskList {
    pub tasks: Vec<Task>,
    /// Count of all matching tasks, ignoring the page window.
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStats {
    pub total: i64,
    pub completed: i64,
    pub pending: i64,
}
