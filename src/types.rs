//! Core types for the household task service.

use serde::{Deserialize, Deserializer, Serialize};

/// Lowest accepted priority/difficulty level.
pub const LEVEL_MIN: i32 = 1;
/// Highest accepted priority/difficulty level.
pub const LEVEL_MAX: i32 = 5;

/// Lifecycle status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    NotStarted,
    InProgress,
    Blocked,
    Done,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::NotStarted => "not_started",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Blocked => "blocked",
            TaskStatus::Done => "done",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "not_started" => Some(TaskStatus::NotStarted),
            "in_progress" => Some(TaskStatus::InProgress),
            "blocked" => Some(TaskStatus::Blocked),
            "done" => Some(TaskStatus::Done),
            _ => None,
        }
    }
}

/// A room tasks can be associated with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: String,
    pub name: String,
    pub color: Option<String>,
    pub floor: Option<String>,
}

/// Aggregated task counts for one room.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomStats {
    pub total_tasks: i64,
    pub completed: i64,
    pub in_progress: i64,
    pub blocked: i64,
}

/// Room with metadata and task statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomDetails {
    #[serde(flatten)]
    pub room: Room,
    pub created_at: i64,
    pub stats: RoomStats,
}

/// A household task.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub priority: i32,
    pub difficulty: i32,
    pub status: TaskStatus,
    pub assigned_user_id: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
    #[serde(default)]
    pub rooms: Vec<Room>,
}

/// Compact task representation used in graph views.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSummary {
    pub id: String,
    pub title: String,
    pub status: TaskStatus,
    pub priority: i32,
    pub difficulty: i32,
}

impl From<&Task> for TaskSummary {
    fn from(task: &Task) -> Self {
        Self {
            id: task.id.clone(),
            title: task.title.clone(),
            status: task.status,
            priority: task.priority,
            difficulty: task.difficulty,
        }
    }
}

/// A task with its direct dependencies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDetails {
    #[serde(flatten)]
    pub task: Task,
    pub dependencies: Vec<TaskSummary>,
}

/// One depends-on edge: `task_id` is not unblocked until `depends_on_task_id` is done.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Dependency {
    pub task_id: String,
    pub depends_on_task_id: String,
}

impl Dependency {
    pub fn new(task_id: impl Into<String>, depends_on_task_id: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            depends_on_task_id: depends_on_task_id.into(),
        }
    }
}

/// Direct neighbours of a task in both directions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDependencyGraph {
    pub depends_on: Vec<TaskSummary>,
    pub depended_by: Vec<TaskSummary>,
}

/// Dashboard counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStats {
    pub open: i64,
    pub blocked: i64,
    pub completed: i64,
}

/// A recommended task with the reason it was picked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSuggestion {
    #[serde(flatten)]
    pub task: Task,
    pub reason: String,
}

/// One page of tasks.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPage {
    pub items: Vec<Task>,
    pub page: i64,
    pub page_size: i64,
    pub total: i64,
}

/// Input for creating a task.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub priority: i32,
    pub difficulty: i32,
    pub assigned_user_id: Option<i64>,
    pub status: Option<TaskStatus>,
    pub room_ids: Option<Vec<String>>,
    pub dependency_ids: Option<Vec<String>>,
}

/// Deserialize a field that distinguishes "absent" from an explicit `null`.
fn clearable<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Partial task update. `None` leaves a field untouched; `room_ids` and
/// `dependency_ids` replace the previous sets when present.
///
/// `description` and `assigned_user_id` are clearable: `Some(None)` (JSON
/// `null`) stores NULL.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskUpdate {
    pub title: Option<String>,
    #[serde(default, deserialize_with = "clearable", skip_serializing_if = "Option::is_none")]
    pub description: Option<Option<String>>,
    pub priority: Option<i32>,
    pub difficulty: Option<i32>,
    #[serde(default, deserialize_with = "clearable", skip_serializing_if = "Option::is_none")]
    pub assigned_user_id: Option<Option<i64>>,
    pub status: Option<TaskStatus>,
    pub room_ids: Option<Vec<String>>,
    pub dependency_ids: Option<Vec<String>>,
}

/// Input for creating a room.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewRoom {
    pub name: String,
    pub color: Option<String>,
    pub floor: Option<String>,
}

/// Partial room update.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoomUpdate {
    pub name: Option<String>,
    pub color: Option<String>,
    pub floor: Option<String>,
}

/// Sortable task columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskSort {
    Priority,
    Difficulty,
    CreatedAt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

/// Filters, sorting and pagination for task listing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskListQuery {
    pub room_id: Option<String>,
    pub assigned_user_id: Option<i64>,
    pub priority: Option<i32>,
    pub difficulty: Option<i32>,
    pub status: Option<TaskStatus>,
    /// `true` keeps only blocked tasks, `false` drops them.
    pub blocked: Option<bool>,
    pub sort: Option<TaskSort>,
    pub order: SortOrder,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}
