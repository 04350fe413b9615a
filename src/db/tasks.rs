//! Task CRUD, listing and dashboard queries.

use super::deps::{
    depends_on_internal, missing_task_ids, replace_dependencies_internal, task_exists,
};
use super::rooms::{missing_room_ids, rooms_for_task};
use super::{Database, new_id, now_ms};
use crate::error::ApiError;
use crate::types::{
    LEVEL_MAX, LEVEL_MIN, NewTask, SortOrder, Task, TaskDetails, TaskListQuery, TaskPage,
    TaskSort, TaskStats, TaskStatus, TaskSuggestion, TaskSummary, TaskUpdate,
};
use anyhow::Result;
use rusqlite::types::Value;
use rusqlite::{Connection, Row, params, params_from_iter};
use std::collections::BTreeSet;

/// Longest accepted task title.
pub const TITLE_MAX: usize = 200;
/// Page size used when the caller does not ask for one.
pub const DEFAULT_PAGE_SIZE: i64 = 20;
/// Upper bound on the page size.
pub const MAX_PAGE_SIZE: i64 = 100;
/// Most suggestions returned at once.
pub const MAX_SUGGESTIONS: usize = 3;

const TASK_COLUMNS: &str = "t.id, t.title, t.description, t.priority, t.difficulty, t.status, \
                            t.assigned_user_id, t.created_at, t.updated_at";

/// Build an ORDER BY clause from the sort column and direction.
/// Ties fall back to insertion order so pages are stable.
fn build_order_clause(sort: Option<TaskSort>, order: SortOrder) -> String {
    let direction = match order {
        SortOrder::Asc => "ASC",
        SortOrder::Desc => "DESC",
    };
    match sort {
        Some(TaskSort::Priority) => format!("t.priority {}, t.created_at ASC, t.id ASC", direction),
        Some(TaskSort::Difficulty) => {
            format!("t.difficulty {}, t.created_at ASC, t.id ASC", direction)
        }
        Some(TaskSort::CreatedAt) => format!("t.created_at {0}, t.id {0}", direction),
        None => "t.created_at ASC, t.id ASC".to_string(),
    }
}

fn parse_status(raw: String) -> rusqlite::Result<TaskStatus> {
    TaskStatus::from_str(&raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            0,
            rusqlite::types::Type::Text,
            format!("unknown task status: {}", raw).into(),
        )
    })
}

/// Parse a task row without its rooms.
pub fn parse_task_row(row: &Row) -> rusqlite::Result<Task> {
    Ok(Task {
        id: row.get("id")?,
        title: row.get("title")?,
        description: row.get("description")?,
        priority: row.get("priority")?,
        difficulty: row.get("difficulty")?,
        status: parse_status(row.get("status")?)?,
        assigned_user_id: row.get("assigned_user_id")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
        rooms: Vec::new(),
    })
}

fn parse_summary_row(row: &Row) -> rusqlite::Result<TaskSummary> {
    Ok(TaskSummary {
        id: row.get("id")?,
        title: row.get("title")?,
        status: parse_status(row.get("status")?)?,
        priority: row.get("priority")?,
        difficulty: row.get("difficulty")?,
    })
}

fn validate_title(title: &str) -> Result<()> {
    if title.trim().is_empty() {
        return Err(ApiError::invalid_value("title", "title must not be empty").into());
    }
    if title.chars().count() > TITLE_MAX {
        return Err(ApiError::invalid_value(
            "title",
            &format!("title must be at most {} characters", TITLE_MAX),
        )
        .into());
    }
    Ok(())
}

fn validate_level(field: &str, value: i32) -> Result<()> {
    if !(LEVEL_MIN..=LEVEL_MAX).contains(&value) {
        return Err(ApiError::invalid_value(
            field,
            &format!("{} must be between {} and {}", field, LEVEL_MIN, LEVEL_MAX),
        )
        .into());
    }
    Ok(())
}

fn id_set(ids: &[String]) -> BTreeSet<String> {
    ids.iter().cloned().collect()
}

fn ensure_rooms_exist(conn: &Connection, room_ids: &BTreeSet<String>) -> Result<()> {
    let missing = missing_room_ids(conn, room_ids)?;
    if !missing.is_empty() {
        return Err(ApiError::rooms_not_found(&missing).into());
    }
    Ok(())
}

fn ensure_tasks_exist(conn: &Connection, task_ids: &BTreeSet<String>) -> Result<()> {
    let missing = missing_task_ids(conn, task_ids)?;
    if !missing.is_empty() {
        return Err(ApiError::tasks_not_found(&missing).into());
    }
    Ok(())
}

fn replace_rooms(conn: &Connection, task_id: &str, room_ids: &BTreeSet<String>) -> Result<()> {
    conn.execute("DELETE FROM task_rooms WHERE task_id = ?1", params![task_id])?;
    for room_id in room_ids {
        conn.execute(
            "INSERT INTO task_rooms (task_id, room_id) VALUES (?1, ?2)",
            params![task_id, room_id],
        )?;
    }
    Ok(())
}

/// Internal helper to get a task using an existing connection (avoids deadlock).
fn get_task_internal(conn: &Connection, task_id: &str) -> Result<Option<Task>> {
    let sql = format!("SELECT {} FROM tasks t WHERE t.id = ?1", TASK_COLUMNS);
    let result = conn.query_row(&sql, params![task_id], parse_task_row);

    match result {
        Ok(mut task) => {
            task.rooms = rooms_for_task(conn, task_id)?;
            Ok(Some(task))
        }
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub(crate) fn get_task_summary_internal(
    conn: &Connection,
    task_id: &str,
) -> Result<Option<TaskSummary>> {
    let result = conn.query_row(
        "SELECT id, title, status, priority, difficulty FROM tasks WHERE id = ?1",
        params![task_id],
        parse_summary_row,
    );
    match result {
        Ok(summary) => Ok(Some(summary)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Every task as a summary, in insertion order.
pub(crate) fn list_task_summaries_internal(conn: &Connection) -> Result<Vec<TaskSummary>> {
    let mut stmt = conn.prepare(
        "SELECT id, title, status, priority, difficulty FROM tasks ORDER BY created_at, id",
    )?;
    let tasks = stmt
        .query_map([], parse_summary_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(tasks)
}

fn attach_rooms(conn: &Connection, tasks: &mut [Task]) -> Result<()> {
    for task in tasks.iter_mut() {
        task.rooms = rooms_for_task(conn, &task.id)?;
    }
    Ok(())
}

impl Database {
    /// Create a task with optional room and dependency references.
    ///
    /// Every referenced id must resolve; otherwise nothing is written and the
    /// error names the ids that did not.
    pub fn create_task(&self, input: NewTask) -> Result<Task> {
        validate_title(&input.title)?;
        validate_level("priority", input.priority)?;
        validate_level("difficulty", input.difficulty)?;

        let room_ids = id_set(input.room_ids.as_deref().unwrap_or_default());
        let dependency_ids = id_set(input.dependency_ids.as_deref().unwrap_or_default());
        let task_id = new_id();
        let now = now_ms();
        let status = input.status.unwrap_or_default();

        let task = self.with_tx(|tx| {
            ensure_rooms_exist(tx, &room_ids)?;
            ensure_tasks_exist(tx, &dependency_ids)?;
            if dependency_ids.contains(&task_id) {
                return Err(ApiError::dependency_cycle(&task_id, &task_id).into());
            }

            tx.execute(
                "INSERT INTO tasks (
                    id, title, description, priority, difficulty, status,
                    assigned_user_id, created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    &task_id,
                    &input.title,
                    &input.description,
                    input.priority,
                    input.difficulty,
                    status.as_str(),
                    input.assigned_user_id,
                    now,
                    now,
                ],
            )?;

            replace_rooms(tx, &task_id, &room_ids)?;

            // A fresh task has no dependents, so its new edges cannot close a loop.
            for dep in &dependency_ids {
                tx.execute(
                    "INSERT INTO task_dependencies (task_id, depends_on_task_id) VALUES (?1, ?2)",
                    params![&task_id, dep],
                )?;
            }

            get_task_internal(tx, &task_id)?
                .ok_or_else(|| anyhow::Error::from(ApiError::internal("task vanished after insert")))
        })?;

        tracing::info!(
            task_id = %task.id,
            rooms = room_ids.len(),
            dependencies = dependency_ids.len(),
            "Created task"
        );
        Ok(task)
    }

    /// Get a task with its rooms and direct dependencies.
    pub fn get_task(&self, task_id: &str) -> Result<Option<TaskDetails>> {
        self.with_conn(|conn| {
            let Some(task) = get_task_internal(conn, task_id)? else {
                return Ok(None);
            };
            let dependencies = depends_on_internal(conn, task_id)?;
            Ok(Some(TaskDetails { task, dependencies }))
        })
    }

    /// Apply a partial update.
    ///
    /// `room_ids` and `dependency_ids` replace the stored sets when present,
    /// including when empty. The dependency replacement is validated against
    /// the final graph before anything is written.
    pub fn update_task(&self, task_id: &str, update: TaskUpdate) -> Result<Task> {
        if let Some(ref title) = update.title {
            validate_title(title)?;
        }
        if let Some(priority) = update.priority {
            validate_level("priority", priority)?;
        }
        if let Some(difficulty) = update.difficulty {
            validate_level("difficulty", difficulty)?;
        }

        let now = now_ms();

        let task = self.with_tx(|tx| {
            let Some(mut task) = get_task_internal(tx, task_id)? else {
                return Err(ApiError::task_not_found(task_id).into());
            };

            if let Some(title) = update.title {
                task.title = title;
            }
            if let Some(description) = update.description {
                task.description = description;
            }
            if let Some(priority) = update.priority {
                task.priority = priority;
            }
            if let Some(difficulty) = update.difficulty {
                task.difficulty = difficulty;
            }
            if let Some(status) = update.status {
                task.status = status;
            }
            if let Some(assigned_user_id) = update.assigned_user_id {
                task.assigned_user_id = assigned_user_id;
            }

            if let Some(ref room_ids) = update.room_ids {
                let room_ids = id_set(room_ids);
                ensure_rooms_exist(tx, &room_ids)?;
                replace_rooms(tx, task_id, &room_ids)?;
            }

            if let Some(ref dependency_ids) = update.dependency_ids {
                let dependency_ids = id_set(dependency_ids);
                ensure_tasks_exist(tx, &dependency_ids)?;
                replace_dependencies_internal(tx, task_id, &dependency_ids)?;
            }

            tx.execute(
                "UPDATE tasks SET
                    title = ?1, description = ?2, priority = ?3, difficulty = ?4,
                    status = ?5, assigned_user_id = ?6, updated_at = ?7
                 WHERE id = ?8",
                params![
                    &task.title,
                    &task.description,
                    task.priority,
                    task.difficulty,
                    task.status.as_str(),
                    task.assigned_user_id,
                    now,
                    task_id,
                ],
            )?;

            task.updated_at = now;
            task.rooms = rooms_for_task(tx, task_id)?;
            Ok(task)
        })?;

        tracing::info!(task_id, "Updated task");
        Ok(task)
    }

    /// Delete a task with every edge touching it and its room associations.
    pub fn delete_task(&self, task_id: &str) -> Result<()> {
        self.with_tx(|tx| {
            if !task_exists(tx, task_id)? {
                return Err(ApiError::task_not_found(task_id).into());
            }
            let edges = tx.execute(
                "DELETE FROM task_dependencies WHERE task_id = ?1 OR depends_on_task_id = ?1",
                params![task_id],
            )?;
            tx.execute("DELETE FROM task_rooms WHERE task_id = ?1", params![task_id])?;
            tx.execute("DELETE FROM tasks WHERE id = ?1", params![task_id])?;
            tracing::info!(task_id, edges, "Deleted task");
            Ok(())
        })
    }

    /// List tasks with filters, sorting and pagination.
    pub fn list_tasks(&self, query: &TaskListQuery) -> Result<TaskPage> {
        let page = query.page.unwrap_or(1);
        if page < 1 {
            return Err(ApiError::invalid_value("page", "page must be at least 1").into());
        }
        let page_size = query.page_size.unwrap_or(DEFAULT_PAGE_SIZE);
        if !(1..=MAX_PAGE_SIZE).contains(&page_size) {
            return Err(ApiError::invalid_value(
                "page_size",
                &format!("page_size must be between 1 and {}", MAX_PAGE_SIZE),
            )
            .into());
        }
        let offset = (page - 1)
            .checked_mul(page_size)
            .ok_or_else(|| anyhow::Error::from(ApiError::invalid_value("page", "page is out of range")))?;

        let mut conditions: Vec<&str> = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        if let Some(ref room_id) = query.room_id {
            conditions.push(
                "EXISTS (SELECT 1 FROM task_rooms tr WHERE tr.task_id = t.id AND tr.room_id = ?)",
            );
            values.push(Value::Text(room_id.clone()));
        }
        if let Some(user_id) = query.assigned_user_id {
            conditions.push("t.assigned_user_id = ?");
            values.push(Value::Integer(user_id));
        }
        if let Some(priority) = query.priority {
            conditions.push("t.priority = ?");
            values.push(Value::Integer(priority.into()));
        }
        if let Some(difficulty) = query.difficulty {
            conditions.push("t.difficulty = ?");
            values.push(Value::Integer(difficulty.into()));
        }
        if let Some(status) = query.status {
            conditions.push("t.status = ?");
            values.push(Value::Text(status.as_str().to_string()));
        }
        match query.blocked {
            Some(true) => conditions.push("t.status = 'blocked'"),
            Some(false) => conditions.push("t.status != 'blocked'"),
            None => {}
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };
        let order_clause = build_order_clause(query.sort, query.order);

        self.with_conn(|conn| {
            let total: i64 = conn.query_row(
                &format!("SELECT COUNT(*) FROM tasks t {}", where_clause),
                params_from_iter(values.iter()),
                |row| row.get(0),
            )?;

            let sql = format!(
                "SELECT {} FROM tasks t {} ORDER BY {} LIMIT ? OFFSET ?",
                TASK_COLUMNS, where_clause, order_clause
            );
            let mut paged = values.clone();
            paged.push(Value::Integer(page_size));
            paged.push(Value::Integer(offset));

            let mut stmt = conn.prepare(&sql)?;
            let mut items = stmt
                .query_map(params_from_iter(paged.iter()), parse_task_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            attach_rooms(conn, &mut items)?;

            Ok(TaskPage {
                items,
                page,
                page_size,
                total,
            })
        })
    }

    /// Highest-priority open tasks, oldest first within a priority.
    pub fn get_suggestions(&self, limit: usize) -> Result<Vec<TaskSuggestion>> {
        let limit = limit.min(MAX_SUGGESTIONS);
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM tasks t
                 WHERE t.status != 'done'
                 ORDER BY t.priority DESC, t.created_at ASC, t.id ASC
                 LIMIT ?1",
                TASK_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let mut tasks = stmt
                .query_map(params![limit as i64], parse_task_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            attach_rooms(conn, &mut tasks)?;

            Ok(tasks
                .into_iter()
                .map(|task| TaskSuggestion {
                    task,
                    reason: "Highest priority in queue".to_string(),
                })
                .collect())
        })
    }

    /// Quick status change from the dashboard. Only `done` is accepted.
    pub fn set_task_status(&self, task_id: &str, status: TaskStatus) -> Result<Task> {
        if status != TaskStatus::Done {
            return Err(
                ApiError::invalid_value("status", "Only 'done' status is supported").into(),
            );
        }
        let now = now_ms();
        self.with_tx(|tx| {
            let updated = tx.execute(
                "UPDATE tasks SET status = ?1, updated_at = ?2 WHERE id = ?3",
                params![status.as_str(), now, task_id],
            )?;
            if updated == 0 {
                return Err(ApiError::task_not_found(task_id).into());
            }
            get_task_internal(tx, task_id)?
                .ok_or_else(|| anyhow::Error::from(ApiError::task_not_found(task_id)))
        })
    }

    /// Open, blocked and completed counts.
    pub fn get_task_stats(&self) -> Result<TaskStats> {
        self.with_conn(|conn| {
            let stats = conn.query_row(
                "SELECT
                    COALESCE(SUM(CASE WHEN status != 'done' THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN status = 'blocked' THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN status = 'done' THEN 1 ELSE 0 END), 0)
                 FROM tasks",
                [],
                |row| {
                    Ok(TaskStats {
                        open: row.get(0)?,
                        blocked: row.get(1)?,
                        completed: row.get(2)?,
                    })
                },
            )?;
            Ok(stats)
        })
    }
}
