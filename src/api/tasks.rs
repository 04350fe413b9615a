//! Task and dependency endpoints.

use super::{AppState, Caller, cached_json, run_blocking};
use crate::cache::{MutationKind, NS_STATS, NS_TASK, NS_TASK_LIST};
use crate::db::tasks::MAX_SUGGESTIONS;
use crate::error::{ApiError, ApiResult};
use crate::types::{NewTask, Task, TaskListQuery, TaskStatus, TaskUpdate};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Request body for adding a dependency.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddDependencyRequest {
    pub depends_on_task_id: String,
}

/// Response body for adding a dependency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddDependencyResponse {
    pub task_id: String,
    pub depends_on_task_id: String,
    /// `false` when the edge already existed.
    pub created: bool,
}

/// Request body for the quick status update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: TaskStatus,
}

/// `GET /api/tasks`
pub async fn list_tasks(
    State(state): State<AppState>,
    Query(mut query): Query<TaskListQuery>,
) -> ApiResult<Json<Value>> {
    let (default_size, max_size) = state.page_limits;
    let page_size = query.page_size.unwrap_or(default_size);
    if page_size > max_size {
        return Err(ApiError::invalid_value(
            "page_size",
            &format!("page_size must be at most {}", max_size),
        ));
    }
    query.page_size = Some(page_size);

    let key = serde_json::to_string(&query).map_err(ApiError::internal)?;
    cached_json(&state, NS_TASK_LIST, key, move |db| db.list_tasks(&query)).await
}

/// `POST /api/tasks`
pub async fn create_task(
    State(state): State<AppState>,
    caller: Caller,
    Json(input): Json<NewTask>,
) -> ApiResult<(StatusCode, Json<Task>)> {
    let task = run_blocking(&state, move |db| db.create_task(input)).await?;
    tracing::info!(caller = caller.as_str(), task_id = %task.id, "Task created via API");
    state.invalidate(&[MutationKind::TaskChanged, MutationKind::DependencyChanged]);
    Ok((StatusCode::CREATED, Json(task)))
}

/// `GET /api/tasks/suggestions`
pub async fn get_suggestions(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    cached_json(&state, NS_STATS, "suggestions".to_string(), |db| {
        db.get_suggestions(MAX_SUGGESTIONS)
    })
    .await
}

/// `GET /api/tasks/stats`
pub async fn get_stats(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    cached_json(&state, NS_STATS, "summary".to_string(), |db| db.get_task_stats()).await
}

/// `GET /api/tasks/{id}`
pub async fn get_task(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let key = format!("details:{}", task_id);
    cached_json(&state, NS_TASK, key, move |db| {
        db.get_task(&task_id)?
            .ok_or_else(|| anyhow::Error::from(ApiError::task_not_found(&task_id)))
    })
    .await
}

/// `PUT /api/tasks/{id}`
pub async fn update_task(
    State(state): State<AppState>,
    caller: Caller,
    Path(task_id): Path<String>,
    Json(update): Json<TaskUpdate>,
) -> ApiResult<Json<Task>> {
    let touches_graph = update.dependency_ids.is_some();
    let task = run_blocking(&state, move |db| db.update_task(&task_id, update)).await?;
    tracing::info!(caller = caller.as_str(), task_id = %task.id, "Task updated via API");

    if touches_graph {
        state.invalidate(&[MutationKind::TaskChanged, MutationKind::DependencyChanged]);
    } else {
        state.invalidate(&[MutationKind::TaskChanged]);
    }
    Ok(Json(task))
}

/// `DELETE /api/tasks/{id}`
pub async fn delete_task(
    State(state): State<AppState>,
    caller: Caller,
    Path(task_id): Path<String>,
) -> ApiResult<StatusCode> {
    let id = task_id.clone();
    run_blocking(&state, move |db| db.delete_task(&id)).await?;
    tracing::info!(caller = caller.as_str(), task_id = %task_id, "Task deleted via API");
    state.invalidate(&[MutationKind::TaskChanged, MutationKind::DependencyChanged]);
    Ok(StatusCode::NO_CONTENT)
}

/// `PATCH /api/tasks/{id}/status`
pub async fn update_task_status(
    State(state): State<AppState>,
    caller: Caller,
    Path(task_id): Path<String>,
    Json(request): Json<UpdateStatusRequest>,
) -> ApiResult<Json<Task>> {
    let task = run_blocking(&state, move |db| db.set_task_status(&task_id, request.status))
        .await?;
    tracing::info!(caller = caller.as_str(), task_id = %task.id, "Task marked done via API");
    state.invalidate(&[MutationKind::TaskChanged]);
    Ok(Json(task))
}

/// `GET /api/tasks/{id}/available-dependencies`
pub async fn get_available_dependencies(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let key = format!("available:{}", task_id);
    cached_json(&state, NS_TASK, key, move |db| {
        db.get_available_dependencies(&task_id)
    })
    .await
}

/// `POST /api/tasks/{id}/dependencies`
pub async fn add_dependency(
    State(state): State<AppState>,
    caller: Caller,
    Path(task_id): Path<String>,
    Json(request): Json<AddDependencyRequest>,
) -> ApiResult<(StatusCode, Json<AddDependencyResponse>)> {
    let (id, dep) = (task_id.clone(), request.depends_on_task_id.clone());
    let created = run_blocking(&state, move |db| db.add_dependency(&id, &dep)).await?;
    tracing::info!(
        caller = caller.as_str(),
        task_id = %task_id,
        depends_on_task_id = %request.depends_on_task_id,
        created,
        "Dependency added via API"
    );
    if created {
        state.invalidate(&[MutationKind::DependencyChanged]);
    }
    Ok((
        StatusCode::CREATED,
        Json(AddDependencyResponse {
            task_id,
            depends_on_task_id: request.depends_on_task_id,
            created,
        }),
    ))
}

/// `DELETE /api/tasks/{id}/dependencies/{dep_id}`
pub async fn remove_dependency(
    State(state): State<AppState>,
    caller: Caller,
    Path((task_id, depends_on_task_id)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    let (id, dep) = (task_id.clone(), depends_on_task_id.clone());
    let removed = run_blocking(&state, move |db| db.remove_dependency(&id, &dep)).await?;
    if removed {
        tracing::info!(
            caller = caller.as_str(),
            task_id = %task_id,
            depends_on_task_id = %depends_on_task_id,
            "Dependency removed via API"
        );
        state.invalidate(&[MutationKind::DependencyChanged]);
    }
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /api/tasks/{id}/dependency-graph`
pub async fn get_dependency_graph(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let key = format!("graph:{}", task_id);
    cached_json(&state, NS_TASK, key, move |db| db.get_dependency_graph(&task_id)).await
}

/// `GET /api/tasks/{id}/blockers`
pub async fn get_blockers(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let key = format!("blockers:{}", task_id);
    cached_json(&state, NS_TASK, key, move |db| db.get_transitive_blockers(&task_id)).await
}
