//! Structured error types for API responses.

use serde::Serialize;
use std::fmt;

/// Error codes for programmatic error handling.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors
    InvalidFieldValue,

    // Not found errors
    TaskNotFound,
    RoomNotFound,

    // Conflict errors
    DependencyCycle,
    Conflict,

    // Internal errors
    DatabaseError,
    InternalError,
}

/// Structured error returned by the store and the HTTP layer.
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            field: None,
            details: None,
        }
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    // Convenience constructors

    pub fn invalid_value(field: &str, reason: &str) -> Self {
        Self::new(ErrorCode::InvalidFieldValue, reason).with_field(field)
    }

    pub fn task_not_found(task_id: &str) -> Self {
        Self::new(
            ErrorCode::TaskNotFound,
            format!("Task not found: {}", task_id),
        )
    }

    /// Several referenced tasks failed to resolve; all of them are named.
    pub fn tasks_not_found(task_ids: &[String]) -> Self {
        Self::new(
            ErrorCode::TaskNotFound,
            format!("Task not found: {}", task_ids.join(", ")),
        )
    }

    pub fn room_not_found(room_id: &str) -> Self {
        Self::new(
            ErrorCode::RoomNotFound,
            format!("Room not found: {}", room_id),
        )
    }

    pub fn rooms_not_found(room_ids: &[String]) -> Self {
        Self::new(
            ErrorCode::RoomNotFound,
            format!("Room not found: {}", room_ids.join(", ")),
        )
    }

    pub fn dependency_cycle(task_id: &str, depends_on_task_id: &str) -> Self {
        Self::new(
            ErrorCode::DependencyCycle,
            format!(
                "Circular dependency detected: {} -> {} would create a cycle",
                task_id, depends_on_task_id
            ),
        )
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Conflict, message)
    }

    pub fn database(err: impl fmt::Display) -> Self {
        Self::new(ErrorCode::DatabaseError, err.to_string())
    }

    pub fn internal(err: impl fmt::Display) -> Self {
        Self::new(ErrorCode::InternalError, err.to_string())
    }

    /// True for errors caused by the request rather than the server.
    pub fn is_client_error(&self) -> bool {
        !matches!(
            self.code,
            ErrorCode::DatabaseError | ErrorCode::InternalError
        )
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ApiError {}

// Store methods return anyhow::Result; domain errors travel inside it.
impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<ApiError>() {
            Ok(api_err) => api_err,
            Err(err) => match err.downcast::<rusqlite::Error>() {
                Ok(db_err) => ApiError::database(db_err),
                Err(err) => ApiError::internal(err),
            },
        }
    }
}

impl From<crate::graph::GraphError> for ApiError {
    fn from(err: crate::graph::GraphError) -> Self {
        match err {
            crate::graph::GraphError::CycleDetected {
                task_id,
                depends_on_task_id,
            } => ApiError::dependency_cycle(&task_id, &depends_on_task_id),
        }
    }
}

/// Result type for API operations.
pub type ApiResult<T> = std::result::Result<T, ApiError>;
