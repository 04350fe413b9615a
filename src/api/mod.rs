//! HTTP API.
//!
//! Handlers are thin: they pull ids and bodies out of the request, run the
//! blocking store call on the blocking pool, and invalidate cached reads
//! after every successful mutation.

pub mod rooms;
pub mod server;
pub mod tasks;

use crate::cache::{MutationKind, ResponseCache};
use crate::config::Config;
use crate::db::Database;
use crate::error::{ApiError, ApiResult, ErrorCode};
use axum::extract::FromRequestParts;
use axum::http::StatusCode;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;
use serde_json::Value;
use std::convert::Infallible;
use std::sync::Arc;

pub use server::{ServerHandle, build_router, start_server};

/// Header carrying the caller identity verified upstream.
pub const USER_HEADER: &str = "x-user-id";

/// State shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub cache: Arc<ResponseCache>,
    /// Default and maximum task page size.
    pub page_limits: (i64, i64),
}

impl AppState {
    pub fn new(db: Arc<Database>, config: &Config) -> Self {
        let cache = if config.cache.enabled {
            ResponseCache::new(config.cache.ttl())
        } else {
            ResponseCache::disabled()
        };
        Self {
            db,
            cache: Arc::new(cache),
            page_limits: config.page_limits(),
        }
    }

    /// Best-effort cache invalidation after a committed mutation.
    pub fn invalidate(&self, kinds: &[MutationKind]) {
        for kind in kinds {
            let removed = self.cache.invalidate(*kind);
            tracing::trace!(?kind, removed, "Invalidated cached responses");
        }
    }
}

/// Caller identity as forwarded by the identity provider. Not verified here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Caller(pub Option<String>);

impl Caller {
    pub fn as_str(&self) -> &str {
        self.0.as_deref().unwrap_or("anonymous")
    }
}

impl<S: Send + Sync> FromRequestParts<S> for Caller {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Caller(
            parts
                .headers
                .get(USER_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
        ))
    }
}

impl ErrorCode {
    /// HTTP status for this error code.
    pub fn status(&self) -> StatusCode {
        match self {
            ErrorCode::InvalidFieldValue | ErrorCode::DependencyCycle => StatusCode::BAD_REQUEST,
            ErrorCode::TaskNotFound | ErrorCode::RoomNotFound => StatusCode::NOT_FOUND,
            ErrorCode::Conflict => StatusCode::CONFLICT,
            ErrorCode::DatabaseError | ErrorCode::InternalError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.code.status();
        if self.is_client_error() {
            tracing::debug!(code = ?self.code, message = %self.message, "Request rejected");
        } else {
            tracing::error!(code = ?self.code, message = %self.message, "Request failed");
        }
        (status, Json(self)).into_response()
    }
}

/// Run a blocking store call off the async runtime.
pub(crate) async fn run_blocking<F, T>(state: &AppState, f: F) -> ApiResult<T>
where
    F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let db = Arc::clone(&state.db);
    tokio::task::spawn_blocking(move || f(&db))
        .await
        .map_err(ApiError::internal)?
        .map_err(ApiError::from)
}

/// Serve from the response cache, loading and storing on a miss.
pub(crate) async fn cached_json<F, T>(
    state: &AppState,
    namespace: &'static str,
    key: String,
    load: F,
) -> ApiResult<Json<Value>>
where
    F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
    T: Serialize + Send + 'static,
{
    if let Some(hit) = state.cache.get(namespace, &key) {
        tracing::trace!(namespace, key = %key, "Cache hit");
        return Ok(Json(hit));
    }
    let value = run_blocking(state, load).await?;
    let json = serde_json::to_value(&value).map_err(ApiError::internal)?;
    state.cache.put(namespace, &key, json.clone());
    Ok(Json(json))
}
