//! Route handlers
//!
//! Each handler validates its input, runs the use case on a blocking
//! thread (engine calls block on socket I/O) and maps the outcome to a
//! status code.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::value::RawValue;

use crate::network::Session;
use crate::protocol::Record;
use crate::repository::RepositoryError;
use crate::service::{validate_key, validate_value, InvalidInput, KvService};

use super::dto::{CreateRequest, ErrorResponse, RecordResponse, UpdateRequest, WriteResponse};

/// Everything a handler can fail with
#[derive(Debug)]
pub enum ApiError {
    /// Malformed client input
    BadRequest(InvalidInput),

    /// Repository outcome other than success
    Repository {
        op: &'static str,
        key: String,
        source: RepositoryError,
    },

    /// Failure inside the gateway itself
    Internal(String),
}

fn error_body(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(reason) => {
                error_body(StatusCode::BAD_REQUEST, reason.to_string())
            }
            ApiError::Repository { source, .. } if matches!(source, RepositoryError::NotFound) => {
                error_body(StatusCode::NOT_FOUND, source.to_string())
            }
            ApiError::Repository { source, .. }
                if matches!(source, RepositoryError::AlreadyExists) =>
            {
                error_body(StatusCode::CONFLICT, source.to_string())
            }
            ApiError::Repository { op, key, source } => {
                tracing::warn!(key = %key, error = %source, "Storage failed to {} data", op);
                error_body(StatusCode::INTERNAL_SERVER_ERROR, "500 Internal server error")
            }
            ApiError::Internal(reason) => {
                tracing::error!("Internal error: {}", reason);
                error_body(StatusCode::INTERNAL_SERVER_ERROR, "500 Internal server error")
            }
        }
    }
}

impl From<InvalidInput> for ApiError {
    fn from(reason: InvalidInput) -> Self {
        ApiError::BadRequest(reason)
    }
}

/// Run a use case on the blocking pool
async fn run_blocking<S, F>(
    service: Arc<KvService<S>>,
    op: &'static str,
    key: String,
    f: F,
) -> Result<Record, ApiError>
where
    S: Session + 'static,
    F: FnOnce(&KvService<S>, &str) -> Result<Record, RepositoryError> + Send + 'static,
{
    let task_key = key.clone();
    match tokio::task::spawn_blocking(move || f(&service, &task_key)).await {
        Ok(Ok(record)) => Ok(record),
        Ok(Err(source)) => Err(ApiError::Repository { op, key, source }),
        Err(e) => Err(ApiError::Internal(format!("{} task failed: {}", op, e))),
    }
}

/// Stored bytes back to JSON; anything not valid JSON is an internal error
fn stored_value(record: Record) -> Result<(String, Box<RawValue>), ApiError> {
    let text = String::from_utf8(record.value)
        .map_err(|_| ApiError::Internal(format!("value of {} is not UTF-8", record.key)))?;
    let value = RawValue::from_string(text)
        .map_err(|e| ApiError::Internal(format!("value of {} is not JSON: {}", record.key, e)))?;
    Ok((record.key, value))
}

/// `POST /kv`
pub async fn create<S: Session + 'static>(
    State(service): State<Arc<KvService<S>>>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let request: CreateRequest =
        serde_json::from_slice(&body).map_err(|_| InvalidInput::InvalidJson)?;

    let key = request.key.unwrap_or_default();
    validate_key(&key)?;
    let value = request
        .value
        .ok_or(InvalidInput::MissingValue)?
        .get()
        .as_bytes()
        .to_vec();

    let record = run_blocking(service, "store", key, move |svc, key| svc.create(key, &value)).await?;

    Ok((
        StatusCode::CREATED,
        Json(WriteResponse {
            message: "created",
            size: record.size(),
            key: record.key,
        }),
    ))
}

/// `GET /kv/{id}`
pub async fn read<S: Session + 'static>(
    State(service): State<Arc<KvService<S>>>,
    Path(key): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let record = run_blocking(service, "retrieve", key, |svc, key| svc.read(key)).await?;
    let (key, value) = stored_value(record)?;

    Ok(Json(RecordResponse {
        message: None,
        key,
        value,
    }))
}

/// `PUT /kv/{id}`
pub async fn update<S: Session + 'static>(
    State(service): State<Arc<KvService<S>>>,
    Path(key): Path<String>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    // exactly one field, and it is `value`
    let request: UpdateRequest =
        serde_json::from_slice(&body).map_err(|_| InvalidInput::InvalidJson)?;
    validate_value(&request.value)?;
    let value = request.value.get().as_bytes().to_vec();

    let record = run_blocking(service, "update", key, move |svc, key| svc.update(key, &value)).await?;

    Ok(Json(WriteResponse {
        message: "updated",
        size: record.size(),
        key: record.key,
    }))
}

/// `DELETE /kv/{id}`
pub async fn remove<S: Session + 'static>(
    State(service): State<Arc<KvService<S>>>,
    Path(key): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let record = run_blocking(service, "delete", key, |svc, key| svc.delete(key)).await?;
    let (key, value) = stored_value(record)?;

    Ok(Json(RecordResponse {
        message: Some("deleted"),
        key,
        value,
    }))
}
