use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Maps a failed insert: unique violations become `Conflict`, dangling references `NotFound`.
    pub fn from_insert(err: anyhow::Error, conflict_message: &str, missing_message: &str) -> Self {
        let Some(db_err) = err
            .downcast_ref::<sqlx::Error>()
            .and_then(|e| e.as_database_error())
        else {
            return AppError::Internal(err);
        };

        if db_err.is_unique_violation() {
            AppError::Conflict(conflict_message.to_string())
        } else if db_err.is_foreign_key_violation() {
            AppError::NotFound(missing_message.to_string())
        } else {
            AppError::Internal(err)
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Internal(e) => {
                error!("Request failed: {e:?}");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}
