use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("unauthorized")]
    Unauthorized,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("not enrolled in this course")]
    NotEnrolled,

    #[error("{0}")]
    Validation(String),

    #[error("certification requirements not met")]
    Integrity(IntegrityViolation),

    #[error("database error")]
    Db(#[from] sqlx::Error),

    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

/// Business-rule insufficiency blocking certification. Serialized into the
/// 400 response body alongside a human-readable `error` message.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum IntegrityViolation {
    #[serde(rename_all = "camelCase")]
    MissingQuiz { missing_quiz: String },
    #[serde(rename_all = "camelCase")]
    InsufficientWatchTime {
        watched_percentage: i64,
        required_percentage: i64,
    },
}

impl IntegrityViolation {
    fn message(&self) -> &'static str {
        match self {
            IntegrityViolation::MissingQuiz { .. } => {
                "all quiz questions must be answered correctly before generating certificate"
            }
            IntegrityViolation::InsufficientWatchTime { .. } => {
                "insufficient watch time; please complete watching all course videos"
            }
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            Error::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                json!({ "error": "unauthorized" }),
            ),
            Error::NotFound(what) => (
                StatusCode::NOT_FOUND,
                json!({ "error": format!("{what} not found") }),
            ),
            Error::NotEnrolled => (
                StatusCode::FORBIDDEN,
                json!({ "error": "not enrolled in this course" }),
            ),
            Error::Validation(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
            Error::Integrity(violation) => {
                let mut body = serde_json::to_value(&violation)
                    .unwrap_or_else(|_| json!({}));
                if let Some(obj) = body.as_object_mut() {
                    obj.insert("error".into(), json!(violation.message()));
                }
                (StatusCode::BAD_REQUEST, body)
            }
            // Storage and rendering failures stay opaque to the caller.
            Error::Db(e) => {
                tracing::error!(error = %e, "storage failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "internal server error" }),
                )
            }
            Error::Internal(e) => {
                tracing::error!(error = %e, "internal failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "internal server error" }),
                )
            }
        };
        (status, Json(body)).into_response()
    }
}
