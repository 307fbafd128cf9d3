// src/error.rs

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Stable machine-readable tag attached to every error body.
/// Clients (including `session::HttpQuizApi`) branch on this rather than on status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    BadRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    RetakeDenied,
    InvalidAnswer,
    Transient,
    Internal,
}

/// One problem found while validating authoring input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(rename_all = "camelCase")]
#[error("{}", describe_issue(.question_index, .field, .reason))]
pub struct ValidationIssue {
    /// Zero-based index of the offending question, absent for quiz-level fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question_index: Option<usize>,
    pub field: String,
    pub reason: String,
}

impl ValidationIssue {
    pub fn quiz(field: &str, reason: impl Into<String>) -> Self {
        Self {
            question_index: None,
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    pub fn question(index: usize, field: &str, reason: impl Into<String>) -> Self {
        Self {
            question_index: Some(index),
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

fn describe_issue(question_index: &Option<usize>, field: &str, reason: &str) -> String {
    match question_index {
        // Humans count questions from 1.
        Some(i) => format!("question {}: {} {}", i + 1, field, reason),
        None => format!("{} {}", field, reason),
    }
}

/// Structured validation failure for quiz authoring input.
#[derive(Debug, Clone, Default, PartialEq, Eq, thiserror::Error)]
#[error("{}", join_issues(.issues))]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationError {
    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn push(&mut self, issue: ValidationIssue) {
        self.issues.push(issue);
    }
}

fn join_issues(issues: &[ValidationIssue]) -> String {
    issues.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

/// Flattens `validator` field errors into quiz-level issues.
impl From<validator::ValidationErrors> for ValidationError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut issues: Vec<ValidationIssue> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                let field = camel_case(&field);
                errs.iter().map(move |e| {
                    let reason = e
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| e.code.to_string());
                    ValidationIssue::quiz(&field, reason)
                })
            })
            .collect();
        issues.sort_by(|a, b| a.field.cmp(&b.field));
        Self { issues }
    }
}

/// `passing_score` -> `passingScore`, matching the JSON field names clients send.
fn camel_case(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut upper = false;
    for c in field.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// Global Application Error Enum.
/// Centralizes error handling and mapping to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // 500 Internal Server Error
    #[error("internal error: {0}")]
    InternalServerError(String),

    // 400 Bad Request
    #[error("bad request: {0}")]
    BadRequest(String),

    // 400 Bad Request with per-question detail
    #[error("validation failed: {0}")]
    Validation(ValidationError),

    // 401 Unauthorized
    #[error("unauthorized: {0}")]
    AuthError(String),

    // 403 Forbidden (wrong role or not the owner)
    #[error("forbidden: {0}")]
    Forbidden(String),

    // 404 Not Found
    #[error("{0}")]
    NotFound(String),

    // 409 Conflict, business rule rather than a fault
    #[error("{0}")]
    RetakeDenied(String),

    // 422 answer outside the quiz
    #[error("{0}")]
    InvalidAnswer(String),

    // 503 storage hiccup, the caller may retry
    #[error("storage unavailable: {0}")]
    Transient(String),
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::InternalServerError(_) => ErrorKind::Internal,
            AppError::BadRequest(_) => ErrorKind::BadRequest,
            AppError::Validation(_) => ErrorKind::Validation,
            AppError::AuthError(_) => ErrorKind::Unauthorized,
            AppError::Forbidden(_) => ErrorKind::Forbidden,
            AppError::NotFound(_) => ErrorKind::NotFound,
            AppError::RetakeDenied(_) => ErrorKind::RetakeDenied,
            AppError::InvalidAnswer(_) => ErrorKind::InvalidAnswer,
            AppError::Transient(_) => ErrorKind::Transient,
        }
    }
}

/// Implements `IntoResponse` for `AppError`.
/// Converts the error into a JSON response with appropriate HTTP status code.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let (status, error_message, details) = match self {
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                    None,
                )
            }
            AppError::Transient(msg) => {
                tracing::error!("Storage failure: {}", msg);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "Storage temporarily unavailable, please retry".to_string(),
                    None,
                )
            }
            AppError::Validation(err) => (
                StatusCode::BAD_REQUEST,
                format!("Validation failed: {}", err),
                Some(err.issues),
            ),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg, None),
            AppError::AuthError(msg) => (StatusCode::UNAUTHORIZED, msg, None),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg, None),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg, None),
            AppError::RetakeDenied(msg) => (StatusCode::CONFLICT, msg, None),
            AppError::InvalidAnswer(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg, None),
        };

        let body = match details {
            Some(details) => json!({
                "error": error_message,
                "kind": kind,
                "details": details,
            }),
            None => json!({
                "error": error_message,
                "kind": kind,
            }),
        };

        (status, Json(body)).into_response()
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::Validation(err)
    }
}

/// Converts `sqlx::Error` into an `AppError`.
/// Allows using `?` operator on database queries.
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => AppError::NotFound("Resource not found".to_string()),
            other => AppError::Transient(other.to_string()),
        }
    }
}
