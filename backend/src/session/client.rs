// src/session/client.rs

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, de::DeserializeOwned};

use crate::{
    config::Config,
    error::{AppError, ErrorKind},
    grading::GradingEngine,
    models::{
        attempt::{AttemptResult, SubmitQuizRequest},
        quiz::PublicQuiz,
    },
    store::QuizStore,
};

/// Failure reported by a `QuizApi`.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ApiError {
    /// The server understood the request and said no. Retrying will not help.
    #[error("{message}")]
    Rejected { kind: ErrorKind, message: String },

    /// Network, timeout or storage trouble. Safe to retry.
    #[error("temporarily unavailable: {0}")]
    Transient(String),
}

impl ApiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::Rejected { kind, .. } => *kind,
            ApiError::Transient(_) => ErrorKind::Transient,
        }
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        match err.kind() {
            ErrorKind::Transient | ErrorKind::Internal => ApiError::Transient(err.to_string()),
            kind => ApiError::Rejected {
                kind,
                message: err.to_string(),
            },
        }
    }
}

/// The two calls an attempt session makes against the quiz service.
#[async_trait]
pub trait QuizApi: Send + Sync {
    /// The quiz with answer keys removed.
    async fn fetch_for_taking(&self, quiz_id: i64) -> Result<PublicQuiz, ApiError>;

    async fn submit(&self, quiz_id: i64, submission: &SubmitQuizRequest) -> Result<AttemptResult, ApiError>;
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
    kind: Option<ErrorKind>,
}

/// Talks to a running server over HTTP with a bearer token.
/// Every call, body included, is bounded by `timeout`.
#[derive(Clone)]
pub struct HttpQuizApi {
    client: Client,
    base_url: String,
    token: String,
    timeout: Duration,
}

impl HttpQuizApi {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            timeout,
        }
    }

    /// Uses the configured submit timeout.
    pub fn from_config(base_url: impl Into<String>, token: impl Into<String>, config: &Config) -> Self {
        Self::new(base_url, token, config.submit_timeout())
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/quizzes{}", self.base_url, path)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        tokio::time::timeout(self.timeout, self.exchange(request))
            .await
            .map_err(|_| {
                tracing::warn!("Quiz API call timed out after {:?}", self.timeout);
                ApiError::Transient("request timed out".to_string())
            })?
    }

    async fn exchange<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let response = request
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| ApiError::Transient(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return response
                .json::<T>()
                .await
                .map_err(|e| ApiError::Transient(e.to_string()));
        }

        let body = response.json::<ErrorBody>().await.ok();
        Err(error_from_status(status, body))
    }
}

fn error_from_status(status: StatusCode, body: Option<ErrorBody>) -> ApiError {
    let message = body
        .as_ref()
        .map(|b| b.error.clone())
        .unwrap_or_else(|| status.to_string());

    let kind = body.and_then(|b| b.kind).unwrap_or(match status {
        StatusCode::BAD_REQUEST => ErrorKind::BadRequest,
        StatusCode::UNAUTHORIZED => ErrorKind::Unauthorized,
        StatusCode::FORBIDDEN => ErrorKind::Forbidden,
        StatusCode::NOT_FOUND => ErrorKind::NotFound,
        StatusCode::CONFLICT => ErrorKind::RetakeDenied,
        StatusCode::UNPROCESSABLE_ENTITY => ErrorKind::InvalidAnswer,
        _ => ErrorKind::Transient,
    });

    match kind {
        ErrorKind::Transient | ErrorKind::Internal => ApiError::Transient(message),
        kind => ApiError::Rejected { kind, message },
    }
}

#[async_trait]
impl QuizApi for HttpQuizApi {
    async fn fetch_for_taking(&self, quiz_id: i64) -> Result<PublicQuiz, ApiError> {
        let request = self.client.get(self.url(&format!("/{}/take", quiz_id)));
        self.send(request).await
    }

    async fn submit(&self, quiz_id: i64, submission: &SubmitQuizRequest) -> Result<AttemptResult, ApiError> {
        let request = self
            .client
            .post(self.url(&format!("/{}/submit", quiz_id)))
            .json(submission);
        self.send(request).await
    }
}

/// Runs against the store and grading engine in-process, with no transport.
#[derive(Clone)]
pub struct LocalQuizApi {
    store: QuizStore,
    engine: GradingEngine,
}

impl LocalQuizApi {
    pub fn new(store: QuizStore, engine: GradingEngine) -> Self {
        Self { store, engine }
    }
}

#[async_trait]
impl QuizApi for LocalQuizApi {
    async fn fetch_for_taking(&self, quiz_id: i64) -> Result<PublicQuiz, ApiError> {
        Ok(self.store.get_for_taking(quiz_id).await?)
    }

    async fn submit(&self, quiz_id: i64, submission: &SubmitQuizRequest) -> Result<AttemptResult, ApiError> {
        Ok(self.engine.submit(quiz_id, submission).await?)
    }
}
