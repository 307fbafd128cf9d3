// src/models/attempt.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, types::Json};
use validator::Validate;

/// Selection index recorded for a question the student never answered.
pub const UNANSWERED: i64 = -1;

pub type AttemptId = i64;

/// Lifecycle of an attempt. Only `Completed` is written today; the other two
/// are reserved for server-tracked sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AttemptStatus {
    Completed,
    InProgress,
    Abandoned,
}

impl AttemptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptStatus::Completed => "completed",
            AttemptStatus::InProgress => "in-progress",
            AttemptStatus::Abandoned => "abandoned",
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown attempt status '{0}'")]
pub struct UnknownStatus(String);

impl TryFrom<String> for AttemptStatus {
    type Error = UnknownStatus;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "completed" => Ok(AttemptStatus::Completed),
            "in-progress" => Ok(AttemptStatus::InProgress),
            "abandoned" => Ok(AttemptStatus::Abandoned),
            _ => Err(UnknownStatus(value)),
        }
    }
}

/// One graded answer inside an attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptAnswer {
    pub question_id: i64,
    /// `UNANSWERED` when left blank.
    pub selected_answer: i64,
    pub is_correct: bool,
    /// Seconds spent on the question, when the client tracked it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_taken: Option<i64>,
}

/// Per-question review echoing the question as it was at grading time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailedAnswer {
    pub question_id: i64,
    pub question: String,
    pub options: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correct_answer: Option<i64>,
    pub user_answer: i64,
    pub is_correct: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

impl DetailedAnswer {
    /// Copy with the answer key and explanation removed.
    pub fn redacted(&self) -> Self {
        Self {
            correct_answer: None,
            explanation: None,
            ..self.clone()
        }
    }
}

/// Represents the 'quiz_attempts' table in the database.
/// Immutable once written.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Attempt {
    pub id: AttemptId,
    pub quiz_id: i64,
    pub student_id: String,
    pub answers: Json<Vec<AttemptAnswer>>,

    /// Full review snapshot. Never serialized directly; handlers decide
    /// whether the caller may see the answer key.
    #[serde(skip_serializing)]
    pub detailed_answers: Json<Vec<DetailedAnswer>>,

    /// Number of correct answers.
    pub score: i64,
    /// 0-100, two decimals.
    pub percentage: f64,
    /// Snapshot taken at grading time.
    pub total_questions: i64,
    /// Minutes.
    pub time_taken: i64,
    pub passed: bool,
    #[sqlx(try_from = "String")]
    pub status: AttemptStatus,
    pub submitted_at: DateTime<Utc>,
}

/// A graded attempt that has not been written to the ledger yet.
#[derive(Debug, Clone)]
pub struct NewAttempt {
    pub quiz_id: i64,
    pub student_id: String,
    pub answers: Vec<AttemptAnswer>,
    pub detailed_answers: Vec<DetailedAnswer>,
    pub score: i64,
    pub percentage: f64,
    pub total_questions: i64,
    pub time_taken: i64,
    pub passed: bool,
    /// Graded under a no-retake policy; the ledger enforces uniqueness for these.
    pub single_attempt: bool,
}

/// One answer as submitted by a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedAnswer {
    pub question_id: i64,
    pub selected_answer: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_taken: Option<i64>,
}

/// DTO for `POST /quizzes/{id}/submit`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SubmitQuizRequest {
    #[serde(alias = "studentUsername")]
    #[validate(length(min = 1, max = 100, message = "studentId must be 1-100 characters"))]
    pub student_id: String,

    pub answers: Vec<SubmittedAnswer>,

    #[serde(default, alias = "timeTaken")]
    #[validate(range(min = 0, message = "timeTakenMinutes must not be negative"))]
    pub time_taken_minutes: i64,
}

/// What the student gets back after submitting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptResult {
    pub attempt_id: AttemptId,
    pub score: i64,
    pub total_questions: i64,
    pub percentage: f64,
    pub passed: bool,
    pub time_taken: i64,
    /// Present only when the quiz shows correct answers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detailed_answers: Option<Vec<DetailedAnswer>>,
}

/// Quiz fields joined onto attempts for history views.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QuizMeta {
    pub id: i64,
    pub title: String,
    pub subject: String,
    pub class_level: String,
    pub total_questions: usize,
    pub passing_score: f64,
    pub show_correct_answers: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptWithQuiz {
    #[serde(flatten)]
    pub attempt: Attempt,
    pub quiz: Option<QuizMeta>,
}

/// A single attempt with its review, as returned by `GET /quizzes/attempt/{id}`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptDetail {
    #[serde(flatten)]
    pub attempt: Attempt,
    pub quiz: Option<QuizMeta>,
    pub detailed_answers: Vec<DetailedAnswer>,
}
