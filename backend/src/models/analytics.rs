// src/models/analytics.rs

use serde::{Deserialize, Serialize};

use super::attempt::Attempt;

/// Aggregate numbers for one quiz.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizStats {
    pub quiz_id: i64,
    pub attempt_count: usize,
    pub pass_count: usize,
    /// Mean percentage rounded to the nearest integer.
    pub average_percentage: i64,
    /// Mean minutes rounded to the nearest integer.
    pub average_time_taken: i64,
}

/// One student's standing on one quiz.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentQuizSummary {
    pub quiz_id: i64,
    pub student_id: String,
    pub attempt_count: usize,
    pub best_attempt: Option<Attempt>,
    /// Newest first.
    pub history: Vec<Attempt>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectCount {
    pub subject: String,
    pub active: usize,
    pub inactive: usize,
}

/// Teacher dashboard header: how many quizzes are live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizOverview {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    pub total: usize,
    pub active: usize,
    pub inactive: usize,
    pub by_subject: Vec<SubjectCount>,
}

/// Query parameters for `GET /quizzes/overview`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OverviewParams {
    pub subject: Option<String>,
}
