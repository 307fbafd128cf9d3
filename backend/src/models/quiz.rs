// src/models/quiz.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, types::Json};
use validator::Validate;

use crate::{
    config::{
        DEFAULT_PASSING_SCORE, DEFAULT_TIME_LIMIT_MINUTES, MAX_OPTIONS, MAX_TIME_LIMIT_MINUTES,
        MIN_OPTIONS,
    },
    error::{ValidationError, ValidationIssue},
};

/// Represents the 'questions' table in the database.
/// Owned by a quiz; has no lifecycle of its own.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: i64,

    #[serde(skip)]
    pub quiz_id: i64,

    /// Zero-based order inside the quiz.
    #[serde(skip)]
    pub position: i64,

    pub text: String,

    /// Stored as a JSON array in the database.
    pub options: Json<Vec<String>>,

    /// Index into `options`.
    pub correct_answer: i64,

    pub explanation: Option<String>,
}

/// DTO for sending a question to a student (excludes answer and explanation).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PublicQuestion {
    pub id: i64,
    pub text: String,
    pub options: Vec<String>,
}

impl From<Question> for PublicQuestion {
    fn from(q: Question) -> Self {
        Self {
            id: q.id,
            text: q.text,
            options: q.options.0,
        }
    }
}

/// Represents a row of the 'quizzes' table, without its questions.
#[derive(Debug, Clone, FromRow)]
pub struct QuizRow {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub subject: String,
    pub class_level: String,
    pub creator: String,
    pub time_limit: i64,
    pub passing_score: f64,
    pub allow_retake: bool,
    pub show_correct_answers: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A quiz with its ordered questions, answers included.
/// Only creators and teachers ever see this shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quiz {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub subject: String,
    pub class_level: String,
    pub creator: String,
    pub questions: Vec<Question>,
    /// Always `questions.len()`; filled in by `Quiz::assemble`.
    pub total_questions: usize,
    /// Minutes.
    pub time_limit: i64,
    pub passing_score: f64,
    pub allow_retake: bool,
    pub show_correct_answers: bool,
    #[serde(rename = "active")]
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Quiz {
    pub fn assemble(row: QuizRow, questions: Vec<Question>) -> Self {
        Self {
            id: row.id,
            title: row.title,
            description: row.description,
            subject: row.subject,
            class_level: row.class_level,
            creator: row.creator,
            total_questions: questions.len(),
            questions,
            time_limit: row.time_limit,
            passing_score: row.passing_score,
            allow_retake: row.allow_retake,
            show_correct_answers: row.show_correct_answers,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }

    pub fn question(&self, id: i64) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == id)
    }

    /// Drops `correctAnswer` and `explanation` from every question.
    pub fn without_answers(self) -> PublicQuiz {
        PublicQuiz {
            id: self.id,
            title: self.title,
            description: self.description,
            subject: self.subject,
            class_level: self.class_level,
            creator: self.creator,
            questions: self.questions.into_iter().map(PublicQuestion::from).collect(),
            total_questions: self.total_questions,
            time_limit: self.time_limit,
            passing_score: self.passing_score,
            allow_retake: self.allow_retake,
            show_correct_answers: self.show_correct_answers,
            is_active: self.is_active,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// The quiz as a student receives it for taking.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PublicQuiz {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub subject: String,
    pub class_level: String,
    pub creator: String,
    pub questions: Vec<PublicQuestion>,
    pub total_questions: usize,
    pub time_limit: i64,
    pub passing_score: f64,
    pub allow_retake: bool,
    pub show_correct_answers: bool,
    #[serde(rename = "active")]
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Authoring input for one question.
/// Every field is defaulted so that a missing value is reported
/// against its question index instead of failing deserialization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionInput {
    /// Set when editing an existing question so its id survives the update.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default, alias = "question")]
    pub text: String,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub correct_answer: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

impl From<&Question> for QuestionInput {
    fn from(q: &Question) -> Self {
        Self {
            id: Some(q.id),
            text: q.text.clone(),
            options: q.options.0.clone(),
            correct_answer: Some(q.correct_answer),
            explanation: q.explanation.clone(),
        }
    }
}

/// DTO for creating a quiz (`POST /quizzes`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateQuizRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub subject: String,
    #[serde(default, alias = "stdClass")]
    pub class_level: String,
    #[serde(default)]
    pub questions: Vec<QuestionInput>,
    #[serde(default)]
    pub time_limit: Option<i64>,
    #[serde(default)]
    pub passing_score: Option<f64>,
    #[serde(default)]
    pub allow_retake: Option<bool>,
    #[serde(default)]
    pub show_correct_answers: Option<bool>,
}

/// DTO for a partial quiz update (`PUT /quizzes/{id}`). Fields are optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateQuizRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, alias = "stdClass", skip_serializing_if = "Option::is_none")]
    pub class_level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub questions: Option<Vec<QuestionInput>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_limit: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passing_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_retake: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_correct_answers: Option<bool>,
    #[serde(default, alias = "isActive", skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
}

impl UpdateQuizRequest {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.subject.is_none()
            && self.class_level.is_none()
            && self.questions.is_none()
            && self.time_limit.is_none()
            && self.passing_score.is_none()
            && self.allow_retake.is_none()
            && self.show_correct_answers.is_none()
            && self.active.is_none()
    }
}

/// A complete quiz definition with defaults applied, ready to be checked and stored.
/// Both create and update funnel through this type so they share one set of rules.
#[derive(Debug, Clone, Validate)]
pub struct QuizDraft {
    #[validate(
        custom(function = validate_not_blank),
        length(max = 200, message = "must be at most 200 characters")
    )]
    pub title: String,

    #[validate(length(max = 2000, message = "must be at most 2000 characters"))]
    pub description: Option<String>,

    #[validate(custom(function = validate_not_blank))]
    pub subject: String,

    #[validate(custom(function = validate_not_blank))]
    pub class_level: String,

    #[validate(length(min = 1, message = "at least one question is required"))]
    pub questions: Vec<QuestionInput>,

    #[validate(custom(function = validate_time_limit))]
    pub time_limit: i64,

    #[validate(range(min = 0.0, max = 100.0, message = "must be between 0 and 100"))]
    pub passing_score: f64,

    pub allow_retake: bool,
    pub show_correct_answers: bool,
    pub is_active: bool,
}

impl From<CreateQuizRequest> for QuizDraft {
    fn from(req: CreateQuizRequest) -> Self {
        Self {
            title: req.title,
            description: req.description,
            subject: req.subject,
            class_level: req.class_level,
            questions: req.questions,
            time_limit: req.time_limit.unwrap_or(DEFAULT_TIME_LIMIT_MINUTES),
            passing_score: req.passing_score.unwrap_or(DEFAULT_PASSING_SCORE),
            allow_retake: req.allow_retake.unwrap_or(false),
            show_correct_answers: req.show_correct_answers.unwrap_or(true),
            is_active: true,
        }
    }
}

impl From<&Quiz> for QuizDraft {
    fn from(quiz: &Quiz) -> Self {
        Self {
            title: quiz.title.clone(),
            description: quiz.description.clone(),
            subject: quiz.subject.clone(),
            class_level: quiz.class_level.clone(),
            questions: quiz.questions.iter().map(QuestionInput::from).collect(),
            time_limit: quiz.time_limit,
            passing_score: quiz.passing_score,
            allow_retake: quiz.allow_retake,
            show_correct_answers: quiz.show_correct_answers,
            is_active: quiz.is_active,
        }
    }
}

impl QuizDraft {
    /// Overlays the fields present in `patch`.
    pub fn apply(&mut self, patch: UpdateQuizRequest) {
        if let Some(title) = patch.title {
            self.title = title;
        }
        if let Some(description) = patch.description {
            self.description = Some(description);
        }
        if let Some(subject) = patch.subject {
            self.subject = subject;
        }
        if let Some(class_level) = patch.class_level {
            self.class_level = class_level;
        }
        if let Some(questions) = patch.questions {
            self.questions = questions;
        }
        if let Some(time_limit) = patch.time_limit {
            self.time_limit = time_limit;
        }
        if let Some(passing_score) = patch.passing_score {
            self.passing_score = passing_score;
        }
        if let Some(allow_retake) = patch.allow_retake {
            self.allow_retake = allow_retake;
        }
        if let Some(show) = patch.show_correct_answers {
            self.show_correct_answers = show;
        }
        if let Some(active) = patch.active {
            self.is_active = active;
        }
    }

    /// Runs every authoring rule and reports all violations at once.
    pub fn check(&self) -> Result<(), ValidationError> {
        let mut err = match self.validate() {
            Ok(()) => ValidationError::default(),
            Err(errors) => ValidationError::from(errors),
        };

        for (index, question) in self.questions.iter().enumerate() {
            for issue in question_issues(index, question) {
                err.push(issue);
            }
        }

        if err.is_empty() { Ok(()) } else { Err(err) }
    }
}

/// Structural rules for a single question.
pub fn question_issues(index: usize, q: &QuestionInput) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    if q.text.trim().is_empty() {
        issues.push(ValidationIssue::question(index, "text", "must not be empty"));
    }

    if q.options.len() < MIN_OPTIONS || q.options.len() > MAX_OPTIONS {
        issues.push(ValidationIssue::question(
            index,
            "options",
            format!(
                "must have between {} and {} options, found {}",
                MIN_OPTIONS,
                MAX_OPTIONS,
                q.options.len()
            ),
        ));
    }

    for (i, option) in q.options.iter().enumerate() {
        if option.trim().is_empty() {
            issues.push(ValidationIssue::question(
                index,
                "options",
                format!("option {} must not be empty", i + 1),
            ));
        }
    }

    match q.correct_answer {
        None => issues.push(ValidationIssue::question(index, "correctAnswer", "is required")),
        Some(c) if c < 0 || c as usize >= q.options.len() => {
            issues.push(ValidationIssue::question(
                index,
                "correctAnswer",
                format!("{} is not a valid option index", c),
            ));
        }
        Some(c) if q.options[c as usize].trim().is_empty() => {
            issues.push(ValidationIssue::question(
                index,
                "correctAnswer",
                "refers to an empty option",
            ));
        }
        Some(_) => {}
    }

    issues
}

fn validate_not_blank(value: &str) -> Result<(), validator::ValidationError> {
    if value.trim().is_empty() {
        return Err(validator::ValidationError::new("blank").with_message("must not be empty".into()));
    }
    Ok(())
}

fn validate_time_limit(minutes: i64) -> Result<(), validator::ValidationError> {
    if !(1..=MAX_TIME_LIMIT_MINUTES).contains(&minutes) {
        return Err(validator::ValidationError::new("range").with_message(
            format!("must be between 1 and {} minutes", MAX_TIME_LIMIT_MINUTES).into(),
        ));
    }
    Ok(())
}

/// Query parameters for `GET /quizzes`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizListParams {
    #[serde(alias = "stdClass")]
    pub class_level: Option<String>,
    pub subject: Option<String>,
    pub creator: Option<String>,
    pub include_inactive: Option<bool>,
}

/// Store-level listing filter.
#[derive(Debug, Clone, Default)]
pub struct QuizFilter {
    pub class_level: Option<String>,
    pub subject: Option<String>,
    pub creator: Option<String>,
    pub include_inactive: bool,
}
