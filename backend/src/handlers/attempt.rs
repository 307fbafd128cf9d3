// src/handlers/attempt.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use validator::Validate;

use crate::{
    analytics::{join_quiz_metadata, referenced_quiz_ids},
    error::{AppError, ValidationError},
    grading::GradingEngine,
    models::attempt::{AttemptDetail, AttemptId, QuizMeta, SubmitQuizRequest},
    store::{AttemptLedger, QuizStore},
    utils::jwt::Claims,
};

/// Grades a submission and records it.
///
/// Students submit for themselves; a teacher may submit on behalf of anyone.
pub async fn submit_quiz(
    State(engine): State<GradingEngine>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<i64>,
    Json(payload): Json<SubmitQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(errors) = payload.validate() {
        return Err(AppError::Validation(ValidationError::from(errors)));
    }

    if !claims.is_teacher() && payload.student_id != claims.sub {
        return Err(AppError::Forbidden(
            "You can only submit attempts for yourself".to_string(),
        ));
    }

    let result = engine.submit(quiz_id, &payload).await?;

    Ok((StatusCode::CREATED, Json(result)))
}

/// Attempt history for one student, newest first, with quiz metadata joined in.
pub async fn student_history(
    State(ledger): State<AttemptLedger>,
    State(store): State<QuizStore>,
    Extension(claims): Extension<Claims>,
    Path(student_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    claims.require_self_or_teacher(&student_id)?;

    let attempts = ledger.find_by_student(&student_id).await?;
    let quizzes = store.find_many(&referenced_quiz_ids(&attempts)).await?;

    Ok(Json(join_quiz_metadata(attempts, &quizzes)))
}

/// Every attempt on one quiz, newest first.
/// Teacher only.
pub async fn quiz_attempts(
    State(ledger): State<AttemptLedger>,
    State(store): State<QuizStore>,
    Path(quiz_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let quiz = store.get_for_management(quiz_id).await?;
    let attempts = ledger.find_by_quiz(quiz_id).await?;

    Ok(Json(join_quiz_metadata(attempts, &[quiz])))
}

/// One attempt with its per-question review.
///
/// Students see the answer key only if the quiz shows correct answers;
/// teachers always do.
pub async fn get_attempt(
    State(ledger): State<AttemptLedger>,
    State(store): State<QuizStore>,
    Extension(claims): Extension<Claims>,
    Path(attempt_id): Path<AttemptId>,
) -> Result<impl IntoResponse, AppError> {
    let attempt = ledger.find_one(attempt_id).await?;
    claims.require_self_or_teacher(&attempt.student_id)?;

    let quiz = store.find(attempt.quiz_id).await?;
    let reveal = claims.is_teacher() || quiz.as_ref().is_some_and(|q| q.show_correct_answers);

    let detailed_answers = if reveal {
        attempt.detailed_answers.0.clone()
    } else {
        attempt.detailed_answers.iter().map(|d| d.redacted()).collect()
    };

    Ok(Json(AttemptDetail {
        quiz: quiz.as_ref().map(QuizMeta::from),
        detailed_answers,
        attempt,
    }))
}
