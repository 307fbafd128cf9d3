// src/handlers/analytics.rs

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};

use crate::{
    analytics::{quiz_overview, quiz_stats, student_quiz_summary},
    error::AppError,
    models::{analytics::OverviewParams, quiz::QuizFilter},
    store::{AttemptLedger, QuizStore},
    utils::jwt::Claims,
};

/// Attempt and pass counts plus averages for one quiz.
/// Teacher only.
pub async fn get_quiz_stats(
    State(ledger): State<AttemptLedger>,
    State(store): State<QuizStore>,
    Path(quiz_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    store.get_for_management(quiz_id).await?;
    let attempts = ledger.find_by_quiz(quiz_id).await?;

    Ok(Json(quiz_stats(quiz_id, &attempts)))
}

/// Best attempt and full history for one student on one quiz.
pub async fn get_student_results(
    State(ledger): State<AttemptLedger>,
    State(store): State<QuizStore>,
    Extension(claims): Extension<Claims>,
    Path((quiz_id, student_id)): Path<(i64, String)>,
) -> Result<impl IntoResponse, AppError> {
    claims.require_self_or_teacher(&student_id)?;
    store.get_for_management(quiz_id).await?;

    let attempts = ledger.find_by_student(&student_id).await?;

    Ok(Json(student_quiz_summary(quiz_id, &student_id, attempts)))
}

/// Active versus inactive quiz counts, optionally for one subject.
/// Teacher only.
pub async fn get_overview(
    State(store): State<QuizStore>,
    Query(params): Query<OverviewParams>,
) -> Result<impl IntoResponse, AppError> {
    let quizzes = store
        .list(&QuizFilter {
            include_inactive: true,
            ..Default::default()
        })
        .await?;

    Ok(Json(quiz_overview(&quizzes, params.subject.as_deref())))
}
