// src/handlers/quiz.rs

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::{
    error::AppError,
    models::{
        catalog::{SubjectList, SubjectParams, subjects_for_class},
        quiz::{CreateQuizRequest, PublicQuiz, Quiz, QuizFilter, QuizListParams, UpdateQuizRequest},
    },
    store::QuizStore,
    utils::jwt::Claims,
};

/// Loads a quiz and checks that the caller created it.
async fn owned_quiz(store: &QuizStore, claims: &Claims, id: i64) -> Result<Quiz, AppError> {
    let quiz = store.get_for_management(id).await?;
    if quiz.creator != claims.sub {
        tracing::warn!("{} tried to modify quiz {} owned by {}", claims.sub, id, quiz.creator);
        return Err(AppError::Forbidden(
            "Only the quiz creator can modify this quiz".to_string(),
        ));
    }
    Ok(quiz)
}

/// Creates a quiz owned by the caller.
/// Teacher only.
pub async fn create_quiz(
    State(store): State<QuizStore>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    claims.require_teacher()?;

    let quiz = store.create(&claims.sub, payload).await?;

    Ok((StatusCode::CREATED, Json(quiz)))
}

/// Lists quizzes, newest first.
///
/// Students only ever see active quizzes with answers stripped.
/// Teachers get full definitions and may ask for inactive ones.
pub async fn list_quizzes(
    State(store): State<QuizStore>,
    Extension(claims): Extension<Claims>,
    Query(params): Query<QuizListParams>,
) -> Result<Response, AppError> {
    let teacher = claims.is_teacher();
    let filter = QuizFilter {
        class_level: params.class_level,
        subject: params.subject,
        creator: params.creator,
        include_inactive: teacher && params.include_inactive.unwrap_or(false),
    };

    let quizzes = store.list(&filter).await?;

    if teacher {
        return Ok(Json(quizzes).into_response());
    }

    let public: Vec<PublicQuiz> = quizzes.into_iter().map(Quiz::without_answers).collect();
    Ok(Json(public).into_response())
}

/// Gets a quiz for taking: active only, no answer key.
pub async fn get_for_taking(
    State(store): State<QuizStore>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let quiz = store.get_for_taking(id).await?;
    Ok(Json(quiz))
}

/// Gets the full quiz including answers and explanations.
/// Teacher only.
pub async fn get_for_management(
    State(store): State<QuizStore>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let quiz = store.get_for_management(id).await?;
    Ok(Json(quiz))
}

/// Partially updates a quiz.
/// Creator only.
pub async fn update_quiz(
    State(store): State<QuizStore>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    owned_quiz(&store, &claims, id).await?;

    let quiz = store.update(id, payload).await?;
    tracing::info!("Quiz {} updated by {}", id, claims.sub);

    Ok(Json(quiz))
}

/// Hides a quiz from students without touching its attempts.
/// Creator only.
pub async fn deactivate_quiz(
    State(store): State<QuizStore>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    owned_quiz(&store, &claims, id).await?;

    let quiz = store.deactivate(id).await?;
    tracing::info!("Quiz {} deactivated by {}", id, claims.sub);

    Ok(Json(quiz))
}

/// Deletes a quiz and every attempt against it.
/// Creator only.
pub async fn delete_quiz(
    State(store): State<QuizStore>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    owned_quiz(&store, &claims, id).await?;

    let attempts_removed = store.delete(id).await?;

    Ok(Json(serde_json::json!({
        "id": id,
        "attemptsRemoved": attempts_removed,
    })))
}

/// Subjects offered for a class level.
pub async fn list_subjects(Query(params): Query<SubjectParams>) -> impl IntoResponse {
    let subjects = subjects_for_class(&params.class_level)
        .iter()
        .map(|s| s.to_string())
        .collect();

    Json(SubjectList {
        class_level: params.class_level,
        subjects,
    })
}
