// src/store/ledger.rs

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool, types::Json};

use crate::{
    error::AppError,
    models::attempt::{Attempt, AttemptId, AttemptStatus, NewAttempt},
};

const ATTEMPT_COLUMNS: &str = "id, quiz_id, student_id, answers, detailed_answers, score, percentage, \
     total_questions, time_taken, passed, status, submitted_at";

/// Outcome of an append that the no-retake index refused.
pub const RETAKE_DENIED_MESSAGE: &str =
    "You have already attempted this quiz. Retakes are not allowed.";

/// Append-only record of graded attempts.
/// The only removal path is `delete_for_quiz`, driven by quiz deletion.
#[derive(Clone)]
pub struct AttemptLedger {
    pool: SqlitePool,
}

impl AttemptLedger {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Writes a graded attempt and returns its id.
    ///
    /// Attempts graded under a no-retake policy are covered by a partial unique
    /// index on (quiz_id, student_id), so two racing submissions cannot both land.
    pub async fn append(&self, attempt: &NewAttempt) -> Result<AttemptId, AppError> {
        let result = sqlx::query(
            r#"
            INSERT INTO quiz_attempts
            (quiz_id, student_id, answers, detailed_answers, score, percentage, total_questions,
             time_taken, passed, status, single_attempt, submitted_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(attempt.quiz_id)
        .bind(&attempt.student_id)
        .bind(Json(&attempt.answers))
        .bind(Json(&attempt.detailed_answers))
        .bind(attempt.score)
        .bind(attempt.percentage)
        .bind(attempt.total_questions)
        .bind(attempt.time_taken)
        .bind(attempt.passed)
        .bind(AttemptStatus::Completed.as_str())
        .bind(attempt.single_attempt)
        .bind(Utc::now())
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) => Ok(done.last_insert_rowid()),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                tracing::warn!(
                    "Concurrent submission rejected for quiz {} by {}",
                    attempt.quiz_id,
                    attempt.student_id
                );
                Err(AppError::RetakeDenied(RETAKE_DENIED_MESSAGE.to_string()))
            }
            Err(e) => {
                tracing::error!("Failed to append attempt: {:?}", e);
                Err(AppError::from(e))
            }
        }
    }

    /// Whether the student already has a completed attempt on the quiz.
    pub async fn has_completed(&self, quiz_id: i64, student_id: &str) -> Result<bool, AppError> {
        let found: Option<i64> = sqlx::query_scalar(
            "SELECT id FROM quiz_attempts WHERE quiz_id = ? AND student_id = ? AND status = ? LIMIT 1",
        )
        .bind(quiz_id)
        .bind(student_id)
        .bind(AttemptStatus::Completed.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to check previous attempts: {:?}", e);
            AppError::from(e)
        })?;

        Ok(found.is_some())
    }

    /// Newest first.
    pub async fn find_by_student(&self, student_id: &str) -> Result<Vec<Attempt>, AppError> {
        let attempts = sqlx::query_as::<_, Attempt>(&format!(
            "SELECT {} FROM quiz_attempts WHERE student_id = ? ORDER BY submitted_at DESC, id DESC",
            ATTEMPT_COLUMNS
        ))
        .bind(student_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to fetch attempts for {}: {:?}", student_id, e);
            AppError::from(e)
        })?;

        Ok(attempts)
    }

    /// Newest first.
    pub async fn find_by_quiz(&self, quiz_id: i64) -> Result<Vec<Attempt>, AppError> {
        let attempts = sqlx::query_as::<_, Attempt>(&format!(
            "SELECT {} FROM quiz_attempts WHERE quiz_id = ? ORDER BY submitted_at DESC, id DESC",
            ATTEMPT_COLUMNS
        ))
        .bind(quiz_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to fetch attempts for quiz {}: {:?}", quiz_id, e);
            AppError::from(e)
        })?;

        Ok(attempts)
    }

    pub async fn find_one(&self, attempt_id: AttemptId) -> Result<Attempt, AppError> {
        sqlx::query_as::<_, Attempt>(&format!(
            "SELECT {} FROM quiz_attempts WHERE id = ?",
            ATTEMPT_COLUMNS
        ))
        .bind(attempt_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(AppError::NotFound("Attempt not found".to_string()))
    }

    /// Cascade half of quiz deletion; runs inside the caller's transaction.
    pub async fn delete_for_quiz(conn: &mut SqliteConnection, quiz_id: i64) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM quiz_attempts WHERE quiz_id = ?")
            .bind(quiz_id)
            .execute(&mut *conn)
            .await
            .map_err(|e| {
                tracing::error!("Failed to delete attempts for quiz {}: {:?}", quiz_id, e);
                AppError::from(e)
            })?;

        Ok(result.rows_affected())
    }
}
