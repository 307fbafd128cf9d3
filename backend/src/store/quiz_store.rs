// src/store/quiz_store.rs

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool, types::Json};

use crate::{
    error::AppError,
    models::quiz::{
        CreateQuizRequest, PublicQuiz, Question, QuestionInput, Quiz, QuizDraft, QuizFilter,
        QuizRow, UpdateQuizRequest,
    },
    store::ledger::AttemptLedger,
};

const QUIZ_COLUMNS: &str = "id, title, description, subject, class_level, creator, time_limit, \
     passing_score, allow_retake, show_correct_answers, is_active, created_at, updated_at";

/// Owns quizzes and their questions. Every write is validated first.
#[derive(Clone)]
pub struct QuizStore {
    pool: SqlitePool,
}

impl QuizStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Validates and stores a new quiz owned by `creator`.
    pub async fn create(&self, creator: &str, req: CreateQuizRequest) -> Result<Quiz, AppError> {
        let draft = QuizDraft::from(req);
        draft.check()?;

        let now = Utc::now();
        let mut tx = self.pool.begin().await.map_err(|e| {
            tracing::error!("Failed to open transaction: {:?}", e);
            AppError::from(e)
        })?;

        let id = sqlx::query(
            r#"
            INSERT INTO quizzes
            (title, description, subject, class_level, creator, time_limit, passing_score,
             allow_retake, show_correct_answers, is_active, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&draft.title)
        .bind(&draft.description)
        .bind(&draft.subject)
        .bind(&draft.class_level)
        .bind(creator)
        .bind(draft.time_limit)
        .bind(draft.passing_score)
        .bind(draft.allow_retake)
        .bind(draft.show_correct_answers)
        .bind(draft.is_active)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            tracing::error!("Failed to create quiz: {:?}", e);
            AppError::from(e)
        })?
        .last_insert_rowid();

        sync_questions(&mut tx, id, &draft.questions).await?;
        tx.commit().await?;

        tracing::info!("Quiz {} created by {} with {} questions", id, creator, draft.questions.len());
        self.get_for_management(id).await
    }

    /// Applies a partial update. The merged quiz must still pass validation.
    /// Question ids carried by the patch are preserved; questions left out are removed.
    pub async fn update(&self, id: i64, patch: UpdateQuizRequest) -> Result<Quiz, AppError> {
        let current = self.get_for_management(id).await?;
        if patch.is_empty() {
            return Ok(current);
        }

        let replaces_questions = patch.questions.is_some();
        let mut draft = QuizDraft::from(&current);
        draft.apply(patch);
        draft.check()?;

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            UPDATE quizzes SET
                title = ?, description = ?, subject = ?, class_level = ?, time_limit = ?,
                passing_score = ?, allow_retake = ?, show_correct_answers = ?, is_active = ?,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&draft.title)
        .bind(&draft.description)
        .bind(&draft.subject)
        .bind(&draft.class_level)
        .bind(draft.time_limit)
        .bind(draft.passing_score)
        .bind(draft.allow_retake)
        .bind(draft.show_correct_answers)
        .bind(draft.is_active)
        .bind(Utc::now())
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            tracing::error!("Failed to update quiz {}: {:?}", id, e);
            AppError::from(e)
        })?;

        if replaces_questions {
            sync_questions(&mut tx, id, &draft.questions).await?;
        }

        tx.commit().await?;
        self.get_for_management(id).await
    }

    /// Soft delete: hides the quiz from students, keeps its history.
    pub async fn deactivate(&self, id: i64) -> Result<Quiz, AppError> {
        let result = sqlx::query("UPDATE quizzes SET is_active = FALSE, updated_at = ? WHERE id = ?")
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to deactivate quiz {}: {:?}", id, e);
                AppError::from(e)
            })?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Quiz not found".to_string()));
        }

        self.get_for_management(id).await
    }

    /// Hard delete. Removes the quiz, its questions and every attempt against it
    /// in one transaction. Returns how many attempts were removed.
    pub async fn delete(&self, id: i64) -> Result<u64, AppError> {
        let mut tx = self.pool.begin().await?;

        let attempts_removed = AttemptLedger::delete_for_quiz(&mut tx, id).await?;

        sqlx::query("DELETE FROM questions WHERE quiz_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query("DELETE FROM quizzes WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                tracing::error!("Failed to delete quiz {}: {:?}", id, e);
                AppError::from(e)
            })?;

        if result.rows_affected() == 0 {
            // Dropping the transaction rolls back.
            return Err(AppError::NotFound("Quiz not found".to_string()));
        }

        tx.commit().await?;
        tracing::info!("Quiz {} deleted along with {} attempts", id, attempts_removed);
        Ok(attempts_removed)
    }

    /// Lists quizzes matching `filter`, newest first, answers included.
    /// Callers strip answers before handing the result to students.
    pub async fn list(&self, filter: &QuizFilter) -> Result<Vec<Quiz>, AppError> {
        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {} FROM quizzes WHERE 1 = 1", QUIZ_COLUMNS));

        if !filter.include_inactive {
            builder.push(" AND is_active = TRUE");
        }
        if let Some(class_level) = &filter.class_level {
            builder.push(" AND class_level = ");
            builder.push_bind(class_level.clone());
        }
        if let Some(subject) = &filter.subject {
            builder.push(" AND subject = ");
            builder.push_bind(subject.clone());
        }
        if let Some(creator) = &filter.creator {
            builder.push(" AND creator = ");
            builder.push_bind(creator.clone());
        }
        builder.push(" ORDER BY created_at DESC, id DESC");

        let rows: Vec<QuizRow> = builder
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to list quizzes: {:?}", e);
                AppError::from(e)
            })?;

        self.attach_questions(rows).await
    }

    /// Loads the given quizzes; ids that do not resolve are skipped.
    pub async fn find_many(&self, ids: &[i64]) -> Result<Vec<Quiz>, AppError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {} FROM quizzes WHERE id IN (", QUIZ_COLUMNS));
        let mut separated = builder.separated(",");
        for id in ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(")");

        let rows: Vec<QuizRow> = builder.build_query_as().fetch_all(&self.pool).await?;
        self.attach_questions(rows).await
    }

    pub async fn find(&self, id: i64) -> Result<Option<Quiz>, AppError> {
        let row = sqlx::query_as::<_, QuizRow>(&format!(
            "SELECT {} FROM quizzes WHERE id = ?",
            QUIZ_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to fetch quiz {}: {:?}", id, e);
            AppError::from(e)
        })?;

        match row {
            Some(row) => Ok(self.attach_questions(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    /// Full quiz with answers, active or not.
    pub async fn get_for_management(&self, id: i64) -> Result<Quiz, AppError> {
        self.find(id)
            .await?
            .ok_or(AppError::NotFound("Quiz not found".to_string()))
    }

    /// Answer-stripped quiz for a student. Inactive quizzes do not exist as far
    /// as students are concerned.
    pub async fn get_for_taking(&self, id: i64) -> Result<PublicQuiz, AppError> {
        match self.find(id).await? {
            Some(quiz) if quiz.is_active => Ok(quiz.without_answers()),
            _ => Err(AppError::NotFound("Quiz not found or inactive".to_string())),
        }
    }

    async fn attach_questions(&self, rows: Vec<QuizRow>) -> Result<Vec<Quiz>, AppError> {
        let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
        let mut by_quiz = self.load_questions(&ids).await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let questions = by_quiz.remove(&row.id).unwrap_or_default();
                Quiz::assemble(row, questions)
            })
            .collect())
    }

    async fn load_questions(&self, quiz_ids: &[i64]) -> Result<HashMap<i64, Vec<Question>>, AppError> {
        let mut by_quiz: HashMap<i64, Vec<Question>> = HashMap::new();
        if quiz_ids.is_empty() {
            return Ok(by_quiz);
        }

        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT id, quiz_id, position, text, options, correct_answer, explanation
             FROM questions WHERE quiz_id IN (",
        );
        let mut separated = builder.separated(",");
        for id in quiz_ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(") ORDER BY quiz_id, position, id");

        let questions: Vec<Question> = builder
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to fetch questions: {:?}", e);
                AppError::from(e)
            })?;

        for q in questions {
            by_quiz.entry(q.quiz_id).or_default().push(q);
        }
        Ok(by_quiz)
    }
}

/// Makes the stored questions of `quiz_id` match `questions` in order.
/// Inputs whose `id` already belongs to the quiz are updated in place so
/// their ids stay stable; everything else is inserted fresh.
async fn sync_questions(
    conn: &mut SqliteConnection,
    quiz_id: i64,
    questions: &[QuestionInput],
) -> Result<(), AppError> {
    let existing: HashSet<i64> = sqlx::query_scalar::<_, i64>("SELECT id FROM questions WHERE quiz_id = ?")
        .bind(quiz_id)
        .fetch_all(&mut *conn)
        .await?
        .into_iter()
        .collect();

    let kept: Vec<i64> = questions
        .iter()
        .filter_map(|q| q.id)
        .filter(|id| existing.contains(id))
        .collect();

    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("DELETE FROM questions WHERE quiz_id = ");
    builder.push_bind(quiz_id);
    if !kept.is_empty() {
        builder.push(" AND id NOT IN (");
        let mut separated = builder.separated(",");
        for id in &kept {
            separated.push_bind(*id);
        }
        separated.push_unseparated(")");
    }
    builder.build().execute(&mut *conn).await?;

    let mut seen = HashSet::new();
    for (position, q) in questions.iter().enumerate() {
        // A repeated id is treated as a new question rather than a second update.
        let reuse = q.id.filter(|id| existing.contains(id) && seen.insert(*id));

        match reuse {
            Some(question_id) => {
                sqlx::query(
                    r#"
                    UPDATE questions SET position = ?, text = ?, options = ?, correct_answer = ?, explanation = ?
                    WHERE id = ?
                    "#,
                )
                .bind(position as i64)
                .bind(&q.text)
                .bind(Json(&q.options))
                .bind(q.correct_answer.unwrap_or_default())
                .bind(&q.explanation)
                .bind(question_id)
                .execute(&mut *conn)
                .await?;
            }
            None => {
                sqlx::query(
                    r#"
                    INSERT INTO questions (quiz_id, position, text, options, correct_answer, explanation)
                    VALUES (?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(quiz_id)
                .bind(position as i64)
                .bind(&q.text)
                .bind(Json(&q.options))
                .bind(q.correct_answer.unwrap_or_default())
                .bind(&q.explanation)
                .execute(&mut *conn)
                .await
                .map_err(|e| {
                    tracing::error!("Failed to insert question for quiz {}: {:?}", quiz_id, e);
                    AppError::from(e)
                })?;
            }
        }
    }

    Ok(())
}
