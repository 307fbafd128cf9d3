// src/grading.rs

use std::collections::HashMap;

use crate::{
    error::AppError,
    models::{
        attempt::{
            AttemptAnswer, AttemptResult, DetailedAnswer, NewAttempt, SubmitQuizRequest,
            SubmittedAnswer, UNANSWERED,
        },
        quiz::Quiz,
    },
    store::{AttemptLedger, QuizStore, ledger::RETAKE_DENIED_MESSAGE},
};

/// Scored outcome of one submission, before it is written anywhere.
#[derive(Debug, Clone, PartialEq)]
pub struct Grade {
    pub answers: Vec<AttemptAnswer>,
    /// One entry per quiz question, in quiz order.
    pub detailed: Vec<DetailedAnswer>,
    pub score: i64,
    pub total_questions: i64,
    pub percentage: f64,
    pub passed: bool,
}

/// Rounds to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn percentage(score: i64, total_questions: i64) -> f64 {
    if total_questions <= 0 {
        return 0.0;
    }
    round2(score as f64 * 100.0 / total_questions as f64)
}

/// Rejects answers that point outside the quiz, and collapses repeated
/// answers for the same question to the last one sent.
pub fn check_answers(quiz: &Quiz, answers: &[SubmittedAnswer]) -> Result<Vec<SubmittedAnswer>, AppError> {
    let mut order: Vec<i64> = Vec::with_capacity(answers.len());
    let mut latest: HashMap<i64, &SubmittedAnswer> = HashMap::new();

    for answer in answers {
        let question = quiz.question(answer.question_id).ok_or_else(|| {
            AppError::InvalidAnswer(format!(
                "Question with ID {} not found in this quiz",
                answer.question_id
            ))
        })?;

        let option_count = question.options.len() as i64;
        if answer.selected_answer != UNANSWERED
            && (answer.selected_answer < 0 || answer.selected_answer >= option_count)
        {
            return Err(AppError::InvalidAnswer(format!(
                "Answer {} is not an option of question {}",
                answer.selected_answer, answer.question_id
            )));
        }

        if latest.insert(answer.question_id, answer).is_none() {
            order.push(answer.question_id);
        }
    }

    Ok(order.into_iter().map(|id| latest[&id].clone()).collect())
}

/// Pure scoring. `answers` must already have passed `check_answers`.
///
/// Questions with no submitted answer count as wrong, and the percentage is
/// taken over every question in the quiz, not just the answered ones.
pub fn grade(quiz: &Quiz, answers: &[SubmittedAnswer]) -> Grade {
    let by_question: HashMap<i64, &SubmittedAnswer> =
        answers.iter().map(|a| (a.question_id, a)).collect();

    let graded: Vec<AttemptAnswer> = answers
        .iter()
        .filter_map(|a| {
            let question = quiz.question(a.question_id)?;
            Some(AttemptAnswer {
                question_id: a.question_id,
                selected_answer: a.selected_answer,
                is_correct: a.selected_answer != UNANSWERED
                    && a.selected_answer == question.correct_answer,
                time_taken: a.time_taken,
            })
        })
        .collect();

    let correctness: HashMap<i64, bool> = graded.iter().map(|a| (a.question_id, a.is_correct)).collect();

    let detailed: Vec<DetailedAnswer> = quiz
        .questions
        .iter()
        .map(|q| DetailedAnswer {
            question_id: q.id,
            question: q.text.clone(),
            options: q.options.0.clone(),
            correct_answer: Some(q.correct_answer),
            user_answer: by_question.get(&q.id).map(|a| a.selected_answer).unwrap_or(UNANSWERED),
            is_correct: correctness.get(&q.id).copied().unwrap_or(false),
            explanation: q.explanation.clone(),
        })
        .collect();

    let score = graded.iter().filter(|a| a.is_correct).count() as i64;
    let total_questions = quiz.questions.len() as i64;
    let percentage = percentage(score, total_questions);

    Grade {
        answers: graded,
        detailed,
        score,
        total_questions,
        percentage,
        passed: percentage >= quiz.passing_score,
    }
}

/// Turns a submission into a ledger entry and a result for the student.
#[derive(Clone)]
pub struct GradingEngine {
    quizzes: QuizStore,
    ledger: AttemptLedger,
}

impl GradingEngine {
    pub fn new(quizzes: QuizStore, ledger: AttemptLedger) -> Self {
        Self { quizzes, ledger }
    }

    /// Preconditions are checked in order: the quiz exists and is active,
    /// the retake policy allows another attempt, every answer belongs to the quiz.
    pub async fn submit(&self, quiz_id: i64, req: &SubmitQuizRequest) -> Result<AttemptResult, AppError> {
        let quiz = match self.quizzes.find(quiz_id).await? {
            Some(quiz) if quiz.is_active => quiz,
            _ => return Err(AppError::NotFound("Quiz not found or inactive".to_string())),
        };

        if !quiz.allow_retake && self.ledger.has_completed(quiz_id, &req.student_id).await? {
            tracing::info!("Retake denied for quiz {} by {}", quiz_id, req.student_id);
            return Err(AppError::RetakeDenied(RETAKE_DENIED_MESSAGE.to_string()));
        }

        let answers = check_answers(&quiz, &req.answers).inspect_err(|e| {
            tracing::warn!("Rejected submission for quiz {} by {}: {}", quiz_id, req.student_id, e);
        })?;

        let grade = grade(&quiz, &answers);

        let attempt = NewAttempt {
            quiz_id,
            student_id: req.student_id.clone(),
            answers: grade.answers,
            detailed_answers: grade.detailed.clone(),
            score: grade.score,
            percentage: grade.percentage,
            total_questions: grade.total_questions,
            time_taken: req.time_taken_minutes,
            passed: grade.passed,
            single_attempt: !quiz.allow_retake,
        };

        let attempt_id = self.ledger.append(&attempt).await?;

        tracing::info!(
            "Attempt {} recorded: quiz {} student {} score {}/{} ({}%)",
            attempt_id,
            quiz_id,
            req.student_id,
            grade.score,
            grade.total_questions,
            grade.percentage
        );

        Ok(AttemptResult {
            attempt_id,
            score: grade.score,
            total_questions: grade.total_questions,
            percentage: grade.percentage,
            passed: grade.passed,
            time_taken: req.time_taken_minutes,
            detailed_answers: quiz.show_correct_answers.then_some(grade.detailed),
        })
    }
}
