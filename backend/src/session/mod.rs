// src/session/mod.rs
//
// Client-side attempt session: one student working through one quiz.
// The session owns its answers and its countdown; the server only sees the
// final submission.

pub mod client;
pub mod countdown;
pub mod driver;

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;

use crate::{
    error::ErrorKind,
    models::{
        attempt::{AttemptResult, SubmitQuizRequest, SubmittedAnswer, UNANSWERED},
        quiz::{PublicQuestion, PublicQuiz},
    },
};

pub use client::{ApiError, HttpQuizApi, LocalQuizApi, QuizApi};
pub use countdown::Countdown;
pub use driver::{SessionHandle, SessionSnapshot, SessionUpdate};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SessionError {
    #[error("session is not in progress")]
    NotInProgress,

    #[error("attempt has already been submitted")]
    AlreadySubmitted,

    #[error("submitting requires confirmation while time remains")]
    ConfirmationRequired,

    #[error("question {0} is not part of this quiz")]
    UnknownQuestion(i64),

    #[error("option {option} is out of range for question {question_id}")]
    OptionOutOfRange { question_id: i64, option: i64 },

    #[error("question index {0} is out of range")]
    NoSuchIndex(usize),

    #[error("{message}")]
    Rejected { kind: ErrorKind, message: String },

    #[error("temporarily unavailable: {0}")]
    Transient(String),

    #[error("session task has stopped")]
    Closed,
}

impl SessionError {
    /// Worth trying the same action again later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SessionError::Transient(_))
    }
}

impl From<ApiError> for SessionError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Rejected { kind, message } => SessionError::Rejected { kind, message },
            ApiError::Transient(message) => SessionError::Transient(message),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    NotStarted,
    InProgress,
    /// Submitted by the student before time ran out.
    Submitted(AttemptResult),
    /// Time ran out and the answers were submitted automatically.
    Expired(AttemptResult),
    /// Left without submitting. Nothing reaches the server.
    Abandoned,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionState::Submitted(_) | SessionState::Expired(_) | SessionState::Abandoned
        )
    }

    pub fn result(&self) -> Option<&AttemptResult> {
        match self {
            SessionState::Submitted(r) | SessionState::Expired(r) => Some(r),
            _ => None,
        }
    }
}

/// Single-writer state machine for one attempt.
///
/// `NotStarted -> InProgress -> {Submitted, Expired}`, with `Abandoned`
/// reachable from the first two. A failed submission leaves the session
/// `InProgress` with every answer intact and the failure in `last_error`.
///
/// Submitting takes `&mut self`, so two submissions can never overlap; once
/// one succeeds the terminal state turns away every later trigger. A submit
/// future dropped mid-flight leaves the session as it was.
pub struct AttemptSession<A: QuizApi> {
    api: A,
    quiz_id: i64,
    student_id: String,
    state: SessionState,
    quiz: Option<PublicQuiz>,
    answers: HashMap<i64, i64>,
    time_spent: HashMap<i64, Duration>,
    current: usize,
    entered_at: Option<Instant>,
    countdown: Option<Countdown>,
    time_up: bool,
    last_error: Option<SessionError>,
}

impl<A: QuizApi> AttemptSession<A> {
    pub fn new(api: A, quiz_id: i64, student_id: impl Into<String>) -> Self {
        Self {
            api,
            quiz_id,
            student_id: student_id.into(),
            state: SessionState::NotStarted,
            quiz: None,
            answers: HashMap::new(),
            time_spent: HashMap::new(),
            current: 0,
            entered_at: None,
            countdown: None,
            time_up: false,
            last_error: None,
        }
    }

    /// Fetches the quiz without answer keys and starts the clock.
    pub async fn start(&mut self) -> Result<&PublicQuiz, SessionError> {
        if self.state != SessionState::NotStarted {
            return Err(SessionError::NotInProgress);
        }

        let quiz = self.api.fetch_for_taking(self.quiz_id).await?;
        tracing::debug!(
            "Starting quiz {} for {} ({} questions, {} min)",
            quiz.id,
            self.student_id,
            quiz.questions.len(),
            quiz.time_limit
        );

        self.countdown = Some(Countdown::for_minutes(quiz.time_limit));
        self.entered_at = Some(Instant::now());
        self.current = 0;
        self.state = SessionState::InProgress;
        Ok(self.quiz.insert(quiz))
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn quiz(&self) -> Option<&PublicQuiz> {
        self.quiz.as_ref()
    }

    pub fn countdown(&self) -> Option<&Countdown> {
        self.countdown.as_ref()
    }

    pub fn remaining(&self) -> Duration {
        self.countdown.as_ref().map(Countdown::remaining).unwrap_or_default()
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current_question(&self) -> Option<&PublicQuestion> {
        self.quiz.as_ref()?.questions.get(self.current)
    }

    /// The option picked for a question, if any.
    pub fn selection(&self, question_id: i64) -> Option<i64> {
        self.answers.get(&question_id).copied()
    }

    /// Why the most recent submission failed. Cleared by the next success.
    pub fn last_error(&self) -> Option<&SessionError> {
        self.last_error.as_ref()
    }

    pub fn answered_count(&self) -> usize {
        self.answers.len()
    }

    /// Seconds spent on a question so far, including the visit in progress.
    pub fn time_on(&self, question_id: i64) -> Duration {
        let mut spent = self.time_spent.get(&question_id).copied().unwrap_or_default();
        if self.current_question().map(|q| q.id) == Some(question_id) {
            if let Some(entered) = self.entered_at {
                spent += entered.elapsed();
            }
        }
        spent
    }

    /// Jumps to any question. Order is never enforced.
    pub fn go_to(&mut self, index: usize) -> Result<&PublicQuestion, SessionError> {
        self.ensure_in_progress()?;
        let len = self.question_count();
        if index >= len {
            return Err(SessionError::NoSuchIndex(index));
        }
        self.bank_time();
        self.current = index;
        self.entered_at = Some(Instant::now());
        self.current_question().ok_or(SessionError::NoSuchIndex(index))
    }

    pub fn next(&mut self) -> Result<&PublicQuestion, SessionError> {
        self.go_to(self.current + 1)
    }

    pub fn previous(&mut self) -> Result<&PublicQuestion, SessionError> {
        let index = self.current.checked_sub(1).ok_or(SessionError::NoSuchIndex(0))?;
        self.go_to(index)
    }

    /// Records a selection, replacing any earlier one for the same question.
    pub fn select(&mut self, question_id: i64, option: i64) -> Result<(), SessionError> {
        self.ensure_in_progress()?;
        let question = self
            .quiz
            .as_ref()
            .and_then(|q| q.questions.iter().find(|q| q.id == question_id))
            .ok_or(SessionError::UnknownQuestion(question_id))?;

        if option < 0 || option >= question.options.len() as i64 {
            return Err(SessionError::OptionOutOfRange { question_id, option });
        }

        self.answers.insert(question_id, option);
        Ok(())
    }

    pub fn clear(&mut self, question_id: i64) -> Result<(), SessionError> {
        self.ensure_in_progress()?;
        if !self.has_question(question_id) {
            return Err(SessionError::UnknownQuestion(question_id));
        }
        self.answers.remove(&question_id);
        Ok(())
    }

    /// The payload a submission would send right now: one entry per question
    /// in quiz order, unanswered ones as `UNANSWERED`.
    pub fn submission(&self) -> SubmitQuizRequest {
        let answers = self
            .quiz
            .iter()
            .flat_map(|q| q.questions.iter())
            .map(|q| SubmittedAnswer {
                question_id: q.id,
                selected_answer: self.selection(q.id).unwrap_or(UNANSWERED),
                time_taken: Some(self.time_on(q.id).as_secs() as i64),
            })
            .collect();

        SubmitQuizRequest {
            student_id: self.student_id.clone(),
            answers,
            time_taken_minutes: self.countdown.as_ref().map(Countdown::elapsed_minutes).unwrap_or(0),
        }
    }

    /// Manual submit. `confirmed` stands for the explicit confirmation gesture,
    /// which is not needed once time has run out.
    pub async fn submit(&mut self, confirmed: bool) -> Result<AttemptResult, SessionError> {
        self.ensure_submittable()?;
        if self
            .countdown
            .as_ref()
            .is_some_and(|c| c.is_expired() && !c.is_cancelled())
        {
            self.time_up = true;
        }
        if !confirmed && !self.time_up {
            return Err(SessionError::ConfirmationRequired);
        }

        self.dispatch().await
    }

    /// Auto-submit on expiry. Takes the same path as a manual submit.
    pub async fn expire(&mut self) -> Result<AttemptResult, SessionError> {
        self.ensure_submittable()?;
        self.time_up = true;
        tracing::info!(
            "Time is up on quiz {} for {}, submitting {} answers",
            self.quiz_id,
            self.student_id,
            self.answers.len()
        );
        self.dispatch().await
    }

    /// Leaves without submitting. Answers are discarded with the session.
    pub fn abandon(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        if let Some(countdown) = &self.countdown {
            countdown.cancel();
        }
        tracing::debug!("Quiz {} abandoned by {}", self.quiz_id, self.student_id);
        self.state = SessionState::Abandoned;
    }

    async fn dispatch(&mut self) -> Result<AttemptResult, SessionError> {
        let payload = self.submission();

        match self.api.submit(self.quiz_id, &payload).await {
            Ok(result) => {
                if let Some(countdown) = &self.countdown {
                    countdown.cancel();
                }
                self.bank_time();
                self.entered_at = None;
                self.state = if self.time_up {
                    SessionState::Expired(result.clone())
                } else {
                    SessionState::Submitted(result.clone())
                };
                self.last_error = None;
                Ok(result)
            }
            Err(err) => {
                tracing::warn!(
                    "Submission of quiz {} for {} failed: {}",
                    self.quiz_id,
                    self.student_id,
                    err
                );
                let err = SessionError::from(err);
                self.last_error = Some(err.clone());
                Err(err)
            }
        }
    }

    /// Only a recorded attempt counts as submitted; an abandoned session never
    /// reached the server.
    fn ensure_submittable(&self) -> Result<(), SessionError> {
        if self.state.result().is_some() {
            return Err(SessionError::AlreadySubmitted);
        }
        self.ensure_in_progress()
    }

    fn ensure_in_progress(&self) -> Result<(), SessionError> {
        if self.state == SessionState::InProgress {
            Ok(())
        } else {
            Err(SessionError::NotInProgress)
        }
    }

    fn question_count(&self) -> usize {
        self.quiz.as_ref().map(|q| q.questions.len()).unwrap_or(0)
    }

    fn has_question(&self, question_id: i64) -> bool {
        self.quiz
            .as_ref()
            .is_some_and(|q| q.questions.iter().any(|q| q.id == question_id))
    }

    /// Moves the running visit's time into the per-question total.
    fn bank_time(&mut self) {
        let Some(entered) = self.entered_at else { return };
        let Some(id) = self.current_question().map(|q| q.id) else { return };
        *self.time_spent.entry(id).or_default() += entered.elapsed();
        self.entered_at = Some(Instant::now());
    }
}
