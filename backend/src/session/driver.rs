// src/session/driver.rs

use std::time::Duration;

use tokio::{
    sync::{mpsc, oneshot, watch},
    task::JoinHandle,
    time::{Instant, sleep_until},
};

use super::{AttemptSession, Countdown, QuizApi, SessionError, SessionState};
use crate::models::{
    attempt::AttemptResult,
    quiz::{PublicQuestion, PublicQuiz},
};

/// Pause before retrying an automatic submission that failed.
pub const AUTO_SUBMIT_RETRY: Duration = Duration::from_secs(5);

const COMMAND_BUFFER: usize = 16;

type Reply<T> = oneshot::Sender<T>;

enum Command {
    Select {
        question_id: i64,
        option: i64,
        reply: Reply<Result<(), SessionError>>,
    },
    Clear {
        question_id: i64,
        reply: Reply<Result<(), SessionError>>,
    },
    GoTo {
        index: usize,
        reply: Reply<Result<PublicQuestion, SessionError>>,
    },
    Submit {
        confirmed: bool,
        reply: Reply<Result<AttemptResult, SessionError>>,
    },
    Snapshot {
        reply: Reply<SessionSnapshot>,
    },
    Abandon {
        reply: Reply<()>,
    },
}

/// Point-in-time view of a running session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub current_index: usize,
    pub answered: usize,
    pub remaining: Duration,
    pub last_error: Option<SessionError>,
}

/// What `watch()` subscribers see: the state plus the latest failed submission.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionUpdate {
    pub state: SessionState,
    pub last_error: Option<SessionError>,
}

impl SessionUpdate {
    fn of<A: QuizApi>(session: &AttemptSession<A>) -> Self {
        Self {
            state: session.state().clone(),
            last_error: session.last_error().cloned(),
        }
    }

    /// Terminal, or stuck on a failure that retrying will not fix.
    pub fn is_settled(&self) -> bool {
        self.state.is_terminal()
            || self.last_error.as_ref().is_some_and(|e| !e.is_retryable())
    }

    fn outcome(&self) -> Result<SessionState, SessionError> {
        match &self.last_error {
            Some(err) if !self.state.is_terminal() && !err.is_retryable() => Err(err.clone()),
            _ => Ok(self.state.clone()),
        }
    }
}

/// Runs an `AttemptSession` on its own task.
///
/// Commands are applied one at a time, so a click on "submit" and the clock
/// running out can never both reach the server. When the countdown expires the
/// task submits on its own; watchers see the terminal state, or the failure
/// that kept the session open, through `watch()`.
pub struct SessionHandle {
    commands: mpsc::Sender<Command>,
    updates: watch::Receiver<SessionUpdate>,
    task: JoinHandle<()>,
}

impl SessionHandle {
    /// Starts the session and hands it to a background task.
    pub async fn spawn<A>(mut session: AttemptSession<A>) -> Result<(Self, PublicQuiz), SessionError>
    where
        A: QuizApi + 'static,
    {
        let quiz = session.start().await?.clone();

        let (commands, rx) = mpsc::channel(COMMAND_BUFFER);
        let (updates_tx, updates) = watch::channel(SessionUpdate::of(&session));
        let task = tokio::spawn(run(session, rx, updates_tx));

        Ok((Self { commands, updates, task }, quiz))
    }

    pub async fn select(&self, question_id: i64, option: i64) -> Result<(), SessionError> {
        self.request(|reply| Command::Select {
            question_id,
            option,
            reply,
        })
        .await?
    }

    pub async fn clear(&self, question_id: i64) -> Result<(), SessionError> {
        self.request(|reply| Command::Clear { question_id, reply }).await?
    }

    pub async fn go_to(&self, index: usize) -> Result<PublicQuestion, SessionError> {
        self.request(|reply| Command::GoTo { index, reply }).await?
    }

    /// Manual submit; `confirmed` is the explicit confirmation gesture.
    pub async fn submit(&self, confirmed: bool) -> Result<AttemptResult, SessionError> {
        self.request(|reply| Command::Submit { confirmed, reply }).await?
    }

    pub async fn snapshot(&self) -> Result<SessionSnapshot, SessionError> {
        self.request(|reply| Command::Snapshot { reply }).await
    }

    pub async fn abandon(&self) -> Result<(), SessionError> {
        self.request(|reply| Command::Abandon { reply }).await
    }

    /// Follows state changes, including the automatic submission on expiry
    /// and any submission failure.
    pub fn watch(&self) -> watch::Receiver<SessionUpdate> {
        self.updates.clone()
    }

    /// Waits until the session reaches a terminal state. A rejected submission
    /// ends the wait with the rejection; the session itself stays open with
    /// its answers.
    pub async fn finished(&self) -> Result<SessionState, SessionError> {
        let mut rx = self.updates.clone();
        if let Ok(update) = rx.wait_for(SessionUpdate::is_settled).await {
            return update.outcome();
        }
        rx.borrow().outcome()
    }

    /// Drops the command channel and waits for the task. An unfinished
    /// session is abandoned.
    pub async fn close(self) {
        drop(self.commands);
        if let Err(e) = self.task.await {
            tracing::error!("Session task failed: {:?}", e);
        }
    }

    async fn request<T>(&self, make: impl FnOnce(Reply<T>) -> Command) -> Result<T, SessionError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(make(reply))
            .await
            .map_err(|_| SessionError::Closed)?;
        response.await.map_err(|_| SessionError::Closed)
    }
}

async fn run<A: QuizApi>(
    mut session: AttemptSession<A>,
    mut commands: mpsc::Receiver<Command>,
    updates: watch::Sender<SessionUpdate>,
) {
    let mut retry_at: Option<Instant> = None;
    let mut auto_submit = true;

    loop {
        let countdown = session.countdown().cloned();
        let armed = auto_submit && *session.state() == SessionState::InProgress;

        tokio::select! {
            command = commands.recv() => match command {
                Some(command) => apply(&mut session, command).await,
                None => {
                    session.abandon();
                    updates.send_replace(SessionUpdate::of(&session));
                    break;
                }
            },
            _ = auto_submit_due(countdown, retry_at), if armed => {
                match session.expire().await {
                    Ok(result) => {
                        tracing::info!("Auto-submitted attempt {}", result.attempt_id);
                        retry_at = None;
                    }
                    Err(e) if e.is_retryable() => {
                        tracing::warn!("Auto-submit failed, retrying in {:?}: {}", AUTO_SUBMIT_RETRY, e);
                        retry_at = Some(Instant::now() + AUTO_SUBMIT_RETRY);
                    }
                    Err(e) => {
                        // The same answers would be rejected again. The session
                        // stays open so the student can see why.
                        tracing::warn!("Auto-submit rejected, not retrying: {}", e);
                        auto_submit = false;
                    }
                }
            }
        }

        let latest = SessionUpdate::of(&session);
        updates.send_if_modified(|current| {
            if *current != latest {
                *current = latest;
                true
            } else {
                false
            }
        });
    }
}

/// Resolves when the countdown has run out and any retry pause has passed.
/// Never resolves for a cancelled countdown.
async fn auto_submit_due(countdown: Option<Countdown>, retry_at: Option<Instant>) {
    let Some(countdown) = countdown else {
        return std::future::pending().await;
    };
    if !countdown.expired().await {
        return std::future::pending().await;
    }
    if let Some(at) = retry_at {
        sleep_until(at).await;
    }
}

async fn apply<A: QuizApi>(session: &mut AttemptSession<A>, command: Command) {
    // A dropped reply means the caller stopped waiting; nothing to do about it.
    match command {
        Command::Select {
            question_id,
            option,
            reply,
        } => {
            let _ = reply.send(session.select(question_id, option));
        }
        Command::Clear { question_id, reply } => {
            let _ = reply.send(session.clear(question_id));
        }
        Command::GoTo { index, reply } => {
            let _ = reply.send(session.go_to(index).cloned());
        }
        Command::Submit { confirmed, reply } => {
            let _ = reply.send(session.submit(confirmed).await);
        }
        Command::Snapshot { reply } => {
            let _ = reply.send(SessionSnapshot {
                state: session.state().clone(),
                current_index: session.current_index(),
                answered: session.answered_count(),
                remaining: session.remaining(),
                last_error: session.last_error().cloned(),
            });
        }
        Command::Abandon { reply } => {
            session.abandon();
            let _ = reply.send(());
        }
    }
}
