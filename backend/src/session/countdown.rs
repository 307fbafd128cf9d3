// src/session/countdown.rs

use std::time::Duration;

use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;

/// A single cancellable deadline for one attempt.
///
/// Cloning shares the deadline and the cancellation token, so the session and
/// its driver task observe the same clock.
#[derive(Debug, Clone)]
pub struct Countdown {
    started_at: Instant,
    deadline: Instant,
    token: CancellationToken,
}

impl Countdown {
    pub fn start(limit: Duration) -> Self {
        let started_at = Instant::now();
        Self {
            started_at,
            deadline: started_at + limit,
            token: CancellationToken::new(),
        }
    }

    pub fn for_minutes(minutes: i64) -> Self {
        Self::start(Duration::from_secs(minutes.max(0) as u64 * 60))
    }

    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Whole minutes elapsed, rounded to the nearest minute.
    pub fn elapsed_minutes(&self) -> i64 {
        ((self.elapsed().as_secs_f64()) / 60.0).round() as i64
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.deadline
    }

    /// Tears the timer down. Pending `expired()` futures resolve to `false`.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves `true` once the deadline passes, or `false` if the countdown
    /// was cancelled first. A cancelled countdown never reports expiry.
    pub async fn expired(&self) -> bool {
        if self.token.is_cancelled() {
            return false;
        }
        tokio::select! {
            biased;
            _ = self.token.cancelled() => false,
            _ = sleep_until(self.deadline) => true,
        }
    }
}
