// src/state.rs

use crate::config::Config;
use crate::grading::GradingEngine;
use crate::store::{AttemptLedger, QuizStore};
use axum::extract::FromRef;
use sqlx::SqlitePool;

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub config: Config,
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

impl FromRef<AppState> for QuizStore {
    fn from_ref(state: &AppState) -> Self {
        QuizStore::new(state.pool.clone())
    }
}

impl FromRef<AppState> for AttemptLedger {
    fn from_ref(state: &AppState) -> Self {
        AttemptLedger::new(state.pool.clone())
    }
}

impl FromRef<AppState> for GradingEngine {
    fn from_ref(state: &AppState) -> Self {
        GradingEngine::new(
            QuizStore::new(state.pool.clone()),
            AttemptLedger::new(state.pool.clone()),
        )
    }
}
