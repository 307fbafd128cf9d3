// src/config.rs

use std::env;
use std::net::SocketAddr;
use std::time::Duration;
use dotenvy::dotenv;

/// Minimum number of options a question may carry.
pub const MIN_OPTIONS: usize = 2;

/// Maximum number of options a question may carry.
pub const MAX_OPTIONS: usize = 4;

pub const DEFAULT_TIME_LIMIT_MINUTES: i64 = 30;
pub const MAX_TIME_LIMIT_MINUTES: i64 = 600;

/// Percentage needed to pass when the author does not pick one.
pub const DEFAULT_PASSING_SCORE: f64 = 60.0;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_expiration: u64,
    pub rust_log: String,
    pub bind_addr: SocketAddr,
    pub log_dir: String,
    pub submit_timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .expect("DATABASE_URL must be set");

        let jwt_secret = env::var("JWT_SECRET")
            .expect("JWT_SECRET must be set");

        let jwt_expiration = env::var("JWT_EXPIRATION")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(3600);

        let rust_log = env::var("RUST_LOG")
            .unwrap_or_else(|_| "info".to_string());

        let bind_addr = env::var("BIND_ADDR")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

        let log_dir = env::var("LOG_DIR").unwrap_or_else(|_| "logs".to_string());

        let submit_timeout_secs = env::var("SUBMIT_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(10);

        Self {
            database_url,
            jwt_secret,
            jwt_expiration,
            rust_log,
            bind_addr,
            log_dir,
            submit_timeout_secs,
        }
    }

    /// Bound applied to every call a session client makes.
    pub fn submit_timeout(&self) -> Duration {
        Duration::from_secs(self.submit_timeout_secs)
    }
}
