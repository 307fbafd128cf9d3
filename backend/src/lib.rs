// src/lib.rs

pub mod analytics;
pub mod config;
pub mod db;
pub mod error;
pub mod grading;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod session;
pub mod state;
pub mod store;
pub mod utils;

// Router entry point.
pub use routes::create_router;
