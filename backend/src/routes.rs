// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{get, post, put},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{analytics, attempt, quiz},
    state::AppState,
    utils::jwt::{auth_middleware, teacher_middleware},
};

/// Assembles the main application router.
///
/// * Every quiz route requires a valid bearer token.
/// * Management and analytics routes additionally require the teacher role.
/// * Applies global middleware (Trace, CORS).
pub fn create_router(state: AppState) -> Router {
    let origins = [
        HeaderValue::from_static("http://localhost:3000"),
        HeaderValue::from_static("http://127.0.0.1:3000"),
    ];

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let teacher_routes = Router::new()
        .route("/overview", get(analytics::get_overview))
        .route("/{id}/manage", get(quiz::get_for_management))
        .route("/{id}/attempts", get(attempt::quiz_attempts))
        .route("/{id}/stats", get(analytics::get_quiz_stats))
        .route_layer(middleware::from_fn(teacher_middleware));

    let quiz_routes = Router::new()
        .route("/", get(quiz::list_quizzes).post(quiz::create_quiz))
        .route("/subjects", get(quiz::list_subjects))
        .route("/attempts/{student_id}", get(attempt::student_history))
        .route("/attempt/{attempt_id}", get(attempt::get_attempt))
        .route("/{id}", put(quiz::update_quiz).delete(quiz::delete_quiz))
        .route("/{id}/take", get(quiz::get_for_taking))
        .route("/{id}/submit", post(attempt::submit_quiz))
        .route("/{id}/deactivate", post(quiz::deactivate_quiz))
        .route("/{id}/results/{student_id}", get(analytics::get_student_results))
        .merge(teacher_routes)
        // Auth runs first, then the teacher check on the routes above that carry it.
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .nest("/api/quizzes", quiz_routes)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
