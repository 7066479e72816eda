use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, patch, post},
};

/// Admin Router Module
///
/// Nested under `/admin`. Each handler extracts `AuthUser` (401 without a session) and then
/// calls `require_admin` (403 for everyone else).
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // GET /admin/stats
        // Users, courses, enrollments and pending corporation applications.
        .route("/stats", get(handlers::get_admin_stats))
        .route("/users", get(handlers::list_users))
        // GET /admin/corporations?status=PENDING
        .route("/corporations", get(handlers::list_corporation_requests))
        // Status and role change in one transaction.
        .route(
            "/corporations/{id}/verify",
            post(handlers::verify_corporation),
        )
        .route(
            "/corporations/{id}/unverify",
            post(handlers::unverify_corporation),
        )
        .route("/submissions/{id}", patch(handlers::grade_submission))
}
