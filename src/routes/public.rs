use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints reachable without a session. Catalog reads only ever return published courses
/// (admins excepted on the detail page, via `MaybeAuthUser`); a signed-in caller additionally
/// gets their favorite and completion flags.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for the load balancer.
        .route("/health", get(|| async { "ok" }))
        // --- Identity ---
        .route("/auth/register", post(handlers::register))
        .route("/auth/login", post(handlers::login))
        // --- Catalog ---
        .route("/categories", get(handlers::list_categories))
        // GET /courses?search=&category=&level=&duration=&rating=&sort=
        // `level` and `duration` may repeat.
        .route("/courses", get(handlers::list_courses))
        // GET /courses/{id}
        // `id` is the course uuid or its slug.
        .route("/courses/{id}", get(handlers::get_course))
        .route("/courses/{id}/items", get(handlers::list_course_items))
        .route("/learning-paths", get(handlers::list_learning_paths))
}
