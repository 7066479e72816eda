use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, patch, post, put},
};

/// Authenticated Router Module
///
/// Every route here sits behind `auth_middleware`, so handlers always receive a resolved
/// `AuthUser`. Catalog mutations are additionally admin-only; that check happens inside the
/// handler with `require_admin`.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // --- Account ---
        .route("/me", get(handlers::get_me))
        .route("/me/enrollments", get(handlers::list_my_enrollments))
        .route(
            "/profile",
            get(handlers::get_profile).put(handlers::update_profile),
        )
        .route("/corporation/apply", post(handlers::apply_corporation))
        .route(
            "/corporation/application",
            get(handlers::get_corporation_application),
        )
        // --- Course administration (admin) ---
        .route("/courses", post(handlers::create_course))
        // PUT/DELETE share the path with the public GET; axum merges the method routers.
        .route(
            "/courses/{id}",
            put(handlers::update_course).delete(handlers::delete_course),
        )
        .route("/courses/{id}/items/module", post(handlers::add_module_item))
        .route(
            "/courses/{id}/items/workshop",
            post(handlers::add_workshop_item),
        )
        .route(
            "/courses/{id}/items/reorder",
            patch(handlers::reorder_course_items),
        )
        // --- Learning ---
        // GET /courses/{id}/items/{item}
        // Item content, for enrolled users only.
        .route("/courses/{id}/items/{item}", get(handlers::get_course_item))
        .route("/courses/{id}/enroll", post(handlers::enroll))
        .route("/courses/{id}/favorite", post(handlers::toggle_favorite))
        .route("/courses/{id}/progress", get(handlers::get_course_progress))
        // POST /modules/{id}/complete
        // Upserts the completion and recomputes the enrollment in one transaction.
        .route("/modules/{id}/complete", post(handlers::complete_module))
        .route(
            "/workshops/{id}/registration",
            post(handlers::register_workshop),
        )
        .route(
            "/workshops/{id}/submissions",
            post(handlers::submit_workshop),
        )
        // --- Learning paths (admin) ---
        .route(
            "/learning-paths/{id}/items",
            post(handlers::add_learning_path_item),
        )
        .route(
            "/learning-paths/{id}/items/reorder",
            patch(handlers::reorder_learning_path),
        )
        // POST /uploads/presigned
        // Short-lived signed PUT URL; the browser uploads straight to the bucket.
        .route("/uploads/presigned", post(handlers::get_presigned_url))
}
