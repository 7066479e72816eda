use axum::{
    Router,
    extract::{FromRef, Request},
    http::HeaderName,
    middleware::{self, Next},
    response::Response,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

pub mod auth;
pub mod catalog;
pub mod config;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod models;
pub mod ordering;
pub mod progress;
pub mod repository;
pub mod storage;

// Routers segregated by access level (public, authenticated, admin).
pub mod routes;
use auth::AuthUser;
use routes::{admin, authenticated, public};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use error::{AppError, AppResult};
pub use repository::{PostgresRepository, RepositoryState};
pub use storage::{MockStorageService, S3StorageClient, StorageState};

/// ApiDoc
///
/// OpenAPI document for every handler and payload, served at `/api-docs/openapi.json` and
/// browsable at `/swagger-ui`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::register, handlers::login, handlers::get_me,
        handlers::list_categories, handlers::list_courses, handlers::get_course,
        handlers::list_course_items, handlers::create_course, handlers::update_course,
        handlers::delete_course, handlers::add_module_item, handlers::add_workshop_item,
        handlers::reorder_course_items, handlers::toggle_favorite, handlers::enroll,
        handlers::list_my_enrollments, handlers::get_course_progress, handlers::get_course_item,
        handlers::complete_module, handlers::register_workshop, handlers::submit_workshop,
        handlers::get_profile, handlers::update_profile, handlers::apply_corporation,
        handlers::get_corporation_application, handlers::list_learning_paths,
        handlers::add_learning_path_item, handlers::reorder_learning_path,
        handlers::get_presigned_url, handlers::get_admin_stats, handlers::list_users,
        handlers::list_corporation_requests, handlers::verify_corporation,
        handlers::unverify_corporation, handlers::grade_submission
    ),
    components(
        schemas(
            models::Role, models::VerificationStatus, models::Gender, models::CourseLevel,
            models::CourseItemType, models::EnrollmentStatus, models::User, models::Profile,
            models::CorporationVerification, models::CorporationRequest, models::Category,
            models::Course, models::CourseSummary, models::CourseItem, models::CourseItemSummary,
            models::CourseDetail, models::Module, models::Workshop, models::Enrollment,
            models::EnrolledCourse, models::ModuleProgress, models::WorkshopRegistration,
            models::WorkshopSubmission, models::CourseRef, models::ModuleDetail,
            models::SubmissionSummary, models::WorkshopDetail, models::CourseItemDetail,
            models::LearningPath, models::LearningPathItem, models::LearningPathCourse,
            models::LearningPathWithItems, models::RegisterRequest, models::LoginRequest,
            models::LoginResponse, models::CreateCourseRequest, models::UpdateCourseRequest,
            models::CreateModuleItemRequest, models::CreateWorkshopItemRequest,
            models::ReorderItem, models::ReorderRequest, models::SubmissionRequest,
            models::GradeSubmissionRequest, models::UpdateProfileRequest,
            models::AddLearningPathItemRequest, models::UploadPurpose,
            models::PresignedUrlRequest, models::PresignedUrlResponse, models::MessageResponse,
            models::FavoriteResponse, models::ProgressResponse, models::SubmissionOutcome,
            models::ProfileResponse, models::ProfileUpdateResponse, models::UserProfile,
            models::AdminDashboardStats,
        )
    ),
    tags(
        (name = "edutia", description = "Edutia learning platform API")
    )
)]
struct ApiDoc;

/// AppState
///
/// Everything a handler may need, cloned cheaply per request.
#[derive(Clone)]
pub struct AppState {
    /// Persistence (Postgres in production, mocks in tests).
    pub repo: RepositoryState,
    /// Presigned upload URLs (S3/MinIO).
    pub storage: StorageState,
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

// Let extractors such as `AuthUser` pull single components out of `AppState`.

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for StorageState {
    fn from_ref(app_state: &AppState) -> StorageState {
        app_state.storage.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// auth_middleware
///
/// Runs the `AuthUser` extractor ahead of the authenticated routes. A missing, invalid or
/// expired token (or a user that no longer exists) is rejected with 401 before any handler runs.
async fn auth_middleware(_auth_user: AuthUser, request: Request, next: Next) -> Response {
    next.run(request).await
}

/// create_router
///
/// Assembles public, authenticated and admin routes, then wraps them in the request-id,
/// tracing and CORS layers.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(
            authenticated::authenticated_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth_middleware,
            )),
        )
        // Admin handlers extract `AuthUser` themselves and then check the role.
        .nest("/admin", admin::admin_routes())
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Span for one HTTP request, tagged with the `x-request-id` set by `SetRequestIdLayer` so
/// every log line of the request can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
