use crate::{
    AppState,
    auth::{self, AuthUser, MaybeAuthUser, require_admin},
    catalog::CatalogFilter,
    error::{AppError, AppResult},
    extract::{Json, Path, Query},
    models::{
        AddLearningPathItemRequest, AdminDashboardStats, Category, CorporationRequest,
        CorporationVerification, Course, CourseDetail, CourseItem, CourseItemDetail,
        CourseItemSummary, CourseSummary, CreateCourseRequest, CreateModuleItemRequest,
        CreateWorkshopItemRequest, EnrolledCourse, Enrollment, FavoriteResponse,
        GradeSubmissionRequest, LearningPathItem, LearningPathWithItems, LoginRequest,
        LoginResponse, MessageResponse, NewCourse, NewModule, NewWorkshop, PresignedUrlRequest,
        PresignedUrlResponse, ProfileResponse, ProfileUpdateResponse, ProgressResponse,
        RegisterRequest, ReorderRequest, SubmissionOutcome, SubmissionRequest,
        UpdateCourseRequest, UpdateProfileRequest, User, UserProfile, VerificationStatus,
        WorkshopRegistration, WorkshopSubmission,
    },
    ordering::{slugify, validate_reorder},
    storage::{authorize_upload, upload_key},
};
use axum::{extract::State, http::StatusCode};
use serde::Deserialize;
use uuid::Uuid;

const MIN_PASSWORD_LEN: usize = 8;

// --- Filter Structs ---

/// CorporationFilter
///
/// Query parameters for the admin verification queue (GET /admin/corporations).
#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct CorporationFilter {
    /// Only list requests in this state.
    pub status: Option<VerificationStatus>,
}

fn required(value: Option<String>, message: &str) -> AppResult<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::BadRequest(message.to_string()))
}

// --- Authentication ---

/// register
///
/// [Public Route] Creates an EDUCATEE account and its empty profile.
#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Registered", body = User),
        (status = 400, description = "Missing email or weak password"),
        (status = 409, description = "Email already in use")
    )
)]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<User>)> {
    let email = required(payload.email, "Email and password are required")?.to_lowercase();
    let password = payload
        .password
        .filter(|p| !p.is_empty())
        .ok_or_else(|| AppError::BadRequest("Email and password are required".into()))?;

    if !email.contains('@') {
        return Err(AppError::BadRequest("Invalid email".into()));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::BadRequest(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }

    let hash = auth::hash_password(&password)?;
    let user = state.repo.create_user(&email, &hash).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// login
///
/// [Public Route] Exchanges credentials for a session token. The password is always run
/// through argon2, even for an unknown email.
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Session token", body = LoginResponse),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    let credentials = state
        .repo
        .find_credentials(payload.email.trim())
        .await?;

    let (hash, credentials) = match credentials {
        Some(c) => (c.password_hash.clone(), Some(c)),
        None => (auth::dummy_hash().to_owned(), None),
    };

    let valid = auth::verify_password(&payload.password, &hash)?;
    let user: User = match credentials {
        Some(c) if valid => c.into(),
        _ => {
            tracing::debug!("login rejected");
            return Err(AppError::Unauthorized);
        }
    };

    let token = auth::issue_token(&state.config, &user)?;
    tracing::info!(user_id = %user.id, "user logged in");
    Ok(Json(LoginResponse { token, user }))
}

/// get_me
///
/// [Authenticated Route] The caller's account and profile.
#[utoipa::path(
    get,
    path = "/me",
    responses((status = 200, description = "Current user", body = UserProfile))
)]
pub async fn get_me(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<UserProfile>> {
    let user = state
        .repo
        .get_user(id)
        .await?
        .ok_or(AppError::Unauthorized)?;
    let profile = state.repo.get_profile(id).await?;
    Ok(Json(UserProfile { user, profile }))
}

// --- Catalog ---

#[utoipa::path(
    get,
    path = "/categories",
    responses((status = 200, description = "Categories", body = [Category]))
)]
pub async fn list_categories(State(state): State<AppState>) -> AppResult<Json<Vec<Category>>> {
    Ok(Json(state.repo.list_categories().await?))
}

/// list_courses
///
/// [Public Route] Published courses matching `search`, `category`, `level` (repeatable),
/// `duration` (repeatable), `rating` and `sort`.
#[utoipa::path(
    get,
    path = "/courses",
    params(
        ("search" = Option<String>, Query, description = "Whitespace-separated keywords"),
        ("category" = Option<String>, Query, description = "Category slug"),
        ("level" = Option<String>, Query, description = "BEGINNER | INTERMEDIATE | ADVANCED, repeatable"),
        ("duration" = Option<String>, Query, description = "extraShort | short | medium | long | extraLong, repeatable"),
        ("rating" = Option<f64>, Query, description = "Minimum average rating"),
        ("sort" = Option<String>, Query, description = "rating | review | newest")
    ),
    responses((status = 200, description = "Catalog", body = [CourseSummary]))
)]
pub async fn list_courses(
    viewer: MaybeAuthUser,
    State(state): State<AppState>,
    Query(params): Query<Vec<(String, String)>>,
) -> AppResult<Json<Vec<CourseSummary>>> {
    let filter = CatalogFilter::from_pairs(&params);
    Ok(Json(state.repo.list_courses(&filter, viewer.id()).await?))
}

/// get_course
///
/// [Public Route] The course landing page. `id` may be the course id or its slug. Unpublished
/// courses only exist for admins.
#[utoipa::path(
    get,
    path = "/courses/{id}",
    params(("id" = String, Path, description = "Course id or slug")),
    responses(
        (status = 200, description = "Found", body = CourseDetail),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_course(
    viewer: MaybeAuthUser,
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> AppResult<Json<CourseDetail>> {
    let course = state
        .repo
        .find_course(&key)
        .await?
        .filter(|c| c.is_published || viewer.is_admin())
        .ok_or_else(|| AppError::NotFound("Course not found".into()))?;

    Ok(Json(state.repo.course_detail(course, viewer.id()).await?))
}

#[utoipa::path(
    get,
    path = "/courses/{id}/items",
    params(("id" = String, Path, description = "Course id or slug")),
    responses((status = 200, description = "Ordered curriculum", body = [CourseItemSummary]))
)]
pub async fn list_course_items(
    viewer: MaybeAuthUser,
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> AppResult<Json<Vec<CourseItemSummary>>> {
    let course = state
        .repo
        .find_course(&key)
        .await?
        .filter(|c| c.is_published || viewer.is_admin())
        .ok_or_else(|| AppError::NotFound("Course not found".into()))?;

    Ok(Json(state.repo.list_course_items(course.id, viewer.id()).await?))
}

// --- Course administration ---

/// create_course
///
/// [Admin] The slug is derived from the title.
#[utoipa::path(
    post,
    path = "/courses",
    request_body = CreateCourseRequest,
    responses(
        (status = 201, description = "Created", body = Course),
        (status = 400, description = "Missing fields or unknown category"),
        (status = 403, description = "Not an admin"),
        (status = 409, description = "Slug taken")
    )
)]
pub async fn create_course(
    user: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateCourseRequest>,
) -> AppResult<(StatusCode, Json<Course>)> {
    require_admin(&user)?;

    const MISSING: &str = "Missing required fields";
    let title = required(payload.title, MISSING)?;
    let description = required(payload.description, MISSING)?;
    let category = required(payload.category, MISSING)?;
    let duration = payload
        .duration
        .ok_or_else(|| AppError::BadRequest(MISSING.into()))?;

    if duration < 0 {
        return Err(AppError::BadRequest("Duration cannot be negative".into()));
    }

    let slug = slugify(&title);
    if slug.is_empty() {
        return Err(AppError::BadRequest(
            "Title must contain letters or digits".into(),
        ));
    }

    let course = state
        .repo
        .create_course(NewCourse {
            title,
            slug,
            description,
            category,
            level: payload.level.unwrap_or_default(),
            duration,
            thumbnail_url: payload.thumbnail_url,
            is_published: payload.is_published.unwrap_or(false),
        })
        .await?;

    Ok((StatusCode::CREATED, Json(course)))
}

#[utoipa::path(
    put,
    path = "/courses/{id}",
    request_body = UpdateCourseRequest,
    params(("id" = Uuid, Path, description = "Course ID")),
    responses(
        (status = 200, description = "Updated", body = Course),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_course(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateCourseRequest>,
) -> AppResult<Json<Course>> {
    require_admin(&user)?;

    let blank = |v: &Option<String>| v.as_deref().is_some_and(|s| s.trim().is_empty());
    if blank(&payload.title) || blank(&payload.description) {
        return Err(AppError::BadRequest(
            "Title and description cannot be empty".into(),
        ));
    }
    if payload.duration.is_some_and(|d| d < 0) {
        return Err(AppError::BadRequest("Duration cannot be negative".into()));
    }

    state
        .repo
        .update_course(id, payload)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Course not found".into()))
}

/// delete_course
///
/// [Admin] Items, modules, workshops and enrollments go with it.
#[utoipa::path(
    delete,
    path = "/courses/{id}",
    params(("id" = Uuid, Path, description = "Course ID")),
    responses(
        (status = 200, description = "Deleted", body = MessageResponse),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_course(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<MessageResponse>> {
    require_admin(&user)?;

    if state.repo.delete_course(id).await? {
        tracing::info!(course_id = %id, "course deleted");
        Ok(Json(MessageResponse::new("Course deleted")))
    } else {
        Err(AppError::NotFound("Course not found".into()))
    }
}

/// add_module_item
///
/// [Admin] Inserts a module at `position`, shifting later items down.
#[utoipa::path(
    post,
    path = "/courses/{id}/items/module",
    request_body = CreateModuleItemRequest,
    params(("id" = Uuid, Path, description = "Course ID")),
    responses(
        (status = 201, description = "Created", body = CourseItem),
        (status = 400, description = "Missing fields or position out of range"),
        (status = 404, description = "Course not found"),
        (status = 409, description = "Duplicate item slug")
    )
)]
pub async fn add_module_item(
    user: AuthUser,
    State(state): State<AppState>,
    Path(course_id): Path<Uuid>,
    Json(payload): Json<CreateModuleItemRequest>,
) -> AppResult<(StatusCode, Json<CourseItem>)> {
    require_admin(&user)?;

    const MISSING: &str = "Title, content URL and position are required";
    let title = required(payload.title, MISSING)?;
    let content_url = required(payload.content_url, MISSING)?;
    let position = payload
        .position
        .ok_or_else(|| AppError::BadRequest(MISSING.into()))?;

    if slugify(&title).is_empty() {
        return Err(AppError::BadRequest(
            "Title must contain letters or digits".into(),
        ));
    }

    let item = state
        .repo
        .add_module_item(
            course_id,
            NewModule {
                title,
                content_url,
                position,
                description: payload.description.unwrap_or_default(),
                content: payload.content.unwrap_or_default(),
                video_url: payload.video_url.filter(|v| !v.trim().is_empty()),
                duration: payload.duration.unwrap_or(0).max(0),
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(item)))
}

#[utoipa::path(
    post,
    path = "/courses/{id}/items/workshop",
    request_body = CreateWorkshopItemRequest,
    params(("id" = Uuid, Path, description = "Course ID")),
    responses(
        (status = 201, description = "Created", body = CourseItem),
        (status = 400, description = "Missing fields or position out of range"),
        (status = 404, description = "Course not found")
    )
)]
pub async fn add_workshop_item(
    user: AuthUser,
    State(state): State<AppState>,
    Path(course_id): Path<Uuid>,
    Json(payload): Json<CreateWorkshopItemRequest>,
) -> AppResult<(StatusCode, Json<CourseItem>)> {
    require_admin(&user)?;

    const MISSING: &str = "Title, instructions and position are required";
    let title = required(payload.title, MISSING)?;
    let instructions = required(payload.instructions, MISSING)?;
    let position = payload
        .position
        .ok_or_else(|| AppError::BadRequest(MISSING.into()))?;

    if slugify(&title).is_empty() {
        return Err(AppError::BadRequest(
            "Title must contain letters or digits".into(),
        ));
    }

    let item = state
        .repo
        .add_workshop_item(
            course_id,
            NewWorkshop {
                title,
                instructions,
                position,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(item)))
}

/// reorder_course_items
///
/// [Admin] Positions are validated here; the repository then checks the id set against
/// the stored items under the course lock.
#[utoipa::path(
    patch,
    path = "/courses/{id}/items/reorder",
    request_body = ReorderRequest,
    params(("id" = Uuid, Path, description = "Course ID")),
    responses(
        (status = 200, description = "Reordered", body = MessageResponse),
        (status = 400, description = "Positions not contiguous from 1")
    )
)]
pub async fn reorder_course_items(
    user: AuthUser,
    State(state): State<AppState>,
    Path(course_id): Path<Uuid>,
    Json(payload): Json<ReorderRequest>,
) -> AppResult<Json<MessageResponse>> {
    require_admin(&user)?;
    validate_reorder(&payload.items)?;

    state
        .repo
        .reorder_course_items(course_id, &payload.items)
        .await?;
    Ok(Json(MessageResponse::new("Items reordered")))
}

#[utoipa::path(
    post,
    path = "/courses/{id}/favorite",
    params(("id" = Uuid, Path, description = "Course ID")),
    responses((status = 200, description = "Toggled", body = FavoriteResponse))
)]
pub async fn toggle_favorite(
    AuthUser { id: user_id, .. }: AuthUser,
    State(state): State<AppState>,
    Path(course_id): Path<Uuid>,
) -> AppResult<Json<FavoriteResponse>> {
    let favorited = state.repo.toggle_favorite(user_id, course_id).await?;
    Ok(Json(FavoriteResponse { favorited }))
}

// --- Enrollment & progress ---

#[utoipa::path(
    post,
    path = "/courses/{id}/enroll",
    params(("id" = Uuid, Path, description = "Course ID")),
    responses(
        (status = 201, description = "Enrolled", body = Enrollment),
        (status = 404, description = "Course not found or unpublished"),
        (status = 409, description = "Already enrolled")
    )
)]
pub async fn enroll(
    AuthUser { id: user_id, .. }: AuthUser,
    State(state): State<AppState>,
    Path(course_id): Path<Uuid>,
) -> AppResult<(StatusCode, Json<Enrollment>)> {
    let enrollment = state.repo.enroll(user_id, course_id).await?;
    tracing::info!(%user_id, %course_id, "enrolled");
    Ok((StatusCode::CREATED, Json(enrollment)))
}

#[utoipa::path(
    get,
    path = "/me/enrollments",
    responses((status = 200, description = "My courses", body = [EnrolledCourse]))
)]
pub async fn list_my_enrollments(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<Vec<EnrolledCourse>>> {
    Ok(Json(state.repo.list_enrollments(id).await?))
}

/// get_course_progress
///
/// [Authenticated Route] 0 when the caller is not enrolled.
#[utoipa::path(
    get,
    path = "/courses/{id}/progress",
    params(("id" = Uuid, Path, description = "Course ID")),
    responses((status = 200, description = "Progress", body = ProgressResponse))
)]
pub async fn get_course_progress(
    AuthUser { id: user_id, .. }: AuthUser,
    State(state): State<AppState>,
    Path(course_id): Path<Uuid>,
) -> AppResult<Json<ProgressResponse>> {
    let progress_percent = state
        .repo
        .get_enrollment(user_id, course_id)
        .await?
        .map_or(0, |e| e.progress_percent);

    Ok(Json(ProgressResponse {
        course_id,
        progress_percent,
    }))
}

/// get_course_item
///
/// [Authenticated Route] One curriculum slot. Non-enrolled callers get 403 and no content.
#[utoipa::path(
    get,
    path = "/courses/{id}/items/{item}",
    params(
        ("id" = String, Path, description = "Course id or slug"),
        ("item" = String, Path, description = "Item slug")
    ),
    responses(
        (status = 200, description = "Item", body = CourseItemDetail),
        (status = 403, description = "Not enrolled"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_course_item(
    AuthUser { id: user_id, .. }: AuthUser,
    State(state): State<AppState>,
    Path((course_key, item_slug)): Path<(String, String)>,
) -> AppResult<Json<CourseItemDetail>> {
    Ok(Json(
        state
            .repo
            .course_item_detail(user_id, &course_key, &item_slug)
            .await?,
    ))
}

/// complete_module
///
/// [Authenticated Route] Marks a module done and returns the recomputed enrollment.
#[utoipa::path(
    post,
    path = "/modules/{id}/complete",
    params(("id" = Uuid, Path, description = "Module ID")),
    responses(
        (status = 200, description = "Recomputed enrollment", body = Enrollment),
        (status = 403, description = "Not enrolled"),
        (status = 404, description = "Module not found")
    )
)]
pub async fn complete_module(
    AuthUser { id: user_id, .. }: AuthUser,
    State(state): State<AppState>,
    Path(module_id): Path<Uuid>,
) -> AppResult<Json<Enrollment>> {
    Ok(Json(state.repo.complete_module(user_id, module_id).await?))
}

#[utoipa::path(
    post,
    path = "/workshops/{id}/registration",
    params(("id" = Uuid, Path, description = "Workshop ID")),
    responses(
        (status = 201, description = "Registered", body = WorkshopRegistration),
        (status = 403, description = "Not enrolled"),
        (status = 404, description = "Workshop not found"),
        (status = 409, description = "Already registered")
    )
)]
pub async fn register_workshop(
    AuthUser { id: user_id, .. }: AuthUser,
    State(state): State<AppState>,
    Path(workshop_id): Path<Uuid>,
) -> AppResult<(StatusCode, Json<WorkshopRegistration>)> {
    let registration = state.repo.register_workshop(user_id, workshop_id).await?;
    Ok((StatusCode::CREATED, Json(registration)))
}

/// submit_workshop
///
/// [Authenticated Route] Requires a prior registration. Resubmitting replaces the url and
/// clears the grade.
#[utoipa::path(
    post,
    path = "/workshops/{id}/submissions",
    request_body = SubmissionRequest,
    params(("id" = Uuid, Path, description = "Workshop ID")),
    responses(
        (status = 200, description = "Submitted", body = SubmissionOutcome),
        (status = 400, description = "Missing submission url"),
        (status = 403, description = "Not registered"),
        (status = 404, description = "Workshop not found")
    )
)]
pub async fn submit_workshop(
    AuthUser { id: user_id, .. }: AuthUser,
    State(state): State<AppState>,
    Path(workshop_id): Path<Uuid>,
    Json(payload): Json<SubmissionRequest>,
) -> AppResult<Json<SubmissionOutcome>> {
    // The url is validated behind the registration gate, so an unregistered caller always
    // gets 403 whatever the body holds.
    let url = payload.submission_url.unwrap_or_default();
    let outcome = state
        .repo
        .submit_workshop(user_id, workshop_id, url.trim())
        .await?;
    Ok(Json(outcome))
}

// --- Profile & corporation verification ---

#[utoipa::path(
    get,
    path = "/profile",
    responses(
        (status = 200, description = "Profile", body = ProfileResponse),
        (status = 404, description = "No profile")
    )
)]
pub async fn get_profile(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<ProfileResponse>> {
    state
        .repo
        .get_profile(id)
        .await?
        .map(|profile| Json(ProfileResponse { profile }))
        .ok_or_else(|| AppError::NotFound("Profile not found".into()))
}

#[utoipa::path(
    put,
    path = "/profile",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Updated", body = ProfileUpdateResponse),
        (status = 409, description = "Email already in use")
    )
)]
pub async fn update_profile(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
    Json(mut payload): Json<UpdateProfileRequest>,
) -> AppResult<Json<ProfileUpdateResponse>> {
    if let Some(email) = payload.email.take() {
        let email = email.trim().to_lowercase();
        if !email.contains('@') {
            return Err(AppError::BadRequest("Invalid email".into()));
        }
        payload.email = Some(email);
    }

    let (user, profile) = state.repo.update_profile(id, payload).await?;
    Ok(Json(ProfileUpdateResponse { user, profile }))
}

#[utoipa::path(
    post,
    path = "/corporation/apply",
    responses(
        (status = 200, description = "Application pending", body = CorporationVerification),
        (status = 404, description = "No profile"),
        (status = 409, description = "Already pending or verified")
    )
)]
pub async fn apply_corporation(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<CorporationVerification>> {
    Ok(Json(state.repo.apply_corporation(id).await?))
}

#[utoipa::path(
    get,
    path = "/corporation/application",
    responses(
        (status = 200, description = "Application", body = CorporationVerification),
        (status = 404, description = "Never applied")
    )
)]
pub async fn get_corporation_application(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<CorporationVerification>> {
    state
        .repo
        .get_verification(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("No corporation application".into()))
}

// --- Learning paths ---

#[utoipa::path(
    get,
    path = "/learning-paths",
    responses((status = 200, description = "Published paths", body = [LearningPathWithItems]))
)]
pub async fn list_learning_paths(
    State(state): State<AppState>,
) -> AppResult<Json<Vec<LearningPathWithItems>>> {
    Ok(Json(state.repo.list_learning_paths().await?))
}

/// add_learning_path_item
///
/// [Admin] A missing or out-of-range position appends the course.
#[utoipa::path(
    post,
    path = "/learning-paths/{id}/items",
    request_body = AddLearningPathItemRequest,
    params(("id" = Uuid, Path, description = "Learning path ID")),
    responses(
        (status = 201, description = "Added", body = LearningPathItem),
        (status = 404, description = "Learning path not found"),
        (status = 409, description = "Course already in path")
    )
)]
pub async fn add_learning_path_item(
    user: AuthUser,
    State(state): State<AppState>,
    Path(path_id): Path<Uuid>,
    Json(payload): Json<AddLearningPathItemRequest>,
) -> AppResult<(StatusCode, Json<LearningPathItem>)> {
    require_admin(&user)?;

    let course_id = payload
        .course_id
        .ok_or_else(|| AppError::BadRequest("Course ID is required".into()))?;

    let item = state
        .repo
        .add_learning_path_item(path_id, course_id, payload.position)
        .await?;
    Ok((StatusCode::CREATED, Json(item)))
}

#[utoipa::path(
    patch,
    path = "/learning-paths/{id}/items/reorder",
    request_body = ReorderRequest,
    params(("id" = Uuid, Path, description = "Learning path ID")),
    responses(
        (status = 200, description = "Reordered", body = MessageResponse),
        (status = 400, description = "Positions not contiguous from 1")
    )
)]
pub async fn reorder_learning_path(
    user: AuthUser,
    State(state): State<AppState>,
    Path(path_id): Path<Uuid>,
    Json(payload): Json<ReorderRequest>,
) -> AppResult<Json<MessageResponse>> {
    require_admin(&user)?;
    validate_reorder(&payload.items)?;

    state
        .repo
        .reorder_learning_path(path_id, &payload.items)
        .await?;
    Ok(Json(MessageResponse::new("Items reordered")))
}

// --- Uploads ---

/// get_presigned_url
///
/// [Authenticated Route] A 10-minute signed PUT URL pinned to `file_type`, under a key scoped
/// to the purpose and the caller.
#[utoipa::path(
    post,
    path = "/uploads/presigned",
    request_body = PresignedUrlRequest,
    responses(
        (status = 200, description = "URL", body = PresignedUrlResponse),
        (status = 400, description = "File type not allowed"),
        (status = 403, description = "Purpose requires admin")
    )
)]
pub async fn get_presigned_url(
    AuthUser { id, role }: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<PresignedUrlRequest>,
) -> AppResult<Json<PresignedUrlResponse>> {
    authorize_upload(role, payload.purpose, &payload.file_type)?;

    let object_key = upload_key(payload.purpose, id, &payload.filename);
    let upload_url = state
        .storage
        .get_presigned_upload_url(&object_key, payload.file_type.trim())
        .await
        .map_err(|e| AppError::Internal(format!("storage error: {e}")))?;

    Ok(Json(PresignedUrlResponse {
        upload_url,
        resource_key: object_key,
    }))
}

// --- Administration ---

#[utoipa::path(
    get,
    path = "/admin/stats",
    responses(
        (status = 200, description = "Stats", body = AdminDashboardStats),
        (status = 403, description = "Forbidden")
    )
)]
pub async fn get_admin_stats(
    user: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<AdminDashboardStats>> {
    require_admin(&user)?;
    Ok(Json(state.repo.get_stats().await?))
}

#[utoipa::path(
    get,
    path = "/admin/users",
    responses((status = 200, description = "All users", body = [User]))
)]
pub async fn list_users(
    user: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<Vec<User>>> {
    require_admin(&user)?;
    Ok(Json(state.repo.list_users().await?))
}

#[utoipa::path(
    get,
    path = "/admin/corporations",
    params(CorporationFilter),
    responses((status = 200, description = "Verification queue", body = [CorporationRequest]))
)]
pub async fn list_corporation_requests(
    user: AuthUser,
    State(state): State<AppState>,
    Query(filter): Query<CorporationFilter>,
) -> AppResult<Json<Vec<CorporationRequest>>> {
    require_admin(&user)?;
    Ok(Json(
        state.repo.list_corporation_requests(filter.status).await?,
    ))
}

/// verify_corporation
///
/// [Admin] Status VERIFIED and role CORPORATION, written together.
#[utoipa::path(
    post,
    path = "/admin/corporations/{id}/verify",
    params(("id" = Uuid, Path, description = "Verification ID")),
    responses(
        (status = 200, description = "Verified", body = CorporationRequest),
        (status = 404, description = "Not Found")
    )
)]
pub async fn verify_corporation(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<CorporationRequest>> {
    require_admin(&user)?;
    Ok(Json(
        state
            .repo
            .decide_verification(id, VerificationStatus::Verified)
            .await?,
    ))
}

/// unverify_corporation
///
/// [Admin] Status UNVERIFIED and the owner demoted to EDUCATEE (admins keep their role).
#[utoipa::path(
    post,
    path = "/admin/corporations/{id}/unverify",
    params(("id" = Uuid, Path, description = "Verification ID")),
    responses(
        (status = 200, description = "Unverified", body = CorporationRequest),
        (status = 404, description = "Not Found")
    )
)]
pub async fn unverify_corporation(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<CorporationRequest>> {
    require_admin(&user)?;
    Ok(Json(
        state
            .repo
            .decide_verification(id, VerificationStatus::Unverified)
            .await?,
    ))
}

#[utoipa::path(
    patch,
    path = "/admin/submissions/{id}",
    request_body = GradeSubmissionRequest,
    params(("id" = Uuid, Path, description = "Submission ID")),
    responses(
        (status = 200, description = "Graded", body = WorkshopSubmission),
        (status = 400, description = "Score out of range"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn grade_submission(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<GradeSubmissionRequest>,
) -> AppResult<Json<WorkshopSubmission>> {
    require_admin(&user)?;

    if !(0..=100).contains(&payload.score) {
        return Err(AppError::BadRequest("Score must be between 0 and 100".into()));
    }

    state
        .repo
        .grade_submission(id, payload.score, payload.feedback)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Submission not found".into()))
}
