use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

// --- Enumerations (mapped to Postgres enum types) ---

/// Role
///
/// The RBAC field on `users`. Admins manage the catalog and review corporation requests;
/// educatees learn; corporations are educatees whose company has been verified.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type, TS, ToSchema,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "user_role", rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum Role {
    Admin,
    #[default]
    Educatee,
    Corporation,
}

impl Role {
    /// The role a user ends up with once an admin decides their corporation application.
    /// Admins keep their role; a pending decision changes nothing.
    pub fn after_verification(self, status: VerificationStatus) -> Role {
        match (self, status) {
            (Role::Admin, _) => Role::Admin,
            (_, VerificationStatus::Verified) => Role::Corporation,
            (_, VerificationStatus::Unverified) => Role::Educatee,
            (current, VerificationStatus::Pending) => current,
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type, TS, ToSchema,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "verification_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum VerificationStatus {
    #[default]
    Pending,
    Verified,
    Unverified,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, TS, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "gender", rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum Gender {
    Male,
    Female,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type, TS, ToSchema,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "course_level", rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum CourseLevel {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
}

/// CourseItemType
///
/// Discriminates a curriculum slot. A `Module` item carries `module_id`, a `Workshop` item
/// carries `workshop_id`, never both (enforced by a CHECK constraint).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type, TS, ToSchema,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "course_item_type", rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum CourseItemType {
    #[default]
    Module,
    Workshop,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type, TS, ToSchema,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "enrollment_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum EnrollmentStatus {
    #[default]
    InProgress,
    Completed,
}

// --- Identity ---

/// User
///
/// The public view of a `users` row. The password hash never leaves the repository except
/// through [`UserCredentials`].
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

/// Login lookup row. Internal only.
#[derive(Debug, Clone, FromRow)]
pub struct UserCredentials {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl From<UserCredentials> for User {
    fn from(c: UserCredentials) -> Self {
        User {
            id: c.id,
            email: c.email,
            role: c.role,
            created_at: c.created_at,
        }
    }
}

/// Profile
///
/// Personal and company metadata attached 1:1 to a user.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Profile {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: Option<String>,
    pub dob: Option<NaiveDate>,
    pub gender: Option<Gender>,
    pub picture_url: Option<String>,
    pub bio: Option<String>,
    pub company_name: Option<String>,
    pub company_website: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct CorporationVerification {
    pub id: Uuid,
    pub profile_id: Uuid,
    pub status: VerificationStatus,
    pub verified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// CorporationRequest
///
/// A verification joined with the applicant's profile and account, as listed for admins.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct CorporationRequest {
    pub id: Uuid,
    pub profile_id: Uuid,
    pub user_id: Uuid,
    pub email: String,
    pub role: Role,
    pub company_name: Option<String>,
    pub company_website: Option<String>,
    pub status: VerificationStatus,
    pub verified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

// --- Catalog ---

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
}

/// Course
///
/// A catalog entry from the `courses` table.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Course {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub description: String,
    pub level: CourseLevel,
    /// Minutes.
    pub duration: i32,
    pub thumbnail_url: Option<String>,
    pub is_published: bool,
    pub avg_rating: f64,
    pub review_count: i32,
    pub category_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// CourseSummary
///
/// One row of the public catalog listing, with the category joined in and the caller's
/// favorite flag resolved.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct CourseSummary {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub description: String,
    pub level: CourseLevel,
    pub duration: i32,
    pub thumbnail_url: Option<String>,
    pub avg_rating: f64,
    pub review_count: i32,
    pub category_id: Uuid,
    pub category_name: String,
    pub category_slug: String,
    pub is_favorite: bool,
}

/// CourseItem
///
/// A position-ordered curriculum slot. `type` is a reserved word in Rust, so the column is
/// read into `item_type` and serialized back out as `type`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct CourseItem {
    pub id: Uuid,
    pub course_id: Uuid,
    pub slug: String,
    pub position: i32,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub item_type: CourseItemType,
    pub module_id: Option<Uuid>,
    pub workshop_id: Option<Uuid>,
}

/// An item as listed on the course page, with its title and the caller's completion.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct CourseItemSummary {
    pub id: Uuid,
    pub slug: String,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub item_type: CourseItemType,
    pub title: String,
    pub position: i32,
    pub completed: bool,
}

/// CourseDetail
///
/// Everything the course landing page needs in one payload.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CourseDetail {
    pub course: Course,
    pub category: Category,
    pub items: Vec<CourseItemSummary>,
    pub enrollment_count: i64,
    pub is_enrolled: bool,
    pub is_favorite: bool,
    /// Present only when the caller is enrolled.
    pub progress_percent: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Module {
    pub id: Uuid,
    pub course_id: Uuid,
    pub title: String,
    pub description: String,
    /// Markdown body.
    pub content: String,
    pub content_url: String,
    pub video_url: Option<String>,
    pub duration: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Workshop {
    pub id: Uuid,
    pub course_id: Uuid,
    pub title: String,
    pub instructions: String,
    pub created_at: DateTime<Utc>,
}

// --- Learner state ---

/// Enrollment
///
/// A user's registration in a course. `progress_percent` is only ever written by the
/// recomputation statement in `progress::PROGRESS_SQL`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Enrollment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub course_id: Uuid,
    pub progress_percent: i32,
    pub status: EnrollmentStatus,
    pub enrolled_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An enrollment joined with its course, for the learner dashboard.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct EnrolledCourse {
    pub course_id: Uuid,
    pub title: String,
    pub slug: String,
    pub thumbnail_url: Option<String>,
    pub progress_percent: i32,
    pub status: EnrollmentStatus,
    pub enrolled_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct ModuleProgress {
    pub id: Uuid,
    pub user_id: Uuid,
    pub module_id: Uuid,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct WorkshopRegistration {
    pub id: Uuid,
    pub user_id: Uuid,
    pub workshop_id: Uuid,
    pub registered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct WorkshopSubmission {
    pub id: Uuid,
    pub user_id: Uuid,
    pub workshop_id: Uuid,
    pub submission_url: String,
    pub score: Option<i32>,
    pub feedback: Option<String>,
    pub submitted_at: DateTime<Utc>,
}

// --- Course item page ---

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct CourseRef {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct ModuleDetail {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub content: String,
    pub content_url: String,
    pub video_url: Option<String>,
    pub duration: i32,
    pub is_completed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct SubmissionSummary {
    pub submission_url: String,
    pub score: Option<i32>,
    pub feedback: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct WorkshopDetail {
    pub id: Uuid,
    pub title: String,
    pub instructions: String,
    pub is_registered: bool,
    pub submission: Option<SubmissionSummary>,
}

/// CourseItemDetail
///
/// The content of one curriculum slot plus its neighbours. Only ever built for an enrolled
/// user.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CourseItemDetail {
    pub id: Uuid,
    pub slug: String,
    #[serde(rename = "type")]
    pub item_type: CourseItemType,
    pub position: i32,
    pub total_items: i64,
    pub course: CourseRef,
    pub module: Option<ModuleDetail>,
    pub workshop: Option<WorkshopDetail>,
    pub prev_item: Option<String>,
    pub next_item: Option<String>,
}

// --- Learning paths ---

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct LearningPath {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub description: String,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct LearningPathItem {
    pub id: Uuid,
    pub learning_path_id: Uuid,
    pub course_id: Uuid,
    pub position: i32,
}

/// A path step with the course it points at.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct LearningPathCourse {
    pub id: Uuid,
    pub learning_path_id: Uuid,
    pub course_id: Uuid,
    pub position: i32,
    pub title: String,
    pub slug: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct LearningPathWithItems {
    pub path: LearningPath,
    pub items: Vec<LearningPathCourse>,
}

// --- Request Payloads (Input Schemas) ---

// Required fields are modelled as `Option` so that a missing field is reported as our own 400
// rather than the extractor's 422.

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct RegisterRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct LoginResponse {
    pub token: String,
    pub user: User,
}

/// CreateCourseRequest
///
/// `category` is the category slug.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
#[serde(default)]
pub struct CreateCourseRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub level: Option<CourseLevel>,
    pub duration: Option<i32>,
    pub thumbnail_url: Option<String>,
    pub is_published: Option<bool>,
}

/// UpdateCourseRequest
///
/// Partial update: only `Some` fields are written (COALESCE in the repository).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateCourseRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<CourseLevel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_published: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
#[serde(default)]
pub struct CreateModuleItemRequest {
    pub title: Option<String>,
    pub content_url: Option<String>,
    pub position: Option<i32>,
    pub description: Option<String>,
    pub content: Option<String>,
    pub video_url: Option<String>,
    pub duration: Option<i32>,
}

/// Validated module payload handed to the repository.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NewModule {
    pub title: String,
    pub content_url: String,
    pub position: i32,
    pub description: String,
    pub content: String,
    pub video_url: Option<String>,
    pub duration: i32,
}

/// Validated course payload handed to the repository. `category` is a category slug.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NewCourse {
    pub title: String,
    pub slug: String,
    pub description: String,
    pub category: String,
    pub level: CourseLevel,
    pub duration: i32,
    pub thumbnail_url: Option<String>,
    pub is_published: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
#[serde(default)]
pub struct CreateWorkshopItemRequest {
    pub title: Option<String>,
    pub instructions: Option<String>,
    pub position: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NewWorkshop {
    pub title: String,
    pub instructions: String,
    pub position: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct ReorderItem {
    pub id: Uuid,
    pub position: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct ReorderRequest {
    #[serde(default)]
    pub items: Vec<ReorderItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct SubmissionRequest {
    #[serde(default)]
    pub submission_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct GradeSubmissionRequest {
    pub score: i32,
    #[serde(default)]
    pub feedback: Option<String>,
}

/// UpdateProfileRequest
///
/// `email` updates the account; everything else upserts the profile.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
#[serde(default)]
pub struct UpdateProfileRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dob: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<Gender>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub picture_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_website: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct AddLearningPathItemRequest {
    #[serde(default)]
    pub course_id: Option<Uuid>,
    #[serde(default)]
    pub position: Option<i32>,
}

/// UploadPurpose
///
/// What an upload is for. Decides the key prefix and which MIME types are accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum UploadPurpose {
    Thumbnail,
    Avatar,
    ModuleContent,
    Submission,
}

/// PresignedUrlRequest
///
/// Input payload for requesting a short-lived upload URL (POST /uploads/presigned).
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema, TS)]
#[ts(export)]
pub struct PresignedUrlRequest {
    /// The original filename, used to derive the file extension.
    #[schema(example = "week1.pdf")]
    pub filename: String,
    /// The MIME type, enforced on the signed URL.
    #[schema(example = "application/pdf")]
    pub file_type: String,
    pub purpose: UploadPurpose,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, TS, Default)]
#[ts(export)]
pub struct PresignedUrlResponse {
    /// The time-limited URL for the PUT request.
    pub upload_url: String,
    /// The object key to store on the course, profile or submission.
    pub resource_key: String,
}

// --- Output Schemas ---

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct FavoriteResponse {
    pub favorited: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct ProgressResponse {
    pub course_id: Uuid,
    pub progress_percent: i32,
}

/// The stored submission and the enrollment as recomputed in the same transaction.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct SubmissionOutcome {
    pub submission: WorkshopSubmission,
    pub enrollment: Enrollment,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct ProfileResponse {
    pub profile: Profile,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct ProfileUpdateResponse {
    pub user: User,
    pub profile: Profile,
}

/// The authenticated user's account plus profile (GET /me).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UserProfile {
    pub user: User,
    pub profile: Option<Profile>,
}

/// AdminDashboardStats
///
/// Output schema for the administrative dashboard (GET /admin/stats).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct AdminDashboardStats {
    pub total_users: i64,
    pub total_courses: i64,
    pub total_enrollments: i64,
    /// Corporation applications still waiting for review.
    pub pending_verifications: i64,
}
