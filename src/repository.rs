use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::{
    catalog::CatalogFilter,
    error::{AppError, AppResult},
    models::{
        AdminDashboardStats, Category, CorporationRequest, CorporationVerification, Course,
        CourseDetail, CourseItem, CourseItemDetail, CourseItemSummary, CourseItemType, CourseRef,
        CourseSummary, EnrolledCourse, Enrollment, LearningPathCourse, LearningPathItem,
        LearningPathWithItems, LearningPath, ModuleDetail, NewCourse, NewModule, NewWorkshop,
        Profile, ReorderItem, Role, SubmissionOutcome, SubmissionSummary, UpdateCourseRequest,
        UpdateProfileRequest, User, UserCredentials, VerificationStatus, WorkshopDetail,
        WorkshopRegistration, WorkshopSubmission,
    },
    ordering::{ensure_complete_reorder, lenient_insert_position, strict_insert_position, slugify},
    progress::{COURSE_PROGRESS_SQL, PROGRESS_SQL},
};

/// Repository Trait
///
/// The persistence contract the handlers depend on. Every rule that spans more than one row
/// (enrollment gates, progress recomputation, position shifting, verification + role change)
/// lives behind one of these methods and runs inside a single transaction.
///
/// **Send + Sync + async_trait** make `Arc<dyn Repository>` shareable across Axum tasks.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users ---
    async fn get_user(&self, id: Uuid) -> AppResult<Option<User>>;
    async fn find_credentials(&self, email: &str) -> AppResult<Option<UserCredentials>>;
    // Creates the account and its empty profile together.
    async fn create_user(&self, email: &str, password_hash: &str) -> AppResult<User>;
    async fn list_users(&self) -> AppResult<Vec<User>>;
    async fn get_stats(&self) -> AppResult<AdminDashboardStats>;

    // --- Profiles & corporation verification ---
    async fn get_profile(&self, user_id: Uuid) -> AppResult<Option<Profile>>;
    async fn update_profile(
        &self,
        user_id: Uuid,
        req: UpdateProfileRequest,
    ) -> AppResult<(User, Profile)>;
    async fn apply_corporation(&self, user_id: Uuid) -> AppResult<CorporationVerification>;
    async fn get_verification(&self, user_id: Uuid) -> AppResult<Option<CorporationVerification>>;
    async fn list_corporation_requests(
        &self,
        status: Option<VerificationStatus>,
    ) -> AppResult<Vec<CorporationRequest>>;
    // Sets the status and the owner's role atomically.
    async fn decide_verification(
        &self,
        id: Uuid,
        status: VerificationStatus,
    ) -> AppResult<CorporationRequest>;

    // --- Catalog ---
    async fn list_categories(&self) -> AppResult<Vec<Category>>;
    async fn list_courses(
        &self,
        filter: &CatalogFilter,
        viewer: Option<Uuid>,
    ) -> AppResult<Vec<CourseSummary>>;
    // `key` is a course id or slug.
    async fn find_course(&self, key: &str) -> AppResult<Option<Course>>;
    async fn course_detail(
        &self,
        course: Course,
        viewer: Option<Uuid>,
    ) -> AppResult<CourseDetail>;
    async fn list_course_items(
        &self,
        course_id: Uuid,
        viewer: Option<Uuid>,
    ) -> AppResult<Vec<CourseItemSummary>>;
    async fn create_course(&self, course: NewCourse) -> AppResult<Course>;
    async fn update_course(&self, id: Uuid, req: UpdateCourseRequest) -> AppResult<Option<Course>>;
    async fn delete_course(&self, id: Uuid) -> AppResult<bool>;
    async fn add_module_item(&self, course_id: Uuid, module: NewModule) -> AppResult<CourseItem>;
    async fn add_workshop_item(
        &self,
        course_id: Uuid,
        workshop: NewWorkshop,
    ) -> AppResult<CourseItem>;
    async fn reorder_course_items(&self, course_id: Uuid, items: &[ReorderItem]) -> AppResult<()>;
    // Returns whether the course is a favorite after the toggle.
    async fn toggle_favorite(&self, user_id: Uuid, course_id: Uuid) -> AppResult<bool>;

    // --- Enrollment & progress ---
    async fn enroll(&self, user_id: Uuid, course_id: Uuid) -> AppResult<Enrollment>;
    async fn list_enrollments(&self, user_id: Uuid) -> AppResult<Vec<EnrolledCourse>>;
    async fn get_enrollment(&self, user_id: Uuid, course_id: Uuid)
    -> AppResult<Option<Enrollment>>;
    // Enrollment is checked before any item content is read.
    async fn course_item_detail(
        &self,
        user_id: Uuid,
        course_key: &str,
        item_slug: &str,
    ) -> AppResult<CourseItemDetail>;
    async fn complete_module(&self, user_id: Uuid, module_id: Uuid) -> AppResult<Enrollment>;
    async fn register_workshop(
        &self,
        user_id: Uuid,
        workshop_id: Uuid,
    ) -> AppResult<WorkshopRegistration>;
    async fn submit_workshop(
        &self,
        user_id: Uuid,
        workshop_id: Uuid,
        submission_url: &str,
    ) -> AppResult<SubmissionOutcome>;
    async fn grade_submission(
        &self,
        id: Uuid,
        score: i32,
        feedback: Option<String>,
    ) -> AppResult<Option<WorkshopSubmission>>;

    // --- Learning paths ---
    async fn list_learning_paths(&self) -> AppResult<Vec<LearningPathWithItems>>;
    async fn add_learning_path_item(
        &self,
        path_id: Uuid,
        course_id: Uuid,
        position: Option<i32>,
    ) -> AppResult<LearningPathItem>;
    async fn reorder_learning_path(&self, path_id: Uuid, items: &[ReorderItem]) -> AppResult<()>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

/// PostgresRepository
///
/// The `Repository` backed by PostgreSQL.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// --- Transaction helpers ---

/// Locks the enrollment row for (user, course). Concurrent completions in the same course
/// queue up behind this lock, so each recomputation sees the previous one's writes.
async fn lock_enrollment(conn: &mut PgConnection, user_id: Uuid, course_id: Uuid) -> AppResult<Uuid> {
    sqlx::query_scalar::<_, Uuid>(
        "SELECT id FROM enrollments WHERE user_id = $1 AND course_id = $2 FOR UPDATE",
    )
    .bind(user_id)
    .bind(course_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| {
        tracing::debug!(%user_id, %course_id, "progress update without enrollment");
        AppError::not_enrolled()
    })
}

async fn recompute_progress(
    conn: &mut PgConnection,
    user_id: Uuid,
    course_id: Uuid,
) -> AppResult<Enrollment> {
    let enrollment = sqlx::query_as::<_, Enrollment>(PROGRESS_SQL)
        .bind(user_id)
        .bind(course_id)
        .fetch_one(&mut *conn)
        .await?;

    tracing::info!(
        %user_id,
        %course_id,
        progress = enrollment.progress_percent,
        status = ?enrollment.status,
        "enrollment progress recomputed"
    );
    Ok(enrollment)
}

/// Brings every enrollment of the course in line with its current item set. The enrollment
/// rows are locked in id order first; the update that follows runs on a fresh snapshot, so a
/// completion committed while the locks were pending is counted.
async fn recompute_course_progress(conn: &mut PgConnection, course_id: Uuid) -> AppResult<u64> {
    sqlx::query_scalar::<_, Uuid>(
        "SELECT id FROM enrollments WHERE course_id = $1 ORDER BY id FOR UPDATE",
    )
    .bind(course_id)
    .fetch_all(&mut *conn)
    .await?;

    let updated = sqlx::query(COURSE_PROGRESS_SQL)
        .bind(course_id)
        .execute(&mut *conn)
        .await?
        .rows_affected();

    if updated > 0 {
        tracing::info!(%course_id, enrollments = updated, "course progress recomputed");
    }
    Ok(updated)
}

/// Locks the course row, then shifts every item at or after the requested slot down by one.
/// Returns the validated position.
async fn open_course_slot(
    conn: &mut PgConnection,
    course_id: Uuid,
    requested: i32,
) -> AppResult<i32> {
    sqlx::query_scalar::<_, Uuid>("SELECT id FROM courses WHERE id = $1 FOR UPDATE")
        .bind(course_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Course not found".into()))?;

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM course_items WHERE course_id = $1")
        .bind(course_id)
        .fetch_one(&mut *conn)
        .await?;

    let position = strict_insert_position(requested, count)?;

    sqlx::query(
        "UPDATE course_items SET position = position + 1 WHERE course_id = $1 AND position >= $2",
    )
    .bind(course_id)
    .bind(position)
    .execute(&mut *conn)
    .await?;

    Ok(position)
}

const COURSE_COLUMNS: &str = "id, title, slug, description, level, duration, thumbnail_url, \
     is_published, avg_rating, review_count, category_id, created_at, updated_at";

#[async_trait]
impl Repository for PostgresRepository {
    // --- USERS ---

    async fn get_user(&self, id: Uuid) -> AppResult<Option<User>> {
        Ok(
            sqlx::query_as::<_, User>("SELECT id, email, role, created_at FROM users WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn find_credentials(&self, email: &str) -> AppResult<Option<UserCredentials>> {
        Ok(sqlx::query_as::<_, UserCredentials>(
            "SELECT id, email, password_hash, role, created_at FROM users WHERE lower(email) = lower($1)",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?)
    }

    /// create_user
    ///
    /// New accounts are always educatees; the profile row exists from the start so the
    /// corporation application flow never has to create one.
    async fn create_user(&self, email: &str, password_hash: &str) -> AppResult<User> {
        let mut tx = self.pool.begin().await?;

        let user = sqlx::query_as::<_, User>(
            r#"INSERT INTO users (email, password_hash, role)
               VALUES ($1, $2, 'EDUCATEE')
               RETURNING id, email, role, created_at"#,
        )
        .bind(email)
        .bind(password_hash)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO profiles (user_id) VALUES ($1)")
            .bind(user.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        tracing::info!(user_id = %user.id, "user registered");
        Ok(user)
    }

    async fn list_users(&self) -> AppResult<Vec<User>> {
        Ok(sqlx::query_as::<_, User>(
            "SELECT id, email, role, created_at FROM users ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await?)
    }

    async fn get_stats(&self) -> AppResult<AdminDashboardStats> {
        let (total_users, total_courses, total_enrollments, pending_verifications) =
            sqlx::query_as::<_, (i64, i64, i64, i64)>(
                r#"SELECT
                    (SELECT COUNT(*) FROM users),
                    (SELECT COUNT(*) FROM courses),
                    (SELECT COUNT(*) FROM enrollments),
                    (SELECT COUNT(*) FROM corporation_verifications WHERE status = 'PENDING')"#,
            )
            .fetch_one(&self.pool)
            .await?;

        Ok(AdminDashboardStats {
            total_users,
            total_courses,
            total_enrollments,
            pending_verifications,
        })
    }

    // --- PROFILES ---

    async fn get_profile(&self, user_id: Uuid) -> AppResult<Option<Profile>> {
        Ok(sqlx::query_as::<_, Profile>(
            r#"SELECT id, user_id, name, dob, gender, picture_url, bio, company_name,
                      company_website, created_at, updated_at
               FROM profiles WHERE user_id = $1"#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    /// update_profile
    ///
    /// The account email and the profile upsert share one transaction. Absent fields keep
    /// their stored value (COALESCE), matching the partial-update convention elsewhere.
    async fn update_profile(
        &self,
        user_id: Uuid,
        req: UpdateProfileRequest,
    ) -> AppResult<(User, Profile)> {
        let mut tx = self.pool.begin().await?;

        let user = sqlx::query_as::<_, User>(
            r#"UPDATE users
               SET email = COALESCE($2, email), updated_at = NOW()
               WHERE id = $1
               RETURNING id, email, role, created_at"#,
        )
        .bind(user_id)
        .bind(req.email)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;

        let profile = sqlx::query_as::<_, Profile>(
            r#"INSERT INTO profiles
                   (user_id, name, dob, gender, picture_url, bio, company_name, company_website)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
               ON CONFLICT (user_id) DO UPDATE SET
                   name = COALESCE(EXCLUDED.name, profiles.name),
                   dob = COALESCE(EXCLUDED.dob, profiles.dob),
                   gender = COALESCE(EXCLUDED.gender, profiles.gender),
                   picture_url = COALESCE(EXCLUDED.picture_url, profiles.picture_url),
                   bio = COALESCE(EXCLUDED.bio, profiles.bio),
                   company_name = COALESCE(EXCLUDED.company_name, profiles.company_name),
                   company_website = COALESCE(EXCLUDED.company_website, profiles.company_website),
                   updated_at = NOW()
               RETURNING id, user_id, name, dob, gender, picture_url, bio, company_name,
                         company_website, created_at, updated_at"#,
        )
        .bind(user_id)
        .bind(req.name)
        .bind(req.dob)
        .bind(req.gender)
        .bind(req.picture_url)
        .bind(req.bio)
        .bind(req.company_name)
        .bind(req.company_website)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok((user, profile))
    }

    /// apply_corporation
    ///
    /// Pending and verified applications are terminal for the applicant; only a fresh or
    /// previously rejected (UNVERIFIED) application may be (re)submitted.
    async fn apply_corporation(&self, user_id: Uuid) -> AppResult<CorporationVerification> {
        let mut tx = self.pool.begin().await?;

        let (profile_id, current) = sqlx::query_as::<_, (Uuid, Option<VerificationStatus>)>(
            r#"SELECT p.id, v.status
               FROM profiles p
               LEFT JOIN corporation_verifications v ON v.profile_id = p.id
               WHERE p.user_id = $1
               FOR UPDATE OF p"#,
        )
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Create profile first".into()))?;

        match current {
            Some(VerificationStatus::Pending) => {
                return Err(AppError::Conflict(
                    "Your application is under review".into(),
                ));
            }
            Some(VerificationStatus::Verified) => {
                return Err(AppError::Conflict("You are already verified".into()));
            }
            Some(VerificationStatus::Unverified) | None => {}
        }

        let verification = sqlx::query_as::<_, CorporationVerification>(
            r#"INSERT INTO corporation_verifications (profile_id, status)
               VALUES ($1, 'PENDING')
               ON CONFLICT (profile_id) DO UPDATE
                   SET status = 'PENDING', verified_at = NULL, updated_at = NOW()
               RETURNING id, profile_id, status, verified_at, created_at, updated_at"#,
        )
        .bind(profile_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::info!(%user_id, verification_id = %verification.id, "corporation application submitted");
        Ok(verification)
    }

    async fn get_verification(&self, user_id: Uuid) -> AppResult<Option<CorporationVerification>> {
        Ok(sqlx::query_as::<_, CorporationVerification>(
            r#"SELECT v.id, v.profile_id, v.status, v.verified_at, v.created_at, v.updated_at
               FROM corporation_verifications v
               JOIN profiles p ON p.id = v.profile_id
               WHERE p.user_id = $1"#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn list_corporation_requests(
        &self,
        status: Option<VerificationStatus>,
    ) -> AppResult<Vec<CorporationRequest>> {
        Ok(sqlx::query_as::<_, CorporationRequest>(
            r#"SELECT v.id, v.profile_id, p.user_id, u.email, u.role, p.company_name,
                      p.company_website, v.status, v.verified_at, v.created_at
               FROM corporation_verifications v
               JOIN profiles p ON p.id = v.profile_id
               JOIN users u ON u.id = p.user_id
               WHERE ($1::verification_status IS NULL OR v.status = $1)
               ORDER BY v.created_at DESC"#,
        )
        .bind(status)
        .fetch_all(&self.pool)
        .await?)
    }

    /// decide_verification
    ///
    /// Both rows are locked and written in one transaction: the verification status and the
    /// owner's role change together or not at all.
    async fn decide_verification(
        &self,
        id: Uuid,
        status: VerificationStatus,
    ) -> AppResult<CorporationRequest> {
        let mut tx = self.pool.begin().await?;

        let (user_id, current_role) = sqlx::query_as::<_, (Uuid, Role)>(
            r#"SELECT u.id, u.role
               FROM corporation_verifications v
               JOIN profiles p ON p.id = v.profile_id
               JOIN users u ON u.id = p.user_id
               WHERE v.id = $1
               FOR UPDATE OF v, u"#,
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Verification request not found".into()))?;

        let verified_at = (status == VerificationStatus::Verified).then(Utc::now);

        sqlx::query(
            r#"UPDATE corporation_verifications
               SET status = $2, verified_at = $3, updated_at = NOW()
               WHERE id = $1"#,
        )
        .bind(id)
        .bind(status)
        .bind(verified_at)
        .execute(&mut *tx)
        .await?;

        let new_role = current_role.after_verification(status);
        sqlx::query("UPDATE users SET role = $2, updated_at = NOW() WHERE id = $1")
            .bind(user_id)
            .bind(new_role)
            .execute(&mut *tx)
            .await?;

        let request = sqlx::query_as::<_, CorporationRequest>(
            r#"SELECT v.id, v.profile_id, p.user_id, u.email, u.role, p.company_name,
                      p.company_website, v.status, v.verified_at, v.created_at
               FROM corporation_verifications v
               JOIN profiles p ON p.id = v.profile_id
               JOIN users u ON u.id = p.user_id
               WHERE v.id = $1"#,
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::info!(verification_id = %id, %user_id, ?status, role = ?new_role, "corporation verification decided");
        Ok(request)
    }

    // --- CATALOG ---

    async fn list_categories(&self) -> AppResult<Vec<Category>> {
        Ok(
            sqlx::query_as::<_, Category>("SELECT id, name, slug FROM categories ORDER BY name")
                .fetch_all(&self.pool)
                .await?,
        )
    }

    /// list_courses
    ///
    /// The query is assembled by `CatalogFilter::build_query`, which binds every value.
    async fn list_courses(
        &self,
        filter: &CatalogFilter,
        viewer: Option<Uuid>,
    ) -> AppResult<Vec<CourseSummary>> {
        let mut builder = filter.build_query(viewer);
        Ok(builder
            .build_query_as::<CourseSummary>()
            .fetch_all(&self.pool)
            .await?)
    }

    async fn find_course(&self, key: &str) -> AppResult<Option<Course>> {
        let course = match Uuid::parse_str(key) {
            Ok(id) => {
                sqlx::query_as::<_, Course>(&format!(
                    "SELECT {COURSE_COLUMNS} FROM courses WHERE id = $1"
                ))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?
            }
            Err(_) => {
                sqlx::query_as::<_, Course>(&format!(
                    "SELECT {COURSE_COLUMNS} FROM courses WHERE slug = $1"
                ))
                .bind(key)
                .fetch_optional(&self.pool)
                .await?
            }
        };
        Ok(course)
    }

    async fn course_detail(
        &self,
        course: Course,
        viewer: Option<Uuid>,
    ) -> AppResult<CourseDetail> {
        let category = sqlx::query_as::<_, Category>(
            "SELECT id, name, slug FROM categories WHERE id = $1",
        )
        .bind(course.category_id)
        .fetch_one(&self.pool)
        .await?;

        let items = self.list_course_items(course.id, viewer).await?;

        let enrollment_count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM enrollments WHERE course_id = $1")
                .bind(course.id)
                .fetch_one(&self.pool)
                .await?;

        let (progress_percent, is_favorite) = match viewer {
            Some(user_id) => {
                let progress = self
                    .get_enrollment(user_id, course.id)
                    .await?
                    .map(|e| e.progress_percent);
                let favorite: bool = sqlx::query_scalar(
                    "SELECT EXISTS (SELECT 1 FROM favorites WHERE user_id = $1 AND course_id = $2)",
                )
                .bind(user_id)
                .bind(course.id)
                .fetch_one(&self.pool)
                .await?;
                (progress, favorite)
            }
            None => (None, false),
        };

        Ok(CourseDetail {
            course,
            category,
            items,
            enrollment_count,
            is_enrolled: progress_percent.is_some(),
            is_favorite,
            progress_percent,
        })
    }

    async fn list_course_items(
        &self,
        course_id: Uuid,
        viewer: Option<Uuid>,
    ) -> AppResult<Vec<CourseItemSummary>> {
        Ok(sqlx::query_as::<_, CourseItemSummary>(
            r#"SELECT ci.id, ci.slug, ci.type,
                      COALESCE(m.title, w.title, '') AS title,
                      ci.position,
                      CASE ci.type
                          WHEN 'MODULE' THEN EXISTS (
                              SELECT 1 FROM module_progresses mp
                              WHERE mp.module_id = ci.module_id
                                AND mp.user_id = $2
                                AND mp.completed_at IS NOT NULL)
                          ELSE EXISTS (
                              SELECT 1 FROM workshop_submissions ws
                              WHERE ws.workshop_id = ci.workshop_id AND ws.user_id = $2)
                      END AS completed
               FROM course_items ci
               LEFT JOIN modules m ON m.id = ci.module_id
               LEFT JOIN workshops w ON w.id = ci.workshop_id
               WHERE ci.course_id = $1
               ORDER BY ci.position ASC"#,
        )
        .bind(course_id)
        .bind(viewer.unwrap_or(Uuid::nil()))
        .fetch_all(&self.pool)
        .await?)
    }

    /// create_course
    ///
    /// The category is resolved by slug inside the INSERT; no matching category means no row.
    async fn create_course(&self, course: NewCourse) -> AppResult<Course> {
        let created = sqlx::query_as::<_, Course>(&format!(
            r#"INSERT INTO courses
                   (title, slug, description, level, duration, thumbnail_url, is_published, category_id)
               SELECT $1, $2, $3, $4, $5, $6, $7, c.id
               FROM categories c WHERE c.slug = $8
               RETURNING {COURSE_COLUMNS}"#
        ))
        .bind(&course.title)
        .bind(&course.slug)
        .bind(&course.description)
        .bind(course.level)
        .bind(course.duration)
        .bind(&course.thumbnail_url)
        .bind(course.is_published)
        .bind(&course.category)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::BadRequest("Unknown category".into()))?;

        tracing::info!(course_id = %created.id, slug = %created.slug, "course created");
        Ok(created)
    }

    /// update_course
    ///
    /// COALESCE keeps every column whose request field is `None`.
    async fn update_course(&self, id: Uuid, req: UpdateCourseRequest) -> AppResult<Option<Course>> {
        let category_id = match &req.category {
            Some(slug) => Some(
                sqlx::query_scalar::<_, Uuid>("SELECT id FROM categories WHERE slug = $1")
                    .bind(slug)
                    .fetch_optional(&self.pool)
                    .await?
                    .ok_or_else(|| AppError::BadRequest("Unknown category".into()))?,
            ),
            None => None,
        };

        Ok(sqlx::query_as::<_, Course>(&format!(
            r#"UPDATE courses
               SET title = COALESCE($2, title),
                   description = COALESCE($3, description),
                   level = COALESCE($4, level),
                   duration = COALESCE($5, duration),
                   thumbnail_url = COALESCE($6, thumbnail_url),
                   is_published = COALESCE($7, is_published),
                   category_id = COALESCE($8, category_id),
                   updated_at = NOW()
               WHERE id = $1
               RETURNING {COURSE_COLUMNS}"#
        ))
        .bind(id)
        .bind(req.title)
        .bind(req.description)
        .bind(req.level)
        .bind(req.duration)
        .bind(req.thumbnail_url)
        .bind(req.is_published)
        .bind(category_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn delete_course(&self, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM courses WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// add_module_item
    ///
    /// Shift, create, and place in one transaction under the course row lock. Existing
    /// enrollments are recomputed before commit since the item count changed.
    async fn add_module_item(&self, course_id: Uuid, module: NewModule) -> AppResult<CourseItem> {
        let mut tx = self.pool.begin().await?;
        let position = open_course_slot(&mut tx, course_id, module.position).await?;

        let module_id: Uuid = sqlx::query_scalar(
            r#"INSERT INTO modules
                   (course_id, title, description, content, content_url, video_url, duration)
               VALUES ($1, $2, $3, $4, $5, $6, $7)
               RETURNING id"#,
        )
        .bind(course_id)
        .bind(&module.title)
        .bind(&module.description)
        .bind(&module.content)
        .bind(&module.content_url)
        .bind(&module.video_url)
        .bind(module.duration)
        .fetch_one(&mut *tx)
        .await?;

        let item = sqlx::query_as::<_, CourseItem>(
            r#"INSERT INTO course_items (course_id, slug, position, type, module_id)
               VALUES ($1, $2, $3, 'MODULE', $4)
               RETURNING id, course_id, slug, position, type, module_id, workshop_id"#,
        )
        .bind(course_id)
        .bind(slugify(&module.title))
        .bind(position)
        .bind(module_id)
        .fetch_one(&mut *tx)
        .await?;

        recompute_course_progress(&mut tx, course_id).await?;
        tx.commit().await?;
        tracing::info!(%course_id, item_id = %item.id, position, "module added");
        Ok(item)
    }

    async fn add_workshop_item(
        &self,
        course_id: Uuid,
        workshop: NewWorkshop,
    ) -> AppResult<CourseItem> {
        let mut tx = self.pool.begin().await?;
        let position = open_course_slot(&mut tx, course_id, workshop.position).await?;

        let workshop_id: Uuid = sqlx::query_scalar(
            "INSERT INTO workshops (course_id, title, instructions) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(course_id)
        .bind(&workshop.title)
        .bind(&workshop.instructions)
        .fetch_one(&mut *tx)
        .await?;

        let item = sqlx::query_as::<_, CourseItem>(
            r#"INSERT INTO course_items (course_id, slug, position, type, workshop_id)
               VALUES ($1, $2, $3, 'WORKSHOP', $4)
               RETURNING id, course_id, slug, position, type, module_id, workshop_id"#,
        )
        .bind(course_id)
        .bind(slugify(&workshop.title))
        .bind(position)
        .bind(workshop_id)
        .fetch_one(&mut *tx)
        .await?;

        recompute_course_progress(&mut tx, course_id).await?;
        tx.commit().await?;
        tracing::info!(%course_id, item_id = %item.id, position, "workshop added");
        Ok(item)
    }

    /// reorder_course_items
    ///
    /// The course row lock serializes concurrent reorders and inserts; the request must name
    /// every current item, and all positions are written by one UNNEST update.
    async fn reorder_course_items(&self, course_id: Uuid, items: &[ReorderItem]) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query_scalar::<_, Uuid>("SELECT id FROM courses WHERE id = $1 FOR UPDATE")
            .bind(course_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound("Course not found".into()))?;

        let current: Vec<Uuid> =
            sqlx::query_scalar("SELECT id FROM course_items WHERE course_id = $1")
                .bind(course_id)
                .fetch_all(&mut *tx)
                .await?;
        ensure_complete_reorder(items, &current)?;

        let ids: Vec<Uuid> = items.iter().map(|item| item.id).collect();
        let positions: Vec<i32> = items.iter().map(|item| item.position).collect();

        sqlx::query(
            r#"UPDATE course_items ci
               SET position = v.position
               FROM UNNEST($1::uuid[], $2::int4[]) AS v(id, position)
               WHERE ci.id = v.id AND ci.course_id = $3"#,
        )
        .bind(&ids)
        .bind(&positions)
        .bind(course_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::info!(%course_id, count = items.len(), "course items reordered");
        Ok(())
    }

    async fn toggle_favorite(&self, user_id: Uuid, course_id: Uuid) -> AppResult<bool> {
        let mut tx = self.pool.begin().await?;

        let removed = sqlx::query("DELETE FROM favorites WHERE user_id = $1 AND course_id = $2")
            .bind(user_id)
            .bind(course_id)
            .execute(&mut *tx)
            .await?
            .rows_affected()
            > 0;

        if !removed {
            let inserted = sqlx::query(
                r#"INSERT INTO favorites (user_id, course_id)
                   SELECT $1, c.id FROM courses c WHERE c.id = $2 AND c.is_published
                   ON CONFLICT DO NOTHING"#,
            )
            .bind(user_id)
            .bind(course_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

            if inserted == 0 {
                return Err(AppError::NotFound("Course not found".into()));
            }
        }

        tx.commit().await?;
        Ok(!removed)
    }

    // --- ENROLLMENT & PROGRESS ---

    /// enroll
    ///
    /// Recomputes immediately so a returning learner's earlier completions count again.
    async fn enroll(&self, user_id: Uuid, course_id: Uuid) -> AppResult<Enrollment> {
        let mut tx = self.pool.begin().await?;

        sqlx::query_scalar::<_, Uuid>(
            r#"INSERT INTO enrollments (user_id, course_id)
               SELECT $1, c.id FROM courses c WHERE c.id = $2 AND c.is_published
               RETURNING id"#,
        )
        .bind(user_id)
        .bind(course_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Course not found".into()))?;

        let enrollment = recompute_progress(&mut tx, user_id, course_id).await?;
        tx.commit().await?;
        Ok(enrollment)
    }

    async fn list_enrollments(&self, user_id: Uuid) -> AppResult<Vec<EnrolledCourse>> {
        Ok(sqlx::query_as::<_, EnrolledCourse>(
            r#"SELECT e.course_id, c.title, c.slug, c.thumbnail_url, e.progress_percent,
                      e.status, e.enrolled_at
               FROM enrollments e
               JOIN courses c ON c.id = e.course_id
               WHERE e.user_id = $1
               ORDER BY e.enrolled_at DESC"#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn get_enrollment(
        &self,
        user_id: Uuid,
        course_id: Uuid,
    ) -> AppResult<Option<Enrollment>> {
        Ok(sqlx::query_as::<_, Enrollment>(
            r#"SELECT id, user_id, course_id, progress_percent, status, enrolled_at, updated_at
               FROM enrollments WHERE user_id = $1 AND course_id = $2"#,
        )
        .bind(user_id)
        .bind(course_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn course_item_detail(
        &self,
        user_id: Uuid,
        course_key: &str,
        item_slug: &str,
    ) -> AppResult<CourseItemDetail> {
        let course = self
            .find_course(course_key)
            .await?
            .ok_or_else(|| AppError::NotFound("Course not found".into()))?;

        if self.get_enrollment(user_id, course.id).await?.is_none() {
            return Err(AppError::not_enrolled());
        }

        let slots = sqlx::query_as::<_, (Uuid, String)>(
            "SELECT id, slug FROM course_items WHERE course_id = $1 ORDER BY position ASC",
        )
        .bind(course.id)
        .fetch_all(&self.pool)
        .await?;

        let index = slots
            .iter()
            .position(|(_, slug)| slug == item_slug)
            .ok_or_else(|| AppError::NotFound("Course item not found".into()))?;

        let item = sqlx::query_as::<_, CourseItem>(
            "SELECT id, course_id, slug, position, type, module_id, workshop_id FROM course_items WHERE id = $1",
        )
        .bind(slots[index].0)
        .fetch_one(&self.pool)
        .await?;

        let mut detail = CourseItemDetail {
            id: item.id,
            slug: item.slug.clone(),
            item_type: item.item_type,
            position: item.position,
            total_items: slots.len() as i64,
            course: CourseRef {
                id: course.id,
                title: course.title.clone(),
                slug: course.slug.clone(),
            },
            module: None,
            workshop: None,
            prev_item: index.checked_sub(1).map(|i| slots[i].1.clone()),
            next_item: slots.get(index + 1).map(|(_, slug)| slug.clone()),
        };

        match (item.item_type, item.module_id, item.workshop_id) {
            (CourseItemType::Module, Some(module_id), _) => {
                let row = sqlx::query_as::<_, (Uuid, String, String, String, String, Option<String>, i32, bool)>(
                    r#"SELECT m.id, m.title, m.description, m.content, m.content_url, m.video_url,
                              m.duration,
                              EXISTS (SELECT 1 FROM module_progresses mp
                                      WHERE mp.module_id = m.id AND mp.user_id = $2
                                        AND mp.completed_at IS NOT NULL)
                       FROM modules m WHERE m.id = $1"#,
                )
                .bind(module_id)
                .bind(user_id)
                .fetch_one(&self.pool)
                .await?;

                detail.module = Some(ModuleDetail {
                    id: row.0,
                    title: row.1,
                    description: row.2,
                    content: row.3,
                    content_url: row.4,
                    video_url: row.5,
                    duration: row.6,
                    is_completed: row.7,
                });
            }
            (CourseItemType::Workshop, _, Some(workshop_id)) => {
                let (id, title, instructions, is_registered) =
                    sqlx::query_as::<_, (Uuid, String, String, bool)>(
                        r#"SELECT w.id, w.title, w.instructions,
                                  EXISTS (SELECT 1 FROM workshop_registrations r
                                          WHERE r.workshop_id = w.id AND r.user_id = $2)
                           FROM workshops w WHERE w.id = $1"#,
                    )
                    .bind(workshop_id)
                    .bind(user_id)
                    .fetch_one(&self.pool)
                    .await?;

                let submission = sqlx::query_as::<_, (String, Option<i32>, Option<String>)>(
                    r#"SELECT submission_url, score, feedback FROM workshop_submissions
                       WHERE workshop_id = $1 AND user_id = $2"#,
                )
                .bind(workshop_id)
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?
                .map(|(submission_url, score, feedback)| SubmissionSummary {
                    submission_url,
                    score,
                    feedback,
                });

                detail.workshop = Some(WorkshopDetail {
                    id,
                    title,
                    instructions,
                    is_registered,
                    submission,
                });
            }
            _ => {
                return Err(AppError::Internal(format!(
                    "course item {} has no target",
                    item.id
                )));
            }
        }

        Ok(detail)
    }

    /// complete_module
    ///
    /// Locks the enrollment, upserts the completion, and recomputes with the single
    /// aggregate statement, all in one transaction.
    async fn complete_module(&self, user_id: Uuid, module_id: Uuid) -> AppResult<Enrollment> {
        let mut tx = self.pool.begin().await?;

        let course_id = sqlx::query_scalar::<_, Uuid>(
            "SELECT course_id FROM course_items WHERE module_id = $1",
        )
        .bind(module_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Module not found".into()))?;

        lock_enrollment(&mut tx, user_id, course_id).await?;

        sqlx::query(
            r#"INSERT INTO module_progresses (user_id, module_id, completed_at)
               VALUES ($1, $2, NOW())
               ON CONFLICT (user_id, module_id) DO UPDATE SET completed_at = NOW()"#,
        )
        .bind(user_id)
        .bind(module_id)
        .execute(&mut *tx)
        .await?;

        let enrollment = recompute_progress(&mut tx, user_id, course_id).await?;
        tx.commit().await?;
        Ok(enrollment)
    }

    /// register_workshop
    ///
    /// Only workshops placed in a published course are open; the learner must be enrolled.
    /// A second registration trips the unique constraint and surfaces as 409.
    async fn register_workshop(
        &self,
        user_id: Uuid,
        workshop_id: Uuid,
    ) -> AppResult<WorkshopRegistration> {
        let course_id = sqlx::query_scalar::<_, Uuid>(
            r#"SELECT ci.course_id
               FROM course_items ci
               JOIN courses c ON c.id = ci.course_id
               WHERE ci.workshop_id = $1 AND c.is_published"#,
        )
        .bind(workshop_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Workshop not found".into()))?;

        if self.get_enrollment(user_id, course_id).await?.is_none() {
            return Err(AppError::not_enrolled());
        }

        let registration = sqlx::query_as::<_, WorkshopRegistration>(
            r#"INSERT INTO workshop_registrations (user_id, workshop_id)
               VALUES ($1, $2)
               RETURNING id, user_id, workshop_id, registered_at"#,
        )
        .bind(user_id)
        .bind(workshop_id)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(%user_id, %workshop_id, "workshop registration created");
        Ok(registration)
    }

    /// submit_workshop
    ///
    /// Registration and enrollment gate submission, then the url must be non-empty. A
    /// resubmission replaces the url and clears any grade.
    async fn submit_workshop(
        &self,
        user_id: Uuid,
        workshop_id: Uuid,
        submission_url: &str,
    ) -> AppResult<SubmissionOutcome> {
        let mut tx = self.pool.begin().await?;

        let course_id = sqlx::query_scalar::<_, Uuid>(
            "SELECT course_id FROM course_items WHERE workshop_id = $1",
        )
        .bind(workshop_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Workshop not found".into()))?;

        let registered: bool = sqlx::query_scalar(
            r#"SELECT EXISTS (SELECT 1 FROM workshop_registrations
                              WHERE user_id = $1 AND workshop_id = $2)"#,
        )
        .bind(user_id)
        .bind(workshop_id)
        .fetch_one(&mut *tx)
        .await?;

        if !registered {
            return Err(AppError::Forbidden("You must register first".into()));
        }

        lock_enrollment(&mut tx, user_id, course_id).await?;

        if submission_url.is_empty() {
            return Err(AppError::BadRequest("Submission URL is required".into()));
        }

        let submission = sqlx::query_as::<_, WorkshopSubmission>(
            r#"INSERT INTO workshop_submissions (user_id, workshop_id, submission_url)
               VALUES ($1, $2, $3)
               ON CONFLICT (user_id, workshop_id) DO UPDATE
                   SET submission_url = EXCLUDED.submission_url,
                       score = NULL,
                       feedback = NULL,
                       submitted_at = NOW()
               RETURNING id, user_id, workshop_id, submission_url, score, feedback, submitted_at"#,
        )
        .bind(user_id)
        .bind(workshop_id)
        .bind(submission_url)
        .fetch_one(&mut *tx)
        .await?;

        let enrollment = recompute_progress(&mut tx, user_id, course_id).await?;
        tx.commit().await?;

        Ok(SubmissionOutcome {
            submission,
            enrollment,
        })
    }

    async fn grade_submission(
        &self,
        id: Uuid,
        score: i32,
        feedback: Option<String>,
    ) -> AppResult<Option<WorkshopSubmission>> {
        Ok(sqlx::query_as::<_, WorkshopSubmission>(
            r#"UPDATE workshop_submissions SET score = $2, feedback = $3
               WHERE id = $1
               RETURNING id, user_id, workshop_id, submission_url, score, feedback, submitted_at"#,
        )
        .bind(id)
        .bind(score)
        .bind(feedback)
        .fetch_optional(&self.pool)
        .await?)
    }

    // --- LEARNING PATHS ---

    async fn list_learning_paths(&self) -> AppResult<Vec<LearningPathWithItems>> {
        let paths = sqlx::query_as::<_, LearningPath>(
            r#"SELECT id, title, slug, description, is_published, created_at
               FROM learning_paths WHERE is_published = true ORDER BY title ASC"#,
        )
        .fetch_all(&self.pool)
        .await?;

        let ids: Vec<Uuid> = paths.iter().map(|p| p.id).collect();
        let rows = sqlx::query_as::<_, LearningPathCourse>(
            r#"SELECT lpi.id, lpi.learning_path_id, lpi.course_id, lpi.position, c.title, c.slug
               FROM learning_path_items lpi
               JOIN courses c ON c.id = lpi.course_id
               WHERE lpi.learning_path_id = ANY($1)
               ORDER BY lpi.position ASC"#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut by_path: HashMap<Uuid, Vec<LearningPathCourse>> = HashMap::new();
        for row in rows {
            by_path.entry(row.learning_path_id).or_default().push(row);
        }

        Ok(paths
            .into_iter()
            .map(|path| LearningPathWithItems {
                items: by_path.remove(&path.id).unwrap_or_default(),
                path,
            })
            .collect())
    }

    /// add_learning_path_item
    ///
    /// Out-of-range or missing positions append to the end of the path.
    async fn add_learning_path_item(
        &self,
        path_id: Uuid,
        course_id: Uuid,
        position: Option<i32>,
    ) -> AppResult<LearningPathItem> {
        let mut tx = self.pool.begin().await?;

        sqlx::query_scalar::<_, Uuid>("SELECT id FROM learning_paths WHERE id = $1 FOR UPDATE")
            .bind(path_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound("Learning path not found".into()))?;

        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM learning_path_items WHERE learning_path_id = $1",
        )
        .bind(path_id)
        .fetch_one(&mut *tx)
        .await?;

        let position = lenient_insert_position(position, count);

        sqlx::query(
            r#"UPDATE learning_path_items SET position = position + 1
               WHERE learning_path_id = $1 AND position >= $2"#,
        )
        .bind(path_id)
        .bind(position)
        .execute(&mut *tx)
        .await?;

        let item = sqlx::query_as::<_, LearningPathItem>(
            r#"INSERT INTO learning_path_items (learning_path_id, course_id, position)
               VALUES ($1, $2, $3)
               RETURNING id, learning_path_id, course_id, position"#,
        )
        .bind(path_id)
        .bind(course_id)
        .bind(position)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(item)
    }

    async fn reorder_learning_path(&self, path_id: Uuid, items: &[ReorderItem]) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query_scalar::<_, Uuid>("SELECT id FROM learning_paths WHERE id = $1 FOR UPDATE")
            .bind(path_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound("Learning path not found".into()))?;

        let current: Vec<Uuid> =
            sqlx::query_scalar("SELECT id FROM learning_path_items WHERE learning_path_id = $1")
                .bind(path_id)
                .fetch_all(&mut *tx)
                .await?;
        ensure_complete_reorder(items, &current)?;

        let ids: Vec<Uuid> = items.iter().map(|item| item.id).collect();
        let positions: Vec<i32> = items.iter().map(|item| item.position).collect();

        sqlx::query(
            r#"UPDATE learning_path_items lpi
               SET position = v.position
               FROM UNNEST($1::uuid[], $2::int4[]) AS v(id, position)
               WHERE lpi.id = v.id AND lpi.learning_path_id = $3"#,
        )
        .bind(&ids)
        .bind(&positions)
        .bind(path_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }
}
