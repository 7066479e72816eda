#![allow(dead_code)]

use async_trait::async_trait;
use axum::{http::StatusCode, response::IntoResponse};
use chrono::Utc;
use edutia_api::{
    AppState,
    auth::AuthUser,
    catalog::CatalogFilter,
    config::AppConfig,
    error::{AppError, AppResult},
    models::{
        AdminDashboardStats, Category, CorporationRequest, CorporationVerification, Course,
        CourseDetail, CourseItem, CourseItemDetail, CourseItemSummary, CourseItemType, CourseRef,
        CourseSummary, EnrolledCourse, Enrollment, LearningPath, LearningPathCourse,
        LearningPathItem, LearningPathWithItems, ModuleDetail, NewCourse, NewModule, NewWorkshop,
        Profile, ReorderItem, Role, SubmissionOutcome, SubmissionSummary, UpdateCourseRequest,
        UpdateProfileRequest, User, UserCredentials, VerificationStatus, WorkshopDetail,
        WorkshopRegistration, WorkshopSubmission,
    },
    ordering::{ensure_complete_reorder, lenient_insert_position, slugify, strict_insert_position},
    progress::compute_progress,
    repository::{Repository, RepositoryState},
    storage::{MockStorageService, StorageState},
};
use serde::de::DeserializeOwned;
use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex},
};
use uuid::Uuid;

// --- MOCK REPOSITORY ---

/// In-memory stand-in for Postgres. It applies the same rules the SQL does (enrollment gates,
/// position shifting, progress recomputation) so handlers can be exercised end to end.
#[derive(Default)]
pub struct MockRepo {
    pub users: Mutex<HashMap<Uuid, UserCredentials>>,
    pub profiles: Mutex<HashMap<Uuid, Profile>>,
    pub verifications: Mutex<HashMap<Uuid, CorporationVerification>>,
    pub categories: Vec<Category>,
    pub courses: Mutex<Vec<Course>>,
    pub items: Mutex<Vec<CourseItem>>,
    pub module_titles: Mutex<HashMap<Uuid, String>>,
    pub workshop_titles: Mutex<HashMap<Uuid, String>>,
    pub enrollments: Mutex<HashMap<(Uuid, Uuid), Enrollment>>,
    pub completed_modules: Mutex<HashSet<(Uuid, Uuid)>>,
    pub registrations: Mutex<HashSet<(Uuid, Uuid)>>,
    pub submissions: Mutex<HashMap<(Uuid, Uuid), WorkshopSubmission>>,
    pub favorites: Mutex<HashSet<(Uuid, Uuid)>>,
    pub paths: Mutex<Vec<LearningPath>>,
    pub path_items: Mutex<Vec<LearningPathItem>>,
    /// Every reorder that reached the repository.
    pub reorder_calls: Mutex<usize>,
}

impl MockRepo {
    pub fn new() -> Self {
        let categories = [("Software Development", "software-development"), ("Data & AI", "data-ai")]
            .into_iter()
            .map(|(name, slug)| Category {
                id: Uuid::new_v4(),
                name: name.into(),
                slug: slug.into(),
            })
            .collect();

        Self {
            categories,
            ..Default::default()
        }
    }

    pub fn add_user(&self, role: Role) -> Uuid {
        self.add_user_with(role, &format!("{}@edutia.test", Uuid::new_v4()), "")
    }

    pub fn add_user_with(&self, role: Role, email: &str, password_hash: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.users.lock().unwrap().insert(
            id,
            UserCredentials {
                id,
                email: email.into(),
                password_hash: password_hash.into(),
                role,
                created_at: Utc::now(),
            },
        );
        id
    }

    pub fn add_profile(&self, user_id: Uuid) -> Profile {
        let profile = Profile {
            id: Uuid::new_v4(),
            user_id,
            company_name: Some("Acme".into()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            ..Default::default()
        };
        self.profiles.lock().unwrap().insert(user_id, profile.clone());
        profile
    }

    pub fn role_of(&self, user_id: Uuid) -> Role {
        self.users.lock().unwrap()[&user_id].role
    }

    pub fn add_course(&self, title: &str, published: bool) -> Course {
        let course = Course {
            id: Uuid::new_v4(),
            title: title.into(),
            slug: slugify(title),
            description: format!("About {title}"),
            duration: 90,
            is_published: published,
            category_id: self.categories[0].id,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            ..Default::default()
        };
        self.courses.lock().unwrap().push(course.clone());
        course
    }

    /// Appends a module item and returns (item, module id).
    pub fn add_module(&self, course_id: Uuid, title: &str) -> (CourseItem, Uuid) {
        let module_id = Uuid::new_v4();
        self.module_titles.lock().unwrap().insert(module_id, title.into());
        let item = self.push_item(course_id, title, CourseItemType::Module, Some(module_id), None);
        (item, module_id)
    }

    pub fn add_workshop(&self, course_id: Uuid, title: &str) -> (CourseItem, Uuid) {
        let workshop_id = Uuid::new_v4();
        self.workshop_titles.lock().unwrap().insert(workshop_id, title.into());
        let item = self.push_item(course_id, title, CourseItemType::Workshop, None, Some(workshop_id));
        (item, workshop_id)
    }

    fn push_item(
        &self,
        course_id: Uuid,
        title: &str,
        item_type: CourseItemType,
        module_id: Option<Uuid>,
        workshop_id: Option<Uuid>,
    ) -> CourseItem {
        let mut items = self.items.lock().unwrap();
        let position = items.iter().filter(|i| i.course_id == course_id).count() as i32 + 1;
        let item = CourseItem {
            id: Uuid::new_v4(),
            course_id,
            slug: slugify(title),
            position,
            item_type,
            module_id,
            workshop_id,
        };
        items.push(item.clone());
        item
    }

    pub fn enroll_now(&self, user_id: Uuid, course_id: Uuid) {
        self.enrollments.lock().unwrap().insert(
            (user_id, course_id),
            Enrollment {
                id: Uuid::new_v4(),
                user_id,
                course_id,
                enrolled_at: Utc::now(),
                updated_at: Utc::now(),
                ..Default::default()
            },
        );
    }

    pub fn add_path(&self, title: &str) -> LearningPath {
        let path = LearningPath {
            id: Uuid::new_v4(),
            title: title.into(),
            slug: slugify(title),
            is_published: true,
            created_at: Utc::now(),
            ..Default::default()
        };
        self.paths.lock().unwrap().push(path.clone());
        path
    }

    /// Item positions of a course, in position order, as (slug, position).
    pub fn positions(&self, course_id: Uuid) -> Vec<(String, i32)> {
        let mut items: Vec<_> = self
            .items
            .lock()
            .unwrap()
            .iter()
            .filter(|i| i.course_id == course_id)
            .map(|i| (i.slug.clone(), i.position))
            .collect();
        items.sort_by_key(|(_, p)| *p);
        items
    }

    fn course_of_module(&self, module_id: Uuid) -> Option<Uuid> {
        self.items
            .lock()
            .unwrap()
            .iter()
            .find(|i| i.module_id == Some(module_id))
            .map(|i| i.course_id)
    }

    fn course_of_workshop(&self, workshop_id: Uuid) -> Option<Uuid> {
        self.items
            .lock()
            .unwrap()
            .iter()
            .find(|i| i.workshop_id == Some(workshop_id))
            .map(|i| i.course_id)
    }

    fn recompute(&self, user_id: Uuid, course_id: Uuid) -> AppResult<Enrollment> {
        let items: Vec<CourseItem> = self
            .items
            .lock()
            .unwrap()
            .iter()
            .filter(|i| i.course_id == course_id)
            .cloned()
            .collect();
        let done_modules = self.completed_modules.lock().unwrap();
        let submissions = self.submissions.lock().unwrap();

        let completed = items
            .iter()
            .filter(|i| match (i.module_id, i.workshop_id) {
                (Some(m), _) => done_modules.contains(&(user_id, m)),
                (_, Some(w)) => submissions.contains_key(&(user_id, w)),
                _ => false,
            })
            .count() as i64;

        let progress = compute_progress(completed, items.len() as i64);
        let mut enrollments = self.enrollments.lock().unwrap();
        let enrollment = enrollments
            .get_mut(&(user_id, course_id))
            .ok_or_else(AppError::not_enrolled)?;
        enrollment.progress_percent = progress.percent;
        enrollment.status = progress.status;
        enrollment.updated_at = Utc::now();
        Ok(enrollment.clone())
    }

    fn recompute_course(&self, course_id: Uuid) {
        let learners: Vec<Uuid> = self
            .enrollments
            .lock()
            .unwrap()
            .keys()
            .filter(|(_, c)| *c == course_id)
            .map(|(u, _)| *u)
            .collect();
        for user_id in learners {
            let _ = self.recompute(user_id, course_id);
        }
    }

    fn request_for(&self, verification: &CorporationVerification) -> CorporationRequest {
        let profiles = self.profiles.lock().unwrap();
        let profile = profiles
            .values()
            .find(|p| p.id == verification.profile_id)
            .cloned()
            .unwrap_or_default();
        let users = self.users.lock().unwrap();
        let user = users.get(&profile.user_id);

        CorporationRequest {
            id: verification.id,
            profile_id: verification.profile_id,
            user_id: profile.user_id,
            email: user.map(|u| u.email.clone()).unwrap_or_default(),
            role: user.map(|u| u.role).unwrap_or_default(),
            company_name: profile.company_name.clone(),
            company_website: profile.company_website.clone(),
            status: verification.status,
            verified_at: verification.verified_at,
            created_at: verification.created_at,
        }
    }

    fn insert_slot(&self, course_id: Uuid, requested: i32, slug: &str) -> AppResult<i32> {
        if !self.courses.lock().unwrap().iter().any(|c| c.id == course_id) {
            return Err(AppError::NotFound("Course not found".into()));
        }
        let mut items = self.items.lock().unwrap();
        let count = items.iter().filter(|i| i.course_id == course_id).count() as i64;
        let position = strict_insert_position(requested, count)?;
        if items.iter().any(|i| i.course_id == course_id && i.slug == slug) {
            return Err(AppError::Conflict(
                "An item with this title already exists in the course".into(),
            ));
        }
        for item in items
            .iter_mut()
            .filter(|i| i.course_id == course_id && i.position >= position)
        {
            item.position += 1;
        }
        Ok(position)
    }
}

#[async_trait]
impl Repository for MockRepo {
    async fn get_user(&self, id: Uuid) -> AppResult<Option<User>> {
        Ok(self.users.lock().unwrap().get(&id).cloned().map(User::from))
    }

    async fn find_credentials(&self, email: &str) -> AppResult<Option<UserCredentials>> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn create_user(&self, email: &str, password_hash: &str) -> AppResult<User> {
        if self.find_credentials(email).await?.is_some() {
            return Err(AppError::Conflict("Email already in use".into()));
        }
        let id = self.add_user_with(Role::Educatee, email, password_hash);
        self.add_profile(id);
        Ok(self.get_user(id).await?.unwrap_or_default())
    }

    async fn list_users(&self) -> AppResult<Vec<User>> {
        Ok(self.users.lock().unwrap().values().cloned().map(User::from).collect())
    }

    async fn get_stats(&self) -> AppResult<AdminDashboardStats> {
        Ok(AdminDashboardStats {
            total_users: self.users.lock().unwrap().len() as i64,
            total_courses: self.courses.lock().unwrap().len() as i64,
            total_enrollments: self.enrollments.lock().unwrap().len() as i64,
            pending_verifications: self
                .verifications
                .lock()
                .unwrap()
                .values()
                .filter(|v| v.status == VerificationStatus::Pending)
                .count() as i64,
        })
    }

    async fn get_profile(&self, user_id: Uuid) -> AppResult<Option<Profile>> {
        Ok(self.profiles.lock().unwrap().get(&user_id).cloned())
    }

    async fn update_profile(
        &self,
        user_id: Uuid,
        req: UpdateProfileRequest,
    ) -> AppResult<(User, Profile)> {
        if let Some(email) = &req.email {
            let mut users = self.users.lock().unwrap();
            if users
                .values()
                .any(|u| u.id != user_id && u.email.eq_ignore_ascii_case(email))
            {
                return Err(AppError::Conflict("Email already in use".into()));
            }
            let user = users
                .get_mut(&user_id)
                .ok_or_else(|| AppError::NotFound("User not found".into()))?;
            user.email = email.clone();
        }

        let profile = {
            let mut profiles = self.profiles.lock().unwrap();
            let profile = profiles.entry(user_id).or_insert_with(|| Profile {
                id: Uuid::new_v4(),
                user_id,
                ..Default::default()
            });
            profile.name = req.name.or(profile.name.take());
            profile.bio = req.bio.or(profile.bio.take());
            profile.gender = req.gender.or(profile.gender);
            profile.company_name = req.company_name.or(profile.company_name.take());
            profile.clone()
        };

        let user = self
            .get_user(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".into()))?;
        Ok((user, profile))
    }

    async fn apply_corporation(&self, user_id: Uuid) -> AppResult<CorporationVerification> {
        let profile = self
            .get_profile(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Create profile first".into()))?;

        let mut verifications = self.verifications.lock().unwrap();
        if let Some(existing) = verifications.values_mut().find(|v| v.profile_id == profile.id) {
            return match existing.status {
                VerificationStatus::Pending => Err(AppError::Conflict(
                    "Your application is under review".into(),
                )),
                VerificationStatus::Verified => {
                    Err(AppError::Conflict("You are already verified".into()))
                }
                VerificationStatus::Unverified => {
                    existing.status = VerificationStatus::Pending;
                    existing.verified_at = None;
                    Ok(existing.clone())
                }
            };
        }

        let verification = CorporationVerification {
            id: Uuid::new_v4(),
            profile_id: profile.id,
            status: VerificationStatus::Pending,
            verified_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        verifications.insert(verification.id, verification.clone());
        Ok(verification)
    }

    async fn get_verification(&self, user_id: Uuid) -> AppResult<Option<CorporationVerification>> {
        let Some(profile) = self.get_profile(user_id).await? else {
            return Ok(None);
        };
        Ok(self
            .verifications
            .lock()
            .unwrap()
            .values()
            .find(|v| v.profile_id == profile.id)
            .cloned())
    }

    async fn list_corporation_requests(
        &self,
        status: Option<VerificationStatus>,
    ) -> AppResult<Vec<CorporationRequest>> {
        let verifications: Vec<_> = self
            .verifications
            .lock()
            .unwrap()
            .values()
            .filter(|v| status.is_none_or(|s| v.status == s))
            .cloned()
            .collect();
        Ok(verifications.iter().map(|v| self.request_for(v)).collect())
    }

    async fn decide_verification(
        &self,
        id: Uuid,
        status: VerificationStatus,
    ) -> AppResult<CorporationRequest> {
        let verification = {
            let mut verifications = self.verifications.lock().unwrap();
            let v = verifications
                .get_mut(&id)
                .ok_or_else(|| AppError::NotFound("Verification request not found".into()))?;
            v.status = status;
            v.verified_at = (status == VerificationStatus::Verified).then(Utc::now);
            v.clone()
        };

        let owner = self
            .profiles
            .lock()
            .unwrap()
            .values()
            .find(|p| p.id == verification.profile_id)
            .map(|p| p.user_id);
        if let Some(owner) = owner {
            if let Some(user) = self.users.lock().unwrap().get_mut(&owner) {
                user.role = user.role.after_verification(status);
            }
        }

        Ok(self.request_for(&verification))
    }

    async fn list_categories(&self) -> AppResult<Vec<Category>> {
        Ok(self.categories.clone())
    }

    async fn list_courses(
        &self,
        filter: &CatalogFilter,
        viewer: Option<Uuid>,
    ) -> AppResult<Vec<CourseSummary>> {
        let favorites = self.favorites.lock().unwrap();
        Ok(self
            .courses
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.is_published)
            .filter(|c| filter.levels.is_empty() || filter.levels.contains(&c.level))
            .map(|c| CourseSummary {
                id: c.id,
                title: c.title.clone(),
                slug: c.slug.clone(),
                description: c.description.clone(),
                level: c.level,
                duration: c.duration,
                category_id: c.category_id,
                is_favorite: viewer.is_some_and(|u| favorites.contains(&(u, c.id))),
                ..Default::default()
            })
            .collect())
    }

    async fn find_course(&self, key: &str) -> AppResult<Option<Course>> {
        let parsed = Uuid::parse_str(key).ok();
        Ok(self
            .courses
            .lock()
            .unwrap()
            .iter()
            .find(|c| Some(c.id) == parsed || c.slug == key)
            .cloned())
    }

    async fn course_detail(&self, course: Course, viewer: Option<Uuid>) -> AppResult<CourseDetail> {
        let items = self.list_course_items(course.id, viewer).await?;
        let enrollments = self.enrollments.lock().unwrap();
        let enrollment_count = enrollments.keys().filter(|(_, c)| *c == course.id).count() as i64;
        let progress_percent =
            viewer.and_then(|u| enrollments.get(&(u, course.id)).map(|e| e.progress_percent));
        let category = self
            .categories
            .iter()
            .find(|c| c.id == course.category_id)
            .cloned()
            .unwrap_or_default();
        let is_favorite =
            viewer.is_some_and(|u| self.favorites.lock().unwrap().contains(&(u, course.id)));

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
        let modules = self.module_titles.lock().unwrap();
        let workshops = self.workshop_titles.lock().unwrap();
        let done = self.completed_modules.lock().unwrap();
        let submissions = self.submissions.lock().unwrap();
        let user = viewer.unwrap_or(Uuid::nil());

        let mut items: Vec<_> = self
            .items
            .lock()
            .unwrap()
            .iter()
            .filter(|i| i.course_id == course_id)
            .map(|i| CourseItemSummary {
                id: i.id,
                slug: i.slug.clone(),
                item_type: i.item_type,
                title: i
                    .module_id
                    .and_then(|m| modules.get(&m).cloned())
                    .or_else(|| i.workshop_id.and_then(|w| workshops.get(&w).cloned()))
                    .unwrap_or_default(),
                position: i.position,
                completed: i.module_id.is_some_and(|m| done.contains(&(user, m)))
                    || i.workshop_id.is_some_and(|w| submissions.contains_key(&(user, w))),
            })
            .collect();
        items.sort_by_key(|i| i.position);
        Ok(items)
    }

    async fn create_course(&self, course: NewCourse) -> AppResult<Course> {
        let category = self
            .categories
            .iter()
            .find(|c| c.slug == course.category)
            .ok_or_else(|| AppError::BadRequest("Unknown category".into()))?;

        let mut courses = self.courses.lock().unwrap();
        if courses.iter().any(|c| c.slug == course.slug) {
            return Err(AppError::Conflict(
                "A course with this title already exists".into(),
            ));
        }
        let created = Course {
            id: Uuid::new_v4(),
            title: course.title,
            slug: course.slug,
            description: course.description,
            level: course.level,
            duration: course.duration,
            thumbnail_url: course.thumbnail_url,
            is_published: course.is_published,
            category_id: category.id,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            ..Default::default()
        };
        courses.push(created.clone());
        Ok(created)
    }

    async fn update_course(&self, id: Uuid, req: UpdateCourseRequest) -> AppResult<Option<Course>> {
        let mut courses = self.courses.lock().unwrap();
        let Some(course) = courses.iter_mut().find(|c| c.id == id) else {
            return Ok(None);
        };
        if let Some(title) = req.title {
            course.title = title;
        }
        if let Some(description) = req.description {
            course.description = description;
        }
        if let Some(published) = req.is_published {
            course.is_published = published;
        }
        if let Some(duration) = req.duration {
            course.duration = duration;
        }
        Ok(Some(course.clone()))
    }

    async fn delete_course(&self, id: Uuid) -> AppResult<bool> {
        let mut courses = self.courses.lock().unwrap();
        let before = courses.len();
        courses.retain(|c| c.id != id);
        self.items.lock().unwrap().retain(|i| i.course_id != id);
        Ok(courses.len() < before)
    }

    async fn add_module_item(&self, course_id: Uuid, module: NewModule) -> AppResult<CourseItem> {
        let slug = slugify(&module.title);
        let position = self.insert_slot(course_id, module.position, &slug)?;
        let module_id = Uuid::new_v4();
        self.module_titles.lock().unwrap().insert(module_id, module.title);
        let item = CourseItem {
            id: Uuid::new_v4(),
            course_id,
            slug,
            position,
            item_type: CourseItemType::Module,
            module_id: Some(module_id),
            workshop_id: None,
        };
        self.items.lock().unwrap().push(item.clone());
        self.recompute_course(course_id);
        Ok(item)
    }

    async fn add_workshop_item(
        &self,
        course_id: Uuid,
        workshop: NewWorkshop,
    ) -> AppResult<CourseItem> {
        let slug = slugify(&workshop.title);
        let position = self.insert_slot(course_id, workshop.position, &slug)?;
        let workshop_id = Uuid::new_v4();
        self.workshop_titles.lock().unwrap().insert(workshop_id, workshop.title);
        let item = CourseItem {
            id: Uuid::new_v4(),
            course_id,
            slug,
            position,
            item_type: CourseItemType::Workshop,
            module_id: None,
            workshop_id: Some(workshop_id),
        };
        self.items.lock().unwrap().push(item.clone());
        self.recompute_course(course_id);
        Ok(item)
    }

    async fn reorder_course_items(&self, course_id: Uuid, items: &[ReorderItem]) -> AppResult<()> {
        *self.reorder_calls.lock().unwrap() += 1;
        if !self.courses.lock().unwrap().iter().any(|c| c.id == course_id) {
            return Err(AppError::NotFound("Course not found".into()));
        }
        let mut stored = self.items.lock().unwrap();
        let current: Vec<Uuid> = stored
            .iter()
            .filter(|i| i.course_id == course_id)
            .map(|i| i.id)
            .collect();
        ensure_complete_reorder(items, &current)?;
        for update in items {
            if let Some(item) = stored.iter_mut().find(|i| i.id == update.id) {
                item.position = update.position;
            }
        }
        Ok(())
    }

    async fn toggle_favorite(&self, user_id: Uuid, course_id: Uuid) -> AppResult<bool> {
        let mut favorites = self.favorites.lock().unwrap();
        if favorites.remove(&(user_id, course_id)) {
            Ok(false)
        } else {
            favorites.insert((user_id, course_id));
            Ok(true)
        }
    }

    async fn enroll(&self, user_id: Uuid, course_id: Uuid) -> AppResult<Enrollment> {
        let published = self
            .courses
            .lock()
            .unwrap()
            .iter()
            .any(|c| c.id == course_id && c.is_published);
        if !published {
            return Err(AppError::NotFound("Course not found".into()));
        }
        if self.enrollments.lock().unwrap().contains_key(&(user_id, course_id)) {
            return Err(AppError::Conflict("Already enrolled".into()));
        }
        self.enroll_now(user_id, course_id);
        self.recompute(user_id, course_id)
    }

    async fn list_enrollments(&self, user_id: Uuid) -> AppResult<Vec<EnrolledCourse>> {
        let courses = self.courses.lock().unwrap();
        Ok(self
            .enrollments
            .lock()
            .unwrap()
            .values()
            .filter(|e| e.user_id == user_id)
            .filter_map(|e| {
                courses.iter().find(|c| c.id == e.course_id).map(|c| EnrolledCourse {
                    course_id: c.id,
                    title: c.title.clone(),
                    slug: c.slug.clone(),
                    thumbnail_url: c.thumbnail_url.clone(),
                    progress_percent: e.progress_percent,
                    status: e.status,
                    enrolled_at: e.enrolled_at,
                })
            })
            .collect())
    }

    async fn get_enrollment(
        &self,
        user_id: Uuid,
        course_id: Uuid,
    ) -> AppResult<Option<Enrollment>> {
        Ok(self
            .enrollments
            .lock()
            .unwrap()
            .get(&(user_id, course_id))
            .cloned())
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

        let mut slots: Vec<CourseItem> = self
            .items
            .lock()
            .unwrap()
            .iter()
            .filter(|i| i.course_id == course.id)
            .cloned()
            .collect();
        slots.sort_by_key(|i| i.position);
        let index = slots
            .iter()
            .position(|i| i.slug == item_slug)
            .ok_or_else(|| AppError::NotFound("Course item not found".into()))?;
        let item = &slots[index];

        let module = item.module_id.map(|m| ModuleDetail {
            id: m,
            title: self.module_titles.lock().unwrap().get(&m).cloned().unwrap_or_default(),
            content: "module body".into(),
            content_url: "modules/file.pdf".into(),
            is_completed: self.completed_modules.lock().unwrap().contains(&(user_id, m)),
            ..Default::default()
        });
        let workshop = item.workshop_id.map(|w| WorkshopDetail {
            id: w,
            title: self.workshop_titles.lock().unwrap().get(&w).cloned().unwrap_or_default(),
            instructions: "workshop brief".into(),
            is_registered: self.registrations.lock().unwrap().contains(&(user_id, w)),
            submission: self
                .submissions
                .lock()
                .unwrap()
                .get(&(user_id, w))
                .map(|s| SubmissionSummary {
                    submission_url: s.submission_url.clone(),
                    score: s.score,
                    feedback: s.feedback.clone(),
                }),
        });

        Ok(CourseItemDetail {
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
            module,
            workshop,
            prev_item: index.checked_sub(1).map(|i| slots[i].slug.clone()),
            next_item: slots.get(index + 1).map(|i| i.slug.clone()),
        })
    }

    async fn complete_module(&self, user_id: Uuid, module_id: Uuid) -> AppResult<Enrollment> {
        let course_id = self
            .course_of_module(module_id)
            .ok_or_else(|| AppError::NotFound("Module not found".into()))?;
        if self.get_enrollment(user_id, course_id).await?.is_none() {
            return Err(AppError::not_enrolled());
        }
        self.completed_modules.lock().unwrap().insert((user_id, module_id));
        self.recompute(user_id, course_id)
    }

    async fn register_workshop(
        &self,
        user_id: Uuid,
        workshop_id: Uuid,
    ) -> AppResult<WorkshopRegistration> {
        let course_id = self
            .course_of_workshop(workshop_id)
            .filter(|id| {
                self.courses
                    .lock()
                    .unwrap()
                    .iter()
                    .any(|c| c.id == *id && c.is_published)
            })
            .ok_or_else(|| AppError::NotFound("Workshop not found".into()))?;
        if self.get_enrollment(user_id, course_id).await?.is_none() {
            return Err(AppError::not_enrolled());
        }
        if !self.registrations.lock().unwrap().insert((user_id, workshop_id)) {
            return Err(AppError::Conflict("Already registered".into()));
        }
        Ok(WorkshopRegistration {
            id: Uuid::new_v4(),
            user_id,
            workshop_id,
            registered_at: Utc::now(),
        })
    }

    async fn submit_workshop(
        &self,
        user_id: Uuid,
        workshop_id: Uuid,
        submission_url: &str,
    ) -> AppResult<SubmissionOutcome> {
        let course_id = self
            .course_of_workshop(workshop_id)
            .ok_or_else(|| AppError::NotFound("Workshop not found".into()))?;
        if !self.registrations.lock().unwrap().contains(&(user_id, workshop_id)) {
            return Err(AppError::Forbidden("You must register first".into()));
        }
        if self.get_enrollment(user_id, course_id).await?.is_none() {
            return Err(AppError::not_enrolled());
        }
        if submission_url.is_empty() {
            return Err(AppError::BadRequest("Submission URL is required".into()));
        }

        let submission = {
            let mut submissions = self.submissions.lock().unwrap();
            let entry = submissions
                .entry((user_id, workshop_id))
                .or_insert_with(|| WorkshopSubmission {
                    id: Uuid::new_v4(),
                    user_id,
                    workshop_id,
                    ..Default::default()
                });
            entry.submission_url = submission_url.to_string();
            entry.score = None;
            entry.feedback = None;
            entry.submitted_at = Utc::now();
            entry.clone()
        };

        let enrollment = self.recompute(user_id, course_id)?;
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
        let mut submissions = self.submissions.lock().unwrap();
        Ok(submissions.values_mut().find(|s| s.id == id).map(|s| {
            s.score = Some(score);
            s.feedback = feedback;
            s.clone()
        }))
    }

    async fn list_learning_paths(&self) -> AppResult<Vec<LearningPathWithItems>> {
        let items = self.path_items.lock().unwrap();
        let courses = self.courses.lock().unwrap();
        Ok(self
            .paths
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.is_published)
            .map(|path| {
                let mut steps: Vec<_> = items
                    .iter()
                    .filter(|i| i.learning_path_id == path.id)
                    .map(|i| {
                        let course = courses.iter().find(|c| c.id == i.course_id);
                        LearningPathCourse {
                            id: i.id,
                            learning_path_id: i.learning_path_id,
                            course_id: i.course_id,
                            position: i.position,
                            title: course.map(|c| c.title.clone()).unwrap_or_default(),
                            slug: course.map(|c| c.slug.clone()).unwrap_or_default(),
                        }
                    })
                    .collect();
                steps.sort_by_key(|s| s.position);
                LearningPathWithItems {
                    path: path.clone(),
                    items: steps,
                }
            })
            .collect())
    }

    async fn add_learning_path_item(
        &self,
        path_id: Uuid,
        course_id: Uuid,
        position: Option<i32>,
    ) -> AppResult<LearningPathItem> {
        if !self.paths.lock().unwrap().iter().any(|p| p.id == path_id) {
            return Err(AppError::NotFound("Learning path not found".into()));
        }
        let mut items = self.path_items.lock().unwrap();
        if items
            .iter()
            .any(|i| i.learning_path_id == path_id && i.course_id == course_id)
        {
            return Err(AppError::Conflict("Course already in learning path".into()));
        }
        let count = items.iter().filter(|i| i.learning_path_id == path_id).count() as i64;
        let position = lenient_insert_position(position, count);
        for item in items
            .iter_mut()
            .filter(|i| i.learning_path_id == path_id && i.position >= position)
        {
            item.position += 1;
        }
        let item = LearningPathItem {
            id: Uuid::new_v4(),
            learning_path_id: path_id,
            course_id,
            position,
        };
        items.push(item.clone());
        Ok(item)
    }

    async fn reorder_learning_path(&self, path_id: Uuid, items: &[ReorderItem]) -> AppResult<()> {
        *self.reorder_calls.lock().unwrap() += 1;
        let mut stored = self.path_items.lock().unwrap();
        let current: Vec<Uuid> = stored
            .iter()
            .filter(|i| i.learning_path_id == path_id)
            .map(|i| i.id)
            .collect();
        ensure_complete_reorder(items, &current)?;
        for update in items {
            if let Some(item) = stored.iter_mut().find(|i| i.id == update.id) {
                item.position = update.position;
            }
        }
        Ok(())
    }
}

// --- TEST UTILITIES ---

pub fn create_test_state(repo: Arc<MockRepo>, storage: MockStorageService) -> AppState {
    AppState {
        repo: repo as RepositoryState,
        storage: Arc::new(storage) as StorageState,
        config: AppConfig::default(),
    }
}

pub fn auth_user(id: Uuid, role: Role) -> AuthUser {
    AuthUser { id, role }
}

/// Renders an error the way axum would and returns its status and message.
pub async fn error_response(err: AppError) -> (StatusCode, String) {
    let response = err.into_response();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    (status, body["message"].as_str().unwrap_or_default().to_string())
}

pub async fn json_body<T: DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
