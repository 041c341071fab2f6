use async_trait::async_trait;

use crate::models::{
    Assignment, AssignmentDraft, AssignmentUpdate, ContentDraft, ContentItem, ContentProgress,
    ContentProgressUpdate, ContentUpdate, Course, CourseDraft, CourseEnrollment, CourseProgress,
    CourseUpdate, EnrollmentRole, Module, ModuleDraft, ModuleProgress, ModuleUpdate, Submission,
    SubmissionDraft, UserProgress,
};

use super::ApiError;

/// The remote learning-platform API as seen by the cache engine.
///
/// Every call suspends until the server answers and resolves to the record
/// shape of its entity family. Not-found lookups surface as
/// `ApiError::Status { status: 404, .. }`; callers that treat absence as
/// normal translate them with [`OptionalExt`](super::OptionalExt).
#[async_trait]
pub trait RemoteApi: Send + Sync {
    // ===== Courses =====

    async fn list_courses(&self) -> Result<Vec<Course>, ApiError>;
    async fn list_enrolled_courses(&self) -> Result<Vec<Course>, ApiError>;
    async fn get_course(&self, id: i64) -> Result<Course, ApiError>;
    async fn create_course(&self, draft: &CourseDraft) -> Result<Course, ApiError>;
    async fn update_course(&self, id: i64, update: &CourseUpdate) -> Result<Course, ApiError>;
    async fn delete_course(&self, id: i64) -> Result<(), ApiError>;

    async fn list_enrollments(&self, course_id: i64) -> Result<Vec<CourseEnrollment>, ApiError>;
    async fn enroll_user(
        &self,
        course_id: i64,
        user_id: i64,
        role: EnrollmentRole,
    ) -> Result<CourseEnrollment, ApiError>;
    async fn unenroll_user(&self, course_id: i64, user_id: i64) -> Result<(), ApiError>;

    // ===== Modules =====

    async fn list_modules(&self, course_id: i64) -> Result<Vec<Module>, ApiError>;
    async fn get_module(&self, id: i64) -> Result<Module, ApiError>;
    async fn create_module(&self, course_id: i64, draft: &ModuleDraft) -> Result<Module, ApiError>;
    async fn update_module(&self, id: i64, update: &ModuleUpdate) -> Result<Module, ApiError>;
    async fn delete_module(&self, id: i64) -> Result<(), ApiError>;
    async fn reorder_modules(&self, course_id: i64, module_ids: &[i64]) -> Result<Vec<Module>, ApiError>;

    // ===== Content =====

    async fn list_content(&self, module_id: i64) -> Result<Vec<ContentItem>, ApiError>;
    async fn get_content(&self, id: i64) -> Result<ContentItem, ApiError>;
    async fn create_content(&self, module_id: i64, draft: &ContentDraft) -> Result<ContentItem, ApiError>;
    async fn update_content(&self, id: i64, update: &ContentUpdate) -> Result<ContentItem, ApiError>;
    async fn delete_content(&self, id: i64) -> Result<(), ApiError>;

    // ===== Progress =====

    async fn get_user_progress(&self, user_id: i64) -> Result<UserProgress, ApiError>;
    async fn get_course_progress(&self, course_id: i64, user_id: i64) -> Result<CourseProgress, ApiError>;
    async fn get_module_progress(&self, module_id: i64, user_id: i64) -> Result<ModuleProgress, ApiError>;
    async fn mark_module_completed(&self, module_id: i64) -> Result<ModuleProgress, ApiError>;
    async fn mark_module_incomplete(&self, module_id: i64) -> Result<ModuleProgress, ApiError>;
    async fn record_content_progress(
        &self,
        content_id: i64,
        update: ContentProgressUpdate,
    ) -> Result<ContentProgress, ApiError>;
    async fn record_course_started(&self, course_id: i64) -> Result<(), ApiError>;
    async fn record_assignment_submission(&self, assignment_id: i64) -> Result<(), ApiError>;
    async fn reset_course_progress(&self, course_id: i64, user_id: i64) -> Result<(), ApiError>;

    // ===== Assignments =====

    async fn list_assignments(&self, course_id: i64) -> Result<Vec<Assignment>, ApiError>;
    async fn get_assignment(&self, id: i64) -> Result<Assignment, ApiError>;
    async fn create_assignment(&self, draft: &AssignmentDraft) -> Result<Assignment, ApiError>;
    async fn update_assignment(&self, id: i64, update: &AssignmentUpdate) -> Result<Assignment, ApiError>;
    async fn delete_assignment(&self, id: i64) -> Result<(), ApiError>;

    async fn list_submissions(&self, assignment_id: i64) -> Result<Vec<Submission>, ApiError>;
    async fn get_user_submission(&self, assignment_id: i64, user_id: i64) -> Result<Submission, ApiError>;
    async fn submit_assignment(&self, draft: &SubmissionDraft) -> Result<Submission, ApiError>;
    async fn grade_submission(&self, submission_id: i64, grade: f64) -> Result<Submission, ApiError>;
}
