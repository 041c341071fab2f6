//! Course fetches, mutations and enrollment bookkeeping.

use tracing::{debug, info};

use super::SessionContext;
use crate::error::Result;
use crate::models::{Course, CourseDraft, CourseEnrollment, CourseUpdate, EnrollmentRole};

pub struct CourseSync<'a> {
    ctx: &'a SessionContext,
}

impl<'a> CourseSync<'a> {
    pub(crate) fn new(ctx: &'a SessionContext) -> Self {
        Self { ctx }
    }

    // ===== Fetches =====

    /// Load the full catalog (the "all courses" view).
    pub async fn fetch_all(&self) -> Result<Vec<Course>> {
        self.ctx
            .run("Failed to fetch courses", async {
                let courses = self.ctx.remote().list_courses().await?;
                debug!(count = courses.len(), "Courses fetched");
                self.ctx.write(|c| c.replace_all_courses(courses));
                Ok(self.all())
            })
            .await
    }

    /// Load the current user's enrollments (the "enrolled courses" view).
    pub async fn fetch_enrolled(&self) -> Result<Vec<Course>> {
        self.ctx
            .run("Failed to fetch enrolled courses", async {
                let courses = self.ctx.remote().list_enrolled_courses().await?;
                debug!(count = courses.len(), "Enrolled courses fetched");
                self.ctx.write(|c| c.replace_enrolled_courses(courses));
                Ok(self.enrolled())
            })
            .await
    }

    pub async fn fetch(&self, id: i64) -> Result<Course> {
        let message = format!("Failed to fetch course with ID {}", id);
        self.ctx
            .run(&message, async {
                let course = self.ctx.remote().get_course(id).await?;
                Ok(self.reconcile(course))
            })
            .await
    }

    pub async fn fetch_enrollments(&self, course_id: i64) -> Result<Vec<CourseEnrollment>> {
        self.ctx
            .run("Failed to fetch enrollments", async {
                let enrollments = self.ctx.remote().list_enrollments(course_id).await?;
                self.ctx
                    .write(|c| c.replace_enrollments(course_id, enrollments.clone()));
                Ok(enrollments)
            })
            .await
    }

    // ===== Mutations =====

    pub async fn create(&self, draft: &CourseDraft) -> Result<Course> {
        self.ctx
            .run("Failed to create course", async {
                let course = self.ctx.remote().create_course(draft).await?;
                info!(course_id = course.id, code = %course.code, "Course created");
                self.ctx.write(|c| c.add_to_all_courses(course.clone()));
                Ok(course)
            })
            .await
    }

    pub async fn update(&self, id: i64, update: &CourseUpdate) -> Result<Course> {
        self.ctx
            .run("Failed to update course", async {
                let course = self.ctx.remote().update_course(id, update).await?;
                Ok(self.reconcile(course))
            })
            .await
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        self.ctx
            .run("Failed to delete course", async {
                self.ctx.remote().delete_course(id).await?;
                info!(course_id = id, "Course deleted");
                self.ctx.write(|c| c.remove_course(id));
                Ok(())
            })
            .await
    }

    /// Enroll a user and bump the course's count without refetching it.
    pub async fn enroll(&self, course_id: i64, user_id: i64, role: EnrollmentRole) -> Result<CourseEnrollment> {
        let current_user = self.ctx.auth().user_id();
        self.ctx
            .run("Failed to enroll user", async {
                let enrollment = self.ctx.remote().enroll_user(course_id, user_id, role).await?;
                self.ctx.write(|c| {
                    c.upsert_enrollment(enrollment.clone());
                    if let Err(e) = c.adjust_enrollment_count(course_id, role, 1) {
                        debug!(error = %e, "Skipping enrollment count update");
                    }
                    if current_user == Some(user_id) {
                        c.add_to_enrolled_courses(course_id);
                    }
                });
                Ok(enrollment)
            })
            .await
    }

    pub async fn unenroll(&self, course_id: i64, user_id: i64) -> Result<()> {
        let current_user = self.ctx.auth().user_id();
        self.ctx
            .run("Failed to unenroll user", async {
                self.ctx.remote().unenroll_user(course_id, user_id).await?;
                self.ctx.write(|c| {
                    // Counts only move for an enrollment we actually removed
                    match c.remove_enrollment(course_id, user_id) {
                        Some(removed) => {
                            if let Err(e) = c.adjust_enrollment_count(course_id, removed.role, -1) {
                                debug!(error = %e, "Skipping enrollment count update");
                            }
                        }
                        None => debug!(course_id, user_id, "Enrollment not cached, counts left as is"),
                    }
                    if current_user == Some(user_id) {
                        c.leave_enrolled_view(course_id);
                    }
                });
                Ok(())
            })
            .await
    }

    fn reconcile(&self, course: Course) -> Course {
        let elevated = self.ctx.auth().is_admin();
        let id = course.id;
        self.ctx.write(|c| {
            c.reconcile_course(course.clone(), elevated);
            c.course(id).cloned().unwrap_or(course)
        })
    }

    // ===== Accessors =====

    pub fn get(&self, id: i64) -> Option<Course> {
        self.ctx.read(|c| c.course(id).cloned())
    }

    pub fn all(&self) -> Vec<Course> {
        self.ctx.read(|c| c.all_courses().into_iter().cloned().collect())
    }

    pub fn enrolled(&self) -> Vec<Course> {
        self.ctx.read(|c| c.enrolled_courses().into_iter().cloned().collect())
    }

    /// Admins see the catalog, everyone else their enrollments.
    pub fn for_role(&self) -> Vec<Course> {
        let is_admin = self.ctx.auth().is_admin();
        self.ctx
            .read(|c| c.courses_for_role(is_admin).into_iter().cloned().collect())
    }

    pub fn enrolled_count(&self) -> usize {
        self.ctx.read(|c| c.enrolled_course_count())
    }

    pub fn taught(&self) -> Vec<Course> {
        if !self.ctx.auth().is_teacher() {
            return Vec::new();
        }
        self.ctx.read(|c| c.taught_courses().into_iter().cloned().collect())
    }

    pub fn search(&self, term: &str) -> Vec<Course> {
        let is_admin = self.ctx.auth().is_admin();
        self.ctx
            .read(|c| c.search_courses(term, is_admin).into_iter().cloned().collect())
    }

    pub fn enrollments(&self, course_id: i64) -> Vec<CourseEnrollment> {
        self.ctx.read(|c| c.enrollments(course_id).to_vec())
    }

    pub fn teachers(&self, course_id: i64) -> Vec<CourseEnrollment> {
        self.ctx
            .read(|c| c.teachers(course_id).into_iter().cloned().collect())
    }

    pub fn students(&self, course_id: i64) -> Vec<CourseEnrollment> {
        self.ctx
            .read(|c| c.students(course_id).into_iter().cloned().collect())
    }

    pub fn student_count(&self, course_id: i64) -> usize {
        self.ctx.read(|c| c.student_count(course_id))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::api::fake::{self, FakeRemote};
    use crate::auth::AuthState;
    use crate::config::Config;
    use crate::models::{User, UserRole};

    fn session(role: UserRole) -> (Arc<FakeRemote>, SessionContext) {
        let remote = Arc::new(FakeRemote::new(1));
        let ctx = SessionContext::new(
            remote.clone(),
            AuthState::with_user(User::with_role(1, role)),
            Config::default(),
        );
        (remote, ctx)
    }

    #[tokio::test]
    async fn test_update_propagates_to_both_views() {
        let (remote, ctx) = session(UserRole::Student);
        remote.add_course(fake::course(1), true);
        remote.add_course(fake::course(2), false);

        ctx.courses().fetch_all().await.expect("catalog loads");
        ctx.courses().fetch_enrolled().await.expect("enrollments load");

        let update = CourseUpdate {
            name: Some("Renamed".to_string()),
            ..CourseUpdate::default()
        };
        ctx.courses().update(1, &update).await.expect("update succeeds");

        let all = ctx.courses().all();
        let enrolled = ctx.courses().enrolled();
        assert_eq!(all.iter().find(|c| c.id == 1).map(|c| c.name.as_str()), Some("Renamed"));
        assert_eq!(enrolled[0].name, "Renamed");
    }

    #[tokio::test]
    async fn test_update_of_enrolled_only_course_leaves_catalog_untouched() {
        let (remote, ctx) = session(UserRole::Student);
        remote.add_course(fake::course(1), true);
        ctx.courses().fetch_enrolled().await.expect("enrollments load");

        let update = CourseUpdate {
            name: Some("Renamed".to_string()),
            ..CourseUpdate::default()
        };
        ctx.courses().update(1, &update).await.expect("update succeeds");

        assert!(ctx.courses().all().is_empty());
        assert_eq!(ctx.courses().enrolled()[0].name, "Renamed");
    }

    #[tokio::test]
    async fn test_admin_create_appends_to_catalog() {
        let (_remote, ctx) = session(UserRole::Admin);
        let draft = CourseDraft {
            code: "CS201".to_string(),
            name: "Data Structures".to_string(),
            ..CourseDraft::default()
        };
        let created = ctx.courses().create(&draft).await.expect("create succeeds");
        assert_eq!(ctx.courses().for_role().len(), 1);
        assert_eq!(ctx.courses().search("data")[0].id, created.id);
    }

    #[tokio::test]
    async fn test_enroll_adjusts_counts_optimistically() {
        let (remote, ctx) = session(UserRole::Admin);
        remote.add_course(fake::course(1), false);
        ctx.courses().fetch_all().await.expect("catalog loads");
        ctx.courses().fetch_enrollments(1).await.expect("enrollments load");

        ctx.courses()
            .enroll(1, 7, EnrollmentRole::Student)
            .await
            .expect("enroll succeeds");
        assert_eq!(ctx.courses().get(1).and_then(|c| c.student_count), Some(1));
        assert_eq!(ctx.courses().student_count(1), 1);

        ctx.courses().unenroll(1, 7).await.expect("unenroll succeeds");
        assert_eq!(ctx.courses().get(1).and_then(|c| c.student_count), Some(0));
        assert!(ctx.courses().students(1).is_empty());

        // A repeated unenroll finds nothing to remove
        ctx.courses().unenroll(1, 7).await.expect("unenroll succeeds");
        assert_eq!(ctx.courses().get(1).and_then(|c| c.student_count), Some(0));
    }

    #[tokio::test]
    async fn test_unenroll_without_cached_enrollment_keeps_counts() {
        let (remote, ctx) = session(UserRole::Admin);
        let mut course = fake::course(1);
        course.student_count = Some(5);
        course.teacher_count = Some(2);
        remote.add_course(course, false);
        ctx.courses().fetch_all().await.expect("catalog loads");

        ctx.courses().unenroll(1, 9).await.expect("unenroll succeeds");
        let cached = ctx.courses().get(1).expect("course cached");
        assert_eq!(cached.student_count, Some(5));
        assert_eq!(cached.teacher_count, Some(2));
    }

    #[tokio::test]
    async fn test_unenrolling_teacher_adjusts_teacher_count() {
        let (remote, ctx) = session(UserRole::Admin);
        remote.add_course(fake::course(1), false);
        ctx.courses().fetch_all().await.expect("catalog loads");
        ctx.courses().fetch_enrollments(1).await.expect("enrollments load");
        ctx.courses()
            .enroll(1, 7, EnrollmentRole::Teacher)
            .await
            .expect("enroll succeeds");
        assert_eq!(ctx.courses().get(1).and_then(|c| c.teacher_count), Some(1));

        ctx.courses().unenroll(1, 7).await.expect("unenroll succeeds");
        let cached = ctx.courses().get(1).expect("course cached");
        assert_eq!(cached.teacher_count, Some(0));
        assert_eq!(cached.student_count, Some(0));
    }

    #[tokio::test]
    async fn test_unenrolling_self_leaves_enrolled_view() {
        let (remote, ctx) = session(UserRole::Student);
        remote.add_course(fake::course(1), true);
        ctx.courses().fetch_enrolled().await.expect("enrollments load");

        ctx.courses().unenroll(1, 1).await.expect("unenroll succeeds");
        assert_eq!(ctx.courses().enrolled_count(), 0);
    }

    #[tokio::test]
    async fn test_failed_fetch_sets_error_flag() {
        let (remote, ctx) = session(UserRole::Student);
        remote.fail("get_course");

        let err = ctx.courses().fetch(5).await.expect_err("fetch fails");
        assert_eq!(err.status(), Some(500));
        let message = ctx.last_error().expect("error recorded");
        assert!(message.starts_with("Failed to fetch course with ID 5: "));

        remote.heal("get_course");
        remote.add_course(fake::course(5), false);
        ctx.courses().fetch(5).await.expect("fetch succeeds");
        assert!(ctx.last_error().is_none());
    }

    #[tokio::test]
    async fn test_delete_course_cascades() {
        let (remote, ctx) = session(UserRole::Admin);
        remote.add_course(fake::course(1), true);
        remote.add_module(fake::module(10, 1, 1));
        ctx.courses().fetch_all().await.expect("catalog loads");
        ctx.modules().fetch_for_course(1).await.expect("modules load");
        ctx.join_background().await;

        ctx.courses().delete(1).await.expect("delete succeeds");
        assert!(ctx.courses().get(1).is_none());
        assert!(ctx.modules().get(10).is_none());
        assert!(ctx.read(|c| c.indices_consistent()));
    }
}
