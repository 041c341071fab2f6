//! In-memory `RemoteApi` used by the cache tests.
//!
//! Behaves like a tiny server for one logged-in user: it keeps its own
//! records, logs every call as `op:id`, and fails any call whose `op` or
//! `op:id` was registered with [`FakeRemote::fail`].

use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;

use super::{ApiError, RemoteApi};
use crate::models::{
    Assignment, AssignmentDraft, AssignmentUpdate, ContentDraft, ContentItem, ContentProgress,
    ContentProgressUpdate, ContentUpdate, Course, CourseDraft, CourseEnrollment, CourseProgress,
    CourseUpdate, EnrollmentRole, Module, ModuleDraft, ModuleProgress, ModuleUpdate, Submission,
    SubmissionDraft, UserProgress,
};

pub(crate) fn course(id: i64) -> Course {
    serde_json::from_value(json!({
        "id": id, "code": format!("C{}", id), "name": format!("Course {}", id),
        "studentCount": 0, "teacherCount": 0
    }))
    .expect("valid course json")
}

pub(crate) fn module(id: i64, course_id: i64, order: u32) -> Module {
    serde_json::from_value(json!({
        "id": id, "courseId": course_id, "title": format!("Module {}", id), "order": order
    }))
    .expect("valid module json")
}

pub(crate) fn content(id: i64, module_id: i64, duration: Option<u32>) -> ContentItem {
    serde_json::from_value(json!({
        "id": id, "moduleId": module_id, "title": format!("Item {}", id), "duration": duration
    }))
    .expect("valid content json")
}

pub(crate) fn assignment(id: i64, course_id: i64) -> Assignment {
    serde_json::from_value(json!({
        "id": id, "courseId": course_id, "title": format!("Assignment {}", id),
        "dueDate": "2030-01-01T00:00:00Z"
    }))
    .expect("valid assignment json")
}

#[derive(Default)]
pub(crate) struct FakeState {
    pub user_id: i64,
    pub courses: BTreeMap<i64, Course>,
    pub enrolled: Vec<i64>,
    pub enrollments: BTreeMap<i64, Vec<CourseEnrollment>>,
    pub modules: BTreeMap<i64, Module>,
    pub content: BTreeMap<i64, ContentItem>,
    pub module_progress: BTreeMap<i64, ModuleProgress>,
    pub content_progress: BTreeMap<i64, ContentProgress>,
    pub assignments: BTreeMap<i64, Assignment>,
    pub submissions: BTreeMap<i64, Submission>,
    next_id: i64,
    failures: HashSet<String>,
    calls: Vec<String>,
}

impl FakeState {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        1000 + self.next_id
    }

    fn course_progress(&self, course_id: i64) -> CourseProgress {
        let module_ids: Vec<i64> = self
            .modules
            .values()
            .filter(|m| m.course_id == course_id)
            .map(|m| m.id)
            .collect();
        let modules: Vec<ModuleProgress> = module_ids
            .iter()
            .filter_map(|id| self.module_progress_with_content(*id))
            .collect();
        let total = module_ids.len() as u32;
        let completed = modules.iter().filter(|p| p.completed).count() as u32;
        CourseProgress {
            course_id,
            total_modules: total,
            completed_modules: completed,
            percentage: if total == 0 { 0.0 } else { 100.0 * completed as f64 / total as f64 },
            modules,
        }
    }

    fn module_progress_with_content(&self, module_id: i64) -> Option<ModuleProgress> {
        let mut progress = self.module_progress.get(&module_id)?.clone();
        let nested: Vec<ContentProgress> = self
            .content
            .values()
            .filter(|c| c.module_id == module_id)
            .filter_map(|c| self.content_progress.get(&c.id).cloned())
            .collect();
        progress.content_progress = Some(nested);
        Some(progress)
    }

    fn set_module_completed(&mut self, module_id: i64, completed: bool) -> Result<ModuleProgress, ApiError> {
        let course_id = self.modules.get(&module_id).ok_or_else(not_found)?.course_id;
        let user_id = self.user_id;
        let progress = self
            .module_progress
            .entry(module_id)
            .or_insert_with(|| ModuleProgress {
                id: module_id,
                user_id,
                module_id,
                course_id: Some(course_id),
                completed: false,
                completed_at: None,
                content_progress: None,
            });
        progress.completed = completed;
        progress.completed_at = completed.then(|| "2024-01-01T00:00:00Z".to_string());
        Ok(progress.clone())
    }
}

fn not_found() -> ApiError {
    ApiError::Status {
        status: 404,
        message: "Not found".to_string(),
    }
}

pub(crate) struct FakeRemote {
    state: Mutex<FakeState>,
}

impl FakeRemote {
    pub fn new(user_id: i64) -> Self {
        Self {
            state: Mutex::new(FakeState {
                user_id,
                ..FakeState::default()
            }),
        }
    }

    /// Seed or inspect server-side records.
    pub fn with<R>(&self, f: impl FnOnce(&mut FakeState) -> R) -> R {
        f(&mut self.state.lock())
    }

    pub fn add_course(&self, course: Course, enrolled: bool) {
        let mut state = self.state.lock();
        if enrolled {
            state.enrolled.push(course.id);
        }
        state.courses.insert(course.id, course);
    }

    pub fn add_module(&self, module: Module) {
        self.state.lock().modules.insert(module.id, module);
    }

    pub fn add_content(&self, item: ContentItem) {
        self.state.lock().content.insert(item.id, item);
    }

    pub fn add_assignment(&self, assignment: Assignment) {
        self.state.lock().assignments.insert(assignment.id, assignment);
    }

    /// Fail every call matching `op` or `op:id`.
    pub fn fail(&self, key: &str) {
        self.state.lock().failures.insert(key.to_string());
    }

    pub fn heal(&self, key: &str) {
        self.state.lock().failures.remove(key);
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().calls.clone()
    }

    pub fn call_count(&self, op: &str) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|c| c.as_str() == op || c.split(':').next() == Some(op))
            .count()
    }

    fn enter(&self, op: &str, id: Option<i64>) -> Result<parking_lot::MutexGuard<'_, FakeState>, ApiError> {
        let mut state = self.state.lock();
        let key = match id {
            Some(id) => format!("{}:{}", op, id),
            None => op.to_string(),
        };
        state.calls.push(key.clone());
        if state.failures.contains(op) || state.failures.contains(&key) {
            return Err(ApiError::Status {
                status: 500,
                message: format!("injected failure: {}", key),
            });
        }
        Ok(state)
    }
}

#[async_trait]
impl RemoteApi for FakeRemote {
    // ===== Courses =====

    async fn list_courses(&self) -> Result<Vec<Course>, ApiError> {
        let state = self.enter("list_courses", None)?;
        Ok(state.courses.values().cloned().collect())
    }

    async fn list_enrolled_courses(&self) -> Result<Vec<Course>, ApiError> {
        let state = self.enter("list_enrolled_courses", None)?;
        Ok(state
            .enrolled
            .iter()
            .filter_map(|id| state.courses.get(id).cloned())
            .collect())
    }

    async fn get_course(&self, id: i64) -> Result<Course, ApiError> {
        let state = self.enter("get_course", Some(id))?;
        state.courses.get(&id).cloned().ok_or_else(not_found)
    }

    async fn create_course(&self, draft: &CourseDraft) -> Result<Course, ApiError> {
        let mut state = self.enter("create_course", None)?;
        let mut created = course(state.next_id());
        created.code = draft.code.clone();
        created.name = draft.name.clone();
        created.description = draft.description.clone();
        created.schedule = draft.schedule.clone();
        state.courses.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update_course(&self, id: i64, update: &CourseUpdate) -> Result<Course, ApiError> {
        let mut state = self.enter("update_course", Some(id))?;
        let c = state.courses.get_mut(&id).ok_or_else(not_found)?;
        if let Some(name) = &update.name {
            c.name = name.clone();
        }
        if let Some(code) = &update.code {
            c.code = code.clone();
        }
        if let Some(description) = &update.description {
            c.description = description.clone();
        }
        if let Some(schedule) = &update.schedule {
            c.schedule = schedule.clone();
        }
        Ok(c.clone())
    }

    async fn delete_course(&self, id: i64) -> Result<(), ApiError> {
        let mut state = self.enter("delete_course", Some(id))?;
        state.courses.remove(&id).ok_or_else(not_found)?;
        state.enrolled.retain(|&c| c != id);
        Ok(())
    }

    async fn list_enrollments(&self, course_id: i64) -> Result<Vec<CourseEnrollment>, ApiError> {
        let state = self.enter("list_enrollments", Some(course_id))?;
        Ok(state.enrollments.get(&course_id).cloned().unwrap_or_default())
    }

    async fn enroll_user(
        &self,
        course_id: i64,
        user_id: i64,
        role: EnrollmentRole,
    ) -> Result<CourseEnrollment, ApiError> {
        let mut state = self.enter("enroll_user", Some(course_id))?;
        let id = state.next_id();
        let enrollment = CourseEnrollment {
            id,
            course_id,
            user_id,
            role,
            enrollment_date: None,
            user_name: None,
            user_email: None,
        };
        state.enrollments.entry(course_id).or_default().push(enrollment.clone());
        if user_id == state.user_id {
            state.enrolled.push(course_id);
        }
        Ok(enrollment)
    }

    async fn unenroll_user(&self, course_id: i64, user_id: i64) -> Result<(), ApiError> {
        let mut state = self.enter("unenroll_user", Some(course_id))?;
        if let Some(list) = state.enrollments.get_mut(&course_id) {
            list.retain(|e| e.user_id != user_id);
        }
        if user_id == state.user_id {
            state.enrolled.retain(|&c| c != course_id);
        }
        Ok(())
    }

    // ===== Modules =====

    async fn list_modules(&self, course_id: i64) -> Result<Vec<Module>, ApiError> {
        let state = self.enter("list_modules", Some(course_id))?;
        let mut modules: Vec<Module> = state
            .modules
            .values()
            .filter(|m| m.course_id == course_id)
            .cloned()
            .collect();
        modules.sort_by_key(|m| m.order);
        Ok(modules)
    }

    async fn get_module(&self, id: i64) -> Result<Module, ApiError> {
        let state = self.enter("get_module", Some(id))?;
        state.modules.get(&id).cloned().ok_or_else(not_found)
    }

    async fn create_module(&self, course_id: i64, draft: &ModuleDraft) -> Result<Module, ApiError> {
        let mut state = self.enter("create_module", Some(course_id))?;
        let mut created = module(state.next_id(), course_id, draft.order);
        created.title = draft.title.clone();
        created.description = draft.description.clone();
        state.modules.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update_module(&self, id: i64, update: &ModuleUpdate) -> Result<Module, ApiError> {
        let mut state = self.enter("update_module", Some(id))?;
        let m = state.modules.get_mut(&id).ok_or_else(not_found)?;
        if let Some(title) = &update.title {
            m.title = title.clone();
        }
        if let Some(description) = &update.description {
            m.description = Some(description.clone());
        }
        if let Some(order) = update.order {
            m.order = order;
        }
        Ok(m.clone())
    }

    async fn delete_module(&self, id: i64) -> Result<(), ApiError> {
        let mut state = self.enter("delete_module", Some(id))?;
        state.modules.remove(&id).ok_or_else(not_found)?;
        state.content.retain(|_, c| c.module_id != id);
        Ok(())
    }

    async fn reorder_modules(&self, course_id: i64, module_ids: &[i64]) -> Result<Vec<Module>, ApiError> {
        let mut state = self.enter("reorder_modules", Some(course_id))?;
        for (position, id) in module_ids.iter().enumerate() {
            if let Some(m) = state.modules.get_mut(id) {
                m.order = position as u32 + 1;
            }
        }
        let mut modules: Vec<Module> = state
            .modules
            .values()
            .filter(|m| m.course_id == course_id)
            .cloned()
            .collect();
        modules.sort_by_key(|m| m.order);
        Ok(modules)
    }

    // ===== Content =====

    async fn list_content(&self, module_id: i64) -> Result<Vec<ContentItem>, ApiError> {
        let state = self.enter("list_content", Some(module_id))?;
        Ok(state
            .content
            .values()
            .filter(|c| c.module_id == module_id)
            .cloned()
            .collect())
    }

    async fn get_content(&self, id: i64) -> Result<ContentItem, ApiError> {
        let state = self.enter("get_content", Some(id))?;
        state.content.get(&id).cloned().ok_or_else(not_found)
    }

    async fn create_content(&self, module_id: i64, draft: &ContentDraft) -> Result<ContentItem, ApiError> {
        let mut state = self.enter("create_content", Some(module_id))?;
        let mut created = content(state.next_id(), module_id, draft.duration);
        created.title = draft.title.clone();
        created.content_type = draft.content_type;
        state.content.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update_content(&self, id: i64, update: &ContentUpdate) -> Result<ContentItem, ApiError> {
        let mut state = self.enter("update_content", Some(id))?;
        let c = state.content.get_mut(&id).ok_or_else(not_found)?;
        if let Some(title) = &update.title {
            c.title = title.clone();
        }
        if update.duration.is_some() {
            c.duration = update.duration;
        }
        Ok(c.clone())
    }

    async fn delete_content(&self, id: i64) -> Result<(), ApiError> {
        let mut state = self.enter("delete_content", Some(id))?;
        state.content.remove(&id).ok_or_else(not_found)?;
        Ok(())
    }

    // ===== Progress =====

    async fn get_user_progress(&self, user_id: i64) -> Result<UserProgress, ApiError> {
        let state = self.enter("get_user_progress", Some(user_id))?;
        let course_ids: Vec<i64> = state.enrolled.clone();
        Ok(UserProgress {
            module_progress: state.module_progress.values().cloned().collect(),
            course_progress: course_ids.iter().map(|&id| state.course_progress(id)).collect(),
            content_progress: state.content_progress.values().cloned().collect(),
            recent_activity: None,
        })
    }

    async fn get_course_progress(&self, course_id: i64, user_id: i64) -> Result<CourseProgress, ApiError> {
        let _ = user_id;
        let state = self.enter("get_course_progress", Some(course_id))?;
        Ok(state.course_progress(course_id))
    }

    async fn get_module_progress(&self, module_id: i64, user_id: i64) -> Result<ModuleProgress, ApiError> {
        let _ = user_id;
        let state = self.enter("get_module_progress", Some(module_id))?;
        state.module_progress_with_content(module_id).ok_or_else(not_found)
    }

    async fn mark_module_completed(&self, module_id: i64) -> Result<ModuleProgress, ApiError> {
        let mut state = self.enter("mark_module_completed", Some(module_id))?;
        state.set_module_completed(module_id, true)
    }

    async fn mark_module_incomplete(&self, module_id: i64) -> Result<ModuleProgress, ApiError> {
        let mut state = self.enter("mark_module_incomplete", Some(module_id))?;
        state.set_module_completed(module_id, false)
    }

    async fn record_content_progress(
        &self,
        content_id: i64,
        update: ContentProgressUpdate,
    ) -> Result<ContentProgress, ApiError> {
        // Suspend once so concurrent callers interleave
        tokio::task::yield_now().await;
        let mut state = self.enter("record_content_progress", Some(content_id))?;
        if !state.content.contains_key(&content_id) {
            return Err(not_found());
        }
        let user_id = state.user_id;
        let progress = state
            .content_progress
            .entry(content_id)
            .or_insert_with(|| ContentProgress {
                id: content_id,
                user_id,
                content_id,
                viewed: false,
                completed: false,
                completed_at: None,
                last_accessed_at: None,
                time_spent: None,
            });
        progress.viewed = true;
        if update.completed {
            progress.completed = true;
            progress.completed_at = Some("2024-01-01T00:00:00Z".to_string());
        }
        if update.time_spent.is_some() {
            progress.time_spent = update.time_spent;
        }
        Ok(progress.clone())
    }

    async fn record_course_started(&self, course_id: i64) -> Result<(), ApiError> {
        let state = self.enter("record_course_started", Some(course_id))?;
        if state.courses.contains_key(&course_id) {
            Ok(())
        } else {
            Err(not_found())
        }
    }

    async fn record_assignment_submission(&self, assignment_id: i64) -> Result<(), ApiError> {
        self.enter("record_assignment_submission", Some(assignment_id))?;
        Ok(())
    }

    async fn reset_course_progress(&self, course_id: i64, user_id: i64) -> Result<(), ApiError> {
        let _ = user_id;
        let mut state = self.enter("reset_course_progress", Some(course_id))?;
        let module_ids: Vec<i64> = state
            .modules
            .values()
            .filter(|m| m.course_id == course_id)
            .map(|m| m.id)
            .collect();
        for id in &module_ids {
            state.module_progress.remove(id);
        }
        let content_ids: Vec<i64> = state
            .content
            .values()
            .filter(|c| module_ids.contains(&c.module_id))
            .map(|c| c.id)
            .collect();
        for id in content_ids {
            state.content_progress.remove(&id);
        }
        Ok(())
    }

    // ===== Assignments =====

    async fn list_assignments(&self, course_id: i64) -> Result<Vec<Assignment>, ApiError> {
        let state = self.enter("list_assignments", Some(course_id))?;
        Ok(state
            .assignments
            .values()
            .filter(|a| a.course_id == course_id)
            .cloned()
            .collect())
    }

    async fn get_assignment(&self, id: i64) -> Result<Assignment, ApiError> {
        let state = self.enter("get_assignment", Some(id))?;
        state.assignments.get(&id).cloned().ok_or_else(not_found)
    }

    async fn create_assignment(&self, draft: &AssignmentDraft) -> Result<Assignment, ApiError> {
        let mut state = self.enter("create_assignment", Some(draft.course_id))?;
        let mut created = assignment(state.next_id(), draft.course_id);
        created.title = draft.title.clone();
        created.description = draft.description.clone();
        created.due_date = draft.due_date.clone();
        state.assignments.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update_assignment(&self, id: i64, update: &AssignmentUpdate) -> Result<Assignment, ApiError> {
        let mut state = self.enter("update_assignment", Some(id))?;
        let a = state.assignments.get_mut(&id).ok_or_else(not_found)?;
        if let Some(title) = &update.title {
            a.title = title.clone();
        }
        if let Some(due_date) = &update.due_date {
            a.due_date = due_date.clone();
        }
        Ok(a.clone())
    }

    async fn delete_assignment(&self, id: i64) -> Result<(), ApiError> {
        let mut state = self.enter("delete_assignment", Some(id))?;
        state.assignments.remove(&id).ok_or_else(not_found)?;
        state.submissions.retain(|_, s| s.assignment_id != id);
        Ok(())
    }

    async fn list_submissions(&self, assignment_id: i64) -> Result<Vec<Submission>, ApiError> {
        let state = self.enter("list_submissions", Some(assignment_id))?;
        Ok(state
            .submissions
            .values()
            .filter(|s| s.assignment_id == assignment_id)
            .cloned()
            .collect())
    }

    async fn get_user_submission(&self, assignment_id: i64, user_id: i64) -> Result<Submission, ApiError> {
        let state = self.enter("get_user_submission", Some(assignment_id))?;
        state
            .submissions
            .values()
            .find(|s| s.assignment_id == assignment_id && s.user_id == user_id)
            .cloned()
            .ok_or_else(not_found)
    }

    async fn submit_assignment(&self, draft: &SubmissionDraft) -> Result<Submission, ApiError> {
        let mut state = self.enter("submit_assignment", Some(draft.assignment_id))?;
        let user_id = state.user_id;
        state
            .submissions
            .retain(|_, s| !(s.assignment_id == draft.assignment_id && s.user_id == user_id));
        let submission = Submission {
            id: state.next_id(),
            assignment_id: draft.assignment_id,
            user_id,
            submission_url: draft.submission_url.clone(),
            submitted_at: Some("2024-01-01T00:00:00Z".to_string()),
            grade: None,
            graded_by: None,
            graded_at: None,
            feedback: None,
            student_name: None,
        };
        state.submissions.insert(submission.id, submission.clone());
        Ok(submission)
    }

    async fn grade_submission(&self, submission_id: i64, grade: f64) -> Result<Submission, ApiError> {
        let mut state = self.enter("grade_submission", Some(submission_id))?;
        let s = state.submissions.get_mut(&submission_id).ok_or_else(not_found)?;
        s.grade = Some(grade);
        Ok(s.clone())
    }
}
