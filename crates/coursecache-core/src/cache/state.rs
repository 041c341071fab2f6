//! The denormalized cache: entity tables, their indices, progress and the
//! activity log, plus every local consistency rule that ties them together.
//!
//! Nothing here performs I/O. The orchestrators in `sync` call the remote
//! API and then feed results through these methods, which keep indices,
//! derived aggregates and cross-entity views consistent.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tracing::debug;

use super::activity::ActivityLog;
use super::aggregate;
use super::table::{Entity, EntityTable, MergeOutcome, MergeStrategy, SecondaryIndex};
use crate::error::{CacheError, Result};
use crate::models::{
    ActivityAction, ActivityKind, Assignment, CompletionStatus, ContentItem, ContentProgress,
    Course, CourseEnrollment, CourseProgress, EnrollmentRole, Module, ModuleProgress, ProgressStage,
    Submission, UserProgress,
};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CacheState {
    courses: EntityTable<Course>,
    all_courses: Vec<i64>,
    enrolled_courses: Vec<i64>,
    enrollments: BTreeMap<i64, Vec<CourseEnrollment>>,

    modules: EntityTable<Module>,
    modules_by_course: SecondaryIndex,
    content: EntityTable<ContentItem>,
    content_by_module: SecondaryIndex,

    assignments: EntityTable<Assignment>,
    assignments_by_course: SecondaryIndex,
    submissions: EntityTable<Submission>,
    submissions_by_assignment: SecondaryIndex,
    /// `Some(None)` records a confirmed absence.
    user_submissions: BTreeMap<i64, Option<Submission>>,

    module_progress: BTreeMap<i64, ModuleProgress>,
    content_progress: BTreeMap<i64, ContentProgress>,
    course_progress: BTreeMap<i64, CourseProgress>,

    activity: ActivityLog,
    last_error: Option<String>,
}

fn push_unique(list: &mut Vec<i64>, id: i64) -> bool {
    if list.contains(&id) {
        false
    } else {
        list.push(id);
        true
    }
}

impl CacheState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_activity_capacity(capacity: usize) -> Self {
        Self {
            activity: ActivityLog::with_capacity(capacity),
            ..Self::default()
        }
    }

    // ===== Error flag =====

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn set_error(&mut self, message: impl Into<String>) {
        self.last_error = Some(message.into());
    }

    pub fn clear_error(&mut self) {
        self.last_error = None;
    }

    // ===== Courses =====

    pub fn course(&self, id: i64) -> Option<&Course> {
        self.courses.get(id)
    }

    fn resolve_courses<'a>(&'a self, ids: &'a [i64]) -> Vec<&'a Course> {
        ids.iter().filter_map(|&id| self.courses.get(id)).collect()
    }

    /// Every course visible to the user (the admin catalog).
    pub fn all_courses(&self) -> Vec<&Course> {
        self.resolve_courses(&self.all_courses)
    }

    pub fn enrolled_courses(&self) -> Vec<&Course> {
        self.resolve_courses(&self.enrolled_courses)
    }

    pub fn is_in_all_courses(&self, id: i64) -> bool {
        self.all_courses.contains(&id)
    }

    pub fn is_enrolled_in(&self, id: i64) -> bool {
        self.enrolled_courses.contains(&id)
    }

    /// Admins browse the full catalog; everyone else their enrollments.
    pub fn courses_for_role(&self, is_admin: bool) -> Vec<&Course> {
        if is_admin {
            self.all_courses()
        } else {
            self.enrolled_courses()
        }
    }

    pub fn enrolled_course_count(&self) -> usize {
        self.enrolled_courses.len()
    }

    /// Enrolled courses where the user teaches.
    pub fn taught_courses(&self) -> Vec<&Course> {
        self.enrolled_courses()
            .into_iter()
            .filter(|c| c.role == Some(EnrollmentRole::Teacher))
            .collect()
    }

    pub fn search_courses(&self, term: &str, is_admin: bool) -> Vec<&Course> {
        self.courses_for_role(is_admin)
            .into_iter()
            .filter(|c| c.matches(term))
            .collect()
    }

    /// Replace merge of one course. The module count is re-derived when the
    /// course's modules are loaded.
    pub fn merge_course(&mut self, course: Course) -> MergeOutcome {
        let id = course.id;
        let outcome = self.courses.merge(course, MergeStrategy::Replace);
        self.refresh_module_count(id);
        outcome
    }

    /// Authoritative catalog listing: the "all" view is exactly this list.
    pub fn replace_all_courses(&mut self, courses: Vec<Course>) {
        self.all_courses.clear();
        for course in courses {
            push_unique(&mut self.all_courses, course.id);
            self.merge_course(course);
        }
        self.forget_unlisted_courses();
    }

    /// Authoritative enrollment listing: the "enrolled" view is exactly this list.
    pub fn replace_enrolled_courses(&mut self, courses: Vec<Course>) {
        self.enrolled_courses.clear();
        for course in courses {
            push_unique(&mut self.enrolled_courses, course.id);
            self.merge_course(course);
        }
        self.forget_unlisted_courses();
    }

    // Drop course records that fell out of both views.
    fn forget_unlisted_courses(&mut self) {
        let orphaned: Vec<i64> = self
            .courses
            .values()
            .map(|c| c.id)
            .filter(|id| !self.all_courses.contains(id) && !self.enrolled_courses.contains(id))
            .collect();
        for id in orphaned {
            self.courses.remove(id);
        }
    }

    /// Merge a freshly fetched or updated course into every view it belongs
    /// to. Views share the canonical record, so membership is all that needs
    /// maintaining; elevated users see new courses in the catalog.
    pub fn reconcile_course(&mut self, course: Course, elevated: bool) -> MergeOutcome {
        let id = course.id;
        let outcome = self.merge_course(course);
        if elevated {
            push_unique(&mut self.all_courses, id);
        }
        outcome
    }

    pub fn add_to_all_courses(&mut self, course: Course) {
        let id = course.id;
        self.merge_course(course);
        push_unique(&mut self.all_courses, id);
    }

    pub fn add_to_enrolled_courses(&mut self, course_id: i64) -> bool {
        self.courses.contains(course_id) && push_unique(&mut self.enrolled_courses, course_id)
    }

    pub fn leave_enrolled_view(&mut self, course_id: i64) {
        self.enrolled_courses.retain(|&id| id != course_id);
        if !self.all_courses.contains(&course_id) {
            self.courses.remove(course_id);
        }
    }

    /// Remove a course and everything hanging off it.
    pub fn remove_course(&mut self, id: i64) -> Option<Course> {
        let removed = self.courses.remove(id);
        self.all_courses.retain(|&c| c != id);
        self.enrolled_courses.retain(|&c| c != id);
        self.enrollments.remove(&id);

        if let Some(module_ids) = self.modules_by_course.take_bucket(id) {
            for module_id in module_ids {
                self.remove_module_record(module_id);
            }
        }
        if let Some(assignment_ids) = self.assignments_by_course.take_bucket(id) {
            for assignment_id in assignment_ids {
                self.remove_assignment_record(assignment_id);
            }
        }
        self.course_progress.remove(&id);
        removed
    }

    // ===== Enrollments =====

    pub fn enrollments(&self, course_id: i64) -> &[CourseEnrollment] {
        self.enrollments.get(&course_id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn enrollments_loaded(&self, course_id: i64) -> bool {
        self.enrollments.contains_key(&course_id)
    }

    pub fn replace_enrollments(&mut self, course_id: i64, enrollments: Vec<CourseEnrollment>) {
        self.enrollments.insert(course_id, enrollments);
    }

    pub fn teachers(&self, course_id: i64) -> Vec<&CourseEnrollment> {
        self.enrollments_with_role(course_id, EnrollmentRole::Teacher)
    }

    pub fn students(&self, course_id: i64) -> Vec<&CourseEnrollment> {
        self.enrollments_with_role(course_id, EnrollmentRole::Student)
    }

    pub fn student_count(&self, course_id: i64) -> usize {
        self.students(course_id).len()
    }

    fn enrollments_with_role(&self, course_id: i64, role: EnrollmentRole) -> Vec<&CourseEnrollment> {
        self.enrollments(course_id)
            .iter()
            .filter(|e| e.role == role)
            .collect()
    }

    /// Upsert an enrollment into a loaded enrollment list.
    pub fn upsert_enrollment(&mut self, enrollment: CourseEnrollment) {
        if let Some(list) = self.enrollments.get_mut(&enrollment.course_id) {
            match list.iter_mut().find(|e| e.user_id == enrollment.user_id) {
                Some(existing) => *existing = enrollment,
                None => list.push(enrollment),
            }
        }
    }

    pub fn remove_enrollment(&mut self, course_id: i64, user_id: i64) -> Option<CourseEnrollment> {
        let list = self.enrollments.get_mut(&course_id)?;
        let pos = list.iter().position(|e| e.user_id == user_id)?;
        Some(list.remove(pos))
    }

    /// Optimistically adjust the course's count for `role`.
    pub fn adjust_enrollment_count(&mut self, course_id: i64, role: EnrollmentRole, delta: i32) -> Result<()> {
        let course = self
            .courses
            .get_mut(course_id)
            .ok_or_else(|| CacheError::stale(Course::KIND, course_id))?;
        course.adjust_count(role, delta);
        Ok(())
    }

    // ===== Modules =====

    pub fn module(&self, id: i64) -> Option<&Module> {
        self.modules.get(id)
    }

    pub fn modules_loaded(&self, course_id: i64) -> bool {
        self.modules_by_course.contains_bucket(course_id)
    }

    /// Modules of a course sorted by `order`; empty if never loaded.
    pub fn modules_for_course(&self, course_id: i64) -> Vec<&Module> {
        let mut modules: Vec<&Module> = self
            .modules_by_course
            .children(course_id)
            .iter()
            .filter_map(|&id| self.modules.get(id))
            .collect();
        modules.sort_by_key(|m| m.order);
        modules
    }

    pub fn module_ids_for_course(&self, course_id: i64) -> &[i64] {
        self.modules_by_course.children(course_id)
    }

    fn refresh_module_count(&mut self, course_id: i64) {
        if let Some(ids) = self.modules_by_course.bucket(course_id) {
            let count = ids.len() as u32;
            if let Some(course) = self.courses.get_mut(course_id) {
                course.module_count = Some(count);
            }
        }
    }

    /// Merge a module. Once its content is loaded the aggregates derived
    /// from that content are kept; before that the remote values stand.
    pub fn merge_module(&mut self, module: Module) -> MergeOutcome {
        let id = module.id;
        let course_id = module.course_id;
        let previous_course = self.modules.get(id).map(|m| m.course_id);

        let strategy = if self.content_loaded(id) {
            MergeStrategy::PreserveDerived
        } else {
            MergeStrategy::Replace
        };
        let outcome = self.modules.merge(module, strategy);

        if let Some(previous) = previous_course.filter(|&p| p != course_id) {
            self.modules_by_course.remove(previous, id);
            self.refresh_module_count(previous);
        }
        self.modules_by_course.insert(course_id, id);
        self.recompute_module_aggregates(id);
        self.refresh_module_count(course_id);
        outcome
    }

    /// Authoritative module listing for a course: merges every module, sets
    /// the bucket to exactly this order and prunes modules no longer listed.
    pub fn replace_modules(&mut self, course_id: i64, modules: Vec<Module>) {
        let mut order = Vec::with_capacity(modules.len());
        for module in modules {
            if module.course_id == course_id {
                order.push(module.id);
            }
            self.merge_module(module);
        }

        let previous = self.modules_by_course.replace_bucket(course_id, order.clone());
        for stale in previous.into_iter().filter(|id| !order.contains(id)) {
            debug!(module_id = stale, course_id, "Pruning module missing from listing");
            self.remove_module_record(stale);
        }
        self.refresh_module_count(course_id);
    }

    /// Remove a module with its content, content progress and module progress.
    pub fn remove_module(&mut self, id: i64) -> Option<Module> {
        let course_id = self.modules.get(id).map(|m| m.course_id);
        let removed = self.remove_module_record(id);
        if let Some(course_id) = course_id {
            self.modules_by_course.remove(course_id, id);
            self.refresh_module_count(course_id);
        }
        removed
    }

    // Cascade below the module; the caller handles the course bucket.
    fn remove_module_record(&mut self, id: i64) -> Option<Module> {
        if let Some(content_ids) = self.content_by_module.take_bucket(id) {
            for content_id in content_ids {
                self.content.remove(content_id);
                self.content_progress.remove(&content_id);
            }
        }
        self.module_progress.remove(&id);
        self.modules.remove(id)
    }

    // ===== Content =====

    pub fn content(&self, id: i64) -> Option<&ContentItem> {
        self.content.get(id)
    }

    pub fn content_loaded(&self, module_id: i64) -> bool {
        self.content_by_module.contains_bucket(module_id)
    }

    pub fn content_for_module(&self, module_id: i64) -> Vec<&ContentItem> {
        self.content_by_module
            .children(module_id)
            .iter()
            .filter_map(|&id| self.content.get(id))
            .collect()
    }

    pub fn all_content(&self) -> Vec<&ContentItem> {
        self.content.values().collect()
    }

    pub fn content_ids_for_module(&self, module_id: i64) -> &[i64] {
        self.content_by_module.children(module_id)
    }

    /// Recompute a module's content aggregates from its current bucket.
    /// No-op when the module or its content is not loaded.
    pub fn recompute_module_aggregates(&mut self, module_id: i64) {
        let Some(ids) = self.content_by_module.bucket(module_id) else {
            return;
        };
        let items: Vec<ContentItem> = ids.iter().filter_map(|&id| self.content.get(id).cloned()).collect();
        let Some(module) = self.modules.get_mut(module_id) else {
            return;
        };
        let agg = aggregate::module_aggregates(items.iter());
        module.content_count = Some(agg.content_count);
        module.duration = Some(agg.duration);
        module.content_items = Some(items);
    }

    /// Replace merge of a content item, lazily creating its module bucket.
    pub fn merge_content(&mut self, item: ContentItem) -> MergeOutcome {
        let id = item.id;
        let module_id = item.module_id;
        let previous_module = self.content.get(id).map(|c| c.module_id);

        let outcome = self.content.merge(item, MergeStrategy::Replace);

        if let Some(previous) = previous_module.filter(|&p| p != module_id) {
            self.content_by_module.remove(previous, id);
            self.recompute_module_aggregates(previous);
        }
        self.content_by_module.insert(module_id, id);
        self.recompute_module_aggregates(module_id);
        outcome
    }

    /// Merge a single fetched item only if its module's content is loaded.
    pub fn merge_content_if_indexed(&mut self, item: ContentItem) -> Option<MergeOutcome> {
        if self.content.contains(item.id) || self.content_loaded(item.module_id) {
            Some(self.merge_content(item))
        } else {
            None
        }
    }

    /// Authoritative content listing for a module.
    pub fn replace_content(&mut self, module_id: i64, items: Vec<ContentItem>) {
        let mut order = Vec::with_capacity(items.len());
        for item in items {
            if item.module_id == module_id {
                order.push(item.id);
            }
            self.merge_content(item);
        }

        let previous = self.content_by_module.replace_bucket(module_id, order.clone());
        for stale in previous.into_iter().filter(|id| !order.contains(id)) {
            debug!(content_id = stale, module_id, "Pruning content missing from listing");
            self.content.remove(stale);
            self.content_progress.remove(&stale);
        }
        self.recompute_module_aggregates(module_id);
    }

    pub fn remove_content(&mut self, id: i64) -> Option<ContentItem> {
        let removed = self.content.remove(id)?;
        self.content_by_module.remove(removed.module_id, id);
        self.content_progress.remove(&id);
        self.recompute_module_aggregates(removed.module_id);
        Some(removed)
    }

    // ===== Progress =====

    pub fn module_progress(&self, module_id: i64) -> Option<&ModuleProgress> {
        self.module_progress.get(&module_id)
    }

    pub fn is_module_completed(&self, module_id: i64) -> bool {
        self.module_progress.get(&module_id).is_some_and(|p| p.completed)
    }

    pub fn content_progress(&self, content_id: i64) -> Option<&ContentProgress> {
        self.content_progress.get(&content_id)
    }

    pub fn content_stage(&self, content_id: i64) -> ProgressStage {
        self.content_progress
            .get(&content_id)
            .map(ContentProgress::stage)
            .unwrap_or(ProgressStage::Unknown)
    }

    pub fn is_content_completed(&self, content_id: i64) -> bool {
        self.content_stage(content_id) == ProgressStage::Completed
    }

    pub fn is_content_viewed(&self, content_id: i64) -> bool {
        self.content_stage(content_id) >= ProgressStage::Viewed
    }

    pub fn course_progress(&self, course_id: i64) -> Option<&CourseProgress> {
        self.course_progress.get(&course_id)
    }

    pub fn merge_content_progress(&mut self, progress: ContentProgress) {
        self.content_progress.insert(progress.content_id, progress);
    }

    /// Merge module progress (with any nested content progress) and keep a
    /// cached course progress entry in step. Returns the owning course id.
    pub fn merge_module_progress(&mut self, mut progress: ModuleProgress) -> Option<i64> {
        if let Some(nested) = progress.content_progress.take() {
            for cp in nested.iter().cloned() {
                self.merge_content_progress(cp);
            }
            progress.content_progress = Some(nested);
        }

        let course_id = progress
            .course_id
            .or_else(|| self.modules.get(progress.module_id).map(|m| m.course_id));
        self.module_progress.insert(progress.module_id, progress);

        if let Some(course_id) = course_id {
            if self.course_progress.contains_key(&course_id) && self.modules_loaded(course_id) {
                self.recompute_course_progress(course_id);
            }
        }
        course_id
    }

    /// Server-computed course progress, including nested module progress.
    pub fn merge_course_progress(&mut self, progress: CourseProgress) {
        for module in progress.modules.iter().cloned() {
            self.merge_module_progress(module);
        }
        self.course_progress.insert(progress.course_id, progress);
    }

    /// Recompute a course's progress from its loaded modules.
    pub fn recompute_course_progress(&mut self, course_id: i64) -> CourseProgress {
        let progress = aggregate::course_progress(
            course_id,
            self.modules_by_course.children(course_id),
            |id| self.module_progress.get(&id),
        );
        self.course_progress.insert(course_id, progress.clone());
        progress
    }

    /// Replace progress with the server's full view for the user.
    pub fn merge_user_progress(&mut self, progress: UserProgress) {
        for mp in progress.module_progress {
            self.merge_module_progress(mp);
        }
        for cp in progress.content_progress {
            self.merge_content_progress(cp);
        }
        for cp in progress.course_progress {
            self.merge_course_progress(cp);
        }
        if let Some(activity) = progress.recent_activity {
            self.activity.replace(activity);
        }
    }

    /// Drop every progress record tied to a course.
    pub fn reset_course_progress(&mut self, course_id: i64) {
        self.course_progress.remove(&course_id);
        let module_ids: Vec<i64> = self
            .module_progress
            .values()
            .filter(|p| {
                p.course_id == Some(course_id)
                    || self.modules.get(p.module_id).is_some_and(|m| m.course_id == course_id)
            })
            .map(|p| p.module_id)
            .chain(self.modules_by_course.children(course_id).iter().copied())
            .collect();
        for module_id in module_ids {
            self.module_progress.remove(&module_id);
            for &content_id in self.content_by_module.children(module_id) {
                self.content_progress.remove(&content_id);
            }
        }
    }

    /// True when the module's loaded content is non-empty and all completed.
    pub fn all_content_completed(&self, module_id: i64) -> bool {
        aggregate::all_content_completed(self.content_by_module.children(module_id), |id| {
            self.is_content_completed(id)
        })
    }

    pub fn completion_status(&self, course_id: i64) -> CompletionStatus {
        aggregate::completion_status(self.modules_by_course.children(course_id), |id| {
            self.module_progress.get(&id)
        })
    }

    pub fn next_module(&self, course_id: i64) -> Option<&Module> {
        aggregate::next_module(&self.modules_for_course(course_id), |id| self.is_module_completed(id))
    }

    pub fn overall_progress(&self) -> f64 {
        aggregate::overall_progress(self.course_progress.values())
    }

    // ===== Activity =====

    pub fn activity(&self) -> &ActivityLog {
        &self.activity
    }

    /// Log activity for a content item, resolving module and course names.
    pub fn log_content_activity(&mut self, content_id: i64, action: ActivityAction) {
        let Some(item) = self.content.get(content_id) else {
            return;
        };
        let name = item.title.clone();
        let course_id = self.modules.get(item.module_id).map(|m| m.course_id);
        let course_name = course_id.and_then(|id| self.courses.get(id)).map(|c| c.name.clone());
        self.activity
            .record(ActivityKind::Content, action, content_id, name, course_id, course_name);
    }

    pub fn log_module_activity(&mut self, module_id: i64, action: ActivityAction) {
        let Some(module) = self.modules.get(module_id) else {
            return;
        };
        let name = module.title.clone();
        let course_id = module.course_id;
        let course_name = self.courses.get(course_id).map(|c| c.name.clone());
        self.activity
            .record(ActivityKind::Module, action, module_id, name, Some(course_id), course_name);
    }

    pub fn log_course_activity(&mut self, course_id: i64, action: ActivityAction) {
        let name = self
            .courses
            .get(course_id)
            .map(|c| c.name.clone())
            .unwrap_or_else(|| format!("Course {}", course_id));
        self.activity
            .record(ActivityKind::Course, action, course_id, name.clone(), Some(course_id), Some(name));
    }

    pub fn log_assignment_activity(&mut self, assignment_id: i64, action: ActivityAction) {
        let Some(assignment) = self.assignments.get(assignment_id) else {
            return;
        };
        let name = assignment.title.clone();
        let course_id = assignment.course_id;
        let course_name = self.courses.get(course_id).map(|c| c.name.clone());
        self.activity.record(
            ActivityKind::Assignment,
            action,
            assignment_id,
            name,
            Some(course_id),
            course_name,
        );
    }

    // ===== Assignments =====

    pub fn assignment(&self, id: i64) -> Option<&Assignment> {
        self.assignments.get(id)
    }

    pub fn assignments_loaded(&self, course_id: i64) -> bool {
        self.assignments_by_course.contains_bucket(course_id)
    }

    pub fn assignments_for_course(&self, course_id: i64) -> Vec<&Assignment> {
        self.assignments_by_course
            .children(course_id)
            .iter()
            .filter_map(|&id| self.assignments.get(id))
            .collect()
    }

    pub fn merge_assignment(&mut self, assignment: Assignment) -> MergeOutcome {
        let id = assignment.id;
        let course_id = assignment.course_id;
        let previous_course = self.assignments.get(id).map(|a| a.course_id);

        let outcome = self.assignments.merge(assignment, MergeStrategy::Replace);
        if let Some(previous) = previous_course.filter(|&p| p != course_id) {
            self.assignments_by_course.remove(previous, id);
        }
        self.assignments_by_course.insert(course_id, id);
        outcome
    }

    pub fn replace_assignments(&mut self, course_id: i64, assignments: Vec<Assignment>) {
        let mut order = Vec::with_capacity(assignments.len());
        for assignment in assignments {
            if assignment.course_id == course_id {
                order.push(assignment.id);
            }
            self.merge_assignment(assignment);
        }

        let previous = self.assignments_by_course.replace_bucket(course_id, order.clone());
        for stale in previous.into_iter().filter(|id| !order.contains(id)) {
            self.remove_assignment_record(stale);
        }
    }

    /// Remove an assignment with its submissions.
    pub fn remove_assignment(&mut self, id: i64) -> Option<Assignment> {
        let course_id = self.assignments.get(id).map(|a| a.course_id);
        let removed = self.remove_assignment_record(id);
        if let Some(course_id) = course_id {
            self.assignments_by_course.remove(course_id, id);
        }
        removed
    }

    fn remove_assignment_record(&mut self, id: i64) -> Option<Assignment> {
        if let Some(submission_ids) = self.submissions_by_assignment.take_bucket(id) {
            for submission_id in submission_ids {
                self.submissions.remove(submission_id);
            }
        }
        self.user_submissions.remove(&id);
        self.assignments.remove(id)
    }

    /// Assignments due after `now` across loaded courses, soonest first.
    pub fn upcoming_assignments(&self, now: DateTime<Utc>) -> Vec<&Assignment> {
        let mut upcoming: Vec<(&Assignment, DateTime<Utc>)> = self
            .assignments
            .values()
            .filter_map(|a| a.due_at().map(|due| (a, due)))
            .filter(|(_, due)| *due > now)
            .collect();
        upcoming.sort_by_key(|(_, due)| *due);
        upcoming.into_iter().map(|(a, _)| a).collect()
    }

    // ===== Submissions =====

    pub fn submissions_loaded(&self, assignment_id: i64) -> bool {
        self.submissions_by_assignment.contains_bucket(assignment_id)
    }

    pub fn submissions_for_assignment(&self, assignment_id: i64) -> Vec<&Submission> {
        self.submissions_by_assignment
            .children(assignment_id)
            .iter()
            .filter_map(|&id| self.submissions.get(id))
            .collect()
    }

    pub fn replace_submissions(&mut self, assignment_id: i64, submissions: Vec<Submission>) {
        let order: Vec<i64> = submissions.iter().map(|s| s.id).collect();
        for submission in submissions {
            self.submissions.merge(submission, MergeStrategy::Replace);
        }
        let previous = self.submissions_by_assignment.replace_bucket(assignment_id, order.clone());
        for stale in previous.into_iter().filter(|id| !order.contains(id)) {
            self.submissions.remove(stale);
        }
    }

    /// The current user's submission: `None` if unknown, `Some(None)` if
    /// confirmed absent.
    pub fn user_submission(&self, assignment_id: i64) -> Option<Option<&Submission>> {
        self.user_submissions.get(&assignment_id).map(Option::as_ref)
    }

    pub fn set_user_submission(&mut self, assignment_id: i64, submission: Option<Submission>) {
        self.user_submissions.insert(assignment_id, submission);
    }

    /// Upsert a submission into a loaded list, keyed by submitting user,
    /// and refresh the matching user submission entry.
    pub fn merge_submission(&mut self, submission: Submission) {
        let assignment_id = submission.assignment_id;

        if self.submissions_loaded(assignment_id) {
            let superseded: Vec<i64> = self
                .submissions_for_assignment(assignment_id)
                .into_iter()
                .filter(|s| s.user_id == submission.user_id && s.id != submission.id)
                .map(|s| s.id)
                .collect();
            for id in superseded {
                self.submissions_by_assignment.remove(assignment_id, id);
                self.submissions.remove(id);
            }
            self.submissions_by_assignment.insert(assignment_id, submission.id);
            self.submissions.merge(submission.clone(), MergeStrategy::Replace);
        }

        if let Some(entry) = self.user_submissions.get_mut(&assignment_id) {
            let same = entry
                .as_ref()
                .is_some_and(|s| s.id == submission.id || s.user_id == submission.user_id);
            if same {
                *entry = Some(submission);
            }
        }
    }

    // ===== Consistency =====

    /// Rebuild every index from its table and compare membership.
    pub fn indices_consistent(&self) -> bool {
        fn same(a: &SecondaryIndex, b: &SecondaryIndex) -> bool {
            let parents: Vec<i64> = a.parents().chain(b.parents()).collect();
            parents.into_iter().all(|p| {
                let mut x = a.children(p).to_vec();
                let mut y = b.children(p).to_vec();
                x.sort_unstable();
                y.sort_unstable();
                x == y
            })
        }

        same(
            &self.modules_by_course,
            &SecondaryIndex::rebuild(self.modules.values(), |m: &Module| m.course_id),
        ) && same(
            &self.content_by_module,
            &SecondaryIndex::rebuild(self.content.values(), |c: &ContentItem| c.module_id),
        ) && same(
            &self.assignments_by_course,
            &SecondaryIndex::rebuild(self.assignments.values(), |a: &Assignment| a.course_id),
        ) && same(
            &self.submissions_by_assignment,
            &SecondaryIndex::rebuild(self.submissions.values(), |s: &Submission| s.assignment_id),
        )
    }
}
