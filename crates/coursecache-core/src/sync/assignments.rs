//! Assignment and submission orchestration.

use chrono::Utc;
use tracing::{debug, info};

use super::SessionContext;
use crate::api::OptionalExt;
use crate::error::Result;
use crate::models::{Assignment, AssignmentDraft, AssignmentUpdate, Submission, SubmissionDraft};

pub struct AssignmentSync<'a> {
    ctx: &'a SessionContext,
}

impl<'a> AssignmentSync<'a> {
    pub(crate) fn new(ctx: &'a SessionContext) -> Self {
        Self { ctx }
    }

    // ===== Assignments =====

    pub async fn fetch_for_course(&self, course_id: i64) -> Result<Vec<Assignment>> {
        let message = format!("Failed to fetch assignments for course {}", course_id);
        self.ctx
            .run(&message, async {
                let assignments = self.ctx.remote().list_assignments(course_id).await?;
                debug!(course_id, count = assignments.len(), "Assignments fetched");
                self.ctx.write(|c| c.replace_assignments(course_id, assignments));
                Ok(self.for_course(course_id))
            })
            .await
    }

    pub async fn fetch(&self, id: i64) -> Result<Assignment> {
        let message = format!("Failed to fetch assignment with ID {}", id);
        self.ctx
            .run(&message, async {
                let assignment = self.ctx.remote().get_assignment(id).await?;
                self.ctx.write(|c| c.merge_assignment(assignment.clone()));
                Ok(assignment)
            })
            .await
    }

    pub async fn create(&self, draft: &AssignmentDraft) -> Result<Assignment> {
        self.ctx
            .run("Failed to create assignment", async {
                let assignment = self.ctx.remote().create_assignment(draft).await?;
                info!(assignment_id = assignment.id, course_id = assignment.course_id, "Assignment created");
                self.ctx.write(|c| c.merge_assignment(assignment.clone()));
                Ok(assignment)
            })
            .await
    }

    pub async fn update(&self, id: i64, update: &AssignmentUpdate) -> Result<Assignment> {
        self.ctx
            .run("Failed to update assignment", async {
                let assignment = self.ctx.remote().update_assignment(id, update).await?;
                self.ctx.write(|c| c.merge_assignment(assignment.clone()));
                Ok(assignment)
            })
            .await
    }

    /// Delete an assignment along with its cached submissions.
    pub async fn delete(&self, id: i64) -> Result<()> {
        self.ctx
            .run("Failed to delete assignment", async {
                self.ctx.remote().delete_assignment(id).await?;
                info!(assignment_id = id, "Assignment deleted");
                self.ctx.write(|c| c.remove_assignment(id));
                Ok(())
            })
            .await
    }

    // ===== Submissions =====

    pub async fn fetch_submissions(&self, assignment_id: i64) -> Result<Vec<Submission>> {
        let message = format!("Failed to fetch submissions for assignment {}", assignment_id);
        self.ctx
            .run(&message, async {
                let submissions = self.ctx.remote().list_submissions(assignment_id).await?;
                self.ctx
                    .write(|c| c.replace_submissions(assignment_id, submissions.clone()));
                Ok(submissions)
            })
            .await
    }

    /// The current user's submission. A missing submission is cached as
    /// known-absent and returned as `None`.
    pub async fn fetch_user_submission(&self, assignment_id: i64) -> Result<Option<Submission>> {
        self.ctx
            .run("Failed to fetch submission", async {
                let user_id = self.ctx.auth().require_user_id()?;
                let submission = self
                    .ctx
                    .remote()
                    .get_user_submission(assignment_id, user_id)
                    .await
                    .optional()?;
                if submission.is_none() {
                    debug!(assignment_id, "No submission yet");
                }
                self.ctx
                    .write(|c| c.set_user_submission(assignment_id, submission.clone()));
                Ok(submission)
            })
            .await
    }

    pub async fn submit(&self, draft: &SubmissionDraft) -> Result<Submission> {
        self.ctx
            .run("Failed to submit assignment", async {
                let submission = self.ctx.remote().submit_assignment(draft).await?;
                info!(assignment_id = submission.assignment_id, "Assignment submitted");
                self.ctx.write(|c| {
                    c.merge_submission(submission.clone());
                    c.set_user_submission(submission.assignment_id, Some(submission.clone()));
                });
                Ok(submission)
            })
            .await
    }

    pub async fn grade(&self, submission_id: i64, grade: f64) -> Result<Submission> {
        self.ctx
            .run("Failed to grade submission", async {
                let submission = self.ctx.remote().grade_submission(submission_id, grade).await?;
                self.ctx.write(|c| c.merge_submission(submission.clone()));
                Ok(submission)
            })
            .await
    }

    // ===== Accessors =====

    pub fn get(&self, id: i64) -> Option<Assignment> {
        self.ctx.read(|c| c.assignment(id).cloned())
    }

    pub fn for_course(&self, course_id: i64) -> Vec<Assignment> {
        self.ctx
            .read(|c| c.assignments_for_course(course_id).into_iter().cloned().collect())
    }

    pub fn submissions(&self, assignment_id: i64) -> Vec<Submission> {
        self.ctx.read(|c| {
            c.submissions_for_assignment(assignment_id)
                .into_iter()
                .cloned()
                .collect()
        })
    }

    /// `None` when never fetched, `Some(None)` when known to be absent.
    pub fn user_submission(&self, assignment_id: i64) -> Option<Option<Submission>> {
        self.ctx
            .read(|c| c.user_submission(assignment_id).map(|s| s.cloned()))
    }

    pub fn upcoming(&self) -> Vec<Assignment> {
        let now = Utc::now();
        self.ctx
            .read(|c| c.upcoming_assignments(now).into_iter().cloned().collect())
    }

    pub fn can_manage(&self, assignment_id: i64) -> bool {
        let auth = self.ctx.auth();
        if auth.is_admin() {
            return true;
        }
        auth.is_teacher()
            && self.ctx.read(|c| {
                c.assignment(assignment_id)
                    .is_some_and(|a| a.can_manage == Some(true))
            })
    }
}
