//! Progress fetches, recording and the completion cascade.
//!
//! Content completion can complete its module; module completion refreshes
//! cached course progress in the background. There is no cascade in the
//! other direction: marking a module complete or incomplete never touches
//! content progress.

use tracing::{debug, info, warn};

use super::SessionContext;
use crate::api::OptionalExt;
use crate::error::Result;
use crate::models::{
    ActivityAction, ActivityRecord, CompletionStatus, ContentProgress, ContentProgressUpdate,
    CourseProgress, Module, ModuleProgress, UserProgress,
};

#[derive(Clone, Copy)]
pub struct ProgressSync<'a> {
    ctx: &'a SessionContext,
}

impl<'a> ProgressSync<'a> {
    pub(crate) fn new(ctx: &'a SessionContext) -> Self {
        Self { ctx }
    }

    // ===== Fetches =====

    /// Load everything the server knows about the user's progress. The
    /// server's recent activity replaces the local log.
    pub async fn fetch_user_progress(&self) -> Result<UserProgress> {
        self.ctx
            .run("Failed to fetch user progress", async {
                let user_id = self.ctx.auth().require_user_id()?;
                let progress = self.ctx.remote().get_user_progress(user_id).await?;
                self.ctx.write(|c| c.merge_user_progress(progress.clone()));
                Ok(progress)
            })
            .await
    }

    pub async fn fetch_course_progress(&self, course_id: i64) -> Result<CourseProgress> {
        self.ctx
            .run("Failed to fetch course progress", self.load_course_progress(course_id))
            .await
    }

    pub(crate) async fn load_course_progress(&self, course_id: i64) -> Result<CourseProgress> {
        let user_id = self.ctx.auth().require_user_id()?;
        let progress = self.ctx.remote().get_course_progress(course_id, user_id).await?;
        debug!(course_id, percentage = progress.percentage, "Course progress fetched");
        self.ctx.write(|c| c.merge_course_progress(progress.clone()));
        Ok(progress)
    }

    /// Module progress for the current user; `None` if there is none yet.
    pub async fn fetch_module_progress(&self, module_id: i64) -> Result<Option<ModuleProgress>> {
        self.ctx
            .run("Failed to fetch module progress", self.load_module_progress(module_id))
            .await
    }

    pub(crate) async fn load_module_progress(&self, module_id: i64) -> Result<Option<ModuleProgress>> {
        let user_id = self.ctx.auth().require_user_id()?;
        let progress = self
            .ctx
            .remote()
            .get_module_progress(module_id, user_id)
            .await
            .optional()?;
        match &progress {
            Some(p) => {
                self.ctx.write(|c| c.merge_module_progress(p.clone()));
            }
            None => debug!(module_id, "No module progress yet"),
        }
        Ok(progress)
    }

    /// Cached content progress, or a first view recorded now. `None` when
    /// another caller is already recording the first view.
    pub(crate) async fn ensure_content_progress(&self, content_id: i64) -> Result<Option<ContentProgress>> {
        self.ctx.auth().require_user_id()?;
        if let Some(existing) = self.ctx.read(|c| c.content_progress(content_id).cloned()) {
            return Ok(Some(existing));
        }
        let Some(_claim) = self.ctx.claim_view(content_id) else {
            debug!(content_id, "First view already being recorded");
            return Ok(None);
        };
        let progress = self
            .ctx
            .remote()
            .record_content_progress(content_id, ContentProgressUpdate::viewed())
            .await?;
        self.ctx.write(|c| c.merge_content_progress(progress.clone()));
        Ok(Some(progress))
    }

    // ===== Recording =====

    /// Record a view or completion. Completing the last loaded item of a
    /// module marks the module complete as well.
    pub async fn record_content_progress(
        &self,
        content_id: i64,
        update: ContentProgressUpdate,
    ) -> Result<ContentProgress> {
        self.ctx
            .run("Failed to update content progress", async {
                self.ctx.auth().require_user_id()?;
                let progress = self
                    .ctx
                    .remote()
                    .record_content_progress(content_id, update)
                    .await?;

                let action = if update.completed {
                    ActivityAction::Completed
                } else {
                    ActivityAction::Viewed
                };
                self.ctx.write(|c| {
                    c.merge_content_progress(progress.clone());
                    c.log_content_activity(content_id, action);
                });

                if update.completed {
                    self.cascade_module_completion(content_id).await;
                }
                Ok(progress)
            })
            .await
    }

    async fn cascade_module_completion(&self, content_id: i64) {
        let Some(module_id) = self.ctx.read(|c| c.content(content_id).map(|i| i.module_id)) else {
            debug!(content_id, "Content not loaded, skipping module completion check");
            return;
        };
        let (ready, done) = self
            .ctx
            .read(|c| (c.all_content_completed(module_id), c.is_module_completed(module_id)));
        if !ready || done {
            return;
        }

        info!(module_id, "All content completed, marking module complete");
        if let Err(e) = self.complete_module(module_id).await {
            warn!(module_id, error = %e, "Automatic module completion failed");
        }
    }

    pub async fn mark_module_completed(&self, module_id: i64) -> Result<ModuleProgress> {
        self.ctx
            .run("Failed to mark module as completed", self.complete_module(module_id))
            .await
    }

    async fn complete_module(&self, module_id: i64) -> Result<ModuleProgress> {
        self.ctx.auth().require_user_id()?;
        let progress = self.ctx.remote().mark_module_completed(module_id).await?;
        let course_id = self.ctx.write(|c| {
            let course_id = c.merge_module_progress(progress.clone());
            c.log_module_activity(module_id, ActivityAction::Completed);
            course_id
        });
        self.refresh_course_progress_if_cached(course_id);
        Ok(progress)
    }

    /// Mark a module incomplete. Content progress is left as it is.
    pub async fn mark_module_incomplete(&self, module_id: i64) -> Result<ModuleProgress> {
        self.ctx
            .run("Failed to mark module as incomplete", async {
                self.ctx.auth().require_user_id()?;
                let progress = self.ctx.remote().mark_module_incomplete(module_id).await?;
                let course_id = self.ctx.write(|c| c.merge_module_progress(progress.clone()));
                self.refresh_course_progress_if_cached(course_id);
                Ok(progress)
            })
            .await
    }

    pub async fn record_course_started(&self, course_id: i64) -> Result<()> {
        self.ctx
            .run("Failed to record course start", async {
                self.ctx.auth().require_user_id()?;
                self.ctx.remote().record_course_started(course_id).await?;
                self.ctx
                    .write(|c| c.log_course_activity(course_id, ActivityAction::Started));
                Ok(())
            })
            .await
    }

    pub async fn record_assignment_submission(&self, assignment_id: i64) -> Result<()> {
        self.ctx
            .run("Failed to record assignment submission", async {
                self.ctx.auth().require_user_id()?;
                self.ctx
                    .remote()
                    .record_assignment_submission(assignment_id)
                    .await?;
                let course_id = self.ctx.write(|c| {
                    c.log_assignment_activity(assignment_id, ActivityAction::Completed);
                    c.assignment(assignment_id).map(|a| a.course_id)
                });
                self.refresh_course_progress_if_cached(course_id);
                Ok(())
            })
            .await
    }

    pub async fn reset_course_progress(&self, course_id: i64) -> Result<()> {
        self.ctx
            .run("Failed to reset course progress", async {
                let user_id = self.ctx.auth().require_user_id()?;
                self.ctx
                    .remote()
                    .reset_course_progress(course_id, user_id)
                    .await?;
                info!(course_id, "Course progress reset");
                self.ctx.write(|c| c.reset_course_progress(course_id));
                Ok(())
            })
            .await
    }

    // ===== Background refreshes =====

    /// Fetch a course's progress in the background, if someone is signed in.
    pub(crate) fn spawn_course_progress_fetch(&self, course_id: i64) {
        if self.ctx.auth().user_id().is_none() {
            debug!(course_id, "No current user, skipping course progress");
            return;
        }
        let ctx = self.ctx.clone();
        self.ctx.tasks().spawn("course_progress", async move {
            if let Err(e) = ctx.progress().load_course_progress(course_id).await {
                warn!(course_id, error = %e, "Course progress refresh failed");
            }
        });
    }

    fn refresh_course_progress_if_cached(&self, course_id: Option<i64>) {
        match course_id {
            Some(id) if self.ctx.read(|c| c.course_progress(id).is_some()) => {
                self.spawn_course_progress_fetch(id);
            }
            _ => debug!(?course_id, "No cached course progress to refresh"),
        }
    }

    // ===== Accessors =====

    pub fn module_progress(&self, module_id: i64) -> Option<ModuleProgress> {
        self.ctx.read(|c| c.module_progress(module_id).cloned())
    }

    pub fn content_progress(&self, content_id: i64) -> Option<ContentProgress> {
        self.ctx.read(|c| c.content_progress(content_id).cloned())
    }

    pub fn course_progress(&self, course_id: i64) -> Option<CourseProgress> {
        self.ctx.read(|c| c.course_progress(course_id).cloned())
    }

    pub fn is_module_completed(&self, module_id: i64) -> bool {
        self.ctx.read(|c| c.is_module_completed(module_id))
    }

    pub fn is_content_completed(&self, content_id: i64) -> bool {
        self.ctx.read(|c| c.is_content_completed(content_id))
    }

    pub fn is_content_viewed(&self, content_id: i64) -> bool {
        self.ctx.read(|c| c.is_content_viewed(content_id))
    }

    pub fn overall(&self) -> f64 {
        self.ctx.read(|c| c.overall_progress())
    }

    pub fn completion_status(&self, course_id: i64) -> CompletionStatus {
        self.ctx.read(|c| c.completion_status(course_id))
    }

    pub fn next_module(&self, course_id: i64) -> Option<Module> {
        self.ctx.read(|c| c.next_module(course_id).cloned())
    }

    pub fn recent_course_ids(&self) -> Vec<i64> {
        self.ctx.read(|c| c.activity().recent_course_ids())
    }

    pub fn activities(&self) -> Vec<ActivityRecord> {
        self.ctx.read(|c| c.activity().iter().cloned().collect())
    }

    pub fn activities_for_course(&self, course_id: i64) -> Vec<ActivityRecord> {
        self.ctx
            .read(|c| c.activity().for_course(course_id).into_iter().cloned().collect())
    }
}
