//! Module and content orchestration.
//!
//! Module listings, module detail (module, then content, then per-item
//! progress) and content mutations. Progress work that hangs off these
//! fetches is best-effort and never fails the primary call.

use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use super::SessionContext;
use crate::cache::Entity;
use crate::error::{CacheError, Result};
use crate::models::{ContentDraft, ContentItem, ContentUpdate, Module, ModuleDraft, ModuleUpdate};

#[derive(Clone, Copy)]
pub struct ModuleSync<'a> {
    ctx: &'a SessionContext,
}

impl<'a> ModuleSync<'a> {
    pub(crate) fn new(ctx: &'a SessionContext) -> Self {
        Self { ctx }
    }

    // ===== Modules =====

    /// Load a course's modules, then fetch its progress in the background.
    pub async fn fetch_for_course(&self, course_id: i64) -> Result<Vec<Module>> {
        self.ctx
            .run("Failed to fetch modules", async {
                let modules = self.ctx.remote().list_modules(course_id).await?;
                debug!(course_id, count = modules.len(), "Modules fetched");
                self.ctx.write(|c| c.replace_modules(course_id, modules));
                self.ctx.progress().spawn_course_progress_fetch(course_id);
                Ok(self.for_course(course_id))
            })
            .await
    }

    /// Load a module with its content; progress is fetched best-effort.
    pub async fn fetch(&self, id: i64) -> Result<Module> {
        let message = format!("Failed to fetch module with ID {}", id);
        self.ctx
            .run(&message, async {
                let module = self.ctx.remote().get_module(id).await?;
                self.ctx.write(|c| c.merge_module(module));
                self.load_content(id).await?;

                if self.ctx.auth().user_id().is_some() {
                    if let Err(e) = self.ctx.progress().load_module_progress(id).await {
                        warn!(module_id = id, error = %e, "Module progress fetch failed");
                    }
                }
                self.get(id).ok_or_else(|| CacheError::stale(Module::KIND, id))
            })
            .await
    }

    pub async fn create(&self, course_id: i64, draft: &ModuleDraft) -> Result<Module> {
        self.ctx
            .run("Failed to create module", async {
                let module = self.ctx.remote().create_module(course_id, draft).await?;
                info!(module_id = module.id, course_id, "Module created");
                Ok(self.merge(module))
            })
            .await
    }

    pub async fn update(&self, id: i64, update: &ModuleUpdate) -> Result<Module> {
        self.ctx
            .run("Failed to update module", async {
                let module = self.ctx.remote().update_module(id, update).await?;
                Ok(self.merge(module))
            })
            .await
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        self.ctx
            .run("Failed to delete module", async {
                self.ctx.remote().delete_module(id).await?;
                info!(module_id = id, "Module deleted");
                self.ctx.write(|c| c.remove_module(id));
                Ok(())
            })
            .await
    }

    /// Reorder a course's modules; the returned order becomes the cached order.
    pub async fn reorder(&self, course_id: i64, module_ids: &[i64]) -> Result<Vec<Module>> {
        self.ctx
            .run("Failed to reorder modules", async {
                let modules = self.ctx.remote().reorder_modules(course_id, module_ids).await?;
                self.ctx.write(|c| c.replace_modules(course_id, modules));
                Ok(self.for_course(course_id))
            })
            .await
    }

    fn merge(&self, module: Module) -> Module {
        let id = module.id;
        self.ctx.write(|c| {
            c.merge_module(module.clone());
            c.module(id).cloned().unwrap_or(module)
        })
    }

    // ===== Content =====

    pub async fn fetch_content(&self, module_id: i64) -> Result<Vec<ContentItem>> {
        self.ctx
            .run("Failed to fetch content", self.load_content(module_id))
            .await
    }

    async fn load_content(&self, module_id: i64) -> Result<Vec<ContentItem>> {
        let items = self.ctx.remote().list_content(module_id).await?;
        debug!(module_id, count = items.len(), "Content fetched");
        self.ctx.write(|c| c.replace_content(module_id, items));

        let ids = self.ctx.read(|c| c.content_ids_for_module(module_id).to_vec());
        self.ensure_progress_for(ids).await;
        Ok(self.content_for_module(module_id))
    }

    // Per-item progress with bounded concurrency; each failure stays local.
    async fn ensure_progress_for(&self, content_ids: Vec<i64>) {
        if self.ctx.auth().user_id().is_none() {
            debug!("No current user, skipping content progress");
            return;
        }

        let progress = self.ctx.progress();
        let limit = self.ctx.config().max_concurrent_requests.max(1);
        stream::iter(content_ids)
            .map(move |id| async move { (id, progress.ensure_content_progress(id).await) })
            .buffer_unordered(limit)
            .for_each(|(id, result)| async move {
                if let Err(e) = result {
                    warn!(content_id = id, error = %e, "Content progress fetch failed");
                }
            })
            .await;
    }

    /// Load one content item. It joins its module's bucket only if that
    /// bucket is already loaded.
    pub async fn fetch_content_item(&self, id: i64) -> Result<ContentItem> {
        let message = format!("Failed to fetch content with ID {}", id);
        self.ctx
            .run(&message, async {
                let item = self.ctx.remote().get_content(id).await?;
                let indexed = self.ctx.write(|c| c.merge_content_if_indexed(item.clone()));
                if indexed.is_none() {
                    debug!(content_id = id, module_id = item.module_id, "Content bucket not loaded");
                }

                if self.ctx.auth().user_id().is_some() {
                    if let Err(e) = self.ctx.progress().ensure_content_progress(id).await {
                        warn!(content_id = id, error = %e, "Content progress fetch failed");
                    }
                }
                Ok(item)
            })
            .await
    }

    pub async fn create_content(&self, module_id: i64, draft: &ContentDraft) -> Result<ContentItem> {
        self.ctx
            .run("Failed to create content", async {
                let item = self.ctx.remote().create_content(module_id, draft).await?;
                info!(content_id = item.id, module_id, "Content created");
                self.ctx.write(|c| c.merge_content(item.clone()));
                Ok(item)
            })
            .await
    }

    pub async fn update_content(&self, id: i64, update: &ContentUpdate) -> Result<ContentItem> {
        self.ctx
            .run("Failed to update content", async {
                let item = self.ctx.remote().update_content(id, update).await?;
                self.ctx.write(|c| c.merge_content(item.clone()));
                Ok(item)
            })
            .await
    }

    pub async fn delete_content(&self, id: i64) -> Result<()> {
        self.ctx
            .run("Failed to delete content", async {
                self.ctx.remote().delete_content(id).await?;
                if self.ctx.write(|c| c.remove_content(id)).is_none() {
                    debug!(content_id = id, "Deleted content was not cached");
                }
                Ok(())
            })
            .await
    }

    // ===== Accessors =====

    pub fn get(&self, id: i64) -> Option<Module> {
        self.ctx.read(|c| c.module(id).cloned())
    }

    pub fn for_course(&self, course_id: i64) -> Vec<Module> {
        self.ctx
            .read(|c| c.modules_for_course(course_id).into_iter().cloned().collect())
    }

    pub fn content(&self, id: i64) -> Option<ContentItem> {
        self.ctx.read(|c| c.content(id).cloned())
    }

    pub fn content_for_module(&self, module_id: i64) -> Vec<ContentItem> {
        self.ctx
            .read(|c| c.content_for_module(module_id).into_iter().cloned().collect())
    }

    pub fn all_content(&self) -> Vec<ContentItem> {
        self.ctx.read(|c| c.all_content().into_iter().cloned().collect())
    }

    /// Admins manage everything; teachers what the server flags as theirs.
    pub fn can_manage(&self, module_id: i64) -> bool {
        let auth = self.ctx.auth();
        if auth.is_admin() {
            return true;
        }
        auth.is_teacher() && self.ctx.read(|c| c.module(module_id).is_some_and(|m| m.can_manage == Some(true)))
    }
}
