use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::warn;

use super::tasks::BackgroundTasks;
use super::{AssignmentSync, CourseSync, ModuleSync, ProgressSync};
use crate::api::RemoteApi;
use crate::auth::AuthState;
use crate::cache::CacheState;
use crate::config::Config;
use crate::error::Result;

/// Everything one signed-in session needs: the remote API, the current
/// identity, the cache and its background work.
///
/// Cheap to clone; clones share the same state.
#[derive(Clone)]
pub struct SessionContext {
    inner: Arc<Inner>,
}

struct Inner {
    remote: Arc<dyn RemoteApi>,
    auth: AuthState,
    cache: Mutex<CacheState>,
    tasks: BackgroundTasks,
    config: Config,
    /// Content ids with a first-view recording in flight.
    views_in_flight: Mutex<HashSet<i64>>,
}

impl SessionContext {
    pub fn new(remote: Arc<dyn RemoteApi>, auth: AuthState, config: Config) -> Self {
        let cache = CacheState::with_activity_capacity(config.activity_capacity);
        Self {
            inner: Arc::new(Inner {
                remote,
                auth,
                cache: Mutex::new(cache),
                tasks: BackgroundTasks::new(),
                config,
                views_in_flight: Mutex::new(HashSet::new()),
            }),
        }
    }

    pub fn remote(&self) -> &dyn RemoteApi {
        self.inner.remote.as_ref()
    }

    pub fn auth(&self) -> &AuthState {
        &self.inner.auth
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn tasks(&self) -> &BackgroundTasks {
        &self.inner.tasks
    }

    // ===== Orchestrators =====

    pub fn courses(&self) -> CourseSync<'_> {
        CourseSync::new(self)
    }

    pub fn modules(&self) -> ModuleSync<'_> {
        ModuleSync::new(self)
    }

    pub fn progress(&self) -> ProgressSync<'_> {
        ProgressSync::new(self)
    }

    pub fn assignments(&self) -> AssignmentSync<'_> {
        AssignmentSync::new(self)
    }

    // ===== Cache access =====

    /// Run a read against the current cache. Never suspends.
    pub fn read<R>(&self, f: impl FnOnce(&CacheState) -> R) -> R {
        f(&self.inner.cache.lock())
    }

    pub(crate) fn write<R>(&self, f: impl FnOnce(&mut CacheState) -> R) -> R {
        f(&mut self.inner.cache.lock())
    }

    pub fn last_error(&self) -> Option<String> {
        self.read(|c| c.last_error().map(str::to_string))
    }

    pub fn clear_error(&self) {
        self.write(CacheState::clear_error);
    }

    /// Run a primary operation: clear the error flag, then record
    /// `"<message>: <error>"` if it fails.
    pub(crate) async fn run<T, F>(&self, message: &str, operation: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        self.clear_error();
        let result = operation.await;
        if let Err(e) = &result {
            warn!(error = %e, "{}", message);
            self.write(|c| c.set_error(format!("{}: {}", message, e)));
        }
        result
    }

    /// Claim the right to record a first view of `content_id`. `None` while
    /// another caller holds the claim; the claim is released on drop.
    pub(crate) fn claim_view(&self, content_id: i64) -> Option<ViewClaim<'_>> {
        if self.inner.views_in_flight.lock().insert(content_id) {
            Some(ViewClaim { ctx: self, content_id })
        } else {
            None
        }
    }

    // ===== Background work =====

    /// Wait for all tracked background work to finish.
    pub async fn join_background(&self) {
        self.inner.tasks.join_all().await;
    }

    pub fn abort_background(&self) {
        self.inner.tasks.abort_all();
    }
}

pub(crate) struct ViewClaim<'a> {
    ctx: &'a SessionContext,
    content_id: i64,
}

impl Drop for ViewClaim<'_> {
    fn drop(&mut self) {
        self.ctx.inner.views_in_flight.lock().remove(&self.content_id);
    }
}
