//! Fetch orchestrators, one per entity family.
//!
//! Each orchestrator borrows a [`SessionContext`], sequences the remote
//! calls for an operation and feeds the results through the cache. The
//! authoritative call of an operation decides its success; dependent
//! progress fetches are best-effort and only logged when they fail.

mod assignments;
mod context;
mod courses;
mod modules;
mod progress;
mod tasks;

pub use assignments::AssignmentSync;
pub use context::SessionContext;
pub use courses::CourseSync;
pub use modules::ModuleSync;
pub use progress::ProgressSync;
pub use tasks::BackgroundTasks;
