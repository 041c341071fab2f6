//! coursecache-core - client-side cache and consistency engine for a
//! learning platform.
//!
//! Remote records (courses, modules, content, assignments, progress) are
//! merged into a denormalized in-memory cache that keeps secondary indices,
//! derived aggregates and cross-entity views consistent, and cascades
//! progress (all content completed -> module completed -> course progress
//! refreshed).
//!
//! Start from [`SessionContext`]: it owns the remote API, the current
//! identity and the cache, and hands out one orchestrator per entity family.

pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod sync;

pub use api::{ApiClient, ApiError, RemoteApi};
pub use auth::AuthState;
pub use cache::CacheState;
pub use config::Config;
pub use error::{CacheError, Result};
pub use sync::SessionContext;
