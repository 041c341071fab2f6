//! Authenticated identity consumed by the cache.
//!
//! The login flow lives elsewhere; this module only holds who the current
//! user is so that progress lookups can be scoped and role-dependent views
//! (admin "all courses") can be chosen. It is advisory, not enforcement.

pub mod identity;

pub use identity::AuthState;
