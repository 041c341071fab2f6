//! Remote API module for the learning-platform service.
//!
//! This module provides the `RemoteApi` trait the cache engine calls
//! through, and `ApiClient`, its HTTP implementation.
//!
//! The API uses bearer token authentication; obtaining the token is the
//! job of whatever owns the login flow.

pub mod client;
pub mod error;
pub mod remote;

#[cfg(test)]
pub(crate) mod fake;

pub use client::ApiClient;
pub use error::{ApiError, OptionalExt};
pub use remote::RemoteApi;
