use thiserror::Error;

use crate::api::ApiError;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Authentication required")]
    Unauthenticated,

    #[error(transparent)]
    Remote(#[from] ApiError),

    #[error("{entity} {id} is not loaded")]
    StaleReference { entity: &'static str, id: i64 },
}

impl CacheError {
    pub fn stale(entity: &'static str, id: i64) -> Self {
        CacheError::StaleReference { entity, id }
    }

    /// HTTP-style status of a remote failure.
    pub fn status(&self) -> Option<u16> {
        match self {
            CacheError::Remote(e) => e.status(),
            _ => None,
        }
    }
}

pub type Result<T, E = CacheError> = std::result::Result<T, E>;
