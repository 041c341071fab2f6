//! In-memory denormalized cache.
//!
//! - `table`: by-id entity tables and parent/child secondary indices
//! - `aggregate`: pure derived-value computations
//! - `activity`: the bounded recent-activity log
//! - `state`: `CacheState`, which applies every merge and cascade rule

pub mod activity;
pub mod aggregate;
pub mod state;
pub mod table;

pub use activity::ActivityLog;
pub use state::CacheState;
pub use table::{Entity, EntityTable, MergeOutcome, MergeStrategy, SecondaryIndex};
