//! Data models for learning-platform entities.
//!
//! This module contains the records exchanged with the remote API and held
//! in the cache:
//!
//! - `Course`, `CourseEnrollment`: course catalogue and membership
//! - `Module`, `ContentItem`: course structure and learning material
//! - `Assignment`, `Submission`: coursework and grading
//! - Progress types: `ModuleProgress`, `ContentProgress`, `CourseProgress`
//! - `ActivityRecord`: entries of the recent-activity log
//! - `User`: the authenticated identity

pub mod assignment;
pub mod course;
pub mod module;
pub mod progress;
pub mod user;

pub use assignment::{Assignment, AssignmentDraft, AssignmentUpdate, Submission, SubmissionDraft};
pub use course::{Course, CourseDraft, CourseEnrollment, CourseUpdate, EnrollmentRole};
pub use module::{
    ContentDraft, ContentItem, ContentType, ContentUpdate, Module, ModuleDraft, ModuleUpdate,
};
pub use progress::{
    ActivityAction, ActivityKind, ActivityRecord, CompletionStatus, ContentProgress,
    ContentProgressUpdate, CourseProgress, ModuleProgress, ProgressStage, UserProgress,
};
pub use user::{User, UserRole};
