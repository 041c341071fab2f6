//! Derived values computed from cached records.
//!
//! Everything here is a pure function of its inputs so the cache can
//! recompute aggregates after any change without touching the network.

use crate::models::{CompletionStatus, ContentItem, CourseProgress, Module, ModuleProgress};

/// Content-derived fields of a module.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModuleAggregates {
    pub content_count: u32,
    /// Minutes; items without a duration count as zero. Saturates at `u32::MAX`.
    pub duration: u32,
}

pub fn module_aggregates<'a, I>(items: I) -> ModuleAggregates
where
    I: IntoIterator<Item = &'a ContentItem>,
{
    items
        .into_iter()
        .fold(ModuleAggregates::default(), |acc, item| ModuleAggregates {
            content_count: acc.content_count.saturating_add(1),
            duration: acc.duration.saturating_add(item.duration.unwrap_or(0)),
        })
}

/// `100 * completed / total`, or 0 for an empty course.
pub fn completion_percentage(completed: u32, total: u32) -> f64 {
    if total == 0 {
        0.0
    } else {
        100.0 * f64::from(completed) / f64::from(total)
    }
}

/// Build a course progress entry from the modules loaded for the course.
///
/// `lookup` returns the cached progress for a module id, if any.
pub fn course_progress<'a, F>(course_id: i64, module_ids: &[i64], lookup: F) -> CourseProgress
where
    F: Fn(i64) -> Option<&'a ModuleProgress>,
{
    let modules: Vec<ModuleProgress> = module_ids.iter().filter_map(|&id| lookup(id).cloned()).collect();
    let total = module_ids.len() as u32;
    let completed = modules.iter().filter(|p| p.completed).count() as u32;

    CourseProgress {
        course_id,
        total_modules: total,
        completed_modules: completed,
        percentage: completion_percentage(completed, total),
        modules,
    }
}

/// True when the module has at least one content item and every one of
/// them has completed progress.
pub fn all_content_completed<F>(content_ids: &[i64], is_completed: F) -> bool
where
    F: Fn(i64) -> bool,
{
    !content_ids.is_empty() && content_ids.iter().all(|&id| is_completed(id))
}

/// Classify modules as completed, in progress (some progress recorded) or
/// not started (no progress at all).
pub fn completion_status<'a, F>(module_ids: &[i64], lookup: F) -> CompletionStatus
where
    F: Fn(i64) -> Option<&'a ModuleProgress>,
{
    let mut status = CompletionStatus::default();
    for &id in module_ids {
        match lookup(id) {
            Some(p) if p.completed => status.completed += 1,
            Some(_) => status.in_progress += 1,
            None => status.not_started += 1,
        }
    }
    status
}

/// The first module in course order that is not completed, or the first
/// module when everything is done.
pub fn next_module<'a, F>(modules: &[&'a Module], is_completed: F) -> Option<&'a Module>
where
    F: Fn(i64) -> bool,
{
    modules
        .iter()
        .copied()
        .find(|m| !is_completed(m.id))
        .or_else(|| modules.first().copied())
}

/// Mean percentage across courses with progress, 0 when there are none.
pub fn overall_progress<'a, I>(courses: I) -> f64
where
    I: IntoIterator<Item = &'a CourseProgress>,
{
    let (sum, count) = courses
        .into_iter()
        .fold((0.0, 0u32), |(sum, count), cp| (sum + cp.percentage, count + 1));
    if count == 0 {
        0.0
    } else {
        sum / f64::from(count)
    }
}
