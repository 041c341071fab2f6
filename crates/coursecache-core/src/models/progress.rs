//! Progress tracking records and the recent-activity entry type.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleProgress {
    #[serde(default)]
    pub id: i64,
    #[serde(rename = "userId", default)]
    pub user_id: i64,
    #[serde(rename = "moduleId")]
    pub module_id: i64,
    #[serde(rename = "courseId", default)]
    pub course_id: Option<i64>,
    #[serde(default)]
    pub completed: bool,
    #[serde(rename = "completedAt", default)]
    pub completed_at: Option<String>,
    #[serde(rename = "contentProgress", default)]
    pub content_progress: Option<Vec<ContentProgress>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentProgress {
    #[serde(default)]
    pub id: i64,
    #[serde(rename = "userId", default)]
    pub user_id: i64,
    #[serde(rename = "contentId")]
    pub content_id: i64,
    #[serde(default)]
    pub viewed: bool,
    #[serde(default)]
    pub completed: bool,
    #[serde(rename = "completedAt", default)]
    pub completed_at: Option<String>,
    #[serde(rename = "lastAccessedAt", default)]
    pub last_accessed_at: Option<String>,
    /// Seconds spent on the item.
    #[serde(rename = "timeSpent", default)]
    pub time_spent: Option<u32>,
}

/// Where a content item sits in the `unknown -> viewed -> completed` progression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ProgressStage {
    Unknown,
    Viewed,
    Completed,
}

impl ContentProgress {
    pub fn stage(&self) -> ProgressStage {
        if self.completed {
            ProgressStage::Completed
        } else if self.viewed {
            ProgressStage::Viewed
        } else {
            ProgressStage::Unknown
        }
    }
}

/// Aggregate completion of a course. Fully derived; replaced wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseProgress {
    #[serde(rename = "courseId")]
    pub course_id: i64,
    #[serde(rename = "totalModules", default)]
    pub total_modules: u32,
    #[serde(rename = "completedModules", default)]
    pub completed_modules: u32,
    #[serde(default)]
    pub percentage: f64,
    #[serde(default)]
    pub modules: Vec<ModuleProgress>,
}

/// Everything the server knows about the current user's progress.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserProgress {
    #[serde(rename = "moduleProgress", default)]
    pub module_progress: Vec<ModuleProgress>,
    #[serde(rename = "courseProgress", default)]
    pub course_progress: Vec<CourseProgress>,
    #[serde(rename = "contentProgress", default)]
    pub content_progress: Vec<ContentProgress>,
    /// `None` when the payload carried no activity list at all.
    #[serde(rename = "recentActivity", default)]
    pub recent_activity: Option<Vec<ActivityRecord>>,
}

/// Body of a content progress recording.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ContentProgressUpdate {
    pub completed: bool,
    #[serde(rename = "timeSpent", skip_serializing_if = "Option::is_none")]
    pub time_spent: Option<u32>,
}

impl ContentProgressUpdate {
    pub fn viewed() -> Self {
        Self::default()
    }

    pub fn completed() -> Self {
        Self {
            completed: true,
            time_spent: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityKind {
    Module,
    Content,
    Assignment,
    Course,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityAction {
    Started,
    Completed,
    Viewed,
}

impl std::fmt::Display for ActivityAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActivityAction::Started => write!(f, "started"),
            ActivityAction::Completed => write!(f, "completed"),
            ActivityAction::Viewed => write!(f, "viewed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityRecord {
    #[serde(default)]
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: ActivityKind,
    pub action: ActivityAction,
    #[serde(rename = "itemId")]
    pub item_id: i64,
    #[serde(rename = "courseId", default)]
    pub course_id: Option<i64>,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "itemName", default)]
    pub item_name: String,
    #[serde(rename = "courseName", default)]
    pub course_name: Option<String>,
}

impl ActivityRecord {
    /// "Completed: Variables and Types"
    pub fn summary(&self) -> String {
        let action = self.action.to_string();
        let mut chars = action.chars();
        let action = match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
            None => action,
        };
        format!("{}: {}", action, self.item_name)
    }
}

/// Module completion breakdown for a course.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompletionStatus {
    pub completed: usize,
    pub in_progress: usize,
    pub not_started: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_stage() {
        let mut p: ContentProgress =
            serde_json::from_str(r#"{"contentId": 3}"#).expect("valid progress json");
        assert_eq!(p.stage(), ProgressStage::Unknown);
        p.viewed = true;
        assert_eq!(p.stage(), ProgressStage::Viewed);
        p.completed = true;
        assert_eq!(p.stage(), ProgressStage::Completed);
    }

    #[test]
    fn test_parse_course_progress_with_nested_modules() {
        let json = r#"{"courseId": 4, "totalModules": 2, "completedModules": 1, "percentage": 50,
            "modules": [{"moduleId": 10, "courseId": 4, "completed": true,
                         "contentProgress": [{"contentId": 100, "viewed": true, "completed": true}]}]}"#;
        let cp: CourseProgress = serde_json::from_str(json).expect("valid course progress json");
        assert_eq!(cp.percentage, 50.0);
        let nested = cp.modules[0].content_progress.as_ref().expect("nested content progress");
        assert!(nested[0].completed);
    }

    #[test]
    fn test_activity_summary() {
        let record = ActivityRecord {
            id: 1,
            kind: ActivityKind::Content,
            action: ActivityAction::Completed,
            item_id: 5,
            course_id: Some(1),
            timestamp: Utc::now(),
            item_name: "Loops".to_string(),
            course_name: None,
        };
        assert_eq!(record.summary(), "Completed: Loops");
    }

    #[test]
    fn test_progress_update_body() {
        let body = serde_json::to_value(ContentProgressUpdate::viewed()).expect("serializable");
        assert_eq!(body, serde_json::json!({"completed": false}));
    }
}
