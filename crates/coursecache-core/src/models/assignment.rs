use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub id: i64,
    #[serde(rename = "courseId")]
    pub course_id: i64,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "dueDate")]
    pub due_date: String,
    #[serde(rename = "createdBy", default)]
    pub created_by: Option<i64>,
    #[serde(rename = "createdAt", default)]
    pub created_at: Option<String>,
    #[serde(rename = "updatedAt", default)]
    pub updated_at: Option<String>,
    #[serde(rename = "creatorName", default)]
    pub creator_name: Option<String>,
    #[serde(rename = "isSubmitted", default)]
    pub is_submitted: Option<bool>,
    #[serde(rename = "canManage", default)]
    pub can_manage: Option<bool>,
    #[serde(rename = "submissionCount", default)]
    pub submission_count: Option<u32>,
}

impl Assignment {
    /// Parsed due date; `None` if the server sent something that is not RFC 3339.
    pub fn due_at(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.due_date)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }

    pub fn formatted_due_date(&self) -> String {
        match self.due_at() {
            Some(dt) => dt.format("%b %d, %Y").to_string(),
            // Fall back to raw date string
            None => self.due_date.chars().take(10).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub id: i64,
    #[serde(rename = "assignmentId")]
    pub assignment_id: i64,
    #[serde(rename = "userId")]
    pub user_id: i64,
    #[serde(rename = "submissionUrl")]
    pub submission_url: String,
    #[serde(rename = "submittedAt", default)]
    pub submitted_at: Option<String>,
    #[serde(default)]
    pub grade: Option<f64>,
    #[serde(rename = "gradedBy", default)]
    pub graded_by: Option<i64>,
    #[serde(rename = "gradedAt", default)]
    pub graded_at: Option<String>,
    #[serde(default)]
    pub feedback: Option<String>,
    #[serde(rename = "studentName", default)]
    pub student_name: Option<String>,
}

impl Submission {
    pub fn is_graded(&self) -> bool {
        self.grade.is_some()
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AssignmentDraft {
    #[serde(rename = "courseId")]
    pub course_id: i64,
    pub title: String,
    pub description: String,
    #[serde(rename = "dueDate")]
    pub due_date: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AssignmentUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "dueDate", skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmissionDraft {
    #[serde(rename = "assignmentId")]
    pub assignment_id: i64,
    #[serde(rename = "submissionUrl")]
    pub submission_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_due_date_parsing() {
        let a: Assignment = serde_json::from_str(
            r#"{"id": 1, "courseId": 2, "title": "Essay", "dueDate": "2026-03-01T17:00:00Z"}"#,
        )
        .expect("valid assignment json");
        assert!(a.due_at().is_some());
        assert_eq!(a.formatted_due_date(), "Mar 01, 2026");

        let raw = Assignment {
            due_date: "2026-03-01 whenever".to_string(),
            ..a
        };
        assert!(raw.due_at().is_none());
        assert_eq!(raw.formatted_due_date(), "2026-03-01");
    }
}
