use serde::{Deserialize, Serialize};

/// Role a user holds within a single course.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnrollmentRole {
    Student,
    Teacher,
}

impl std::fmt::Display for EnrollmentRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EnrollmentRole::Student => write!(f, "student"),
            EnrollmentRole::Teacher => write!(f, "teacher"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub id: i64,
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub schedule: String,
    #[serde(rename = "createdBy", default)]
    pub created_by: Option<i64>,
    #[serde(rename = "createdAt", default)]
    pub created_at: Option<String>,
    #[serde(rename = "updatedAt", default)]
    pub updated_at: Option<String>,

    // Per-user view fields supplied by the server
    #[serde(default)]
    pub role: Option<EnrollmentRole>,
    #[serde(rename = "canManage", default)]
    pub can_manage: Option<bool>,
    #[serde(default)]
    pub progress: Option<f64>,

    // Counts: adjusted locally between full fetches
    #[serde(rename = "studentCount", default)]
    pub student_count: Option<u32>,
    #[serde(rename = "teacherCount", default)]
    pub teacher_count: Option<u32>,
    #[serde(rename = "moduleCount", default)]
    pub module_count: Option<u32>,
    #[serde(rename = "assignmentCount", default)]
    pub assignment_count: Option<u32>,
}

impl Course {
    /// "CS101 - Intro to Programming"
    pub fn display_title(&self) -> String {
        if self.code.is_empty() {
            self.name.clone()
        } else {
            format!("{} - {}", self.code, self.name)
        }
    }

    /// Case-insensitive match against name, code and description.
    pub fn matches(&self, term: &str) -> bool {
        let term = term.trim().to_lowercase();
        if term.is_empty() {
            return true;
        }
        self.name.to_lowercase().contains(&term)
            || self.code.to_lowercase().contains(&term)
            || self.description.to_lowercase().contains(&term)
    }

    pub(crate) fn adjust_count(&mut self, role: EnrollmentRole, delta: i32) {
        let slot = match role {
            EnrollmentRole::Student => &mut self.student_count,
            EnrollmentRole::Teacher => &mut self.teacher_count,
        };
        let current = slot.unwrap_or(0) as i64;
        *slot = Some((current + delta as i64).max(0) as u32);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseEnrollment {
    #[serde(default)]
    pub id: i64,
    #[serde(rename = "courseId")]
    pub course_id: i64,
    #[serde(rename = "userId")]
    pub user_id: i64,
    pub role: EnrollmentRole,
    #[serde(rename = "enrollmentDate", default)]
    pub enrollment_date: Option<String>,
    #[serde(rename = "userName", default)]
    pub user_name: Option<String>,
    #[serde(rename = "userEmail", default)]
    pub user_email: Option<String>,
}

/// Body of a course creation request.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CourseDraft {
    pub code: String,
    pub name: String,
    pub description: String,
    pub schedule: String,
}

/// Partial course update; absent fields are left untouched by the server.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CourseUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedule: Option<String>,
}
