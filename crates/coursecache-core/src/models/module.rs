use serde::{Deserialize, Serialize};

/// Supported kinds of learning material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    #[default]
    Text,
    Pdf,
    Video,
    Quiz,
    Assignment,
    #[serde(other)]
    Other,
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContentType::Text => write!(f, "Text"),
            ContentType::Pdf => write!(f, "PDF"),
            ContentType::Video => write!(f, "Video"),
            ContentType::Quiz => write!(f, "Quiz"),
            ContentType::Assignment => write!(f, "Assignment"),
            ContentType::Other => write!(f, "Other"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Module {
    pub id: i64,
    #[serde(rename = "courseId")]
    pub course_id: i64,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub subtitle: Option<String>,
    /// Display position within the course, 1-based.
    #[serde(default)]
    pub order: u32,
    #[serde(rename = "createdAt", default)]
    pub created_at: Option<String>,
    #[serde(rename = "updatedAt", default)]
    pub updated_at: Option<String>,
    #[serde(rename = "canManage", default)]
    pub can_manage: Option<bool>,
    #[serde(default)]
    pub locked: Option<bool>,
    #[serde(default)]
    pub progress: Option<f64>,

    // Derived from the locally loaded content bucket
    #[serde(rename = "contentCount", default)]
    pub content_count: Option<u32>,
    /// Total duration in minutes.
    #[serde(default)]
    pub duration: Option<u32>,
    #[serde(rename = "contentItems", default)]
    pub content_items: Option<Vec<ContentItem>>,
}

impl Module {
    /// Shallow merge of a freshly fetched module over this one.
    ///
    /// Remote-authoritative fields are always overwritten. The content
    /// aggregates (`content_count`, `duration`, `content_items`) are kept:
    /// the cache only merges this way once the module's content is loaded
    /// locally, and the aggregates are then derived from that content.
    pub fn absorb_remote(&mut self, remote: Module) {
        // Remote-authoritative
        self.id = remote.id;
        self.course_id = remote.course_id;
        self.title = remote.title;
        self.description = remote.description;
        self.subtitle = remote.subtitle;
        self.order = remote.order;
        self.created_at = remote.created_at;
        self.updated_at = remote.updated_at;
        self.can_manage = remote.can_manage;
        self.locked = remote.locked;
        self.progress = remote.progress;
    }

    /// "1h 05m", "45m", or "-" when unknown
    pub fn formatted_duration(&self) -> String {
        match self.duration {
            Some(minutes) if minutes >= 60 => format!("{}h {:02}m", minutes / 60, minutes % 60),
            Some(minutes) => format!("{}m", minutes),
            None => "-".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: i64,
    #[serde(rename = "moduleId")]
    pub module_id: i64,
    pub title: String,
    #[serde(rename = "contentType", default)]
    pub content_type: ContentType,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(rename = "contentUrl", default)]
    pub content_url: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Minutes; missing counts as zero in aggregates.
    #[serde(default)]
    pub duration: Option<u32>,
    #[serde(rename = "createdBy", default)]
    pub created_by: Option<i64>,
    #[serde(rename = "createdAt", default)]
    pub created_at: Option<String>,
    #[serde(rename = "updatedAt", default)]
    pub updated_at: Option<String>,
    #[serde(rename = "dueDate", default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub points: Option<u32>,
    #[serde(rename = "assignmentId", default)]
    pub assignment_id: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ModuleDraft {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub order: u32,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ModuleUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ContentDraft {
    pub title: String,
    #[serde(rename = "contentType")]
    pub content_type: ContentType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(rename = "contentUrl", skip_serializing_if = "Option::is_none")]
    pub content_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ContentUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(rename = "contentType", skip_serializing_if = "Option::is_none")]
    pub content_type: Option<ContentType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(rename = "contentUrl", skip_serializing_if = "Option::is_none")]
    pub content_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn module(json: &str) -> Module {
        serde_json::from_str(json).expect("valid module json")
    }

    #[test]
    fn test_unknown_content_type_is_other() {
        let item: ContentItem = serde_json::from_str(
            r#"{"id": 1, "moduleId": 2, "title": "Slides", "contentType": "slideshow"}"#,
        )
        .expect("valid content json");
        assert_eq!(item.content_type, ContentType::Other);
        assert_eq!(item.duration, None);
    }

    #[test]
    fn test_absorb_remote_keeps_loaded_aggregates() {
        let mut local = module(r#"{"id": 1, "courseId": 9, "title": "Old", "order": 1}"#);
        local.content_count = Some(4);
        local.duration = Some(18);
        local.content_items = Some(Vec::new());

        let remote = module(
            r#"{"id": 1, "courseId": 9, "title": "New", "order": 2, "contentCount": 1, "duration": 99}"#,
        );
        local.absorb_remote(remote);

        assert_eq!(local.title, "New");
        assert_eq!(local.order, 2);
        assert_eq!(local.content_count, Some(4));
        assert_eq!(local.duration, Some(18));
    }

    #[test]
    fn test_absorb_remote_keeps_aggregates_without_embedded_content() {
        let mut local = module(r#"{"id": 1, "courseId": 9, "title": "Old"}"#);
        local.content_count = Some(0);
        local.duration = Some(0);
        let remote = module(r#"{"id": 1, "courseId": 9, "title": "Old", "contentCount": 3, "duration": 30}"#);
        local.absorb_remote(remote);
        assert_eq!(local.content_count, Some(0));
        assert_eq!(local.duration, Some(0));
    }

    #[test]
    fn test_formatted_duration() {
        let mut m = module(r#"{"id": 1, "courseId": 9, "title": "M"}"#);
        assert_eq!(m.formatted_duration(), "-");
        m.duration = Some(45);
        assert_eq!(m.formatted_duration(), "45m");
        m.duration = Some(65);
        assert_eq!(m.formatted_duration(), "1h 05m");
    }
}
