//! HTTP client for the learning-platform REST API.
//!
//! This module provides the `ApiClient` struct, the production
//! implementation of [`RemoteApi`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client, RequestBuilder};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use crate::config::Config;
use crate::models::{
    Assignment, AssignmentDraft, AssignmentUpdate, ContentDraft, ContentItem, ContentProgress,
    ContentProgressUpdate, ContentUpdate, Course, CourseDraft, CourseEnrollment, CourseProgress,
    CourseUpdate, EnrollmentRole, Module, ModuleDraft, ModuleProgress, ModuleUpdate, Submission,
    SubmissionDraft, UserProgress,
};

use super::{ApiError, RemoteApi};

// ============================================================================
// Constants
// ============================================================================

/// Maximum number of retries for rate-limited (429) requests.
/// 3 retries with exponential backoff usually succeeds without excessive delay.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

/// API client for the learning platform.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: Arc<str>,
    token: Option<Arc<str>>,
}

impl ApiClient {
    /// Create a new API client
    pub fn new(config: &Config) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: Arc::from(config.api_base_url.trim_end_matches('/')),
            token: None,
        })
    }

    /// Set the bearer token for authenticated requests
    pub fn set_token(&mut self, token: impl Into<Arc<str>>) {
        self.token = Some(token.into());
    }

    /// Create a new ApiClient with the given token, sharing the connection pool.
    pub fn with_token(&self, token: impl Into<Arc<str>>) -> Self {
        Self {
            client: self.client.clone(), // Cheap clone, shares connection pool
            base_url: Arc::clone(&self.base_url),
            token: Some(token.into()),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn auth_headers(&self) -> Result<header::HeaderMap, ApiError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(header::ACCEPT, header::HeaderValue::from_static("application/json"));
        if let Some(ref token) = self.token {
            let value = header::HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| ApiError::InvalidResponse(format!("invalid token header: {}", e)))?;
            headers.insert(header::AUTHORIZATION, value);
        }
        Ok(headers)
    }

    /// Check if response is successful, returning an error with body if not.
    /// Returns Ok(Some(response)) for success, Ok(None) for rate limit (should retry),
    /// or Err for other errors.
    async fn check_response_for_retry(
        response: reqwest::Response,
    ) -> Result<Option<reqwest::Response>, ApiError> {
        if response.status().is_success() {
            Ok(Some(response))
        } else if response.status().as_u16() == 429 {
            // Rate limited - signal to retry
            Ok(None)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    /// Send a request, retrying on rate limiting with exponential backoff.
    async fn execute<F>(&self, method: &str, url: &str, build: F) -> Result<reqwest::Response, ApiError>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            debug!(method = method, url = url, "Sending request");
            let response = build().headers(self.auth_headers()?).send().await?;

            match Self::check_response_for_retry(response).await? {
                Some(response) => return Ok(response),
                None => {
                    retries += 1;
                    if retries > MAX_RATE_LIMIT_RETRIES {
                        return Err(ApiError::RateLimited);
                    }
                    warn!(url = url, retry = retries, backoff_ms = backoff_ms, "Rate limited, backing off");
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms *= 2; // Exponential backoff
                }
            }
        }
    }

    async fn parse<T: DeserializeOwned>(url: &str, response: reqwest::Response) -> Result<T, ApiError> {
        let text = response.text().await?;
        serde_json::from_str(&text)
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse JSON from {}: {}", url, e)))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let url = self.url(path);
        let response = self.execute("GET", &url, || self.client.get(&url)).await?;
        Self::parse(&url, response).await
    }

    async fn get_with_query<T: DeserializeOwned, Q: Serialize>(&self, path: &str, query: &Q) -> Result<T, ApiError> {
        let url = self.url(path);
        let response = self
            .execute("GET", &url, || self.client.get(&url).query(query))
            .await?;
        Self::parse(&url, response).await
    }

    async fn post<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T, ApiError> {
        let url = self.url(path);
        let response = self
            .execute("POST", &url, || self.client.post(&url).json(body))
            .await?;
        Self::parse(&url, response).await
    }

    /// POST with an empty JSON body, for action endpoints.
    async fn post_action<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.post(path, &serde_json::json!({})).await
    }

    /// POST whose response body is ignored.
    async fn post_ack(&self, path: &str) -> Result<(), ApiError> {
        let url = self.url(path);
        self.execute("POST", &url, || self.client.post(&url).json(&serde_json::json!({})))
            .await?;
        Ok(())
    }

    async fn put<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T, ApiError> {
        let url = self.url(path);
        let response = self
            .execute("PUT", &url, || self.client.put(&url).json(body))
            .await?;
        Self::parse(&url, response).await
    }

    async fn delete(&self, path: &str) -> Result<(), ApiError> {
        let url = self.url(path);
        self.execute("DELETE", &url, || self.client.delete(&url)).await?;
        Ok(())
    }
}

#[async_trait]
impl RemoteApi for ApiClient {
    // ===== Courses =====

    async fn list_courses(&self) -> Result<Vec<Course>, ApiError> {
        self.get("/api/courses").await
    }

    async fn list_enrolled_courses(&self) -> Result<Vec<Course>, ApiError> {
        self.get_with_query("/api/courses", &[("enrolled", "true")]).await
    }

    async fn get_course(&self, id: i64) -> Result<Course, ApiError> {
        self.get(&format!("/api/courses/{}", id)).await
    }

    async fn create_course(&self, draft: &CourseDraft) -> Result<Course, ApiError> {
        self.post("/api/courses", draft).await
    }

    async fn update_course(&self, id: i64, update: &CourseUpdate) -> Result<Course, ApiError> {
        self.put(&format!("/api/courses/{}", id), update).await
    }

    async fn delete_course(&self, id: i64) -> Result<(), ApiError> {
        self.delete(&format!("/api/courses/{}", id)).await
    }

    async fn list_enrollments(&self, course_id: i64) -> Result<Vec<CourseEnrollment>, ApiError> {
        self.get(&format!("/api/courses/{}/enrollments", course_id)).await
    }

    async fn enroll_user(
        &self,
        course_id: i64,
        user_id: i64,
        role: EnrollmentRole,
    ) -> Result<CourseEnrollment, ApiError> {
        let body = serde_json::json!({
            "courseId": course_id,
            "userId": user_id,
            "role": role,
        });
        self.post(&format!("/api/courses/{}/enrollments", course_id), &body).await
    }

    async fn unenroll_user(&self, course_id: i64, user_id: i64) -> Result<(), ApiError> {
        self.delete(&format!("/api/courses/{}/enrollments/{}", course_id, user_id))
            .await
    }

    // ===== Modules =====

    async fn list_modules(&self, course_id: i64) -> Result<Vec<Module>, ApiError> {
        self.get(&format!("/api/courses/{}/modules", course_id)).await
    }

    async fn get_module(&self, id: i64) -> Result<Module, ApiError> {
        self.get(&format!("/api/modules/{}", id)).await
    }

    async fn create_module(&self, course_id: i64, draft: &ModuleDraft) -> Result<Module, ApiError> {
        let mut body = serde_json::to_value(draft)
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to encode module: {}", e)))?;
        body["courseId"] = serde_json::json!(course_id);
        self.post(&format!("/api/courses/{}/modules", course_id), &body).await
    }

    async fn update_module(&self, id: i64, update: &ModuleUpdate) -> Result<Module, ApiError> {
        self.put(&format!("/api/modules/{}", id), update).await
    }

    async fn delete_module(&self, id: i64) -> Result<(), ApiError> {
        self.delete(&format!("/api/modules/{}", id)).await
    }

    async fn reorder_modules(&self, course_id: i64, module_ids: &[i64]) -> Result<Vec<Module>, ApiError> {
        let body = serde_json::json!({ "moduleIds": module_ids });
        self.put(&format!("/api/courses/{}/modules/reorder", course_id), &body).await
    }

    // ===== Content =====

    async fn list_content(&self, module_id: i64) -> Result<Vec<ContentItem>, ApiError> {
        self.get(&format!("/api/modules/{}/content", module_id)).await
    }

    async fn get_content(&self, id: i64) -> Result<ContentItem, ApiError> {
        self.get(&format!("/api/content/{}", id)).await
    }

    async fn create_content(&self, module_id: i64, draft: &ContentDraft) -> Result<ContentItem, ApiError> {
        let mut body = serde_json::to_value(draft)
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to encode content: {}", e)))?;
        body["moduleId"] = serde_json::json!(module_id);
        self.post(&format!("/api/modules/{}/content", module_id), &body).await
    }

    async fn update_content(&self, id: i64, update: &ContentUpdate) -> Result<ContentItem, ApiError> {
        self.put(&format!("/api/content/{}", id), update).await
    }

    async fn delete_content(&self, id: i64) -> Result<(), ApiError> {
        self.delete(&format!("/api/content/{}", id)).await
    }

    // ===== Progress =====

    async fn get_user_progress(&self, user_id: i64) -> Result<UserProgress, ApiError> {
        self.get(&format!("/api/users/{}/progress", user_id)).await
    }

    async fn get_course_progress(&self, course_id: i64, user_id: i64) -> Result<CourseProgress, ApiError> {
        self.get(&format!("/api/courses/{}/progress/{}", course_id, user_id)).await
    }

    async fn get_module_progress(&self, module_id: i64, user_id: i64) -> Result<ModuleProgress, ApiError> {
        self.get(&format!("/api/modules/{}/progress/{}", module_id, user_id)).await
    }

    async fn mark_module_completed(&self, module_id: i64) -> Result<ModuleProgress, ApiError> {
        self.post_action(&format!("/api/modules/{}/progress/complete", module_id))
            .await
    }

    async fn mark_module_incomplete(&self, module_id: i64) -> Result<ModuleProgress, ApiError> {
        self.post_action(&format!("/api/modules/{}/progress/incomplete", module_id))
            .await
    }

    async fn record_content_progress(
        &self,
        content_id: i64,
        update: ContentProgressUpdate,
    ) -> Result<ContentProgress, ApiError> {
        self.post(&format!("/api/content/{}/progress", content_id), &update)
            .await
    }

    async fn record_course_started(&self, course_id: i64) -> Result<(), ApiError> {
        self.post_ack(&format!("/api/courses/{}/progress/start", course_id)).await
    }

    async fn record_assignment_submission(&self, assignment_id: i64) -> Result<(), ApiError> {
        self.post_ack(&format!("/api/assignments/{}/progress/submit", assignment_id))
            .await
    }

    async fn reset_course_progress(&self, course_id: i64, user_id: i64) -> Result<(), ApiError> {
        self.delete(&format!("/api/courses/{}/progress/{}", course_id, user_id)).await
    }

    // ===== Assignments =====

    async fn list_assignments(&self, course_id: i64) -> Result<Vec<Assignment>, ApiError> {
        self.get(&format!("/api/courses/{}/assignments", course_id)).await
    }

    async fn get_assignment(&self, id: i64) -> Result<Assignment, ApiError> {
        self.get(&format!("/api/assignments/{}", id)).await
    }

    async fn create_assignment(&self, draft: &AssignmentDraft) -> Result<Assignment, ApiError> {
        self.post(&format!("/api/courses/{}/assignments", draft.course_id), draft)
            .await
    }

    async fn update_assignment(&self, id: i64, update: &AssignmentUpdate) -> Result<Assignment, ApiError> {
        self.put(&format!("/api/assignments/{}", id), update).await
    }

    async fn delete_assignment(&self, id: i64) -> Result<(), ApiError> {
        self.delete(&format!("/api/assignments/{}", id)).await
    }

    async fn list_submissions(&self, assignment_id: i64) -> Result<Vec<Submission>, ApiError> {
        self.get(&format!("/api/assignments/{}/submissions", assignment_id)).await
    }

    async fn get_user_submission(&self, assignment_id: i64, user_id: i64) -> Result<Submission, ApiError> {
        self.get(&format!("/api/assignments/{}/submissions/{}", assignment_id, user_id))
            .await
    }

    async fn submit_assignment(&self, draft: &SubmissionDraft) -> Result<Submission, ApiError> {
        self.post(&format!("/api/assignments/{}/submissions", draft.assignment_id), draft)
            .await
    }

    async fn grade_submission(&self, submission_id: i64, grade: f64) -> Result<Submission, ApiError> {
        let body = serde_json::json!({ "submissionId": submission_id, "grade": grade });
        self.put(&format!("/api/submissions/{}/grade", submission_id), &body).await
    }
}
