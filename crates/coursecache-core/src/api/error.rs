use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{message} (status {status})")]
    Status { status: u16, message: String },

    #[error("Rate limited - please wait before retrying")]
    RateLimited,

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

const UNKNOWN_ERROR_MESSAGE: &str = "An unknown error occurred";

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    /// Build an error from a non-success response.
    ///
    /// Prefers the server's `{"message": ...}` envelope, then the status
    /// reason phrase, then a generic message.
    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        if status.as_u16() == 429 {
            return ApiError::RateLimited;
        }

        let server_message = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
            .filter(|m| !m.trim().is_empty());

        let message = match server_message {
            Some(m) => Self::truncate_body(&m),
            None => status
                .canonical_reason()
                .map(str::to_string)
                .unwrap_or_else(|| UNKNOWN_ERROR_MESSAGE.to_string()),
        };

        ApiError::Status {
            status: status.as_u16(),
            message,
        }
    }

    /// HTTP-style status code, when the failure came from a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            ApiError::RateLimited => Some(429),
            ApiError::NetworkError(e) => e.status().map(|s| s.as_u16()),
            ApiError::InvalidResponse(_) => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }
}

/// Treat "not found" as "no record yet" for lookups where absence is normal.
pub trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>, ApiError>;
}

impl<T> OptionalExt<T> for Result<T, ApiError> {
    fn optional(self) -> Result<Option<T>, ApiError> {
        match self {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }
}
