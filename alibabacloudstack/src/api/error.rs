use std::time::Duration;
use thiserror::Error;

/// Error codes the platform uses for transient conditions
const RETRYABLE_CODES: &[&str] = &["ServiceUnavailable", "Rejected.Throttling"];

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("{code}: {message} (HTTP {status}, RequestId: {request_id})")]
    Service {
        status: u16,
        code: String,
        message: String,
        request_id: String,
    },

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("No endpoint for {product}: set endpoints.{key} or domain in the provider configuration")]
    NoEndpoint { product: String, key: String },

    #[error("Invalid client configuration: {0}")]
    Config(String),

    #[error("{action} timed out after {}s{}", .timeout.as_secs(), describe_last(.last))]
    Timeout {
        action: String,
        timeout: Duration,
        last: Option<Box<ApiError>>,
    },

    #[error("unexpected state '{state}', wanted {target:?}")]
    UnexpectedState { state: String, target: Vec<String> },

    #[error("operation cancelled")]
    Cancelled,

    #[error("{resource} {action} failed: {source}")]
    Wrapped {
        resource: String,
        action: String,
        #[source]
        source: Box<ApiError>,
    },
}

fn describe_last(last: &Option<Box<ApiError>>) -> String {
    last.as_ref()
        .map(|e| format!(", last error: {}", e))
        .unwrap_or_default()
}

pub type Result<T> = std::result::Result<T, ApiError>;

impl ApiError {
    /// Vendor error code, looking through wrapping
    pub fn code(&self) -> Option<&str> {
        match self {
            ApiError::Service { code, .. } => Some(code),
            ApiError::Wrapped { source, .. } => source.code(),
            _ => None,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Service { status, .. } => Some(*status),
            ApiError::Request(e) => e.status().map(|s| s.as_u16()),
            ApiError::Wrapped { source, .. } => source.status(),
            _ => None,
        }
    }

    /// Action name carried by a wrapped error
    pub fn action(&self) -> Option<&str> {
        match self {
            ApiError::Wrapped { action, .. } | ApiError::Timeout { action, .. } => Some(action),
            _ => None,
        }
    }

    pub fn is_expected(&self, codes: &[&str]) -> bool {
        match self.code() {
            Some(code) => codes.contains(&code),
            None => false,
        }
    }

    /// Generic "object does not exist" detection for codes such as
    /// `InvalidFileSystem.NotFound`, `ResourceNotFound` or `404`
    pub fn is_not_found(&self) -> bool {
        if self.status() == Some(404) {
            return true;
        }
        match self.code() {
            Some(code) => {
                code == "404"
                    || code.ends_with("NotFound")
                    || code.ends_with(".NotExist")
                    || code.ends_with("NotExists")
            }
            None => false,
        }
    }

    /// Transient failures worth another attempt
    pub fn need_retry(&self) -> bool {
        match self {
            ApiError::Request(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            ApiError::Service {
                status,
                code,
                message,
                ..
            } => {
                *status >= 500
                    || RETRYABLE_CODES.contains(&code.as_str())
                    || code.starts_with("Throttling")
                    || message.contains("code: 5")
            }
            ApiError::Wrapped { source, .. } => source.need_retry(),
            _ => false,
        }
    }

    pub fn wrap(self, resource: &str, action: &str) -> ApiError {
        match self {
            ApiError::Wrapped { .. } | ApiError::Cancelled => self,
            other => ApiError::Wrapped {
                resource: resource.to_string(),
                action: action.to_string(),
                source: Box::new(other),
            },
        }
    }
}
