//! External classifier trait and common types

use async_trait::async_trait;
use regex::Regex;
use std::sync::OnceLock;
use triage_core::{ClassificationRequest, Priority};

/// Trait for external priority classification services
#[async_trait]
pub trait ExternalClassifier: Send + Sync {
    /// Classify the given request with a single call
    async fn classify(
        &self,
        request: &ClassificationRequest,
    ) -> Result<ServiceVerdict, ServiceError>;

    /// Get the classifier name
    fn name(&self) -> &str;
}

/// Validated decision returned by the service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceVerdict {
    /// Priority within the fixed enumeration
    pub priority: Priority,

    /// Explanation given by the service
    pub reason: String,
}

const MISSING_REASON: &str = "no reason provided";

impl ServiceVerdict {
    /// Create a new verdict
    pub fn new(priority: Priority, reason: impl Into<String>) -> Self {
        Self {
            priority,
            reason: reason.into(),
        }
    }

    /// Validate a `{priority, reason}` JSON document.
    ///
    /// A priority outside `Low | Medium | High` is an invalid response; any
    /// reason text found is carried on the error.
    pub fn from_json(raw: &str) -> Result<Self, ServiceError> {
        let value: serde_json::Value =
            serde_json::from_str(strip_code_fence(raw)).map_err(|e| {
                ServiceError::invalid_response(format!("decision is not JSON: {}", e), None)
            })?;

        let object = value
            .as_object()
            .ok_or_else(|| ServiceError::invalid_response("decision is not a JSON object", None))?;

        let reason = object
            .get("reason")
            .and_then(|r| r.as_str())
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(str::to_string);

        let priority = match object.get("priority") {
            Some(serde_json::Value::String(label)) => label.parse::<Priority>().map_err(|_| {
                ServiceError::invalid_response(
                    format!("priority {:?} outside enumeration", label),
                    reason.clone(),
                )
            })?,
            Some(other) => {
                return Err(ServiceError::invalid_response(
                    format!("priority has unexpected type: {}", other),
                    reason,
                ))
            }
            None => {
                return Err(ServiceError::invalid_response("priority missing", reason));
            }
        };

        Ok(Self {
            priority,
            reason: reason.unwrap_or_else(|| MISSING_REASON.to_string()),
        })
    }
}

/// Models sometimes wrap JSON in a markdown fence
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}

/// Failure of a call to the classification service
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
    /// Upstream signalled throttling or quota exhaustion
    #[error("rate limited: {message}")]
    RateLimited { message: String },

    /// Response did not match the decision schema
    #[error("invalid response: {message}")]
    InvalidResponse {
        message: String,
        reason: Option<String>,
    },

    /// Network, status or any other failure
    #[error("service error: {message}")]
    Other { message: String },
}

impl ServiceError {
    /// Create a rate-limit error
    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::RateLimited {
            message: message.into(),
        }
    }

    /// Create an invalid-response error, keeping any reason prose
    pub fn invalid_response(message: impl Into<String>, reason: Option<String>) -> Self {
        Self::InvalidResponse {
            message: message.into(),
            reason,
        }
    }

    /// Create a generic error
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
        }
    }

    /// True for throttling, either by variant or by message pattern
    pub fn is_rate_limited(&self) -> bool {
        match self {
            Self::RateLimited { .. } => true,
            Self::Other { message } => looks_rate_limited(message),
            Self::InvalidResponse { .. } => false,
        }
    }

    /// Convert a throttling error into the `RateLimited` variant
    pub fn into_rate_limited(self) -> Self {
        match self {
            Self::RateLimited { .. } => self,
            other => Self::rate_limited(other.to_string()),
        }
    }

    /// Reason text salvaged from an invalid response
    pub fn partial_reason(&self) -> Option<&str> {
        match self {
            Self::InvalidResponse { reason, .. } => reason.as_deref(),
            _ => None,
        }
    }

    /// Short label for metrics
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RateLimited { .. } => "rate_limited",
            Self::InvalidResponse { .. } => "invalid_response",
            Self::Other { .. } => "other",
        }
    }
}

/// Match quota and throttling wording in upstream error messages
pub fn looks_rate_limited(message: &str) -> bool {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(
                r"(?i)(rate[ _-]?limit|too many requests|quota|resource[ _-]?exhausted|\b429\b)",
            )
            .expect("rate limit pattern must compile")
        })
        .is_match(message)
}
