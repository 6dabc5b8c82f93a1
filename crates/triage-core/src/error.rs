//! Error types for the triage engine

/// Result type alias using the triage Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for triage operations
///
/// Classification itself never fails; only engine construction and
/// configuration loading surface errors to callers.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Classifier construction errors
    #[error("classifier error: {0}")]
    Classifier(String),

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Create a new classifier error
    pub fn classifier(msg: impl Into<String>) -> Self {
        Self::Classifier(msg.into())
    }

    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::config("cache ttl must be positive");
        assert_eq!(err.to_string(), "configuration error: cache ttl must be positive");

        let err = Error::classifier("bad keyword pattern");
        assert_eq!(err.to_string(), "classifier error: bad keyword pattern");
    }

    #[test]
    fn test_error_converts_to_anyhow() {
        let err: anyhow::Error = Error::config("retry.max_attempts must be at least 1").into();
        assert!(err.to_string().contains("max_attempts"));
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::Config(_))));
    }
}
