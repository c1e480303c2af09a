use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum TrendError {
    /// More keywords in one call than the configured ceiling
    #[error("Too many keywords: {requested} requested, at most {max} allowed")]
    TooManyKeywords { requested: usize, max: usize },

    /// Keyword empty after trimming or longer than the allowed length
    #[error("Invalid keyword: {0}")]
    InvalidKeyword(String),

    /// Retention string that could not be parsed (CLI / config input)
    #[error("Invalid retention: {0}")]
    InvalidRetention(String),

    /// Search call exceeded its deadline
    #[error("Timeout Error: {0}")]
    Timeout(String),

    /// Search provider returned an error status or an unusable body
    #[error("Provider Error: {0}")]
    ProviderError(String),

    /// Cache backend errors (Redis or in-process)
    #[error("Cache Error: {0}")]
    CacheError(String),

    /// Unparseable payloads (cached records, provider envelopes)
    #[error("Parse Error: {0}")]
    ParseError(String),

    /// Configuration errors
    #[error("Config Error: {0}")]
    ConfigError(String),
}

impl From<serde_json::Error> for TrendError {
    fn from(err: serde_json::Error) -> Self {
        TrendError::ParseError(format!("JSON serialization/deserialization error: {}", err))
    }
}

impl From<redis::RedisError> for TrendError {
    fn from(err: redis::RedisError) -> Self {
        TrendError::CacheError(format!("Redis error: {}", err))
    }
}

impl From<reqwest::Error> for TrendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TrendError::Timeout(format!("Search request timed out: {}", err))
        } else {
            TrendError::ProviderError(format!("Search request failed: {}", err))
        }
    }
}

impl TrendError {
    /// Caller errors are the only errors that cross the orchestrator boundary.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            TrendError::TooManyKeywords { .. }
                | TrendError::InvalidKeyword(_)
                | TrendError::InvalidRetention(_)
        )
    }

    /// Categorizes error for logging
    pub fn categorize(&self) -> ErrorCategory {
        match self {
            TrendError::TooManyKeywords { .. }
            | TrendError::InvalidKeyword(_)
            | TrendError::InvalidRetention(_) => ErrorCategory::Caller,
            TrendError::Timeout(_) | TrendError::ProviderError(_) => ErrorCategory::Network,
            TrendError::ParseError(_) => ErrorCategory::Data,
            TrendError::CacheError(_) => ErrorCategory::Infrastructure,
            TrendError::ConfigError(_) => ErrorCategory::Configuration,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ErrorCategory {
    Caller,
    Network,
    Data,
    Infrastructure,
    Configuration,
}

pub type Result<T> = std::result::Result<T, TrendError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caller_errors_are_categorized() {
        let err = TrendError::TooManyKeywords {
            requested: 12,
            max: 10,
        };
        assert!(err.is_caller_error());
        assert_eq!(err.categorize(), ErrorCategory::Caller);
        assert_eq!(
            err.to_string(),
            "Too many keywords: 12 requested, at most 10 allowed"
        );
    }

    #[test]
    fn fetch_errors_stay_inside_the_core() {
        let timeout = TrendError::Timeout("25s elapsed".to_string());
        assert!(!timeout.is_caller_error());
        assert_eq!(timeout.categorize(), ErrorCategory::Network);

        let cache = TrendError::CacheError("connection refused".to_string());
        assert_eq!(cache.categorize(), ErrorCategory::Infrastructure);
    }

    #[test]
    fn serde_errors_become_parse_errors() {
        let err = serde_json::from_str::<Vec<String>>("[\"open").unwrap_err();
        let converted: TrendError = err.into();
        assert!(matches!(converted, TrendError::ParseError(_)));
    }
}
