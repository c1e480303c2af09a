use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Which `KeyStore` backend the binary wires up at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheBackendKind {
    Memory,
    Redis,
}

impl FromStr for CacheBackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" | "in-memory" | "local" => Ok(CacheBackendKind::Memory),
            "redis" => Ok(CacheBackendKind::Redis),
            other => Err(format!("unknown cache backend '{}'", other)),
        }
    }
}

impl fmt::Display for CacheBackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheBackendKind::Memory => write!(f, "memory"),
            CacheBackendKind::Redis => write!(f, "redis"),
        }
    }
}

#[derive(Clone)]
pub struct Config {
    pub max_keywords: usize,
    pub min_results_per_keyword: usize,
    pub max_results_per_keyword: usize,
    pub default_cache_duration_hours: u64,
    pub keyword_timeout_ms: u64,
    pub batch_timeout_ms: u64,
    pub cache_backend: CacheBackendKind,
    pub redis_url: String,
    pub cache_sweep_interval_secs: Option<u64>,
    pub cache_key_prefix: String,
    pub search_api_url: String,
    pub search_api_key: Option<String>,
    pub search_model: String,
    pub batch_max_total_topics: usize,
    pub batch_max_estimated_tokens: usize,
    pub batch_max_keywords: usize,
    pub batch_tokens_per_topic: usize,
    pub log_level: Option<String>,
}

// Manual Debug so the API key never reaches the logs
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("max_keywords", &self.max_keywords)
            .field("min_results_per_keyword", &self.min_results_per_keyword)
            .field("max_results_per_keyword", &self.max_results_per_keyword)
            .field("default_cache_duration_hours", &self.default_cache_duration_hours)
            .field("keyword_timeout_ms", &self.keyword_timeout_ms)
            .field("batch_timeout_ms", &self.batch_timeout_ms)
            .field("cache_backend", &self.cache_backend)
            .field("redis_url", &self.redis_url)
            .field("cache_sweep_interval_secs", &self.cache_sweep_interval_secs)
            .field("cache_key_prefix", &self.cache_key_prefix)
            .field("search_api_url", &self.search_api_url)
            .field(
                "search_api_key",
                &self.search_api_key.as_ref().map(|_| "<redacted>"),
            )
            .field("search_model", &self.search_model)
            .field("batch_max_total_topics", &self.batch_max_total_topics)
            .field("batch_max_estimated_tokens", &self.batch_max_estimated_tokens)
            .field("batch_max_keywords", &self.batch_max_keywords)
            .field("batch_tokens_per_topic", &self.batch_tokens_per_topic)
            .field("log_level", &self.log_level)
            .finish()
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Self {
        Config {
            max_keywords: env_or("MAX_KEYWORDS", 10),
            min_results_per_keyword: env_or("MIN_RESULTS_PER_KEYWORD", 1),
            max_results_per_keyword: env_or("MAX_RESULTS_PER_KEYWORD", 10),
            default_cache_duration_hours: env_or("DEFAULT_CACHE_DURATION_HOURS", 2),
            keyword_timeout_ms: env_or("KEYWORD_TIMEOUT_MS", 25_000),
            batch_timeout_ms: env_or("BATCH_TIMEOUT_MS", 45_000),
            cache_backend: env::var("CACHE_BACKEND")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(CacheBackendKind::Memory),
            redis_url: env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost".to_string()),
            cache_sweep_interval_secs: env::var("CACHE_SWEEP_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .or(Some(300))
                .filter(|secs| *secs > 0),
            cache_key_prefix: env::var("CACHE_KEY_PREFIX")
                .unwrap_or_else(|_| "trending".to_string()),
            search_api_url: env::var("SEARCH_API_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1/chat/completions".to_string()),
            search_api_key: env::var("SEARCH_API_KEY").ok().filter(|k| !k.is_empty()),
            search_model: env::var("SEARCH_MODEL")
                .unwrap_or_else(|_| "gpt-4o-mini-search-preview".to_string()),
            batch_max_total_topics: env_or("BATCH_MAX_TOTAL_TOPICS", 12),
            batch_max_estimated_tokens: env_or("BATCH_MAX_ESTIMATED_TOKENS", 2000),
            batch_max_keywords: env_or("BATCH_MAX_KEYWORDS", 3),
            batch_tokens_per_topic: env_or("BATCH_TOKENS_PER_TOPIC", 100),
            log_level: env::var("LOG_LEVEL").ok(),
        }
    }

    /// Defaults with no environment lookups; used by tests.
    pub fn test_default() -> Self {
        Config {
            max_keywords: 10,
            min_results_per_keyword: 1,
            max_results_per_keyword: 10,
            default_cache_duration_hours: 2,
            keyword_timeout_ms: 25_000,
            batch_timeout_ms: 45_000,
            cache_backend: CacheBackendKind::Memory,
            redis_url: "redis://127.0.0.1/".to_string(),
            cache_sweep_interval_secs: None,
            cache_key_prefix: "trending".to_string(),
            search_api_url: "http://127.0.0.1:0/v1/chat/completions".to_string(),
            search_api_key: None,
            search_model: "test-model".to_string(),
            batch_max_total_topics: 12,
            batch_max_estimated_tokens: 2000,
            batch_max_keywords: 3,
            batch_tokens_per_topic: 100,
            log_level: None,
        }
    }

    pub fn keyword_timeout(&self) -> Duration {
        Duration::from_millis(self.keyword_timeout_ms)
    }

    pub fn batch_timeout(&self) -> Duration {
        Duration::from_millis(self.batch_timeout_ms)
    }

    pub fn default_cache_ttl_secs(&self) -> u64 {
        self.default_cache_duration_hours * 3600
    }

    /// Checks cross-field constraints; returns the first violation found.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_keywords == 0 {
            return Err("MAX_KEYWORDS must be at least 1".to_string());
        }
        if self.min_results_per_keyword == 0 {
            return Err("MIN_RESULTS_PER_KEYWORD must be at least 1".to_string());
        }
        if self.min_results_per_keyword > self.max_results_per_keyword {
            return Err(format!(
                "MIN_RESULTS_PER_KEYWORD ({}) exceeds MAX_RESULTS_PER_KEYWORD ({})",
                self.min_results_per_keyword, self.max_results_per_keyword
            ));
        }
        if self.default_cache_duration_hours == 0 {
            return Err("DEFAULT_CACHE_DURATION_HOURS must be at least 1".to_string());
        }
        if self.keyword_timeout_ms == 0 || self.batch_timeout_ms == 0 {
            return Err("search timeouts must be non-zero".to_string());
        }
        if self.cache_backend == CacheBackendKind::Redis && self.redis_url.is_empty() {
            return Err("REDIS_URL cannot be empty when CACHE_BACKEND=redis".to_string());
        }
        if self.cache_key_prefix.is_empty() {
            return Err("CACHE_KEY_PREFIX cannot be empty".to_string());
        }
        Ok(())
    }

    pub fn validate_and_log(&self) {
        log::info!("Application Configuration Loaded: {:?}", self);
        if self.search_api_key.is_none() {
            log::warn!("SEARCH_API_KEY is not set; search requests will be sent unauthenticated");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = Config::test_default();
        assert!(config.validate().is_ok());
        assert_eq!(config.default_cache_ttl_secs(), 7200);
        assert_eq!(config.keyword_timeout(), Duration::from_secs(25));
    }

    #[test]
    fn inverted_result_bounds_are_rejected() {
        let mut config = Config::test_default();
        config.min_results_per_keyword = 8;
        config.max_results_per_keyword = 3;
        let err = config.validate().unwrap_err();
        assert!(err.contains("MIN_RESULTS_PER_KEYWORD"));
    }

    #[test]
    fn backend_kind_parses_case_insensitively() {
        assert_eq!("Redis".parse::<CacheBackendKind>(), Ok(CacheBackendKind::Redis));
        assert_eq!("memory".parse::<CacheBackendKind>(), Ok(CacheBackendKind::Memory));
        assert!("memcached".parse::<CacheBackendKind>().is_err());
    }

    #[test]
    fn debug_output_redacts_api_key() {
        let mut config = Config::test_default();
        config.search_api_key = Some("sk-secret".to_string());
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("sk-secret"));
        assert!(rendered.contains("<redacted>"));
    }
}
