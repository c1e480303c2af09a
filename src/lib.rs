pub mod cache;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod repair; // free-text model output -> topics
pub mod retention;
pub mod search;
pub mod strategy;
pub mod testing; // scripted search client and failing store
pub mod types;
pub mod utils;

pub use cache::{KeyStore, MemoryKeyStore, RedisKeyStore, StatsSnapshot, TrendCache};
pub use config::Config;
pub use error::{Result, TrendError};
pub use orchestrator::{CachedLookup, TrendingOrchestrator};
pub use repair::{ResponseRepairPipeline, Strategy};
pub use retention::RetentionPolicy;
pub use search::{HttpSearchClient, SearchClient};
pub use strategy::FetchStrategySelector;
pub use types::{KeywordRequest, Retention, RetentionUnit, Topic, TrendingResult};
