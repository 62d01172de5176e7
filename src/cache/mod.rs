//! Question aggregate cache.
//!
//! A bounded LRU of fully reduced question aggregates shared by every request
//! handler. Reads go through [`QuestionCache::get`] first and populate it with
//! [`QuestionCache::set`] on a miss; writes call [`QuestionCache::remove`].
//!
//! ## Configuration
//!
//! ```toml
//! [cache]
//! enabled = true
//! question_limit = 500
//! ```

mod config;
mod store;

pub use config::CacheConfig;
pub use store::QuestionCache;

pub const METRIC_CACHE_HIT_TOTAL: &str = "qanda_cache_hit_total";
pub const METRIC_CACHE_MISS_TOTAL: &str = "qanda_cache_miss_total";
pub const METRIC_CACHE_EVICT_TOTAL: &str = "qanda_cache_evict_total";
