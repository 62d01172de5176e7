//! Cache configuration.
//!
//! Controls the question aggregate cache via the `[cache]` table.

use std::num::NonZeroUsize;

use serde::Deserialize;

const DEFAULT_QUESTION_LIMIT: usize = 500;

/// Cache configuration from `qanda.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Enable the question aggregate cache.
    pub enabled: bool,
    /// Maximum question aggregates kept before LRU eviction.
    pub question_limit: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            question_limit: DEFAULT_QUESTION_LIMIT,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            enabled: settings.enabled,
            question_limit: settings.question_limit,
        }
    }
}

impl CacheConfig {
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Returns the question limit as NonZeroUsize, clamping to 1 if zero.
    pub fn question_limit_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.question_limit).unwrap_or(NonZeroUsize::MIN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let config = CacheConfig::default();
        assert!(config.enabled);
        assert_eq!(config.question_limit, 500);
    }

    #[test]
    fn disabled_cache_reports_disabled() {
        let config = CacheConfig {
            enabled: false,
            ..Default::default()
        };
        assert!(!config.is_enabled());
    }

    #[test]
    fn non_zero_clamps_to_min() {
        let config = CacheConfig {
            question_limit: 0,
            ..Default::default()
        };
        assert_eq!(config.question_limit_non_zero().get(), 1);
    }
}
