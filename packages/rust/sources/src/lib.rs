//! Job board source adapters.
//!
//! This crate provides:
//! - [`SourceAdapter`]: Per-platform client returning normalized job records
//! - [`AdapterRegistry`]: Platform tag → adapter lookup, built from config
//! - [`RateLimiter`]: Minimum-interval pacing owned by each adapter

pub mod adapters;
mod rate_limit;

pub use adapters::{
    AdapterRegistry, Board, FeedBoardAdapter, SourceAdapter, SyntheticBoardAdapter,
};
pub use rate_limit::RateLimiter;

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use jobflow_shared::{AppConfig, JobRecord, PlatformConfig, Result};
    use url::Url;

    struct EmptyBoard(&'static str);

    #[async_trait]
    impl SourceAdapter for EmptyBoard {
        async fn fetch(&self, _location: &str, _keywords: &[String]) -> Result<Vec<JobRecord>> {
            Ok(Vec::new())
        }

        fn platform(&self) -> &str {
            self.0
        }
    }

    // -----------------------------------------------------------------------
    // Board
    // -----------------------------------------------------------------------

    #[test]
    fn board_tags_round_trip() {
        for board in Board::ALL {
            assert_eq!(Board::from_tag(board.tag()), Some(board));
        }
        assert_eq!(Board::from_tag(" LinkedIn "), Some(Board::LinkedIn));
        assert_eq!(Board::from_tag("monster"), None);
    }

    #[test]
    fn board_intervals() {
        assert_eq!(Board::Indeed.min_interval(), Duration::from_millis(1000));
        assert_eq!(Board::LinkedIn.min_interval(), Duration::from_millis(2000));
        assert_eq!(Board::Glassdoor.min_interval(), Duration::from_millis(1500));
    }

    // -----------------------------------------------------------------------
    // Registry
    // -----------------------------------------------------------------------

    #[test]
    fn builtin_registry_has_every_board() {
        let registry = AdapterRegistry::builtin();
        assert_eq!(registry.platforms(), vec!["glassdoor", "indeed", "linkedin"]);
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let registry = AdapterRegistry::builtin();
        assert!(registry.get("Indeed").is_some());
        assert!(registry.get(" glassdoor").is_some());
        assert!(registry.get("monster").is_none());
    }

    #[test]
    fn register_replaces_existing_adapter() {
        let registry = AdapterRegistry::new()
            .with_adapter(Arc::new(EmptyBoard("custom")))
            .with_adapter(Arc::new(EmptyBoard("custom")));
        assert_eq!(registry.platforms(), vec!["custom"]);
    }

    #[test]
    fn from_config_builds_every_board() {
        let mut platforms = BTreeMap::new();
        platforms.insert(
            "indeed".to_string(),
            PlatformConfig {
                rate_limit_ms: Some(10),
                feed_url: Some(Url::parse("http://localhost:9/feed").unwrap()),
            },
        );
        platforms.insert("monster".to_string(), PlatformConfig::default());

        let config = AppConfig {
            platforms,
            ..AppConfig::default()
        };
        let registry = AdapterRegistry::from_config(&config).unwrap();

        assert_eq!(registry.platforms(), vec!["glassdoor", "indeed", "linkedin"]);
        assert_eq!(registry.get("indeed").unwrap().platform(), "indeed");
    }

    #[tokio::test]
    async fn custom_adapter_is_fetchable() {
        let registry = AdapterRegistry::new().with_adapter(Arc::new(EmptyBoard("Custom")));
        let adapter = registry.get("custom").unwrap();
        let batch = adapter.fetch("remote", &[]).await.unwrap();
        assert!(batch.is_empty());
    }
}
