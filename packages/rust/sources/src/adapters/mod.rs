//! Source adapter trait, the built-in job boards, and the adapter registry.
//!
//! Every adapter owns its own [`RateLimiter`](crate::RateLimiter) and waits on
//! it before each request, so callers never need to pace themselves.

mod feed;
mod synthetic;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use jobflow_shared::{AppConfig, JobRecord, Result};
use tracing::warn;

pub use feed::FeedBoardAdapter;
pub use synthetic::SyntheticBoardAdapter;

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// A per-platform client returning normalized job records.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Fetch one batch of postings for the given location and keywords.
    async fn fetch(&self, location: &str, keywords: &[String]) -> Result<Vec<JobRecord>>;

    /// Platform tag this adapter serves.
    fn platform(&self) -> &str;
}

// ---------------------------------------------------------------------------
// Board
// ---------------------------------------------------------------------------

/// The job boards Jobflow knows how to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Board {
    Indeed,
    LinkedIn,
    Glassdoor,
}

impl Board {
    pub const ALL: [Board; 3] = [Board::Indeed, Board::LinkedIn, Board::Glassdoor];

    pub fn tag(self) -> &'static str {
        match self {
            Board::Indeed => "indeed",
            Board::LinkedIn => "linkedin",
            Board::Glassdoor => "glassdoor",
        }
    }

    /// Case-insensitive lookup by platform tag.
    pub fn from_tag(tag: &str) -> Option<Board> {
        Self::ALL
            .into_iter()
            .find(|b| b.tag().eq_ignore_ascii_case(tag.trim()))
    }

    /// Minimum time between two requests to this board.
    pub fn min_interval(self) -> Duration {
        match self {
            Board::Indeed => Duration::from_millis(1000),
            Board::LinkedIn => Duration::from_millis(2000),
            Board::Glassdoor => Duration::from_millis(1500),
        }
    }

    /// Postings per synthetic batch.
    pub fn batch_size(self) -> usize {
        match self {
            Board::Indeed => 15,
            Board::LinkedIn => 12,
            Board::Glassdoor => 8,
        }
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Platform tag → adapter lookup table, built once at startup.
#[derive(Default, Clone)]
pub struct AdapterRegistry {
    adapters: HashMap<String, Arc<dyn SourceAdapter>>,
}

impl AdapterRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the synthetic feed of every built-in board.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for board in Board::ALL {
            registry.register(Arc::new(SyntheticBoardAdapter::new(board)));
        }
        registry
    }

    /// Build the registry from `[platforms.<tag>]` config entries.
    ///
    /// Boards with a `feed_url` use the HTTP feed adapter; all others use the
    /// synthetic feed. `rate_limit_ms` overrides the board's interval.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        for tag in config.platforms.keys() {
            if Board::from_tag(tag).is_none() {
                warn!(platform = %tag, "ignoring config for unknown platform");
            }
        }

        let mut registry = Self::new();
        for board in Board::ALL {
            let entry = config.platforms.get(board.tag());
            let interval = entry
                .and_then(|p| p.rate_limit_ms)
                .map(Duration::from_millis)
                .unwrap_or_else(|| board.min_interval());

            match entry.and_then(|p| p.feed_url.clone()) {
                Some(url) => registry.register(Arc::new(
                    FeedBoardAdapter::new(board, url)?.with_min_interval(interval),
                )),
                None => registry.register(Arc::new(
                    SyntheticBoardAdapter::new(board).with_min_interval(interval),
                )),
            }
        }
        Ok(registry)
    }

    /// Register `adapter` under its platform tag, replacing any previous one.
    pub fn register(&mut self, adapter: Arc<dyn SourceAdapter>) {
        self.adapters
            .insert(adapter.platform().to_lowercase(), adapter);
    }

    /// Builder-style [`AdapterRegistry::register`].
    pub fn with_adapter(mut self, adapter: Arc<dyn SourceAdapter>) -> Self {
        self.register(adapter);
        self
    }

    /// Look up the adapter for a platform tag.
    pub fn get(&self, platform: &str) -> Option<Arc<dyn SourceAdapter>> {
        self.adapters.get(&platform.trim().to_lowercase()).cloned()
    }

    /// Registered platform tags, sorted.
    pub fn platforms(&self) -> Vec<&str> {
        let mut tags: Vec<&str> = self.adapters.keys().map(String::as_str).collect();
        tags.sort_unstable();
        tags
    }
}
