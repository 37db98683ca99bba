//! HTTP JSON feed adapter.
//!
//! Issues `GET <feed_url>?location=<loc>&keywords=<a,b>` and expects a JSON
//! array of normalized postings in response.

use std::time::Duration;

use async_trait::async_trait;
use jobflow_shared::{JobRecord, JobflowError, Result};
use reqwest::Client;
use tracing::{debug, instrument};
use url::Url;

use super::{Board, SourceAdapter};
use crate::RateLimiter;

/// User-Agent string for feed requests.
const USER_AGENT: &str = concat!("Jobflow/", env!("CARGO_PKG_VERSION"));

/// Timeout for a single feed request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Fetches postings from a board's JSON feed endpoint.
pub struct FeedBoardAdapter {
    board: Board,
    feed_url: Url,
    client: Client,
    limiter: RateLimiter,
}

impl FeedBoardAdapter {
    pub fn new(board: Board, feed_url: Url) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| JobflowError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            board,
            feed_url,
            client,
            limiter: RateLimiter::new(board.min_interval()),
        })
    }

    /// Override the board's minimum request interval.
    pub fn with_min_interval(mut self, interval: Duration) -> Self {
        self.limiter = RateLimiter::new(interval);
        self
    }

    fn request_url(&self, location: &str, keywords: &[String]) -> Url {
        let mut url = self.feed_url.clone();
        url.query_pairs_mut()
            .append_pair("location", location)
            .append_pair("keywords", &keywords.join(","));
        url
    }
}

#[async_trait]
impl SourceAdapter for FeedBoardAdapter {
    #[instrument(skip_all, fields(platform = self.board.tag(), location))]
    async fn fetch(&self, location: &str, keywords: &[String]) -> Result<Vec<JobRecord>> {
        self.limiter.acquire().await;

        let url = self.request_url(location, keywords);
        debug!(%url, "requesting feed");

        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| JobflowError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(JobflowError::Network(format!("{url}: HTTP {status}")));
        }

        let body = response
            .text()
            .await
            .map_err(|e| JobflowError::Network(format!("{url}: body read failed: {e}")))?;

        let mut records: Vec<JobRecord> = serde_json::from_str(&body)
            .map_err(|e| JobflowError::parse(format!("{url}: malformed feed: {e}")))?;

        for record in &mut records {
            record.platform = self.board.tag().to_string();
        }

        debug!(count = records.len(), "feed batch decoded");
        Ok(records)
    }

    fn platform(&self) -> &str {
        self.board.tag()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn adapter_for(server: &MockServer) -> FeedBoardAdapter {
        let url = Url::parse(&format!("{}/feed", server.uri())).unwrap();
        FeedBoardAdapter::new(Board::Glassdoor, url)
            .unwrap()
            .with_min_interval(Duration::ZERO)
    }

    #[tokio::test]
    async fn decodes_feed_and_tags_platform() {
        let server = MockServer::start().await;
        let body = r#"[
            {
                "external_id": "g-1",
                "title": "Staff Python Engineer",
                "company": "Initech",
                "location": "Remote",
                "is_remote": true,
                "salary_min": 150000,
                "url": "https://glassdoor.example.com/g-1",
                "posted_at": "2026-10-18T08:00:00Z"
            },
            {
                "external_id": "g-2",
                "title": "Backend Developer",
                "platform": "somewhere-else"
            }
        ]"#;

        Mock::given(method("GET"))
            .and(path("/feed"))
            .and(query_param("location", "remote"))
            .and(query_param("keywords", "python,rust"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&server)
            .await;

        let adapter = adapter_for(&server).await;
        let records = adapter
            .fetch("remote", &["python".into(), "rust".into()])
            .await
            .expect("fetch feed");

        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.platform == "glassdoor"));
        assert_eq!(records[0].organization.as_deref(), Some("Initech"));
        assert_eq!(records[0].salary_min, Some(150_000));
        assert_eq!(records[1].currency, "USD");
    }

    #[tokio::test]
    async fn http_error_is_network_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = adapter_for(&server).await.fetch("remote", &[]).await.unwrap_err();
        assert!(matches!(err, JobflowError::Network(_)));
        assert!(err.to_string().contains("503"));
    }

    #[tokio::test]
    async fn malformed_body_is_parse_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"not\": \"a list\"}"))
            .mount(&server)
            .await;

        let err = adapter_for(&server).await.fetch("remote", &[]).await.unwrap_err();
        assert!(matches!(err, JobflowError::Parse { .. }));
    }
}
