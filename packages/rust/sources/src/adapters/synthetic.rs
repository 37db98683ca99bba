//! Synthetic board feed.
//!
//! Stands in for boards without a configured feed endpoint: produces a
//! plausible batch of postings for the requested location after a short
//! simulated network latency.

use std::ops::Range;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use jobflow_shared::{JobRecord, Result};
use rand::Rng;
use rand::seq::IndexedRandom;
use tracing::{debug, instrument};

use super::{Board, SourceAdapter};
use crate::RateLimiter;

const ORGANIZATIONS: &[&str] = &[
    "Google", "Microsoft", "Apple", "Amazon", "Meta", "Netflix", "Tesla", "Spotify", "Stripe",
    "Airbnb", "Uber", "Shopify", "Atlassian", "Slack",
];

const TITLES: &[&str] = &[
    "Senior Frontend Developer",
    "Full Stack Engineer",
    "Backend Developer",
    "React Developer",
    "Node.js Developer",
    "DevOps Engineer",
    "Cloud Architect",
    "Mobile Developer",
    "UI/UX Designer",
    "Product Manager",
    "Data Engineer",
    "Machine Learning Engineer",
    "Software Architect",
    "Site Reliability Engineer",
];

const REQUIREMENT_SETS: &[&[&str]] = &[
    &["React", "JavaScript", "TypeScript", "Node.js"],
    &["Python", "Django", "PostgreSQL", "AWS"],
    &["Java", "Spring Boot", "Microservices", "Docker"],
    &["React Native", "iOS", "Android", "Mobile Development"],
    &["Vue.js", "Angular", "CSS", "HTML5"],
    &["Go", "Kubernetes", "Docker", "DevOps"],
    &["PHP", "Laravel", "MySQL", "Redis"],
];

const BENEFITS: &str = "\n\nWhat we offer:\n\
    • Competitive salary and equity\n\
    • Flexible remote work options\n\
    • Health, dental, and vision insurance\n\
    • Professional development budget\n\
    • Unlimited PTO";

/// Default simulated latency per board, in milliseconds.
fn default_latency(board: Board) -> Range<u64> {
    match board {
        Board::Indeed => 500..1500,
        Board::LinkedIn => 800..2000,
        Board::Glassdoor => 600..1600,
    }
}

/// Generates postings locally instead of calling a remote board.
pub struct SyntheticBoardAdapter {
    board: Board,
    limiter: RateLimiter,
    latency_ms: Range<u64>,
}

impl SyntheticBoardAdapter {
    pub fn new(board: Board) -> Self {
        Self {
            board,
            limiter: RateLimiter::new(board.min_interval()),
            latency_ms: default_latency(board),
        }
    }

    /// Override the board's minimum request interval.
    pub fn with_min_interval(mut self, interval: Duration) -> Self {
        self.limiter = RateLimiter::new(interval);
        self
    }

    /// Skip the simulated network latency.
    pub fn without_latency(mut self) -> Self {
        self.latency_ms = 0..0;
        self
    }

    /// Build one batch. Kept synchronous so the thread-local RNG never
    /// lives across an await point.
    fn generate(&self, location: &str, keywords: &[String]) -> Vec<JobRecord> {
        let mut rng = rand::rng();
        let now = Utc::now();
        let tag = self.board.tag();

        let locations: Vec<String> = if location.eq_ignore_ascii_case("remote") {
            ["Remote", "Remote - US", "Remote - Europe", "Remote - Worldwide"]
                .into_iter()
                .map(String::from)
                .collect()
        } else {
            vec![
                location.to_string(),
                format!("{location}, US"),
                format!("{location} Metro Area"),
                format!("Near {location}"),
            ]
        };

        let titles = matching_titles(keywords);

        (0..self.board.batch_size())
            .map(|i| {
                let organization = *ORGANIZATIONS.choose(&mut rng).unwrap_or(&"Acme");
                let title = *titles.choose(&mut rng).unwrap_or(&TITLES[0]);
                let job_location = locations.choose(&mut rng).cloned().unwrap_or_default();
                let requirements: Vec<String> = REQUIREMENT_SETS
                    .choose(&mut rng)
                    .map(|set| set.iter().map(|r| r.to_string()).collect())
                    .unwrap_or_default();

                let base_salary: i64 = 80_000 + rng.random_range(0..120_000i64);
                let salary_range: i64 = 20_000 + rng.random_range(0..40_000i64);
                let hours_ago: i64 = rng.random_range(0..24);
                let job_type = if rng.random_bool(0.8) { "full-time" } else { "contract" };

                JobRecord {
                    external_id: format!(
                        "{tag}_{}_{}_{i}",
                        slug(organization),
                        now.timestamp_millis()
                    ),
                    title: title.to_string(),
                    organization: Some(organization.to_string()),
                    industry: Some("Technology".into()),
                    is_remote: job_location.to_lowercase().contains("remote"),
                    description: describe(title, organization, &requirements, &mut rng),
                    location: job_location,
                    requirements,
                    salary_min: Some(base_salary),
                    salary_max: Some(base_salary + salary_range),
                    currency: "USD".into(),
                    job_type: job_type.into(),
                    platform: tag.to_string(),
                    source_url: format!(
                        "https://{tag}.com/jobs/{}-{}-{i}",
                        slug(organization),
                        slug(title)
                    ),
                    posted_at: now - ChronoDuration::hours(hours_ago),
                }
            })
            .collect()
    }
}

#[async_trait]
impl SourceAdapter for SyntheticBoardAdapter {
    #[instrument(skip_all, fields(platform = self.board.tag(), location))]
    async fn fetch(&self, location: &str, keywords: &[String]) -> Result<Vec<JobRecord>> {
        self.limiter.acquire().await;

        if self.latency_ms.start < self.latency_ms.end {
            let ms = rand::rng().random_range(self.latency_ms.clone());
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }

        let batch = self.generate(location, keywords);
        debug!(count = batch.len(), "synthetic batch generated");
        Ok(batch)
    }

    fn platform(&self) -> &str {
        self.board.tag()
    }
}

/// Titles mentioning any keyword, or every title when none do.
fn matching_titles(keywords: &[String]) -> Vec<&'static str> {
    let lowered: Vec<String> = keywords.iter().map(|k| k.to_lowercase()).collect();
    let matches: Vec<&'static str> = TITLES
        .iter()
        .copied()
        .filter(|t| {
            let title = t.to_lowercase();
            lowered.iter().any(|k| title.contains(k.as_str()))
        })
        .collect();

    if matches.is_empty() { TITLES.to_vec() } else { matches }
}

fn describe(title: &str, organization: &str, requirements: &[String], rng: &mut impl Rng) -> String {
    let intro = match rng.random_range(0..4) {
        0 => format!(
            "Join {organization} as a {title} and work on cutting-edge technology that impacts millions of users worldwide."
        ),
        1 => format!(
            "We're looking for a talented {title} to join our growing team at {organization}. You'll be working on innovative projects."
        ),
        2 => format!(
            "{organization} is seeking an experienced {title} to help build the next generation of our platform."
        ),
        _ => format!(
            "Exciting opportunity for a {title} at {organization}. Work with a collaborative team on challenging technical problems."
        ),
    };

    let reqs: Vec<String> = requirements.iter().map(|r| format!("• {r}")).collect();
    format!("{intro}\n\nKey Requirements:\n{}{BENEFITS}", reqs.join("\n"))
}

/// Lowercase, whitespace collapsed to `-`.
fn slug(s: &str) -> String {
    s.to_lowercase().split_whitespace().collect::<Vec<_>>().join("-")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter(board: Board) -> SyntheticBoardAdapter {
        SyntheticBoardAdapter::new(board)
            .without_latency()
            .with_min_interval(Duration::ZERO)
    }

    #[tokio::test]
    async fn batch_size_follows_board() {
        let indeed = adapter(Board::Indeed).fetch("remote", &[]).await.unwrap();
        assert_eq!(indeed.len(), 15);
        let glassdoor = adapter(Board::Glassdoor).fetch("remote", &[]).await.unwrap();
        assert_eq!(glassdoor.len(), 8);
    }

    #[tokio::test]
    async fn remote_location_yields_remote_postings() {
        let batch = adapter(Board::LinkedIn).fetch("remote", &[]).await.unwrap();
        assert!(batch.iter().all(|r| r.is_remote));
        assert!(batch.iter().all(|r| r.platform == "linkedin"));
        assert!(batch.iter().all(|r| r.location.starts_with("Remote")));
    }

    #[tokio::test]
    async fn city_location_is_not_remote() {
        let batch = adapter(Board::Indeed).fetch("Berlin", &[]).await.unwrap();
        assert!(batch.iter().all(|r| !r.is_remote));
        assert!(batch.iter().all(|r| r.location.contains("Berlin")));
    }

    #[tokio::test]
    async fn records_are_well_formed() {
        let now = Utc::now();
        let batch = adapter(Board::Indeed).fetch("remote", &[]).await.unwrap();

        let mut ids: Vec<&str> = batch.iter().map(|r| r.external_id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), batch.len(), "external ids are unique within a batch");

        for record in &batch {
            assert!(record.external_id.starts_with("indeed_"));
            assert!(record.salary_min.unwrap() < record.salary_max.unwrap());
            assert!(record.posted_at <= now + ChronoDuration::seconds(1));
            assert!(now - record.posted_at < ChronoDuration::hours(25));
            assert!(record.description.contains("Key Requirements"));
        }
    }

    #[test]
    fn keywords_narrow_titles() {
        let titles = matching_titles(&["React".into()]);
        assert_eq!(titles, vec!["React Developer"]);

        let titles = matching_titles(&["no such role".into()]);
        assert_eq!(titles.len(), TITLES.len());
    }

    #[test]
    fn slug_collapses_whitespace() {
        assert_eq!(slug("Site Reliability  Engineer"), "site-reliability-engineer");
    }
}
