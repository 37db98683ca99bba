//! Read-only view over persisted jobs: filtered listing and aggregate counts.
//!
//! Nothing in here writes; the view works on a [`Storage`] opened with
//! [`Storage::open_readonly`] as well.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use jobflow_shared::{JobflowError, PersistedJob, Result};
use libsql::Value;
use libsql::params::Params;
use serde::Serialize;

use crate::{LISTING_COLUMNS, Storage, row_to_listing, timestamp};

/// Default page size for listings.
const DEFAULT_LIMIT: u32 = 20;

/// Default recency window in hours.
const DEFAULT_POSTED_WITHIN_HOURS: i64 = 24;

/// Filters for [`Storage::list_jobs`].
#[derive(Debug, Clone)]
pub struct JobFilter {
    pub platform: Option<String>,
    /// Case-insensitive substring of the location. `remote` disables the filter.
    pub location: Option<String>,
    pub remote_only: bool,
    /// Any keyword matching title or description (case-insensitive).
    pub keywords: Vec<String>,
    /// Lower bound on `salary_min`.
    pub salary_min: Option<i64>,
    pub posted_within_hours: i64,
    /// 1-based page number.
    pub page: u32,
    pub limit: u32,
}

impl Default for JobFilter {
    fn default() -> Self {
        Self {
            platform: None,
            location: None,
            remote_only: false,
            keywords: Vec::new(),
            salary_min: None,
            posted_within_hours: DEFAULT_POSTED_WITHIN_HOURS,
            page: 1,
            limit: DEFAULT_LIMIT,
        }
    }
}

/// A persisted job together with its organization's name.
#[derive(Debug, Clone, Serialize)]
pub struct JobListing {
    #[serde(flatten)]
    pub job: PersistedJob,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization_name: Option<String>,
}

/// One page of listing results.
#[derive(Debug, Clone, Serialize)]
pub struct JobPage {
    pub jobs: Vec<JobListing>,
    pub page: u32,
    pub limit: u32,
    /// Matching rows across all pages.
    pub total: u64,
    pub total_pages: u64,
}

/// Aggregate counts over a recency window.
#[derive(Debug, Clone, Serialize)]
pub struct JobStats {
    pub total_jobs: u64,
    pub remote_jobs: u64,
    pub platform_distribution: BTreeMap<String, u64>,
    pub hours: i64,
}

/// WHERE clause plus its positional parameters.
struct WhereClause {
    sql: String,
    values: Vec<Value>,
}

impl WhereClause {
    fn new() -> Self {
        Self {
            sql: String::from("WHERE 1 = 1"),
            values: Vec::new(),
        }
    }

    fn push(&mut self, condition: &str, value: Value) {
        self.values.push(value);
        let placeholder = format!("?{}", self.values.len());
        self.sql.push_str(" AND ");
        self.sql.push_str(&condition.replace("{}", &placeholder));
    }

    fn push_any(&mut self, conditions: Vec<(String, Value)>) {
        if conditions.is_empty() {
            return;
        }
        let mut parts = Vec::with_capacity(conditions.len());
        for (condition, value) in conditions {
            self.values.push(value);
            parts.push(condition.replace("{}", &format!("?{}", self.values.len())));
        }
        self.sql.push_str(&format!(" AND ({})", parts.join(" OR ")));
    }
}

/// Start of the `hours`-long window ending at `now`.
fn window_start(now: DateTime<Utc>, hours: i64) -> Result<DateTime<Utc>> {
    if hours < 1 {
        return Err(JobflowError::validation(format!(
            "hours window must be at least 1, got {hours}"
        )));
    }
    Duration::try_hours(hours)
        .and_then(|window| now.checked_sub_signed(window))
        .ok_or_else(|| JobflowError::validation(format!("hours window {hours} is out of range")))
}

/// `%needle%` for a `LIKE ... ESCAPE '\'` clause, with wildcards in `needle` taken literally.
fn contains_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for c in needle.chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

fn build_where(filter: &JobFilter, now: DateTime<Utc>) -> Result<WhereClause> {
    let mut clause = WhereClause::new();

    if let Some(platform) = &filter.platform {
        clause.push("j.platform = {}", Value::Text(platform.clone()));
    }

    if let Some(location) = &filter.location {
        if !location.eq_ignore_ascii_case("remote") {
            clause.push(
                "LOWER(j.location) LIKE {} ESCAPE '\\'",
                Value::Text(contains_pattern(&location.to_lowercase())),
            );
        }
    }

    if filter.remote_only {
        clause.push("j.is_remote = {}", Value::Integer(1));
    }

    let keyword_conditions = filter
        .keywords
        .iter()
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .flat_map(|k| {
            let pattern = contains_pattern(&k);
            [
                (
                    "LOWER(j.title) LIKE {} ESCAPE '\\'".to_string(),
                    Value::Text(pattern.clone()),
                ),
                (
                    "LOWER(j.description) LIKE {} ESCAPE '\\'".to_string(),
                    Value::Text(pattern),
                ),
            ]
        })
        .collect();
    clause.push_any(keyword_conditions);

    if let Some(min) = filter.salary_min {
        clause.push("j.salary_min >= {}", Value::Integer(min));
    }

    let since = window_start(now, filter.posted_within_hours)?;
    clause.push("j.posted_at >= {}", Value::Text(timestamp(&since)));

    Ok(clause)
}

impl Storage {
    /// List jobs matching `filter`, newest first.
    pub async fn list_jobs(&self, filter: &JobFilter) -> Result<JobPage> {
        self.list_jobs_at(filter, Utc::now()).await
    }

    /// [`Storage::list_jobs`] with an explicit clock, for deterministic windows.
    pub async fn list_jobs_at(&self, filter: &JobFilter, now: DateTime<Utc>) -> Result<JobPage> {
        let page = filter.page.max(1);
        let limit = filter.limit.max(1);
        let clause = build_where(filter, now)?;

        let count_sql = format!("SELECT COUNT(*) FROM jobs j {}", clause.sql);
        let total = self.scalar(&count_sql, clause.values.clone()).await?;

        let mut values = clause.values;
        values.push(Value::Integer(i64::from(limit)));
        values.push(Value::Integer(i64::from(page - 1) * i64::from(limit)));
        let list_sql = format!(
            "SELECT {LISTING_COLUMNS} FROM jobs j
             LEFT JOIN organizations o ON o.id = j.organization_id
             {}
             ORDER BY j.posted_at DESC
             LIMIT ?{} OFFSET ?{}",
            clause.sql,
            values.len() - 1,
            values.len(),
        );

        let mut rows = self
            .conn()
            .query(&list_sql, Params::Positional(values))
            .await
            .map_err(|e| JobflowError::Storage(e.to_string()))?;

        let mut jobs = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            jobs.push(row_to_listing(&row)?);
        }

        Ok(JobPage {
            jobs,
            page,
            limit,
            total,
            total_pages: total.div_ceil(u64::from(limit)),
        })
    }

    /// Get a single job by its storage identifier.
    pub async fn get_job(&self, id: &str) -> Result<Option<JobListing>> {
        let sql = format!(
            "SELECT {LISTING_COLUMNS} FROM jobs j
             LEFT JOIN organizations o ON o.id = j.organization_id
             WHERE j.id = ?1"
        );
        let mut rows = self
            .conn()
            .query(&sql, libsql::params![id])
            .await
            .map_err(|e| JobflowError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_listing(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(JobflowError::Storage(e.to_string())),
        }
    }

    /// Aggregate counts for jobs posted within the last `hours`.
    ///
    /// `hours` below one, or too large to subtract from `now`, is a validation error.
    pub async fn job_stats(&self, hours: i64, now: DateTime<Utc>) -> Result<JobStats> {
        let since = Value::Text(timestamp(&window_start(now, hours)?));

        let total_jobs = self
            .scalar(
                "SELECT COUNT(*) FROM jobs WHERE posted_at >= ?1",
                vec![since.clone()],
            )
            .await?;
        let remote_jobs = self
            .scalar(
                "SELECT COUNT(*) FROM jobs WHERE posted_at >= ?1 AND is_remote = 1",
                vec![since.clone()],
            )
            .await?;

        let mut rows = self
            .conn()
            .query(
                "SELECT platform, COUNT(*) FROM jobs WHERE posted_at >= ?1
                 GROUP BY platform ORDER BY platform",
                Params::Positional(vec![since]),
            )
            .await
            .map_err(|e| JobflowError::Storage(e.to_string()))?;

        let mut platform_distribution = BTreeMap::new();
        while let Ok(Some(row)) = rows.next().await {
            let platform: String = row
                .get(0)
                .map_err(|e| JobflowError::Storage(e.to_string()))?;
            let count: i64 = row.get(1).unwrap_or(0);
            platform_distribution.insert(platform, count as u64);
        }

        Ok(JobStats {
            total_jobs,
            remote_jobs,
            platform_distribution,
            hours,
        })
    }

    async fn scalar(&self, sql: &str, values: Vec<Value>) -> Result<u64> {
        let mut rows = self
            .conn()
            .query(sql, Params::Positional(values))
            .await
            .map_err(|e| JobflowError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(row.get::<i64>(0).map(|n| n as u64).unwrap_or(0)),
            Ok(None) => Ok(0),
            Err(e) => Err(JobflowError::Storage(e.to_string())),
        }
    }
}
