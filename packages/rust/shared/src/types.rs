//! Core domain types for Jobflow: job records, organizations, and workflow runs.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{JobflowError, Result};

/// Days a persisted posting stays valid after it was posted.
pub const JOB_TTL_DAYS: i64 = 30;

/// Age after which the retention sweeper purges a posting.
pub const RETENTION_DAYS: i64 = 7;

/// Upper bound for any configurable day count (retention window, job TTL).
pub const MAX_RETENTION_DAYS: i64 = 3650;

/// A span of `days` whole days, between 1 and [`MAX_RETENTION_DAYS`].
pub fn day_window(days: i64) -> Result<Duration> {
    if !(1..=MAX_RETENTION_DAYS).contains(&days) {
        return Err(JobflowError::validation(format!(
            "day count must be between 1 and {MAX_RETENTION_DAYS}, got {days}"
        )));
    }
    Duration::try_days(days)
        .ok_or_else(|| JobflowError::validation(format!("day count {days} is out of range")))
}

// ---------------------------------------------------------------------------
// JobRecord
// ---------------------------------------------------------------------------

/// A normalized job posting as returned by a source adapter.
///
/// The relevance score is not part of the record: it is computed by the
/// reconciler right before the record is persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    /// Identifier assigned by the source platform (unique per platform).
    pub external_id: String,
    pub title: String,
    /// Hiring organization, if the board exposes one.
    #[serde(default, alias = "company", skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
    /// Industry of the hiring organization.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub industry: Option<String>,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub description: String,
    /// Requirement tags (technologies, skills).
    #[serde(default)]
    pub requirements: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salary_min: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salary_max: Option<i64>,
    #[serde(default = "default_currency")]
    pub currency: String,
    /// Employment type, e.g. `full-time` or `contract`.
    #[serde(default = "default_job_type")]
    pub job_type: String,
    #[serde(default)]
    pub is_remote: bool,
    /// Platform tag the record was fetched from.
    #[serde(default)]
    pub platform: String,
    /// Link to the posting on the source platform.
    #[serde(default, alias = "url")]
    pub source_url: String,
    #[serde(default = "Utc::now")]
    pub posted_at: DateTime<Utc>,
}

fn default_currency() -> String {
    "USD".into()
}

fn default_job_type() -> String {
    "full-time".into()
}

impl JobRecord {
    /// Whether either salary bound is known.
    pub fn has_salary(&self) -> bool {
        self.salary_min.is_some() || self.salary_max.is_some()
    }
}

// ---------------------------------------------------------------------------
// Organization / PersistedJob
// ---------------------------------------------------------------------------

/// A hiring organization, keyed by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Organization {
    pub id: String,
    pub name: String,
    pub industry: Option<String>,
}

/// A job record as stored, with its storage identifier and computed fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedJob {
    /// Storage-assigned identifier (UUID v7).
    pub id: String,
    /// Owning organization, `None` when resolution failed or none was named.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<String>,
    #[serde(flatten)]
    pub record: JobRecord,
    pub expires_at: DateTime<Utc>,
    pub relevance_score: u8,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// WorkflowId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper for workflow run identifiers (time-sortable).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkflowId(pub Uuid);

impl WorkflowId {
    /// Generate a new time-sortable workflow identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for WorkflowId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for WorkflowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for WorkflowId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

// ---------------------------------------------------------------------------
// FetchRequest
// ---------------------------------------------------------------------------

/// The configuration a workflow run was started with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchRequest {
    /// Platform tags, processed in this order.
    pub platforms: Vec<String>,
    pub location: String,
    pub keywords: Vec<String>,
}

impl FetchRequest {
    /// Reject requests that cannot start a workflow run.
    ///
    /// Unknown platform tags are not rejected here: they surface later as a
    /// per-platform failure of the run.
    pub fn validate(&self) -> Result<()> {
        if self.platforms.is_empty() {
            return Err(JobflowError::validation("at least one platform is required"));
        }
        if self.platforms.iter().any(|p| p.trim().is_empty()) {
            return Err(JobflowError::validation("platform tags must not be blank"));
        }
        if self.location.trim().is_empty() {
            return Err(JobflowError::validation("location must not be blank"));
        }
        if self.keywords.iter().any(|k| k.trim().is_empty()) {
            return Err(JobflowError::validation("keywords must not be blank"));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// WorkflowRun
// ---------------------------------------------------------------------------

/// Lifecycle state of a workflow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowStatus {
    Running,
    Completed,
    Failed,
}

impl WorkflowStatus {
    /// `Completed` and `Failed` never transition again.
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Running)
    }
}

impl std::fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// What started a workflow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerKind {
    Scheduled,
    Manual,
}

/// Per-platform progress counters of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowProgress {
    /// Number of platforms requested.
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
}

/// One execution of the ingestion pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowRun {
    pub id: WorkflowId,
    pub status: WorkflowStatus,
    pub trigger: TriggerKind,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub config: FetchRequest,
    pub progress: WorkflowProgress,
    /// Records newly persisted by this run.
    pub jobs_stored: usize,
    /// Records skipped as already present.
    pub jobs_skipped: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WorkflowRun {
    /// A freshly started run in the `running` state.
    pub fn started(id: WorkflowId, config: FetchRequest, trigger: TriggerKind) -> Self {
        Self {
            id,
            status: WorkflowStatus::Running,
            trigger,
            started_at: Utc::now(),
            completed_at: None,
            progress: WorkflowProgress {
                total: config.platforms.len(),
                completed: 0,
                failed: 0,
            },
            config,
            jobs_stored: 0,
            jobs_skipped: 0,
            error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> FetchRequest {
        FetchRequest {
            platforms: vec!["indeed".into(), "linkedin".into()],
            location: "remote".into(),
            keywords: vec!["rust".into()],
        }
    }

    #[test]
    fn workflow_id_roundtrip() {
        let id = WorkflowId::new();
        let parsed: WorkflowId = id.to_string().parse().expect("parse WorkflowId");
        assert_eq!(id, parsed);
    }

    #[test]
    fn started_run_counts_platforms() {
        let run = WorkflowRun::started(WorkflowId::new(), request(), TriggerKind::Manual);
        assert_eq!(run.status, WorkflowStatus::Running);
        assert_eq!(run.progress.total, 2);
        assert_eq!(run.progress.completed + run.progress.failed, 0);
        assert!(run.completed_at.is_none());
    }

    #[test]
    fn validation_rejects_empty_platforms() {
        let mut req = request();
        req.platforms.clear();
        assert!(req.validate().is_err());

        let mut req = request();
        req.platforms.push("  ".into());
        assert!(req.validate().is_err());

        let mut req = request();
        req.location = String::new();
        assert!(req.validate().is_err());

        assert!(request().validate().is_ok());
    }

    #[test]
    fn validation_accepts_unknown_platform_tags() {
        let mut req = request();
        req.platforms = vec!["monster".into()];
        assert!(req.validate().is_ok());
    }

    #[test]
    fn job_record_applies_defaults() {
        let json = r#"{
            "external_id": "abc",
            "title": "Backend Developer",
            "company": "Acme",
            "url": "https://jobs.example.com/abc",
            "posted_at": "2026-10-01T12:00:00Z"
        }"#;
        let record: JobRecord = serde_json::from_str(json).expect("deserialize");
        assert_eq!(record.organization.as_deref(), Some("Acme"));
        assert_eq!(record.currency, "USD");
        assert_eq!(record.job_type, "full-time");
        assert!(!record.is_remote);
        assert!(!record.has_salary());
        assert_eq!(record.source_url, "https://jobs.example.com/abc");
    }

    #[test]
    fn status_serializes_lowercase() {
        let json = serde_json::to_string(&WorkflowStatus::Completed).unwrap();
        assert_eq!(json, "\"completed\"");
        assert!(WorkflowStatus::Failed.is_terminal());
        assert!(!WorkflowStatus::Running.is_terminal());
    }
}
