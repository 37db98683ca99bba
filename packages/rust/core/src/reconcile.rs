//! Reconciliation of fetched batches against persisted jobs.

use std::sync::Arc;

use chrono::{Duration, Utc};
use jobflow_shared::{JOB_TTL_DAYS, JobRecord, PersistedJob, Result, day_window};
use jobflow_storage::{InsertOutcome, JobStore};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::scoring::relevance_score;

/// Per-batch reconciliation counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileSummary {
    /// Records newly persisted.
    pub stored: usize,
    /// Records whose dedup key was already present.
    pub skipped: usize,
    /// Records that could not be persisted.
    pub failed: usize,
}

impl ReconcileSummary {
    pub fn total(&self) -> usize {
        self.stored + self.skipped + self.failed
    }
}

enum Outcome {
    Stored,
    Skipped,
}

/// Deduplicates, scores, and persists fetched records.
#[derive(Clone)]
pub struct Reconciler {
    store: Arc<dyn JobStore>,
    ttl: Duration,
}

impl Reconciler {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self {
            store,
            ttl: Duration::days(JOB_TTL_DAYS),
        }
    }

    /// Override how long after posting a stored job expires.
    pub fn with_ttl_days(mut self, days: i64) -> Result<Self> {
        self.ttl = day_window(days)?;
        Ok(self)
    }

    /// Persist every record in `batch` not already stored under
    /// `(external_id, platform)`, in arrival order.
    ///
    /// Records are stored under `platform` whatever tag the adapter wrote.
    /// Per-record failures are logged and counted; this never fails as a whole.
    #[instrument(skip_all, fields(platform = %platform, batch = batch.len()))]
    pub async fn reconcile(&self, batch: Vec<JobRecord>, platform: &str) -> ReconcileSummary {
        let mut summary = ReconcileSummary::default();

        for mut record in batch {
            record.platform = platform.to_string();
            let external_id = record.external_id.clone();

            match self.reconcile_one(record).await {
                Ok(Outcome::Stored) => summary.stored += 1,
                Ok(Outcome::Skipped) => summary.skipped += 1,
                Err(e) => {
                    warn!(%external_id, error = %e, "failed to persist job, continuing");
                    summary.failed += 1;
                }
            }
        }

        info!(
            stored = summary.stored,
            skipped = summary.skipped,
            failed = summary.failed,
            "batch reconciled"
        );
        summary
    }

    async fn reconcile_one(&self, record: JobRecord) -> Result<Outcome> {
        if self
            .store
            .find_job(&record.external_id, &record.platform)
            .await?
            .is_some()
        {
            debug!(external_id = %record.external_id, "already stored, skipping");
            return Ok(Outcome::Skipped);
        }

        let organization_id = self.resolve_organization(&record).await;

        let now = Utc::now();
        let job = PersistedJob {
            id: Uuid::now_v7().to_string(),
            organization_id,
            expires_at: record.posted_at + self.ttl,
            relevance_score: relevance_score(&record, now),
            created_at: now,
            record,
        };

        match self.store.insert_job(&job).await? {
            InsertOutcome::Inserted(_) => Ok(Outcome::Stored),
            InsertOutcome::AlreadyExists => {
                debug!(external_id = %job.record.external_id, "lost insert race, skipping");
                Ok(Outcome::Skipped)
            }
        }
    }

    /// Insert-or-get the record's organization. Failures degrade to `None`.
    async fn resolve_organization(&self, record: &JobRecord) -> Option<String> {
        let name = record.organization.as_deref().map(str::trim)?;
        if name.is_empty() {
            return None;
        }

        match self
            .store
            .upsert_organization(name, record.industry.as_deref())
            .await
        {
            Ok(id) => Some(id),
            Err(e) => {
                warn!(
                    organization = %name,
                    external_id = %record.external_id,
                    error = %e,
                    "organization lookup failed, storing job without one"
                );
                None
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::DateTime;
    use jobflow_shared::JobflowError;
    use jobflow_storage::{JobFilter, Storage};

    pub(crate) async fn test_storage() -> Arc<Storage> {
        let tmp = std::env::temp_dir().join(format!("jobflow_core_test_{}.db", Uuid::now_v7()));
        Arc::new(Storage::open(&tmp).await.expect("open test db"))
    }

    pub(crate) fn record(external_id: &str, organization: Option<&str>) -> JobRecord {
        JobRecord {
            external_id: external_id.into(),
            title: "Backend Developer".into(),
            organization: organization.map(String::from),
            industry: Some("Technology".into()),
            location: "Remote".into(),
            description: "Ship services.".into(),
            requirements: vec!["Go".into()],
            salary_min: None,
            salary_max: None,
            currency: "USD".into(),
            job_type: "full-time".into(),
            is_remote: true,
            platform: "adapter-tag".into(),
            source_url: format!("https://jobs.example.com/{external_id}"),
            posted_at: Utc::now(),
        }
    }

    /// Delegates to a real store, failing selected operations.
    struct FlakyStore {
        inner: Arc<Storage>,
        fail_insert_for: Option<&'static str>,
        fail_organizations: bool,
    }

    #[async_trait]
    impl JobStore for FlakyStore {
        async fn find_job(&self, external_id: &str, platform: &str) -> Result<Option<String>> {
            self.inner.find_job(external_id, platform).await
        }

        async fn upsert_organization(&self, name: &str, industry: Option<&str>) -> Result<String> {
            if self.fail_organizations {
                return Err(JobflowError::Storage("organizations table locked".into()));
            }
            self.inner.upsert_organization(name, industry).await
        }

        async fn insert_job(&self, job: &PersistedJob) -> Result<InsertOutcome> {
            if self.fail_insert_for == Some(job.record.external_id.as_str()) {
                return Err(JobflowError::Storage("disk full".into()));
            }
            self.inner.insert_job(job).await
        }

        async fn delete_jobs_posted_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
            self.inner.delete_jobs_posted_before(cutoff).await
        }
    }

    fn all_jobs() -> JobFilter {
        JobFilter {
            posted_within_hours: 24 * 365,
            limit: 100,
            ..JobFilter::default()
        }
    }

    #[tokio::test]
    async fn stores_new_records_under_given_platform() {
        let storage = test_storage().await;
        let reconciler = Reconciler::new(storage.clone());

        let summary = reconciler
            .reconcile(vec![record("a-1", Some("Acme")), record("a-2", None)], "indeed")
            .await;

        assert_eq!(summary, ReconcileSummary { stored: 2, skipped: 0, failed: 0 });
        assert_eq!(storage.count_jobs(Some("indeed")).await.unwrap(), 2);
        assert_eq!(storage.count_jobs(Some("adapter-tag")).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn duplicate_in_batch_is_stored_once() {
        let storage = test_storage().await;
        let reconciler = Reconciler::new(storage.clone());

        let summary = reconciler
            .reconcile(vec![record("X", None), record("X", None)], "a")
            .await;

        assert_eq!(summary.stored, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(storage.count_jobs(Some("a")).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn reingest_is_idempotent() {
        let storage = test_storage().await;
        let reconciler = Reconciler::new(storage.clone());
        let batch = vec![record("r-1", Some("Acme")), record("r-2", Some("Initech"))];

        reconciler.reconcile(batch.clone(), "linkedin").await;
        let second = reconciler.reconcile(batch, "linkedin").await;

        assert_eq!(second, ReconcileSummary { stored: 0, skipped: 2, failed: 0 });
        assert_eq!(storage.count_jobs(None).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn same_external_id_on_other_platform_is_distinct() {
        let storage = test_storage().await;
        let reconciler = Reconciler::new(storage.clone());

        reconciler.reconcile(vec![record("shared", None)], "indeed").await;
        let summary = reconciler.reconcile(vec![record("shared", None)], "glassdoor").await;

        assert_eq!(summary.stored, 1);
        assert_eq!(storage.count_jobs(None).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn organization_failure_stores_job_without_one() {
        let storage = test_storage().await;
        let flaky = FlakyStore {
            inner: storage.clone(),
            fail_insert_for: None,
            fail_organizations: true,
        };
        let reconciler = Reconciler::new(Arc::new(flaky));

        let summary = reconciler.reconcile(vec![record("o-1", Some("Acme"))], "indeed").await;
        assert_eq!(summary.stored, 1);

        let page = storage.list_jobs(&all_jobs()).await.unwrap();
        assert_eq!(page.jobs.len(), 1);
        assert!(page.jobs[0].job.organization_id.is_none());
        assert!(storage.get_organization("Acme").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn insert_failure_continues_with_rest_of_batch() {
        let storage = test_storage().await;
        let flaky = FlakyStore {
            inner: storage.clone(),
            fail_insert_for: Some("bad"),
            fail_organizations: false,
        };
        let reconciler = Reconciler::new(Arc::new(flaky));

        let summary = reconciler
            .reconcile(
                vec![record("ok-1", None), record("bad", None), record("ok-2", None)],
                "indeed",
            )
            .await;

        assert_eq!(summary, ReconcileSummary { stored: 2, skipped: 0, failed: 1 });
        assert_eq!(summary.total(), 3);
        assert_eq!(storage.count_jobs(None).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn persisted_job_carries_score_and_expiry() {
        let storage = test_storage().await;
        let reconciler = Reconciler::new(storage.clone()).with_ttl_days(10).unwrap();
        let rec = record("s-1", Some("Acme"));
        let posted_at = rec.posted_at;

        reconciler.reconcile(vec![rec], "indeed").await;

        let page = storage.list_jobs(&all_jobs()).await.unwrap();
        let job = &page.jobs[0].job;
        // base + remote + fresh
        assert_eq!(job.relevance_score, 85);
        let expected = posted_at + Duration::days(10);
        assert!((job.expires_at - expected).num_milliseconds().abs() < 1);
        assert_eq!(page.jobs[0].organization_name.as_deref(), Some("Acme"));
    }

    #[tokio::test]
    async fn invalid_ttl_is_rejected() {
        let storage = test_storage().await;
        for days in [0, -5, i64::MAX] {
            assert!(matches!(
                Reconciler::new(storage.clone()).with_ttl_days(days),
                Err(JobflowError::Validation { .. })
            ));
        }
    }

    #[tokio::test]
    async fn empty_batch_is_a_no_op() {
        let storage = test_storage().await;
        let summary = Reconciler::new(storage.clone()).reconcile(Vec::new(), "indeed").await;
        assert_eq!(summary, ReconcileSummary::default());
    }
}
