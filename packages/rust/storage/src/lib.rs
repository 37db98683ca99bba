//! libSQL storage layer for persisted job postings and organizations.
//!
//! The [`Storage`] struct wraps a local libSQL database. The ingestion
//! pipeline talks to it through the [`JobStore`] trait; the read-only
//! listing and statistics view lives in [`query`].
//!
//! **Access rules:**
//! - `jobflow serve` / `jobflow fetch`: read-write via [`Storage::open`]
//! - `jobflow jobs` / `jobflow stats`: read-only via [`Storage::open_readonly`]

mod migrations;
pub mod query;

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use jobflow_shared::{JobRecord, JobflowError, Organization, PersistedJob, Result};
use libsql::{Connection, Database, params};
use uuid::Uuid;

pub use query::{JobFilter, JobListing, JobPage, JobStats};

// ---------------------------------------------------------------------------
// JobStore
// ---------------------------------------------------------------------------

/// Outcome of inserting a job under the `(external_id, platform)` constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    /// A new row was written with this identifier.
    Inserted(String),
    /// A row with the same dedup key already exists; nothing was written.
    AlreadyExists,
}

/// The storage operations the ingestion pipeline depends on.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Look up the identifier of the job stored under the dedup key.
    async fn find_job(&self, external_id: &str, platform: &str) -> Result<Option<String>>;

    /// Insert-or-get an organization by name. Existing attributes are kept.
    async fn upsert_organization(&self, name: &str, industry: Option<&str>) -> Result<String>;

    /// Insert a job. A dedup-key conflict yields [`InsertOutcome::AlreadyExists`].
    async fn insert_job(&self, job: &PersistedJob) -> Result<InsertOutcome>;

    /// Delete every job posted strictly before `cutoff`. Returns the count.
    async fn delete_jobs_posted_before(&self, cutoff: DateTime<Utc>) -> Result<u64>;
}

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    readonly: bool,
}

impl Storage {
    /// Open or create a database at `path` in read-write mode.
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| JobflowError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| JobflowError::Storage(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| JobflowError::Storage(e.to_string()))?;

        let storage = Self {
            db,
            conn,
            readonly: false,
        };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Open a database at `path` in read-only mode (listing and stats).
    pub async fn open_readonly(path: &Path) -> Result<Self> {
        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| JobflowError::Storage(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| JobflowError::Storage(e.to_string()))?;

        Ok(Self {
            db,
            conn,
            readonly: true,
        })
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn
                    .execute_batch(migration.sql)
                    .await
                    .map_err(|e| {
                        JobflowError::Storage(format!(
                            "migration v{} failed: {e}",
                            migration.version
                        ))
                    })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    /// Ensure we're in read-write mode before writing.
    fn check_writable(&self) -> Result<()> {
        if self.readonly {
            return Err(JobflowError::Storage(
                "database is opened in read-only mode".into(),
            ));
        }
        Ok(())
    }

    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }

    // -----------------------------------------------------------------------
    // Organization operations
    // -----------------------------------------------------------------------

    /// Look up an organization by its unique name.
    pub async fn get_organization(&self, name: &str) -> Result<Option<Organization>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, industry FROM organizations WHERE name = ?1",
                params![name],
            )
            .await
            .map_err(|e| JobflowError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(Organization {
                id: row
                    .get::<String>(0)
                    .map_err(|e| JobflowError::Storage(e.to_string()))?,
                name: name.to_string(),
                industry: row.get::<String>(1).ok(),
            })),
            Ok(None) => Ok(None),
            Err(e) => Err(JobflowError::Storage(e.to_string())),
        }
    }

    /// Count stored jobs, optionally restricted to one platform.
    pub async fn count_jobs(&self, platform: Option<&str>) -> Result<u64> {
        let mut rows = self
            .conn
            .query(
                "SELECT COUNT(*) FROM jobs WHERE ?1 IS NULL OR platform = ?1",
                params![platform],
            )
            .await
            .map_err(|e| JobflowError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(row.get::<i64>(0).map(|n| n as u64).unwrap_or(0)),
            Ok(None) => Ok(0),
            Err(e) => Err(JobflowError::Storage(e.to_string())),
        }
    }
}

#[async_trait]
impl JobStore for Storage {
    async fn find_job(&self, external_id: &str, platform: &str) -> Result<Option<String>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id FROM jobs WHERE external_id = ?1 AND platform = ?2",
                params![external_id, platform],
            )
            .await
            .map_err(|e| JobflowError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(
                row.get::<String>(0)
                    .map_err(|e| JobflowError::Storage(e.to_string()))?,
            )),
            Ok(None) => Ok(None),
            Err(e) => Err(JobflowError::Storage(e.to_string())),
        }
    }

    async fn upsert_organization(&self, name: &str, industry: Option<&str>) -> Result<String> {
        self.check_writable()?;
        let id = Uuid::now_v7().to_string();
        self.conn
            .execute(
                "INSERT INTO organizations (id, name, industry, created_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(name) DO NOTHING",
                params![id.as_str(), name, industry, timestamp(&Utc::now())],
            )
            .await
            .map_err(|e| JobflowError::Storage(e.to_string()))?;

        // Either our row or the one that won the conflict.
        self.get_organization(name)
            .await?
            .map(|org| org.id)
            .ok_or_else(|| JobflowError::Storage(format!("organization '{name}' vanished")))
    }

    async fn insert_job(&self, job: &PersistedJob) -> Result<InsertOutcome> {
        self.check_writable()?;
        let record = &job.record;
        let requirements = serde_json::to_string(&record.requirements)
            .map_err(|e| JobflowError::Storage(format!("encode requirements: {e}")))?;

        let changed = self
            .conn
            .execute(
                "INSERT INTO jobs (id, external_id, platform, title, organization_id, location,
                                   description, requirements_json, salary_min, salary_max,
                                   currency, job_type, is_remote, source_url, posted_at,
                                   expires_at, relevance_score, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)
                 ON CONFLICT(external_id, platform) DO NOTHING",
                params![
                    job.id.as_str(),
                    record.external_id.as_str(),
                    record.platform.as_str(),
                    record.title.as_str(),
                    job.organization_id.as_deref(),
                    record.location.as_str(),
                    record.description.as_str(),
                    requirements,
                    record.salary_min,
                    record.salary_max,
                    record.currency.as_str(),
                    record.job_type.as_str(),
                    i64::from(record.is_remote),
                    record.source_url.as_str(),
                    timestamp(&record.posted_at),
                    timestamp(&job.expires_at),
                    i64::from(job.relevance_score),
                    timestamp(&job.created_at),
                ],
            )
            .await
            .map_err(|e| JobflowError::Storage(e.to_string()))?;

        if changed == 0 {
            Ok(InsertOutcome::AlreadyExists)
        } else {
            Ok(InsertOutcome::Inserted(job.id.clone()))
        }
    }

    async fn delete_jobs_posted_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        self.check_writable()?;
        self.conn
            .execute(
                "DELETE FROM jobs WHERE posted_at < ?1",
                params![timestamp(&cutoff)],
            )
            .await
            .map_err(|e| JobflowError::Storage(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Row helpers
// ---------------------------------------------------------------------------

/// Fixed-width UTC timestamp so that text comparison matches time order.
pub(crate) fn timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| JobflowError::Storage(format!("invalid date: {e}")))
}

/// Column list matching [`row_to_listing`], jobs aliased `j`, organizations `o`.
pub(crate) const LISTING_COLUMNS: &str = "j.id, j.external_id, j.platform, j.title, \
    j.organization_id, j.location, j.description, j.requirements_json, j.salary_min, \
    j.salary_max, j.currency, j.job_type, j.is_remote, j.source_url, j.posted_at, \
    j.expires_at, j.relevance_score, j.created_at, o.name, o.industry";

/// Convert a database row selected with [`LISTING_COLUMNS`] to a [`JobListing`].
pub(crate) fn row_to_listing(row: &libsql::Row) -> Result<JobListing> {
    let text = |idx: i32| -> Result<String> {
        row.get::<String>(idx)
            .map_err(|e| JobflowError::Storage(e.to_string()))
    };

    let requirements: Vec<String> = serde_json::from_str(&text(7)?)
        .map_err(|e| JobflowError::Storage(format!("invalid requirements: {e}")))?;
    let organization_name = row.get::<String>(18).ok();

    let record = JobRecord {
        external_id: text(1)?,
        platform: text(2)?,
        title: text(3)?,
        organization: organization_name.clone(),
        industry: row.get::<String>(19).ok(),
        location: text(5)?,
        description: text(6)?,
        requirements,
        salary_min: row.get::<i64>(8).ok(),
        salary_max: row.get::<i64>(9).ok(),
        currency: text(10)?,
        job_type: text(11)?,
        is_remote: row.get::<i64>(12).unwrap_or(0) != 0,
        source_url: text(13)?,
        posted_at: parse_timestamp(&text(14)?)?,
    };

    Ok(JobListing {
        job: PersistedJob {
            id: text(0)?,
            organization_id: row.get::<String>(4).ok(),
            record,
            expires_at: parse_timestamp(&text(15)?)?,
            relevance_score: row.get::<i64>(16).unwrap_or(0).clamp(0, 100) as u8,
            created_at: parse_timestamp(&text(17)?)?,
        },
        organization_name,
    })
}
