//! SQL migration definitions for the Jobflow database.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a batch of SQL statements.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "Initial schema: organizations, jobs",
        sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version   INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Hiring organizations, created lazily on first sighting
CREATE TABLE IF NOT EXISTS organizations (
    id         TEXT PRIMARY KEY,
    name       TEXT NOT NULL UNIQUE,
    industry   TEXT,
    created_at TEXT NOT NULL
);

-- Persisted postings; (external_id, platform) is the dedup key
CREATE TABLE IF NOT EXISTS jobs (
    id                TEXT PRIMARY KEY,
    external_id       TEXT NOT NULL,
    platform          TEXT NOT NULL,
    title             TEXT NOT NULL,
    organization_id   TEXT REFERENCES organizations(id) ON DELETE SET NULL,
    location          TEXT NOT NULL,
    description       TEXT NOT NULL,
    requirements_json TEXT NOT NULL DEFAULT '[]',
    salary_min        INTEGER,
    salary_max        INTEGER,
    currency          TEXT NOT NULL,
    job_type          TEXT NOT NULL,
    is_remote         INTEGER NOT NULL DEFAULT 0,
    source_url        TEXT NOT NULL,
    posted_at         TEXT NOT NULL,
    expires_at        TEXT NOT NULL,
    relevance_score   INTEGER NOT NULL,
    created_at        TEXT NOT NULL,
    UNIQUE(external_id, platform)
);

CREATE INDEX IF NOT EXISTS idx_jobs_posted_at ON jobs(posted_at);
CREATE INDEX IF NOT EXISTS idx_jobs_platform ON jobs(platform);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
    }]
}
