//! Ingestion orchestration for Jobflow.
//!
//! This crate ties source adapters and storage together:
//! - [`scoring`]: Relevance score for a normalized record
//! - [`reconcile`]: Dedup, organization resolution, and persistence of a batch
//! - [`retention`]: Purge of postings past the retention window
//! - [`workflow`]: Workflow runs, their status store, and the orchestrator
//! - [`scheduler`]: Cron cadence and the on-demand trigger

pub mod reconcile;
pub mod retention;
pub mod scheduler;
pub mod scoring;
pub mod workflow;

pub use reconcile::{ReconcileSummary, Reconciler};
pub use retention::RetentionSweeper;
pub use scheduler::{Scheduler, parse_cron};
pub use scoring::relevance_score;
pub use workflow::{Orchestrator, WorkflowStore};
