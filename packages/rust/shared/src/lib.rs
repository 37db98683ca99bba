//! Shared types, error model, and configuration for Jobflow.
//!
//! This crate is the foundation depended on by all other Jobflow crates.
//! It provides:
//! - [`JobflowError`]: the unified error type
//! - Domain types ([`JobRecord`], [`PersistedJob`], [`WorkflowRun`], [`WorkflowId`])
//! - Configuration ([`AppConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DefaultsConfig, PlatformConfig, RetentionConfig, ScheduleConfig, StorageConfig,
    config_dir, config_file_path, init_config, load_config, load_config_from,
};
pub use error::{JobflowError, Result};
pub use types::{
    FetchRequest, JOB_TTL_DAYS, JobRecord, MAX_RETENTION_DAYS, Organization, PersistedJob,
    RETENTION_DAYS, TriggerKind, WorkflowId, WorkflowProgress, WorkflowRun, WorkflowStatus,
    day_window,
};
