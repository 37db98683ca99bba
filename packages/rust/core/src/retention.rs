//! Retention sweep: purge postings older than the retention window.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use jobflow_shared::{RETENTION_DAYS, Result, day_window};
use jobflow_storage::JobStore;
use tracing::{info, instrument, warn};

#[derive(Clone)]
pub struct RetentionSweeper {
    store: Arc<dyn JobStore>,
    window: Duration,
}

impl RetentionSweeper {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self {
            store,
            window: Duration::days(RETENTION_DAYS),
        }
    }

    /// Override the window. Fails for counts below one day.
    pub fn with_days(mut self, days: i64) -> Result<Self> {
        self.window = day_window(days)?;
        Ok(self)
    }

    /// Delete every job posted strictly before `now - window`.
    ///
    /// Returns the number of rows removed. A storage failure is logged and
    /// reported as zero.
    #[instrument(skip_all, fields(%now))]
    pub async fn sweep(&self, now: DateTime<Utc>) -> u64 {
        let cutoff = now - self.window;

        match self.store.delete_jobs_posted_before(cutoff).await {
            Ok(deleted) => {
                info!(deleted, %cutoff, "retention sweep finished");
                deleted
            }
            Err(e) => {
                warn!(error = %e, %cutoff, "retention sweep failed");
                0
            }
        }
    }
}
