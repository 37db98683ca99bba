//! Workflow runs: the in-memory status store and the orchestrator that
//! executes a run across its platforms.
//!
//! A run moves `running → completed | failed` exactly once. The task spawned
//! by [`Orchestrator::start`] is the only writer of its run's entry; status
//! queries only read.

use std::any::Any;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;

use chrono::Utc;
use indexmap::IndexMap;
use jobflow_shared::{
    FetchRequest, JobflowError, Result, TriggerKind, WorkflowId, WorkflowRun, WorkflowStatus,
};
use jobflow_sources::AdapterRegistry;
use jobflow_storage::JobStore;
use tokio::sync::watch;
use tracing::{error, info, instrument, warn};

use crate::reconcile::{ReconcileSummary, Reconciler};
use crate::retention::RetentionSweeper;

// ---------------------------------------------------------------------------
// WorkflowStore
// ---------------------------------------------------------------------------

/// Process-wide registry of workflow runs, in insertion order.
#[derive(Debug, Default)]
pub struct WorkflowStore {
    runs: RwLock<IndexMap<WorkflowId, Entry>>,
}

/// A run plus the channel that publishes its status changes.
#[derive(Debug)]
struct Entry {
    run: WorkflowRun,
    status: watch::Sender<WorkflowStatus>,
}

impl WorkflowStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, run: WorkflowRun) {
        let (status, _) = watch::channel(run.status);
        let mut runs = self.runs.write().unwrap_or_else(PoisonError::into_inner);
        runs.insert(run.id, Entry { run, status });
    }

    /// Snapshot of one run.
    pub fn get(&self, id: WorkflowId) -> Option<WorkflowRun> {
        let runs = self.runs.read().unwrap_or_else(PoisonError::into_inner);
        runs.get(&id).map(|entry| entry.run.clone())
    }

    /// Receiver for status changes of run `id`, starting at its current status.
    pub fn subscribe(&self, id: WorkflowId) -> Option<watch::Receiver<WorkflowStatus>> {
        let runs = self.runs.read().unwrap_or_else(PoisonError::into_inner);
        runs.get(&id).map(|entry| entry.status.subscribe())
    }

    /// Snapshot of every run, oldest first.
    pub fn list_all(&self) -> Vec<WorkflowRun> {
        let runs = self.runs.read().unwrap_or_else(PoisonError::into_inner);
        runs.values().map(|entry| entry.run.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.runs.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Mutate a running entry in place. Terminal runs are frozen.
    ///
    /// Subscribers are notified when `f` changes the status.
    pub fn update(&self, id: WorkflowId, f: impl FnOnce(&mut WorkflowRun)) -> Result<()> {
        let mut runs = self.runs.write().unwrap_or_else(PoisonError::into_inner);
        let entry = runs
            .get_mut(&id)
            .ok_or_else(|| JobflowError::Workflow(format!("unknown workflow {id}")))?;

        if entry.run.status.is_terminal() {
            return Err(JobflowError::Workflow(format!(
                "workflow {id} is already {}",
                entry.run.status
            )));
        }

        let before = entry.run.status;
        f(&mut entry.run);
        if entry.run.status != before {
            entry.status.send_replace(entry.run.status);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Starts workflow runs and answers status queries.
#[derive(Clone)]
pub struct Orchestrator {
    registry: AdapterRegistry,
    reconciler: Reconciler,
    sweeper: RetentionSweeper,
    workflows: Arc<WorkflowStore>,
}

impl Orchestrator {
    /// An orchestrator with default retention settings and a fresh run store.
    pub fn new(registry: AdapterRegistry, store: Arc<dyn JobStore>) -> Self {
        Self::from_parts(
            registry,
            Reconciler::new(store.clone()),
            RetentionSweeper::new(store),
            Arc::new(WorkflowStore::new()),
        )
    }

    pub fn from_parts(
        registry: AdapterRegistry,
        reconciler: Reconciler,
        sweeper: RetentionSweeper,
        workflows: Arc<WorkflowStore>,
    ) -> Self {
        Self {
            registry,
            reconciler,
            sweeper,
            workflows,
        }
    }

    pub fn workflows(&self) -> &Arc<WorkflowStore> {
        &self.workflows
    }

    /// Validate `request`, register a `running` run, and execute it in the
    /// background. Returns as soon as the run is registered.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&self, request: FetchRequest, trigger: TriggerKind) -> Result<WorkflowId> {
        request.validate()?;

        let id = WorkflowId::new();
        self.workflows
            .insert(WorkflowRun::started(id, request.clone(), trigger));
        info!(
            workflow_id = %id,
            ?trigger,
            platforms = ?request.platforms,
            location = %request.location,
            "workflow started"
        );

        tokio::spawn(self.clone().supervise(id, request));
        Ok(id)
    }

    pub fn status(&self, id: WorkflowId) -> Option<WorkflowRun> {
        self.workflows.get(id)
    }

    pub fn list_all(&self) -> Vec<WorkflowRun> {
        self.workflows.list_all()
    }

    /// Wait until run `id` reaches a terminal state. `None` for unknown ids.
    pub async fn wait(&self, id: WorkflowId) -> Option<WorkflowRun> {
        let mut status = self.workflows.subscribe(id)?;
        status.wait_for(|s| s.is_terminal()).await.ok()?;
        self.workflows.get(id)
    }

    /// Owns the run's terminal transition. Errors and panics from the
    /// execution task both end in `failed`.
    async fn supervise(self, id: WorkflowId, request: FetchRequest) {
        let started = Instant::now();

        let worker = tokio::spawn({
            let this = self.clone();
            async move { this.execute(id, request).await }
        });

        let outcome = match worker.await {
            Ok(result) => result,
            Err(e) if e.is_panic() => Err(JobflowError::Workflow(format!(
                "workflow panicked: {}",
                panic_message(e.into_panic())
            ))),
            Err(e) => Err(JobflowError::Workflow(e.to_string())),
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        let finished_at = Utc::now();

        let update = match outcome {
            Ok(()) => {
                info!(workflow_id = %id, elapsed_ms, "workflow completed");
                self.workflows.update(id, |run| {
                    run.status = WorkflowStatus::Completed;
                    run.completed_at = Some(finished_at);
                })
            }
            Err(e) => {
                error!(workflow_id = %id, elapsed_ms, error = %e, "workflow failed");
                let message = e.to_string();
                self.workflows.update(id, |run| {
                    run.status = WorkflowStatus::Failed;
                    run.error = Some(message);
                    run.completed_at = Some(finished_at);
                })
            }
        };

        if let Err(e) = update {
            error!(workflow_id = %id, error = %e, "could not record workflow outcome");
        }
    }

    /// Fetch and reconcile each platform in order, then sweep once.
    #[instrument(skip_all, fields(workflow_id = %id))]
    async fn execute(&self, id: WorkflowId, request: FetchRequest) -> Result<()> {
        for platform in &request.platforms {
            match self.fetch_and_reconcile(platform, &request).await {
                Ok(summary) => self.workflows.update(id, |run| {
                    run.progress.completed += 1;
                    run.jobs_stored += summary.stored;
                    run.jobs_skipped += summary.skipped;
                })?,
                Err(e) => {
                    warn!(%platform, error = %e, "platform failed, continuing");
                    self.workflows.update(id, |run| run.progress.failed += 1)?;
                }
            }
        }

        let swept = self.sweeper.sweep(Utc::now()).await;
        info!(swept, "post-run retention sweep done");
        Ok(())
    }

    async fn fetch_and_reconcile(
        &self,
        platform: &str,
        request: &FetchRequest,
    ) -> Result<ReconcileSummary> {
        let adapter = self
            .registry
            .get(platform)
            .ok_or_else(|| JobflowError::adapter(platform, "unsupported platform"))?;

        let batch = adapter.fetch(&request.location, &request.keywords).await?;
        info!(platform = adapter.platform(), fetched = batch.len(), "batch fetched");

        if batch.is_empty() {
            return Ok(ReconcileSummary::default());
        }
        Ok(self.reconciler.reconcile(batch, adapter.platform()).await)
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
