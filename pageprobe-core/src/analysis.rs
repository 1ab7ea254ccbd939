use crate::data::JobStatus;
use crate::error::Result;
use crate::store::ResultStore;
use pageprobe_scanner::{AnalysisResult, CancellationToken, ScanError, Scanner};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// How an analysis run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Completed { result_id: i64 },
    Failed { reason: String },
    /// Stopped before finishing; neither a result nor a terminal status was written.
    Cancelled,
}

/// Writes a finished analysis: replace the job's aggregate row, then add its
/// broken links one by one. Only the aggregate write can fail the run; a
/// broken link that cannot be stored is logged and skipped.
pub fn finalize(store: &dyn ResultStore, job_id: i64, result: &AnalysisResult) -> Result<i64> {
    let result_id = store.replace_result(job_id, result)?;

    for link in &result.broken_links {
        if let Err(e) = store.insert_broken_link(result_id, link) {
            warn!(
                "Failed to store broken link {} for job {}: {}",
                link.url, job_id, e
            );
        }
    }

    Ok(result_id)
}

fn mark(store: &dyn ResultStore, job_id: i64, status: JobStatus) {
    if let Err(e) = store.set_job_status(job_id, status) {
        warn!(
            "Failed to set job {} status to {}: {}",
            job_id,
            status.as_str(),
            e
        );
    }
}

/// Analyzes `target` for `job_id` and reports the outcome through the store:
/// `completed` once the result is written, `failed` on any fatal step.
pub async fn run_analysis(
    store: &dyn ResultStore,
    scanner: &Scanner,
    job_id: i64,
    target: &str,
    cancel: &CancellationToken,
) -> JobOutcome {
    info!("Starting analysis for job {}: {}", job_id, target);

    let result = match scanner.scan(target, cancel).await {
        Ok(result) => result,
        Err(ScanError::Cancelled) => {
            info!("Analysis for job {} cancelled", job_id);
            return JobOutcome::Cancelled;
        }
        Err(e) => {
            warn!(
                "Analysis for job {} failed ({}): {}",
                job_id,
                e.kind(),
                e
            );
            mark(store, job_id, JobStatus::Failed);
            return JobOutcome::Failed {
                reason: e.to_string(),
            };
        }
    };

    let outcome = complete(store, job_id, &result, cancel);
    if matches!(outcome, JobOutcome::Completed { .. }) {
        info!("Analysis completed for job {}: {}", job_id, target);
    }
    outcome
}

/// Persists a finished scan unless the run was stopped in the meantime, in
/// which case nothing is written and the status set by the stop is kept.
pub fn complete(
    store: &dyn ResultStore,
    job_id: i64,
    result: &AnalysisResult,
    cancel: &CancellationToken,
) -> JobOutcome {
    if cancel.is_cancelled() {
        info!("Job {} stopped before its result was saved", job_id);
        return JobOutcome::Cancelled;
    }

    match finalize(store, job_id, result) {
        Ok(result_id) => {
            mark(store, job_id, JobStatus::Completed);
            JobOutcome::Completed { result_id }
        }
        Err(e) => {
            warn!("Failed to save results for job {}: {}", job_id, e);
            mark(store, job_id, JobStatus::Failed);
            JobOutcome::Failed {
                reason: e.to_string(),
            }
        }
    }
}

struct ActiveRun {
    generation: u64,
    token: CancellationToken,
}

/// Launches analysis runs as independent tasks and keeps a cancellation
/// token for each so they can be stopped while in flight.
pub struct JobRunner {
    store: Arc<dyn ResultStore>,
    scanner: Arc<Scanner>,
    active: Arc<Mutex<HashMap<i64, ActiveRun>>>,
    generation: AtomicU64,
}

impl JobRunner {
    pub fn new(store: Arc<dyn ResultStore>, scanner: Arc<Scanner>) -> Self {
        Self {
            store,
            scanner,
            active: Arc::new(Mutex::new(HashMap::new())),
            generation: AtomicU64::new(0),
        }
    }

    /// Marks the job `running` and spawns its analysis. Restarting a job that
    /// is still running cancels the earlier run first.
    pub fn start(&self, job_id: i64, url: String) -> Result<JoinHandle<JobOutcome>> {
        self.store.set_job_status(job_id, JobStatus::Running)?;

        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();
        {
            let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
            let previous = active.insert(
                job_id,
                ActiveRun {
                    generation,
                    token: token.clone(),
                },
            );
            if let Some(previous) = previous {
                previous.token.cancel();
            }
        }

        let store = self.store.clone();
        let scanner = self.scanner.clone();
        let active = self.active.clone();

        Ok(tokio::spawn(async move {
            let outcome = run_analysis(store.as_ref(), &scanner, job_id, &url, &token).await;

            let mut active = active.lock().unwrap_or_else(|e| e.into_inner());
            if active
                .get(&job_id)
                .is_some_and(|run| run.generation == generation)
            {
                active.remove(&job_id);
            }

            outcome
        }))
    }

    /// Starts every job concurrently. Jobs that cannot be marked `running`
    /// are logged and left out.
    pub fn start_many(&self, jobs: Vec<(i64, String)>) -> Vec<(i64, JoinHandle<JobOutcome>)> {
        let mut handles = Vec::with_capacity(jobs.len());
        for (job_id, url) in jobs {
            match self.start(job_id, url) {
                Ok(handle) => handles.push((job_id, handle)),
                Err(e) => warn!("Failed to start job {}: {}", job_id, e),
            }
        }
        handles
    }

    /// Puts the job back to `queued` and interrupts its run if one is in
    /// flight. Returns whether a running analysis was signalled.
    pub fn stop(&self, job_id: i64) -> Result<bool> {
        let run = {
            let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
            active.remove(&job_id)
        };

        let signalled = match run {
            Some(run) => {
                run.token.cancel();
                true
            }
            None => false,
        };

        self.store.set_job_status(job_id, JobStatus::Queued)?;
        info!("Stopped job {} (in flight: {})", job_id, signalled);
        Ok(signalled)
    }

    pub fn stop_all(&self) -> Vec<i64> {
        let job_ids = self.active_jobs();
        for job_id in &job_ids {
            if let Err(e) = self.stop(*job_id) {
                warn!("Failed to stop job {}: {}", job_id, e);
            }
        }
        job_ids
    }

    pub fn active_jobs(&self) -> Vec<i64> {
        let active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        let mut ids: Vec<i64> = active.keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}
