use tracing::{debug, info, warn};

use crate::error::{DocshiftError, ErrorKind, Result};
use crate::job::{ConversionJob, JobEventBroadcaster, JobFailure, JobStore, TransitionError};
use crate::storage::StorageGateway;

use super::config::PipelineSettings;

/// State shared between the public pipeline handle, the workers and the
/// retention sweeper.
pub(crate) struct PipelineCore {
    pub(crate) storage: StorageGateway,
    pub(crate) jobs: JobStore,
    pub(crate) settings: PipelineSettings,
}

impl PipelineCore {
    pub(crate) fn new(
        storage: StorageGateway,
        settings: PipelineSettings,
        events: JobEventBroadcaster,
    ) -> Self {
        Self {
            storage,
            jobs: JobStore::new(events),
            settings,
        }
    }

    /// Records `err` as the job's failure. A job that already reached a
    /// terminal state keeps its outcome.
    pub(crate) fn fail(&self, job_id: &str, err: &DocshiftError) {
        match self.jobs.mark_failed(job_id, JobFailure::from_error(err)) {
            Ok(_) => warn!(job_id = %job_id, kind = %err.kind(), "Job failed: {}", err),
            Err(e) => debug!(job_id = %job_id, "Not recording failure: {}", e),
        }
    }

    pub(crate) fn cancel(&self, job_id: &str) -> Result<ConversionJob> {
        let job = self.get(job_id)?;
        if job.is_terminal() {
            return Ok(job);
        }

        let failure = JobFailure::from_error(&DocshiftError::Cancelled(job_id.to_string()));
        match self.jobs.mark_failed(job_id, failure) {
            Ok(job) => {
                info!(job_id = %job_id, "Job cancelled");
                Ok(job)
            }
            // finished in the meantime
            Err(TransitionError::Illegal { .. }) => self.get(job_id),
            Err(e) => Err(e.into()),
        }
    }

    /// Deletes the job's files and forgets it, cancelling it first if it is
    /// still active.
    pub(crate) fn discard(&self, job_id: &str) -> Result<()> {
        let job = self.cancel(job_id)?;

        if let Some(ref input) = job.input_path {
            self.storage.delete(input)?;
        }
        if let Some(ref output) = job.output_path {
            self.storage.delete(output)?;
        }

        self.jobs.remove(job_id);
        debug!(job_id = %job_id, "Job discarded");
        Ok(())
    }

    /// Discards terminal jobs that completed longer ago than the retention
    /// window. Returns how many were removed.
    pub(crate) fn purge_expired(&self) -> usize {
        let Some(retention) = self.settings.retention else {
            return 0;
        };
        let Ok(retention) = chrono::Duration::from_std(retention) else {
            return 0;
        };

        let cutoff = chrono::Utc::now() - retention;
        let mut purged = 0;
        for job_id in self.jobs.expired(cutoff) {
            match self.discard(&job_id) {
                Ok(()) => purged += 1,
                Err(e) => warn!(job_id = %job_id, "Failed to purge expired job: {}", e),
            }
        }

        if purged > 0 {
            info!(purged, "Purged expired jobs");
        }
        purged
    }

    /// Marks every job that is still active as failed. Used once the workers
    /// are gone, so no job is left reporting progress that will never come.
    pub(crate) fn fail_active(&self, reason: &str) -> usize {
        let mut failed = 0;
        for job_id in self.jobs.active_ids() {
            let failure = JobFailure::new(ErrorKind::Worker, reason);
            if self.jobs.mark_failed(&job_id, failure).is_ok() {
                failed += 1;
            }
        }
        if failed > 0 {
            warn!(failed, "Failed jobs left active at shutdown");
        }
        failed
    }

    pub(crate) fn get(&self, job_id: &str) -> Result<ConversionJob> {
        self.jobs
            .get(job_id)
            .ok_or_else(|| DocshiftError::NotFound(format!("job '{}'", job_id)))
    }
}
