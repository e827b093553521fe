//! In-memory job store.
//!
//! Every state change goes through [`JobStore::transition`], which checks it
//! against the job state machine under a single mutex, wakes waiters and
//! publishes a [`JobEvent`].

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::broadcast;

use crate::error::DocshiftError;
use crate::job::events::{JobEvent, JobEventBroadcaster};
use crate::job::model::{ConversionJob, JobFailure, JobState};
use crate::storage::StoredUpload;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Unknown job: {0}")]
    UnknownJob(String),

    #[error("Job {job_id} cannot move from {from} to {to}")]
    Illegal {
        job_id: String,
        from: JobState,
        to: JobState,
    },
}

impl From<TransitionError> for DocshiftError {
    fn from(err: TransitionError) -> Self {
        match err {
            TransitionError::UnknownJob(id) => DocshiftError::NotFound(format!("job '{}'", id)),
            TransitionError::Illegal { job_id, from, .. } => DocshiftError::JobNotComplete {
                job_id,
                state: from,
            },
        }
    }
}

pub struct JobStore {
    jobs: Mutex<HashMap<String, ConversionJob>>,
    changed: Condvar,
    events: JobEventBroadcaster,
}

impl JobStore {
    pub fn new(events: JobEventBroadcaster) -> Self {
        Self {
            jobs: Mutex::new(HashMap::new()),
            changed: Condvar::new(),
            events,
        }
    }

    /// Records a new job. The job id must not be known yet.
    pub fn insert(&self, job: ConversionJob) -> ConversionJob {
        let snapshot = job.clone();
        self.lock().insert(job.job_id.clone(), job);
        self.events.send(JobEvent::for_job(&snapshot));
        snapshot
    }

    pub fn get(&self, job_id: &str) -> Option<ConversionJob> {
        self.lock().get(job_id).cloned()
    }

    /// All jobs, newest first.
    pub fn list(&self) -> Vec<ConversionJob> {
        let mut jobs: Vec<ConversionJob> = self.lock().values().cloned().collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        jobs
    }

    pub fn ids(&self) -> HashSet<String> {
        self.lock().keys().cloned().collect()
    }

    pub fn is_active(&self, job_id: &str) -> bool {
        self.lock()
            .get(job_id)
            .is_some_and(|job| !job.is_terminal())
    }

    /// Ids of jobs that have not reached a terminal state.
    pub fn active_ids(&self) -> Vec<String> {
        self.lock()
            .values()
            .filter(|job| !job.is_terminal())
            .map(|job| job.job_id.clone())
            .collect()
    }

    /// Ids of terminal jobs that completed before `cutoff`.
    pub fn expired(&self, cutoff: DateTime<Utc>) -> Vec<String> {
        self.lock()
            .values()
            .filter(|job| job.is_terminal())
            .filter(|job| job.completed_at.is_some_and(|at| at < cutoff))
            .map(|job| job.job_id.clone())
            .collect()
    }

    pub fn mark_running(
        &self,
        job_id: &str,
        upload: &StoredUpload,
    ) -> Result<ConversionJob, TransitionError> {
        self.transition(job_id, JobState::Running, |job| {
            job.input_path = Some(upload.path.clone());
            job.input_size = Some(upload.size_bytes);
            job.started_at = Some(Utc::now());
        })
    }

    pub fn mark_succeeded(
        &self,
        job_id: &str,
        output_path: PathBuf,
    ) -> Result<ConversionJob, TransitionError> {
        self.transition(job_id, JobState::Succeeded, |job| {
            job.output_path = Some(output_path);
        })
    }

    pub fn mark_failed(
        &self,
        job_id: &str,
        failure: JobFailure,
    ) -> Result<ConversionJob, TransitionError> {
        self.transition(job_id, JobState::Failed, |job| {
            job.failure = Some(failure);
        })
    }

    fn transition<F>(
        &self,
        job_id: &str,
        next: JobState,
        apply: F,
    ) -> Result<ConversionJob, TransitionError>
    where
        F: FnOnce(&mut ConversionJob),
    {
        let snapshot = {
            let mut jobs = self.lock();
            let job = jobs
                .get_mut(job_id)
                .ok_or_else(|| TransitionError::UnknownJob(job_id.to_string()))?;

            if !job.state.can_transition_to(next) {
                return Err(TransitionError::Illegal {
                    job_id: job_id.to_string(),
                    from: job.state,
                    to: next,
                });
            }

            apply(job);
            job.state = next;
            if next.is_terminal() {
                job.completed_at = Some(Utc::now());
            }
            job.clone()
        };

        self.changed.notify_all();
        self.events.send(JobEvent::for_job(&snapshot));
        Ok(snapshot)
    }

    /// Forgets a job. Waiters blocked on it return immediately.
    pub fn remove(&self, job_id: &str) -> Option<ConversionJob> {
        let removed = self.lock().remove(job_id);
        self.changed.notify_all();
        removed
    }

    /// Blocks until the job is terminal or `timeout` elapses, then returns
    /// its snapshot. `None` when the job is unknown or was removed meanwhile.
    pub fn wait_terminal(&self, job_id: &str, timeout: Duration) -> Option<ConversionJob> {
        let guard = self.lock();
        let (jobs, _) = self
            .changed
            .wait_timeout_while(guard, timeout, |jobs| {
                jobs.get(job_id).is_some_and(|job| !job.is_terminal())
            })
            .unwrap_or_else(PoisonError::into_inner);
        jobs.get(job_id).cloned()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.events.subscribe()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, ConversionJob>> {
        self.jobs.lock().unwrap_or_else(|poisoned| {
            log::warn!("Job store lock was poisoned, recovering");
            PoisonError::into_inner(poisoned)
        })
    }
}

impl Default for JobStore {
    fn default() -> Self {
        Self::new(JobEventBroadcaster::default())
    }
}
