//! Job lifecycle events for real-time status streaming.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::job::model::{ConversionJob, JobFailure, JobState};

const DEFAULT_CAPACITY: usize = 256;

/// Published on every state transition of a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobEvent {
    pub job_id: String,
    /// State the job entered.
    pub state: JobState,
    /// Human-readable message describing the transition.
    pub message: String,
    pub timestamp: DateTime<Utc>,
    /// Output path (set on success).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<String>,
    /// Failure detail (set on failure).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<JobFailure>,
}

impl JobEvent {
    /// Builds the event describing `job`'s current state.
    pub fn for_job(job: &ConversionJob) -> Self {
        let message = match job.state {
            JobState::Pending => format!("Job queued: {}", job.pair()),
            JobState::Running => "Conversion started".to_string(),
            JobState::Succeeded => "Conversion completed successfully".to_string(),
            JobState::Failed => match job.failure {
                Some(ref failure) => format!("Conversion failed: {}", failure.message),
                None => "Conversion failed".to_string(),
            },
        };

        Self {
            job_id: job.job_id.clone(),
            state: job.state,
            message,
            timestamp: Utc::now(),
            output_path: job
                .output_path
                .as_ref()
                .map(|p| p.to_string_lossy().to_string()),
            failure: job.failure.clone(),
        }
    }
}

/// Fan-out of [`JobEvent`]s to any number of subscribers.
#[derive(Clone)]
pub struct JobEventBroadcaster {
    sender: broadcast::Sender<JobEvent>,
}

impl JobEventBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.sender.subscribe()
    }

    /// Sends an event. Having no subscribers is not an error.
    pub fn send(&self, event: JobEvent) {
        let _ = self.sender.send(event);
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for JobEventBroadcaster {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
