use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DocshiftError, ErrorKind};
use crate::format::{Format, FormatPair};
use crate::sanitize;

/// Lifecycle state of a conversion job.
///
/// `Pending -> Running -> {Succeeded, Failed}`, plus `Pending -> Failed`.
/// `Succeeded` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    pub fn can_transition_to(&self, next: JobState) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Running)
                | (Self::Pending, Self::Failed)
                | (Self::Running, Self::Succeeded)
                | (Self::Running, Self::Failed)
        )
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobState::Pending => write!(f, "pending"),
            JobState::Running => write!(f, "running"),
            JobState::Succeeded => write!(f, "succeeded"),
            JobState::Failed => write!(f, "failed"),
        }
    }
}

/// Why a job failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobFailure {
    pub kind: ErrorKind,
    pub message: String,
}

impl JobFailure {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn from_error(err: &DocshiftError) -> Self {
        Self::new(err.kind(), err.to_string())
    }
}

impl fmt::Display for JobFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Snapshot of a conversion job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionJob {
    /// Unique job identifier (UUID v4).
    pub job_id: String,
    /// File name the client declared for the upload.
    pub original_name: String,
    pub input_format: Format,
    pub target_format: Format,
    pub state: JobState,
    /// Set once the upload is on disk.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_size: Option<u64>,
    /// Set only on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,
    /// Set only on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<JobFailure>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl ConversionJob {
    pub fn new(original_name: impl Into<String>, pair: FormatPair) -> Self {
        Self {
            job_id: uuid::Uuid::new_v4().to_string(),
            original_name: original_name.into(),
            input_format: pair.input,
            target_format: pair.output,
            state: JobState::Pending,
            input_path: None,
            input_size: None,
            output_path: None,
            failure: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    pub fn pair(&self) -> FormatPair {
        FormatPair::new(self.input_format.clone(), self.target_format.clone())
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Suggested file name for handing the result back to a client:
    /// `statement.pdf` converted to csv becomes `statement.csv`.
    pub fn download_name(&self) -> String {
        format!(
            "{}.{}",
            sanitize::file_stem(&self.original_name),
            self.target_format.extension()
        )
    }
}
