use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::format::FormatPair;

/// Coarse classification of every failure the pipeline can report.
///
/// Transport layers map this to their own status codes; jobs record it in
/// their failure detail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidInput,
    UnsupportedFormat,
    Conflict,
    Storage,
    Conversion,
    NotFound,
    JobNotComplete,
    Timeout,
    Cancelled,
    Config,
    Worker,
}

impl ErrorKind {
    /// True when the caller's request was at fault and resubmitting the same
    /// input cannot help.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidInput
                | Self::UnsupportedFormat
                | Self::Conflict
                | Self::NotFound
                | Self::JobNotComplete
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidInput => "invalid_input",
            Self::UnsupportedFormat => "unsupported_format",
            Self::Conflict => "conflict",
            Self::Storage => "storage",
            Self::Conversion => "conversion",
            Self::NotFound => "not_found",
            Self::JobNotComplete => "job_not_complete",
            Self::Timeout => "timeout",
            Self::Cancelled => "cancelled",
            Self::Config => "config",
            Self::Worker => "worker",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum DocshiftError {
    #[error("Invalid input: {reason}")]
    InvalidInput { reason: String },

    #[error("Unsupported conversion: {pair}")]
    UnsupportedFormat { pair: FormatPair },

    #[error("A converter is already registered for {pair}")]
    Conflict { pair: FormatPair },

    #[error("Storage error: {0}")]
    Storage(StorageError),

    #[error("Conversion failed: {0}")]
    Conversion(#[from] ConversionError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Job {job_id} is not complete (state: {state})")]
    JobNotComplete {
        job_id: String,
        state: crate::job::JobState,
    },

    #[error("Conversion exceeded its time budget of {millis} ms")]
    Timeout { millis: u64 },

    #[error("Job {0} was cancelled")]
    Cancelled(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),
}

impl DocshiftError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput { .. } => ErrorKind::InvalidInput,
            Self::UnsupportedFormat { .. } => ErrorKind::UnsupportedFormat,
            Self::Conflict { .. } => ErrorKind::Conflict,
            Self::Storage(_) => ErrorKind::Storage,
            Self::Conversion(_) => ErrorKind::Conversion,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::JobNotComplete { .. } => ErrorKind::JobNotComplete,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Cancelled(_) => ErrorKind::Cancelled,
            Self::Config(_) => ErrorKind::Config,
            Self::Worker(_) => ErrorKind::Worker,
        }
    }

    pub fn invalid_input(reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            reason: reason.into(),
        }
    }
}

/// Storage failures split by whether the caller or the filesystem is to blame.
impl From<StorageError> for DocshiftError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::UnsafeName(name) => {
                Self::invalid_input(format!("unsafe file name '{}'", name))
            }
            StorageError::EmptyUpload => Self::invalid_input("uploaded file is empty"),
            StorageError::UploadTooLarge { limit } => {
                Self::invalid_input(format!("uploaded file exceeds {} bytes", limit))
            }
            StorageError::NotFound(path) => Self::NotFound(format!(
                "file '{}'",
                path.file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or("<unknown>")
            )),
            other => Self::Storage(other),
        }
    }
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read upload stream: {0}")]
    ReadStream(#[source] std::io::Error),

    #[error("Failed to open file '{path}': {source}")]
    OpenFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to move file from '{from}' to '{to}': {source}")]
    MoveFile {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to delete file '{path}': {source}")]
    DeleteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to list directory '{path}': {source}")]
    ListDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("File already exists: {0}")]
    FileExists(PathBuf),

    #[error("File not found: {0}")]
    NotFound(PathBuf),

    #[error("Unsafe file name: {0}")]
    UnsafeName(String),

    #[error("Uploaded file is empty")]
    EmptyUpload,

    #[error("Uploaded file exceeds the {limit} byte limit")]
    UploadTooLarge { limit: u64 },
}

#[derive(Error, Debug)]
pub enum ConversionError {
    #[error("Malformed input: {0}")]
    Malformed(String),

    #[error("Unsupported content: {0}")]
    Unsupported(String),

    #[error("Converter failed: {0}")]
    Tool(String),

    #[error("Failed to read '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Converter produced no output at '{0}'")]
    MissingOutput(PathBuf),

    #[error("Converter '{0}' panicked")]
    Panicked(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },

    #[error("Failed to install logging: {0}")]
    Logging(String),
}

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Failed to spawn worker: {0}")]
    SpawnFailed(String),

    #[error("Worker channel closed unexpectedly")]
    ChannelClosed,
}

pub type Result<T> = std::result::Result<T, DocshiftError>;
