pub mod config;
pub mod converter;
pub mod error;
pub mod format;
pub mod job;
pub mod logging;
pub mod pipeline;
pub mod sanitize;
pub mod storage;
pub mod worker;

pub use config::{load_config, LogFormat, LoggingConfig, ServiceConfig};
pub use converter::{
    ConvertOptions, Converter, FormatRegistry, Passthrough, PdfToText, StatementToCsv,
    StatementToJson, TextToPdf,
};
pub use error::{
    ConfigError, ConversionError, DocshiftError, ErrorKind, Result, StorageError, WorkerError,
};
pub use format::{Format, FormatPair};
pub use job::{ConversionJob, JobEvent, JobFailure, JobState};
pub use logging::init_logging;
pub use pipeline::{ConversionPipeline, JobOutput, PipelineSettings, SubmitRequest};
pub use storage::{StorageGateway, StoredUpload};
