use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use crate::converter::{ConvertOptions, Converter};
use crate::format::FormatPair;

/// A saved upload waiting for a worker.
pub struct ConversionTask {
    pub job_id: String,
    pub pair: FormatPair,
    pub input_path: PathBuf,
    /// Resolved at submission, so a later registry change cannot affect a
    /// queued job.
    pub converter: Arc<dyn Converter>,
    pub options: ConvertOptions,
    pub enqueued_at: Instant,
}

impl ConversionTask {
    pub fn new(
        job_id: impl Into<String>,
        pair: FormatPair,
        input_path: PathBuf,
        converter: Arc<dyn Converter>,
        options: ConvertOptions,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            pair,
            input_path,
            converter,
            options,
            enqueued_at: Instant::now(),
        }
    }
}

impl fmt::Debug for ConversionTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionTask")
            .field("job_id", &self.job_id)
            .field("pair", &self.pair)
            .field("input_path", &self.input_path)
            .field("converter", &self.converter.name())
            .field("options", &self.options)
            .finish()
    }
}
