use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::config::{validate_config, ServiceConfig};
use crate::converter::{ConvertOptions, FormatRegistry};
use crate::error::{DocshiftError, Result, StorageError};
use crate::format::{Format, FormatPair};
use crate::job::{ConversionJob, JobEvent, JobEventBroadcaster, JobState};
use crate::sanitize;
use crate::storage::{has_content, StorageGateway};
use crate::worker::{ConversionTask, RetentionSweeper, WorkerPool};

use super::config::PipelineSettings;
use super::shared::PipelineCore;

/// What a client asks for when uploading a file.
#[derive(Debug, Clone)]
pub struct SubmitRequest {
    /// File name the client declared. Only used to derive the stored name,
    /// never as a path.
    pub declared_name: String,
    pub target_format: String,
    /// Inferred from `declared_name`'s extension when absent.
    pub input_format: Option<String>,
    pub options: ConvertOptions,
}

impl SubmitRequest {
    pub fn new(declared_name: impl Into<String>, target_format: impl Into<String>) -> Self {
        Self {
            declared_name: declared_name.into(),
            target_format: target_format.into(),
            input_format: None,
            options: ConvertOptions::new(),
        }
    }

    pub fn input_format(mut self, format: impl Into<String>) -> Self {
        self.input_format = Some(format.into());
        self
    }

    pub fn option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options = self.options.with(key, value);
        self
    }

    pub fn options(mut self, options: ConvertOptions) -> Self {
        self.options = options;
        self
    }
}

/// A finished conversion, opened for streaming back to the client.
#[derive(Debug)]
pub struct JobOutput {
    pub path: PathBuf,
    pub file: File,
    /// `<original stem>.<target extension>`
    pub download_name: String,
    pub media_type: String,
    pub size: u64,
}

/// Accepts uploads, converts them on a worker pool and hands back results.
pub struct ConversionPipeline {
    core: Arc<PipelineCore>,
    registry: Arc<FormatRegistry>,
    pool: WorkerPool,
    sweeper: Option<RetentionSweeper>,
}

impl ConversionPipeline {
    /// Builds a pipeline from a validated service config, creating the
    /// upload, output and work directories.
    pub fn new(config: &ServiceConfig, registry: Arc<FormatRegistry>) -> Result<Self> {
        validate_config(config)?;

        let storage = StorageGateway::with_work_root(
            &config.upload_directory,
            &config.output_directory,
            config.work_directory(),
        )?
        .with_max_upload_bytes(config.max_upload_bytes);

        Self::with_settings(storage, registry, PipelineSettings::from_config(config))
    }

    pub fn with_settings(
        storage: StorageGateway,
        registry: Arc<FormatRegistry>,
        settings: PipelineSettings,
    ) -> Result<Self> {
        let core = Arc::new(PipelineCore::new(
            storage,
            settings.clone(),
            JobEventBroadcaster::default(),
        ));

        let pool = WorkerPool::new(Arc::clone(&core), settings.worker_count)?;
        let sweeper = match settings.retention {
            Some(_) => Some(RetentionSweeper::spawn(
                Arc::clone(&core),
                settings.sweep_interval,
            )?),
            None => None,
        };

        info!(
            workers = settings.worker_count,
            pairs = registry.len(),
            "Conversion pipeline started"
        );

        Ok(Self {
            core,
            registry,
            pool,
            sweeper,
        })
    }

    /// Validates and saves an upload, then queues its conversion.
    ///
    /// Rejected requests (unsafe name, empty or oversized upload, unsupported
    /// pair) leave nothing behind. Once the upload is accepted the job id is
    /// always returned, even if writing it fails; the storage failure is
    /// recorded on the job.
    pub fn submit<R: Read>(&self, reader: R, request: SubmitRequest) -> Result<String> {
        if !sanitize::is_safe_name(&request.declared_name) {
            return Err(DocshiftError::invalid_input(format!(
                "unsafe file name '{}'",
                request.declared_name
            )));
        }

        let mut reader = BufReader::new(reader);
        if !has_content(&mut reader)? {
            return Err(StorageError::EmptyUpload.into());
        }

        let pair = self.resolve_pair(&request)?;
        let converter = self.registry.resolve(&pair.input, &pair.output)?;

        let job = self
            .core
            .jobs
            .insert(ConversionJob::new(&request.declared_name, pair.clone()));
        let job_id = job.job_id;
        debug!(job_id = %job_id, pair = %pair, "Job created");

        let upload =
            match self
                .core
                .storage
                .save(&job_id, reader, &request.declared_name, &pair.input)
            {
                Ok(upload) => upload,
                Err(e) => {
                    let err = DocshiftError::from(e);
                    if err.kind().is_client_error() {
                        // oversized uploads are only detected while writing
                        self.core.jobs.remove(&job_id);
                        return Err(err);
                    }
                    self.core.fail(&job_id, &err);
                    return Ok(job_id);
                }
            };

        if let Err(e) = self.core.jobs.mark_running(&job_id, &upload) {
            // cancelled or discarded while the upload was written
            debug!(job_id = %job_id, "Dropping upload: {}", e);
            if let Err(e) = self.core.storage.delete(&upload.path) {
                warn!(job_id = %job_id, "Failed to remove upload: {}", e);
            }
            return Ok(job_id);
        }

        let task = ConversionTask::new(&job_id, pair, upload.path, converter, request.options);
        if let Err(e) = self.pool.submit(task) {
            self.core.fail(&job_id, &DocshiftError::from(e));
        }

        Ok(job_id)
    }

    /// [`submit`](Self::submit) followed by [`wait`](Self::wait).
    pub fn submit_and_wait<R: Read>(
        &self,
        reader: R,
        request: SubmitRequest,
        timeout: Duration,
    ) -> Result<ConversionJob> {
        let job_id = self.submit(reader, request)?;
        self.wait(&job_id, timeout)
    }

    /// Blocks until the job is terminal or `timeout` elapses and returns its
    /// latest snapshot either way.
    pub fn wait(&self, job_id: &str, timeout: Duration) -> Result<ConversionJob> {
        self.core
            .jobs
            .wait_terminal(job_id, timeout)
            .ok_or_else(|| DocshiftError::NotFound(format!("job '{}'", job_id)))
    }

    pub fn status(&self, job_id: &str) -> Result<ConversionJob> {
        self.core.get(job_id)
    }

    /// All known jobs, newest first.
    pub fn jobs(&self) -> Vec<ConversionJob> {
        self.core.jobs.list()
    }

    /// Location of a succeeded job's output.
    pub fn result(&self, job_id: &str) -> Result<PathBuf> {
        let job = self.core.get(job_id)?;
        self.output_of(&job)
    }

    pub fn open_result(&self, job_id: &str) -> Result<JobOutput> {
        let job = self.core.get(job_id)?;
        let path = self.output_of(&job)?;

        let file = self.core.storage.open_output(&path)?;
        let size = file
            .metadata()
            .map_err(|e| StorageError::OpenFile {
                path: path.clone(),
                source: e,
            })?
            .len();

        Ok(JobOutput {
            download_name: job.download_name(),
            media_type: job.target_format.mime_type(),
            path,
            file,
            size,
        })
    }

    fn output_of(&self, job: &ConversionJob) -> Result<PathBuf> {
        if job.state != JobState::Succeeded {
            return Err(DocshiftError::JobNotComplete {
                job_id: job.job_id.clone(),
                state: job.state,
            });
        }

        match job.output_path {
            Some(ref path) if self.core.storage.exists(path) => Ok(path.clone()),
            _ => Err(DocshiftError::NotFound(format!(
                "output of job '{}'",
                job.job_id
            ))),
        }
    }

    /// Stops an active job. Terminal jobs are returned unchanged.
    pub fn cancel(&self, job_id: &str) -> Result<ConversionJob> {
        self.core.cancel(job_id)
    }

    /// Deletes the job's input and output and forgets it.
    pub fn discard(&self, job_id: &str) -> Result<()> {
        self.core.discard(job_id)
    }

    /// Discards terminal jobs older than the retention window.
    pub fn purge_expired(&self) -> usize {
        self.core.purge_expired()
    }

    /// Files in the upload and output roots that belong to no known job.
    pub fn orphaned_files(&self) -> Result<Vec<PathBuf>> {
        let known: HashSet<String> = self.core.jobs.ids();
        Ok(self.core.storage.orphans(&known)?)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.core.jobs.subscribe()
    }

    /// Shared registry, for registering converters after startup.
    pub fn registry(&self) -> &Arc<FormatRegistry> {
        &self.registry
    }

    pub fn storage(&self) -> &StorageGateway {
        &self.core.storage
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.core.settings
    }

    /// Stops accepting work, lets queued conversions finish and waits for the
    /// workers to exit.
    pub fn shutdown(mut self) {
        if let Some(sweeper) = self.sweeper.take() {
            sweeper.stop();
        }

        self.pool.shutdown();
        self.pool.wait();
        self.core.fail_active("pipeline shut down before the job ran");
        info!("Conversion pipeline stopped");
    }

    fn resolve_pair(&self, request: &SubmitRequest) -> Result<FormatPair> {
        let input = match request.input_format {
            Some(ref raw) => Format::parse(raw)?,
            None => Format::from_path(Path::new(&request.declared_name)).ok_or_else(|| {
                DocshiftError::invalid_input(format!(
                    "cannot infer the format of '{}'",
                    request.declared_name
                ))
            })?,
        };
        let output = Format::parse(&request.target_format)?;
        Ok(FormatPair::new(input, output))
    }
}
