use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

use crossbeam_channel::RecvTimeoutError;
use tracing::{debug, info, info_span, warn};

use crate::error::{ConversionError, DocshiftError, Result, WorkerError};
use crate::sanitize;
use crate::worker::ConversionTask;

use super::shared::PipelineCore;

impl PipelineCore {
    /// Drives one queued job to a terminal state.
    pub(crate) fn run(&self, task: ConversionTask) {
        let filename = sanitize::redact_path(&task.input_path);
        let _pipeline_span = info_span!("pipeline",
            job_id = %task.job_id,
            filename = %filename,
            pair = %task.pair,
            converter = task.converter.name(),
        )
        .entered();

        // cancelled while queued
        if !self.jobs.is_active(&task.job_id) {
            debug!("Skipping job that is no longer active");
            return;
        }
        debug!(
            queued_ms = task.enqueued_at.elapsed().as_millis() as u64,
            "Job picked up"
        );

        let work_path = self.storage.work_path(&task.job_id, &task.pair.output);

        // Step 1: Convert
        let converted = {
            let _step = info_span!("convert").entered();
            match self.step_convert(&task, &work_path) {
                Ok(path) => path,
                Err(e) => {
                    self.remove_work_file(&work_path);
                    self.fail(&task.job_id, &e);
                    return;
                }
            }
        };

        // Step 2: Persist
        {
            let _step = info_span!("persist").entered();
            if !self.jobs.is_active(&task.job_id) {
                debug!("Job ended during conversion, dropping its output");
                self.remove_work_file(&converted);
                return;
            }

            let output_path =
                match self
                    .storage
                    .persist(&task.job_id, &converted, &task.pair.output)
                {
                    Ok(path) => path,
                    Err(e) => {
                        self.remove_work_file(&converted);
                        self.fail(&task.job_id, &DocshiftError::from(e));
                        return;
                    }
                };

            match self.jobs.mark_succeeded(&task.job_id, output_path.clone()) {
                Ok(_) => info!(
                    elapsed_ms = task.enqueued_at.elapsed().as_millis() as u64,
                    "Conversion succeeded"
                ),
                Err(e) => {
                    warn!("Dropping output of a job that ended elsewhere: {}", e);
                    if let Err(e) = self.storage.delete(&output_path) {
                        warn!("Failed to remove dropped output: {}", e);
                    }
                }
            }
        }
    }

    /// Runs the converter on its own thread so a timeout or a panic cannot
    /// take the worker down with it.
    fn step_convert(&self, task: &ConversionTask, work_path: &Path) -> Result<PathBuf> {
        let (result_tx, result_rx) = crossbeam_channel::bounded(1);

        let converter = Arc::clone(&task.converter);
        let input = task.input_path.clone();
        let output = work_path.to_path_buf();
        let options = task.options.clone();
        let span = tracing::Span::current();

        thread::Builder::new()
            .name(format!("docshift-convert-{}", short_id(&task.job_id)))
            .spawn(move || {
                let _entered = span.enter();
                let result = converter.convert(&input, &output, &options);
                if result_tx.send(result).is_err() {
                    // nobody is waiting any more
                    let _ = std::fs::remove_file(&output);
                }
            })
            .map_err(|e| WorkerError::SpawnFailed(e.to_string()))?;

        let outcome: std::result::Result<
            std::result::Result<PathBuf, ConversionError>,
            DocshiftError,
        > = match self.settings.conversion_timeout {
            Some(limit) => result_rx.recv_timeout(limit).map_err(|e| match e {
                RecvTimeoutError::Timeout => DocshiftError::Timeout {
                    millis: limit.as_millis() as u64,
                },
                RecvTimeoutError::Disconnected => {
                    ConversionError::Panicked(task.converter.name().to_string()).into()
                }
            }),
            None => result_rx
                .recv()
                .map_err(|_| ConversionError::Panicked(task.converter.name().to_string()).into()),
        };
        drop(result_rx);

        let produced = outcome??;
        if produced != work_path {
            return Err(ConversionError::Tool(format!(
                "converter '{}' wrote to an unexpected location",
                task.converter.name()
            ))
            .into());
        }
        if !work_path.is_file() {
            return Err(ConversionError::MissingOutput(work_path.to_path_buf()).into());
        }

        Ok(produced)
    }

    fn remove_work_file(&self, path: &Path) {
        if let Err(e) = self.storage.delete(path) {
            warn!("Failed to remove work file: {}", e);
        }
    }
}

fn short_id(job_id: &str) -> &str {
    job_id.get(..8).unwrap_or(job_id)
}
