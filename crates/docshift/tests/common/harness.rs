//! Test harness for isolated pipeline runs.
//!
//! `TestHarness` owns a temporary directory holding the upload and output
//! roots, builds pipelines on top of them and lists what ended up on disk.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use docshift::{
    ConversionPipeline, Converter, FormatRegistry, PipelineSettings, ServiceConfig,
    StorageGateway,
};

/// Generous upper bound for waiting on a job in tests.
pub const WAIT: Duration = Duration::from_secs(20);

pub struct TestHarness {
    temp_dir: TempDir,
    pub upload_dir: PathBuf,
    pub output_dir: PathBuf,
    pub registry: Arc<FormatRegistry>,
}

impl TestHarness {
    /// A harness with the built-in converters registered.
    pub fn new() -> Self {
        Self::with_registry(FormatRegistry::with_builtin_converters())
    }

    pub fn with_registry(registry: FormatRegistry) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let upload_dir = temp_dir.path().join("uploads");
        let output_dir = temp_dir.path().join("outputs");

        Self {
            temp_dir,
            upload_dir,
            output_dir,
            registry: Arc::new(registry),
        }
    }

    /// Registers an extra converter, panicking on conflict.
    pub fn register(&self, input: &str, output: &str, converter: impl Converter + 'static) {
        self.registry
            .register(input, output, Arc::new(converter))
            .expect("Failed to register test converter");
    }

    pub fn temp_path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn settings(&self) -> PipelineSettings {
        PipelineSettings::default().with_worker_count(2)
    }

    pub fn config(&self) -> ServiceConfig {
        let mut config = ServiceConfig::new(&self.upload_dir, &self.output_dir);
        config.worker_count = 2;
        config
    }

    pub fn pipeline(&self) -> ConversionPipeline {
        self.pipeline_with(self.settings())
    }

    pub fn pipeline_with(&self, settings: PipelineSettings) -> ConversionPipeline {
        let storage = StorageGateway::new(&self.upload_dir, &self.output_dir)
            .expect("Failed to create storage");
        ConversionPipeline::with_settings(storage, Arc::clone(&self.registry), settings)
            .expect("Failed to start pipeline")
    }

    pub fn upload_files(&self) -> Vec<PathBuf> {
        list_files(&self.upload_dir)
    }

    /// Files in the output root, not counting the work directory.
    pub fn output_files(&self) -> Vec<PathBuf> {
        list_files(&self.output_dir)
    }

    pub fn work_files(&self) -> Vec<PathBuf> {
        list_files(&self.output_dir.join(".work"))
    }
}

fn list_files(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut files: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .collect();
    files.sort();
    files
}
