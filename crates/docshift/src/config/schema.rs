use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub version: String,
    pub upload_directory: String,
    pub output_directory: String,
    /// Defaults to `<output_directory>/.work`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub work_directory: Option<String>,
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversion_timeout_secs: Option<u64>,
    /// Terminal jobs older than this are purged. Unset keeps them forever.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retention_secs: Option<u64>,
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_upload_bytes: Option<u64>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_worker_count() -> usize {
    num_cpus::get()
}

fn default_sweep_interval() -> u64 {
    60
}

impl ServiceConfig {
    /// A config with every optional setting at its default.
    pub fn new<P: AsRef<Path>, Q: AsRef<Path>>(upload_directory: P, output_directory: Q) -> Self {
        Self {
            version: "1.0".to_string(),
            upload_directory: upload_directory.as_ref().to_string_lossy().to_string(),
            output_directory: output_directory.as_ref().to_string_lossy().to_string(),
            work_directory: None,
            worker_count: default_worker_count(),
            conversion_timeout_secs: None,
            retention_secs: None,
            sweep_interval_secs: default_sweep_interval(),
            max_upload_bytes: None,
            logging: LoggingConfig::default(),
        }
    }

    pub fn work_directory(&self) -> PathBuf {
        match self.work_directory {
            Some(ref dir) => PathBuf::from(dir),
            None => Path::new(&self.output_directory).join(".work"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` takes precedence.
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}
