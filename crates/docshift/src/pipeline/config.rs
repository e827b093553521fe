use std::time::Duration;

use crate::config::ServiceConfig;

/// Runtime knobs of a [`ConversionPipeline`](super::ConversionPipeline).
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub worker_count: usize,
    /// How long a single conversion may run. `None` waits indefinitely.
    pub conversion_timeout: Option<Duration>,
    /// How long terminal jobs are kept. `None` keeps them until discarded.
    pub retention: Option<Duration>,
    pub sweep_interval: Duration,
}

impl PipelineSettings {
    pub fn from_config(config: &ServiceConfig) -> Self {
        Self {
            worker_count: config.worker_count.max(1),
            conversion_timeout: config.conversion_timeout_secs.map(Duration::from_secs),
            retention: config.retention_secs.map(Duration::from_secs),
            sweep_interval: Duration::from_secs(config.sweep_interval_secs.max(1)),
        }
    }

    pub fn with_worker_count(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count.max(1);
        self
    }

    pub fn with_conversion_timeout(mut self, timeout: Duration) -> Self {
        self.conversion_timeout = Some(timeout);
        self
    }

    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = Some(retention);
        self
    }

    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            worker_count: num_cpus::get().max(1),
            conversion_timeout: None,
            retention: None,
            sweep_interval: Duration::from_secs(60),
        }
    }
}
