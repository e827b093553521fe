pub mod config;
mod runner;
pub mod service;
pub(crate) mod shared;

pub use config::PipelineSettings;
pub use service::{ConversionPipeline, JobOutput, SubmitRequest};
