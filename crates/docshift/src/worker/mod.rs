pub(crate) mod pool;
pub(crate) mod sweeper;
pub mod task;

pub(crate) use pool::WorkerPool;
pub(crate) use sweeper::RetentionSweeper;
pub use task::ConversionTask;
