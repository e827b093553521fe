use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use log::{debug, error, info};

use crate::error::WorkerError;
use crate::pipeline::shared::PipelineCore;
use crate::worker::task::ConversionTask;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Fixed set of threads that run queued conversions.
///
/// The queue is unbounded so submission never waits for a worker. After
/// [`WorkerPool::shutdown`] no new tasks are accepted; workers finish what is
/// already queued and then exit.
pub(crate) struct WorkerPool {
    task_sender: Sender<ConversionTask>,
    workers: Vec<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
}

impl WorkerPool {
    pub(crate) fn new(core: Arc<PipelineCore>, worker_count: usize) -> Result<Self, WorkerError> {
        let worker_count = worker_count.max(1);
        let (task_sender, task_receiver) = unbounded::<ConversionTask>();
        let shutdown = Arc::new(AtomicBool::new(false));

        let mut workers = Vec::with_capacity(worker_count);

        for worker_id in 0..worker_count {
            let task_rx = task_receiver.clone();
            let shutdown_flag = Arc::clone(&shutdown);
            let worker_core = Arc::clone(&core);

            let spawned = thread::Builder::new()
                .name(format!("docshift-worker-{}", worker_id))
                .spawn(move || run_worker(worker_id, task_rx, shutdown_flag, worker_core));

            match spawned {
                Ok(handle) => workers.push(handle),
                Err(e) => {
                    // let the ones already started exit
                    shutdown.store(true, Ordering::Relaxed);
                    return Err(WorkerError::SpawnFailed(e.to_string()));
                }
            }
        }

        info!("Started {} conversion workers", worker_count);

        Ok(Self {
            task_sender,
            workers,
            shutdown,
        })
    }

    pub(crate) fn submit(&self, task: ConversionTask) -> Result<(), WorkerError> {
        if self.is_shutdown() {
            return Err(WorkerError::ChannelClosed);
        }

        self.task_sender
            .send(task)
            .map_err(|_| WorkerError::ChannelClosed)?;
        debug!("Task queued, {} waiting", self.queued());
        Ok(())
    }

    pub(crate) fn shutdown(&self) {
        info!("Shutting down worker pool...");
        self.shutdown.store(true, Ordering::Relaxed);
    }

    /// Blocks until every worker has exited. Call [`WorkerPool::shutdown`]
    /// first.
    pub(crate) fn wait(&mut self) {
        for (i, worker) in std::mem::take(&mut self.workers).into_iter().enumerate() {
            if let Err(e) = worker.join() {
                error!("Worker {} panicked: {:?}", i, e);
            } else {
                debug!("Worker {} finished", i);
            }
        }

        info!("All workers have stopped");
    }

    pub(crate) fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }

    pub(crate) fn queued(&self) -> usize {
        self.task_sender.len()
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }
}

fn run_worker(
    worker_id: usize,
    task_receiver: Receiver<ConversionTask>,
    shutdown: Arc<AtomicBool>,
    core: Arc<PipelineCore>,
) {
    debug!("Worker {} started", worker_id);

    loop {
        if shutdown.load(Ordering::Relaxed) && task_receiver.is_empty() {
            debug!("Worker {} received shutdown signal", worker_id);
            break;
        }

        match task_receiver.recv_timeout(POLL_INTERVAL) {
            Ok(task) => {
                debug!("Worker {} processing job {}", worker_id, task.job_id);
                core.run(task);
            }
            Err(RecvTimeoutError::Timeout) => {
                continue;
            }
            Err(RecvTimeoutError::Disconnected) => {
                debug!("Worker {} task channel disconnected", worker_id);
                break;
            }
        }
    }

    debug!("Worker {} stopped", worker_id);
}
