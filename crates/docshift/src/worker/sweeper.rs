use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use log::{debug, error, info};

use crate::error::WorkerError;
use crate::pipeline::shared::PipelineCore;

/// Background thread that purges expired jobs every `interval`.
pub(crate) struct RetentionSweeper {
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl RetentionSweeper {
    pub(crate) fn spawn(core: Arc<PipelineCore>, interval: Duration) -> Result<Self, WorkerError> {
        let (stop_tx, stop_rx) = bounded::<()>(1);

        let handle = thread::Builder::new()
            .name("docshift-sweeper".to_string())
            .spawn(move || {
                debug!("Retention sweeper started, interval {:?}", interval);
                loop {
                    match stop_rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => {
                            let purged = core.purge_expired();
                            if purged > 0 {
                                info!("Retention sweep removed {} jobs", purged);
                            }
                        }
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                debug!("Retention sweeper stopped");
            })
            .map_err(|e| WorkerError::SpawnFailed(e.to_string()))?;

        Ok(Self {
            stop: Some(stop_tx),
            handle: Some(handle),
        })
    }

    /// Signals the sweeper and waits for it to exit.
    pub(crate) fn stop(mut self) {
        self.stop.take();
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.join() {
                error!("Retention sweeper panicked: {:?}", e);
            }
        }
    }
}

impl Drop for RetentionSweeper {
    fn drop(&mut self) {
        // disconnects the stop channel; the thread exits on its own
        self.stop.take();
    }
}
