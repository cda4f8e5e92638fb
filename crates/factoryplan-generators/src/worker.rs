use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, Receiver, RecvTimeoutError, TryRecvError};

use crate::cancel::CancelToken;
use crate::error::GeneratorError;
use crate::grid::Source;
use crate::outpost::{plan_outpost, OutpostPlan, OutpostSettings};

/// Owned input for a generation run on another thread.
#[derive(Debug, Clone)]
pub struct OutpostRequest {
    pub sources: Vec<Source>,
    pub settings: OutpostSettings,
}

/// Handle to a generation running on a worker thread.
pub struct OutpostJob {
    receiver: Receiver<Result<OutpostPlan, GeneratorError>>,
    cancel: CancelToken,
    handle: Option<JoinHandle<()>>,
}

/// Run [`plan_outpost`] on a worker thread. The store is never shared; the
/// caller applies the returned plan on its own thread.
pub fn spawn_outpost_generation(request: OutpostRequest, cancel: CancelToken) -> OutpostJob {
    let (sender, receiver) = channel::bounded(1);
    let worker_cancel = cancel.clone();
    let handle = thread::spawn(move || {
        let result = plan_outpost(&request.sources, &request.settings, &worker_cancel);
        if sender.send(result).is_err() {
            log::debug!("generation result dropped, job handle is gone");
        }
    });
    OutpostJob {
        receiver,
        cancel,
        handle: Some(handle),
    }
}

impl OutpostJob {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// The result if the worker has finished, without blocking.
    pub fn try_result(&mut self) -> Option<Result<OutpostPlan, GeneratorError>> {
        match self.receiver.try_recv() {
            Ok(result) => {
                self.join();
                Some(result)
            }
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(GeneratorError::WorkerLost)),
        }
    }

    pub fn wait_timeout(&mut self, timeout: Duration) -> Option<Result<OutpostPlan, GeneratorError>> {
        match self.receiver.recv_timeout(timeout) {
            Ok(result) => {
                self.join();
                Some(result)
            }
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => Some(Err(GeneratorError::WorkerLost)),
        }
    }

    /// Block until the worker finishes.
    pub fn wait(mut self) -> Result<OutpostPlan, GeneratorError> {
        let result = self
            .receiver
            .recv()
            .unwrap_or(Err(GeneratorError::WorkerLost));
        self.join();
        result
    }

    fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("generation worker panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use factoryplan_core::{Direction, EntityId, Position};

    fn request() -> OutpostRequest {
        let sources = [(1.5, 1.5), (12.5, -0.5)]
            .iter()
            .enumerate()
            .map(|(i, (x, y))| Source {
                id: EntityId(i as u128 + 1),
                position: Position::new(*x, *y),
                direction: Direction::North,
            })
            .collect();
        OutpostRequest {
            sources,
            settings: OutpostSettings::default(),
        }
    }

    #[test]
    fn test_worker_returns_the_plan() {
        let job = spawn_outpost_generation(request(), CancelToken::new());
        let plan = job.wait().unwrap();
        assert_eq!(plan.stats.pipes.pipes + plan.stats.pipes.underground_pipes, plan.pipes.len());
    }

    #[test]
    fn test_cancelled_before_start() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let job = spawn_outpost_generation(request(), cancel);
        assert_eq!(job.wait(), Err(GeneratorError::Cancelled));
    }
}
