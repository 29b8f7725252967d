//! Bounded worker pool over part numbers.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::Mutex;

use futures_util::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::DEFAULT_CONCURRENCY;
use crate::error::UploadError;

/// Runs a job per part number with at most `concurrency` jobs in flight.
///
/// Workers pull from a shared queue. The first fatal job error cancels a
/// child token handed to every job, so no new parts are started and
/// in-flight ones stop at their next cancellation point.
#[derive(Debug, Clone, Copy)]
pub struct ConcurrencyScheduler {
    concurrency: usize,
}

impl Default for ConcurrencyScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_CONCURRENCY)
    }
}

impl ConcurrencyScheduler {
    /// A concurrency of 0 is treated as 1.
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Drives `job` over every part number until the queue is drained, a
    /// job fails, or `cancel` fires.
    ///
    /// Returns the first non-cancellation error. Caller cancellation takes
    /// precedence and yields [`UploadError::Cancelled`].
    pub async fn run<I, F, Fut>(
        &self,
        part_numbers: I,
        cancel: &CancellationToken,
        job: F,
    ) -> Result<(), UploadError>
    where
        I: IntoIterator<Item = u32>,
        F: Fn(u32, CancellationToken) -> Fut,
        Fut: Future<Output = Result<(), UploadError>>,
    {
        let pending: VecDeque<u32> = part_numbers.into_iter().collect();
        if pending.is_empty() {
            return Ok(());
        }
        let workers = self.concurrency.min(pending.len());
        let queue = Mutex::new(pending);
        let stop = cancel.child_token();
        let first_error: Mutex<Option<UploadError>> = Mutex::new(None);

        let worker = |id: usize| {
            let queue = &queue;
            let stop = &stop;
            let first_error = &first_error;
            let job = &job;
            async move {
                loop {
                    if stop.is_cancelled() {
                        break;
                    }
                    let next = queue.lock().unwrap().pop_front();
                    let Some(part_number) = next else {
                        break;
                    };

                    if let Err(e) = job(part_number, stop.clone()).await {
                        if !matches!(e, UploadError::Cancelled) {
                            let mut slot = first_error.lock().unwrap();
                            if slot.is_none() {
                                debug!(worker = id, part = part_number, error = %e, "stopping workers");
                                *slot = Some(e);
                            }
                        }
                        stop.cancel();
                        break;
                    }
                }
            }
        };

        join_all((0..workers).map(worker)).await;

        if cancel.is_cancelled() {
            return Err(UploadError::Cancelled);
        }
        match first_error.into_inner().unwrap() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
