//! Bounded-concurrency job consumption loop.
//!
//! The pool pulls deliveries from a [`JobQueue`] and runs each one on its own
//! task. A semaphore permit is taken *before* pulling, so no more than
//! `concurrency` jobs are ever in flight. Jobs may finish in any order.
//!
//! Success acks the delivery. A dispatch failure nacks it with requeue, which
//! leaves redelivery and backoff to the broker. A payload that cannot be
//! decoded is nacked without requeue since replaying it can never succeed.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use crate::dispatch::NotificationDispatcher;
use crate::queue::{Delivery, JobQueue};

/// Concurrency ceiling used when none is configured.
pub const DEFAULT_CONCURRENCY: usize = 5;

/// Upper bound on the concurrency ceiling. Matches the largest AMQP prefetch.
pub const MAX_CONCURRENCY: usize = u16::MAX as usize;

/// Pause after the queue reports an error before pulling again.
const DELIVERY_ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// Counts of job outcomes over one run of the pool.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PoolSummary {
    pub completed: usize,
    pub failed: usize,
    /// Deliveries whose payload could not be decoded
    pub rejected: usize,
}

#[derive(Default)]
struct Counters {
    completed: AtomicUsize,
    failed: AtomicUsize,
    rejected: AtomicUsize,
}

impl Counters {
    fn summary(&self) -> PoolSummary {
        PoolSummary {
            completed: self.completed.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
            rejected: self.rejected.load(Ordering::SeqCst),
        }
    }
}

pub struct JobWorkerPool {
    dispatcher: Arc<NotificationDispatcher>,
    concurrency: usize,
}

impl JobWorkerPool {
    pub fn new(dispatcher: Arc<NotificationDispatcher>) -> Self {
        Self {
            dispatcher,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// Maximum number of jobs processed in parallel (default: 5), clamped to
    /// `1..=MAX_CONCURRENCY`.
    pub fn concurrency(mut self, n: usize) -> Self {
        self.concurrency = n.clamp(1, MAX_CONCURRENCY);
        self
    }

    pub fn concurrency_limit(&self) -> usize {
        self.concurrency
    }

    /// Consume `queue` until it closes or `shutdown` resolves, then wait for
    /// in-flight jobs to finish.
    pub async fn run<Q, F>(&self, queue: &mut Q, shutdown: F) -> PoolSummary
    where
        Q: JobQueue,
        F: Future<Output = ()>,
    {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let counters = Arc::new(Counters::default());

        tokio::pin!(shutdown);

        info!(concurrency = self.concurrency, "worker_ready");

        loop {
            let permit = tokio::select! {
                _ = &mut shutdown => {
                    info!("worker_stopping");
                    break;
                }
                permit = Arc::clone(&semaphore).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let delivery = tokio::select! {
                _ = &mut shutdown => {
                    info!("worker_stopping");
                    break;
                }
                delivery = queue.next_delivery() => delivery,
            };

            match delivery {
                Some(Ok(delivery)) => {
                    let dispatcher = Arc::clone(&self.dispatcher);
                    let counters = Arc::clone(&counters);

                    tokio::spawn(async move {
                        let _permit = permit;
                        process_delivery(&dispatcher, delivery, &counters).await;
                    });
                }
                Some(Err(e)) => {
                    error!(
                        error = %e,
                        backoff_ms = DELIVERY_ERROR_BACKOFF.as_millis() as u64,
                        "queue_delivery_error"
                    );
                    drop(permit);

                    tokio::select! {
                        _ = &mut shutdown => {
                            info!("worker_stopping");
                            break;
                        }
                        _ = tokio::time::sleep(DELIVERY_ERROR_BACKOFF) => {}
                    }
                }
                None => {
                    warn!("queue_consumer_closed");
                    break;
                }
            }
        }

        // Every permit back means every spawned job has finished.
        let in_flight = self.concurrency - semaphore.available_permits();
        if in_flight > 0 {
            info!(in_flight = in_flight, "worker_draining");
        }
        let _ = semaphore.acquire_many(self.concurrency as u32).await;

        let summary = counters.summary();
        info!(
            completed = summary.completed,
            failed = summary.failed,
            rejected = summary.rejected,
            "worker_shutdown_complete"
        );
        summary
    }
}

async fn process_delivery(dispatcher: &NotificationDispatcher, delivery: Delivery, counters: &Counters) {
    let Delivery {
        id,
        redelivered,
        job,
        acker,
    } = delivery;

    let job = match job {
        Ok(job) => job,
        Err(e) => {
            error!(job_id = %id, error = %e, "job_parse_failed");
            counters.rejected.fetch_add(1, Ordering::SeqCst);

            if let Err(e) = acker.fail(false).await {
                error!(job_id = %id, error = %e, "job_nack_failed");
            }
            return;
        }
    };

    info!(
        job_id = %id,
        kind = job.kind(),
        redelivered = redelivered,
        "job_received"
    );

    match dispatcher.dispatch(&id, &job).await {
        Ok(_) => {
            counters.completed.fetch_add(1, Ordering::SeqCst);

            if let Err(e) = acker.complete().await {
                error!(job_id = %id, error = %e, "job_ack_failed");
            } else {
                info!(job_id = %id, kind = job.kind(), "job_completed");
            }
        }
        Err(e) => {
            counters.failed.fetch_add(1, Ordering::SeqCst);
            error!(job_id = %id, kind = job.kind(), error = %e, "job_failed");

            if let Err(e) = acker.fail(true).await {
                error!(job_id = %id, error = %e, "job_nack_failed");
            }
        }
    }
}
