//! Background dispatcher — acknowledges messages immediately and runs the
//! pipeline on a pool of worker tasks.
//!
//! Two modes:
//! - **Queued**: bounded `mpsc` queue drained by N workers. `submit()` returns
//!   as soon as the message is enqueued. No ordering between messages and no
//!   deduplication.
//! - **Inline**: `submit()` runs the pipeline to completion before returning.
//!   Used by test harnesses that need to observe the outcome synchronously.
//!
//! In both modes each message runs on its own task, so a panicking executor
//! yields a manual review record instead of killing a worker.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde::Serialize;
use tokio::sync::{Mutex, RwLock, mpsc};
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, error, info, warn};

use crate::error::DispatchError;
use crate::pipeline::processor::MessageProcessor;
use crate::pipeline::types::{IncomingMessage, PipelineOutcome};

/// Running totals, exposed on the health endpoint.
#[derive(Debug, Default)]
pub struct DispatchStats {
    accepted: AtomicUsize,
    executed: AtomicUsize,
    escalated: AtomicUsize,
}

/// Point-in-time copy of `DispatchStats`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DispatchSnapshot {
    pub accepted: usize,
    pub executed: usize,
    pub escalated: usize,
}

impl DispatchStats {
    fn record(&self, outcome: &PipelineOutcome) {
        let counter = match outcome {
            PipelineOutcome::Executed { .. } => &self.executed,
            PipelineOutcome::Escalated(_) => &self.escalated,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> DispatchSnapshot {
        DispatchSnapshot {
            accepted: self.accepted.load(Ordering::Relaxed),
            executed: self.executed.load(Ordering::Relaxed),
            escalated: self.escalated.load(Ordering::Relaxed),
        }
    }
}

enum Mode {
    Inline,
    Queued {
        tx: RwLock<Option<mpsc::Sender<IncomingMessage>>>,
        capacity: usize,
        workers: Mutex<Vec<JoinHandle<()>>>,
    },
}

/// Hands accepted messages to the pipeline.
pub struct Dispatcher {
    processor: Arc<MessageProcessor>,
    stats: Arc<DispatchStats>,
    mode: Mode,
}

impl Dispatcher {
    /// Spawn `workers` tasks draining a queue of at most `capacity` messages.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn(processor: Arc<MessageProcessor>, workers: usize, capacity: usize) -> Self {
        let workers = workers.max(1);
        let capacity = capacity.max(1);
        let (tx, rx) = mpsc::channel::<IncomingMessage>(capacity);
        let rx = Arc::new(Mutex::new(rx));
        let stats = Arc::new(DispatchStats::default());

        let handles = (0..workers)
            .map(|worker_id| {
                tokio::spawn(worker_loop(
                    worker_id,
                    Arc::clone(&rx),
                    Arc::clone(&processor),
                    Arc::clone(&stats),
                ))
            })
            .collect();

        info!(workers, capacity, "Dispatcher started");

        Self {
            processor,
            stats,
            mode: Mode::Queued {
                tx: RwLock::new(Some(tx)),
                capacity,
                workers: Mutex::new(handles),
            },
        }
    }

    /// Synchronous mode: every `submit` runs the pipeline before returning.
    pub fn inline(processor: Arc<MessageProcessor>) -> Self {
        Self {
            processor,
            stats: Arc::new(DispatchStats::default()),
            mode: Mode::Inline,
        }
    }

    pub fn processor(&self) -> &MessageProcessor {
        &self.processor
    }

    pub fn stats(&self) -> DispatchSnapshot {
        self.stats.snapshot()
    }

    /// Accept a message for processing.
    ///
    /// In queued mode this never waits for the pipeline; the caller learns
    /// nothing about the outcome.
    pub async fn submit(&self, message: IncomingMessage) -> Result<(), DispatchError> {
        match &self.mode {
            Mode::Inline => {
                self.stats.accepted.fetch_add(1, Ordering::Relaxed);
                let outcome = run_isolated(&self.processor, message).await;
                self.stats.record(&outcome);
                Ok(())
            }
            Mode::Queued { tx, capacity, .. } => {
                let guard = tx.read().await;
                let sender = guard.as_ref().ok_or(DispatchError::QueueClosed)?;
                sender.try_send(message).map_err(|e| match e {
                    mpsc::error::TrySendError::Full(_) => {
                        warn!(capacity, "Dispatch queue full, rejecting message");
                        DispatchError::QueueFull {
                            capacity: *capacity,
                        }
                    }
                    mpsc::error::TrySendError::Closed(_) => DispatchError::QueueClosed,
                })?;
                self.stats.accepted.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
        }
    }

    /// Stop accepting messages, drain what is queued and wait for the workers.
    pub async fn shutdown(&self) {
        let Mode::Queued { tx, workers, .. } = &self.mode else {
            return;
        };

        // Dropping the last sender lets workers exit once the queue is empty.
        tx.write().await.take();

        let handles: Vec<JoinHandle<()>> = workers.lock().await.drain(..).collect();
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "Dispatch worker ended abnormally");
            }
        }
        info!(stats = ?self.stats.snapshot(), "Dispatcher shut down");
    }
}

async fn worker_loop(
    worker_id: usize,
    rx: Arc<Mutex<mpsc::Receiver<IncomingMessage>>>,
    processor: Arc<MessageProcessor>,
    stats: Arc<DispatchStats>,
) {
    debug!(worker_id, "Dispatch worker started");
    loop {
        let next = { rx.lock().await.recv().await };
        let Some(message) = next else {
            debug!(worker_id, "Dispatch queue closed, worker exiting");
            return;
        };
        let outcome = run_isolated(&processor, message).await;
        debug!(worker_id, outcome = outcome.label(), "Message processed");
        stats.record(&outcome);
    }
}

/// Run the pipeline for one message on its own task. A panic anywhere in the
/// pipeline still ends in an escalated outcome and leaves the caller running.
async fn run_isolated(
    processor: &Arc<MessageProcessor>,
    message: IncomingMessage,
) -> PipelineOutcome {
    let task = {
        let processor = Arc::clone(processor);
        let message = message.clone();
        tokio::spawn(async move { processor.process(message).await })
    };

    match task.await {
        Ok(outcome) => outcome,
        Err(e) => {
            let reason = panic_reason(e);
            error!(channel = %message.channel_id, reason = %reason, "Pipeline task panicked");
            processor.escalate_aborted(message, reason).await
        }
    }
}

fn panic_reason(err: JoinError) -> String {
    if !err.is_panic() {
        return err.to_string();
    }
    let payload = err.into_panic();
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "task panicked".to_string()
    }
}
