use engine::{Detection, DetectionEngine, EngineError};
use image::RgbImage;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Mutex, mpsc, oneshot};

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("dispatch queue full, frame rejected")]
    Overloaded,

    #[error("inference exceeded {0:?}")]
    Timeout(Duration),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("dispatch coordinator is gone")]
    Closed,
}

#[derive(Debug, Clone)]
pub struct DispatchConfig {
    pub queue_depth: usize,
    pub infer_timeout: Duration,
    pub confidence_threshold: f32,
}

struct Job {
    image: RgbImage,
    session_id: u64,
    confidence_threshold: f32,
    reply: oneshot::Sender<Result<Vec<Detection>, DispatchError>>,
}

/// Arbitrates access to the one shared detection engine.
///
/// Requests from every session funnel into a single bounded FIFO queue;
/// a pool of `engine.max_concurrency()` workers drains it, so a
/// non-reentrant engine (the default) never sees two overlapping
/// `infer` calls. A full queue rejects the newest request instead of
/// growing without bound.
#[derive(Clone)]
pub struct DispatchHandle {
    tx: mpsc::Sender<Job>,
    confidence_threshold: f32,
}

impl DispatchHandle {
    pub fn spawn(engine: Arc<dyn DetectionEngine>, config: DispatchConfig) -> Self {
        let (tx, rx) = mpsc::channel::<Job>(config.queue_depth.max(1));
        let rx = Arc::new(Mutex::new(rx));

        let workers = engine.max_concurrency().max(1);
        tracing::info!(workers, queue_depth = config.queue_depth, "Dispatch coordinator starting");

        for worker_id in 0..workers {
            tokio::spawn(worker_loop(
                worker_id,
                Arc::clone(&engine),
                Arc::clone(&rx),
                config.infer_timeout,
            ));
        }

        Self {
            tx,
            confidence_threshold: config.confidence_threshold,
        }
    }

    /// Submit one decoded frame for inference and await its detections.
    /// Callable concurrently from any number of sessions; completion
    /// order across callers follows arrival order into the queue.
    pub async fn submit(
        &self,
        image: RgbImage,
        session_id: u64,
    ) -> Result<Vec<Detection>, DispatchError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let job = Job {
            image,
            session_id,
            confidence_threshold: self.confidence_threshold,
            reply: reply_tx,
        };

        match self.tx.try_send(job) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => return Err(DispatchError::Overloaded),
            Err(mpsc::error::TrySendError::Closed(_)) => return Err(DispatchError::Closed),
        }

        // Dropped reply sender means the worker pool is gone.
        reply_rx.await.map_err(|_| DispatchError::Closed)?
    }
}

async fn worker_loop(
    worker_id: usize,
    engine: Arc<dyn DetectionEngine>,
    rx: Arc<Mutex<mpsc::Receiver<Job>>>,
    infer_timeout: Duration,
) {
    loop {
        // Hold the receiver lock only while pulling the next job so
        // other workers can keep draining the queue.
        let job = { rx.lock().await.recv().await };
        let Some(job) = job else {
            tracing::debug!(worker_id, "Dispatch queue closed, worker exiting");
            break;
        };

        if job.reply.is_closed() {
            // Caller disconnected while queued; skip without touching
            // the engine.
            tracing::trace!(
                worker_id,
                session_id = job.session_id,
                "Caller gone, dropping queued frame"
            );
            continue;
        }

        let session_id = job.session_id;
        let threshold = job.confidence_threshold;
        let image = job.image;
        let engine = Arc::clone(&engine);

        // The engine call is blocking and not preemptible.
        let mut call = tokio::task::spawn_blocking(move || engine.infer(&image, threshold));

        let result = match tokio::time::timeout(infer_timeout, &mut call).await {
            Ok(Ok(outcome)) => outcome.map_err(DispatchError::Engine),
            Ok(Err(join_err)) => {
                tracing::error!(worker_id, session_id, error = %join_err, "Inference task failed");
                Err(DispatchError::Engine(EngineError::Inference(
                    join_err.to_string(),
                )))
            }
            Err(_) => {
                // Report the timeout now, but this slot is not free
                // until the stale call actually returns.
                tracing::warn!(worker_id, session_id, timeout = ?infer_timeout, "Inference timed out");
                let _ = job.reply.send(Err(DispatchError::Timeout(infer_timeout)));
                let _ = call.await;
                continue;
            }
        };

        // Caller may be gone by now; its result is simply discarded.
        let _ = job.reply.send(result);
    }
}
