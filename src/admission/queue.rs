//! Buffered admission: a bounded FIFO drained by a single worker.
//!
//! # Responsibilities
//! - Accept requests without blocking the producer, or reject when full
//! - Dispatch buffered requests one at a time, in arrival order, at the
//!   token bucket's rate
//! - Skip entries whose client has gone away
//!
//! # Design Decisions
//! - Bounded `mpsc` channel: many producers, one consumer task
//! - Each entry carries a oneshot response sink; the client leaving drops the
//!   receiver, which is the entry's cancellation signal
//! - Shutdown is observed between entries and while waiting for a token; a
//!   dispatch already in progress runs to completion

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use futures_util::future::{BoxFuture, FutureExt};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::Instant;

use crate::admission::token_bucket::TokenBucket;
use crate::error::GatewayError;
use crate::observability::metrics;

/// The rest of the middleware chain for one request.
pub type Downstream = Box<dyn FnOnce(Request<Body>) -> BoxFuture<'static, Response> + Send>;

/// A buffered request waiting for dispatch.
pub struct QueueEntry {
    request: Request<Body>,
    downstream: Downstream,
    respond_to: oneshot::Sender<Response>,
    enqueued_at: Instant,
}

/// Producer side of the admission queue. Cheap to clone.
#[derive(Clone)]
pub struct AdmissionQueue {
    tx: mpsc::Sender<QueueEntry>,
}

impl AdmissionQueue {
    /// Create a queue holding at most `capacity` entries and the worker that
    /// drains it. The worker does nothing until [`QueueWorker::run`] is spawned.
    pub fn new(capacity: usize, bucket: Arc<TokenBucket>) -> (Self, QueueWorker) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, QueueWorker { rx, bucket })
    }

    /// Enqueue without waiting. Returns the receiver for the eventual response.
    pub fn submit(
        &self,
        request: Request<Body>,
        downstream: Downstream,
    ) -> Result<oneshot::Receiver<Response>, GatewayError> {
        let (respond_to, response) = oneshot::channel();
        let entry = QueueEntry {
            request,
            downstream,
            respond_to,
            enqueued_at: Instant::now(),
        };

        match self.tx.try_send(entry) {
            Ok(()) => {
                metrics::set_queue_depth(self.depth());
                Ok(response)
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(capacity = self.capacity(), "Server queue full");
                metrics::record_rejected("queue_full");
                Err(GatewayError::QueueFull)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                metrics::record_rejected("queue_closed");
                Err(GatewayError::QueueClosed)
            }
        }
    }

    /// Entries currently buffered.
    pub fn depth(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    pub fn capacity(&self) -> usize {
        self.tx.max_capacity()
    }
}

/// Consumer side of the admission queue.
pub struct QueueWorker {
    rx: mpsc::Receiver<QueueEntry>,
    bucket: Arc<TokenBucket>,
}

impl QueueWorker {
    /// Drain the queue until shutdown or until every producer is gone.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!("Admission queue worker starting");

        loop {
            let entry = tokio::select! {
                biased;
                _ = shutdown.recv() => break,
                entry = self.rx.recv() => match entry {
                    Some(entry) => entry,
                    None => break,
                },
            };
            metrics::set_queue_depth(self.rx.len());

            let QueueEntry {
                request,
                downstream,
                mut respond_to,
                enqueued_at,
            } = entry;

            tokio::select! {
                _ = self.bucket.acquire() => {}
                _ = respond_to.closed() => {
                    tracing::debug!(
                        path = %request.uri().path(),
                        "Client went away while queued, skipping"
                    );
                    metrics::record_queue_abandoned();
                    continue;
                }
                _ = shutdown.recv() => break,
            }

            tracing::debug!(
                method = %request.method(),
                path = %request.uri().path(),
                queued_ms = enqueued_at.elapsed().as_millis() as u64,
                "Dispatching queued request"
            );

            let response = tokio::select! {
                response = downstream(request) => response,
                _ = respond_to.closed() => {
                    tracing::debug!("Client went away during dispatch");
                    metrics::record_queue_abandoned();
                    continue;
                }
            };

            if respond_to.send(response).is_err() {
                tracing::warn!("Failed to write response: client connection closed");
                metrics::record_response_write_failure();
            }
        }

        tracing::info!(dropped = self.rx.len(), "Admission queue worker stopped");
    }
}

/// Middleware function for buffered admission.
pub async fn admission_queue_middleware(
    State(queue): State<AdmissionQueue>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let downstream: Downstream = Box::new(move |request: Request<Body>| next.run(request).boxed());

    match queue.submit(request, downstream) {
        Ok(response) => match response.await {
            Ok(response) => response,
            Err(_) => GatewayError::QueueClosed.into_response(),
        },
        Err(e) => e.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;
    use axum::http::StatusCode;

    fn request(path: &str) -> Request<Body> {
        Request::builder().uri(path).body(Body::empty()).unwrap()
    }

    fn noop() -> Downstream {
        Box::new(|_: Request<Body>| async { Response::new(Body::empty()) }.boxed())
    }

    fn recording(label: &'static str, log: Arc<Mutex<Vec<&'static str>>>) -> Downstream {
        Box::new(move |_: Request<Body>| {
            async move {
                log.lock().unwrap().push(label);
                Response::new(Body::from(label))
            }
            .boxed()
        })
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_full_queue_rejects_with_stalled_worker() {
        let bucket = Arc::new(TokenBucket::new(5, 1.0));
        let (queue, _stalled_worker) = AdmissionQueue::new(100, bucket);

        let mut tasks = Vec::new();
        for i in 0..101 {
            let queue = queue.clone();
            tasks.push(tokio::spawn(async move {
                queue.submit(request(&format!("/{}", i)), noop()).map(drop)
            }));
        }

        let mut accepted = 0;
        let mut rejected = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(()) => accepted += 1,
                Err(e) => {
                    assert!(matches!(e, GatewayError::QueueFull));
                    assert_eq!(e.status(), StatusCode::SERVICE_UNAVAILABLE);
                    rejected += 1;
                }
            }
        }

        assert_eq!(accepted, 100);
        assert_eq!(rejected, 1);
        assert_eq!(queue.depth(), 100);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fifo_dispatch_order() {
        let bucket = Arc::new(TokenBucket::new(1, 1.0));
        let (queue, worker) = AdmissionQueue::new(10, bucket);
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let log = Arc::new(Mutex::new(Vec::new()));

        let a = queue.submit(request("/a"), recording("a", log.clone())).unwrap();
        let b = queue.submit(request("/b"), recording("b", log.clone())).unwrap();
        let c = queue.submit(request("/c"), recording("c", log.clone())).unwrap();

        let handle = tokio::spawn(worker.run(shutdown_rx));

        let start = Instant::now();
        for rx in [a, b, c] {
            assert_eq!(rx.await.unwrap().status(), StatusCode::OK);
        }
        // One token in the bucket, then one per second.
        assert!(start.elapsed() >= Duration::from_secs(2));
        assert_eq!(*log.lock().unwrap(), vec!["a", "b", "c"]);

        shutdown_tx.send(()).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_entry_is_skipped() {
        let bucket = Arc::new(TokenBucket::new(1, 1.0));
        assert!(bucket.try_acquire());
        let (queue, worker) = AdmissionQueue::new(10, bucket);
        let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let log = Arc::new(Mutex::new(Vec::new()));

        let gone = queue.submit(request("/gone"), recording("gone", log.clone())).unwrap();
        let kept = queue.submit(request("/kept"), recording("kept", log.clone())).unwrap();
        drop(gone);

        tokio::spawn(worker.run(shutdown_rx));

        let response = kept.await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(*log.lock().unwrap(), vec!["kept"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_releases_waiting_entries() {
        let bucket = Arc::new(TokenBucket::new(1, 0.001));
        assert!(bucket.try_acquire());
        let (queue, worker) = AdmissionQueue::new(10, bucket);
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let first = queue.submit(request("/first"), noop()).unwrap();
        let second = queue.submit(request("/second"), noop()).unwrap();

        let handle = tokio::spawn(worker.run(shutdown_rx));
        tokio::time::sleep(Duration::from_millis(10)).await;

        shutdown_tx.send(()).unwrap();
        handle.await.unwrap();

        assert!(first.await.is_err());
        assert!(second.await.is_err());

        let err = queue.submit(request("/late"), noop()).unwrap_err();
        assert!(matches!(err, GatewayError::QueueClosed));
    }

    #[tokio::test(start_paused = true)]
    async fn test_worker_stops_when_producers_gone() {
        let bucket = Arc::new(TokenBucket::new(1, 1.0));
        let (queue, worker) = AdmissionQueue::new(1, bucket);
        let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
        drop(queue);

        worker.run(shutdown_rx).await;
    }
}
