//! Admission control subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request (after access log):
//!     policy = "reject":
//!         → rate_limit.rs (one token or 429)
//!     policy = "queue":
//!         → queue.rs (enqueue or 503)
//!         → worker waits on token_bucket.rs
//!         → dispatch to routing, one request at a time
//!     → Pass to routing
//! ```
//!
//! # Design Decisions
//! - One shared bucket per process, constructed explicitly and passed in
//! - Exactly one policy per deployment; the two are never combined
//! - Rejections are immediate and never retried by the gateway

pub mod queue;
pub mod rate_limit;
pub mod token_bucket;

use std::sync::Arc;

use axum::{middleware, Router};

use crate::config::{AdmissionConfig, AdmissionPolicy};

pub use queue::{admission_queue_middleware, AdmissionQueue, Downstream, QueueWorker};
pub use rate_limit::rate_limit_middleware;
pub use token_bucket::TokenBucket;

/// The admission gate in front of routing.
#[derive(Clone)]
pub enum Admission {
    Reject(Arc<TokenBucket>),
    Queue(AdmissionQueue),
}

impl Admission {
    /// Build the configured gate. The queue policy also returns the worker,
    /// which the caller must spawn.
    pub fn from_config(config: &AdmissionConfig) -> (Self, Option<QueueWorker>) {
        let bucket = Arc::new(TokenBucket::new(
            config.bucket_capacity,
            config.refill_per_second,
        ));

        tracing::info!(
            policy = %config.policy,
            bucket_capacity = config.bucket_capacity,
            refill_per_second = config.refill_per_second,
            queue_capacity = config.queue_capacity,
            "Admission control configured"
        );

        match config.policy {
            AdmissionPolicy::Reject => (Admission::Reject(bucket), None),
            AdmissionPolicy::Queue => {
                let (queue, worker) = AdmissionQueue::new(config.queue_capacity, bucket);
                (Admission::Queue(queue), Some(worker))
            }
        }
    }

    pub fn policy(&self) -> AdmissionPolicy {
        match self {
            Admission::Reject(_) => AdmissionPolicy::Reject,
            Admission::Queue(_) => AdmissionPolicy::Queue,
        }
    }

    /// Wrap every route of `router` with this gate.
    pub fn layer<S>(&self, router: Router<S>) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        match self {
            Admission::Reject(bucket) => router.layer(middleware::from_fn_with_state(
                bucket.clone(),
                rate_limit_middleware,
            )),
            Admission::Queue(queue) => router.layer(middleware::from_fn_with_state(
                queue.clone(),
                admission_queue_middleware,
            )),
        }
    }
}
