//! Shared token bucket.
//!
//! Refill and consume happen inside one critical section so concurrent
//! admission checks can never both spend the same token.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

/// A token bucket admitting up to `capacity` requests in a burst and
/// `refill_per_second` requests per second sustained.
#[derive(Debug)]
pub struct TokenBucket {
    capacity: f64,
    refill_per_second: f64,
    state: Mutex<BucketState>,
}

impl TokenBucket {
    /// Create a full bucket.
    pub fn new(capacity: u32, refill_per_second: f64) -> Self {
        let capacity = capacity as f64;
        Self {
            capacity,
            refill_per_second,
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
        }
    }

    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    pub fn refill_per_second(&self) -> f64 {
        self.refill_per_second
    }

    /// Consume one token if available. Never waits.
    pub fn try_acquire(&self) -> bool {
        self.take_or_wait_time().is_ok()
    }

    /// Wait until a token is available, then consume it.
    ///
    /// Cancel-safe: a token is only taken at the instant this returns, so
    /// dropping the future while it sleeps leaves the bucket untouched.
    pub async fn acquire(&self) {
        loop {
            match self.take_or_wait_time() {
                Ok(()) => return,
                Err(wait) => tokio::time::sleep(wait).await,
            }
        }
    }

    /// Tokens currently available, after refill.
    pub fn available(&self) -> f64 {
        let mut state = self.lock();
        self.refill(&mut state);
        state.tokens
    }

    fn take_or_wait_time(&self) -> Result<(), Duration> {
        let mut state = self.lock();
        self.refill(&mut state);

        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            Ok(())
        } else if self.refill_per_second > 0.0 {
            let missing = 1.0 - state.tokens;
            Err(Duration::from_secs_f64(missing / self.refill_per_second))
        } else {
            Err(Duration::from_secs(1))
        }
    }

    fn refill(&self, state: &mut BucketState) {
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill).as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.refill_per_second).min(self.capacity);
        state.last_refill = now;
    }

    fn lock(&self) -> MutexGuard<'_, BucketState> {
        // The state is two plain numbers; a panic mid-update cannot leave it
        // structurally broken, so keep using it.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
