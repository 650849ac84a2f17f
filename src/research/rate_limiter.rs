//! Token-bucket rate limiter (Component A).
//!
//! Named buckets keyed by service (`"search"`, `"llm"`, ...). `acquire`
//! blocks until a token is available, respecting a maximum queue depth
//! (reject fast with `queue_full`) and a maximum wait time (reject with
//! `timeout`). Refill is computed lazily on every acquire. Fairness is FIFO:
//! waiters are served in registration order via a ticket counter.

use crate::error::{Error, ResearchError, Result};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;
use tracing::{debug, warn};

struct BucketState {
    capacity: f64,
    refill_rate_per_sec: f64,
    tokens: f64,
    last_refill: Instant,
    /// Tickets currently admitted to the queue, in FIFO order.
    queue: VecDeque<u64>,
    next_ticket: u64,
    max_queue_depth: usize,
    max_wait: Duration,
}

impl BucketState {
    fn new(capacity: f64, refill_rate_per_sec: f64, max_queue_depth: usize, max_wait: Duration) -> Self {
        Self {
            capacity,
            refill_rate_per_sec,
            tokens: capacity,
            last_refill: Instant::now(),
            queue: VecDeque::new(),
            next_ticket: 0,
            max_queue_depth,
            max_wait,
        }
    }

    /// Refills tokens based on elapsed time since the last refill, capped at
    /// `capacity`.
    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_rate_per_sec).min(self.capacity);
        self.last_refill = now;
    }

    /// Seconds until at least one token is available, given current tokens.
    fn seconds_until_token(&self) -> f64 {
        if self.tokens >= 1.0 {
            0.0
        } else {
            (1.0 - self.tokens) / self.refill_rate_per_sec
        }
    }
}

struct Bucket {
    state: Mutex<BucketState>,
    notify: Notify,
}

/// Named token-bucket rate limiter, one bucket per external service.
pub struct RateLimiter {
    buckets: Mutex<HashMap<String, Arc<Bucket>>>,
    default_capacity: f64,
    default_refill_rate_per_sec: f64,
    default_max_queue_depth: usize,
    default_max_wait: Duration,
}

impl RateLimiter {
    /// Creates a limiter whose buckets use the given defaults until
    /// configured otherwise.
    #[must_use]
    pub fn new(
        default_capacity: f64,
        default_refill_rate_per_sec: f64,
        default_max_queue_depth: usize,
        default_max_wait_ms: u64,
    ) -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
            default_capacity,
            default_refill_rate_per_sec,
            default_max_queue_depth,
            default_max_wait: Duration::from_millis(default_max_wait_ms),
        }
    }

    async fn bucket(&self, name: &str) -> Arc<Bucket> {
        let mut buckets = self.buckets.lock().await;
        buckets
            .entry(name.to_string())
            .or_insert_with(|| {
                Arc::new(Bucket {
                    state: Mutex::new(BucketState::new(
                        self.default_capacity,
                        self.default_refill_rate_per_sec,
                        self.default_max_queue_depth,
                        self.default_max_wait,
                    )),
                    notify: Notify::new(),
                })
            })
            .clone()
    }

    /// Blocks until a token is available on the named bucket.
    ///
    /// # Errors
    ///
    /// Returns `ResearchError::RateLimited` with reason `queue_full` if the
    /// bucket's queue is already at capacity, or reason `timeout` if the
    /// wait exceeds the bucket's configured maximum.
    pub async fn acquire(&self, bucket_name: &str) -> Result<()> {
        let bucket = self.bucket(bucket_name).await;
        let deadline;
        let my_ticket;

        {
            let mut state = bucket.state.lock().await;
            if state.queue.len() >= state.max_queue_depth {
                warn!(bucket = bucket_name, "rate limiter queue full");
                return Err(Error::Research(ResearchError::RateLimited {
                    bucket: bucket_name.to_string(),
                    reason: "queue_full".to_string(),
                }));
            }
            my_ticket = state.next_ticket;
            state.next_ticket += 1;
            state.queue.push_back(my_ticket);
            deadline = Instant::now() + state.max_wait;
        }

        let result = self.wait_for_turn(&bucket, my_ticket, deadline).await;
        if result.is_err() {
            let mut state = bucket.state.lock().await;
            state.queue.retain(|&t| t != my_ticket);
            bucket.notify.notify_waiters();
        }
        result
    }

    async fn wait_for_turn(&self, bucket: &Bucket, my_ticket: u64, deadline: Instant) -> Result<()> {
        loop {
            {
                let mut state = bucket.state.lock().await;
                state.refill();
                let is_front = state.queue.front() == Some(&my_ticket);
                if is_front && state.tokens >= 1.0 {
                    state.tokens -= 1.0;
                    state.queue.pop_front();
                    drop(state);
                    bucket.notify.notify_waiters();
                    debug!(ticket = my_ticket, "rate limiter token acquired");
                    return Ok(());
                }
            }

            if Instant::now() >= deadline {
                return Err(Error::Research(ResearchError::Timeout {
                    operation: "rate_limiter_acquire".to_string(),
                    millis: deadline.elapsed().as_millis() as u64,
                }));
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            let refill_wait = {
                let state = bucket.state.lock().await;
                Duration::from_secs_f64(state.seconds_until_token().max(0.0))
            };
            let wait = remaining.min(refill_wait).min(Duration::from_millis(50));

            tokio::select! {
                () = bucket.notify.notified() => {}
                () = tokio::time::sleep(wait) => {}
            }
        }
    }
}
