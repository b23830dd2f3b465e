//! Token-bucket rate limiting shared by every classifier call.

use std::sync::Mutex;
use std::time::{Duration, Instant};

/// A mutex-protected token bucket. Callers block in [`acquire`] until a
/// token is available; the refill is recomputed under the lock on every
/// attempt, and the sleep between attempts is bounded by the time to the
/// next token.
///
/// [`acquire`]: TokenBucket::acquire
#[derive(Debug)]
pub struct TokenBucket {
    rate: f64,
    capacity: f64,
    state: Mutex<BucketState>,
}

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    /// `rate` tokens per second, `capacity` burst size. Both are clamped to
    /// a small positive floor so a zero in the config cannot stall forever.
    pub fn new(rate: f64, capacity: f64) -> Self {
        let rate = rate.max(1e-3);
        let capacity = capacity.max(1.0);
        Self {
            rate,
            capacity,
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Consume one token, sleeping until one is available.
    pub fn acquire(&self) {
        loop {
            let wait = {
                let mut state = self.state.lock().unwrap();
                let now = Instant::now();
                let elapsed = now.duration_since(state.last_refill).as_secs_f64();
                state.tokens = (state.tokens + elapsed * self.rate).min(self.capacity);
                state.last_refill = now;

                if state.tokens >= 1.0 {
                    state.tokens -= 1.0;
                    return;
                }
                (1.0 - state.tokens) / self.rate
            };
            if wait > 0.0 {
                std::thread::sleep(Duration::from_secs_f64(wait));
            }
        }
    }
}
