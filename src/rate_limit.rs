use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{debug, instrument, warn};

use crate::error::{Result, TrackerError};

/// Token-bucket limiter shared by all clones of a provider client
///
/// NCBI E-utilities accept 3 requests per second without an API key and
/// 10 with one. Exceeding that gets the caller's IP throttled, so every
/// E-utilities request takes a token first.
#[derive(Clone)]
pub struct RateLimiter {
    bucket: Arc<Mutex<TokenBucket>>,
}

struct TokenBucket {
    tokens: f64,
    capacity: f64,
    /// tokens per second
    refill_rate: f64,
    last_refill: Instant,
}

impl RateLimiter {
    /// Create a limiter allowing `rate` requests per second
    ///
    /// ```
    /// use publication_tracker::rate_limit::RateLimiter;
    ///
    /// let limiter = RateLimiter::new(3.0);
    /// ```
    pub fn new(rate: f64) -> Self {
        let rate = if rate.is_finite() && rate > 0.0 {
            rate
        } else {
            1.0
        };
        let capacity = rate.max(1.0);
        Self {
            bucket: Arc::new(Mutex::new(TokenBucket {
                tokens: capacity,
                capacity,
                refill_rate: rate,
                last_refill: Instant::now(),
            })),
        }
    }

    /// NCBI limit for the given credential state
    pub fn for_eutils(has_api_key: bool) -> Self {
        if has_api_key {
            Self::new(10.0)
        } else {
            Self::new(3.0)
        }
    }

    /// Take one token, sleeping until the bucket has refilled enough
    #[instrument(skip(self))]
    pub async fn acquire(&self) -> Result<()> {
        let wait = {
            let mut bucket = self.bucket.lock().await;
            match bucket.try_take() {
                Ok(()) => {
                    debug!(remaining_tokens = %bucket.tokens, "Token acquired");
                    return Ok(());
                }
                Err(wait) => wait,
            }
        };

        debug!(wait_ms = wait.as_millis() as u64, "Waiting for rate limit token");
        sleep(wait).await;

        let mut bucket = self.bucket.lock().await;
        match bucket.try_take() {
            Ok(()) => {
                debug!(remaining_tokens = %bucket.tokens, "Token acquired after waiting");
                Ok(())
            }
            Err(_) => {
                warn!("Token still unavailable after waiting");
                Err(TrackerError::RateLimitExceeded)
            }
        }
    }

    /// Whether a token could be taken right now, without taking it
    pub async fn check_available(&self) -> bool {
        let mut bucket = self.bucket.lock().await;
        bucket.refill();
        bucket.tokens >= 1.0
    }

    pub async fn token_count(&self) -> f64 {
        let mut bucket = self.bucket.lock().await;
        bucket.refill();
        bucket.tokens
    }

    pub async fn rate(&self) -> f64 {
        self.bucket.lock().await.refill_rate
    }
}

impl TokenBucket {
    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.capacity);
        self.last_refill = now;
    }

    /// Take a token, or report how long until one is available
    fn try_take(&mut self) -> std::result::Result<(), Duration> {
        self.refill();
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            Ok(())
        } else {
            let deficit = 1.0 - self.tokens;
            // Round up slightly so the refill after sleeping reaches a full token
            Err(Duration::from_secs_f64(deficit / self.refill_rate) + Duration::from_millis(1))
        }
    }
}
