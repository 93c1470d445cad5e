use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::time::sleep;

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub time_window: Duration,
    pub burst_allowance: u32,
}

impl RateLimitConfig {
    /// The recent-search tier budget: conservative enough for the free
    /// endpoint tiers, with a small burst for the search + lookup pair a
    /// single run issues.
    pub fn platform_search() -> Self {
        Self {
            max_requests: 60,
            time_window: Duration::from_secs(15 * 60),
            burst_allowance: 5,
        }
    }
}

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

/// Token bucket gating outbound API requests.
#[derive(Debug)]
pub struct RateLimiter {
    state: Arc<Mutex<BucketState>>,
    capacity: f64,
    refill_rate: f64, // tokens per second
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        let capacity = config.burst_allowance as f64;
        let refill_rate = config.max_requests as f64 / config.time_window.as_secs_f64();

        Self {
            state: Arc::new(Mutex::new(BucketState {
                tokens: capacity,
                last_refill: Instant::now(),
            })),
            capacity,
            refill_rate,
        }
    }

    /// Takes one token, sleeping until the bucket refills if necessary.
    pub async fn acquire(&self) {
        loop {
            match self.try_acquire().await {
                Ok(()) => return,
                Err(wait_time) => {
                    tracing::debug!("Rate limit reached, waiting {:?}", wait_time);
                    sleep(wait_time).await;
                }
            }
        }
    }

    /// Takes one token if available, otherwise returns the wait time until
    /// the next token.
    pub async fn try_acquire(&self) -> Result<(), Duration> {
        let mut state = self.state.lock().await;

        let elapsed = state.last_refill.elapsed();
        state.tokens = (state.tokens + elapsed.as_secs_f64() * self.refill_rate).min(self.capacity);
        state.last_refill = Instant::now();

        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            Ok(())
        } else {
            let deficit = 1.0 - state.tokens;
            Err(Duration::from_secs_f64(deficit / self.refill_rate))
        }
    }

    pub async fn available_tokens(&self) -> f64 {
        let mut state = self.state.lock().await;
        let elapsed = state.last_refill.elapsed();
        state.tokens = (state.tokens + elapsed.as_secs_f64() * self.refill_rate).min(self.capacity);
        state.last_refill = Instant::now();
        state.tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_burst_then_exhaustion() {
        let limiter = RateLimiter::new(RateLimitConfig {
            max_requests: 10,
            time_window: Duration::from_secs(100),
            burst_allowance: 3,
        });

        for _ in 0..3 {
            assert!(limiter.try_acquire().await.is_ok());
        }
        assert!(limiter.try_acquire().await.is_err());
    }

    #[tokio::test]
    async fn test_refill_restores_tokens() {
        let limiter = RateLimiter::new(RateLimitConfig {
            max_requests: 100, // 10 tokens per second
            time_window: Duration::from_secs(10),
            burst_allowance: 1,
        });

        assert!(limiter.try_acquire().await.is_ok());
        assert!(limiter.try_acquire().await.is_err());

        sleep(Duration::from_millis(150)).await;
        assert!(limiter.try_acquire().await.is_ok());
    }

    #[tokio::test]
    async fn test_wait_time_reported() {
        let limiter = RateLimiter::new(RateLimitConfig {
            max_requests: 1,
            time_window: Duration::from_secs(60),
            burst_allowance: 1,
        });

        assert!(limiter.try_acquire().await.is_ok());
        let wait = limiter.try_acquire().await.unwrap_err();
        assert!(wait > Duration::from_secs(0));
        assert!(wait <= Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_default_search_config() {
        let limiter = RateLimiter::new(RateLimitConfig::platform_search());
        assert!(limiter.available_tokens().await > 0.0);
    }
}
