//! 업스트림 요청 속도 제한.
//!
//! Token Bucket 알고리즘 기반입니다. 호출자 수와 무관하게 프로세스 전체에서
//! 하나의 버킷을 공유하며, 토큰이 없으면 거절하지 않고 다음 토큰까지 대기합니다.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::time::Instant;
use tracing::trace;

/// 부동소수점 리필 오차 허용치.
const TOKEN_EPSILON: f64 = 1e-9;

/// Token Bucket 구조체.
#[derive(Debug)]
struct TokenBucket {
    /// 현재 토큰 수
    tokens: f64,
    /// 마지막 리필 시간
    last_refill: Instant,
    /// 최대 토큰 수 (버킷 용량)
    max_tokens: f64,
    /// 초당 리필되는 토큰 수
    refill_rate: f64,
}

impl TokenBucket {
    fn new(requests_per_second: f64) -> Self {
        let max_tokens = requests_per_second.ceil().max(1.0);

        Self {
            tokens: max_tokens,
            last_refill: Instant::now(),
            max_tokens,
            refill_rate: requests_per_second,
        }
    }

    /// 토큰 소비 시도.
    fn try_acquire(&mut self) -> bool {
        self.refill();

        if self.tokens >= 1.0 - TOKEN_EPSILON {
            self.tokens = (self.tokens - 1.0).max(0.0);
            true
        } else {
            false
        }
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();

        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.max_tokens);
        self.last_refill = now;
    }

    /// 다음 토큰까지 대기 시간.
    fn time_until_next_token(&self) -> Duration {
        if self.tokens >= 1.0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64((1.0 - self.tokens) / self.refill_rate)
        }
    }
}

/// 프로세스 전역 요청 속도 제한기.
///
/// 어떤 1초 구간에서도 허용되는 요청은 `ceil(rps)` 버스트에 리필분을 더한 값을 넘지 않습니다.
#[derive(Debug)]
pub struct RateLimiter {
    bucket: Mutex<TokenBucket>,
    admitted: AtomicU64,
}

impl RateLimiter {
    /// 새 Rate Limiter 생성.
    ///
    /// `requests_per_second`는 양수여야 합니다. 설정 검증에서 걸러지지 않은 값은
    /// 최소 0.001로 보정됩니다.
    pub fn new(requests_per_second: f64) -> Self {
        let rate = if requests_per_second.is_finite() {
            requests_per_second.max(0.001)
        } else {
            1.0
        };

        Self {
            bucket: Mutex::new(TokenBucket::new(rate)),
            admitted: AtomicU64::new(0),
        }
    }

    /// 요청 허가를 받을 때까지 대기.
    ///
    /// 대기 중 future가 drop되면 토큰은 소비되지 않습니다.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut bucket = self.bucket.lock().unwrap_or_else(PoisonError::into_inner);
                if bucket.try_acquire() {
                    self.admitted.fetch_add(1, Ordering::Relaxed);
                    return;
                }
                bucket.time_until_next_token()
            };

            trace!(wait_ms = wait.as_millis() as u64, "Rate limited, waiting");
            tokio::time::sleep(wait.max(Duration::from_millis(1))).await;
        }
    }

    /// 대기 없이 허가 시도.
    pub fn try_acquire(&self) -> bool {
        let mut bucket = self.bucket.lock().unwrap_or_else(PoisonError::into_inner);
        let acquired = bucket.try_acquire();
        if acquired {
            self.admitted.fetch_add(1, Ordering::Relaxed);
        }
        acquired
    }

    /// 지금까지 허가된 요청 수.
    pub fn admitted(&self) -> u64 {
        self.admitted.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_burst_then_steady_rate() {
        let limiter = RateLimiter::new(2.0);
        let start = Instant::now();

        limiter.acquire().await;
        limiter.acquire().await;
        assert!(start.elapsed() < Duration::from_millis(10));

        for _ in 0..4 {
            limiter.acquire().await;
        }
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(1990), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(2500), "{elapsed:?}");
        assert_eq!(limiter.admitted(), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fractional_rate() {
        let limiter = RateLimiter::new(0.5);
        let start = Instant::now();

        limiter.acquire().await;
        assert!(!limiter.try_acquire());
        limiter.acquire().await;

        assert!(start.elapsed() >= Duration::from_millis(1990));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_share_one_bucket() {
        let limiter = Arc::new(RateLimiter::new(5.0));
        let start = Instant::now();

        let handles: Vec<_> = (0..10)
            .map(|_| {
                let limiter = limiter.clone();
                tokio::spawn(async move {
                    limiter.acquire().await;
                    Instant::now()
                })
            })
            .collect();

        let mut admitted_at = Vec::new();
        for handle in handles {
            admitted_at.push(handle.await.unwrap());
        }

        let within_first_window = admitted_at
            .iter()
            .filter(|t| t.duration_since(start) < Duration::from_millis(200))
            .count();
        assert_eq!(within_first_window, 5);
        assert!(start.elapsed() >= Duration::from_millis(950));
        assert_eq!(limiter.admitted(), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_waiter_does_not_consume() {
        let limiter = RateLimiter::new(1.0);
        limiter.acquire().await;

        let cancelled =
            tokio::time::timeout(Duration::from_millis(100), limiter.acquire()).await;
        assert!(cancelled.is_err());
        assert_eq!(limiter.admitted(), 1);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(limiter.try_acquire());
    }
}
