//! 시세 조회 조정자 시나리오 테스트.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use pricefeed_core::{InstrumentType, Quote, TickerResult};
use pricefeed_data::{
    FetchCoordinator, FetchError, PriceCache, QuoteError, QuoteSource, RateLimiter,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// 호출 횟수를 기록하는 가짜 시세 제공자.
struct FakeSource {
    prices: HashMap<String, Decimal>,
    failing: HashSet<String>,
    delay: Duration,
    calls: AtomicUsize,
    searches: AtomicUsize,
    per_symbol: Mutex<HashMap<String, usize>>,
}

impl FakeSource {
    fn new(prices: &[(&str, Decimal)]) -> Self {
        Self {
            prices: prices.iter().map(|(s, p)| (s.to_string(), *p)).collect(),
            failing: HashSet::new(),
            delay: Duration::from_millis(50),
            calls: AtomicUsize::new(0),
            searches: AtomicUsize::new(0),
            per_symbol: Mutex::new(HashMap::new()),
        }
    }

    fn failing(mut self, symbol: &str) -> Self {
        self.failing.insert(symbol.to_string());
        self
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn calls_for(&self, symbol: &str) -> usize {
        self.per_symbol
            .lock()
            .unwrap()
            .get(symbol)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl QuoteSource for FakeSource {
    fn name(&self) -> &str {
        "fake"
    }

    async fn fetch_quote(&self, symbol: &str, gate: &RateLimiter) -> Result<Quote, FetchError> {
        gate.acquire().await;
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self
            .per_symbol
            .lock()
            .unwrap()
            .entry(symbol.to_string())
            .or_default() += 1;

        tokio::time::sleep(self.delay).await;

        if self.failing.contains(symbol) {
            return Err(FetchError::HttpStatus {
                status: 500,
                symbol: symbol.to_string(),
            });
        }
        self.prices
            .get(symbol)
            .map(|price| Quote::new(symbol, *price, "USD"))
            .ok_or_else(|| FetchError::NoPriceData(symbol.to_string()))
    }

    async fn search(
        &self,
        query: &str,
        gate: &RateLimiter,
    ) -> Result<Vec<TickerResult>, FetchError> {
        gate.acquire().await;
        self.searches.fetch_add(1, Ordering::SeqCst);
        Ok(vec![TickerResult {
            symbol: query.to_uppercase(),
            name: format!("{query} Inc."),
            exchange: "NMS".to_string(),
            instrument_type: InstrumentType::Equity,
        }])
    }
}

fn coordinator(source: Arc<FakeSource>, ttl: Duration, rps: f64) -> FetchCoordinator {
    FetchCoordinator::new(
        source,
        Arc::new(PriceCache::new(ttl)),
        Arc::new(RateLimiter::new(rps)),
    )
}

fn symbols(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

const TTL: Duration = Duration::from_secs(15 * 60);

#[tokio::test(start_paused = true)]
async fn concurrent_callers_share_one_upstream_fetch() {
    let source = Arc::new(FakeSource::new(&[("AAPL", dec!(189.25))]));
    let coordinator = coordinator(source.clone(), TTL, 100.0);

    let handles: Vec<_> = (0..10)
        .map(|_| {
            let coordinator = coordinator.clone();
            tokio::spawn(async move {
                coordinator
                    .resolve(&CancellationToken::new(), &symbols(&["AAPL"]))
                    .await
            })
        })
        .collect();

    for handle in handles {
        let quotes = handle.await.unwrap().unwrap();
        assert_eq!(quotes["AAPL"].price, dec!(189.25));
    }

    assert_eq!(source.calls(), 1);
    assert_eq!(coordinator.upstream_fetches(), 1);
    assert_eq!(coordinator.in_flight_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn concurrent_callers_share_one_failure() {
    let source = Arc::new(FakeSource::new(&[]).failing("BAD"));
    let coordinator = coordinator(source.clone(), TTL, 100.0);

    let handles: Vec<_> = (0..5)
        .map(|_| {
            let coordinator = coordinator.clone();
            tokio::spawn(async move {
                coordinator
                    .resolve(&CancellationToken::new(), &symbols(&["BAD"]))
                    .await
            })
        })
        .collect();

    for handle in handles {
        match handle.await.unwrap() {
            Err(QuoteError::AllFailed { failures }) => {
                assert!(matches!(
                    failures["BAD"],
                    FetchError::HttpStatus { status: 500, .. }
                ));
            }
            other => panic!("expected AllFailed, got {other:?}"),
        }
    }

    assert_eq!(source.calls(), 1);
    assert_eq!(coordinator.in_flight_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn cache_ttl_controls_refetch() {
    let source = Arc::new(FakeSource::new(&[("AAPL", dec!(190)), ("MSFT", dec!(415))]));
    let coordinator = coordinator(source.clone(), TTL, 100.0);
    let cancel = CancellationToken::new();
    let both = symbols(&["AAPL", "MSFT"]);

    coordinator.resolve(&cancel, &both).await.unwrap();
    assert_eq!(source.calls(), 2);

    tokio::time::advance(Duration::from_secs(5 * 60)).await;
    let quotes = coordinator.resolve(&cancel, &symbols(&["AAPL"])).await.unwrap();
    assert_eq!(quotes["AAPL"].price, dec!(190));
    assert_eq!(source.calls(), 2);

    tokio::time::advance(Duration::from_secs(11 * 60)).await;
    let quotes = coordinator.resolve(&cancel, &both).await.unwrap();
    assert_eq!(quotes.len(), 2);
    assert_eq!(source.calls(), 4);
    assert_eq!(source.calls_for("MSFT"), 2);
}

#[tokio::test(start_paused = true)]
async fn symbols_are_normalized_and_deduplicated() {
    let source = Arc::new(FakeSource::new(&[("AAPL", dec!(190))]));
    let coordinator = coordinator(source.clone(), TTL, 100.0);

    let quotes = coordinator
        .resolve(&CancellationToken::new(), &symbols(&[" aapl", "AAPL", "Aapl "]))
        .await
        .unwrap();

    assert_eq!(quotes.len(), 1);
    assert!(quotes.contains_key("AAPL"));
    assert_eq!(source.calls_for("AAPL"), 1);
}

#[tokio::test(start_paused = true)]
async fn empty_request_makes_no_upstream_call() {
    let source = Arc::new(FakeSource::new(&[]));
    let coordinator = coordinator(source.clone(), TTL, 100.0);

    let quotes = coordinator
        .resolve(&CancellationToken::new(), &symbols(&[]))
        .await
        .unwrap();
    assert!(quotes.is_empty());

    let quotes = coordinator
        .resolve(&CancellationToken::new(), &symbols(&["  "]))
        .await
        .unwrap();
    assert!(quotes.is_empty());
    assert_eq!(source.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn partial_failure_returns_successful_subset() {
    let source = Arc::new(FakeSource::new(&[("AAPL", dec!(190)), ("TSLA", dec!(250))]).failing("BAD"));
    let coordinator = coordinator(source.clone(), TTL, 100.0);

    let quotes = coordinator
        .resolve(&CancellationToken::new(), &symbols(&["AAPL", "BAD", "TSLA", "NOPRICE"]))
        .await
        .unwrap();

    let mut keys: Vec<&String> = quotes.keys().collect();
    keys.sort();
    assert_eq!(keys, vec!["AAPL", "TSLA"]);
    assert_eq!(coordinator.cache().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn all_failures_are_reported_together() {
    let source = Arc::new(FakeSource::new(&[]).failing("BAD"));
    let coordinator = coordinator(source.clone(), TTL, 100.0);

    let err = coordinator
        .resolve(&CancellationToken::new(), &symbols(&["BAD", "GONE"]))
        .await
        .unwrap_err();

    match err {
        QuoteError::AllFailed { failures } => {
            assert_eq!(failures.len(), 2);
            assert!(matches!(failures["BAD"], FetchError::HttpStatus { status: 500, .. }));
            assert!(matches!(failures["GONE"], FetchError::NoPriceData(_)));
        }
        other => panic!("expected AllFailed, got {other:?}"),
    }
    assert!(coordinator.cache().is_empty());
}

#[tokio::test(start_paused = true)]
async fn failures_are_not_cached() {
    let source = Arc::new(FakeSource::new(&[]).failing("BAD"));
    let coordinator = coordinator(source.clone(), TTL, 100.0);
    let bad = symbols(&["BAD"]);

    assert!(coordinator.resolve(&CancellationToken::new(), &bad).await.is_err());
    assert!(coordinator.resolve(&CancellationToken::new(), &bad).await.is_err());
    assert_eq!(source.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn cancelling_one_waiter_keeps_fetch_for_others() {
    let source = Arc::new(
        FakeSource::new(&[("AAPL", dec!(190))]).with_delay(Duration::from_secs(5)),
    );
    let coordinator = coordinator(source.clone(), TTL, 100.0);

    let cancel_a = CancellationToken::new();
    let task_a = {
        let coordinator = coordinator.clone();
        let cancel = cancel_a.clone();
        tokio::spawn(async move { coordinator.resolve(&cancel, &symbols(&["AAPL"])).await })
    };
    let task_b = {
        let coordinator = coordinator.clone();
        tokio::spawn(async move {
            coordinator
                .resolve(&CancellationToken::new(), &symbols(&["AAPL"]))
                .await
        })
    };

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(coordinator.in_flight_count(), 1);
    cancel_a.cancel();

    assert!(matches!(task_a.await.unwrap(), Err(QuoteError::Cancelled)));
    let quotes = task_b.await.unwrap().unwrap();
    assert_eq!(quotes["AAPL"].price, dec!(190));
    assert_eq!(source.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn fetch_is_dropped_when_every_waiter_cancels() {
    let source = Arc::new(
        FakeSource::new(&[("AAPL", dec!(190))]).with_delay(Duration::from_secs(5)),
    );
    let coordinator = coordinator(source.clone(), TTL, 100.0);

    let cancel = CancellationToken::new();
    let task = {
        let coordinator = coordinator.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { coordinator.resolve(&cancel, &symbols(&["AAPL"])).await })
    };

    tokio::time::sleep(Duration::from_millis(100)).await;
    cancel.cancel();
    assert!(matches!(task.await.unwrap(), Err(QuoteError::Cancelled)));
    assert_eq!(coordinator.in_flight_count(), 0);
    assert!(coordinator.cache().is_empty());

    // 다음 요청은 새 조회를 시작한다
    let quotes = coordinator
        .resolve(&CancellationToken::new(), &symbols(&["AAPL"]))
        .await
        .unwrap();
    assert_eq!(quotes["AAPL"].price, dec!(190));
    assert_eq!(source.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn already_cancelled_request_returns_immediately() {
    let source = Arc::new(FakeSource::new(&[("AAPL", dec!(190))]));
    let coordinator = coordinator(source.clone(), TTL, 100.0);

    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = coordinator.resolve(&cancel, &symbols(&["AAPL"])).await;
    assert!(matches!(result, Err(QuoteError::Cancelled)));
    assert_eq!(source.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn upstream_rate_is_capped_across_symbols() {
    let prices: Vec<(&str, Decimal)> = ["A", "B", "C", "D", "E", "F"]
        .iter()
        .map(|s| (*s, dec!(10)))
        .collect();
    let source = Arc::new(FakeSource::new(&prices).with_delay(Duration::ZERO));
    let coordinator = coordinator(source.clone(), TTL, 2.0);

    let start = Instant::now();
    let quotes = coordinator
        .resolve(&CancellationToken::new(), &symbols(&["A", "B", "C", "D", "E", "F"]))
        .await
        .unwrap();

    assert_eq!(quotes.len(), 6);
    assert_eq!(coordinator.limiter().admitted(), 6);
    // 버스트 2개 이후 초당 2개
    assert!(start.elapsed() >= Duration::from_millis(1990));
}

#[tokio::test(start_paused = true)]
async fn search_goes_through_limiter() {
    let source = Arc::new(FakeSource::new(&[]));
    let coordinator = coordinator(source.clone(), TTL, 100.0);
    let cancel = CancellationToken::new();

    let results = coordinator.search(&cancel, " apple ").await.unwrap();
    assert_eq!(results[0].symbol, "APPLE");
    assert_eq!(coordinator.limiter().admitted(), 1);

    assert!(coordinator.search(&cancel, "   ").await.unwrap().is_empty());
    assert_eq!(source.searches.load(Ordering::SeqCst), 1);

    cancel.cancel();
    assert!(matches!(
        coordinator.search(&cancel, "msft").await,
        Err(FetchError::Cancelled)
    ));
}
