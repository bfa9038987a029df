//! 시세 조회 조정자.
//!
//! 캐시 → 진행 중 조회 합류 → 업스트림 순으로 시세를 해석합니다.
//!
//! # 동작
//!
//! - 신선한 캐시 항목은 업스트림 없이 반환
//! - 같은 심볼에 대해 진행 중인 조회가 있으면 새 요청 없이 그 결과를 기다림
//! - 조회 결과는 기다리던 모든 호출자에게 동일하게 전달됨
//! - 한 호출자의 취소는 다른 호출자가 기다리는 조회를 취소하지 않음
//! - 기다리는 호출자가 모두 사라지면 조회 future가 drop됨

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use futures::future::{join_all, ready, BoxFuture, FutureExt, Shared, WeakShared};
use pricefeed_core::{normalize_symbol, Quote, TickerResult};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use super::rate_limit::RateLimiter;
use crate::cache::PriceCache;
use crate::error::{FetchError, QuoteError};
use crate::provider::QuoteSource;

type FetchFuture = BoxFuture<'static, Result<Quote, FetchError>>;

/// 진행 중인 심볼 조회.
///
/// 등록부는 약한 참조만 보관하므로 기다리는 호출자가 없으면 조회가 정리됩니다.
struct InFlight {
    id: u64,
    fetch: WeakShared<FetchFuture>,
}

struct Inner {
    source: Arc<dyn QuoteSource>,
    cache: Arc<PriceCache>,
    limiter: Arc<RateLimiter>,
    in_flight: Mutex<HashMap<String, InFlight>>,
    next_id: AtomicU64,
    upstream_fetches: AtomicU64,
}

impl Inner {
    /// 진행 중인 조회에 합류하거나 새 조회를 시작합니다.
    ///
    /// 확인과 등록은 하나의 잠금 안에서 이루어집니다.
    fn join_or_start(self: &Arc<Self>, symbol: &str) -> Shared<FetchFuture> {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(fetch) = in_flight.get(symbol).and_then(|entry| entry.fetch.upgrade()) {
            debug!(symbol, "Joining in-flight fetch");
            return fetch;
        }

        // 직전에 끝난 조회가 캐시를 채웠을 수 있음
        if let Some(quote) = self.cache.get(symbol) {
            return ready(Ok(quote)).boxed().shared();
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let fetch = Arc::clone(self)
            .fetch_and_store(symbol.to_string(), id)
            .boxed()
            .shared();

        if let Some(weak) = fetch.downgrade() {
            in_flight.insert(symbol.to_string(), InFlight { id, fetch: weak });
        }
        fetch
    }

    async fn fetch_and_store(self: Arc<Self>, symbol: String, id: u64) -> Result<Quote, FetchError> {
        self.upstream_fetches.fetch_add(1, Ordering::Relaxed);
        debug!(symbol = %symbol, source = self.source.name(), "Fetching quote upstream");

        let result = self.source.fetch_quote(&symbol, &self.limiter).await;

        // 대기자에게 결과가 전달되기 전에 캐시를 먼저 채운다
        match &result {
            Ok(quote) => self.cache.set(symbol.as_str(), quote.clone()),
            Err(e) => debug!(symbol = %symbol, error = %e, "Upstream fetch failed"),
        }

        self.release(&symbol, id);
        result
    }

    fn release(&self, symbol: &str, id: u64) {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if in_flight.get(symbol).is_some_and(|entry| entry.id == id) {
            in_flight.remove(symbol);
        }
    }
}

/// 시세 조회 조정자.
///
/// 복제 비용이 낮으며 복제본은 캐시, 등록부, 속도 제한을 공유합니다.
#[derive(Clone)]
pub struct FetchCoordinator {
    inner: Arc<Inner>,
}

impl FetchCoordinator {
    /// 새 조정자 생성.
    pub fn new(
        source: Arc<dyn QuoteSource>,
        cache: Arc<PriceCache>,
        limiter: Arc<RateLimiter>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                source,
                cache,
                limiter,
                in_flight: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(0),
                upstream_fetches: AtomicU64::new(0),
            }),
        }
    }

    /// 공유 캐시.
    pub fn cache(&self) -> &Arc<PriceCache> {
        &self.inner.cache
    }

    /// 공유 속도 제한기.
    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.inner.limiter
    }

    /// 시작된 업스트림 조회 수 (합류는 세지 않음).
    pub fn upstream_fetches(&self) -> u64 {
        self.inner.upstream_fetches.load(Ordering::Relaxed)
    }

    /// 현재 진행 중인 조회 수.
    pub fn in_flight_count(&self) -> usize {
        self.inner
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|entry| entry.fetch.upgrade().is_some())
            .count()
    }

    /// 심볼 목록의 시세를 해석합니다.
    ///
    /// 심볼은 정규화(공백 제거, 대문자)되며 결과 맵의 키도 정규화된 심볼입니다.
    /// 일부만 실패하면 성공한 심볼만 반환하고, 요청한 심볼이 모두 실패하면
    /// `QuoteError::AllFailed`를 반환합니다. 빈 목록은 빈 맵을 반환합니다.
    #[instrument(skip(self, cancel), fields(count = symbols.len()))]
    pub async fn resolve(
        &self,
        cancel: &CancellationToken,
        symbols: &[String],
    ) -> Result<HashMap<String, Quote>, QuoteError> {
        if cancel.is_cancelled() {
            return Err(QuoteError::Cancelled);
        }

        let requested: Vec<String> = symbols
            .iter()
            .map(|s| normalize_symbol(s))
            .filter(|s| !s.is_empty())
            .collect();
        if requested.is_empty() {
            return Ok(HashMap::new());
        }

        let (mut quotes, stale) = self.inner.cache.get_multi(&requested);
        if stale.is_empty() {
            debug!(count = quotes.len(), "All quotes served from cache");
            return Ok(quotes);
        }

        let pending: Vec<_> = stale
            .into_iter()
            .map(|symbol| {
                let fetch = self.inner.join_or_start(&symbol);
                async move { (symbol, fetch.await) }
            })
            .collect();

        let results = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("Quote resolution cancelled");
                return Err(QuoteError::Cancelled);
            }
            results = join_all(pending) => results,
        };

        let mut failures = HashMap::new();
        for (symbol, result) in results {
            match result {
                Ok(quote) => {
                    quotes.insert(symbol, quote);
                }
                Err(e) => {
                    failures.insert(symbol, e);
                }
            }
        }

        if quotes.is_empty() {
            warn!(failed = failures.len(), "All requested quotes failed");
            return Err(QuoteError::AllFailed { failures });
        }
        if !failures.is_empty() {
            let failed: Vec<&String> = failures.keys().collect();
            warn!(
                resolved = quotes.len(),
                failed = ?failed,
                "Some quotes could not be resolved"
            );
        }

        Ok(quotes)
    }

    /// 종목 검색. 공백뿐인 질의는 업스트림 호출 없이 빈 목록을 반환합니다.
    #[instrument(skip(self, cancel))]
    pub async fn search(
        &self,
        cancel: &CancellationToken,
        query: &str,
    ) -> Result<Vec<TickerResult>, FetchError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(FetchError::Cancelled),
            results = self.inner.source.search(query, &self.inner.limiter) => results,
        }
    }
}
