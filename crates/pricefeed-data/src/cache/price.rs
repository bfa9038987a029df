//! 메모리 시세 캐시.
//!
//! 심볼별 최신 시세와 조회 시각을 보관합니다. 항목은 TTL이 지나도 삭제되지 않고
//! 조회 시 stale로 분류될 뿐이며, 다음 성공 조회가 덮어씁니다.
//! 모든 연산은 동기이며 대기하지 않습니다.

use std::collections::{HashMap, HashSet};
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use pricefeed_core::Quote;
use tokio::time::Instant;
use tracing::trace;

#[derive(Debug, Clone)]
struct CachedQuote {
    quote: Quote,
    fetched_at: Instant,
}

impl CachedQuote {
    fn is_fresh(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.fetched_at) <= ttl
    }
}

/// TTL 기반 시세 캐시.
#[derive(Debug)]
pub struct PriceCache {
    entries: RwLock<HashMap<String, CachedQuote>>,
    ttl: Duration,
}

impl PriceCache {
    /// 새 캐시 생성.
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// 신선도 유지 시간.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// 신선한 시세만 반환.
    pub fn get(&self, symbol: &str) -> Option<Quote> {
        let now = Instant::now();
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries
            .get(symbol)
            .filter(|entry| entry.is_fresh(now, self.ttl))
            .map(|entry| entry.quote.clone())
    }

    /// 여러 심볼을 신선한 것과 stale(없음 포함)으로 나눕니다.
    ///
    /// stale 목록은 입력 순서를 유지하며 중복을 제거합니다.
    pub fn get_multi(&self, symbols: &[String]) -> (HashMap<String, Quote>, Vec<String>) {
        let now = Instant::now();
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);

        let mut fresh = HashMap::new();
        let mut stale = Vec::new();
        let mut seen = HashSet::new();

        for symbol in symbols {
            if !seen.insert(symbol.as_str()) {
                continue;
            }
            match entries.get(symbol) {
                Some(entry) if entry.is_fresh(now, self.ttl) => {
                    fresh.insert(symbol.clone(), entry.quote.clone());
                }
                _ => stale.push(symbol.clone()),
            }
        }

        trace!(fresh = fresh.len(), stale = stale.len(), "Cache lookup");
        (fresh, stale)
    }

    /// 시세 저장 (조회 시각은 현재).
    pub fn set(&self, symbol: impl Into<String>, quote: Quote) {
        let entry = CachedQuote {
            quote,
            fetched_at: Instant::now(),
        };
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(symbol.into(), entry);
    }

    /// 여러 시세를 한 번에 저장. 같은 심볼은 덮어씁니다.
    pub fn set_multi(&self, quotes: impl IntoIterator<Item = (String, Quote)>) {
        let now = Instant::now();
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        for (symbol, quote) in quotes {
            entries.insert(
                symbol,
                CachedQuote {
                    quote,
                    fetched_at: now,
                },
            );
        }
    }

    /// 저장된 항목 수 (stale 포함).
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// 비어 있는지 확인.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
