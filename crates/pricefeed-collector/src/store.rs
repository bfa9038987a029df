//! 보유 종목 저장소.
//!
//! 스케줄러와 잔고 계산은 [`HoldingsStore`] trait만 의존합니다.
//! 기본 구현 [`MemoryHoldingsStore`]는 TOML 명부에서 로드합니다.
//!
//! ```toml
//! [[consumers]]
//! id = 1001
//!
//! [[consumers.holdings]]
//! symbol = "AAPL"
//! name = "Apple Inc."
//! shares = "10"
//! ```

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pricefeed_core::{normalize_symbol, ConsumerId, Holding};
use rust_decimal::Decimal;
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::error::StoreError;

/// 저장소 작업용 Result 타입.
pub type StoreResult<T> = Result<T, StoreError>;

/// 보고된 잔고 기록.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    /// 총 평가액
    pub total: Decimal,
    /// 기록 시각
    pub recorded_at: DateTime<Utc>,
}

/// 보유 종목 저장소 trait.
#[async_trait]
pub trait HoldingsStore: Send + Sync {
    /// 모든 소비자가 보유한 심볼 (중복 제거, 정렬).
    async fn distinct_symbols(&self) -> StoreResult<Vec<String>>;

    /// 보유 종목이 하나 이상인 소비자.
    async fn active_consumers(&self) -> StoreResult<Vec<ConsumerId>>;

    /// 소비자의 보유 종목.
    async fn holdings(&self, consumer_id: ConsumerId) -> StoreResult<Vec<Holding>>;

    /// 보고한 잔고 기록.
    async fn save_snapshot(&self, consumer_id: ConsumerId, total: Decimal) -> StoreResult<()>;

    /// 가장 최근 잔고 기록.
    async fn last_snapshot(&self, consumer_id: ConsumerId) -> StoreResult<Option<Snapshot>>;
}

#[derive(Debug, Deserialize)]
struct Roster {
    #[serde(default)]
    consumers: Vec<RosterConsumer>,
}

#[derive(Debug, Deserialize)]
struct RosterConsumer {
    id: ConsumerId,
    #[serde(default)]
    holdings: Vec<RosterHolding>,
}

#[derive(Debug, Deserialize)]
struct RosterHolding {
    symbol: String,
    #[serde(default)]
    name: Option<String>,
    shares: Decimal,
}

/// 메모리 기반 보유 종목 저장소.
#[derive(Debug, Default)]
pub struct MemoryHoldingsStore {
    holdings: RwLock<BTreeMap<ConsumerId, Vec<Holding>>>,
    snapshots: RwLock<HashMap<ConsumerId, Vec<Snapshot>>>,
}

impl MemoryHoldingsStore {
    /// 빈 저장소 생성.
    pub fn new() -> Self {
        Self::default()
    }

    /// TOML 명부 문자열에서 생성.
    ///
    /// 같은 소비자의 같은 심볼은 나중 항목이 덮어씁니다.
    pub fn from_toml_str(content: &str) -> StoreResult<Self> {
        let roster: Roster = toml::from_str(content)?;
        let mut holdings: BTreeMap<ConsumerId, Vec<Holding>> = BTreeMap::new();

        for consumer in roster.consumers {
            let entry = holdings.entry(consumer.id).or_default();
            for h in consumer.holdings {
                if h.shares.is_sign_negative() {
                    return Err(StoreError::Parse(format!(
                        "consumer {}: negative shares for {}",
                        consumer.id, h.symbol
                    )));
                }
                let symbol = normalize_symbol(&h.symbol);
                if symbol.is_empty() {
                    return Err(StoreError::Parse(format!(
                        "consumer {}: empty symbol",
                        consumer.id
                    )));
                }
                let name = h.name.unwrap_or_else(|| symbol.clone());
                upsert(entry, Holding::new(&symbol, name, h.shares));
            }
        }

        Ok(Self {
            holdings: RwLock::new(holdings),
            snapshots: RwLock::new(HashMap::new()),
        })
    }

    /// 명부 파일에서 로드.
    pub fn load(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| StoreError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let store = Self::from_toml_str(&content)?;
        info!(path = %path.display(), "Holdings roster loaded");
        Ok(store)
    }

    /// 명부 파일이 없으면 빈 저장소로 시작.
    pub fn load_or_empty(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            warn!(path = %path.display(), "Holdings roster not found, starting empty");
            Ok(Self::new())
        }
    }

    /// 보유 종목 추가 또는 수량 갱신.
    pub async fn upsert_holding(&self, consumer_id: ConsumerId, holding: Holding) {
        let mut holdings = self.holdings.write().await;
        upsert(holdings.entry(consumer_id).or_default(), holding);
    }

    /// 보유 종목 삭제. 삭제했으면 `true`.
    pub async fn remove_holding(&self, consumer_id: ConsumerId, symbol: &str) -> bool {
        let symbol = normalize_symbol(symbol);
        let mut holdings = self.holdings.write().await;
        match holdings.get_mut(&consumer_id) {
            Some(list) => {
                let before = list.len();
                list.retain(|h| h.symbol != symbol);
                before != list.len()
            }
            None => false,
        }
    }
}

fn upsert(list: &mut Vec<Holding>, holding: Holding) {
    match list.iter_mut().find(|h| h.symbol == holding.symbol) {
        Some(existing) => *existing = holding,
        None => list.push(holding),
    }
}

#[async_trait]
impl HoldingsStore for MemoryHoldingsStore {
    async fn distinct_symbols(&self) -> StoreResult<Vec<String>> {
        let holdings = self.holdings.read().await;
        let symbols: BTreeSet<&str> = holdings
            .values()
            .flatten()
            .map(|h| h.symbol.as_str())
            .collect();
        Ok(symbols.into_iter().map(str::to_string).collect())
    }

    async fn active_consumers(&self) -> StoreResult<Vec<ConsumerId>> {
        let holdings = self.holdings.read().await;
        Ok(holdings
            .iter()
            .filter(|(_, list)| !list.is_empty())
            .map(|(id, _)| *id)
            .collect())
    }

    async fn holdings(&self, consumer_id: ConsumerId) -> StoreResult<Vec<Holding>> {
        let holdings = self.holdings.read().await;
        Ok(holdings.get(&consumer_id).cloned().unwrap_or_default())
    }

    async fn save_snapshot(&self, consumer_id: ConsumerId, total: Decimal) -> StoreResult<()> {
        let mut snapshots = self.snapshots.write().await;
        snapshots.entry(consumer_id).or_default().push(Snapshot {
            total,
            recorded_at: Utc::now(),
        });
        Ok(())
    }

    async fn last_snapshot(&self, consumer_id: ConsumerId) -> StoreResult<Option<Snapshot>> {
        let snapshots = self.snapshots.read().await;
        Ok(snapshots
            .get(&consumer_id)
            .and_then(|list| list.last())
            .cloned())
    }
}
