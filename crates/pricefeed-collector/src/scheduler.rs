//! 주기적 잔고 보고 스케줄러.
//!
//! 한 주기(tick)는 두 단계로 진행됩니다:
//! 1. Prewarm: 추적 중인 모든 심볼을 한 번에 조회하여 캐시를 채움
//! 2. Fanout: 보유 종목이 있는 소비자마다 잔고를 계산(캐시 조회)하고 보고를 전달
//!
//! 첫 tick은 시작 후 한 주기가 지나야 실행됩니다.

use std::sync::Arc;
use std::time::Duration;

use pricefeed_core::ConsumerId;
use pricefeed_data::{FetchCoordinator, QuoteError};
use tokio::sync::watch;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::CollectorError;
use crate::notifier::Notifier;
use crate::portfolio::BalanceService;
use crate::stats::TickStats;
use crate::store::HoldingsStore;

/// 스케줄러 단계.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Tick,
    Prewarm,
    Fanout,
}

/// 소비자 한 명에 대한 처리 결과.
enum Delivery {
    Notified,
    Skipped,
}

/// 잔고 보고 스케줄러.
pub struct Scheduler {
    store: Arc<dyn HoldingsStore>,
    coordinator: FetchCoordinator,
    balance: BalanceService,
    notifier: Arc<dyn Notifier>,
    interval: Duration,
    phase: watch::Sender<Phase>,
}

impl Scheduler {
    /// 새 스케줄러 생성.
    pub fn new(
        store: Arc<dyn HoldingsStore>,
        coordinator: FetchCoordinator,
        notifier: Arc<dyn Notifier>,
        interval: Duration,
    ) -> Self {
        let balance = BalanceService::new(store.clone(), coordinator.clone());
        let (phase, _) = watch::channel(Phase::Idle);

        Self {
            store,
            coordinator,
            balance,
            notifier,
            interval,
            phase,
        }
    }

    /// 현재 단계.
    pub fn phase(&self) -> Phase {
        *self.phase.borrow()
    }

    /// 잔고 계산 서비스.
    pub fn balance(&self) -> &BalanceService {
        &self.balance
    }

    /// 취소될 때까지 주기적으로 tick을 실행합니다.
    pub async fn run(&self, cancel: CancellationToken) {
        info!(
            interval_secs = self.interval.as_secs(),
            notifier = self.notifier.name(),
            "Scheduler started"
        );

        let mut interval = interval_at(Instant::now() + self.interval, self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("Scheduler cancelled, stopping");
                    break;
                }
                _ = interval.tick() => {
                    self.tick(&cancel).await;
                }
            }
        }

        self.phase.send_replace(Phase::Idle);
    }

    /// 한 주기를 실행합니다. 실패는 기록만 하고 다음 주기에 영향을 주지 않습니다.
    pub async fn tick(&self, cancel: &CancellationToken) -> TickStats {
        let started = Instant::now();
        let mut stats = TickStats::new();
        self.phase.send_replace(Phase::Tick);

        self.run_phases(cancel, &mut stats).await;

        self.phase.send_replace(Phase::Idle);
        stats.elapsed = started.elapsed();
        stats.log_summary();
        stats
    }

    async fn run_phases(&self, cancel: &CancellationToken, stats: &mut TickStats) {
        let symbols = match self.store.distinct_symbols().await {
            Ok(symbols) => symbols,
            Err(e) => {
                error!(error = %e, "Failed to load tracked symbols");
                return;
            }
        };
        stats.symbols = symbols.len();
        if symbols.is_empty() {
            debug!("No tracked symbols, nothing to do");
            return;
        }

        // 1. Prewarm
        self.phase.send_replace(Phase::Prewarm);
        match self.coordinator.resolve(cancel, &symbols).await {
            Ok(quotes) => {
                stats.prewarmed = quotes.len();
                stats.prewarm_failed = symbols.len() - quotes.len();
            }
            Err(QuoteError::Cancelled) => {
                stats.cancelled = true;
                return;
            }
            Err(e) => {
                // 개별 잔고 계산에서 다시 시도된다
                warn!(error = %e, "Prewarm failed, continuing with fanout");
                stats.prewarm_failed = symbols.len();
            }
        }

        // 2. Fanout
        self.phase.send_replace(Phase::Fanout);
        let consumers = match self.store.active_consumers().await {
            Ok(consumers) => consumers,
            Err(e) => {
                error!(error = %e, "Failed to load active consumers");
                return;
            }
        };
        stats.consumers = consumers.len();

        for consumer_id in consumers {
            if cancel.is_cancelled() {
                stats.cancelled = true;
                break;
            }
            match self.deliver(cancel, consumer_id).await {
                Ok(Delivery::Notified) => stats.notified += 1,
                Ok(Delivery::Skipped) => stats.skipped += 1,
                Err(e) => {
                    error!(consumer_id, error = %e, "Balance report failed");
                    stats.failed += 1;
                }
            }
        }
    }

    async fn deliver(
        &self,
        cancel: &CancellationToken,
        consumer_id: ConsumerId,
    ) -> Result<Delivery, CollectorError> {
        let Some(report) = self.balance.compute_balance(cancel, consumer_id).await? else {
            debug!(consumer_id, "No holdings, skipping");
            return Ok(Delivery::Skipped);
        };

        self.notifier
            .notify(consumer_id, &report.to_string())
            .await?;
        if let Err(e) = self.store.save_snapshot(consumer_id, report.total).await {
            warn!(consumer_id, error = %e, "Report delivered but snapshot not saved");
        }

        debug!(consumer_id, total = %report.total, "Balance report delivered");
        Ok(Delivery::Notified)
    }
}
