//! 보유 종목 잔고 보고 데몬.
//!
//! 이 crate는 시세 조회 계층 위에서 동작하는 소비자 측 구성 요소를 제공합니다:
//! - 보유 종목 명부 (TOML)
//! - 잔고 계산 및 보고 텍스트
//! - 보고 전달 (로그, 웹훅)
//! - 주기적 prewarm → fanout 스케줄러

pub mod app;
pub mod error;
pub mod notifier;
pub mod portfolio;
pub mod scheduler;
pub mod stats;
pub mod store;

pub use app::Services;
pub use error::{BalanceError, CollectorError, NotifyError, Result, StoreError};
pub use notifier::{LogNotifier, Notifier, WebhookNotifier};
pub use portfolio::{BalanceReport, BalanceService, HoldingLine};
pub use scheduler::{Phase, Scheduler};
pub use stats::TickStats;
pub use store::{HoldingsStore, MemoryHoldingsStore, Snapshot};
