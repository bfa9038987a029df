//! 에러 타입 정의.

use pricefeed_core::{ConsumerId, PricefeedError};
use pricefeed_data::{FetchError, QuoteError};
use thiserror::Error;

/// 보유 종목 저장소 에러.
#[derive(Debug, Error)]
pub enum StoreError {
    /// 명부 파일 읽기 실패
    #[error("명부 파일 읽기 실패 ({path}): {message}")]
    Io { path: String, message: String },

    /// 명부 형식 오류
    #[error("명부 파싱 실패: {0}")]
    Parse(String),
}

impl From<toml::de::Error> for StoreError {
    fn from(err: toml::de::Error) -> Self {
        StoreError::Parse(err.to_string())
    }
}

/// 알림 전달 에러.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("알림 전송 실패: {0}")]
    SendFailed(String),

    #[error("요청 한도 초과: {0}초 후 재시도")]
    RateLimited(u64),

    #[error("네트워크 에러: {0}")]
    Network(#[from] reqwest::Error),

    #[error("잘못된 설정: {0}")]
    InvalidConfig(String),
}

/// 잔고 계산 에러.
///
/// 보유 종목이 없는 경우는 에러가 아니라 `Ok(None)`입니다.
#[derive(Debug, Error)]
pub enum BalanceError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("시세 조회 실패: {0}")]
    Quotes(#[from] QuoteError),

    /// 보유 종목은 있지만 시세를 하나도 얻지 못함
    #[error("consumer {consumer_id}: no quotes for {symbols:?}")]
    NoQuotes {
        consumer_id: ConsumerId,
        symbols: Vec<String>,
    },
}

/// Collector 최상위 에러.
#[derive(Debug, Error)]
pub enum CollectorError {
    #[error("설정 에러: {0}")]
    Config(#[from] PricefeedError),

    #[error("저장소 에러: {0}")]
    Store(#[from] StoreError),

    #[error("업스트림 에러: {0}")]
    Upstream(#[from] FetchError),

    #[error("잔고 계산 에러: {0}")]
    Balance(#[from] BalanceError),

    #[error("알림 에러: {0}")]
    Notify(#[from] NotifyError),
}

/// Result 타입 별칭
pub type Result<T> = std::result::Result<T, CollectorError>;
