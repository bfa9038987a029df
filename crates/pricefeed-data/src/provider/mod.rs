//! 업스트림 시세 제공자.
//!
//! - [`session`]: cookie + crumb 세션 관리
//! - [`wire`]: JSON 응답 타입
//! - [`yahoo`]: Yahoo Finance 클라이언트

pub mod session;
pub mod wire;
pub mod yahoo;

use async_trait::async_trait;
use pricefeed_core::{Quote, TickerResult};

use crate::error::FetchError;
use crate::fetch::RateLimiter;

pub use session::{Session, SessionManager};
pub use yahoo::{QuoteBatch, YahooClient};

/// 시세 제공자 trait.
///
/// 업스트림으로 나가는 모든 요청은 먼저 `gate.acquire()`를 거쳐야 합니다.
/// 재시도 요청도 예외가 아닙니다.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    /// 제공자 이름 (로그용)
    fn name(&self) -> &str;

    /// 단일 심볼 시세 조회.
    async fn fetch_quote(&self, symbol: &str, gate: &RateLimiter) -> Result<Quote, FetchError>;

    /// 종목 검색.
    async fn search(&self, query: &str, gate: &RateLimiter)
        -> Result<Vec<TickerResult>, FetchError>;
}
