//! # Pricefeed Data
//!
//! 업스트림 시세 조회 계층입니다.
//!
//! - [`provider`]: 세션 관리와 Yahoo Finance 클라이언트
//! - [`cache`]: TTL 기반 시세 캐시
//! - [`fetch`]: 전역 속도 제한과 중복 조회 합치기

pub mod cache;
pub mod error;
pub mod fetch;
pub mod provider;

pub use cache::PriceCache;
pub use error::{FetchError, QuoteError, SessionError};
pub use fetch::{FetchCoordinator, RateLimiter};
pub use provider::{QuoteBatch, QuoteSource, Session, SessionManager, YahooClient};
