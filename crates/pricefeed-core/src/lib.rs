//! # Pricefeed Core
//!
//! 시세 피드 전반에서 사용되는 기본 타입을 제공합니다:
//! - 시세(`Quote`) 및 종목 검색 결과(`TickerResult`)
//! - 보유 종목(`Holding`) 및 소비자 식별자
//! - 설정 관리 (`AppConfig`)
//! - 로깅 인프라

pub mod config;
pub mod error;
pub mod logging;
pub mod types;

pub use config::*;
pub use error::*;
pub use logging::*;
pub use types::*;
