//! 공통 에러 타입.

use thiserror::Error;

/// 설정 검증 에러.
#[derive(Debug, Error)]
pub enum PricefeedError {
    /// 설정 에러
    #[error("설정 에러: {0}")]
    Config(String),
}

/// 코어 작업을 위한 Result 타입.
pub type PricefeedResult<T> = Result<T, PricefeedError>;

impl From<config::ConfigError> for PricefeedError {
    fn from(err: config::ConfigError) -> Self {
        PricefeedError::Config(err.to_string())
    }
}
