//! 보유 종목 타입.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 시세를 소비하는 사용자(채팅) 식별자.
pub type ConsumerId = i64;

/// 사용자 한 명의 보유 포지션.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Holding {
    /// 종목 심볼 (대문자로 정규화)
    pub symbol: String,
    /// 표시 이름
    pub name: String,
    /// 보유 수량 (소수점 허용)
    pub shares: Decimal,
}

impl Holding {
    /// 새 보유 포지션을 생성합니다. 심볼은 정규화됩니다.
    pub fn new(symbol: &str, name: impl Into<String>, shares: Decimal) -> Self {
        Self {
            symbol: normalize_symbol(symbol),
            name: name.into(),
            shares,
        }
    }
}

/// 심볼 정규화 (앞뒤 공백 제거, 대문자 변환).
pub fn normalize_symbol(symbol: &str) -> String {
    symbol.trim().to_uppercase()
}
