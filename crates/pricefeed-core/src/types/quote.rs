//! 시세 타입.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 단일 종목의 최신 시세.
///
/// 가격은 항상 0보다 큽니다. 0 가격은 업스트림 단계에서 실패로 처리되며
/// 이 타입으로 만들어지지 않습니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    /// 종목 심볼 (예: AAPL, 005930.KS)
    pub symbol: String,
    /// 가격 (통화 단위)
    pub price: Decimal,
    /// 통화 코드 (예: USD, KRW)
    pub currency: String,
}

impl Quote {
    /// 새 시세를 생성합니다.
    pub fn new(symbol: impl Into<String>, price: Decimal, currency: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            price,
            currency: currency.into(),
        }
    }
}

impl fmt::Display for Quote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.symbol, self.price, self.currency)
    }
}
