//! 종목 검색 결과 타입.

use serde::{Deserialize, Serialize};
use std::fmt;

/// 상품 유형.
///
/// 검색 결과는 주식과 펀드 계열만 남깁니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstrumentType {
    /// 보통주
    Equity,
    /// 상장지수펀드
    Etf,
    /// 뮤추얼 펀드
    MutualFund,
}

impl InstrumentType {
    /// 업스트림 `quoteType` 문자열을 변환합니다.
    ///
    /// 지원하지 않는 유형(옵션, 지수, 암호화폐 등)은 `None`을 반환합니다.
    pub fn from_quote_type(quote_type: &str) -> Option<Self> {
        match quote_type {
            "EQUITY" => Some(Self::Equity),
            "ETF" => Some(Self::Etf),
            "MUTUALFUND" => Some(Self::MutualFund),
            _ => None,
        }
    }

    /// 업스트림 표기 문자열.
    pub fn as_quote_type(&self) -> &'static str {
        match self {
            Self::Equity => "EQUITY",
            Self::Etf => "ETF",
            Self::MutualFund => "MUTUALFUND",
        }
    }
}

impl fmt::Display for InstrumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_quote_type())
    }
}

/// 종목 검색 결과 (영속화하지 않음).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickerResult {
    /// 종목 심볼
    pub symbol: String,
    /// 표시 이름 (short name, 없으면 long name)
    pub name: String,
    /// 거래소 코드
    pub exchange: String,
    /// 상품 유형
    pub instrument_type: InstrumentType,
}

impl fmt::Display for TickerResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {} ({})", self.symbol, self.name, self.exchange)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instrument_type_from_quote_type() {
        assert_eq!(
            InstrumentType::from_quote_type("EQUITY"),
            Some(InstrumentType::Equity)
        );
        assert_eq!(InstrumentType::from_quote_type("ETF"), Some(InstrumentType::Etf));
        assert_eq!(
            InstrumentType::from_quote_type("MUTUALFUND"),
            Some(InstrumentType::MutualFund)
        );
        assert_eq!(InstrumentType::from_quote_type("OPTION"), None);
        assert_eq!(InstrumentType::from_quote_type("CRYPTOCURRENCY"), None);
        assert_eq!(InstrumentType::from_quote_type("equity"), None);
    }

    #[test]
    fn test_ticker_result_display() {
        let ticker = TickerResult {
            symbol: "AAPL".to_string(),
            name: "Apple Inc.".to_string(),
            exchange: "NMS".to_string(),
            instrument_type: InstrumentType::Equity,
        };
        assert_eq!(ticker.to_string(), "AAPL - Apple Inc. (NMS)");
    }
}
