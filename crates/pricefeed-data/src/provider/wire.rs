//! 업스트림 JSON 응답 타입 및 변환.
//!
//! 업스트림은 필드를 자주 생략하거나 `null`로 보내므로 모든 필드를 `Option`으로 받습니다.

use pricefeed_core::{InstrumentType, Quote, TickerResult};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::error::FetchError;

/// 종목 검색 응답.
#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub quotes: Vec<SearchQuote>,
}

/// 검색 결과 항목.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchQuote {
    pub symbol: Option<String>,
    #[serde(rename = "shortname")]
    pub short_name: Option<String>,
    #[serde(rename = "longname")]
    pub long_name: Option<String>,
    pub exchange: Option<String>,
    pub quote_type: Option<String>,
}

impl SearchQuote {
    /// 지원하는 상품 유형이고 심볼이 있으면 `TickerResult`로 변환.
    pub fn into_ticker(self) -> Option<TickerResult> {
        let instrument_type = InstrumentType::from_quote_type(self.quote_type.as_deref()?)?;
        let symbol = self.symbol.filter(|s| !s.trim().is_empty())?;
        let name = self
            .short_name
            .filter(|n| !n.is_empty())
            .or(self.long_name.filter(|n| !n.is_empty()))
            .unwrap_or_else(|| symbol.clone());

        Some(TickerResult {
            symbol,
            name,
            exchange: self.exchange.unwrap_or_default(),
            instrument_type,
        })
    }
}

/// 검색 응답을 지원 유형만 남긴 결과 목록으로 변환. 업스트림 순서를 유지합니다.
pub fn parse_search(body: &str) -> Result<Vec<TickerResult>, FetchError> {
    let response: SearchResponse = serde_json::from_str(body)?;
    Ok(response
        .quotes
        .into_iter()
        .filter_map(SearchQuote::into_ticker)
        .collect())
}

/// 차트 응답.
#[derive(Debug, Deserialize)]
pub struct ChartResponse {
    pub chart: ChartBody,
}

#[derive(Debug, Deserialize)]
pub struct ChartBody {
    #[serde(default)]
    pub result: Option<Vec<ChartResult>>,
    #[serde(default)]
    pub error: Option<ChartErrorBody>,
}

#[derive(Debug, Deserialize)]
pub struct ChartResult {
    pub meta: ChartMeta,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartMeta {
    pub symbol: Option<String>,
    pub currency: Option<String>,
    pub regular_market_price: Option<f64>,
    pub chart_previous_close: Option<f64>,
}

impl ChartMeta {
    /// 사용할 가격: 현재가, 없거나 0이면 전일 종가.
    pub fn usable_price(&self) -> Option<f64> {
        let positive = |p: &f64| p.is_finite() && *p > 0.0;
        self.regular_market_price
            .filter(positive)
            .or_else(|| self.chart_previous_close.filter(positive))
    }
}

/// 업스트림 에러 객체.
#[derive(Debug, Deserialize)]
pub struct ChartErrorBody {
    pub code: Option<String>,
    pub description: Option<String>,
}

impl ChartErrorBody {
    fn message(&self) -> String {
        match (&self.code, &self.description) {
            (Some(code), Some(desc)) => format!("{code}: {desc}"),
            (Some(code), None) => code.clone(),
            (None, Some(desc)) => desc.clone(),
            (None, None) => "unknown error".to_string(),
        }
    }
}

/// 차트 응답에서 시세를 추출합니다.
///
/// 결과의 심볼이 없으면 요청 심볼을 사용합니다.
pub fn parse_chart(body: &str, requested: &str) -> Result<Quote, FetchError> {
    let response: ChartResponse = serde_json::from_str(body)?;

    if let Some(err) = response.chart.error {
        return Err(FetchError::Upstream(err.message()));
    }

    let meta = response
        .chart
        .result
        .and_then(|results| results.into_iter().next())
        .map(|r| r.meta)
        .ok_or_else(|| FetchError::EmptyResult(requested.to_string()))?;

    let price = meta
        .usable_price()
        .and_then(Decimal::from_f64)
        .ok_or_else(|| FetchError::NoPriceData(requested.to_string()))?;

    Ok(Quote::new(
        meta.symbol.unwrap_or_else(|| requested.to_string()),
        price,
        meta.currency.unwrap_or_default(),
    ))
}

/// 200 이외 응답 본문에 업스트림 에러 객체가 있으면 그 메시지를 반환.
pub fn chart_error_message(body: &str) -> Option<String> {
    serde_json::from_str::<ChartResponse>(body)
        .ok()
        .and_then(|r| r.chart.error)
        .map(|e| e.message())
}
