//! Yahoo Finance 클라이언트.
//!
//! 처리 기능:
//! - 종목 검색 (인증 불필요)
//! - 차트 엔드포인트 기반 현재가 조회 (세션 필요)
//! - 인증 실패 시 세션을 한 번 갱신하고 재시도

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use pricefeed_core::{Quote, TickerResult, UpstreamConfig};
use reqwest::header::{COOKIE, USER_AGENT};
use reqwest::{Client, Url};
use tracing::{debug, instrument, warn};

use super::session::{Session, SessionManager};
use super::wire::{chart_error_message, parse_chart, parse_search};
use super::QuoteSource;
use crate::error::{FetchError, QuoteError};
use crate::fetch::RateLimiter;

/// 검색 결과 최대 개수.
const SEARCH_QUOTES_COUNT: &str = "8";

/// 여러 심볼 조회 결과 (일부 실패 허용).
#[derive(Debug, Clone, Default)]
pub struct QuoteBatch {
    /// 성공한 심볼의 시세
    pub quotes: HashMap<String, Quote>,
    /// 실패한 심볼과 원인
    pub failures: HashMap<String, FetchError>,
}

/// Yahoo Finance 클라이언트.
pub struct YahooClient {
    client: Client,
    sessions: Arc<SessionManager>,
    search_url: String,
    chart_url: String,
    user_agent: String,
}

impl YahooClient {
    /// 새 클라이언트 생성.
    ///
    /// # Errors
    /// HTTP 클라이언트 생성에 실패하면 에러를 반환합니다.
    pub fn new(config: &UpstreamConfig) -> Result<Self, FetchError> {
        let sessions = Arc::new(SessionManager::new(config)?);
        Self::with_sessions(config, sessions)
    }

    /// 세션 관리자를 공유하여 생성.
    pub fn with_sessions(
        config: &UpstreamConfig,
        sessions: Arc<SessionManager>,
    ) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| FetchError::Network(format!("HTTP client 생성 실패: {e}")))?;

        Ok(Self {
            client,
            sessions,
            search_url: config.search_url.clone(),
            chart_url: config.chart_url.clone(),
            user_agent: config.user_agent.clone(),
        })
    }

    /// 세션 관리자 참조.
    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    /// 여러 심볼을 동시에 조회합니다.
    ///
    /// 하나라도 성공하면 부분 결과를 반환하고, 모두 실패하면
    /// `QuoteError::AllFailed`를 반환합니다.
    #[instrument(skip(self, gate), fields(count = symbols.len()))]
    pub async fn fetch_quotes(
        &self,
        symbols: &[String],
        gate: &RateLimiter,
    ) -> Result<QuoteBatch, QuoteError> {
        let results = join_all(symbols.iter().map(|symbol| async move {
            (symbol.clone(), self.fetch_quote(symbol, gate).await)
        }))
        .await;

        let mut batch = QuoteBatch::default();
        for (symbol, result) in results {
            match result {
                Ok(quote) => {
                    batch.quotes.insert(symbol, quote);
                }
                Err(e) => {
                    warn!(symbol = %symbol, error = %e, "Quote fetch failed");
                    batch.failures.insert(symbol, e);
                }
            }
        }

        if batch.quotes.is_empty() && !batch.failures.is_empty() {
            return Err(QuoteError::AllFailed {
                failures: batch.failures,
            });
        }
        Ok(batch)
    }

    async fn request_chart(
        &self,
        symbol: &str,
        session: &Session,
        gate: &RateLimiter,
    ) -> Result<Quote, FetchError> {
        let mut url = Url::parse(&self.chart_url)
            .map_err(|e| FetchError::Parse(format!("invalid chart url: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| FetchError::Parse(format!("invalid chart url: {}", self.chart_url)))?
            .pop_if_empty()
            .push(symbol);

        gate.acquire().await;
        debug!(symbol, "Requesting chart");

        let response = self
            .client
            .get(url)
            .query(&[
                ("range", "1d"),
                ("interval", "1d"),
                ("crumb", session.crumb.as_str()),
            ])
            .header(USER_AGENT, &self.user_agent)
            .header(COOKIE, &session.cookie)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        match status.as_u16() {
            401 | 403 => Err(FetchError::Unauthorized {
                status: status.as_u16(),
            }),
            code if !status.is_success() => Err(chart_error_message(&body)
                .map(FetchError::Upstream)
                .unwrap_or_else(|| FetchError::HttpStatus {
                    status: code,
                    symbol: symbol.to_string(),
                })),
            _ => parse_chart(&body, symbol),
        }
    }
}

#[async_trait]
impl QuoteSource for YahooClient {
    fn name(&self) -> &str {
        "yahoo"
    }

    #[instrument(skip(self, gate))]
    async fn fetch_quote(&self, symbol: &str, gate: &RateLimiter) -> Result<Quote, FetchError> {
        let session = self.sessions.acquire().await?;

        match self.request_chart(symbol, &session, gate).await {
            Err(e) if e.is_auth_error() => {
                warn!(error = %e, "Session rejected, refreshing and retrying once");
                self.sessions.invalidate_stale(&session).await;
                let fresh = self.sessions.acquire().await?;
                let retried = self.request_chart(symbol, &fresh, gate).await;
                if matches!(&retried, Err(e) if e.is_auth_error()) {
                    // 거절된 세션을 남겨두지 않는다
                    self.sessions.invalidate_stale(&fresh).await;
                }
                retried
            }
            other => other,
        }
    }

    #[instrument(skip(self, gate))]
    async fn search(
        &self,
        query: &str,
        gate: &RateLimiter,
    ) -> Result<Vec<TickerResult>, FetchError> {
        gate.acquire().await;

        let response = self
            .client
            .get(&self.search_url)
            .query(&[
                ("q", query),
                ("quotesCount", SEARCH_QUOTES_COUNT),
                ("newsCount", "0"),
            ])
            .header(USER_AGENT, &self.user_agent)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                status: status.as_u16(),
                symbol: query.to_string(),
            });
        }

        let body = response.text().await?;
        let results = parse_search(&body)?;
        debug!(count = results.len(), "Search completed");
        Ok(results)
    }
}
