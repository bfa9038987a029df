//! 시세 조회 에러 타입.

use std::collections::HashMap;

use thiserror::Error;

/// 세션(cookie + crumb) 발급 실패.
///
/// 2단계 발급 과정 중 하나라도 실패하면 부분 세션은 캐시되지 않습니다.
#[derive(Debug, Clone, Error)]
pub enum SessionError {
    /// HTTP 클라이언트 생성 실패
    #[error("HTTP client 생성 실패: {0}")]
    ClientBuild(String),

    /// 동의 엔드포인트 요청 실패
    #[error("consent request failed: {0}")]
    ConsentRequest(String),

    /// 동의 응답에 쿠키가 없음
    #[error("no cookie returned from consent endpoint")]
    MissingCookie,

    /// crumb 요청 실패
    #[error("crumb request failed: {0}")]
    CrumbRequest(String),

    /// crumb 값이 비었거나 "null"
    #[error("invalid crumb: {0:?}")]
    InvalidCrumb(String),
}

/// 심볼 단위 조회 실패.
///
/// 같은 심볼을 기다리는 모든 호출자에게 동일한 결과를 전달하기 위해 `Clone`입니다.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    /// 네트워크/연결 에러
    #[error("Network error: {0}")]
    Network(String),

    /// 요청 타임아웃
    #[error("Request timeout: {0}")]
    Timeout(String),

    /// 인증 실패 (HTTP 401/403)
    #[error("auth error: HTTP {status}")]
    Unauthorized { status: u16 },

    /// 200 이외의 HTTP 상태
    #[error("HTTP {status} for {symbol}")]
    HttpStatus { status: u16, symbol: String },

    /// 응답 파싱 실패
    #[error("Parse error: {0}")]
    Parse(String),

    /// 업스트림이 보고한 에러 객체
    #[error("upstream error: {0}")]
    Upstream(String),

    /// 결과 목록이 비어 있음
    #[error("no chart result for {0}")]
    EmptyResult(String),

    /// 현재가와 전일 종가 모두 없음
    #[error("no price data for {0}")]
    NoPriceData(String),

    /// 세션 발급 실패
    #[error("session error: {0}")]
    Session(#[from] SessionError),

    /// 호출자가 취소함
    #[error("request cancelled")]
    Cancelled,
}

impl FetchError {
    /// 세션 갱신 후 재시도해야 하는 인증 에러인지 확인.
    pub fn is_auth_error(&self) -> bool {
        matches!(self, FetchError::Unauthorized { .. })
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout(err.to_string())
        } else if err.is_decode() {
            FetchError::Parse(err.to_string())
        } else {
            FetchError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        FetchError::Parse(err.to_string())
    }
}

/// 여러 심볼을 한 번에 조회할 때의 에러.
#[derive(Debug, Clone, Error)]
pub enum QuoteError {
    /// 요청한 모든 심볼이 실패함 (일부만 실패하면 부분 결과를 반환)
    #[error("all {} requested symbols failed", failures.len())]
    AllFailed {
        failures: HashMap<String, FetchError>,
    },

    /// 호출자가 취소함
    #[error("quote request cancelled")]
    Cancelled,
}
