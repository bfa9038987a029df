//! 업스트림 세션(cookie + crumb) 관리.
//!
//! 발급 절차:
//! 1. 동의 엔드포인트 GET (리다이렉트 따라가지 않음) → `Set-Cookie` 수집
//! 2. 수집한 쿠키로 crumb 엔드포인트 GET → 응답 본문이 crumb
//!
//! 유효한 세션은 모든 호출자가 공유하며, 만료되었거나 무효화된 경우에만
//! 한 번 새로 발급합니다.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use pricefeed_core::UpstreamConfig;
use reqwest::header::{HeaderMap, COOKIE, SET_COOKIE, USER_AGENT};
use reqwest::{redirect, Client};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::SessionError;

/// 발급된 세션.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// `Cookie` 헤더 값 (`name=value; name=value`)
    pub cookie: String,
    /// 시세 요청에 붙는 crumb
    pub crumb: String,
    /// 만료 시각
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// 세션이 유효한지 확인.
    pub fn is_valid(&self) -> bool {
        self.expires_at > Utc::now()
    }
}

/// 세션 관리자.
///
/// 확인과 발급이 하나의 임계 구역에서 이루어지므로 동시에 여러 호출자가
/// 만료된 세션을 발견해도 발급 요청은 한 번만 나갑니다.
pub struct SessionManager {
    /// 동의 요청용 (리다이렉트 비활성화)
    consent_client: Client,
    client: Client,
    consent_url: String,
    crumb_url: String,
    user_agent: String,
    ttl: chrono::Duration,
    current: Mutex<Option<Session>>,
    established: AtomicU64,
}

impl SessionManager {
    /// 새 세션 관리자 생성.
    ///
    /// # Errors
    /// HTTP 클라이언트 생성에 실패하면 `SessionError::ClientBuild`를 반환합니다.
    pub fn new(config: &UpstreamConfig) -> Result<Self, SessionError> {
        Self::with_ttl(config, config.session_ttl())
    }

    /// 세션 유효 시간을 직접 지정하여 생성.
    pub fn with_ttl(config: &UpstreamConfig, ttl: Duration) -> Result<Self, SessionError> {
        let consent_client = Client::builder()
            .timeout(config.timeout())
            .redirect(redirect::Policy::none())
            .build()
            .map_err(|e| SessionError::ClientBuild(e.to_string()))?;
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| SessionError::ClientBuild(e.to_string()))?;
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|e| SessionError::ClientBuild(format!("세션 TTL 범위 초과: {e}")))?;

        Ok(Self {
            consent_client,
            client,
            consent_url: config.consent_url.clone(),
            crumb_url: config.crumb_url.clone(),
            user_agent: config.user_agent.clone(),
            ttl,
            current: Mutex::new(None),
            established: AtomicU64::new(0),
        })
    }

    /// 유효한 세션 반환, 필요시 발급.
    ///
    /// 발급에 실패하면 아무것도 캐시하지 않고 에러를 반환합니다.
    pub async fn acquire(&self) -> Result<Session, SessionError> {
        let mut current = self.current.lock().await;

        match current.as_ref() {
            Some(session) if session.is_valid() => {
                debug!(expires_at = %session.expires_at, "Using cached session");
                return Ok(session.clone());
            }
            Some(session) => {
                info!(expires_at = %session.expires_at, "Session expired, refreshing");
            }
            None => {
                info!("No session cached, establishing");
            }
        }

        let session = self.establish().await?;
        *current = Some(session.clone());
        Ok(session)
    }

    /// 현재 세션 무효화. 다음 `acquire`는 새로 발급합니다.
    pub async fn invalidate(&self) {
        let mut current = self.current.lock().await;
        if current.take().is_some() {
            info!("Session invalidated");
        }
    }

    /// 실패한 요청에 쓰인 세션이 아직 현재 세션이면 무효화.
    ///
    /// 다른 호출자가 이미 갱신했다면 아무것도 하지 않고 `false`를 반환합니다.
    pub async fn invalidate_stale(&self, stale: &Session) -> bool {
        let mut current = self.current.lock().await;
        if current.as_ref() == Some(stale) {
            *current = None;
            info!("Stale session invalidated");
            true
        } else {
            debug!("Session already replaced by another caller");
            false
        }
    }

    /// 지금까지 발급에 성공한 횟수.
    pub fn established_count(&self) -> u64 {
        self.established.load(Ordering::Relaxed)
    }

    async fn establish(&self) -> Result<Session, SessionError> {
        let response = self
            .consent_client
            .get(&self.consent_url)
            .header(USER_AGENT, &self.user_agent)
            .send()
            .await
            .map_err(|e| SessionError::ConsentRequest(e.to_string()))?;

        // 동의 엔드포인트는 404와 함께 쿠키를 주기도 하므로 상태 코드는 보지 않는다
        let cookie = collect_cookies(response.headers()).ok_or_else(|| {
            warn!(status = response.status().as_u16(), "Consent response had no cookies");
            SessionError::MissingCookie
        })?;

        let response = self
            .client
            .get(&self.crumb_url)
            .header(USER_AGENT, &self.user_agent)
            .header(COOKIE, &cookie)
            .send()
            .await
            .map_err(|e| SessionError::CrumbRequest(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SessionError::CrumbRequest(e.to_string()))?;

        if !status.is_success() {
            return Err(SessionError::CrumbRequest(format!(
                "HTTP {}",
                status.as_u16()
            )));
        }

        let crumb = parse_crumb(&body)?;
        let session = Session {
            cookie,
            crumb,
            expires_at: Utc::now() + self.ttl,
        };

        self.established.fetch_add(1, Ordering::Relaxed);
        info!(expires_at = %session.expires_at, "Upstream session established");
        Ok(session)
    }
}

/// `Set-Cookie` 헤더들에서 `name=value` 부분만 모아 `; `로 잇습니다.
fn collect_cookies(headers: &HeaderMap) -> Option<String> {
    let pairs: Vec<&str> = headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|value| value.split(';').next())
        .map(str::trim)
        .filter(|pair| pair.contains('=') && !pair.starts_with('='))
        .collect();

    if pairs.is_empty() {
        None
    } else {
        Some(pairs.join("; "))
    }
}

fn parse_crumb(body: &str) -> Result<String, SessionError> {
    let crumb = body.trim();
    if crumb.is_empty() || crumb == "null" {
        return Err(SessionError::InvalidCrumb(crumb.to_string()));
    }
    Ok(crumb.to_string())
}
