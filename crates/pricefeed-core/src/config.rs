//! 설정 관리.
//!
//! 기본값 → TOML 파일 → 환경 변수(`PRICEFEED__SECTION__KEY`) 순으로 덮어씁니다.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{PricefeedError, PricefeedResult};

/// Yahoo Finance 종목 검색 엔드포인트.
pub const DEFAULT_SEARCH_URL: &str = "https://query2.finance.yahoo.com/v1/finance/search";
/// Yahoo Finance 차트(시세) 엔드포인트.
pub const DEFAULT_CHART_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";
/// 쿠키 발급용 동의 엔드포인트.
pub const DEFAULT_CONSENT_URL: &str = "https://fc.yahoo.com/";
/// crumb 발급 엔드포인트.
pub const DEFAULT_CRUMB_URL: &str = "https://query2.finance.yahoo.com/v1/test/getcrumb";

/// 애플리케이션 설정.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    /// 시세 캐시 설정
    pub cache: CacheConfig,
    /// 업스트림 설정
    pub upstream: UpstreamConfig,
    /// 스케줄러 설정
    pub scheduler: SchedulerConfig,
    /// 보유 종목 명부 설정
    pub holdings: HoldingsConfig,
    /// 알림 전달 설정
    pub notifier: NotifierConfig,
    /// 로깅 설정
    pub logging: LoggingConfig,
}

/// 시세 캐시 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// 신선도 유지 시간 (초)
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { ttl_secs: 15 * 60 }
    }
}

impl CacheConfig {
    /// TTL을 Duration으로 반환
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

/// 업스트림 시세 제공자 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// 초당 최대 요청 수 (모든 심볼·호출자 합산)
    pub requests_per_second: f64,
    /// HTTP 요청 타임아웃 (초)
    pub timeout_secs: u64,
    /// 세션(cookie + crumb) 유효 시간 (초)
    pub session_ttl_secs: u64,
    /// 모든 요청에 붙는 User-Agent
    pub user_agent: String,
    /// 종목 검색 URL
    pub search_url: String,
    /// 차트 URL (뒤에 `/<symbol>` 추가)
    pub chart_url: String,
    /// 동의(쿠키) URL
    pub consent_url: String,
    /// crumb URL
    pub crumb_url: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            requests_per_second: 2.0,
            timeout_secs: 10,
            session_ttl_secs: 30 * 60,
            user_agent: "Mozilla/5.0".to_string(),
            search_url: DEFAULT_SEARCH_URL.to_string(),
            chart_url: DEFAULT_CHART_URL.to_string(),
            consent_url: DEFAULT_CONSENT_URL.to_string(),
            crumb_url: DEFAULT_CRUMB_URL.to_string(),
        }
    }
}

impl UpstreamConfig {
    /// 모든 엔드포인트를 하나의 기준 URL 아래로 지정합니다 (테스트 서버용).
    pub fn with_base_url(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            search_url: format!("{base}/v1/finance/search"),
            chart_url: format!("{base}/v8/finance/chart"),
            consent_url: format!("{base}/consent"),
            crumb_url: format!("{base}/v1/test/getcrumb"),
            ..Default::default()
        }
    }

    /// HTTP 타임아웃을 Duration으로 반환
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// 세션 유효 시간을 Duration으로 반환
    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }
}

/// 스케줄러 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// 알림 주기 (초)
    pub interval_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval_secs: 60 * 60,
        }
    }
}

impl SchedulerConfig {
    /// 알림 주기를 Duration으로 반환
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// 보유 종목 명부 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HoldingsConfig {
    /// 명부 TOML 파일 경로
    pub path: String,
}

impl Default for HoldingsConfig {
    fn default() -> Self {
        Self {
            path: "config/holdings.toml".to_string(),
        }
    }
}

/// 알림 전달 설정.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct NotifierConfig {
    /// 웹훅 URL (없으면 로그로만 전달)
    pub webhook_url: Option<String>,
}

/// 로깅 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 로그 레벨
    pub level: String,
    /// 로그 형식 (pretty, json, compact)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl AppConfig {
    /// 파일(선택)과 환경 변수에서 설정을 로드합니다.
    ///
    /// 파일이 없으면 기본값과 환경 변수만 사용합니다.
    pub fn load<P: AsRef<Path>>(path: Option<P>) -> PricefeedResult<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path.as_ref()).required(false));
        }

        let config = builder
            .add_source(
                config::Environment::with_prefix("PRICEFEED")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let app: AppConfig = config.try_deserialize()?;
        app.validate()?;
        Ok(app)
    }

    /// 기본 경로에서 설정을 로드합니다.
    pub fn load_default() -> PricefeedResult<Self> {
        Self::load(Some("config/default.toml"))
    }

    /// 설정 값 검증.
    pub fn validate(&self) -> PricefeedResult<()> {
        let rps = self.upstream.requests_per_second;
        if !rps.is_finite() || rps <= 0.0 {
            return Err(PricefeedError::Config(format!(
                "upstream.requests_per_second는 양수여야 합니다: {rps}"
            )));
        }
        if self.cache.ttl_secs == 0 {
            return Err(PricefeedError::Config(
                "cache.ttl_secs는 0보다 커야 합니다".to_string(),
            ));
        }
        if self.scheduler.interval_secs == 0 {
            return Err(PricefeedError::Config(
                "scheduler.interval_secs는 0보다 커야 합니다".to_string(),
            ));
        }
        if self.upstream.session_ttl_secs == 0 {
            return Err(PricefeedError::Config(
                "upstream.session_ttl_secs는 0보다 커야 합니다".to_string(),
            ));
        }
        Ok(())
    }
}
