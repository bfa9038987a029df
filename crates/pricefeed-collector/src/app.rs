//! 설정에서 서비스 구성.

use std::sync::Arc;

use pricefeed_core::AppConfig;
use pricefeed_data::{FetchCoordinator, PriceCache, RateLimiter, YahooClient};
use tracing::info;

use crate::error::Result;
use crate::notifier::{LogNotifier, Notifier, WebhookNotifier};
use crate::scheduler::Scheduler;
use crate::store::MemoryHoldingsStore;

/// 프로세스 하나가 공유하는 서비스 묶음.
pub struct Services {
    pub coordinator: FetchCoordinator,
    pub store: Arc<MemoryHoldingsStore>,
    pub scheduler: Scheduler,
}

impl Services {
    /// 설정에서 모든 구성 요소를 생성합니다.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        config.validate()?;

        let client = YahooClient::new(&config.upstream)?;
        let cache = Arc::new(PriceCache::new(config.cache.ttl()));
        let limiter = Arc::new(RateLimiter::new(config.upstream.requests_per_second));
        let coordinator = FetchCoordinator::new(Arc::new(client), cache, limiter);

        let store = Arc::new(MemoryHoldingsStore::load_or_empty(&config.holdings.path)?);

        let notifier: Arc<dyn Notifier> = match &config.notifier.webhook_url {
            Some(url) => Arc::new(WebhookNotifier::new(url.as_str(), config.upstream.timeout())?),
            None => Arc::new(LogNotifier),
        };

        info!(
            ttl_secs = config.cache.ttl_secs,
            requests_per_second = config.upstream.requests_per_second,
            notifier = notifier.name(),
            "Services initialized"
        );

        let scheduler = Scheduler::new(
            store.clone(),
            coordinator.clone(),
            notifier,
            config.scheduler.interval(),
        );

        Ok(Self {
            coordinator,
            store,
            scheduler,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_from_default_config() {
        let mut config = AppConfig::default();
        config.holdings.path = "/nonexistent/holdings.toml".to_string();

        let services = Services::from_config(&config).unwrap();
        assert!(services.coordinator.cache().is_empty());
        assert_eq!(services.scheduler.phase(), crate::scheduler::Phase::Idle);
    }

    #[test]
    fn test_invalid_webhook_url_is_rejected() {
        let mut config = AppConfig::default();
        config.holdings.path = "/nonexistent/holdings.toml".to_string();
        config.notifier.webhook_url = Some("not-a-url".to_string());

        assert!(matches!(
            Services::from_config(&config),
            Err(crate::error::CollectorError::Notify(_))
        ));
    }
}
