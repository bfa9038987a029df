//! 잔고 보고 전달.
//!
//! - [`LogNotifier`]: tracing 로그로만 출력
//! - [`WebhookNotifier`]: 범용 JSON 웹훅 (`{"consumer_id": .., "text": ..}`)

use std::time::Duration;

use async_trait::async_trait;
use pricefeed_core::ConsumerId;
use reqwest::Client;
use tracing::{debug, error, info, warn};

use crate::error::NotifyError;

/// 알림 작업용 Result 타입.
pub type NotifyResult<T> = Result<T, NotifyError>;

/// 웹훅이 `Retry-After`를 주지 않을 때의 대기 시간 (초).
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

/// 보고 전달 trait.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// 소비자에게 텍스트를 전달합니다.
    async fn notify(&self, consumer_id: ConsumerId, text: &str) -> NotifyResult<()>;

    /// 전달기 이름을 반환합니다.
    fn name(&self) -> &str;
}

/// 로그로 출력하는 전달기.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, consumer_id: ConsumerId, text: &str) -> NotifyResult<()> {
        info!(consumer_id, report = %text, "Balance report");
        Ok(())
    }

    fn name(&self) -> &str {
        "log"
    }
}

/// 범용 JSON 웹훅 전달기.
pub struct WebhookNotifier {
    client: Client,
    url: String,
}

impl WebhookNotifier {
    /// 새 웹훅 전달기 생성.
    pub fn new(url: impl Into<String>, timeout: Duration) -> NotifyResult<Self> {
        let url = url.into();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(NotifyError::InvalidConfig(format!(
                "webhook URL must be http(s): {url}"
            )));
        }

        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, consumer_id: ConsumerId, text: &str) -> NotifyResult<()> {
        let payload = serde_json::json!({
            "consumer_id": consumer_id,
            "text": text,
        });

        debug!(consumer_id, "Sending webhook notification");

        let response = self.client.post(&self.url).json(&payload).send().await?;

        if response.status().is_success() {
            debug!(consumer_id, "Webhook notification delivered");
            return Ok(());
        }

        let status = response.status();
        if status.as_u16() == 429 {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
            warn!(consumer_id, retry_after, "Webhook rate limited");
            return Err(NotifyError::RateLimited(retry_after));
        }

        let body = response.text().await.unwrap_or_default();
        error!(consumer_id, status = status.as_u16(), "Webhook delivery failed");
        Err(NotifyError::SendFailed(format!("HTTP {status}: {body}")))
    }

    fn name(&self) -> &str {
        "webhook"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    #[test]
    fn test_webhook_rejects_invalid_url() {
        assert!(matches!(
            WebhookNotifier::new("ftp://example.com", Duration::from_secs(5)),
            Err(NotifyError::InvalidConfig(_))
        ));
    }

    #[tokio::test]
    async fn test_webhook_posts_json() {
        let mut server = Server::new_async().await;
        let hook = server
            .mock("POST", "/hook")
            .match_body(Matcher::Json(serde_json::json!({
                "consumer_id": 42,
                "text": "Total: 10.00",
            })))
            .with_status(204)
            .expect(1)
            .create_async()
            .await;

        let notifier =
            WebhookNotifier::new(format!("{}/hook", server.url()), Duration::from_secs(5)).unwrap();
        notifier.notify(42, "Total: 10.00").await.unwrap();
        hook.assert_async().await;
    }

    #[tokio::test]
    async fn test_webhook_rate_limited() {
        let mut server = Server::new_async().await;
        let _hook = server
            .mock("POST", "/hook")
            .with_status(429)
            .with_header("retry-after", "30")
            .create_async()
            .await;

        let notifier =
            WebhookNotifier::new(format!("{}/hook", server.url()), Duration::from_secs(5)).unwrap();
        assert!(matches!(
            notifier.notify(1, "x").await,
            Err(NotifyError::RateLimited(30))
        ));
    }

    #[tokio::test]
    async fn test_webhook_server_error() {
        let mut server = Server::new_async().await;
        let _hook = server
            .mock("POST", "/hook")
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let notifier =
            WebhookNotifier::new(format!("{}/hook", server.url()), Duration::from_secs(5)).unwrap();
        match notifier.notify(1, "x").await {
            Err(NotifyError::SendFailed(msg)) => assert!(msg.contains("500")),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_log_notifier() {
        assert!(LogNotifier.notify(1, "hello").await.is_ok());
        assert_eq!(LogNotifier.name(), "log");
    }
}
