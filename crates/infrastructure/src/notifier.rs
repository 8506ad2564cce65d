use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use pricewatch_core::errors::{PricewatchError, PricewatchResult};
use pricewatch_core::traits::NotificationService;

/// Webhook通知分发器（Discord兼容的JSON负载）
///
/// 未配置webhook地址时通知检查退化为只记日志。调用方负责
/// 吞掉这里的错误，通知永远不使触发它的运行失败。
pub struct WebhookNotifier {
    client: reqwest::Client,
    webhook_url: Option<String>,
}

impl WebhookNotifier {
    pub fn new(webhook_url: Option<String>) -> PricewatchResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| PricewatchError::Network(format!("HTTP客户端构建失败: {e}")))?;
        Ok(Self {
            client,
            webhook_url,
        })
    }
}

#[async_trait]
impl NotificationService for WebhookNotifier {
    async fn check_notifications(&self, product_id: i64) -> PricewatchResult<()> {
        let Some(url) = self.webhook_url.as_deref() else {
            debug!("商品 {product_id} 通知检查: 未配置webhook, 跳过");
            return Ok(());
        };

        let payload = serde_json::json!({
            "content": format!("pricewatch: 商品 {product_id} 有新的价格记录"),
        });
        let response = self
            .client
            .post(url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| PricewatchError::Notification(format!("webhook请求失败: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PricewatchError::Notification(format!(
                "webhook返回 HTTP {}",
                status.as_u16()
            )));
        }
        info!("商品 {product_id} 的通知已分发");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_webhook_is_a_noop() {
        let notifier = WebhookNotifier::new(None).unwrap();
        assert!(notifier.check_notifications(1).await.is_ok());
    }
}
