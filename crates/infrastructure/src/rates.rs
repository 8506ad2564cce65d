use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};

use pricewatch_core::errors::{PricewatchError, PricewatchResult};
use pricewatch_core::traits::{SettingsRepository, TierRefreshService};

/// 在用汇率档位列表的设置键（逗号分隔的币种代码）
pub const WATCHED_TIERS_KEY: &str = "rates.watched";
/// 默认汇率数据源
pub const DEFAULT_RATES_ENDPOINT: &str = "https://open.er-api.com/v6/latest";

/// 汇率档位刷新服务
///
/// 外币价格展示需要对基准币种的汇率；每个被追踪的外币是一个
/// 档位，慢速定时器周期性入队刷新。刷新结果写入settings，
/// 键形如 `rates.USD.AUD`。
pub struct CurrencyTierService {
    client: reqwest::Client,
    settings: Arc<dyn SettingsRepository>,
    endpoint: String,
    base_currency: String,
}

#[derive(Debug, Deserialize)]
struct RatesResponse {
    rates: HashMap<String, f64>,
}

impl CurrencyTierService {
    pub fn new(
        settings: Arc<dyn SettingsRepository>,
        base_currency: impl Into<String>,
    ) -> PricewatchResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| PricewatchError::Network(format!("HTTP客户端构建失败: {e}")))?;
        Ok(Self {
            client,
            settings,
            endpoint: DEFAULT_RATES_ENDPOINT.to_string(),
            base_currency: base_currency.into(),
        })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl TierRefreshService for CurrencyTierService {
    async fn watched_tiers(&self) -> PricewatchResult<Vec<String>> {
        let raw = self.settings.get(WATCHED_TIERS_KEY).await?.unwrap_or_default();
        Ok(raw
            .split(',')
            .map(|t| t.trim().to_uppercase())
            .filter(|t| !t.is_empty() && t != &self.base_currency)
            .collect())
    }

    async fn refresh(&self, tier_id: &str) -> PricewatchResult<()> {
        debug!("刷新汇率档位 {tier_id}");
        let response = self
            .client
            .get(format!("{}/{tier_id}", self.endpoint))
            .send()
            .await
            .map_err(|e| PricewatchError::Network(format!("汇率请求失败: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PricewatchError::Network(format!(
                "汇率源返回 HTTP {}",
                status.as_u16()
            )));
        }
        let body: RatesResponse = response
            .json()
            .await
            .map_err(|e| PricewatchError::Serialization(format!("汇率响应解析失败: {e}")))?;

        let rate = body.rates.get(&self.base_currency).ok_or_else(|| {
            PricewatchError::Serialization(format!(
                "汇率响应缺少基准币种 {}",
                self.base_currency
            ))
        })?;

        let key = format!("rates.{tier_id}.{}", self.base_currency);
        self.settings.set(&key, &rate.to_string()).await?;
        info!("汇率档位 {tier_id} 已更新: 1 {tier_id} = {rate} {}", self.base_currency);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::sqlite::{SqliteDatabase, SqliteSettingsRepository};

    async fn service() -> (CurrencyTierService, Arc<SqliteSettingsRepository>) {
        let db = SqliteDatabase::connect_in_memory().await.unwrap();
        let settings = Arc::new(SqliteSettingsRepository::new(db.pool()));
        let service = CurrencyTierService::new(settings.clone(), "AUD").unwrap();
        (service, settings)
    }

    #[tokio::test]
    async fn test_watched_tiers_parses_setting() {
        let (service, settings) = service().await;
        assert!(service.watched_tiers().await.unwrap().is_empty());

        settings
            .set(WATCHED_TIERS_KEY, "usd, JPY,, aud")
            .await
            .unwrap();
        // Normalized, deduplicated of blanks, base currency excluded.
        assert_eq!(
            service.watched_tiers().await.unwrap(),
            vec!["USD".to_string(), "JPY".to_string()]
        );
    }
}
