//! 提取策略实现与注册表
//!
//! 每个 [`ScraperType`] 变体对应一个策略实例，注册表按变体整体
//! 分发，不存在运行期查不到策略的情况。

pub mod extraction_api;
pub mod local_llm;
pub mod static_html;

use std::time::Duration;

use pricewatch_core::config::ScrapingConfig;
use pricewatch_core::errors::{PricewatchError, PricewatchResult};
use pricewatch_core::models::{PriceObservation, RunLog, ScraperType};
use pricewatch_core::settings::RuntimeSettings;
use pricewatch_core::traits::ScrapeStrategy;

use crate::extract::{self, Extraction};
use crate::validation::{self, PriceLimits};

pub use extraction_api::ExtractionApiStrategy;
pub use local_llm::LocalLlmStrategy;
pub use static_html::StaticHtmlStrategy;

/// 策略注册表：每个策略类型一个实例
pub struct StrategyRegistry {
    static_html: Box<dyn ScrapeStrategy>,
    extraction_api: Box<dyn ScrapeStrategy>,
    local_llm: Box<dyn ScrapeStrategy>,
}

impl StrategyRegistry {
    /// 按配置构建全部生产策略
    pub fn from_config(
        config: &ScrapingConfig,
        settings: &RuntimeSettings,
    ) -> PricewatchResult<Self> {
        let limits = PriceLimits::from(settings);
        Ok(Self {
            static_html: Box::new(StaticHtmlStrategy::new(config, limits.clone())?),
            extraction_api: Box::new(ExtractionApiStrategy::new(
                config,
                limits.clone(),
                settings.cache_hours,
            )?),
            local_llm: Box::new(LocalLlmStrategy::new(config, limits, settings.cache_hours)?),
        })
    }

    /// 测试/组装用：显式注入各策略实例
    pub fn new(
        static_html: Box<dyn ScrapeStrategy>,
        extraction_api: Box<dyn ScrapeStrategy>,
        local_llm: Box<dyn ScrapeStrategy>,
    ) -> Self {
        Self {
            static_html,
            extraction_api,
            local_llm,
        }
    }

    pub fn get(&self, scraper_type: ScraperType) -> &dyn ScrapeStrategy {
        match scraper_type {
            ScraperType::StaticHtml => self.static_html.as_ref(),
            ScraperType::ExtractionApi => self.extraction_api.as_ref(),
            ScraperType::LocalLlm => self.local_llm.as_ref(),
        }
    }
}

/// 构建带UA与超时的HTTP客户端
pub(crate) fn build_client(
    user_agent: &str,
    timeout_seconds: u64,
) -> PricewatchResult<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(user_agent)
        .timeout(Duration::from_secs(timeout_seconds))
        .build()
        .map_err(|e| PricewatchError::Network(format!("HTTP客户端构建失败: {e}")))
}

/// 把提取结果转换为经过校验的价格读数
///
/// 零售商名优先取结构化数据中的seller，否则回退到页面域名；
/// 包装数量从商品名或提示文本识别；多件优惠统一附加后交由
/// 校验规则决定去留。
pub(crate) fn to_observations(
    extraction: &Extraction,
    url: &str,
    hints: Option<&str>,
    default_currency: &str,
    limits: &PriceLimits,
    log: &RunLog,
) -> Vec<PriceObservation> {
    let domain = extract::domain_of(url);
    let pack = extraction
        .product_name
        .as_deref()
        .and_then(extract::parse_pack_count)
        .or_else(|| hints.and_then(extract::parse_pack_count));

    extraction
        .prices
        .iter()
        .filter_map(|price| {
            let obs = PriceObservation {
                retailer_name: price
                    .seller
                    .clone()
                    .or_else(|| domain.clone())
                    .unwrap_or_else(|| "unknown".to_string()),
                retailer_domain: domain.clone(),
                price: price.price,
                currency: price
                    .currency
                    .clone()
                    .unwrap_or_else(|| default_currency.to_string()),
                in_stock: price.in_stock,
                availability: price.availability.clone(),
                product_url: Some(url.to_string()),
                unit_count: pack.as_ref().map(|(count, _)| *count),
                unit_type: pack.as_ref().map(|(_, unit)| unit.clone()),
                multi_buy_quantity: extraction.multi_buy.map(|(qty, _)| qty),
                multi_buy_price: extraction.multi_buy.map(|(_, total)| total),
            };
            validation::sanitize(obs, limits, log)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::ExtractedPrice;

    fn limits() -> PriceLimits {
        PriceLimits {
            max_valid_price: 10_000.0,
            min_pack_size: 1.0,
            max_pack_size: 1_000.0,
        }
    }

    #[test]
    fn test_to_observations_fills_retailer_from_domain() {
        let extraction = Extraction {
            prices: vec![ExtractedPrice {
                price: 39.99,
                currency: None,
                in_stock: true,
                availability: None,
                seller: None,
            }],
            product_name: None,
            multi_buy: None,
        };
        let log = RunLog::new();
        let obs = to_observations(
            &extraction,
            "https://www.shop.example.com/p/1",
            None,
            "AUD",
            &limits(),
            &log,
        );
        assert_eq!(obs.len(), 1);
        assert_eq!(obs[0].retailer_name, "shop.example.com");
        assert_eq!(obs[0].currency, "AUD");
        assert_eq!(obs[0].product_url.as_deref(), Some("https://www.shop.example.com/p/1"));
    }

    #[test]
    fn test_to_observations_applies_pack_and_multi_buy_rules() {
        let extraction = Extraction {
            prices: vec![ExtractedPrice {
                price: 30.0,
                currency: Some("AUD".to_string()),
                in_stock: true,
                availability: None,
                seller: Some("Example Store".to_string()),
            }],
            product_name: Some("Cola 24 x 375mL".to_string()),
            // Bogus deal: 2 for $60 is no cheaper than $30 each.
            multi_buy: Some((2, 60.0)),
        };
        let log = RunLog::new();
        let obs = to_observations(
            &extraction,
            "https://example.com/cola",
            None,
            "AUD",
            &limits(),
            &log,
        );
        assert_eq!(obs[0].unit_count, Some(24.0));
        assert_eq!(obs[0].multi_buy_quantity, None);
        assert_eq!(obs[0].multi_buy_price, None);
    }

    #[test]
    fn test_registry_dispatches_every_variant() {
        let config = ScrapingConfig::default();
        let settings = RuntimeSettings {
            cache_hours: 168,
            max_valid_price: 10_000.0,
            min_pack_size: 1.0,
            max_pack_size: 1_000.0,
            queue_interval_ms: 120_000,
            queue_history_limit: 100,
        };
        let registry = StrategyRegistry::from_config(&config, &settings).unwrap();
        assert_eq!(registry.get(ScraperType::StaticHtml).name(), "static_html");
        assert_eq!(
            registry.get(ScraperType::ExtractionApi).name(),
            "extraction_api"
        );
        assert_eq!(registry.get(ScraperType::LocalLlm).name(), "local_llm");
    }
}
