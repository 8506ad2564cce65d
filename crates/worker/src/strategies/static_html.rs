use async_trait::async_trait;

use pricewatch_core::config::ScrapingConfig;
use pricewatch_core::errors::{PricewatchError, PricewatchResult};
use pricewatch_core::traits::{ScrapeContext, ScrapeOutput, ScrapeStrategy};

use super::{build_client, to_observations};
use crate::extract;
use crate::validation::PriceLimits;

/// 静态HTML策略
///
/// 直接抓取页面并做结构化数据/正则提取。成本最低的策略，
/// 不设缓存窗口：每次调度都实际访问网络。
pub struct StaticHtmlStrategy {
    client: reqwest::Client,
    default_currency: String,
    limits: PriceLimits,
}

impl StaticHtmlStrategy {
    pub fn new(config: &ScrapingConfig, limits: PriceLimits) -> PricewatchResult<Self> {
        Ok(Self {
            client: build_client(&config.user_agent, config.request_timeout_seconds)?,
            default_currency: config.default_currency.clone(),
            limits,
        })
    }

    async fn fetch(&self, url: &str) -> PricewatchResult<String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| PricewatchError::Network(format!("请求失败: {e}")))?;

        let status = response.status();
        if status.as_u16() == 403 || status.as_u16() == 429 {
            return Err(PricewatchError::ScrapeFailure(format!(
                "blocked ({})",
                status.as_u16()
            )));
        }
        if !status.is_success() {
            return Err(PricewatchError::ScrapeFailure(format!(
                "HTTP {}",
                status.as_u16()
            )));
        }
        response
            .text()
            .await
            .map_err(|e| PricewatchError::Network(format!("读取响应失败: {e}")))
    }
}

#[async_trait]
impl ScrapeStrategy for StaticHtmlStrategy {
    async fn scrape(
        &self,
        url: &str,
        hints: Option<&str>,
        ctx: &ScrapeContext,
    ) -> PricewatchResult<ScrapeOutput> {
        ctx.log.push(format!("静态HTML: 抓取 {url}"));
        let html = self.fetch(url).await?;

        let extraction = extract::extract_from_html(&html, hints);
        let observations = to_observations(
            &extraction,
            url,
            hints,
            &self.default_currency,
            &self.limits,
            &ctx.log,
        );
        ctx.log
            .push(format!("静态HTML: 提取到 {} 条价格", observations.len()));
        Ok(ScrapeOutput::live(observations, extraction.product_name))
    }

    fn name(&self) -> &str {
        "static_html"
    }
}
