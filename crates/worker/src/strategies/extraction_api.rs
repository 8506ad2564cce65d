use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;

use pricewatch_core::config::ScrapingConfig;
use pricewatch_core::errors::{PricewatchError, PricewatchResult};
use pricewatch_core::traits::{ScrapeContext, ScrapeOutput, ScrapeStrategy};

use super::{build_client, to_observations};
use crate::extract;
use crate::validation::PriceLimits;

/// 第三方提取API策略，按成本递增逐级回退：
///
/// 1. 直接无认证抓取 + 共享提取（免费）
/// 2. 提取API渲染页面（付费）
/// 3. 提取API反爬变体（更贵），仅在第2层被拦截时使用
///
/// 每一层要么给出确定的价格，要么落入下一层；所有层级耗尽
/// 才返回失败。付费层级之前先检查缓存窗口控制API开销。
pub struct ExtractionApiStrategy {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    default_currency: String,
    limits: PriceLimits,
    cache_hours: i64,
}

/// API层级调用的失败分类：被拦截才值得升级到反爬变体
enum ApiFailure {
    Blocked(String),
    Other(String),
}

impl ExtractionApiStrategy {
    pub fn new(
        config: &ScrapingConfig,
        limits: PriceLimits,
        cache_hours: i64,
    ) -> PricewatchResult<Self> {
        Ok(Self {
            client: build_client(&config.user_agent, config.api_timeout_seconds)?,
            endpoint: config.extraction_api_endpoint.clone(),
            api_key: config.extraction_api_key.clone(),
            default_currency: config.default_currency.clone(),
            limits,
            cache_hours,
        })
    }

    /// 第1层：直接抓取
    async fn fetch_direct(&self, url: &str) -> Result<String, String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| format!("请求失败: {e}"))?;
        let status = response.status();
        if !status.is_success() {
            return Err(format!("HTTP {}", status.as_u16()));
        }
        response.text().await.map_err(|e| format!("读取响应失败: {e}"))
    }

    /// 第2/3层：经提取API渲染后抓取。
    /// 瞬时网络错误带抖动重试一次，避免与API侧限流共振。
    async fn fetch_via_api(
        &self,
        api_key: &str,
        url: &str,
        stealth: bool,
    ) -> Result<String, ApiFailure> {
        let mut params = vec![
            ("api_key", api_key.to_string()),
            ("url", url.to_string()),
            ("render_js", "true".to_string()),
        ];
        if stealth {
            params.push(("stealth_proxy", "true".to_string()));
        }

        let response = match self.client.get(&self.endpoint).query(&params).send().await {
            Ok(response) => response,
            Err(first) => {
                let jitter = rand::rng().random_range(250..750);
                tokio::time::sleep(Duration::from_millis(jitter)).await;
                self.client
                    .get(&self.endpoint)
                    .query(&params)
                    .send()
                    .await
                    .map_err(|_| ApiFailure::Other(format!("提取API请求失败: {first}")))?
            }
        };

        let status = response.status();
        if status.as_u16() == 403 || status.as_u16() == 429 {
            return Err(ApiFailure::Blocked(format!("blocked ({})", status.as_u16())));
        }
        if !status.is_success() {
            return Err(ApiFailure::Other(format!(
                "提取API HTTP {}",
                status.as_u16()
            )));
        }
        let body = response
            .text()
            .await
            .map_err(|e| ApiFailure::Other(format!("读取响应失败: {e}")))?;
        if looks_blocked(&body) {
            return Err(ApiFailure::Blocked("blocked (anti-bot page)".to_string()));
        }
        Ok(body)
    }

    fn extract_output(
        &self,
        html: &str,
        url: &str,
        hints: Option<&str>,
        ctx: &ScrapeContext,
    ) -> ScrapeOutput {
        let extraction = extract::extract_from_html(html, hints);
        let observations = to_observations(
            &extraction,
            url,
            hints,
            &self.default_currency,
            &self.limits,
            &ctx.log,
        );
        ScrapeOutput::live(observations, extraction.product_name)
    }
}

/// 渲染成功但返回的是验证码/拦截页
fn looks_blocked(body: &str) -> bool {
    let lowered = body.to_lowercase();
    ["captcha", "access denied", "are you a robot"]
        .iter()
        .any(|marker| lowered.contains(marker))
}

#[async_trait]
impl ScrapeStrategy for ExtractionApiStrategy {
    async fn scrape(
        &self,
        url: &str,
        hints: Option<&str>,
        ctx: &ScrapeContext,
    ) -> PricewatchResult<ScrapeOutput> {
        if ctx.within_cache_window(self.cache_hours) {
            ctx.log.push("缓存窗口内, 跳过抓取".to_string());
            return Ok(ScrapeOutput::cached());
        }

        // 第1层：先试免费的直接抓取
        ctx.log.push(format!("第1层: 直接抓取 {url}"));
        let direct_failure = match self.fetch_direct(url).await {
            Ok(html) => {
                let output = self.extract_output(&html, url, hints, ctx);
                if !output.prices.is_empty() {
                    ctx.log
                        .push(format!("第1层命中: {} 条价格", output.prices.len()));
                    return Ok(output);
                }
                ctx.log.push("第1层未找到价格".to_string());
                None
            }
            Err(reason) => {
                ctx.log.push(format!("第1层失败: {reason}"));
                Some(reason)
            }
        };

        let Some(api_key) = self.api_key.as_deref() else {
            // 没有配置API密钥：无法升级，按第1层的结果收尾
            return match direct_failure {
                Some(reason) => Err(PricewatchError::ScrapeFailure(reason)),
                None => Ok(ScrapeOutput::live(Vec::new(), None)),
            };
        };

        // 第2层：付费渲染
        ctx.log.push("第2层: 提取API渲染".to_string());
        match self.fetch_via_api(api_key, url, false).await {
            Ok(html) => {
                let output = self.extract_output(&html, url, hints, ctx);
                ctx.log
                    .push(format!("第2层: {} 条价格", output.prices.len()));
                return Ok(output);
            }
            Err(ApiFailure::Other(reason)) => {
                return Err(PricewatchError::ScrapeFailure(reason));
            }
            Err(ApiFailure::Blocked(reason)) => {
                ctx.log.push(format!("第2层被拦截: {reason}, 升级反爬变体"));
            }
        }

        // 第3层：反爬变体，最后的手段
        ctx.log.push("第3层: 提取API反爬变体".to_string());
        match self.fetch_via_api(api_key, url, true).await {
            Ok(html) => {
                let output = self.extract_output(&html, url, hints, ctx);
                ctx.log
                    .push(format!("第3层: {} 条价格", output.prices.len()));
                Ok(output)
            }
            Err(ApiFailure::Blocked(reason)) | Err(ApiFailure::Other(reason)) => {
                Err(PricewatchError::ScrapeFailure(reason))
            }
        }
    }

    fn name(&self) -> &str {
        "extraction_api"
    }
}
