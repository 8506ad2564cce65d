use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use pricewatch_core::config::ScrapingConfig;
use pricewatch_core::errors::{PricewatchError, PricewatchResult};
use pricewatch_core::models::PriceObservation;
use pricewatch_core::traits::{ScrapeContext, ScrapeOutput, ScrapeStrategy};

use super::build_client;
use crate::extract;
use crate::validation::{self, PriceLimits};

/// 本地LLM策略
///
/// 抓取页面后把可见文本交给本地LLM端点（Ollama风格的
/// /api/generate），让模型以JSON输出价格。推理昂贵，遵守
/// 缓存窗口。
pub struct LocalLlmStrategy {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    default_currency: String,
    limits: PriceLimits,
    cache_hours: i64,
}

/// 送入模型的正文长度上限（字符）
const MAX_PROMPT_TEXT_CHARS: usize = 6_000;

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

impl LocalLlmStrategy {
    pub fn new(
        config: &ScrapingConfig,
        limits: PriceLimits,
        cache_hours: i64,
    ) -> PricewatchResult<Self> {
        Ok(Self {
            client: build_client(&config.user_agent, config.llm_timeout_seconds)?,
            endpoint: config.llm_endpoint.clone(),
            model: config.llm_model.clone(),
            default_currency: config.default_currency.clone(),
            limits,
            cache_hours,
        })
    }

    async fn fetch_page(&self, url: &str) -> PricewatchResult<String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| PricewatchError::Network(format!("请求失败: {e}")))?;
        let status = response.status();
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

    fn build_prompt(&self, page_text: &str, hints: Option<&str>) -> String {
        let mut prompt = String::from(
            "You are a price extraction assistant. From the retailer page text below, \
             extract the current product price. Respond with JSON only, in the form \
             {\"price\": number, \"currency\": string, \"in_stock\": boolean, \
             \"product_name\": string}. Use null for unknown fields.",
        );
        if let Some(hints) = hints {
            prompt.push_str(&format!("\nHint from the user: {hints}"));
        }
        prompt.push_str("\n\nPage text:\n");
        prompt.push_str(page_text);
        prompt
    }

    async fn generate(&self, prompt: &str) -> PricewatchResult<String> {
        let response = self
            .client
            .post(format!("{}/api/generate", self.endpoint))
            .json(&serde_json::json!({
                "model": self.model,
                "prompt": prompt,
                "stream": false,
                "format": "json",
            }))
            .send()
            .await
            .map_err(|e| PricewatchError::ScrapeFailure(format!("LLM端点不可达: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PricewatchError::ScrapeFailure(format!(
                "LLM端点 HTTP {}",
                status.as_u16()
            )));
        }
        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| PricewatchError::ScrapeFailure(format!("LLM响应解析失败: {e}")))?;
        Ok(body.response)
    }

    /// 把模型的JSON输出转换为价格读数
    fn parse_answer(&self, answer: &str, url: &str, ctx: &ScrapeContext) -> ScrapeOutput {
        let Ok(value) = serde_json::from_str::<Value>(answer) else {
            ctx.log.push("LLM输出不是合法JSON".to_string());
            return ScrapeOutput::live(Vec::new(), None);
        };

        let product_name = value
            .get("product_name")
            .and_then(|n| n.as_str())
            .map(|n| n.to_string());
        let Some(price) = value.get("price").and_then(extract::parse_price_value) else {
            ctx.log.push("LLM未能给出价格".to_string());
            return ScrapeOutput::live(Vec::new(), product_name);
        };

        let domain = extract::domain_of(url);
        let obs = PriceObservation {
            retailer_name: domain.clone().unwrap_or_else(|| "unknown".to_string()),
            retailer_domain: domain,
            price,
            currency: value
                .get("currency")
                .and_then(|c| c.as_str())
                .map(|c| c.to_string())
                .unwrap_or_else(|| self.default_currency.clone()),
            in_stock: value.get("in_stock").and_then(|s| s.as_bool()).unwrap_or(true),
            availability: None,
            product_url: Some(url.to_string()),
            unit_count: None,
            unit_type: None,
            multi_buy_quantity: None,
            multi_buy_price: None,
        };
        let prices = validation::sanitize(obs, &self.limits, &ctx.log)
            .into_iter()
            .collect();
        ScrapeOutput::live(prices, product_name)
    }
}

#[async_trait]
impl ScrapeStrategy for LocalLlmStrategy {
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

        ctx.log.push(format!("本地LLM: 抓取 {url}"));
        let html = self.fetch_page(url).await?;
        let mut text = extract::visible_text(&html);
        if text.len() > MAX_PROMPT_TEXT_CHARS {
            text = text.chars().take(MAX_PROMPT_TEXT_CHARS).collect();
        }

        ctx.log.push(format!("本地LLM: 推理 ({} 字符正文)", text.len()));
        let answer = self.generate(&self.build_prompt(&text, hints)).await?;
        let output = self.parse_answer(&answer, url, ctx);
        ctx.log
            .push(format!("本地LLM: 提取到 {} 条价格", output.prices.len()));
        Ok(output)
    }

    fn name(&self) -> &str {
        "local_llm"
    }
}
