//! 提取策略接口定义
//!
//! 每种零售商类别对应一个策略实现：输入URL（及可选提示），
//! 输出零或多条价格读数，或一个失败原因。策略内部可以按成本
//! 递增的顺序尝试多个提取层级（直接抓取 → 付费渲染API → 反爬
//! 变体），只有所有层级都耗尽才返回失败。

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::errors::PricewatchResult;
use crate::models::{PriceObservation, RunLog};

/// 单次抓取调用的上下文
#[derive(Debug, Clone)]
pub struct ScrapeContext {
    /// 手动/批量触发为true：无条件访问网络。
    /// 调度触发为false：遵守缓存窗口以控制第三方API开销。
    pub force_refresh: bool,
    /// 最近一次成功运行的时间，缓存窗口比较的基准
    pub last_successful_run_at: Option<DateTime<Utc>>,
    pub log: RunLog,
}

impl ScrapeContext {
    /// 缓存跳过判定：距上次成功不足窗口时长，且未强制刷新。
    /// 策略在进入昂贵层级之前调用，命中则短路返回 cached。
    pub fn within_cache_window(&self, cache_hours: i64) -> bool {
        if self.force_refresh || cache_hours <= 0 {
            return false;
        }
        match self.last_successful_run_at {
            Some(last) => Utc::now() - last < chrono::Duration::hours(cache_hours),
            None => false,
        }
    }
}

/// 策略返回的抓取结果
#[derive(Debug, Clone, Default)]
pub struct ScrapeOutput {
    pub prices: Vec<PriceObservation>,
    pub product_name: Option<String>,
    /// 缓存命中标记：未做任何网络调用，执行器应重放上次价格
    pub cached: bool,
}

impl ScrapeOutput {
    pub fn cached() -> Self {
        Self {
            cached: true,
            ..Default::default()
        }
    }

    pub fn live(prices: Vec<PriceObservation>, product_name: Option<String>) -> Self {
        Self {
            prices,
            product_name,
            cached: false,
        }
    }
}

/// 提取策略统一契约
///
/// 实现必须把策略层面的失败（网络错误、解析失败、被反爬拦截）
/// 表达为 `Err(PricewatchError::ScrapeFailure)`，错误文本原样
/// 保留给运维可见；找到零条价格不是错误。
#[async_trait]
pub trait ScrapeStrategy: Send + Sync {
    async fn scrape(
        &self,
        url: &str,
        hints: Option<&str>,
        ctx: &ScrapeContext,
    ) -> PricewatchResult<ScrapeOutput>;

    /// 策略名，用于日志
    fn name(&self) -> &str;
}
