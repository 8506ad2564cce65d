use async_trait::async_trait;

use crate::errors::PricewatchResult;
use crate::models::{ProductScraper, RunLog, ScraperRun};

/// 抓取执行接口
///
/// 队列worker通过此接口触发单次抓取。实现方的契约：策略层面
/// 的失败转化为 error 状态的运行结果返回，只有持久化不可用
/// 这类意外错误才以 Err 形式越过边界。
#[async_trait]
pub trait ScrapeExecutor: Send + Sync {
    async fn execute(
        &self,
        scraper: &ProductScraper,
        force: bool,
        log: RunLog,
    ) -> PricewatchResult<ScraperRun>;
}
