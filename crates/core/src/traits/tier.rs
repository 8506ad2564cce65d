use async_trait::async_trait;

use crate::errors::PricewatchResult;

/// 汇率档位刷新接口
///
/// 队列的第二种任务类型：按档位刷新外币汇率，与抓取任务共用
/// 同一个节流队列。慢速定时器负责为所有在用档位入队刷新任务。
#[async_trait]
pub trait TierRefreshService: Send + Sync {
    /// 当前被追踪价格使用中的档位标识
    async fn watched_tiers(&self) -> PricewatchResult<Vec<String>>;

    /// 刷新单个档位
    async fn refresh(&self, tier_id: &str) -> PricewatchResult<()>;
}
