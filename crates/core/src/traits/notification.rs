use async_trait::async_trait;

use crate::errors::PricewatchResult;

/// 通知分发接口
///
/// 执行器在价格落库后调用；尽力而为的次要行为，失败由调用方
/// 记日志吞掉，绝不影响触发它的运行结果。
#[async_trait]
pub trait NotificationService: Send + Sync {
    /// 检查某商品的通知条件（降价、到货等）并按需分发
    async fn check_notifications(&self, product_id: i64) -> PricewatchResult<()>;
}
