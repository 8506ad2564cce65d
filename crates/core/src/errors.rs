use thiserror::Error;

/// 价格追踪系统错误类型定义
#[derive(Debug, Error)]
pub enum PricewatchError {
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error("数据库操作错误: {0}")]
    DatabaseOperation(String),

    #[error("价格抓取器未找到: {id}")]
    ScraperNotFound { id: i64 },

    #[error("抓取失败: {0}")]
    ScrapeFailure(String),

    #[error("网络错误: {0}")]
    Network(String),

    #[error("序列化错误: {0}")]
    Serialization(String),

    #[error("配置错误: {0}")]
    Configuration(String),

    #[error("队列忙: {0}")]
    QueueBusy(String),

    #[error("通知发送失败: {0}")]
    Notification(String),

    #[error("内部错误: {0}")]
    Internal(String),
}

/// 统一的Result类型
pub type PricewatchResult<T> = std::result::Result<T, PricewatchError>;
