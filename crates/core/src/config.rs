use std::path::Path;

use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

use crate::errors::{PricewatchError, PricewatchResult};

/// 系统配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub queue: QueueConfig,
    pub scheduler: SchedulerConfig,
    pub scraping: ScrapingConfig,
    pub api: ApiConfig,
    pub observability: ObservabilityConfig,
}

/// 数据库配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

/// 抓取队列配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// 相邻两次任务启动的最小间隔（毫秒）。
    /// 单worker大间隔是对第三方站点与付费API的礼貌性设计常量。
    pub interval_ms: u64,
    /// 保留的已完成任务条数上限
    pub history_limit: usize,
}

/// 周期调度器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub enabled: bool,
    /// 到期抓取器轮询间隔（秒）
    pub poll_interval_seconds: u64,
    /// 汇率档位刷新间隔（秒）
    pub tier_refresh_interval_seconds: u64,
    /// 运行记录保留天数
    pub run_retention_days: i32,
}

/// 抓取策略配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrapingConfig {
    /// 缓存窗口（小时）：距上次成功不足此时长的非强制执行直接跳过
    pub cache_hours: i64,
    /// 价格合法性上限，过滤明显错误的提取结果
    pub max_valid_price: f64,
    /// 包装数量的合理范围
    pub min_pack_size: f64,
    pub max_pack_size: f64,
    /// 正则层级提取不到币种时使用的默认币种
    pub default_currency: String,
    /// 直接抓取超时（秒）
    pub request_timeout_seconds: u64,
    /// 第三方提取API超时（秒），渲染页面可能很慢
    pub api_timeout_seconds: u64,
    pub user_agent: String,
    /// 第三方提取API端点与密钥（密钥为空则该层级不可用）
    pub extraction_api_endpoint: String,
    pub extraction_api_key: Option<String>,
    /// 本地LLM端点与模型
    pub llm_endpoint: String,
    pub llm_model: String,
    /// LLM推理超时（秒）
    pub llm_timeout_seconds: u64,
}

/// API配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub enabled: bool,
    pub bind_address: String,
    pub cors_enabled: bool,
}

/// 可观测性配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub log_level: String,
    pub log_format: String, // "json", "pretty"
    /// 通知webhook地址（为空则通知检查只记日志）
    pub notification_webhook_url: Option<String>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://pricewatch.db".to_string(),
            max_connections: 5,
            min_connections: 1,
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            interval_ms: 120_000,
            history_limit: 100,
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval_seconds: 60,
            tier_refresh_interval_seconds: 43_200, // 12小时
            run_retention_days: 90,
        }
    }
}

impl Default for ScrapingConfig {
    fn default() -> Self {
        Self {
            cache_hours: 168,
            max_valid_price: 10_000.0,
            min_pack_size: 1.0,
            max_pack_size: 1_000.0,
            default_currency: "AUD".to_string(),
            request_timeout_seconds: 30,
            api_timeout_seconds: 90,
            user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
                .to_string(),
            extraction_api_endpoint: "https://app.scrapingbee.com/api/v1".to_string(),
            extraction_api_key: None,
            llm_endpoint: "http://localhost:11434".to_string(),
            llm_model: "llama3.1".to_string(),
            llm_timeout_seconds: 120,
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_address: "0.0.0.0:8080".to_string(),
            cors_enabled: true,
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            notification_webhook_url: None,
        }
    }
}

impl AppConfig {
    /// 加载配置：TOML文件（可选） + PRICEWATCH_ 前缀环境变量覆盖
    pub fn load(config_path: Option<&str>) -> PricewatchResult<Self> {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = config_path {
            if !Path::new(path).exists() {
                return Err(PricewatchError::Configuration(format!(
                    "配置文件不存在: {path}"
                )));
            }
            builder = builder.add_source(File::new(path, FileFormat::Toml));
        } else {
            for path in ["config/pricewatch.toml", "pricewatch.toml"] {
                if Path::new(path).exists() {
                    builder = builder.add_source(File::new(path, FileFormat::Toml));
                    break;
                }
            }
        }

        let config = builder
            .add_source(
                Environment::with_prefix("PRICEWATCH")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()
            .map_err(|e| PricewatchError::Configuration(format!("配置构建失败: {e}")))?;

        let app_config: AppConfig = config
            .try_deserialize()
            .map_err(|e| PricewatchError::Configuration(format!("配置解析失败: {e}")))?;

        app_config.validate()?;
        Ok(app_config)
    }

    pub fn from_toml(toml_str: &str) -> PricewatchResult<Self> {
        let config: AppConfig = toml::from_str(toml_str)
            .map_err(|e| PricewatchError::Configuration(format!("配置解析失败: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// 校验配置的内部一致性
    pub fn validate(&self) -> PricewatchResult<()> {
        if self.database.url.is_empty() {
            return Err(PricewatchError::Configuration(
                "数据库URL不能为空".to_string(),
            ));
        }
        if self.queue.interval_ms == 0 {
            return Err(PricewatchError::Configuration(
                "队列间隔必须大于0".to_string(),
            ));
        }
        if self.queue.history_limit == 0 {
            return Err(PricewatchError::Configuration(
                "队列历史保留上限必须大于0".to_string(),
            ));
        }
        if self.scraping.max_valid_price <= 0.0 {
            return Err(PricewatchError::Configuration(
                "价格上限必须大于0".to_string(),
            ));
        }
        if self.scraping.min_pack_size > self.scraping.max_pack_size {
            return Err(PricewatchError::Configuration(
                "包装数量下限不能大于上限".to_string(),
            ));
        }
        if self.scheduler.poll_interval_seconds == 0 {
            return Err(PricewatchError::Configuration(
                "调度轮询间隔必须大于0".to_string(),
            ));
        }
        Ok(())
    }
}

/// 运行期可调设置的键名（存储在settings表中，覆盖文件配置）
pub mod setting_keys {
    pub const CACHE_HOURS: &str = "scrape.cache_hours";
    pub const MAX_VALID_PRICE: &str = "scrape.max_valid_price";
    pub const MIN_PACK_SIZE: &str = "scrape.min_pack_size";
    pub const MAX_PACK_SIZE: &str = "scrape.max_pack_size";
    pub const QUEUE_INTERVAL_MS: &str = "queue.interval_ms";
    pub const QUEUE_HISTORY_LIMIT: &str = "queue.history_limit";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.queue.interval_ms, 120_000);
        assert_eq!(config.queue.history_limit, 100);
        assert_eq!(config.scraping.cache_hours, 168);
    }

    #[test]
    fn test_from_toml_partial_override() {
        let config = AppConfig::from_toml(
            r#"
            [queue]
            interval_ms = 60000

            [scraping]
            cache_hours = 24
            "#,
        )
        .unwrap();
        assert_eq!(config.queue.interval_ms, 60_000);
        assert_eq!(config.scraping.cache_hours, 24);
        // 其余字段保持默认
        assert_eq!(config.queue.history_limit, 100);
        assert_eq!(config.scheduler.poll_interval_seconds, 60);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let result = AppConfig::from_toml(
            r#"
            [queue]
            interval_ms = 0
            "#,
        );
        assert!(result.is_err());
    }
}
