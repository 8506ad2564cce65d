use tracing::warn;

use crate::config::{setting_keys, AppConfig};
use crate::errors::PricewatchResult;
use crate::traits::SettingsRepository;

/// 运行期生效的可调设置
///
/// 文件配置提供默认值，settings表中的条目逐项覆盖。
/// 解析失败的条目回退到默认值并记警告，不让坏数据阻断启动。
#[derive(Debug, Clone)]
pub struct RuntimeSettings {
    pub cache_hours: i64,
    pub max_valid_price: f64,
    pub min_pack_size: f64,
    pub max_pack_size: f64,
    pub queue_interval_ms: u64,
    pub queue_history_limit: usize,
}

impl RuntimeSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            cache_hours: config.scraping.cache_hours,
            max_valid_price: config.scraping.max_valid_price,
            min_pack_size: config.scraping.min_pack_size,
            max_pack_size: config.scraping.max_pack_size,
            queue_interval_ms: config.queue.interval_ms,
            queue_history_limit: config.queue.history_limit,
        }
    }

    /// 从设置仓储加载覆盖项
    pub async fn load(
        repo: &dyn SettingsRepository,
        config: &AppConfig,
    ) -> PricewatchResult<Self> {
        let mut settings = Self::from_config(config);

        if let Some(v) = lookup(repo, setting_keys::CACHE_HOURS).await? {
            settings.cache_hours = v;
        }
        if let Some(v) = lookup(repo, setting_keys::MAX_VALID_PRICE).await? {
            settings.max_valid_price = v;
        }
        if let Some(v) = lookup(repo, setting_keys::MIN_PACK_SIZE).await? {
            settings.min_pack_size = v;
        }
        if let Some(v) = lookup(repo, setting_keys::MAX_PACK_SIZE).await? {
            settings.max_pack_size = v;
        }
        if let Some(v) = lookup(repo, setting_keys::QUEUE_INTERVAL_MS).await? {
            settings.queue_interval_ms = v;
        }
        if let Some(v) = lookup(repo, setting_keys::QUEUE_HISTORY_LIMIT).await? {
            settings.queue_history_limit = v;
        }

        Ok(settings)
    }
}

async fn lookup<T: std::str::FromStr>(
    repo: &dyn SettingsRepository,
    key: &str,
) -> PricewatchResult<Option<T>> {
    match repo.get(key).await? {
        Some(raw) => match raw.parse::<T>() {
            Ok(v) => Ok(Some(v)),
            Err(_) => {
                warn!("设置 {key} 的值 {raw:?} 无法解析, 使用默认值");
                Ok(None)
            }
        },
        None => Ok(None),
    }
}
