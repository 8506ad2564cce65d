//! 价格读数的合法性校验
//!
//! 策略在接受一条价格之前必须通过这里的规则，过滤明显错误的
//! 提取结果（把年份当价格、把原价当优惠价等常见事故）。

use pricewatch_core::models::{PriceObservation, RunLog};
use pricewatch_core::settings::RuntimeSettings;

/// 校验所用的边界值
#[derive(Debug, Clone)]
pub struct PriceLimits {
    /// 价格合法上限
    pub max_valid_price: f64,
    /// 包装数量合理范围
    pub min_pack_size: f64,
    pub max_pack_size: f64,
}

impl From<&RuntimeSettings> for PriceLimits {
    fn from(settings: &RuntimeSettings) -> Self {
        Self {
            max_valid_price: settings.max_valid_price,
            min_pack_size: settings.min_pack_size,
            max_pack_size: settings.max_pack_size,
        }
    }
}

/// 校验并修整一条价格读数
///
/// - 价格必须为有限正数且不超过上限，否则整条丢弃
/// - 包装数量越界时只剥离包装字段，价格本身保留
/// - 多件优惠的单件价必须严格低于单买价，否则剥离优惠字段
///   （常见提取错误是把原价抓成了"优惠价"）
pub fn sanitize(
    mut obs: PriceObservation,
    limits: &PriceLimits,
    log: &RunLog,
) -> Option<PriceObservation> {
    if !obs.price.is_finite() || obs.price <= 0.0 {
        log.push(format!(
            "丢弃非法价格 {} ({})",
            obs.price, obs.retailer_name
        ));
        return None;
    }
    if obs.price > limits.max_valid_price {
        log.push(format!(
            "丢弃超出上限的价格 {} > {} ({})",
            obs.price, limits.max_valid_price, obs.retailer_name
        ));
        return None;
    }

    if let Some(count) = obs.unit_count {
        if !count.is_finite() || count < limits.min_pack_size || count > limits.max_pack_size {
            log.push(format!("包装数量 {count} 越界, 剥离包装字段"));
            obs.unit_count = None;
            obs.unit_type = None;
        }
    }

    if obs.multi_buy_quantity.is_some() || obs.multi_buy_price.is_some() {
        let valid = match (obs.multi_buy_quantity, obs.multi_buy_price) {
            (Some(qty), Some(total)) if qty > 0 && total.is_finite() && total > 0.0 => {
                // 单件换算后必须严格更便宜
                (total / qty as f64) < obs.price
            }
            _ => false,
        };
        if !valid {
            log.push(format!(
                "多件优惠无实际折扣, 剥离 ({}件 {:?})",
                obs.multi_buy_quantity.unwrap_or(0),
                obs.multi_buy_price
            ));
            obs.multi_buy_quantity = None;
            obs.multi_buy_price = None;
        }
    }

    Some(obs)
}
