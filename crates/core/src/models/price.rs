use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 零售商
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Retailer {
    pub id: i64,
    pub name: String,
    pub domain: Option<String>,
}

/// 策略产出的单条价格读数（临时对象，未持久化）
///
/// 由提取策略构造，经执行器换算派生字段后落库为 [`PriceRecord`]。
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PriceObservation {
    pub retailer_name: String,
    pub retailer_domain: Option<String>,
    pub price: f64,
    pub currency: String,
    pub in_stock: bool,
    /// 预售/补货中等可用性说明
    pub availability: Option<String>,
    pub product_url: Option<String>,
    /// 包装数量，用于单位价格换算（如 24 罐装）
    pub unit_count: Option<f64>,
    pub unit_type: Option<String>,
    /// 多件优惠数量与总价（如"2件$55"）
    pub multi_buy_quantity: Option<i64>,
    pub multi_buy_price: Option<f64>,
}

impl PriceObservation {
    pub fn new(retailer_name: impl Into<String>, price: f64, currency: impl Into<String>) -> Self {
        Self {
            retailer_name: retailer_name.into(),
            price,
            currency: currency.into(),
            in_stock: true,
            ..Default::default()
        }
    }
}

/// 持久化的价格记录
///
/// 价格历史是追加式的：记录落库后不再更新，缓存重放也是
/// 以新时间戳插入新行而非修改旧行。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceRecord {
    pub id: i64,
    pub product_scraper_id: i64,
    pub retailer_id: i64,
    pub price: f64,
    pub currency: String,
    pub in_stock: bool,
    pub availability: Option<String>,
    pub product_url: Option<String>,
    pub unit_count: Option<f64>,
    pub unit_type: Option<String>,
    /// 落库时派生：price / unit_count
    pub price_per_unit: Option<f64>,
    pub multi_buy_quantity: Option<i64>,
    pub multi_buy_price: Option<f64>,
    /// 落库时派生：multi_buy_price / multi_buy_quantity / unit_count
    pub multi_buy_price_per_unit: Option<f64>,
    pub scraped_at: DateTime<Utc>,
}

impl PriceRecord {
    /// 由策略读数构造待插入的记录，并计算派生的单位价格字段
    pub fn from_observation(
        product_scraper_id: i64,
        retailer_id: i64,
        obs: &PriceObservation,
        scraped_at: DateTime<Utc>,
    ) -> Self {
        let price_per_unit = obs
            .unit_count
            .filter(|c| *c > 0.0)
            .map(|c| obs.price / c);
        let multi_buy_price_per_unit = match (obs.multi_buy_price, obs.multi_buy_quantity, obs.unit_count) {
            (Some(total), Some(qty), Some(count)) if qty > 0 && count > 0.0 => {
                Some(total / qty as f64 / count)
            }
            _ => None,
        };
        Self {
            id: 0, // 将由数据库生成
            product_scraper_id,
            retailer_id,
            price: obs.price,
            currency: obs.currency.clone(),
            in_stock: obs.in_stock,
            availability: obs.availability.clone(),
            product_url: obs.product_url.clone(),
            unit_count: obs.unit_count,
            unit_type: obs.unit_type.clone(),
            price_per_unit,
            multi_buy_quantity: obs.multi_buy_quantity,
            multi_buy_price: obs.multi_buy_price,
            multi_buy_price_per_unit,
            scraped_at,
        }
    }

    /// 缓存重放：以新时间戳复制本记录，保持时间序列连续
    pub fn replayed_at(&self, scraped_at: DateTime<Utc>) -> Self {
        Self {
            id: 0,
            scraped_at,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_per_unit_derivation() {
        let mut obs = PriceObservation::new("Example Store", 48.0, "AUD");
        obs.unit_count = Some(24.0);
        obs.unit_type = Some("can".to_string());

        let rec = PriceRecord::from_observation(1, 1, &obs, Utc::now());
        assert_eq!(rec.price_per_unit, Some(2.0));
        assert_eq!(rec.multi_buy_price_per_unit, None);
    }

    #[test]
    fn test_multi_buy_per_unit_needs_all_three_fields() {
        let mut obs = PriceObservation::new("Example Store", 30.0, "AUD");
        obs.multi_buy_quantity = Some(2);
        obs.multi_buy_price = Some(55.0);

        // unit_count missing: no multi-buy per-unit price.
        let rec = PriceRecord::from_observation(1, 1, &obs, Utc::now());
        assert_eq!(rec.multi_buy_price_per_unit, None);

        obs.unit_count = Some(10.0);
        let rec = PriceRecord::from_observation(1, 1, &obs, Utc::now());
        assert_eq!(rec.multi_buy_price_per_unit, Some(55.0 / 2.0 / 10.0));
    }

    #[test]
    fn test_replay_copies_values_with_new_timestamp() {
        let obs = PriceObservation::new("Example Store", 39.99, "AUD");
        let rec = PriceRecord::from_observation(1, 1, &obs, Utc::now() - chrono::Duration::hours(2));
        let now = Utc::now();
        let replayed = rec.replayed_at(now);
        assert_eq!(replayed.id, 0);
        assert_eq!(replayed.price, rec.price);
        assert_eq!(replayed.scraped_at, now);
    }
}
