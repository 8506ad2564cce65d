//! 共享的页面价格提取
//!
//! 按成本递增的三个提取手段处理同一份HTML：
//! 1. JSON-LD 结构化数据（schema.org Product/Offer）
//! 2. microdata/meta 标签价格
//! 3. 正文正则匹配（可用提示文本缩小搜索窗口）
//!
//! 前一个手段找到价格即停止。静态HTML策略与提取API策略的
//! 渲染结果都经由这里解析。

use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};
use serde_json::Value;

/// 一条从页面提取出的价格（未经校验）
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedPrice {
    pub price: f64,
    pub currency: Option<String>,
    pub in_stock: bool,
    pub availability: Option<String>,
    pub seller: Option<String>,
}

/// 一次提取的完整结果
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub prices: Vec<ExtractedPrice>,
    pub product_name: Option<String>,
    /// 页面上的多件优惠（数量, 总价），如"2 for $55"
    pub multi_buy: Option<(i64, f64)>,
}

static JSON_LD_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"script[type="application/ld+json"]"#).unwrap());
static META_PRICE_SELECTORS: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    [
        r#"meta[itemprop="price"]"#,
        r#"[itemprop="price"]"#,
        r#"meta[property="product:price:amount"]"#,
        r#"meta[property="og:price:amount"]"#,
    ]
    .iter()
    .map(|s| Selector::parse(s).unwrap())
    .collect()
});
static META_CURRENCY_SELECTORS: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    [
        r#"meta[itemprop="priceCurrency"]"#,
        r#"[itemprop="priceCurrency"]"#,
        r#"meta[property="product:price:currency"]"#,
        r#"meta[property="og:price:currency"]"#,
    ]
    .iter()
    .map(|s| Selector::parse(s).unwrap())
    .collect()
});
static TITLE_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("title").unwrap());
static OG_TITLE_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"meta[property="og:title"]"#).unwrap());

static PRICE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[$€£]\s*([0-9]{1,6}(?:,[0-9]{3})*(?:\.[0-9]{1,2})?)").unwrap()
});
static SCRIPT_STYLE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<(script|style)[^>]*>.*?</(script|style)>").unwrap());
static MULTI_BUY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d{1,2})\s*for\s*\$\s*([0-9]{1,6}(?:,[0-9]{3})*(?:\.[0-9]{1,2})?)").unwrap()
});
static PACK_PATTERNS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    vec![
        (Regex::new(r"(?i)\b(\d{1,4})\s*x\b").unwrap(), "unit"),
        (Regex::new(r"(?i)\b(\d{1,4})\s*(?:pack|pk)\b").unwrap(), "pack"),
        (Regex::new(r"(?i)\bpack\s+of\s+(\d{1,4})\b").unwrap(), "pack"),
    ]
});

/// 对一份HTML执行逐级提取
pub fn extract_from_html(html: &str, hints: Option<&str>) -> Extraction {
    let document = Html::parse_document(html);
    let text = visible_text(html);

    let mut extraction = extract_json_ld(&document);
    if extraction.product_name.is_none() {
        extraction.product_name = extract_title(&document);
    }
    extraction.multi_buy = parse_multi_buy(&text);
    if !extraction.prices.is_empty() {
        return extraction;
    }

    if let Some(price) = extract_meta_price(&document) {
        extraction.prices.push(price);
        return extraction;
    }

    if let Some(price) = extract_price_pattern(&text, hints) {
        extraction.prices.push(price);
    }
    extraction
}

/// 识别"N for $X"式多件优惠
pub fn parse_multi_buy(text: &str) -> Option<(i64, f64)> {
    let cap = MULTI_BUY_PATTERN.captures(text)?;
    let quantity = cap[1].parse::<i64>().ok().filter(|q| *q > 1)?;
    let total = parse_price_str(&cap[2])?;
    Some((quantity, total))
}

/// JSON-LD结构化数据提取
fn extract_json_ld(document: &Html) -> Extraction {
    let mut extraction = Extraction::default();
    for script in document.select(&JSON_LD_SELECTOR) {
        let raw = script.text().collect::<String>();
        let Ok(value) = serde_json::from_str::<Value>(&raw) else {
            continue;
        };
        collect_products(&value, &mut extraction);
    }
    extraction
}

fn collect_products(value: &Value, extraction: &mut Extraction) {
    match value {
        Value::Array(items) => {
            for item in items {
                collect_products(item, extraction);
            }
        }
        Value::Object(obj) => {
            if let Some(graph) = obj.get("@graph") {
                collect_products(graph, extraction);
            }
            if is_type(value, "Product") {
                if extraction.product_name.is_none() {
                    extraction.product_name = obj
                        .get("name")
                        .and_then(|n| n.as_str())
                        .map(|n| n.trim().to_string());
                }
                if let Some(offers) = obj.get("offers") {
                    collect_offers(offers, extraction);
                }
            }
        }
        _ => {}
    }
}

fn collect_offers(value: &Value, extraction: &mut Extraction) {
    match value {
        Value::Array(items) => {
            for item in items {
                collect_offers(item, extraction);
            }
        }
        Value::Object(obj) => {
            // AggregateOffer 嵌套一层 offers
            if let Some(nested) = obj.get("offers") {
                collect_offers(nested, extraction);
            }
            let price = obj
                .get("price")
                .and_then(parse_price_value)
                .or_else(|| obj.get("lowPrice").and_then(parse_price_value));
            let Some(price) = price else { return };

            let currency = obj
                .get("priceCurrency")
                .and_then(|c| c.as_str())
                .map(|c| c.to_string());
            let (in_stock, availability) = obj
                .get("availability")
                .and_then(|a| a.as_str())
                .map(availability_from_schema)
                .unwrap_or((true, None));
            let seller = obj
                .get("seller")
                .and_then(|s| s.get("name"))
                .and_then(|n| n.as_str())
                .map(|n| n.to_string());

            extraction.prices.push(ExtractedPrice {
                price,
                currency,
                in_stock,
                availability,
                seller,
            });
        }
        _ => {}
    }
}

fn is_type(value: &Value, type_name: &str) -> bool {
    match value.get("@type") {
        Some(Value::String(s)) => s == type_name,
        Some(Value::Array(items)) => items.iter().any(|i| i.as_str() == Some(type_name)),
        _ => false,
    }
}

/// schema.org 可用性URL映射为 (有货, 可用性说明)
fn availability_from_schema(availability: &str) -> (bool, Option<String>) {
    if availability.contains("PreOrder") {
        (true, Some("preorder".to_string()))
    } else if availability.contains("BackOrder") {
        (true, Some("backorder".to_string()))
    } else if availability.contains("OutOfStock") || availability.contains("SoldOut") {
        (false, Some("out_of_stock".to_string()))
    } else {
        (true, None)
    }
}

/// meta/microdata 价格提取
fn extract_meta_price(document: &Html) -> Option<ExtractedPrice> {
    for selector in META_PRICE_SELECTORS.iter() {
        for element in document.select(selector) {
            let raw = element
                .value()
                .attr("content")
                .map(|c| c.to_string())
                .unwrap_or_else(|| element.text().collect::<String>());
            if let Some(price) = parse_price_str(&raw) {
                return Some(ExtractedPrice {
                    price,
                    currency: extract_meta_currency(document),
                    in_stock: true,
                    availability: None,
                    seller: None,
                });
            }
        }
    }
    None
}

fn extract_meta_currency(document: &Html) -> Option<String> {
    for selector in META_CURRENCY_SELECTORS.iter() {
        if let Some(element) = document.select(selector).next() {
            let raw = element
                .value()
                .attr("content")
                .map(|c| c.to_string())
                .unwrap_or_else(|| element.text().collect::<String>());
            let raw = raw.trim();
            if !raw.is_empty() {
                return Some(raw.to_string());
            }
        }
    }
    None
}

/// 正文正则提取：有提示文本时优先取提示附近的价格
fn extract_price_pattern(text: &str, hints: Option<&str>) -> Option<ExtractedPrice> {
    let matches: Vec<(usize, f64)> = PRICE_PATTERN
        .captures_iter(text)
        .filter_map(|cap| {
            let m = cap.get(0)?;
            let price = parse_price_str(cap.get(1)?.as_str())?;
            Some((m.start(), price))
        })
        .collect();
    if matches.is_empty() {
        return None;
    }

    let chosen = hints
        .and_then(|h| {
            let hint = h.trim();
            if hint.is_empty() {
                return None;
            }
            let anchor = text.to_lowercase().find(&hint.to_lowercase())?;
            matches
                .iter()
                .min_by_key(|(pos, _)| pos.abs_diff(anchor))
                .copied()
        })
        .unwrap_or(matches[0]);

    Some(ExtractedPrice {
        price: chosen.1,
        currency: None,
        in_stock: true,
        availability: None,
        seller: None,
    })
}

fn extract_title(document: &Html) -> Option<String> {
    if let Some(og) = document.select(&OG_TITLE_SELECTOR).next() {
        if let Some(content) = og.value().attr("content") {
            let content = content.trim();
            if !content.is_empty() {
                return Some(content.to_string());
            }
        }
    }
    document
        .select(&TITLE_SELECTOR)
        .next()
        .map(|t| t.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty())
}

/// 页面可见文本（去掉script/style后的全文，空白折叠）
pub fn visible_text(html: &str) -> String {
    let cleaned = SCRIPT_STYLE_PATTERN.replace_all(html, " ");
    let document = Html::parse_document(&cleaned);
    let text: Vec<&str> = document
        .root_element()
        .text()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .collect();
    text.join(" ")
}

/// 价格字符串解析："$1,299.00" / "39.99" -> f64
pub fn parse_price_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|p| *p > 0.0),
        Value::String(s) => parse_price_str(s),
        _ => None,
    }
}

pub fn parse_price_str(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    cleaned.parse::<f64>().ok().filter(|p| *p > 0.0)
}

/// 从商品名/提示中识别包装数量（"24 x 375mL"、"6 pack"）
pub fn parse_pack_count(text: &str) -> Option<(f64, String)> {
    for (pattern, unit_type) in PACK_PATTERNS.iter() {
        if let Some(cap) = pattern.captures(text) {
            if let Ok(count) = cap[1].parse::<f64>() {
                return Some((count, unit_type.to_string()));
            }
        }
    }
    None
}

/// URL所属域名（去掉 www. 前缀）
pub fn domain_of(url: &str) -> Option<String> {
    let rest = url.split("//").nth(1)?;
    let host = rest.split('/').next()?;
    Some(host.trim_start_matches("www.").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const JSON_LD_PAGE: &str = r#"
        <html><head><title>Widget - Example Store</title>
        <script type="application/ld+json">
        {
            "@context": "https://schema.org",
            "@type": "Product",
            "name": "Widget Deluxe",
            "offers": {
                "@type": "Offer",
                "price": "39.99",
                "priceCurrency": "AUD",
                "availability": "https://schema.org/InStock",
                "seller": {"@type": "Organization", "name": "Example Store"}
            }
        }
        </script></head><body></body></html>
    "#;

    #[test]
    fn test_json_ld_offer_extraction() {
        let extraction = extract_from_html(JSON_LD_PAGE, None);
        assert_eq!(extraction.product_name.as_deref(), Some("Widget Deluxe"));
        assert_eq!(extraction.prices.len(), 1);
        let price = &extraction.prices[0];
        assert_eq!(price.price, 39.99);
        assert_eq!(price.currency.as_deref(), Some("AUD"));
        assert!(price.in_stock);
        assert_eq!(price.seller.as_deref(), Some("Example Store"));
    }

    #[test]
    fn test_json_ld_aggregate_offer_and_graph() {
        let html = r#"
            <script type="application/ld+json">
            {"@graph": [{
                "@type": "Product",
                "name": "Gadget",
                "offers": {
                    "@type": "AggregateOffer",
                    "lowPrice": "12.50",
                    "priceCurrency": "USD"
                }
            }]}
            </script>
        "#;
        let extraction = extract_from_html(html, None);
        assert_eq!(extraction.prices.len(), 1);
        assert_eq!(extraction.prices[0].price, 12.50);
    }

    #[test]
    fn test_out_of_stock_availability() {
        let html = r#"
            <script type="application/ld+json">
            {"@type": "Product", "name": "Sold Out Item", "offers": {
                "@type": "Offer", "price": 10,
                "availability": "https://schema.org/OutOfStock"
            }}
            </script>
        "#;
        let extraction = extract_from_html(html, None);
        assert!(!extraction.prices[0].in_stock);
        assert_eq!(
            extraction.prices[0].availability.as_deref(),
            Some("out_of_stock")
        );
    }

    #[test]
    fn test_meta_price_fallback() {
        let html = r#"
            <html><head>
            <meta itemprop="price" content="129.00">
            <meta itemprop="priceCurrency" content="AUD">
            </head><body>no structured data here</body></html>
        "#;
        let extraction = extract_from_html(html, None);
        assert_eq!(extraction.prices.len(), 1);
        assert_eq!(extraction.prices[0].price, 129.0);
        assert_eq!(extraction.prices[0].currency.as_deref(), Some("AUD"));
    }

    #[test]
    fn test_regex_fallback_with_hint_window() {
        let html = r#"
            <html><body>
            <div>RRP $99.95</div>
            <p>lots of unrelated text</p>
            <div>Member price $79.95 for members</div>
            </body></html>
        "#;
        let extraction = extract_from_html(html, Some("member price"));
        assert_eq!(extraction.prices.len(), 1);
        assert_eq!(extraction.prices[0].price, 79.95);

        // Without a hint the first price on the page wins.
        let extraction = extract_from_html(html, None);
        assert_eq!(extraction.prices[0].price, 99.95);
    }

    #[test]
    fn test_price_with_thousands_separator() {
        let extraction = extract_from_html("<body>Now $1,299.00 delivered</body>", None);
        assert_eq!(extraction.prices[0].price, 1299.0);
    }

    #[test]
    fn test_no_price_yields_empty_extraction() {
        let extraction = extract_from_html("<body>Out of stock, check back later</body>", None);
        assert!(extraction.prices.is_empty());
    }

    #[test]
    fn test_visible_text_strips_scripts() {
        let text = visible_text("<body><script>var x = '$5';</script>Real price $10</body>");
        assert!(!text.contains("$5"));
        assert!(text.contains("Real price $10"));
    }

    #[test]
    fn test_parse_pack_count() {
        assert_eq!(
            parse_pack_count("Cola 24 x 375mL cans"),
            Some((24.0, "unit".to_string()))
        );
        assert_eq!(
            parse_pack_count("Batteries 6 pack"),
            Some((6.0, "pack".to_string()))
        );
        assert_eq!(
            parse_pack_count("Pack of 12 socks"),
            Some((12.0, "pack".to_string()))
        );
        assert_eq!(parse_pack_count("single widget"), None);
    }

    #[test]
    fn test_parse_multi_buy() {
        assert_eq!(parse_multi_buy("Any 2 for $55 this week"), Some((2, 55.0)));
        assert_eq!(parse_multi_buy("1 for $30"), None);
        assert_eq!(parse_multi_buy("no deal here"), None);
    }

    #[test]
    fn test_domain_of() {
        assert_eq!(
            domain_of("https://www.shop.example.com/item/5"),
            Some("shop.example.com".to_string())
        );
        assert_eq!(domain_of("not a url"), None);
    }
}
