//! 零售商 URL 分类 - 业务能力层
//!
//! 职责：
//! - 维护白名单零售商的 URL 形态规则表
//! - 把 URL 分成商品页 / 列表页 / 未知三类
//! - 从正文内容识别"看起来像列表页"的信号
//! - 不发网络请求，不关心流程顺序
//!
//! 规则表按域名精确命中（去掉 www. 前缀），正则作用于完整 URL 字符串

use once_cell::sync::Lazy;
use phf::phf_map;
use regex::Regex;
use std::collections::HashMap;
use url::Url;

/// URL 类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlKind {
    /// 单商品详情页
    Product,
    /// 搜索/分类列表页
    Catalog,
    /// 规则表未覆盖
    Unknown,
}

/// 支持的零售商域名白名单
pub const RETAILER_ALLOWLIST: [&str; 12] = [
    "amazon.com",
    "walmart.com",
    "nike.com",
    "nordstrom.com",
    "macys.com",
    "dickssportinggoods.com",
    "rei.com",
    "target.com",
    "zappos.com",
    "bestbuy.com",
    "adidas.com",
    "underarmour.com",
];

/// 零售商展示名
static RETAILER_DISPLAY_NAMES: phf::Map<&'static str, &'static str> = phf_map! {
    "amazon.com" => "Amazon",
    "walmart.com" => "Walmart",
    "nike.com" => "Nike",
    "nordstrom.com" => "Nordstrom",
    "macys.com" => "Macy's",
    "dickssportinggoods.com" => "Dick's Sporting Goods",
    "rei.com" => "REI",
    "target.com" => "Target",
    "zappos.com" => "Zappos",
    "bestbuy.com" => "Best Buy",
    "adidas.com" => "Adidas",
    "underarmour.com" => "Under Armour",
};

fn compile_patterns(patterns: &[&str]) -> Vec<Regex> {
    patterns.iter().map(|p| Regex::new(p).unwrap()).collect()
}

/// 各零售商的商品详情页 URL 形态
static PRODUCT_URL_PATTERNS: Lazy<HashMap<&'static str, Vec<Regex>>> = Lazy::new(|| {
    [
        ("amazon.com", vec![r"/dp/", r"/gp/product/"]),
        ("walmart.com", vec![r"/ip/"]),
        ("nike.com", vec![r"/t/"]),
        ("nordstrom.com", vec![r"/s/"]),
        ("macys.com", vec![r"/product/"]),
        ("dickssportinggoods.com", vec![r"/p/"]),
        ("rei.com", vec![r"/product/"]),
        ("target.com", vec![r"/p/"]),
        ("zappos.com", vec![r"/p/"]),
        ("bestbuy.com", vec![r"/site/[^/]+/\d+\.p"]),
        ("adidas.com", vec![r"/[A-Z0-9]{6,}\.html"]),
        ("underarmour.com", vec![r"/p/"]),
    ]
    .into_iter()
    .map(|(domain, patterns)| (domain, compile_patterns(&patterns)))
    .collect()
});

/// 各零售商的搜索/分类列表页 URL 形态
static CATALOG_URL_PATTERNS: Lazy<HashMap<&'static str, Vec<Regex>>> = Lazy::new(|| {
    [
        ("amazon.com", vec![r"/s\?", r"/s/"]),
        ("walmart.com", vec![r"/search", r"/browse/"]),
        ("nike.com", vec![r"/w/"]),
        ("nordstrom.com", vec![r"/sr\?", r"/c/"]),
        ("macys.com", vec![r"/shop/"]),
        ("dickssportinggoods.com", vec![r"/c/"]),
        ("rei.com", vec![r"/c/", r"/search"]),
        ("target.com", vec![r"/s\?", r"/c/"]),
        ("zappos.com", vec![r"/search", r"/filters/"]),
        ("bestbuy.com", vec![r"/searchpage", r"/site/searchpage"]),
        ("adidas.com", vec![r"/search", r"/[a-z-]+$"]),
        ("underarmour.com", vec![r"/c/"]),
    ]
    .into_iter()
    .map(|(domain, patterns)| (domain, compile_patterns(&patterns)))
    .collect()
});

/// 列表页正文信号
static CATALOG_CONTENT_SIGNALS: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile_patterns(&[
        r"(?i)search results",
        r"(?i)showing \d+ results",
        r"(?i)\d+ items? found",
        r"(?i)sort by",
        r"(?i)filter by",
        r"(?i)refine your search",
    ])
});

// ========== URL 分类 ==========

/// 提取 URL 的域名（去掉 www. 前缀）
pub fn domain_of(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    Some(host.strip_prefix("www.").unwrap_or(host).to_string())
}

/// 按规则表对 URL 分类
///
/// 商品形态优先于列表形态，域名不在规则表或 URL 不可解析时返回 Unknown
pub fn classify_url(url: &str) -> UrlKind {
    let domain = match domain_of(url) {
        Some(d) => d,
        None => return UrlKind::Unknown,
    };

    if let Some(patterns) = PRODUCT_URL_PATTERNS.get(domain.as_str()) {
        if patterns.iter().any(|p| p.is_match(url)) {
            return UrlKind::Product;
        }
    }

    if let Some(patterns) = CATALOG_URL_PATTERNS.get(domain.as_str()) {
        if patterns.iter().any(|p| p.is_match(url)) {
            return UrlKind::Catalog;
        }
    }

    UrlKind::Unknown
}

/// 从正文内容判断是否像列表页（至少命中两个信号）
pub fn looks_like_catalog(content: &str) -> bool {
    let matched = CATALOG_CONTENT_SIGNALS
        .iter()
        .filter(|p| p.is_match(content))
        .count();
    matched >= 2
}

/// URL 路径的非空段数量
pub fn path_depth(url: &str) -> usize {
    Url::parse(url)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .map(|segments| segments.filter(|s| !s.is_empty()).count())
        })
        .unwrap_or(0)
}

/// 域名对应的零售商展示名
///
/// 白名单外的域名取第一个 DNS 标签并首字母大写
pub fn display_name(domain: &str) -> String {
    if let Some(name) = RETAILER_DISPLAY_NAMES.get(domain) {
        return (*name).to_string();
    }

    let label = domain.split('.').next().unwrap_or(domain);
    let mut chars = label.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_product_urls() {
        assert_eq!(
            classify_url("https://www.amazon.com/dp/B0ABCDEF12"),
            UrlKind::Product
        );
        assert_eq!(
            classify_url("https://www.amazon.com/gp/product/B0ABCDEF12"),
            UrlKind::Product
        );
        assert_eq!(
            classify_url("https://www.walmart.com/ip/nike-pegasus/123456"),
            UrlKind::Product
        );
        assert_eq!(
            classify_url("https://www.nike.com/t/pegasus-41-mens-road-running-shoes"),
            UrlKind::Product
        );
        assert_eq!(
            classify_url("https://www.bestbuy.com/site/sony-wh-1000xm5/6505727.p?skuId=6505727"),
            UrlKind::Product
        );
        assert_eq!(
            classify_url("https://www.adidas.com/us/ultraboost-light-shoes/GY9351.html"),
            UrlKind::Product
        );
    }

    #[test]
    fn test_classify_catalog_urls() {
        assert_eq!(
            classify_url("https://www.amazon.com/s?k=running+shoes"),
            UrlKind::Catalog
        );
        assert_eq!(
            classify_url("https://www.walmart.com/search?q=running+shoes"),
            UrlKind::Catalog
        );
        assert_eq!(
            classify_url("https://www.nike.com/w/mens-running-shoes"),
            UrlKind::Catalog
        );
        assert_eq!(
            classify_url("https://www.target.com/c/running-shoes"),
            UrlKind::Catalog
        );
        assert_eq!(
            classify_url("https://www.adidas.com/us/men-shoes"),
            UrlKind::Catalog
        );
    }

    #[test]
    fn test_product_pattern_wins_over_catalog() {
        // nordstrom 的 /s/ 是商品形态，/sr? 才是列表形态
        assert_eq!(
            classify_url("https://www.nordstrom.com/s/nike-pegasus-41/7890123"),
            UrlKind::Product
        );
        assert_eq!(
            classify_url("https://www.nordstrom.com/sr?keyword=running+shoes"),
            UrlKind::Catalog
        );
    }

    #[test]
    fn test_classify_unknown() {
        assert_eq!(
            classify_url("https://www.amazon.com/stores/page/ABC"),
            UrlKind::Unknown
        );
        assert_eq!(
            classify_url("https://www.shopgoodwill.com/item/12345"),
            UrlKind::Unknown
        );
        assert_eq!(classify_url("not a url"), UrlKind::Unknown);
    }

    #[test]
    fn test_classify_is_deterministic() {
        let url = "https://www.rei.com/product/176814/salomon-x-ultra-4";
        assert_eq!(classify_url(url), classify_url(url));
        assert_eq!(classify_url(url), UrlKind::Product);
    }

    #[test]
    fn test_domain_of_strips_www() {
        assert_eq!(
            domain_of("https://www.nike.com/t/pegasus").as_deref(),
            Some("nike.com")
        );
        assert_eq!(
            domain_of("https://nike.com/t/pegasus").as_deref(),
            Some("nike.com")
        );
        assert!(domain_of("::не-url::").is_none());
    }

    #[test]
    fn test_display_name_known_and_fallback() {
        assert_eq!(display_name("macys.com"), "Macy's");
        assert_eq!(display_name("dickssportinggoods.com"), "Dick's Sporting Goods");
        assert_eq!(display_name("bestbuy.com"), "Best Buy");
        assert_eq!(display_name("shopgoodwill.com"), "Shopgoodwill");
    }

    #[test]
    fn test_looks_like_catalog_needs_two_signals() {
        let two_signals = "Showing 48 results for running shoes. Sort by price.";
        assert!(looks_like_catalog(two_signals));

        let one_signal = "Sort by: featured";
        assert!(!looks_like_catalog(one_signal));

        let product_page = "Nike Pegasus 41. Add to cart. $139.99";
        assert!(!looks_like_catalog(product_page));
    }

    #[test]
    fn test_path_depth() {
        assert_eq!(path_depth("https://www.nike.com/"), 0);
        assert_eq!(path_depth("https://www.nike.com/t/"), 1);
        assert_eq!(path_depth("https://www.nike.com/t/pegasus-41"), 2);
        assert_eq!(path_depth("not a url"), 0);
    }

    #[test]
    fn test_allowlist_covers_all_pattern_tables() {
        for domain in RETAILER_ALLOWLIST {
            assert!(PRODUCT_URL_PATTERNS.contains_key(domain), "{}", domain);
            assert!(CATALOG_URL_PATTERNS.contains_key(domain), "{}", domain);
            assert!(RETAILER_DISPLAY_NAMES.contains_key(domain), "{}", domain);
        }
    }
}
