//! 商品抽取服务 - 业务能力层
//!
//! 把单个页面变成一个商品候选，分三层逐级退化：
//! 结构化数据 → 文本启发式 → 模型兜底，先成功先得
//!
//! 成功标准始终是"标题非空且价格为正"，抽取失败只缩小候选池，
//! 从不让整个商品失败

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use serde::{Deserialize, Deserializer};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::infrastructure::llm::{CompletionRequest, ModelCompletion};
use crate::models::candidate::{ProductCandidate, ScoreSet};
use crate::models::spec::LineItem;
use crate::services::retailer_classifier::{display_name, domain_of, looks_like_catalog};

/// 送入模型的页面内容字符预算
const CONTENT_CHAR_BUDGET: usize = 15000;

/// 启发式价格选择器，按优先级排列
const PRICE_SELECTOR_STRINGS: [&str; 7] = [
    "[data-price]",
    ".price",
    ".product-price",
    "#price",
    ".a-price .a-offscreen",
    "[itemprop=\"price\"]",
    ".price-current",
];

static PRICE_TEXT: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\d,]+\.?\d*").unwrap());
static MARKDOWN_HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^#{1,6}\s+(.+)$").unwrap());
static MARKDOWN_PRICE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\s*([\d,]+(?:\.\d{1,2})?)").unwrap());

/// 抽取层之间流转的中间结果，也是模型输出的 JSON 形状
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExtractedOffer {
    pub title: Option<String>,
    #[serde(deserialize_with = "price_number_or_string")]
    pub price: Option<f64>,
    pub currency: Option<String>,
    pub delivery_estimate: Option<String>,
    pub delivery_days: Option<u32>,
    pub variants: Vec<String>,
    pub image_url: Option<String>,
    pub in_stock: Option<bool>,
}

impl ExtractedOffer {
    /// 标题非空且价格为正才算可用
    fn is_usable(&self) -> bool {
        let has_title = self
            .title
            .as_deref()
            .map_or(false, |t| !t.trim().is_empty());
        let has_price = self.price.map_or(false, |p| p > 0.0);
        has_title && has_price
    }
}

/// 模型偶尔把价格写成字符串，数字和数字串都收
fn price_number_or_string<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<JsonValue>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(parse_price_value))
}

/// 商品抽取服务
///
/// 职责：
/// - 从 HTML 页面做结构化/启发式/模型三层抽取
/// - 从 markdown 正文做启发式/模型两层抽取
/// - 填零售商展示名并把评分初始化为零
/// - 只处理单个页面，不关心流程顺序
pub struct CandidateExtractor {
    llm: Arc<dyn ModelCompletion>,
    model_name: String,
}

impl CandidateExtractor {
    /// 创建新的抽取服务
    pub fn new(llm: Arc<dyn ModelCompletion>, config: &Config) -> Self {
        Self {
            llm,
            model_name: config.extract_model_name.clone(),
        }
    }

    /// 从 markdown 正文抽取商品候选
    pub async fn extract_from_markdown(
        &self,
        markdown: &str,
        url: &str,
        item: &LineItem,
    ) -> Option<ProductCandidate> {
        let offer = match extract_heuristic_markdown(markdown) {
            Some(offer) if offer.is_usable() => Some(offer),
            _ => self.extract_with_model(markdown, url, item, false).await,
        };

        self.finalize(offer?, url)
    }

    /// 从 HTML 页面抽取商品候选
    pub async fn extract_from_html(
        &self,
        html: &str,
        url: &str,
        item: &LineItem,
    ) -> Option<ProductCandidate> {
        let offer = match extract_structured(html) {
            Some(offer) if offer.is_usable() => Some(offer),
            _ => match extract_heuristic_html(html) {
                Some(offer) if offer.is_usable() => Some(offer),
                _ => self.extract_with_model(html, url, item, true).await,
            },
        };

        self.finalize(offer?, url)
    }

    /// 模型兜底抽取
    ///
    /// 页面截断到固定字符预算，模型被要求对列表页返回失败形状
    async fn extract_with_model(
        &self,
        content: &str,
        url: &str,
        item: &LineItem,
        is_html: bool,
    ) -> Option<ExtractedOffer> {
        let content_kind = if is_html { "HTML" } else { "markdown" };
        let truncated = truncate_chars(content, CONTENT_CHAR_BUDGET);

        let system = format!(
            "Extract product information from this {} page content. \
             Return JSON with: title (string), price (number or null), currency (string), \
             deliveryEstimate (string or null), deliveryDays (number or null), \
             variants (string[]), imageUrl (string or null), inStock (boolean). \
             The product should be a single product related to: \"{}\". \
             If the page contains multiple products (a listing/search page) or no clear \
             single product, return {{\"title\":\"\",\"price\":null}} to indicate failure.",
            content_kind, item.name
        );
        let user = format!(
            "URL: {}\n\nPage content ({}):\n{}",
            url,
            content_kind.to_lowercase(),
            truncated
        );

        let request = CompletionRequest::json(&self.model_name, &system, &user);

        let reply = match self.llm.complete(&request).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!("模型抽取调用失败 {}: {}", url, e);
                return None;
            }
        };

        match serde_json::from_str::<ExtractedOffer>(strip_code_fences(&reply)) {
            Ok(offer) => Some(offer),
            Err(e) => {
                warn!("模型抽取结果不是合法 JSON {}: {}", url, e);
                None
            }
        }
    }

    /// 把可用的抽取结果定型为商品候选
    fn finalize(&self, offer: ExtractedOffer, url: &str) -> Option<ProductCandidate> {
        if !offer.is_usable() {
            debug!("抽取结果不可用，丢弃: {}", url);
            return None;
        }

        let title = offer.title.unwrap_or_default().trim().to_string();
        let price = offer.price.unwrap_or_default();
        let domain = domain_of(url).unwrap_or_default();

        Some(ProductCandidate {
            id: Uuid::new_v4().to_string(),
            title,
            price,
            currency: offer.currency.unwrap_or_else(|| "USD".to_string()),
            url: url.to_string(),
            retailer_name: display_name(&domain),
            retailer_domain: domain,
            delivery_estimate: offer.delivery_estimate,
            delivery_days: offer.delivery_days,
            variants: offer.variants,
            image_url: offer.image_url,
            in_stock: offer.in_stock.unwrap_or(true),
            scores: ScoreSet::zero(),
            explanation: String::new(),
        })
    }
}

// ========== 第一层: 结构化数据 ==========

/// 从 JSON-LD 找商品节点
fn extract_structured(html: &str) -> Option<ExtractedOffer> {
    let document = Html::parse_document(html);
    let selector = Selector::parse(r#"script[type="application/ld+json"]"#).ok()?;

    for element in document.select(&selector) {
        let text = element.text().collect::<String>();
        let Ok(data) = serde_json::from_str::<JsonValue>(&text) else {
            continue;
        };
        if let Some(product) = find_product_node(&data) {
            if let Some(offer) = offer_from_product_node(product) {
                return Some(offer);
            }
        }
    }

    None
}

fn is_product_node(data: &JsonValue) -> bool {
    match data.get("@type") {
        Some(JsonValue::String(t)) => t == "Product",
        Some(JsonValue::Array(types)) => types.iter().any(|t| t.as_str() == Some("Product")),
        _ => false,
    }
}

/// 顶层对象、数组和 @graph 里都可能藏着商品节点
fn find_product_node(data: &JsonValue) -> Option<&JsonValue> {
    match data {
        JsonValue::Array(items) => items.iter().find(|d| is_product_node(d)),
        JsonValue::Object(map) => {
            if is_product_node(data) {
                Some(data)
            } else if let Some(graph) = map.get("@graph").and_then(|g| g.as_array()) {
                graph.iter().find(|d| is_product_node(d))
            } else {
                None
            }
        }
        _ => None,
    }
}

fn offer_from_product_node(product: &JsonValue) -> Option<ExtractedOffer> {
    let title = product.get("name").and_then(|v| v.as_str())?.trim();

    let offers = product.get("offers").or_else(|| product.get("offer"))?;
    let offer_node = if let Some(array) = offers.as_array() {
        array.first()?
    } else {
        offers
    };

    let price = offer_node
        .get("price")
        .or_else(|| offer_node.get("lowPrice"))
        .and_then(parse_price_value)?;

    let currency = offer_node
        .get("priceCurrency")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());

    let image = match product.get("image") {
        Some(JsonValue::String(s)) => Some(s.clone()),
        Some(JsonValue::Array(items)) => items.first().and_then(|v| v.as_str()).map(String::from),
        _ => None,
    };

    let in_stock = offer_node
        .get("availability")
        .and_then(|v| v.as_str())
        .map(|a| !a.contains("OutOfStock"));

    Some(ExtractedOffer {
        title: Some(title.to_string()),
        price: Some(price),
        currency,
        image_url: image,
        in_stock,
        ..Default::default()
    })
}

/// JSON-LD 里的价格可能是数字也可能是字符串
fn parse_price_value(value: &JsonValue) -> Option<f64> {
    match value {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::String(s) => {
            let cleaned = s.trim().trim_start_matches('$').replace(',', "");
            cleaned.parse::<f64>().ok()
        }
        _ => None,
    }
}

// ========== 第二层: 文本启发式 ==========

fn meta_content(document: &Html, selector_str: &str) -> Option<String> {
    let selector = Selector::parse(selector_str).ok()?;
    document
        .select(&selector)
        .next()
        .and_then(|el| el.value().attr("content"))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn first_text(document: &Html, selector_str: &str) -> Option<String> {
    let selector = Selector::parse(selector_str).ok()?;
    document
        .select(&selector)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
}

/// HTML 启发式：OG 元信息 + 已知价格选择器
fn extract_heuristic_html(html: &str) -> Option<ExtractedOffer> {
    let document = Html::parse_document(html);

    let title = meta_content(&document, r#"meta[property="og:title"]"#)
        .or_else(|| meta_content(&document, r#"meta[name="title"]"#))
        .or_else(|| first_text(&document, "h1"))
        .or_else(|| first_text(&document, "title"))?;

    let mut price = None;
    for selector_str in PRICE_SELECTOR_STRINGS {
        let Ok(selector) = Selector::parse(selector_str) else {
            continue;
        };
        if let Some(element) = document.select(&selector).next() {
            let text = element
                .value()
                .attr("content")
                .or_else(|| element.value().attr("data-price"))
                .map(|s| s.to_string())
                .unwrap_or_else(|| element.text().collect::<String>());
            if let Some(parsed) = parse_price_text(&text) {
                price = Some(parsed);
                break;
            }
        }
    }

    let image = meta_content(&document, r#"meta[property="og:image"]"#);

    Some(ExtractedOffer {
        title: Some(title),
        price,
        image_url: image,
        ..Default::default()
    })
}

/// markdown 启发式：首个标题行 + 首个美元价格
///
/// 正文带列表页信号时直接放弃，交给模型去判定单品与否
fn extract_heuristic_markdown(markdown: &str) -> Option<ExtractedOffer> {
    if looks_like_catalog(markdown) {
        return None;
    }

    let title = MARKDOWN_HEADING
        .captures(markdown)
        .map(|cap| cap[1].trim().to_string())
        .filter(|t| !t.is_empty())?;

    let price = MARKDOWN_PRICE
        .captures(markdown)
        .and_then(|cap| cap[1].replace(',', "").parse::<f64>().ok());

    Some(ExtractedOffer {
        title: Some(title),
        price,
        ..Default::default()
    })
}

fn parse_price_text(text: &str) -> Option<f64> {
    let matched = PRICE_TEXT.find(text)?;
    let cleaned = matched.as_str().replace(',', "");
    cleaned.parse::<f64>().ok()
}

// ========== 辅助 ==========

/// 按字符数截断（不切开多字节字符）
fn truncate_chars(content: &str, budget: usize) -> &str {
    match content.char_indices().nth(budget) {
        Some((byte_index, _)) => &content[..byte_index],
        None => content,
    }
}

/// 去掉模型回复外层的代码围栏
pub(crate) fn strip_code_fences(reply: &str) -> &str {
    let trimmed = reply.trim();
    let trimmed = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    trimmed.strip_suffix("```").unwrap_or(trimmed).trim()
}
