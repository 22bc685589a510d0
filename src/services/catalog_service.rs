//! 列表页展开服务 - 业务能力层
//!
//! 从搜索/分类列表页的链接结构里挖出少量同域商品链接，
//! 每页最多 3 条，跨页聚合上限由流程层控制

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use std::collections::HashSet;
use tracing::debug;
use url::Url;

use crate::services::retailer_classifier::{classify_url, domain_of, path_depth, UrlKind};

/// 每个列表页最多展开的链接数
const MAX_LINKS_PER_PAGE: usize = 3;

/// markdown 链接语法 [标题](地址)
static MARKDOWN_LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[([^\]]+)\]\((https?://[^)]+)\)").unwrap());

/// 从列表页展开的一条商品链接
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogLink {
    pub url: String,
    pub title: String,
}

/// 从列表页内容展开同域商品链接
///
/// 只收商品形态的链接；未知形态的链接要求路径至少两段，
/// 目标本身是列表页的一律跳过
pub fn links_from_catalog(content: &str, source_url: &str) -> Vec<CatalogLink> {
    let source_domain = domain_of(source_url).unwrap_or_default();

    let raw_links = collect_raw_links(content, source_url);

    let mut links = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    for (title, url) in raw_links {
        if !seen.insert(url.clone()) {
            continue;
        }
        if domain_of(&url).unwrap_or_default() != source_domain {
            continue;
        }

        match classify_url(&url) {
            UrlKind::Catalog => continue,
            UrlKind::Product => {}
            UrlKind::Unknown => {
                if path_depth(&url) < 2 {
                    continue;
                }
            }
        }

        links.push(CatalogLink { url, title });
        if links.len() >= MAX_LINKS_PER_PAGE {
            break;
        }
    }

    debug!("列表页 {} 展开 {} 条商品链接", source_url, links.len());
    links
}

/// 收集页面里的 (标题, 地址) 对
///
/// markdown 链接优先，正文没有 markdown 链接但含 HTML 锚点时
/// 退回 HTML 解析，相对地址按来源页补全
fn collect_raw_links(content: &str, source_url: &str) -> Vec<(String, String)> {
    let mut pairs: Vec<(String, String)> = MARKDOWN_LINK
        .captures_iter(content)
        .map(|cap| (cap[1].to_string(), cap[2].to_string()))
        .collect();

    if pairs.is_empty() && content.contains("<a ") {
        if let (Ok(base), Ok(anchor_selector)) = (Url::parse(source_url), Selector::parse("a[href]")) {
            let document = Html::parse_document(content);
            for element in document.select(&anchor_selector) {
                let Some(href) = element.value().attr("href") else {
                    continue;
                };
                let Ok(resolved) = base.join(href) else {
                    continue;
                };
                let title = element.text().collect::<String>().trim().to_string();
                if title.is_empty() {
                    continue;
                }
                pairs.push((title, resolved.to_string()));
            }
        }
    }

    pairs
}
