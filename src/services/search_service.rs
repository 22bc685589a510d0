//! 商品搜索服务 - 业务能力层
//!
//! 只负责"搜索"能力，不关心流程

use anyhow::{Context, Result};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::infrastructure::search_api::{SearchDepth, SearchProvider, SearchRequest};
use crate::models::candidate::SearchHit;
use crate::models::spec::LineItem;
use crate::services::retailer_classifier::{domain_of, RETAILER_ALLOWLIST};

/// 首轮检索返回条数上限
const PRIMARY_MAX_RESULTS: usize = 10;
/// 补查返回条数上限
const SUPPLEMENTARY_MAX_RESULTS: usize = 6;
/// 低于该零售商数触发补查
const MIN_DISTINCT_RETAILERS: usize = 3;
/// 补查定向域名上限
const SUPPLEMENTARY_DOMAIN_CAP: usize = 3;

/// 商品搜索服务
///
/// 职责：
/// - 把商品条目拼成检索查询
/// - 首轮白名单检索 + 零售商多样性补查
/// - 限流时等待后重试一次
/// - 只处理单个商品的搜索
/// - 不关心流程顺序
pub struct ProductSearch {
    provider: Arc<dyn SearchProvider>,
    default_backoff_secs: u64,
}

impl ProductSearch {
    /// 创建新的搜索服务
    pub fn new(provider: Arc<dyn SearchProvider>) -> Self {
        Self {
            provider,
            default_backoff_secs: 2,
        }
    }

    /// 把商品条目拼成检索查询
    ///
    /// 有关键词用关键词，否则用商品名，再追加首个品牌、首个颜色和尺码
    pub fn build_query(item: &LineItem) -> String {
        let mut parts = Vec::new();

        if item.constraints.keywords.is_empty() {
            parts.push(item.name.clone());
        } else {
            parts.push(item.constraints.keywords.join(" "));
        }

        if let Some(brand) = item.constraints.brand.first() {
            parts.push(brand.clone());
        }
        if let Some(color) = item.constraints.color.first() {
            parts.push(color.clone());
        }
        if let Some(size) = &item.constraints.size {
            parts.push(format!("size {}", size));
        }

        parts.join(" ")
    }

    /// 搜索单个商品
    ///
    /// # 返回
    /// 返回 (实际查询串, 去重后的结果列表)
    pub async fn search_item(&self, item: &LineItem) -> Result<(String, Vec<SearchHit>)> {
        let query = Self::build_query(item);
        debug!("🔍 商品检索: \"{}\"", query);

        let primary_request = SearchRequest {
            query: query.clone(),
            depth: SearchDepth::Advanced,
            include_domains: RETAILER_ALLOWLIST.iter().map(|d| d.to_string()).collect(),
            max_results: PRIMARY_MAX_RESULTS,
            want_raw_content: true,
        };

        let mut hits = self
            .search_with_retry(&primary_request)
            .await
            .with_context(|| format!("商品检索失败: {}", item.name))?;

        // 零售商多样性检查，不足时向缺席零售商定向补查
        let retailers = Self::distinct_retailers(&hits);
        if retailers.len() < MIN_DISTINCT_RETAILERS && !hits.is_empty() {
            debug!("零售商多样性不足 ({} 家)，发起补查", retailers.len());

            let missing: Vec<String> = RETAILER_ALLOWLIST
                .iter()
                .filter(|d| !retailers.contains(**d))
                .take(SUPPLEMENTARY_DOMAIN_CAP)
                .map(|d| d.to_string())
                .collect();

            let supplementary_request = SearchRequest {
                query: format!("{} buy online", item.name),
                depth: SearchDepth::Basic,
                include_domains: missing,
                max_results: SUPPLEMENTARY_MAX_RESULTS,
                want_raw_content: true,
            };

            // 补查失败不影响主结果
            match self.search_with_retry(&supplementary_request).await {
                Ok(extra) => {
                    debug!("补查返回 {} 条结果", extra.len());
                    hits.extend(extra);
                }
                Err(e) => {
                    warn!("多样性补查失败: {}", e);
                }
            }
        }

        Ok((query, dedup_by_url(hits)))
    }

    /// 带限流重试的检索调用
    ///
    /// 只对限流错误重试，且只重试一次
    async fn search_with_retry(
        &self,
        request: &SearchRequest,
    ) -> Result<Vec<SearchHit>, crate::error::SearchError> {
        match self.provider.search(request).await {
            Err(crate::error::SearchError::RateLimited { retry_after }) => {
                let wait_secs = retry_after.unwrap_or(self.default_backoff_secs);
                warn!("检索被限流，等待 {} 秒后重试一次...", wait_secs);
                sleep(Duration::from_secs(wait_secs)).await;
                self.provider.search(request).await
            }
            other => other,
        }
    }

    /// 结果中出现的零售商域名集合
    fn distinct_retailers(hits: &[SearchHit]) -> HashSet<String> {
        hits.iter().filter_map(|hit| domain_of(&hit.url)).collect()
    }
}

/// 从结果里挑出零售商尽量分散的前 max 条
///
/// 第一轮每个域名只占一个名额，第二轮按原始顺序补满
pub fn select_diverse(hits: &[SearchHit], max: usize) -> Vec<SearchHit> {
    let mut selected: Vec<usize> = Vec::new();
    let mut seen_domains: HashSet<String> = HashSet::new();

    for (index, hit) in hits.iter().enumerate() {
        if selected.len() >= max {
            break;
        }
        let domain = domain_of(&hit.url).unwrap_or_default();
        if seen_domains.insert(domain) {
            selected.push(index);
        }
    }

    for index in 0..hits.len() {
        if selected.len() >= max {
            break;
        }
        if !selected.contains(&index) {
            selected.push(index);
        }
    }

    selected.into_iter().map(|i| hits[i].clone()).collect()
}

/// 按 URL 去重，保留首次出现的结果
pub fn dedup_by_url(hits: Vec<SearchHit>) -> Vec<SearchHit> {
    let mut seen = HashSet::new();
    hits.into_iter()
        .filter(|hit| seen.insert(hit.url.clone()))
        .collect()
}
