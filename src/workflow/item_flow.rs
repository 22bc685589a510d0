//! 商品处理流程 - 流程层
//!
//! ## 核心职责
//! - 串起单个商品的完整发现链路：搜索 → 选链分类 → 抽取 → 评分
//! - 每个阶段向进度接收器上报状态事件
//! - 单个页面失败只丢掉该候选，不中断整个商品
//!
//! ## 流程顺序
//! 1. 多零售商搜索（主查询 + 必要时补充查询）
//! 2. 按域名多样性选取链接，并按 URL 形态分类
//! 3. 商品页直接抽取（并发），未知形态页按内容信号转列表页
//! 4. 列表页展开出商品链接后二次抽取（并发）
//! 5. 评分、排序并为入选者生成推荐理由

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use tracing::{debug, info};

use crate::config::Config;
use crate::infrastructure::{ModelCompletion, PageFetch, SearchProvider};
use crate::models::{
    DiscoveryEvent, LineItem, ProductCandidate, ProgressSink, SearchHit, StepName, StepStatus,
};
use crate::services::retailer_classifier::{classify_url, looks_like_catalog, UrlKind};
use crate::services::search_service::select_diverse;
use crate::services::{links_from_catalog, CandidateExtractor, ProductSearch, ScoringEngine};
use crate::utils::logging::truncate_text;
use crate::workflow::item_ctx::ItemCtx;

/// 单商品最多直接抽取的链接数
const MAX_URLS_PER_ITEM: usize = 5;

/// 列表页展开后最多追加抽取的链接数（跨所有列表页合计）
const MAX_CATALOG_URLS: usize = 6;

/// 单个商品跑完全流程后的产出
#[derive(Debug)]
pub struct ItemOutcome {
    /// 实际使用的主搜索查询
    pub query: String,
    /// 去重后的全部搜索结果
    pub hits: Vec<SearchHit>,
    /// 成功抽取出的候选数
    pub extracted_count: usize,
    /// 评分排序后的最终推荐
    pub ranked: Vec<ProductCandidate>,
}

/// 直接抽取单个链接的结局
enum DirectOutcome {
    /// 抽出了一个候选商品
    Candidate(ProductCandidate),
    /// 页面实为列表页，转入展开阶段
    CatalogPage { url: String, content: String },
    /// 无法利用
    Nothing,
}

/// 商品处理流程
pub struct ItemFlow {
    product_search: ProductSearch,
    page_fetcher: Arc<dyn PageFetch>,
    extractor: CandidateExtractor,
    scoring: ScoringEngine,
    verbose_logging: bool,
}

impl ItemFlow {
    pub fn new(
        config: &Config,
        provider: Arc<dyn SearchProvider>,
        llm: Arc<dyn ModelCompletion>,
        page_fetcher: Arc<dyn PageFetch>,
    ) -> Self {
        Self {
            product_search: ProductSearch::new(provider),
            page_fetcher,
            extractor: CandidateExtractor::new(llm.clone(), config),
            scoring: ScoringEngine::new(llm, config),
            verbose_logging: config.verbose_logging,
        }
    }

    /// 处理单个商品
    ///
    /// 搜索失败对整批是致命的，向上传播；抽取与评分阶段内部软失败。
    pub async fn run(
        &self,
        item: &LineItem,
        ctx: &ItemCtx,
        deadline: Option<&DateTime<Utc>>,
        other_top_picks: &[ProductCandidate],
        sink: &dyn ProgressSink,
    ) -> Result<ItemOutcome> {
        // ========== 流程 1: 多零售商搜索 ==========
        info!("[商品 {}] 🔍 开始搜索: {}", ctx.item_index, ctx.item_name);
        emit_step(sink, ctx, StepName::Search, StepStatus::InProgress);

        let (query, hits) = match self.product_search.search_item(item).await {
            Ok(result) => result,
            Err(e) => {
                emit_step(sink, ctx, StepName::Search, StepStatus::Error);
                return Err(e);
            }
        };

        emit_step(sink, ctx, StepName::Search, StepStatus::Complete);
        info!(
            "[商品 {}] ✓ 搜索完成，共 {} 条结果",
            ctx.item_index,
            hits.len()
        );
        self.log_hits(ctx, &hits);

        // ========== 流程 2: 选取链接并按形态分类 ==========
        let selected = select_diverse(&hits, MAX_URLS_PER_ITEM);

        let mut direct_hits: Vec<SearchHit> = Vec::new();
        let mut catalog_hits: Vec<SearchHit> = Vec::new();
        for hit in selected {
            match classify_url(&hit.url) {
                UrlKind::Catalog => catalog_hits.push(hit),
                UrlKind::Product | UrlKind::Unknown => direct_hits.push(hit),
            }
        }
        debug!(
            "[商品 {}] 选取 {} 个直连链接、{} 个列表页",
            ctx.item_index,
            direct_hits.len(),
            catalog_hits.len()
        );

        // ========== 流程 3: 商品页直接抽取 ==========
        emit_step(sink, ctx, StepName::Extract, StepStatus::InProgress);

        // 直连链接先占座，列表页展开不再重复抽同一 URL
        let mut seen_urls: HashSet<String> =
            direct_hits.iter().map(|hit| hit.url.clone()).collect();

        let direct_outcomes = join_all(
            direct_hits
                .into_iter()
                .map(|hit| self.extract_direct(hit, item)),
        )
        .await;

        let mut candidates: Vec<ProductCandidate> = Vec::new();
        let mut catalog_pages: Vec<(String, String)> = Vec::new();
        for outcome in direct_outcomes {
            match outcome {
                DirectOutcome::Candidate(candidate) => candidates.push(candidate),
                DirectOutcome::CatalogPage { url, content } => {
                    info!(
                        "[商品 {}] ⚠️ 未知形态页面实为列表页，转入展开: {}",
                        ctx.item_index, url
                    );
                    catalog_pages.push((url, content));
                }
                DirectOutcome::Nothing => {}
            }
        }

        // ========== 流程 4: 列表页展开 ==========
        for hit in catalog_hits {
            let content = match hit.raw_content {
                Some(raw) if !raw.is_empty() => Some(raw),
                _ => self.page_fetcher.fetch(&hit.url).await,
            };
            if let Some(content) = content {
                catalog_pages.push((hit.url, content));
            }
        }

        let mut catalog_links = Vec::new();
        for (url, content) in &catalog_pages {
            for link in links_from_catalog(content, url) {
                if seen_urls.insert(link.url.clone()) {
                    catalog_links.push(link);
                }
            }
        }
        catalog_links.truncate(MAX_CATALOG_URLS);

        if !catalog_links.is_empty() {
            info!(
                "[商品 {}] 📦 从 {} 个列表页展开出 {} 个追加链接",
                ctx.item_index,
                catalog_pages.len(),
                catalog_links.len()
            );

            let expanded = join_all(catalog_links.into_iter().map(|link| async move {
                let html = self.page_fetcher.fetch(&link.url).await?;
                self.extractor.extract_from_html(&html, &link.url, item).await
            }))
            .await;
            candidates.extend(expanded.into_iter().flatten());
        }

        emit_step(sink, ctx, StepName::Extract, StepStatus::Complete);
        info!(
            "[商品 {}] ✓ 抽取完成，得到 {} 个候选",
            ctx.item_index,
            candidates.len()
        );

        // ========== 流程 5: 评分排序 ==========
        emit_step(sink, ctx, StepName::Rank, StepStatus::InProgress);

        let extracted_count = candidates.len();
        let ranked = self
            .scoring
            .rank(item, candidates, deadline, other_top_picks)
            .await;

        emit_step(sink, ctx, StepName::Rank, StepStatus::Complete);
        info!(
            "[商品 {}] ✅ 评分完成，保留 {} 个推荐",
            ctx.item_index,
            ranked.len()
        );
        self.log_ranked(ctx, &ranked);

        Ok(ItemOutcome {
            query,
            hits,
            extracted_count,
            ranked,
        })
    }

    // ========== 私有辅助方法 ==========

    /// 对单个直连链接做抽取
    ///
    /// 优先用搜索自带的页面正文（markdown），缺失时现场抓取 HTML。
    /// 抽取失败的未知形态页面若带列表页信号，降级为列表页待展开。
    async fn extract_direct(&self, hit: SearchHit, item: &LineItem) -> DirectOutcome {
        let url = hit.url;

        let (content, is_html) = match hit.raw_content {
            Some(raw) if !raw.is_empty() => (raw, false),
            _ => match self.page_fetcher.fetch(&url).await {
                Some(html) => (html, true),
                None => return DirectOutcome::Nothing,
            },
        };

        let candidate = if is_html {
            self.extractor.extract_from_html(&content, &url, item).await
        } else {
            self.extractor
                .extract_from_markdown(&content, &url, item)
                .await
        };

        if let Some(candidate) = candidate {
            return DirectOutcome::Candidate(candidate);
        }

        if classify_url(&url) == UrlKind::Unknown && looks_like_catalog(&content) {
            return DirectOutcome::CatalogPage { url, content };
        }

        DirectOutcome::Nothing
    }

    // ========== 日志辅助方法 ==========

    /// verbose 模式下打印前几条搜索结果
    fn log_hits(&self, ctx: &ItemCtx, hits: &[SearchHit]) {
        if !self.verbose_logging {
            return;
        }
        for hit in hits.iter().take(3) {
            info!(
                "[商品 {}]   · {} ({})",
                ctx.item_index,
                truncate_text(&hit.title, 60),
                hit.url
            );
        }
    }

    /// 打印最终推荐清单
    fn log_ranked(&self, ctx: &ItemCtx, ranked: &[ProductCandidate]) {
        for (rank, candidate) in ranked.iter().enumerate() {
            info!(
                "[商品 {}]   {}. {} ${:.2} @ {} (总分 {:.2})",
                ctx.item_index,
                rank + 1,
                truncate_text(&candidate.title, 60),
                candidate.price,
                candidate.retailer_name,
                candidate.scores.total
            );
        }
    }
}

/// 上报单步状态事件
fn emit_step(sink: &dyn ProgressSink, ctx: &ItemCtx, step: StepName, status: StepStatus) {
    sink.emit(DiscoveryEvent::step(&ctx.item_id, &ctx.item_name, step, status));
}
