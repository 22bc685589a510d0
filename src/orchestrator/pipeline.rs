//! 发现流程编排器 - 编排层
//!
//! ## 职责
//!
//! 本模块是整个发现流程的入口，负责按清单逐商品调度和结果汇总。
//!
//! ## 核心功能
//!
//! 1. **批量调度**：按清单顺序逐个处理商品，商品间保持固定间隔压限流
//! 2. **进度上报**：商品开始前统一上报三阶段待处理事件，结束后上报商品完成事件
//! 3. **结果留痕**：每个商品处理完立即写入带版本号的运行记录
//! 4. **跨商品协调**：整批结束后用已选首位候选做一次协调微调
//! 5. **取消响应**：收到取消信号后不再开始新商品，已完成的结果照常返回
//!
//! ## 设计特点
//!
//! - **顺序处理**：商品之间串行，单个商品内部的页面抽取才并发
//! - **失败语义**：搜索失败和留痕失败对整批致命，抽取评分内部软失败
//! - **向下委托**：单商品细节全部交给 workflow::ItemFlow

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::infrastructure::{ModelCompletion, PageFetch, SearchProvider};
use crate::models::{
    build_trace, DiscoveryEvent, ItemRunResult, ProductCandidate, ProgressSink, ShoppingSpec,
    StepName, StepStatus,
};
use crate::services::{NewRun, RunStore, ScoringEngine};
use crate::workflow::{ItemCtx, ItemFlow};

/// 发现流程编排器
pub struct Pipeline {
    config: Config,
    flow: ItemFlow,
    scoring: ScoringEngine,
    store: Arc<dyn RunStore>,
    sink: Arc<dyn ProgressSink>,
    cancel: CancellationToken,
}

impl Pipeline {
    pub fn new(
        config: Config,
        provider: Arc<dyn SearchProvider>,
        llm: Arc<dyn ModelCompletion>,
        page_fetcher: Arc<dyn PageFetch>,
        store: Arc<dyn RunStore>,
        sink: Arc<dyn ProgressSink>,
    ) -> Self {
        let flow = ItemFlow::new(&config, provider, llm.clone(), page_fetcher);
        let scoring = ScoringEngine::new(llm, &config);

        Self {
            config,
            flow,
            scoring,
            store,
            sink,
            cancel: CancellationToken::new(),
        }
    }

    /// 挂上外部取消信号
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// 跑完整个购物清单的发现流程
    ///
    /// `max_items` 不传时用配置里的单次上限。返回每个已完成商品的结果，
    /// 协调微调已套用在返回值上。
    pub async fn run(
        &self,
        spec: &ShoppingSpec,
        max_items: Option<usize>,
    ) -> Result<Vec<ItemRunResult>> {
        let limit = max_items.unwrap_or(self.config.max_items_per_run);
        let items: Vec<_> = spec.items.iter().take(limit).collect();

        log_run_start(&spec.id, items.len(), spec.items.len());

        let mut results: Vec<ItemRunResult> = Vec::new();
        let mut top_picks: Vec<ProductCandidate> = Vec::new();

        for (index, item) in items.iter().enumerate() {
            if self.cancel.is_cancelled() {
                warn!(
                    "⚠️ 收到取消信号，停止后续商品处理（已完成 {} 个）",
                    results.len()
                );
                return Ok(results);
            }

            // 商品间固定间隔，压住搜索商的限流
            if index > 0 && self.config.search_spacing_ms > 0 {
                sleep(Duration::from_millis(self.config.search_spacing_ms)).await;
            }

            let ctx = ItemCtx::new(
                item.id.clone(),
                index + 1,
                item.name.clone(),
                item.budget_allocation,
            );
            info!("\n{}", "─".repeat(60));
            info!("📄 {} 开始处理: {}", ctx, item.name);

            // 三个阶段先统一置为待处理
            for step in [StepName::Search, StepName::Extract, StepName::Rank] {
                self.sink
                    .emit(DiscoveryEvent::step(&item.id, &item.name, step, StepStatus::Pending));
            }

            // 取消信号到来时就地丢弃商品内尚未完成的抓取与抽取
            let flow_result = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    warn!(
                        "⚠️ 收到取消信号，丢弃商品 {} 的进行中任务（已完成 {} 个）",
                        ctx.item_index,
                        results.len()
                    );
                    return Ok(results);
                }
                flow_result = self.flow.run(
                    item,
                    &ctx,
                    spec.delivery_deadline.as_ref(),
                    &top_picks,
                    self.sink.as_ref(),
                ) => flow_result,
            };

            let outcome = match flow_result {
                Ok(outcome) => outcome,
                Err(e) => {
                    let message = format!("{:#}", e);
                    error!("[商品 {}] ❌ 处理失败: {}", ctx.item_index, message);
                    self.sink.emit(DiscoveryEvent::Error { message });
                    return Err(e);
                }
            };

            // 原始命中和排好序的候选一起入库留痕
            let trace = build_trace(
                &outcome.query,
                outcome.hits.len(),
                outcome.extracted_count,
                outcome.ranked.len(),
            );
            let new_run = NewRun {
                item_id: item.id.clone(),
                query: outcome.query.clone(),
                hits: outcome.hits,
                ranked: outcome.ranked.clone(),
                trace,
            };
            let stored = match self.store.append_run(new_run).await {
                Ok(run) => run,
                Err(e) => {
                    let message = format!("保存商品 {} 运行记录失败: {}", item.id, e);
                    error!("❌ {}", message);
                    self.sink.emit(DiscoveryEvent::Error { message });
                    return Err(e.into());
                }
            };
            debug!(
                "[商品 {}] 💾 已保存第 {} 版运行记录",
                ctx.item_index, stored.version
            );

            if let Some(top) = outcome.ranked.first() {
                top_picks.push(top.clone());
            }

            let result = ItemRunResult {
                item_id: item.id.clone(),
                item_name: item.name.clone(),
                candidates: outcome.ranked,
                query: outcome.query,
            };
            self.sink.emit(DiscoveryEvent::item_complete(&result));
            results.push(result);
        }

        // ========== 跨商品协调 ==========
        // 只微调返回值，已入库的运行记录保持评分原值
        if !results.is_empty() {
            info!("\n🤝 整批完成，开始跨商品协调微调");
            self.scoring.coherence_pass(&mut results).await;
        }

        self.sink.emit(DiscoveryEvent::Done);

        let stats = RunStats::from_results(&results);
        print_final_stats(&stats);

        Ok(results)
    }
}

/// 单次运行统计
#[derive(Debug, Default)]
struct RunStats {
    items: usize,
    with_candidates: usize,
    candidates_total: usize,
}

impl RunStats {
    fn from_results(results: &[ItemRunResult]) -> Self {
        Self {
            items: results.len(),
            with_candidates: results
                .iter()
                .filter(|r| !r.candidates.is_empty())
                .count(),
            candidates_total: results.iter().map(|r| r.candidates.len()).sum(),
        }
    }
}

// ========== 日志辅助函数 ==========

fn log_run_start(spec_id: &str, selected: usize, total: usize) {
    info!("\n{}", "=".repeat(60));
    info!("🚀 开始发现流程 - 购物清单 {}", spec_id);
    info!("📋 本次处理 {}/{} 个商品", selected, total);
    info!("{}", "=".repeat(60));
}

fn print_final_stats(stats: &RunStats) {
    info!("\n{}", "=".repeat(60));
    info!("📊 发现流程完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("✅ 商品: {}/{} 个找到候选", stats.with_candidates, stats.items);
    info!("📦 候选总数: {}", stats.candidates_total);
    info!("{}", "=".repeat(60));
}
