//! 购物车重新优化 - 业务能力层
//!
//! 购物车超出总预算时，从各商品最新一次运行记录里找更便宜的替代，
//! 只读持久化结果，不重新跑流水线

use anyhow::{Context, Result};
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

use crate::models::candidate::ProductCandidate;
use crate::models::spec::ShoppingSpec;
use crate::services::run_store::RunStore;

/// 购物车里的一个已选商品
#[derive(Debug, Clone)]
pub struct CartEntry {
    pub item_id: String,
    pub candidate: ProductCandidate,
    /// 锁定的条目不参与换货建议
    pub locked: bool,
}

/// 一条换货建议
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapSuggestion {
    pub item_id: String,
    pub current_price: f64,
    #[serde(rename = "suggestedCandidate")]
    pub suggested: ProductCandidate,
}

/// 重新优化服务
///
/// 职责：
/// - 盘点购物车总价与需求单预算的差额
/// - 超支时按价格从高到低给未锁定条目找更便宜的已排序候选
/// - 只消费 `latest_run`，不触发任何搜索或抽取
pub struct Reoptimizer {
    store: Arc<dyn RunStore>,
}

impl Reoptimizer {
    pub fn new(store: Arc<dyn RunStore>) -> Self {
        Self { store }
    }

    /// 给超支的购物车找平替
    ///
    /// # 返回
    /// 预算内返回空列表；超支时每个有更便宜候选的未锁定条目出一条建议
    pub async fn suggest_cheaper_swaps(
        &self,
        spec: &ShoppingSpec,
        entries: &[CartEntry],
    ) -> Result<Vec<SwapSuggestion>> {
        let total_cost: f64 = entries.iter().map(|e| e.candidate.price).sum();
        let budget_remaining = spec.budget - total_cost;

        if budget_remaining >= 0.0 {
            debug!("购物车在预算内 (剩余 {:.2})，无需换货", budget_remaining);
            return Ok(Vec::new());
        }

        debug!("购物车超支 {:.2}，开始找平替", -budget_remaining);

        // 贵的先换，省得最多
        let mut unlocked: Vec<&CartEntry> = entries.iter().filter(|e| !e.locked).collect();
        unlocked.sort_by(|a, b| {
            b.candidate
                .price
                .partial_cmp(&a.candidate.price)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut suggestions = Vec::new();

        for entry in unlocked {
            let latest = self
                .store
                .latest_run(&entry.item_id)
                .await
                .with_context(|| format!("读取商品 {} 最新运行记录失败", entry.item_id))?;

            let Some(run) = latest else {
                continue;
            };

            let cheaper = run.ranked.into_iter().find(|candidate| {
                candidate.price < entry.candidate.price && candidate.id != entry.candidate.id
            });

            if let Some(suggested) = cheaper {
                suggestions.push(SwapSuggestion {
                    item_id: entry.item_id.clone(),
                    current_price: entry.candidate.price,
                    suggested,
                });
            }
        }

        Ok(suggestions)
    }
}
