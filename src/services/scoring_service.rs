//! 商品评分服务 - 业务能力层
//!
//! 四个维度各自独立打分再按固定权重合成总分：
//! 成本、送达走确定性公式，偏好、协调走一次批量模型调用
//!
//! 模型调用失败永远不致命，缺失的维度一律取 0.5 中性分

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::Config;
use crate::infrastructure::llm::{CompletionRequest, ModelCompletion};
use crate::models::candidate::ProductCandidate;
use crate::models::run::ItemRunResult;
use crate::models::spec::LineItem;
use crate::services::extract_service::strip_code_fences;

/// 每个商品保留的排序结果条数
const TOP_CANDIDATES: usize = 3;

/// 维度缺失时的中性分
const NEUTRAL_SCORE: f64 = 0.5;

const SCORING_SYSTEM_PROMPT: &str = "You are scoring product candidates for a shopper. \
For each candidate, assign:\n\
- preference: 0-1 score for how well it matches the user's stated preferences\n\
- coherence: 0-1 score for how well it fits with the other items they're buying\n\n\
Return JSON: { \"scores\": [{ \"candidateId\": \"...\", \"preference\": 0.X, \"coherence\": 0.X }] }";

const COHERENCE_SYSTEM_PROMPT: &str = "You are evaluating a set of shopping items for \
coherence (do they go well together?). For each item, provide an adjusted coherence \
score 0-1. Penalize clashing styles, colors, or mismatched formality levels. \
Return JSON: { \"adjustments\": [{ \"candidateId\": \"...\", \"coherence\": 0.X }] }";

const EXPLAIN_SYSTEM_PROMPT: &str = "Generate a concise 1-2 sentence explanation for why \
this product ranks where it does. Reference specific scores. Be specific and helpful.";

// ========== 确定性公式 ==========

pub fn clamp01(value: f64) -> f64 {
    value.clamp(0.0, 1.0)
}

/// 成本分：相对单品预算的剩余比例
///
/// 预算非正时无从比较，给中性分
pub fn cost_score(price: f64, allocation: f64) -> f64 {
    if allocation <= 0.0 {
        return NEUTRAL_SCORE;
    }
    clamp01(1.0 - price / allocation)
}

/// 送达分
///
/// 送达天数未知给 0.5，没有截止时间给 0.8，赶得上截止给满分，
/// 迟到按每 5 天清零的斜率衰减
pub fn delivery_score(delivery_days: Option<u32>, deadline_days: Option<i64>) -> f64 {
    let Some(days) = delivery_days else {
        return 0.5;
    };
    let Some(deadline) = deadline_days else {
        return 0.8;
    };

    let days = days as i64;
    if days <= deadline {
        1.0
    } else {
        (1.0 - (days - deadline) as f64 / 5.0).max(0.0)
    }
}

/// 距截止时间的天数，不足一天向上取整
pub fn days_until(deadline: &DateTime<Utc>, now: &DateTime<Utc>) -> i64 {
    let diff_ms = deadline.signed_duration_since(*now).num_milliseconds();
    (diff_ms as f64 / 86_400_000.0).ceil() as i64
}

// ========== 模型响应结构 ==========

#[derive(Debug, Deserialize)]
struct ScoreReply {
    #[serde(default)]
    scores: Vec<ScoreEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScoreEntry {
    candidate_id: String,
    preference: Option<f64>,
    coherence: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct AdjustmentReply {
    #[serde(default)]
    adjustments: Vec<AdjustmentEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AdjustmentEntry {
    candidate_id: String,
    coherence: Option<f64>,
}

/// 商品评分服务
///
/// 职责：
/// - 给单个商品的候选打四维分并排出前三
/// - 给前三名生成解释文案
/// - 跨商品协调检查（只动 coherence 分，不动排序）
/// - 不关心流程顺序
pub struct ScoringEngine {
    llm: Arc<dyn ModelCompletion>,
    model_name: String,
}

impl ScoringEngine {
    /// 创建新的评分服务
    pub fn new(llm: Arc<dyn ModelCompletion>, config: &Config) -> Self {
        Self {
            llm,
            model_name: config.ranking_model_name.clone(),
        }
    }

    /// 给候选打分并排出前三名
    ///
    /// # 参数
    /// - `item`: 商品条目
    /// - `candidates`: 抽取出的候选
    /// - `deadline`: 整单送达截止时间
    /// - `other_top_picks`: 此前商品已选中的首位候选，给协调维度当上下文
    ///
    /// # 返回
    /// 按总分稳定降序的前三名，解释已填好
    pub async fn rank(
        &self,
        item: &LineItem,
        candidates: Vec<ProductCandidate>,
        deadline: Option<&DateTime<Utc>>,
        other_top_picks: &[ProductCandidate],
    ) -> Vec<ProductCandidate> {
        if candidates.is_empty() {
            return Vec::new();
        }

        debug!(
            "📊 开始评分: {} 个候选, 商品预算 {}",
            candidates.len(),
            item.budget_allocation
        );

        let llm_scores = self.score_with_model(item, &candidates, other_top_picks).await;
        let deadline_days = deadline.map(|d| days_until(d, &Utc::now()));

        let mut scored: Vec<ProductCandidate> = candidates
            .into_iter()
            .map(|mut candidate| {
                let (preference, coherence) = llm_scores
                    .get(&candidate.id)
                    .copied()
                    .unwrap_or((NEUTRAL_SCORE, NEUTRAL_SCORE));

                candidate.scores.cost = cost_score(candidate.price, item.budget_allocation);
                candidate.scores.delivery = delivery_score(candidate.delivery_days, deadline_days);
                candidate.scores.preference = preference;
                candidate.scores.coherence = coherence;
                candidate.scores.recompute_total();
                candidate
            })
            .collect();

        // 稳定排序，总分相同保持原始顺序
        scored.sort_by(|a, b| {
            b.scores
                .total
                .partial_cmp(&a.scores.total)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(TOP_CANDIDATES);

        // 只给留下来的前三名生成解释
        for candidate in scored.iter_mut() {
            candidate.explanation = self.explain(item, candidate).await;
        }

        scored
    }

    /// 跨商品协调检查
    ///
    /// 只在有至少两个首位候选时发一次批量调用，
    /// 覆盖各首位候选的 coherence 分并重算总分，不重排
    pub async fn coherence_pass(&self, results: &mut [ItemRunResult]) {
        let picks: Vec<(String, ProductCandidate)> = results
            .iter()
            .filter_map(|r| {
                r.candidates
                    .first()
                    .map(|c| (r.item_name.clone(), c.clone()))
            })
            .collect();

        if picks.len() < 2 {
            debug!("首位候选不足两个，跳过协调检查");
            return;
        }

        debug!("🔗 跨商品协调检查: {} 个首位候选", picks.len());

        let mut user = String::from("Selected items:\n");
        for (item_name, candidate) in &picks {
            user.push_str(&format!(
                "- {}: {} ({}) from {}, Variants: {}\n",
                item_name,
                candidate.title,
                candidate.price,
                candidate.retailer_name,
                candidate.variants.join(", ")
            ));
        }

        let request = CompletionRequest::json(&self.model_name, COHERENCE_SYSTEM_PROMPT, &user);

        let adjustments: HashMap<String, f64> = match self.llm.complete(&request).await {
            Ok(reply) => match serde_json::from_str::<AdjustmentReply>(strip_code_fences(&reply)) {
                Ok(parsed) => parsed
                    .adjustments
                    .into_iter()
                    .filter_map(|entry| entry.coherence.map(|c| (entry.candidate_id, clamp01(c))))
                    .collect(),
                Err(e) => {
                    warn!("协调检查结果解析失败，保持原分: {}", e);
                    return;
                }
            },
            Err(e) => {
                warn!("协调检查调用失败，保持原分: {}", e);
                return;
            }
        };

        for result in results.iter_mut() {
            if let Some(top) = result.candidates.first_mut() {
                if let Some(adjusted) = adjustments.get(&top.id) {
                    top.scores.coherence = *adjusted;
                    top.scores.recompute_total();
                }
            }
        }
    }

    /// 批量模型打分，按候选 ID 回填
    ///
    /// 调用或解析失败返回空表，上层查不到就取中性分
    async fn score_with_model(
        &self,
        item: &LineItem,
        candidates: &[ProductCandidate],
        other_top_picks: &[ProductCandidate],
    ) -> HashMap<String, (f64, f64)> {
        let constraints_json = serde_json::to_string(&item.constraints).unwrap_or_default();

        let mut user = format!("Item: {}\nConstraints: {}\n\nCandidates:\n", item.name, constraints_json);
        for candidate in candidates {
            user.push_str(&format!(
                "- ID: {}, Title: {}, Price: {}, Retailer: {}, Variants: {}\n",
                candidate.id,
                candidate.title,
                candidate.price,
                candidate.retailer_name,
                candidate.variants.join(", ")
            ));
        }

        user.push_str("\nOther items the shopper has already selected:\n");
        if other_top_picks.is_empty() {
            user.push_str("No other items selected yet.\n");
        } else {
            for pick in other_top_picks {
                user.push_str(&format!(
                    "- {} ({}) from {}\n",
                    pick.title, pick.price, pick.retailer_name
                ));
            }
        }

        let request = CompletionRequest::json(&self.model_name, SCORING_SYSTEM_PROMPT, &user);

        match self.llm.complete(&request).await {
            Ok(reply) => match serde_json::from_str::<ScoreReply>(strip_code_fences(&reply)) {
                Ok(parsed) => parsed
                    .scores
                    .into_iter()
                    .map(|entry| {
                        (
                            entry.candidate_id,
                            (
                                clamp01(entry.preference.unwrap_or(NEUTRAL_SCORE)),
                                clamp01(entry.coherence.unwrap_or(NEUTRAL_SCORE)),
                            ),
                        )
                    })
                    .collect(),
                Err(e) => {
                    warn!("打分结果解析失败，全部取中性分: {}", e);
                    HashMap::new()
                }
            },
            Err(e) => {
                warn!("打分调用失败，全部取中性分: {}", e);
                HashMap::new()
            }
        }
    }

    /// 给单个候选生成排名解释
    ///
    /// 失败时留空串，不影响排序结果
    async fn explain(&self, item: &LineItem, candidate: &ProductCandidate) -> String {
        let user = format!(
            "Item: {}\nProduct: {} ({}) from {}\nScores - Cost: {:.2}, Delivery: {:.2}, Preference: {:.2}, Coherence: {:.2}, Total: {:.2}",
            item.name,
            candidate.title,
            candidate.price,
            candidate.retailer_name,
            candidate.scores.cost,
            candidate.scores.delivery,
            candidate.scores.preference,
            candidate.scores.coherence,
            candidate.scores.total,
        );

        let request =
            CompletionRequest::chat(&self.model_name, EXPLAIN_SYSTEM_PROMPT, &user).with_max_tokens(150);

        match self.llm.complete(&request).await {
            Ok(text) => text,
            Err(e) => {
                warn!("解释生成失败: {}", e);
                String::new()
            }
        }
    }
}
