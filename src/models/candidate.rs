//! 商品候选数据模型
//!
//! 搜索结果、候选商品与四维评分在抽取与排序阶段之间流转，
//! 序列化字段名与运行记录中的 JSON 保持一致（camelCase）

use serde::{Deserialize, Serialize};

/// 检索服务返回的单条结果
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    /// 结果摘要片段
    #[serde(default)]
    pub content: String,
    /// 检索端的相关度分
    #[serde(default)]
    pub score: f64,
    /// 页面正文（markdown），检索端可能不返回
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_content: Option<String>,
}

/// 四维评分与加权总分
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreSet {
    pub cost: f64,
    pub delivery: f64,
    pub preference: f64,
    pub coherence: f64,
    pub total: f64,
}

/// 各维度的固定权重
pub const WEIGHT_COST: f64 = 0.30;
pub const WEIGHT_DELIVERY: f64 = 0.25;
pub const WEIGHT_PREFERENCE: f64 = 0.30;
pub const WEIGHT_COHERENCE: f64 = 0.15;

impl ScoreSet {
    /// 全部维度置零（抽取阶段的初始值）
    pub fn zero() -> Self {
        Self {
            cost: 0.0,
            delivery: 0.0,
            preference: 0.0,
            coherence: 0.0,
            total: 0.0,
        }
    }

    /// 按固定权重重算总分
    pub fn recompute_total(&mut self) {
        self.total = WEIGHT_COST * self.cost
            + WEIGHT_DELIVERY * self.delivery
            + WEIGHT_PREFERENCE * self.preference
            + WEIGHT_COHERENCE * self.coherence;
    }
}

impl Default for ScoreSet {
    fn default() -> Self {
        Self::zero()
    }
}

/// 抽取成功的商品候选
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductCandidate {
    pub id: String,
    pub title: String,
    pub price: f64,
    pub currency: String,
    pub url: String,
    pub retailer_name: String,
    pub retailer_domain: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery_estimate: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery_days: Option<u32>,
    #[serde(default)]
    pub variants: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub in_stock: bool,
    pub scores: ScoreSet,
    #[serde(default)]
    pub explanation: String,
}
