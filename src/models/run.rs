//! 运行记录数据模型
//!
//! 每个商品的一次流水线执行对应一条 ItemRun，带单调递增的版本号，
//! 历史记录只追加不修改

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::candidate::{ProductCandidate, SearchHit};

/// 单个商品的一次运行记录（持久化单位）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemRun {
    pub id: String,
    pub item_id: String,
    /// 同一商品内从 1 开始递增
    pub version: i64,
    pub query: String,
    pub hits: Vec<SearchHit>,
    pub ranked: Vec<ProductCandidate>,
    pub trace: String,
    pub created_at: DateTime<Utc>,
}

/// 单个商品的流水线产出（进入批次结果与完成事件）
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemRunResult {
    pub item_id: String,
    pub item_name: String,
    pub candidates: Vec<ProductCandidate>,
    pub query: String,
}

/// 拼运行轨迹摘要（英文短句，与记录一起展示）
pub fn build_trace(query: &str, hit_count: usize, extracted_count: usize, ranked_count: usize) -> String {
    format!(
        "Searched for \"{}\", found {} results, extracted {} candidates, ranked top {}",
        query, hit_count, extracted_count, ranked_count
    )
}
