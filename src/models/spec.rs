//! 购物需求单数据模型
//!
//! 需求单由外部的对话摄入阶段产生，流水线只读消费

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 购物需求单
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShoppingSpec {
    pub id: String,
    /// 总预算（美元）
    pub budget: f64,
    /// 期望送达时间，RFC3339 字符串
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery_deadline: Option<DateTime<Utc>>,
    pub items: Vec<LineItem>,
    #[serde(skip_serializing, skip_deserializing)]
    pub file_path: Option<String>,
}

/// 需求单中的单个商品条目
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItem {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub constraints: ItemConstraints,
    /// 分配给该商品的预算（美元）
    pub budget_allocation: f64,
    /// 已锁定的商品不参与重新优化建议
    #[serde(default)]
    pub locked: bool,
}

/// 商品约束集合
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ItemConstraints {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default)]
    pub brand: Vec<String>,
    #[serde(default)]
    pub color: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    #[serde(default)]
    pub must_haves: Vec<String>,
    #[serde(default)]
    pub nice_to_haves: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl ShoppingSpec {
    pub fn with_file_path(mut self, file_path: String) -> Self {
        self.file_path = Some(file_path);
        self
    }
}
