//! 商品处理上下文
//!
//! 封装单个商品处理过程中贯穿各流程的标识信息

use std::fmt;

/// 商品处理上下文
#[derive(Debug, Clone)]
pub struct ItemCtx {
    /// 商品 ID
    pub item_id: String,
    /// 商品序号（批次内第几个，从 1 开始，用于日志）
    pub item_index: usize,
    /// 商品名称
    pub item_name: String,
    /// 该商品的预算分配（美元）
    pub budget_allocation: f64,
}

impl ItemCtx {
    /// 创建新的商品处理上下文
    pub fn new(item_id: String, item_index: usize, item_name: String, budget_allocation: f64) -> Self {
        Self {
            item_id,
            item_index,
            item_name,
            budget_allocation,
        }
    }
}

impl fmt::Display for ItemCtx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[商品 #{} ID#{} 预算 ${:.2}]",
            self.item_index, self.item_id, self.budget_allocation
        )
    }
}
