//! 进度事件数据模型
//!
//! 流水线边跑边向消费端（SSE、日志）推送事件，发出即忘，
//! 消费端掉线不影响流水线本身

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;
use tracing::info;

use super::run::ItemRunResult;

/// 商品处理的三个阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepName {
    Search,
    Extract,
    Rank,
}

/// 阶段状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    InProgress,
    Complete,
    Error,
}

/// 流水线进度事件（序列化形状即对外线格式）
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum DiscoveryEvent {
    ItemStep {
        #[serde(rename = "itemId")]
        item_id: String,
        #[serde(rename = "itemName")]
        item_name: String,
        step: StepName,
        status: StepStatus,
    },
    ItemComplete {
        #[serde(rename = "itemId")]
        item_id: String,
        #[serde(rename = "itemName")]
        item_name: String,
        candidates: Vec<crate::models::candidate::ProductCandidate>,
        query: String,
    },
    Done,
    Error { message: String },
}

impl DiscoveryEvent {
    pub fn step(item_id: &str, item_name: &str, step: StepName, status: StepStatus) -> Self {
        Self::ItemStep {
            item_id: item_id.to_string(),
            item_name: item_name.to_string(),
            step,
            status,
        }
    }

    pub fn item_complete(result: &ItemRunResult) -> Self {
        Self::ItemComplete {
            item_id: result.item_id.clone(),
            item_name: result.item_name.clone(),
            candidates: result.candidates.clone(),
            query: result.query.clone(),
        }
    }
}

/// 进度事件的消费端
///
/// 实现方不得阻塞也不得返回错误，事件丢了就丢了
pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: DiscoveryEvent);
}

/// 把事件打进 tracing 日志
pub struct LogSink;

impl ProgressSink for LogSink {
    fn emit(&self, event: DiscoveryEvent) {
        match serde_json::to_string(&event) {
            Ok(json) => info!("📤 进度事件: {}", json),
            Err(e) => info!("📤 进度事件序列化失败: {}", e),
        }
    }
}

/// 把事件转发到 tokio channel（SSE 等流式消费端）
pub struct ChannelSink {
    tx: UnboundedSender<DiscoveryEvent>,
}

impl ChannelSink {
    pub fn new(tx: UnboundedSender<DiscoveryEvent>) -> Self {
        Self { tx }
    }
}

impl ProgressSink for ChannelSink {
    fn emit(&self, event: DiscoveryEvent) {
        // 接收端关闭时静默丢弃
        let _ = self.tx.send(event);
    }
}

/// 丢弃全部事件
pub struct NullSink;

impl ProgressSink for NullSink {
    fn emit(&self, _event: DiscoveryEvent) {}
}
