//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责整个发现流程的调度，是系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `pipeline` - 发现流程编排器
//! - 按清单顺序逐商品调度（商品间带固定间隔）
//! - 统一上报进度事件（待处理 / 商品完成 / 整批完成 / 错误）
//! - 每个商品处理完立即写入带版本号的运行记录
//! - 整批结束后做一次跨商品协调微调
//! - 响应外部取消信号
//!
//! ## 层次关系
//!
//! ```text
//! pipeline (处理 Vec<LineItem>)
//!     ↓
//! workflow::ItemFlow (处理单个 LineItem)
//!     ↓
//! services (能力层：search / extract / scoring / run_store)
//!     ↓
//! infrastructure (基础设施：SearchProvider / ModelCompletion / PageFetch)
//! ```
//!
//! ## 设计原则
//!
//! 1. **单一职责**：只做调度、留痕和统计，不做具体业务判断
//! 2. **向下依赖**：编排层 → workflow → services → infrastructure
//! 3. **能力注入**：搜索、模型、抓取、存储全部以 trait 对象注入，便于替换

pub mod pipeline;

// 重新导出主要类型
pub use pipeline::Pipeline;
