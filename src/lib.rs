//! # Shopping Discovery
//!
//! 一个按购物清单自动发现、抽取并排序商品候选的 Rust 应用程序
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 对接外部世界，只暴露能力
//! - `TavilySearchClient` - 多零售商搜索 API 能力（SearchProvider）
//! - `OpenAiCompletion` - 模型补全能力（ModelCompletion）
//! - `PageFetcher` - 商品页抓取能力（PageFetch）
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，只处理单个商品
//! - `ProductSearch` - 构造查询、补充检索、域名多样性选链
//! - `retailer_classifier` - 零售商域名表与 URL 形态分类
//! - `CandidateExtractor` - 结构化 / 启发式 / 模型三层抽取
//! - `catalog_service` - 列表页展开出商品链接
//! - `ScoringEngine` - 四维评分、排序、推荐理由与跨商品协调
//! - `RunStore` - 带版本号的运行记录留痕
//! - `Reoptimizer` - 基于历史记录的换购建议
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一个商品"的完整处理流程
//! - `ItemCtx` - 上下文封装（item_id + item_index + 预算）
//! - `ItemFlow` - 流程编排（search → extract → rank）
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/pipeline` - 发现流程编排器，逐商品调度、留痕、协调、上报进度
//!
//! ## 模块结构

pub mod config;
pub mod error;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::Config;
pub use error::{LlmError, SearchError, StoreError};
pub use infrastructure::{
    ModelCompletion, OpenAiCompletion, PageFetch, PageFetcher, SearchProvider, TavilySearchClient,
};
pub use models::{
    load_toml_to_spec, DiscoveryEvent, ItemRunResult, LineItem, ProductCandidate, ProgressSink,
    ShoppingSpec,
};
pub use orchestrator::Pipeline;
pub use services::{MemoryRunStore, RunStore, SqliteRunStore};
pub use workflow::{ItemCtx, ItemFlow, ItemOutcome};
