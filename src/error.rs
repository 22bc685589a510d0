//! 错误类型定义
//!
//! 能力层边界使用强类型错误（重试 / 中止逻辑需要匹配具体变体），
//! 流程层和编排层统一使用 `anyhow::Result` 向上传播。

use thiserror::Error;

/// 搜索能力错误
///
/// 限流变体会被搜索服务的重试逻辑单独匹配，其余变体直接向上抛出。
#[derive(Debug, Error)]
pub enum SearchError {
    /// 请求频率限制
    #[error("搜索接口限流, 建议等待: {retry_after:?} 秒")]
    RateLimited { retry_after: Option<u64> },

    /// 网络请求失败
    #[error("搜索请求失败 ({endpoint}): {source}")]
    RequestFailed {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    /// 接口返回异常状态码
    #[error("搜索接口返回异常状态 ({endpoint}): {status}")]
    BadStatus { endpoint: String, status: u16 },

    /// 响应解析失败
    #[error("搜索响应解析失败: {0}")]
    ParseFailed(String),
}

/// LLM 能力错误
#[derive(Debug, Error)]
pub enum LlmError {
    /// API 调用失败
    #[error("LLM API调用失败 (模型: {model}): {source}")]
    ApiCallFailed {
        model: String,
        #[source]
        source: async_openai::error::OpenAIError,
    },

    /// 请求构建失败
    #[error("LLM 请求构建失败: {0}")]
    RequestBuildFailed(String),

    /// 返回内容为空
    #[error("LLM返回内容为空 (模型: {model})")]
    EmptyContent { model: String },
}

/// 运行记录存储错误
///
/// 存储失败属于批次级致命错误，编排层收到后会中止剩余商品。
#[derive(Debug, Error)]
pub enum StoreError {
    /// 数据库操作失败
    #[error("运行记录数据库操作失败: {0}")]
    Database(#[from] rusqlite::Error),

    /// 序列化失败
    #[error("运行记录序列化失败: {0}")]
    Serialize(#[from] serde_json::Error),

    /// 时间戳解析失败
    #[error("运行记录时间戳解析失败: {0}")]
    Timestamp(#[from] chrono::ParseError),
}
