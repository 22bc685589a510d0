//! LLM 补全客户端 - 基础设施层
//!
//! 只负责"发请求拿回复"，不关心提示词内容
//!
//! ## 技术栈
//! - 使用 `async-openai` crate 进行 API 调用
//! - 支持自定义 API 端点和模型
//! - 兼容 OpenAI API 的服务（如 Azure, Gemini, Doubao 等）
//! - JSON 模式下走 `response_format: json_object`

use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs, ResponseFormat,
    },
    Client,
};
use async_trait::async_trait;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::LlmError;

/// 一次补全调用的全部参数
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub model: String,
    pub system: String,
    pub user: String,
    /// 要求模型输出 JSON 对象
    pub json_mode: bool,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl CompletionRequest {
    /// JSON 模式请求（默认 temperature 0.3 / max_tokens 4096）
    pub fn json(model: &str, system: &str, user: &str) -> Self {
        Self {
            model: model.to_string(),
            system: system.to_string(),
            user: user.to_string(),
            json_mode: true,
            temperature: None,
            max_tokens: None,
        }
    }

    /// 普通文本请求（默认 temperature 0.7 / max_tokens 2048）
    pub fn chat(model: &str, system: &str, user: &str) -> Self {
        Self {
            model: model.to_string(),
            system: system.to_string(),
            user: user.to_string(),
            json_mode: false,
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// 该请求实际生效的 temperature
    pub fn effective_temperature(&self) -> f32 {
        self.temperature
            .unwrap_or(if self.json_mode { 0.3 } else { 0.7 })
    }

    /// 该请求实际生效的 max_tokens
    pub fn effective_max_tokens(&self) -> u32 {
        self.max_tokens
            .unwrap_or(if self.json_mode { 4096 } else { 2048 })
    }
}

/// 模型补全能力
///
/// 抽取与排序服务只依赖这个 trait，测试里用假实现替换
#[async_trait]
pub trait ModelCompletion: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError>;
}

/// OpenAI 兼容端点的补全客户端
pub struct OpenAiCompletion {
    client: Client<OpenAIConfig>,
}

impl OpenAiCompletion {
    /// 创建新的补全客户端
    pub fn new(config: &Config) -> Self {
        // 配置 OpenAI 客户端（兼容 OpenAI API 的服务）
        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.llm_api_key)
            .with_api_base(&config.llm_api_base_url);

        let client = Client::with_config(openai_config);

        Self { client }
    }
}

#[async_trait]
impl ModelCompletion for OpenAiCompletion {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        debug!("调用 LLM API，模型: {}", request.model);
        debug!(
            "用户消息长度: {} 字符，JSON 模式: {}",
            request.user.len(),
            request.json_mode
        );

        // 构建消息列表
        let mut messages = Vec::new();

        let system_msg = ChatCompletionRequestSystemMessageArgs::default()
            .content(request.system.as_str())
            .build()
            .map_err(|e| LlmError::RequestBuildFailed(e.to_string()))?;
        messages.push(ChatCompletionRequestMessage::System(system_msg));

        let user_msg = ChatCompletionRequestUserMessageArgs::default()
            .content(request.user.as_str())
            .build()
            .map_err(|e| LlmError::RequestBuildFailed(e.to_string()))?;
        messages.push(ChatCompletionRequestMessage::User(user_msg));

        // 构建请求
        let mut builder = CreateChatCompletionRequestArgs::default();
        builder
            .model(&request.model)
            .messages(messages)
            .temperature(request.effective_temperature())
            .max_tokens(request.effective_max_tokens());
        if request.json_mode {
            builder.response_format(ResponseFormat::JsonObject);
        }
        let api_request = builder
            .build()
            .map_err(|e| LlmError::RequestBuildFailed(e.to_string()))?;

        // 调用 API
        let response = self.client.chat().create(api_request).await.map_err(|e| {
            warn!("LLM API 调用失败: {}", e);
            LlmError::ApiCallFailed {
                model: request.model.clone(),
                source: e,
            }
        })?;

        debug!("LLM API 调用成功");

        // 提取响应内容
        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| LlmError::EmptyContent {
                model: request.model.clone(),
            })?;

        Ok(content.trim().to_string())
    }
}
