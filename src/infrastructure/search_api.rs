//! 检索 API 客户端 - 基础设施层
//!
//! 封装 Tavily 风格的 HTTP 检索端点，只负责"查询进、结果出"，
//! 零售商过滤与多样性补查由上层服务决定
//!
//! ## 技术栈
//! - 使用 `reqwest` 发送 POST 请求
//! - 请求体与响应体走 `serde` 强类型结构
//! - 限流（429）映射为专门的错误变体，由上层决定是否重试

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::SearchError;
use crate::models::candidate::SearchHit;

/// 检索深度
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchDepth {
    Basic,
    Advanced,
}

impl SearchDepth {
    fn as_str(&self) -> &'static str {
        match self {
            SearchDepth::Basic => "basic",
            SearchDepth::Advanced => "advanced",
        }
    }
}

/// 一次检索调用的全部参数
#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub query: String,
    pub depth: SearchDepth,
    /// 限定结果域名（空表示不限定）
    pub include_domains: Vec<String>,
    pub max_results: usize,
    /// 要求返回页面正文（markdown）
    pub want_raw_content: bool,
}

/// 检索能力
///
/// 搜索服务只依赖这个 trait，测试里用假实现替换
#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, request: &SearchRequest) -> Result<Vec<SearchHit>, SearchError>;
}

// ========== HTTP 请求/响应结构 ==========

#[derive(Debug, Serialize)]
struct ApiSearchBody<'a> {
    api_key: &'a str,
    query: &'a str,
    search_depth: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    include_domains: Option<&'a [String]>,
    max_results: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    include_raw_content: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct ApiSearchResponse {
    #[serde(default)]
    results: Vec<ApiSearchResult>,
}

#[derive(Debug, Deserialize)]
struct ApiSearchResult {
    #[serde(default)]
    title: String,
    url: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    score: f64,
    #[serde(default)]
    raw_content: Option<String>,
}

impl From<ApiSearchResult> for SearchHit {
    fn from(result: ApiSearchResult) -> Self {
        SearchHit {
            title: result.title,
            url: result.url,
            content: result.content,
            score: result.score,
            raw_content: result.raw_content,
        }
    }
}

/// Tavily 风格检索端点的客户端
pub struct TavilySearchClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl TavilySearchClient {
    /// 创建新的检索客户端
    pub fn new(config: &Config) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: config.search_api_key.clone(),
            base_url: config.search_api_base_url.trim_end_matches('/').to_string(),
        }
    }

    /// 解析 Retry-After 响应头（秒）
    fn parse_retry_after(response: &reqwest::Response) -> Option<u64> {
        response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<u64>().ok())
    }
}

#[async_trait]
impl SearchProvider for TavilySearchClient {
    async fn search(&self, request: &SearchRequest) -> Result<Vec<SearchHit>, SearchError> {
        let endpoint = format!("{}/search", self.base_url);

        debug!(
            "🔍 调用检索 API: \"{}\" (深度: {}, 上限: {})",
            request.query,
            request.depth.as_str(),
            request.max_results
        );

        let body = ApiSearchBody {
            api_key: &self.api_key,
            query: &request.query,
            search_depth: request.depth.as_str(),
            include_domains: if request.include_domains.is_empty() {
                None
            } else {
                Some(&request.include_domains)
            },
            max_results: request.max_results,
            include_raw_content: if request.want_raw_content {
                Some("markdown")
            } else {
                None
            },
        };

        let response = self
            .http
            .post(&endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| SearchError::RequestFailed {
                endpoint: endpoint.clone(),
                source: e,
            })?;

        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = Self::parse_retry_after(&response);
            warn!("检索 API 限流，Retry-After: {:?} 秒", retry_after);
            return Err(SearchError::RateLimited { retry_after });
        }

        if !status.is_success() {
            return Err(SearchError::BadStatus {
                endpoint,
                status: status.as_u16(),
            });
        }

        let parsed: ApiSearchResponse = response
            .json()
            .await
            .map_err(|e| SearchError::ParseFailed(e.to_string()))?;

        let hits: Vec<SearchHit> = parsed.results.into_iter().map(SearchHit::from).collect();

        debug!("检索 API 返回 {} 条结果", hits.len());

        Ok(hits)
    }
}
