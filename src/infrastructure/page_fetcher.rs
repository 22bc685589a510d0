//! 商品页抓取器 - 基础设施层
//!
//! 带真实浏览器请求头直接 GET 商品页，单页失败静默跳过，
//! 不影响同商品的其他候选

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, USER_AGENT};
use std::time::Duration;
use tracing::{debug, warn};

const FETCH_TIMEOUT_SECS: u64 = 10;

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// 页面抓取能力
#[async_trait]
pub trait PageFetch: Send + Sync {
    /// 抓取页面正文，失败返回 None
    async fn fetch(&self, url: &str) -> Option<String>;
}

/// 商品页抓取器
pub struct PageFetcher {
    client: reqwest::Client,
}

impl PageFetcher {
    /// 创建新的抓取器
    pub fn new() -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(FETCH_TIMEOUT_SECS))
            .build()
            .context("无法构建页面抓取 HTTP 客户端")?;

        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetch for PageFetcher {
    /// 抓取页面正文（HTML）
    ///
    /// 超时、网络错误、非 2xx 状态一律返回 None
    async fn fetch(&self, url: &str) -> Option<String> {
        debug!("📄 抓取页面: {}", url);

        let response = match self.client.get(url).send().await {
            Ok(resp) => resp,
            Err(e) => {
                warn!("页面抓取失败 {}: {}", url, e);
                return None;
            }
        };

        if !response.status().is_success() {
            warn!("页面返回非成功状态 {}: {}", response.status(), url);
            return None;
        }

        match response.text().await {
            Ok(body) => Some(body),
            Err(e) => {
                warn!("页面正文读取失败 {}: {}", url, e);
                None
            }
        }
    }
}
