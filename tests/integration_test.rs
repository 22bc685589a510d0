//! 端到端流水线测试
//!
//! 用脚本化的搜索 / 模型 / 抓取替身驱动完整流水线，
//! 校验事件序列、运行记录版本与跨商品上下文传递

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use tokio_util::sync::CancellationToken;

use shopping_discovery::error::{LlmError, SearchError, StoreError};
use shopping_discovery::infrastructure::{
    CompletionRequest, ModelCompletion, PageFetch, SearchProvider, SearchRequest,
};
use shopping_discovery::models::{
    ChannelSink, DiscoveryEvent, ItemConstraints, ItemRun, LineItem, SearchHit, ShoppingSpec,
    StepName, StepStatus,
};
use shopping_discovery::services::{MemoryRunStore, NewRun, RunStore};
use shopping_discovery::{Config, Pipeline};

// ========== 测试替身 ==========

/// 按脚本顺序吐结果的搜索供应商
struct ScriptedProvider {
    responses: Mutex<VecDeque<Result<Vec<SearchHit>, SearchError>>>,
    requests: Mutex<Vec<SearchRequest>>,
}

impl ScriptedProvider {
    fn new(responses: Vec<Result<Vec<SearchHit>, SearchError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn request_at(&self, index: usize) -> SearchRequest {
        self.requests.lock().unwrap()[index].clone()
    }
}

#[async_trait]
impl SearchProvider for ScriptedProvider {
    async fn search(&self, request: &SearchRequest) -> Result<Vec<SearchHit>, SearchError> {
        self.requests.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}

/// 按脚本顺序回话的模型替身
struct ScriptedLlm {
    replies: Mutex<VecDeque<String>>,
    calls: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedLlm {
    fn new(replies: Vec<&str>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().map(|s| s.to_string()).collect()),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn call_at(&self, index: usize) -> CompletionRequest {
        self.calls.lock().unwrap()[index].clone()
    }
}

#[async_trait]
impl ModelCompletion for ScriptedLlm {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        self.calls.lock().unwrap().push(request.clone());
        match self.replies.lock().unwrap().pop_front() {
            Some(reply) => Ok(reply),
            None => Err(LlmError::EmptyContent {
                model: request.model.clone(),
            }),
        }
    }
}

/// 固定页面表的抓取替身
struct MapFetcher {
    pages: HashMap<String, String>,
}

impl MapFetcher {
    fn empty() -> Self {
        Self {
            pages: HashMap::new(),
        }
    }

    fn with_pages(pages: &[(&str, &str)]) -> Self {
        Self {
            pages: pages
                .iter()
                .map(|(url, body)| (url.to_string(), body.to_string()))
                .collect(),
        }
    }
}

#[async_trait]
impl PageFetch for MapFetcher {
    async fn fetch(&self, url: &str) -> Option<String> {
        self.pages.get(url).cloned()
    }
}

/// 第一次被调用时就触发取消的搜索供应商
struct CancellingProvider {
    token: CancellationToken,
    hits: Mutex<VecDeque<Vec<SearchHit>>>,
}

#[async_trait]
impl SearchProvider for CancellingProvider {
    async fn search(&self, _request: &SearchRequest) -> Result<Vec<SearchHit>, SearchError> {
        self.token.cancel();
        Ok(self.hits.lock().unwrap().pop_front().unwrap_or_default())
    }
}

/// 写入必失败的留痕替身
struct FailingStore;

#[async_trait]
impl RunStore for FailingStore {
    async fn append_run(&self, _run: NewRun) -> Result<ItemRun, StoreError> {
        let bad = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        Err(StoreError::Serialize(bad))
    }

    async fn latest_run(&self, _item_id: &str) -> Result<Option<ItemRun>, StoreError> {
        Ok(None)
    }
}

// ========== 构造辅助 ==========

fn test_config() -> Config {
    Config {
        search_spacing_ms: 0,
        ..Config::default()
    }
}

fn line_item(id: &str, name: &str, allocation: f64, keywords: &[&str]) -> LineItem {
    LineItem {
        id: id.to_string(),
        name: name.to_string(),
        constraints: ItemConstraints {
            keywords: keywords.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        },
        budget_allocation: allocation,
        locked: false,
    }
}

fn spec_with_items(items: Vec<LineItem>) -> ShoppingSpec {
    ShoppingSpec {
        id: "spec-1".to_string(),
        budget: 500.0,
        delivery_deadline: None,
        items,
        file_path: None,
    }
}

fn hit(url: &str, title: &str, raw: Option<String>) -> SearchHit {
    SearchHit {
        title: title.to_string(),
        url: url.to_string(),
        content: String::new(),
        score: 1.0,
        raw_content: raw,
    }
}

/// 三家零售商各一条、都带 markdown 正文的搜索结果
fn product_hits() -> Vec<SearchHit> {
    vec![
        hit(
            "https://www.nike.com/t/pegasus-trail-4",
            "Nike Pegasus Trail 4",
            Some("# Nike Pegasus Trail 4\n\nResponsive trail shoe.\n\n$95.00".to_string()),
        ),
        hit(
            "https://www.amazon.com/dp/B0TRAIL9",
            "Salomon Speedcross 6",
            Some("# Salomon Speedcross 6\n\nAggressive grip.\n\n$120.00".to_string()),
        ),
        hit(
            "https://www.walmart.com/ip/555",
            "Generic Trail Shoe",
            Some("# Generic Trail Shoe\n\nBudget option.\n\n$45.50".to_string()),
        ),
    ]
}

/// 三家零售商凑足多样性、只有第一条带正文的结果，恰好产出一个候选
fn single_candidate_hits(title: &str, price: &str) -> Vec<SearchHit> {
    vec![
        hit(
            "https://www.amazon.com/dp/B0AAA11",
            title,
            Some(format!("# {}\n\nDetails.\n\n${}", title, price)),
        ),
        hit("https://www.walmart.com/ip/101", "Other listing", None),
        hit("https://www.target.com/p/202", "Another listing", None),
    ]
}

fn drain_events(rx: &mut UnboundedReceiver<DiscoveryEvent>) -> Vec<DiscoveryEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn step_pairs(events: &[DiscoveryEvent]) -> Vec<(StepName, StepStatus)> {
    events
        .iter()
        .filter_map(|event| match event {
            DiscoveryEvent::ItemStep { step, status, .. } => Some((*step, *status)),
            _ => None,
        })
        .collect()
}

fn has_done(events: &[DiscoveryEvent]) -> bool {
    events
        .iter()
        .any(|event| matches!(event, DiscoveryEvent::Done))
}

// ========== 流水线测试 ==========

#[tokio::test]
async fn test_full_pipeline_single_item() {
    let provider = Arc::new(ScriptedProvider::new(vec![Ok(product_hits())]));
    let llm = Arc::new(ScriptedLlm::new(vec![
        r#"{"scores":[]}"#,
        "Good value pick.",
        "Good value pick.",
        "Good value pick.",
    ]));
    let store = Arc::new(MemoryRunStore::new());
    let (tx, mut rx) = unbounded_channel();

    let pipeline = Pipeline::new(
        test_config(),
        provider,
        llm.clone(),
        Arc::new(MapFetcher::empty()),
        store.clone(),
        Arc::new(ChannelSink::new(tx)),
    );

    let spec = spec_with_items(vec![line_item(
        "item-1",
        "Trail running shoes",
        100.0,
        &["trail", "shoes"],
    )]);
    let results = pipeline.run(&spec, None).await.expect("流水线应该跑通");

    // 结果：三个候选，预算内最便宜的排第一
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].query, "trail shoes");
    let candidates = &results[0].candidates;
    assert_eq!(candidates.len(), 3);
    assert_eq!(candidates[0].title, "Generic Trail Shoe");
    assert_eq!(candidates[0].price, 45.5);
    assert_eq!(candidates[0].retailer_name, "Walmart");
    assert_eq!(candidates[0].explanation, "Good value pick.");
    // 无模型分时：0.545*0.30 + 0.5*0.25 + 0.5*0.30 + 0.5*0.15
    assert!((candidates[0].scores.total - 0.5135).abs() < 1e-9);

    // 模型调用：1 次评分 + 3 次推荐理由
    assert_eq!(llm.call_count(), 4);
    assert!(llm.call_at(0).json_mode);

    // 事件序列：三阶段先统一 pending，再依序 in_progress → complete
    let events = drain_events(&mut rx);
    assert_eq!(
        step_pairs(&events),
        vec![
            (StepName::Search, StepStatus::Pending),
            (StepName::Extract, StepStatus::Pending),
            (StepName::Rank, StepStatus::Pending),
            (StepName::Search, StepStatus::InProgress),
            (StepName::Search, StepStatus::Complete),
            (StepName::Extract, StepStatus::InProgress),
            (StepName::Extract, StepStatus::Complete),
            (StepName::Rank, StepStatus::InProgress),
            (StepName::Rank, StepStatus::Complete),
        ]
    );
    assert!(matches!(
        &events[events.len() - 2],
        DiscoveryEvent::ItemComplete { item_id, candidates, .. }
            if item_id == "item-1" && candidates.len() == 3
    ));
    assert!(matches!(events.last(), Some(DiscoveryEvent::Done)));

    // 留痕：第一版运行记录，原始命中和排好序的候选都在
    let run = store
        .latest_run("item-1")
        .await
        .expect("读取留痕应该成功")
        .expect("应该有运行记录");
    assert_eq!(run.version, 1);
    assert_eq!(run.hits.len(), 3);
    assert_eq!(run.ranked.len(), 3);
    assert_eq!(
        run.trace,
        "Searched for \"trail shoes\", found 3 results, extracted 3 candidates, ranked top 3"
    );
}

#[tokio::test]
async fn test_empty_search_still_persists_run() {
    let provider = Arc::new(ScriptedProvider::new(vec![Ok(Vec::new())]));
    let llm = Arc::new(ScriptedLlm::new(vec![]));
    let store = Arc::new(MemoryRunStore::new());
    let (tx, mut rx) = unbounded_channel();

    let pipeline = Pipeline::new(
        test_config(),
        provider,
        llm.clone(),
        Arc::new(MapFetcher::empty()),
        store.clone(),
        Arc::new(ChannelSink::new(tx)),
    );

    let spec = spec_with_items(vec![line_item(
        "item-1",
        "Trail running shoes",
        100.0,
        &["trail", "shoes"],
    )]);
    let results = pipeline.run(&spec, None).await.expect("空结果不该报错");

    assert_eq!(results.len(), 1);
    assert!(results[0].candidates.is_empty());
    // 没有候选就不该有任何模型调用
    assert_eq!(llm.call_count(), 0);

    let run = store
        .latest_run("item-1")
        .await
        .expect("读取留痕应该成功")
        .expect("空跑也要留痕");
    assert_eq!(run.version, 1);
    assert!(run.hits.is_empty());
    assert!(run.trace.contains("found 0 results"));

    let events = drain_events(&mut rx);
    assert!(has_done(&events));
}

#[tokio::test]
async fn test_search_failure_is_batch_fatal() {
    let provider = Arc::new(ScriptedProvider::new(vec![Err(SearchError::BadStatus {
        endpoint: "https://api.tavily.com/search".to_string(),
        status: 500,
    })]));
    let llm = Arc::new(ScriptedLlm::new(vec![]));
    let (tx, mut rx) = unbounded_channel();

    let pipeline = Pipeline::new(
        test_config(),
        provider,
        llm,
        Arc::new(MapFetcher::empty()),
        Arc::new(MemoryRunStore::new()),
        Arc::new(ChannelSink::new(tx)),
    );

    let spec = spec_with_items(vec![line_item(
        "item-1",
        "Trail running shoes",
        100.0,
        &["trail", "shoes"],
    )]);
    let err = pipeline
        .run(&spec, None)
        .await
        .expect_err("搜索失败应该让整批失败");
    assert!(format!("{:#}", err).contains("商品检索失败"));

    let events = drain_events(&mut rx);
    let pairs = step_pairs(&events);
    assert!(pairs.contains(&(StepName::Search, StepStatus::Error)));
    assert!(matches!(
        events.last(),
        Some(DiscoveryEvent::Error { message }) if message.contains("商品检索失败")
    ));
    assert!(!has_done(&events));
}

#[tokio::test]
async fn test_rate_limited_search_retries_once() {
    let provider = Arc::new(ScriptedProvider::new(vec![
        Err(SearchError::RateLimited {
            retry_after: Some(0),
        }),
        Ok(single_candidate_hits("Alpha Jacket", "80.00")),
    ]));
    let llm = Arc::new(ScriptedLlm::new(vec![r#"{"scores":[]}"#, "Warm pick."]));
    let (tx, _rx) = unbounded_channel();

    let pipeline = Pipeline::new(
        test_config(),
        provider.clone(),
        llm,
        Arc::new(MapFetcher::empty()),
        Arc::new(MemoryRunStore::new()),
        Arc::new(ChannelSink::new(tx)),
    );

    let spec = spec_with_items(vec![line_item("item-1", "Rain jacket", 100.0, &["jacket"])]);
    let results = pipeline.run(&spec, None).await.expect("限流重试后应该成功");

    assert_eq!(provider.request_count(), 2);
    assert_eq!(results[0].candidates.len(), 1);
    assert_eq!(results[0].candidates[0].title, "Alpha Jacket");
}

#[tokio::test]
async fn test_version_increments_across_runs() {
    let provider = Arc::new(ScriptedProvider::new(vec![
        Ok(single_candidate_hits("Alpha Jacket", "80.00")),
        Ok(single_candidate_hits("Alpha Jacket", "80.00")),
    ]));
    let llm = Arc::new(ScriptedLlm::new(vec![
        r#"{"scores":[]}"#,
        "Warm pick.",
        r#"{"scores":[]}"#,
        "Warm pick.",
    ]));
    let store = Arc::new(MemoryRunStore::new());
    let (tx, _rx) = unbounded_channel();

    let pipeline = Pipeline::new(
        test_config(),
        provider,
        llm,
        Arc::new(MapFetcher::empty()),
        store.clone(),
        Arc::new(ChannelSink::new(tx)),
    );

    let spec = spec_with_items(vec![line_item("item-1", "Rain jacket", 100.0, &["jacket"])]);
    pipeline.run(&spec, None).await.expect("第一轮应该成功");
    pipeline.run(&spec, None).await.expect("第二轮应该成功");

    let run = store
        .latest_run("item-1")
        .await
        .expect("读取留痕应该成功")
        .expect("应该有运行记录");
    assert_eq!(run.version, 2);
}

#[tokio::test]
async fn test_persistence_failure_is_batch_fatal() {
    let provider = Arc::new(ScriptedProvider::new(vec![Ok(single_candidate_hits(
        "Alpha Jacket",
        "80.00",
    ))]));
    let llm = Arc::new(ScriptedLlm::new(vec![r#"{"scores":[]}"#, "Warm pick."]));
    let (tx, mut rx) = unbounded_channel();

    let pipeline = Pipeline::new(
        test_config(),
        provider,
        llm,
        Arc::new(MapFetcher::empty()),
        Arc::new(FailingStore),
        Arc::new(ChannelSink::new(tx)),
    );

    let spec = spec_with_items(vec![line_item("item-1", "Rain jacket", 100.0, &["jacket"])]);
    let err = pipeline
        .run(&spec, None)
        .await
        .expect_err("留痕失败应该让整批失败");
    assert!(err.to_string().contains("序列化失败"));

    let events = drain_events(&mut rx);
    assert!(matches!(
        events.last(),
        Some(DiscoveryEvent::Error { message }) if message.contains("保存商品")
    ));
    assert!(!events
        .iter()
        .any(|event| matches!(event, DiscoveryEvent::ItemComplete { .. })));
    assert!(!has_done(&events));
}

#[tokio::test]
async fn test_cancelled_before_start_returns_empty() {
    let provider = Arc::new(ScriptedProvider::new(vec![Ok(product_hits())]));
    let llm = Arc::new(ScriptedLlm::new(vec![]));
    let store = Arc::new(MemoryRunStore::new());
    let (tx, mut rx) = unbounded_channel();

    let token = CancellationToken::new();
    token.cancel();

    let pipeline = Pipeline::new(
        test_config(),
        provider.clone(),
        llm,
        Arc::new(MapFetcher::empty()),
        store.clone(),
        Arc::new(ChannelSink::new(tx)),
    )
    .with_cancellation(token);

    let spec = spec_with_items(vec![line_item(
        "item-1",
        "Trail running shoes",
        100.0,
        &["trail", "shoes"],
    )]);
    let results = pipeline.run(&spec, None).await.expect("取消不是错误");

    assert!(results.is_empty());
    assert_eq!(provider.request_count(), 0);
    // 没开始的批次不发 done，消费端据此区分取消和正常完成
    assert!(drain_events(&mut rx).is_empty());
    let stored = store.latest_run("item-1").await.expect("读取留痕应该成功");
    assert!(stored.is_none());
}

#[tokio::test]
async fn test_cancel_mid_batch_keeps_completed_items() {
    let token = CancellationToken::new();
    let provider = Arc::new(CancellingProvider {
        token: token.clone(),
        hits: Mutex::new(VecDeque::from([single_candidate_hits(
            "Alpha Jacket",
            "80.00",
        )])),
    });
    let llm = Arc::new(ScriptedLlm::new(vec![r#"{"scores":[]}"#, "Warm pick."]));
    let store = Arc::new(MemoryRunStore::new());
    let (tx, mut rx) = unbounded_channel();

    let pipeline = Pipeline::new(
        test_config(),
        provider,
        llm,
        Arc::new(MapFetcher::empty()),
        store.clone(),
        Arc::new(ChannelSink::new(tx)),
    )
    .with_cancellation(token);

    let spec = spec_with_items(vec![
        line_item("item-1", "Rain jacket", 100.0, &["jacket"]),
        line_item("item-2", "Hiking pants", 100.0, &["pants"]),
    ]);
    let results = pipeline.run(&spec, None).await.expect("取消不是错误");

    // 处理中的商品跑完并留痕，后续商品不再开始
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].item_id, "item-1");
    let run = store
        .latest_run("item-1")
        .await
        .expect("读取留痕应该成功")
        .expect("已完成商品要留痕");
    assert_eq!(run.version, 1);
    assert!(store
        .latest_run("item-2")
        .await
        .expect("读取留痕应该成功")
        .is_none());

    let events = drain_events(&mut rx);
    assert!(events.iter().any(|event| matches!(
        event,
        DiscoveryEvent::ItemComplete { item_id, .. } if item_id == "item-1"
    )));
    assert!(!has_done(&events));
}

#[tokio::test]
async fn test_top_pick_context_flows_between_items() {
    let provider = Arc::new(ScriptedProvider::new(vec![
        Ok(single_candidate_hits("Alpha Jacket", "80.00")),
        Ok(single_candidate_hits("Beta Pants", "50.00")),
    ]));
    let llm = Arc::new(ScriptedLlm::new(vec![
        r#"{"scores":[]}"#,
        "Warm pick.",
        r#"{"scores":[]}"#,
        "Matches the jacket.",
        r#"{"adjustments":[]}"#,
    ]));
    let (tx, mut rx) = unbounded_channel();

    let pipeline = Pipeline::new(
        test_config(),
        provider,
        llm.clone(),
        Arc::new(MapFetcher::empty()),
        Arc::new(MemoryRunStore::new()),
        Arc::new(ChannelSink::new(tx)),
    );

    let spec = spec_with_items(vec![
        line_item("item-1", "Rain jacket", 100.0, &["jacket"]),
        line_item("item-2", "Hiking pants", 100.0, &["pants"]),
    ]);
    let results = pipeline.run(&spec, None).await.expect("两个商品都该跑通");

    assert_eq!(results.len(), 2);

    // 第一个商品评分时还没有已选候选
    assert!(llm.call_at(0).user.contains("No other items selected yet."));
    // 第二个商品评分时能看到第一个商品的首位候选
    let second_scoring = llm.call_at(2);
    assert!(second_scoring
        .user
        .contains("Other items the shopper has already selected:"));
    assert!(second_scoring.user.contains("Alpha Jacket"));

    // 整批结束后恰好一次协调调用，带上两个已选候选
    assert_eq!(llm.call_count(), 5);
    let coherence = llm.call_at(4);
    assert!(coherence.json_mode);
    assert!(coherence.user.contains("Selected items:"));
    assert!(coherence.user.contains("Alpha Jacket"));
    assert!(coherence.user.contains("Beta Pants"));

    let events = drain_events(&mut rx);
    let completes = events
        .iter()
        .filter(|event| matches!(event, DiscoveryEvent::ItemComplete { .. }))
        .count();
    assert_eq!(completes, 2);
    assert!(matches!(events.last(), Some(DiscoveryEvent::Done)));
}

#[tokio::test]
async fn test_catalog_listing_expands_to_products() {
    let listing = "# Search Results\n\nShowing 120 results for trail shoes. Sort by price.\n\n\
[Pegasus Trail 4](https://www.nike.com/t/pegasus-trail-4)\n\
[Wildhorse 8](https://www.nike.com/t/wildhorse-8)\n";

    let provider = Arc::new(ScriptedProvider::new(vec![
        Ok(vec![hit(
            "https://www.nike.com/w/trail-running",
            "Trail Running Shoes | Nike",
            Some(listing.to_string()),
        )]),
        // 单一零售商触发的补查，返回空即可
        Ok(Vec::new()),
    ]));
    let llm = Arc::new(ScriptedLlm::new(vec![
        r#"{"scores":[]}"#,
        "Lighter option.",
        "Cushioned ride.",
    ]));
    let fetcher = Arc::new(MapFetcher::with_pages(&[
        (
            "https://www.nike.com/t/pegasus-trail-4",
            r#"<html><head><meta property="og:title" content="Nike Pegasus Trail 4"></head><body><span class="price">$94.99</span></body></html>"#,
        ),
        (
            "https://www.nike.com/t/wildhorse-8",
            r#"<html><head><meta property="og:title" content="Nike Wildhorse 8"></head><body><span class="price">$89.99</span></body></html>"#,
        ),
    ]));
    let store = Arc::new(MemoryRunStore::new());
    let (tx, _rx) = unbounded_channel();

    let pipeline = Pipeline::new(
        test_config(),
        provider.clone(),
        llm,
        fetcher,
        store.clone(),
        Arc::new(ChannelSink::new(tx)),
    );

    let spec = spec_with_items(vec![line_item(
        "item-1",
        "Trail running shoes",
        100.0,
        &["trail", "shoes"],
    )]);
    let results = pipeline.run(&spec, None).await.expect("列表页展开应该跑通");

    // 补查请求发向缺席零售商
    assert_eq!(provider.request_count(), 2);
    assert_eq!(
        provider.request_at(1).query,
        "Trail running shoes buy online"
    );

    let candidates = &results[0].candidates;
    assert_eq!(candidates.len(), 2);
    // 更便宜的 Wildhorse 成本分更高，排第一
    assert_eq!(candidates[0].title, "Nike Wildhorse 8");
    assert_eq!(candidates[0].price, 89.99);
    assert_eq!(candidates[1].title, "Nike Pegasus Trail 4");
    assert!(candidates.iter().all(|c| c.retailer_name == "Nike"));

    let run = store
        .latest_run("item-1")
        .await
        .expect("读取留痕应该成功")
        .expect("应该有运行记录");
    assert!(run.trace.contains("extracted 2 candidates"));
}

#[tokio::test]
async fn test_unknown_page_reclassified_as_catalog() {
    // URL 形态未知，但正文带列表页信号和商品链接
    let listing = "# Search Results\n\nShowing 64 results. Sort by newest.\n\n\
[Pegasus Trail 4](https://www.nike.com/t/pegasus-trail-4)\n\
[Wildhorse 8](https://www.nike.com/t/wildhorse-8)\n";

    let provider = Arc::new(ScriptedProvider::new(vec![
        Ok(vec![hit(
            "https://www.nike.com/launch",
            "Nike Launch",
            Some(listing.to_string()),
        )]),
        Ok(Vec::new()),
    ]));
    // 第一条回话是模型对列表页的抽取失败形状
    let llm = Arc::new(ScriptedLlm::new(vec![
        r#"{"title":"","price":null}"#,
        r#"{"scores":[]}"#,
        "Lighter option.",
        "Cushioned ride.",
    ]));
    let fetcher = Arc::new(MapFetcher::with_pages(&[
        (
            "https://www.nike.com/t/pegasus-trail-4",
            r#"<html><head><meta property="og:title" content="Nike Pegasus Trail 4"></head><body><span class="price">$94.99</span></body></html>"#,
        ),
        (
            "https://www.nike.com/t/wildhorse-8",
            r#"<html><head><meta property="og:title" content="Nike Wildhorse 8"></head><body><span class="price">$89.99</span></body></html>"#,
        ),
    ]));
    let (tx, _rx) = unbounded_channel();

    let pipeline = Pipeline::new(
        test_config(),
        provider,
        llm.clone(),
        fetcher,
        Arc::new(MemoryRunStore::new()),
        Arc::new(ChannelSink::new(tx)),
    );

    let spec = spec_with_items(vec![line_item(
        "item-1",
        "Trail running shoes",
        100.0,
        &["trail", "shoes"],
    )]);
    let results = pipeline.run(&spec, None).await.expect("重分类展开应该跑通");

    // 模型先对未知页面做了一次抽取尝试
    assert_eq!(llm.call_count(), 4);
    let first = llm.call_at(0);
    assert!(first.json_mode);
    assert!(first.user.contains("https://www.nike.com/launch"));

    // 失败后按列表页展开，两个商品页都抽了出来
    assert_eq!(results[0].candidates.len(), 2);
}

// ========== 真实环境测试 ==========

/// 真实环境整链路测试
///
/// 默认忽略，需要手动运行：
/// ```bash
/// cargo test test_live_full_pipeline -- --ignored --nocapture
/// ```
#[tokio::test]
#[ignore]
async fn test_live_full_pipeline() {
    shopping_discovery::utils::logging::init();

    let config = Config::from_env();
    let spec = shopping_discovery::load_toml_to_spec(std::path::Path::new(&config.spec_file))
        .await
        .expect("加载购物清单失败");

    let provider = Arc::new(shopping_discovery::TavilySearchClient::new(&config));
    let llm = Arc::new(shopping_discovery::OpenAiCompletion::new(&config));
    let fetcher = Arc::new(shopping_discovery::PageFetcher::new().expect("构建抓取器失败"));
    let store = Arc::new(MemoryRunStore::new());
    let sink = Arc::new(shopping_discovery::models::LogSink);

    let pipeline = Pipeline::new(config, provider, llm, fetcher, store, sink);
    let results = pipeline.run(&spec, Some(1)).await.expect("流水线运行失败");

    println!("发现 {} 个商品结果", results.len());
    for result in &results {
        for candidate in &result.candidates {
            println!(
                "  {} - ${} @ {} (总分 {:.2})",
                candidate.title, candidate.price, candidate.retailer_name, candidate.scores.total
            );
        }
    }
    assert!(!results.is_empty());
}
