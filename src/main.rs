use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use shopping_discovery::models::LogSink;
use shopping_discovery::utils::logging;
use shopping_discovery::{
    load_toml_to_spec, Config, OpenAiCompletion, PageFetcher, Pipeline, SqliteRunStore,
    TavilySearchClient,
};

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志
    logging::init();

    // 加载配置
    let config = Config::from_env();
    logging::init_log_file(&config.output_log_file)?;

    // 加载购物清单
    let spec = load_toml_to_spec(Path::new(&config.spec_file)).await?;

    // 组装能力
    let provider = Arc::new(TavilySearchClient::new(&config));
    let llm = Arc::new(OpenAiCompletion::new(&config));
    let page_fetcher = Arc::new(PageFetcher::new()?);
    let store = Arc::new(SqliteRunStore::open(&config.run_db_path).context("打开运行记录库失败")?);
    let sink = Arc::new(LogSink);

    // 运行发现流程
    let pipeline = Pipeline::new(config, provider, llm, page_fetcher, store, sink);
    let results = pipeline.run(&spec, None).await?;

    info!("🎉 全部完成，共 {} 个商品产出结果", results.len());
    Ok(())
}
