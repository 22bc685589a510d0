/// 程序配置文件
#[derive(Clone, Debug)]
pub struct Config {
    /// 单次流水线最多处理的商品数量
    pub max_items_per_run: usize,
    /// 相邻商品搜索之间的最小间隔（毫秒）
    pub search_spacing_ms: u64,
    /// 购物需求单 TOML 文件路径
    pub spec_file: String,
    /// 运行记录数据库路径
    pub run_db_path: String,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    /// 输出日志文件
    pub output_log_file: String,
    // --- LLM 配置 ---
    pub llm_api_key: String,
    pub llm_api_base_url: String,
    /// 商品信息提取使用的模型
    pub extract_model_name: String,
    /// 评分 / 一致性调整使用的模型
    pub ranking_model_name: String,
    // --- 搜索 API 配置 ---
    pub search_api_key: String,
    pub search_api_base_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_items_per_run: 8,
            search_spacing_ms: 1000,
            spec_file: "shopping_spec.toml".to_string(),
            run_db_path: "runs.db".to_string(),
            verbose_logging: false,
            output_log_file: "output.txt".to_string(),
            llm_api_key: String::new(),
            llm_api_base_url: "https://api.openai.com/v1".to_string(),
            extract_model_name: "gpt-5-mini".to_string(),
            ranking_model_name: "gpt-5.1".to_string(),
            search_api_key: String::new(),
            search_api_base_url: "https://api.tavily.com".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            max_items_per_run: std::env::var("MAX_ITEMS_PER_RUN").ok().and_then(|v| v.parse().ok()).unwrap_or(default.max_items_per_run),
            search_spacing_ms: std::env::var("SEARCH_SPACING_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.search_spacing_ms),
            spec_file: std::env::var("SPEC_FILE").unwrap_or(default.spec_file),
            run_db_path: std::env::var("RUN_DB_PATH").unwrap_or(default.run_db_path),
            verbose_logging: std::env::var("VERBOSE_LOGGING").ok().and_then(|v| v.parse().ok()).unwrap_or(default.verbose_logging),
            output_log_file: std::env::var("OUTPUT_LOG_FILE").unwrap_or(default.output_log_file),
            llm_api_key: std::env::var("LLM_API_KEY").unwrap_or(default.llm_api_key),
            llm_api_base_url: std::env::var("LLM_API_BASE_URL").unwrap_or(default.llm_api_base_url),
            extract_model_name: std::env::var("EXTRACT_MODEL_NAME").unwrap_or(default.extract_model_name),
            ranking_model_name: std::env::var("RANKING_MODEL_NAME").unwrap_or(default.ranking_model_name),
            search_api_key: std::env::var("SEARCH_API_KEY").unwrap_or(default.search_api_key),
            search_api_base_url: std::env::var("SEARCH_API_BASE_URL").unwrap_or(default.search_api_base_url),
        }
    }
}
