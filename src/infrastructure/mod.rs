pub mod llm;
pub mod page_fetcher;
pub mod search_api;

pub use llm::{CompletionRequest, ModelCompletion, OpenAiCompletion};
pub use page_fetcher::{PageFetch, PageFetcher};
pub use search_api::{SearchDepth, SearchProvider, SearchRequest, TavilySearchClient};
