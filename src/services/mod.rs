pub mod catalog_service;
pub mod extract_service;
pub mod reoptimize;
pub mod retailer_classifier;
pub mod run_store;
pub mod scoring_service;
pub mod search_service;

pub use catalog_service::{links_from_catalog, CatalogLink};
pub use extract_service::CandidateExtractor;
pub use reoptimize::{CartEntry, Reoptimizer, SwapSuggestion};
pub use retailer_classifier::{classify_url, display_name, domain_of, looks_like_catalog, UrlKind};
pub use run_store::{MemoryRunStore, NewRun, RunStore, SqliteRunStore};
pub use scoring_service::ScoringEngine;
pub use search_service::ProductSearch;
