pub mod aggregator;
pub mod document_service;
pub mod page_analyzer;

pub use aggregator::aggregate_pages;
pub use document_service::DocumentService;
pub use page_analyzer::PageAnalyzer;
