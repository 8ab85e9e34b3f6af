//! 编排层
//!
//! - `document_pipeline` - 单个文档端到端处理（摄取 → 并发分析 → 聚合）
//! - `batch_coordinator` - 批量文档处理，文档级并发控制与失败隔离

pub mod batch_coordinator;
pub mod document_pipeline;

pub use batch_coordinator::process_batch;
pub use document_pipeline::{analyze_pages, process_document};
