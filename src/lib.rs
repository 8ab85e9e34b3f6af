//! # Extract Bill Data
//!
//! 从扫描的医疗账单中提取结构化收费条目的 Rust 服务
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 客户端层（Clients）
//! - `clients/` - 封装对外部服务的调用，只暴露能力
//! - `VisionClient` - 一次带图的视觉模型调用
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，只处理单个对象
//! - `DocumentService` - 下载、格式识别、PDF 栅格化能力
//! - `PageAnalyzer` - 单页提取与响应规整能力
//! - `aggregator` - 分类排重与聚合能力
//!
//! ### ③ 编排层（Orchestration）
//! - `orchestrator/document_pipeline` - 单个文档端到端处理，页级并发控制
//! - `orchestrator/batch_coordinator` - 批量文档处理，文档级并发与失败隔离
//!
//! ### ④ 接口层（API）
//! - `api/` - axum 路由：POST /extract-bill-data, GET /health
//!
//! ## 防重复计费
//!
//! 聚合器以页面分类为主规则（明细页存在时整页丢弃汇总页）、
//! 跨页条目名模糊匹配为兜底，保证同一笔费用不会被计两次

pub mod api;
pub mod clients;
pub mod config;
pub mod error;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;

// 重新导出常用类型
pub use api::{router, AppState};
pub use clients::VisionClient;
pub use config::Config;
pub use error::{AppError, AppResult};
pub use models::{
    ApiResponse, BatchResponse, ExtractedData, PageData, PageType, TokenMeter, TokenUsage,
};
pub use orchestrator::{analyze_pages, process_batch, process_document};
pub use services::{aggregate_pages, DocumentService, PageAnalyzer};
