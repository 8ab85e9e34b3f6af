//! 批量文档处理器 - 编排层
//!
//! ## 职责
//!
//! 在文档级 Semaphore 之下并发运行多个 `process_document`，
//! 隔离单个文档的失败并汇总全局统计。
//!
//! ## 设计特点
//!
//! - **失败隔离**：任何单个文档的错误都转成该文档的错误记录，不影响兄弟文档
//! - **超时回收**：单个文档超时后该文档记为失败，任务退出时许可自动释放
//! - **按调用记账**：token 消耗来自实际发生的模型调用，与文档成败无关，
//!   全败或超时的文档已发生的调用照样计入批次总量

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tracing::{error, info};

use crate::config::Config;
use crate::error::AppError;
use crate::models::{BatchDocumentError, BatchDocumentResult, BatchResponse, TokenMeter};
use crate::orchestrator::document_pipeline::process_document;
use crate::services::{DocumentService, PageAnalyzer};

/// 批量处理多个文档 URL
///
/// 永不整体失败：部分失败的批次仍返回全部成功结果与逐文档错误记录
pub async fn process_batch(
    analyzer: &PageAnalyzer,
    documents: &DocumentService,
    config: &Config,
    urls: &[String],
) -> BatchResponse {
    let total_documents = urls.len();
    info!(
        "📦 批量模式: {} 个文档, 并发上限 {}",
        total_documents, config.max_concurrent_documents
    );

    let semaphore = Arc::new(Semaphore::new(config.max_concurrent_documents));
    let timeout = Duration::from_secs(config.document_timeout_secs);
    // 整个批次共用一个计量器，失败文档已发生的调用也被记入
    let meter = TokenMeter::new();
    let mut handles = Vec::with_capacity(total_documents);

    for (doc_index, url) in urls.iter().enumerate() {
        let permit = match semaphore.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(e) => {
                // Semaphore 永不关闭，这里只是兜底
                handles.push((doc_index, url.clone(), None));
                error!("[文档 {}] 无法获取并发许可: {}", doc_index, e);
                continue;
            }
        };

        let analyzer = analyzer.clone();
        let documents = documents.clone();
        let config = config.clone();
        let url_owned = url.clone();
        let meter = meter.clone();

        let handle = tokio::spawn(async move {
            let _permit = permit;
            match tokio::time::timeout(
                timeout,
                process_document(&analyzer, &documents, &config, &url_owned, doc_index, &meter),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => {
                    error!("[文档 {}] ⏱️ 处理超时 ({}s)", doc_index, timeout.as_secs());
                    Err(AppError::Other(format!(
                        "document processing timed out after {}s",
                        timeout.as_secs()
                    )))
                }
            }
        });
        handles.push((doc_index, url.clone(), Some(handle)));
    }

    // 按文档顺序收集结果
    let mut total_items_extracted = 0usize;
    let mut results: Vec<BatchDocumentResult> = Vec::new();
    let mut errors: Vec<BatchDocumentError> = Vec::new();

    for (doc_index, url, handle) in handles {
        let outcome = match handle {
            Some(handle) => match handle.await {
                Ok(outcome) => outcome,
                Err(e) => Err(AppError::Other(format!("document task failed: {}", e))),
            },
            None => Err(AppError::Other("failed to acquire document slot".to_string())),
        };

        match outcome {
            Ok(output) => {
                total_items_extracted += output.data.total_item_count;
                results.push(BatchDocumentResult {
                    document_index: doc_index,
                    url,
                    data: output.data,
                });
            }
            Err(e) => {
                error!("[文档 {}] ❌ 处理失败: {}", doc_index, e);
                errors.push(BatchDocumentError {
                    document_index: doc_index,
                    url,
                    error: e.to_string(),
                });
            }
        }
    }

    let successful_count = results.len();
    let failed_count = errors.len();
    let usage = meter.snapshot();
    info!(
        "📊 批量完成: 成功 {}/{}, 失败 {}, 共提取 {} 项",
        successful_count, total_documents, failed_count, total_items_extracted
    );

    BatchResponse {
        is_success: failed_count == 0,
        batch_mode: true,
        total_documents,
        successful_count,
        failed_count,
        total_items_extracted,
        token_usage: usage,
        results,
        errors: if errors.is_empty() { None } else { Some(errors) },
    }
}
