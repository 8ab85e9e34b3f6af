//! 单个文档处理器 - 编排层
//!
//! ## 职责
//!
//! 负责一个文档端到端的处理：下载 → 转图 → 并发分析各页 → 聚合。
//!
//! ## 核心功能
//!
//! 1. **摄取委托**：下载与 PDF 转图委托给 `DocumentService`，此处失败对文档是终止性的
//! 2. **分批并发**：页面按固定批次顺序处理，批内并发、Semaphore 限流，
//!    每批完成后把已接受的条目名传给下一批作为去重上下文
//! 3. **顺序恢复**：并发任务完成顺序不定，合并前按页码重排，
//!    最终输出顺序恒等于摄取顺序
//! 4. **失败隔离**：单页失败只是该页缺席，仅当所有页都失败才判定文档失败
//! 5. **用量记账**：token 消耗在页面任务内当场记入共享计量器，
//!    按实际发生的调用累加，与文档最终成败无关

use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::{error, info};

use crate::config::Config;
use crate::error::{AppError, AppResult, ModelError};
use crate::models::{DocumentOutput, PageData, PageImage, PageResult, TokenMeter, TokenUsage};
use crate::services::{aggregate_pages, DocumentService, PageAnalyzer};

/// 处理单个文档
///
/// # 参数
/// - `analyzer`: 页面分析服务
/// - `documents`: 文档获取服务
/// - `config`: 配置
/// - `url`: 文档 URL
/// - `doc_index`: 文档索引（用于日志）
/// - `meter`: 共享 token 计量器，每次模型调用完成即记账
pub async fn process_document(
    analyzer: &PageAnalyzer,
    documents: &DocumentService,
    config: &Config,
    url: &str,
    doc_index: usize,
    meter: &TokenMeter,
) -> AppResult<DocumentOutput> {
    info!("[文档 {}] 开始处理: {}", doc_index, url);

    // ========== 摄取：下载 + 转图（失败终止该文档） ==========
    let bytes = documents.download(url).await?;
    let images = documents.to_page_images(bytes).await?;
    info!("[文档 {}] 共 {} 页待分析", doc_index, images.len());

    analyze_pages(analyzer, images, config, doc_index, meter).await
}

/// 并发分析已栅格化的页面序列并聚合
pub async fn analyze_pages(
    analyzer: &PageAnalyzer,
    images: Vec<PageImage>,
    config: &Config,
    doc_index: usize,
    meter: &TokenMeter,
) -> AppResult<DocumentOutput> {
    let total_pages = images.len();

    // ========== 分批并发分析 ==========
    let semaphore = Arc::new(Semaphore::new(config.max_concurrent_pages));
    let batch_size = config.page_batch_size.max(1);
    let mut page_results: Vec<PageResult> = Vec::with_capacity(total_pages);
    // 已接受条目名，只追加、跨批传递，从不被并发任务修改
    let mut prior_item_names: Vec<String> = Vec::new();

    for batch_start in (0..total_pages).step_by(batch_size) {
        let batch_end = (batch_start + batch_size).min(total_pages);
        let mut handles = Vec::new();

        for page_idx in batch_start..batch_end {
            let page_no = page_idx + 1;
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| AppError::Other(format!("page gate closed: {}", e)))?;

            let analyzer = analyzer.clone();
            let image = images[page_idx].clone();
            let prior = prior_item_names.clone();
            let meter = meter.clone();

            let handle = tokio::spawn(async move {
                let _permit = permit;
                let result = analyzer.analyze(&image, page_no, total_pages, &prior).await;
                // 调用一旦发生立即记账，不等文档收场
                meter.record(&result.usage);
                result
            });
            handles.push((page_no, handle));
        }

        // 等待本批所有页面完成
        let mut batch_results = Vec::with_capacity(handles.len());
        for (page_no, handle) in handles {
            match handle.await {
                Ok(result) => batch_results.push(result),
                Err(e) => {
                    error!("[文档 {}] 第 {} 页任务执行失败: {}", doc_index, page_no, e);
                    batch_results.push(PageResult::failed(
                        page_no,
                        format!("page task failed: {}", e),
                    ));
                }
            }
        }

        // 本批成功页的条目名进入下一批的去重上下文
        for result in &batch_results {
            if let Some(data) = result.page_data() {
                prior_item_names.extend(data.bill_items.iter().map(|i| i.item_name.clone()));
            }
        }

        page_results.extend(batch_results);
    }

    // ========== 合并前按页码重排（完成顺序与页序无关） ==========
    sort_into_page_order(&mut page_results);

    let mut usage = TokenUsage::default();
    for result in &page_results {
        usage.add(&result.usage);
    }

    let successes: Vec<PageData> = page_results
        .iter()
        .filter_map(|r| r.page_data().cloned())
        .collect();
    let failed_pages = total_pages - successes.len();

    if successes.is_empty() {
        error!("[文档 {}] ❌ 全部 {} 页分析失败", doc_index, total_pages);
        return Err(AppError::Model(ModelError::AllPagesFailed { total_pages }));
    }
    if failed_pages > 0 {
        info!("[文档 {}] ⚠️ {} 页失败，继续聚合其余页面", doc_index, failed_pages);
    }

    // ========== 聚合 ==========
    let data = aggregate_pages(successes);

    info!(
        "[文档 {}] ✅ 提取完成: 保留 {} 页, {} 项, 消耗 {} tokens",
        doc_index,
        data.pagewise_line_items.len(),
        data.total_item_count,
        usage.total_tokens
    );

    Ok(DocumentOutput { usage, data })
}

/// 按页码升序重排页面结果
pub(crate) fn sort_into_page_order(results: &mut [PageResult]) {
    results.sort_by_key(|r| r.page_no);
}
