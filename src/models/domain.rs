//! 内部领域类型
//!
//! 这些类型只在一次文档处理的生命周期内存在，构造后不再修改；
//! 并发任务各自写入独立的结果，由流水线在 await 之后合并

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::models::schemas::{ExtractedData, PageData, TokenUsage};

/// 单页分析结果
///
/// 每页恰好产生一个，页级失败被吸收为 `Failed`，绝不向上抛异常中断文档
#[derive(Debug, Clone)]
pub struct PageResult {
    /// 页码（1 起始，由流水线赋值）
    pub page_no: usize,
    pub outcome: PageOutcome,
    pub usage: TokenUsage,
}

impl PageResult {
    /// 构造失败结果（消耗记 0）
    pub fn failed(page_no: usize, reason: impl Into<String>) -> Self {
        Self {
            page_no,
            outcome: PageOutcome::Failed(reason.into()),
            usage: TokenUsage::default(),
        }
    }

    /// 取成功的页面数据
    pub fn page_data(&self) -> Option<&PageData> {
        match &self.outcome {
            PageOutcome::Success(data) => Some(data),
            PageOutcome::Failed(_) => None,
        }
    }
}

/// 页面处理结局（显式标签，不靠跨任务异常传播）
#[derive(Debug, Clone)]
pub enum PageOutcome {
    Success(PageData),
    Failed(String),
}

/// 一页的栅格化图像
#[derive(Debug, Clone)]
pub struct PageImage {
    /// MIME 类型（PDF 渲染页恒为 image/png，图片原样透传）
    pub mime: &'static str,
    pub data: Vec<u8>,
}

/// 单个文档的最终产物
#[derive(Debug, Clone)]
pub struct DocumentOutput {
    pub usage: TokenUsage,
    pub data: ExtractedData,
}

/// 跨任务共享的 token 计量器
///
/// 页面任务在模型调用返回的瞬间记账，因此文档后续怎么收场
/// （解析全败、超时、任务被丢弃）都不会丢失已发生调用的消耗。
/// 记账只增不减，快照随时可取
#[derive(Debug, Clone, Default)]
pub struct TokenMeter {
    inner: Arc<MeterInner>,
}

#[derive(Debug, Default)]
struct MeterInner {
    total: AtomicU64,
    input: AtomicU64,
    output: AtomicU64,
}

impl TokenMeter {
    pub fn new() -> Self {
        Self::default()
    }

    /// 记入一次调用的消耗
    pub fn record(&self, usage: &TokenUsage) {
        self.inner.total.fetch_add(usage.total_tokens, Ordering::Relaxed);
        self.inner.input.fetch_add(usage.input_tokens, Ordering::Relaxed);
        self.inner.output.fetch_add(usage.output_tokens, Ordering::Relaxed);
    }

    /// 当前累计值的快照
    pub fn snapshot(&self) -> TokenUsage {
        TokenUsage {
            total_tokens: self.inner.total.load(Ordering::Relaxed),
            input_tokens: self.inner.input.load(Ordering::Relaxed),
            output_tokens: self.inner.output.load(Ordering::Relaxed),
        }
    }
}
