//! 对外接口的数据结构（serde 序列化边界）
//!
//! 模型返回的动态 JSON 在 `PageAnalyzer` 边界处被校验/规整成这里的
//! 严格类型，之后不再有未校验的动态结构向下游流动

use serde::{Deserialize, Deserializer, Serialize};

/// 页面分类
///
/// 决定该页条目是否会与其他页的条目重复计费：
/// - `BillDetail` / `Pharmacy` 为明细页
/// - `FinalBill` 为汇总页（仅出现类目/总计金额）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageType {
    #[serde(rename = "Bill Detail")]
    BillDetail,
    #[serde(rename = "Final Bill")]
    FinalBill,
    #[serde(rename = "Pharmacy")]
    Pharmacy,
}

impl PageType {
    /// 是否为明细页（逐项收费）
    pub fn is_itemized(self) -> bool {
        matches!(self, PageType::BillDetail | PageType::Pharmacy)
    }

    /// 是否为汇总页（仅总计金额）
    pub fn is_summary(self) -> bool {
        matches!(self, PageType::FinalBill)
    }
}

/// 账单中的单个收费条目
///
/// 数值字段在账单未标注时为 0.0，绝不通过除法推算
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillItem {
    pub item_name: String,
    #[serde(default, deserialize_with = "f64_or_zero")]
    pub item_amount: f64,
    #[serde(default, deserialize_with = "f64_or_zero")]
    pub item_rate: f64,
    #[serde(default, deserialize_with = "f64_or_zero")]
    pub item_quantity: f64,
}

/// 把 null / 缺失的数值字段规整为 0.0
fn f64_or_zero<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(0.0))
}

/// 单页提取结果（对外格式）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageData {
    /// 页码（对外格式为字符串，由流水线赋值，不信任模型自报的页码）
    pub page_no: String,
    pub page_type: PageType,
    #[serde(default)]
    pub bill_items: Vec<BillItem>,
}

/// 模型调用的 token 消耗，纯累加
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    #[serde(default)]
    pub total_tokens: u64,
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
}

impl TokenUsage {
    /// 累加另一次调用的消耗
    pub fn add(&mut self, other: &TokenUsage) {
        self.total_tokens += other.total_tokens;
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
    }
}

/// 聚合后的完整提取结果
///
/// 不变式：`total_item_count` 等于各保留页 `bill_items` 长度之和
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedData {
    pub pagewise_line_items: Vec<PageData>,
    pub total_item_count: usize,
}

/// 单文档成功响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse {
    pub is_success: bool,
    pub token_usage: TokenUsage,
    pub data: ExtractedData,
}

/// 错误响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub is_success: bool,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            is_success: false,
            message: message.into(),
        }
    }
}

/// 提取请求体
///
/// `document` 与 `documents` 必须恰好给出一个
#[derive(Debug, Clone, Deserialize)]
pub struct ExtractRequest {
    #[serde(default)]
    pub document: Option<String>,
    #[serde(default)]
    pub documents: Option<Vec<String>>,
}

/// 批量模式下单个文档的成功结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchDocumentResult {
    pub document_index: usize,
    pub url: String,
    pub data: ExtractedData,
}

/// 批量模式下单个文档的失败记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchDocumentError {
    pub document_index: usize,
    pub url: String,
    pub error: String,
}

/// 批量模式响应
///
/// 顶层 `is_success` 表示是否所有文档都成功；部分失败时仍返回全部结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResponse {
    pub is_success: bool,
    pub batch_mode: bool,
    pub total_documents: usize,
    pub successful_count: usize,
    pub failed_count: usize,
    pub total_items_extracted: usize,
    pub token_usage: TokenUsage,
    pub results: Vec<BatchDocumentResult>,
    /// 没有失败时为 null
    pub errors: Option<Vec<BatchDocumentError>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_type_wire_names() {
        assert_eq!(
            serde_json::to_string(&PageType::BillDetail).unwrap(),
            "\"Bill Detail\""
        );
        assert_eq!(
            serde_json::from_str::<PageType>("\"Final Bill\"").unwrap(),
            PageType::FinalBill
        );
        assert_eq!(
            serde_json::from_str::<PageType>("\"Pharmacy\"").unwrap(),
            PageType::Pharmacy
        );
    }

    #[test]
    fn test_bill_item_null_coercion() {
        // null 和缺失字段都规整为 0.0
        let item: BillItem = serde_json::from_str(
            r#"{"item_name": "X-Ray", "item_amount": 800.0, "item_rate": null}"#,
        )
        .unwrap();
        assert_eq!(item.item_amount, 800.0);
        assert_eq!(item.item_rate, 0.0);
        assert_eq!(item.item_quantity, 0.0);
    }

    #[test]
    fn test_token_usage_add() {
        let mut usage = TokenUsage::default();
        usage.add(&TokenUsage {
            total_tokens: 100,
            input_tokens: 80,
            output_tokens: 20,
        });
        usage.add(&TokenUsage {
            total_tokens: 50,
            input_tokens: 30,
            output_tokens: 20,
        });
        assert_eq!(usage.total_tokens, 150);
        assert_eq!(usage.input_tokens, 110);
        assert_eq!(usage.output_tokens, 40);
    }

    #[test]
    fn test_extract_request_accepts_either_field() {
        let single: ExtractRequest =
            serde_json::from_str(r#"{"document": "http://a/b.pdf"}"#).unwrap();
        assert!(single.document.is_some());
        assert!(single.documents.is_none());

        let batch: ExtractRequest =
            serde_json::from_str(r#"{"documents": ["http://a/b.pdf"]}"#).unwrap();
        assert!(batch.document.is_none());
        assert_eq!(batch.documents.unwrap().len(), 1);
    }
}
