//! 页面分析服务 - 业务能力层
//!
//! 包装"对一页的一次模型调用"，并把动态的模型输出规整成规范的
//! `PageResult`。只处理单页，不关心页间顺序和聚合：
//! - 不出现 Vec<PageImage>
//! - 不关心文档级流程
//!
//! 页级失败（调用失败/解析失败）一律吸收为 `PageOutcome::Failed`，
//! 单页失败绝不中断整个文档

use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;
use tracing::{info, warn};

use crate::clients::VisionClient;
use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::models::{BillItem, PageData, PageImage, PageResult, PageOutcome, PageType};
use crate::utils::logging::truncate_text;

/// 提取提示词
///
/// 禁止模型用除法推算单价/数量，并要求给出页面分类
const EXTRACTION_PROMPT: &str = r#"You are an expert Medical Bill Auditor with forensic accounting skills.

TASK: Extract line items from this medical bill page into JSON format.

CRITICAL EXTRACTION RULES:
1. ONLY extract INDIVIDUAL CHARGEABLE ITEMS (medicines, procedures, tests, consultations, room charges)
2. STRICTLY IGNORE these rows (they are NOT line items):
   - Headers (e.g., "Description", "Qty", "Rate", "Amount")
   - Subtotals (e.g., "Subtotal", "Department Total", "Sub Total")
   - Tax rows (e.g., "GST", "CGST", "SGST", "Tax")
   - Discount rows (unless the discount is embedded in item_amount)
   - Grand totals (e.g., "Total", "Net Amount", "Final Total", "Amount Payable")
   - Round-off adjustments
   - Summary sections

3. For each valid line item, extract:
   - item_name: Exact name from the bill (translate to English if non-English)
   - item_rate: Price per unit ONLY if explicitly shown on the bill
   - item_quantity: Number of units ONLY if explicitly shown on the bill
   - item_amount: Total amount for that item (ALWAYS extract this)

4. RATE AND QUANTITY EXTRACTION (CRITICAL):
   - DO NOT calculate or infer item_rate or item_quantity using math/division
   - DO NOT use unitary method (e.g., rate = amount / quantity)
   - ONLY extract rate/quantity if they are EXPLICITLY PRINTED on the bill
   - If item_rate is NOT shown on bill, set item_rate = 0.0
   - If item_quantity is NOT shown on bill, set item_quantity = 0.0
   - Never treat a "Gross" or "Total" column as the rate

5. DATA QUALITY RULES:
   - If item_amount is 0 or missing, skip that row
   - If handwritten text exists, transcribe it accurately
   - If text is in Hindi/regional languages, translate item_name to English
   - Keep numerical values as-is (don't add currency symbols)

6. PAGE CLASSIFICATION:
   - "Bill Detail": Contains itemized charges
   - "Final Bill": Contains summary/total page
   - "Pharmacy": Medicine/drug bills

OUTPUT FORMAT (JSON):
{
  "page_no": "1",
  "page_type": "Bill Detail | Final Bill | Pharmacy",
  "bill_items": [
    {
      "item_name": "string",
      "item_rate": 0.0,
      "item_quantity": 0.0,
      "item_amount": 0.0
    }
  ]
}

IMPORTANT: Return ONLY the JSON object. No additional text or explanation.
DO NOT calculate missing rate or quantity values. Extract only what is visible."#;

/// 模型返回的原始页面形状
///
/// 模型自报的 page_no 不被信任，直接忽略；缺失/null 数值已在
/// `BillItem` 的反序列化里规整为 0.0
#[derive(Debug, Deserialize)]
struct RawPage {
    page_type: PageType,
    #[serde(default)]
    bill_items: Vec<BillItem>,
}

/// 页面分析服务
#[derive(Clone)]
pub struct PageAnalyzer {
    client: VisionClient,
    prior_items_window: usize,
}

impl PageAnalyzer {
    /// 创建新的页面分析服务
    pub fn new(config: &Config) -> Self {
        Self {
            client: VisionClient::new(config),
            prior_items_window: config.prior_items_window,
        }
    }

    /// 分析一页
    ///
    /// # 参数
    /// - `image`: 页面图像
    /// - `page_no`: 页码（1 起始，由调用方赋值并覆盖模型自报的页码）
    /// - `total_pages`: 文档总页数（用于提示词中的页面定位）
    /// - `prior_item_names`: 此前各页已接受的条目名，注入提示词抑制重复提取
    ///
    /// # 返回
    /// 每页恰好返回一个 `PageResult`；任何失败都被吸收为 Failed 结局
    pub async fn analyze(
        &self,
        image: &PageImage,
        page_no: usize,
        total_pages: usize,
        prior_item_names: &[String],
    ) -> PageResult {
        let prompt = self.build_prompt(page_no, total_pages, prior_item_names);

        let (raw, usage) = match self.client.analyze_page(&prompt, image).await {
            Ok(result) => result,
            Err(e) => {
                warn!("✗ 第 {} 页模型调用失败: {}", page_no, e);
                return PageResult::failed(page_no, e.to_string());
            }
        };

        match parse_page_response(&raw, page_no) {
            Ok(data) => {
                info!(
                    "✓ 第 {} 页: {:?}, {} 项, {} tokens",
                    page_no,
                    data.page_type,
                    data.bill_items.len(),
                    usage.total_tokens
                );
                PageResult {
                    page_no,
                    outcome: PageOutcome::Success(data),
                    usage,
                }
            }
            Err(e) => {
                warn!(
                    "✗ 第 {} 页解析失败: {} (响应: {})",
                    page_no,
                    e,
                    truncate_text(&raw, 200)
                );
                // 解析失败的调用仍然消耗了 token，照实记账
                PageResult {
                    page_no,
                    outcome: PageOutcome::Failed(e.to_string()),
                    usage,
                }
            }
        }
    }

    /// 构建完整提示词：已见条目上下文 + 提取规则 + 页面定位
    fn build_prompt(&self, page_no: usize, total_pages: usize, prior_item_names: &[String]) -> String {
        let mut prompt = String::new();

        if !prior_item_names.is_empty() {
            let window: Vec<&str> = prior_item_names
                .iter()
                .take(self.prior_items_window)
                .map(String::as_str)
                .collect();
            prompt.push_str(&format!(
                "ITEMS ALREADY EXTRACTED FROM EARLIER PAGES ({} total). \
                 SKIP duplicates and indented breakup children of these:\n- {}\n\n",
                prior_item_names.len(),
                window.join("\n- ")
            ));
        }

        prompt.push_str(EXTRACTION_PROMPT);
        prompt.push_str(&format!("\n\nThis is page {} of {} of the bill.", page_no, total_pages));
        prompt
    }
}

/// 把模型原始文本解析成规范的 `PageData`
///
/// - 容忍 Markdown 代码围栏和少量闲聊，截取其中的 JSON 对象
/// - 调用方传入的 `page_no` 覆盖模型自报页码
/// - 金额非正的条目在此丢弃
fn parse_page_response(raw: &str, page_no: usize) -> AppResult<PageData> {
    let json_text = json_object_re()
        .find(raw)
        .map(|m| m.as_str())
        .ok_or_else(|| AppError::parse_failed("no JSON object found in model response"))?;

    let raw_page: RawPage = serde_json::from_str(json_text)
        .map_err(|e| AppError::parse_failed(e.to_string()))?;

    let bill_items: Vec<BillItem> = raw_page
        .bill_items
        .into_iter()
        .filter(|item| item.item_amount > 0.0)
        .collect();

    Ok(PageData {
        page_no: page_no.to_string(),
        page_type: raw_page.page_type,
        bill_items,
    })
}

/// 截取 JSON 对象用的正则，进程内只编译一次
fn json_object_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)\{.*\}").expect("字面量模式必定合法"))
}
