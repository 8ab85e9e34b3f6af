//! 页面聚合服务 - 业务能力层
//!
//! 把一个文档的全部成功页面合并成最终条目清单，保证不重复计费：
//!
//! 1. 只要存在明细页（Bill Detail / Pharmacy），汇总页（Final Bill）
//!    整页丢弃——汇总金额与明细条目必然重复计费
//! 2. 文档只有汇总页时原样保留，它们是唯一可用的数据
//! 3. 防御性地再次过滤金额非正的条目
//! 4. 跨页模糊去重：规整后的条目名与任何已保留条目相似度 >= 0.85
//!    视为重复，保留首次出现
//!
//! 聚合本身从不失败，空输入也只是产出空结果

use strsim::normalized_levenshtein;
use tracing::info;

use crate::models::{BillItem, ExtractedData, PageData};

/// 判定重复条目的相似度阈值
pub const DUPLICATE_SIMILARITY_THRESHOLD: f64 = 0.85;

/// 聚合一个文档的成功页面
///
/// # 参数
/// - `pages`: 按页码升序排列的成功页面
///
/// # 返回
/// 保留页按原始页序排列，`total_item_count` 从保留集重新计算
pub fn aggregate_pages(pages: Vec<PageData>) -> ExtractedData {
    let has_itemized = pages.iter().any(|p| p.page_type.is_itemized());

    let mut seen_names: Vec<String> = Vec::new();
    let mut retained: Vec<PageData> = Vec::new();

    for page in pages {
        // 汇总页与明细页共存时，汇总页整页丢弃
        if has_itemized && page.page_type.is_summary() {
            info!("第 {} 页为汇总页且存在明细页，整页跳过以避免重复计费", page.page_no);
            continue;
        }

        let PageData {
            page_no,
            page_type,
            bill_items,
        } = page;

        let mut unique_items: Vec<BillItem> = Vec::new();
        for item in bill_items {
            // 上游已过滤，这里防御性兜底
            if item.item_amount <= 0.0 {
                continue;
            }

            let normalized = normalize_name(&item.item_name);
            if is_duplicate(&normalized, &seen_names) {
                info!("跳过重复条目: {}", item.item_name);
                continue;
            }

            seen_names.push(normalized);
            unique_items.push(item);
        }

        retained.push(PageData {
            page_no,
            page_type,
            bill_items: unique_items,
        });
    }

    let total_item_count = retained.iter().map(|p| p.bill_items.len()).sum();

    ExtractedData {
        pagewise_line_items: retained,
        total_item_count,
    }
}

/// 规整条目名用于比较：去首尾空白 + 大写化
fn normalize_name(name: &str) -> String {
    name.trim().to_uppercase()
}

/// 与任何已保留条目名相似度达到阈值即视为重复
fn is_duplicate(normalized: &str, seen: &[String]) -> bool {
    seen.iter()
        .any(|s| normalized_levenshtein(s, normalized) >= DUPLICATE_SIMILARITY_THRESHOLD)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PageType;

    fn item(name: &str, amount: f64) -> BillItem {
        BillItem {
            item_name: name.to_string(),
            item_amount: amount,
            item_rate: 0.0,
            item_quantity: 0.0,
        }
    }

    fn page(no: usize, page_type: PageType, items: Vec<BillItem>) -> PageData {
        PageData {
            page_no: no.to_string(),
            page_type,
            bill_items: items,
        }
    }

    #[test]
    fn test_summary_dropped_when_detail_exists() {
        // 3 页场景：1-2 为明细页（4 + 2 项），3 为汇总页（1 项）
        let pages = vec![
            page(
                1,
                PageType::BillDetail,
                vec![
                    item("Consultation", 500.0),
                    item("Blood Test CBC", 350.0),
                    item("X-Ray Chest", 800.0),
                    item("Room Charges", 2000.0),
                ],
            ),
            page(
                2,
                PageType::Pharmacy,
                vec![item("Amoxicillin 250mg", 120.0), item("Syringe 5ml", 15.0)],
            ),
            page(3, PageType::FinalBill, vec![item("Grand Total", 3785.0)]),
        ];

        let result = aggregate_pages(pages);

        assert_eq!(result.pagewise_line_items.len(), 2);
        assert_eq!(result.pagewise_line_items[0].page_no, "1");
        assert_eq!(result.pagewise_line_items[1].page_no, "2");
        assert_eq!(result.total_item_count, 6);
        // 汇总页的条目不得出现在结果里
        assert!(result
            .pagewise_line_items
            .iter()
            .all(|p| !p.page_type.is_summary()));
    }

    #[test]
    fn test_summary_only_document_is_retained() {
        let pages = vec![page(
            1,
            PageType::FinalBill,
            vec![
                item("Pharmacy Charges", 1200.0),
                item("Investigation Charges", 3400.0),
                item("Room Rent", 6000.0),
            ],
        )];

        let result = aggregate_pages(pages);

        assert_eq!(result.pagewise_line_items.len(), 1);
        assert_eq!(result.pagewise_line_items[0].page_no, "1");
        assert_eq!(result.total_item_count, 3);
    }

    #[test]
    fn test_all_summary_pages_retained() {
        let pages = vec![
            page(1, PageType::FinalBill, vec![item("Ward Charges", 5000.0)]),
            page(2, PageType::FinalBill, vec![item("Lab Charges", 1500.0)]),
        ];

        let result = aggregate_pages(pages);
        assert_eq!(result.pagewise_line_items.len(), 2);
        assert_eq!(result.total_item_count, 2);
    }

    #[test]
    fn test_non_positive_amounts_never_retained() {
        let pages = vec![page(
            1,
            PageType::BillDetail,
            vec![
                item("Valid Item", 100.0),
                item("Zero Item", 0.0),
                item("Negative Item", -20.0),
            ],
        )];

        let result = aggregate_pages(pages);
        assert_eq!(result.total_item_count, 1);
        assert_eq!(
            result.pagewise_line_items[0].bill_items[0].item_name,
            "Valid Item"
        );
    }

    #[test]
    fn test_fuzzy_dedup_across_pages() {
        let pages = vec![
            page(
                1,
                PageType::BillDetail,
                vec![item("Paracetamol 500mg", 30.0)],
            ),
            page(
                2,
                PageType::BillDetail,
                vec![item("PARACETAMOL  500MG ", 30.0), item("Cetirizine 10mg", 25.0)],
            ),
        ];

        let result = aggregate_pages(pages);

        // 两种写法折叠为一条，保留首次出现
        assert_eq!(result.total_item_count, 2);
        assert_eq!(result.pagewise_line_items[0].bill_items.len(), 1);
        assert_eq!(
            result.pagewise_line_items[0].bill_items[0].item_name,
            "Paracetamol 500mg"
        );
        assert_eq!(result.pagewise_line_items[1].bill_items.len(), 1);
        assert_eq!(
            result.pagewise_line_items[1].bill_items[0].item_name,
            "Cetirizine 10mg"
        );
    }

    #[test]
    fn test_dissimilar_names_are_kept() {
        let pages = vec![page(
            1,
            PageType::BillDetail,
            vec![item("MRI Brain", 5000.0), item("CT Scan Abdomen", 4000.0)],
        )];

        let result = aggregate_pages(pages);
        assert_eq!(result.total_item_count, 2);
    }

    #[test]
    fn test_reaggregation_is_idempotent() {
        let pages = vec![
            page(
                1,
                PageType::BillDetail,
                vec![item("Consultation", 500.0), item("Blood Test", 350.0)],
            ),
            page(2, PageType::FinalBill, vec![item("Total", 850.0)]),
        ];

        let first = aggregate_pages(pages);
        let second = aggregate_pages(first.pagewise_line_items.clone());

        assert_eq!(first.total_item_count, second.total_item_count);
        assert_eq!(
            serde_json::to_value(&first.pagewise_line_items).unwrap(),
            serde_json::to_value(&second.pagewise_line_items).unwrap()
        );
    }

    #[test]
    fn test_count_invariant_holds() {
        let pages = vec![
            page(
                1,
                PageType::BillDetail,
                vec![item("A", 1.0), item("B", 2.0), item("A ", 1.0)],
            ),
            page(2, PageType::Pharmacy, vec![item("C", 3.0)]),
            page(3, PageType::FinalBill, vec![item("Total", 6.0)]),
        ];

        let result = aggregate_pages(pages);
        let summed: usize = result
            .pagewise_line_items
            .iter()
            .map(|p| p.bill_items.len())
            .sum();
        assert_eq!(result.total_item_count, summed);
    }

    #[test]
    fn test_empty_input_yields_empty_result() {
        let result = aggregate_pages(Vec::new());
        assert!(result.pagewise_line_items.is_empty());
        assert_eq!(result.total_item_count, 0);
    }
}
