pub mod domain;
pub mod schemas;

pub use domain::{DocumentOutput, PageImage, PageOutcome, PageResult, TokenMeter};
pub use schemas::{
    ApiResponse, BatchDocumentError, BatchDocumentResult, BatchResponse, BillItem, ErrorResponse,
    ExtractRequest, ExtractedData, PageData, PageType, TokenUsage,
};
