//! HTTP 路由与处理器
//!
//! 请求形状校验在任何处理开始前完成；错误类别映射为对应状态码：
//! 400 下载/格式/校验问题，413 文件过大，500 内部失败

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::config::Config;
use crate::error::{AppError, AppResult, IngestError, ValidationError};
use crate::models::{ApiResponse, ErrorResponse, ExtractRequest, TokenMeter};
use crate::orchestrator::{process_batch, process_document};
use crate::services::{DocumentService, PageAnalyzer};

pub const APP_NAME: &str = "Medical Bill Extraction API";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// 共享应用状态（组件都是廉价克隆）
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub analyzer: PageAnalyzer,
    pub documents: DocumentService,
}

impl AppState {
    pub fn new(config: Config) -> AppResult<Self> {
        let analyzer = PageAnalyzer::new(&config);
        let documents = DocumentService::new(&config)?;
        Ok(Self {
            config,
            analyzer,
            documents,
        })
    }
}

/// 构建路由
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/extract-bill-data", post(extract_bill_data))
        .route("/health", get(health))
        .route("/", get(root))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// 校验后的请求形态
#[derive(Debug)]
enum RequestKind {
    Single(String),
    Batch(Vec<String>),
}

/// document 与 documents 必须恰好给出一个
fn validate_request(request: ExtractRequest) -> Result<RequestKind, ValidationError> {
    match (request.document, request.documents) {
        (Some(_), Some(_)) => Err(ValidationError::AmbiguousDocument),
        (None, None) => Err(ValidationError::MissingDocument),
        (Some(url), None) => Ok(RequestKind::Single(url)),
        (None, Some(urls)) => {
            if urls.is_empty() {
                Err(ValidationError::EmptyDocumentList)
            } else {
                Ok(RequestKind::Batch(urls))
            }
        }
    }
}

/// 错误类别 → HTTP 状态码
fn error_status(err: &AppError) -> StatusCode {
    match err {
        AppError::Validation(_) => StatusCode::BAD_REQUEST,
        AppError::Ingest(IngestError::FileTooLarge { .. }) => StatusCode::PAYLOAD_TOO_LARGE,
        AppError::Ingest(IngestError::ConversionFailed { .. }) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
        AppError::Ingest(_) => StatusCode::BAD_REQUEST,
        AppError::Model(_) | AppError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// 提取账单数据（单文档或批量）
async fn extract_bill_data(
    State(state): State<AppState>,
    Json(request): Json<ExtractRequest>,
) -> Response {
    let kind = match validate_request(request) {
        Ok(kind) => kind,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::new(e.to_string())),
            )
                .into_response();
        }
    };

    match kind {
        RequestKind::Single(url) => {
            let meter = TokenMeter::new();
            match process_document(&state.analyzer, &state.documents, &state.config, &url, 0, &meter)
                .await
            {
                Ok(output) => Json(ApiResponse {
                    is_success: true,
                    token_usage: output.usage,
                    data: output.data,
                })
                .into_response(),
                Err(e) => {
                    error!("提取失败: {}", e);
                    (error_status(&e), Json(ErrorResponse::new(e.to_string()))).into_response()
                }
            }
        }
        RequestKind::Batch(urls) => {
            // 批量模式永不整体失败，部分结果总是返回
            let response =
                process_batch(&state.analyzer, &state.documents, &state.config, &urls).await;
            Json(response).into_response()
        }
    }
}

/// 存活探针
async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "service": APP_NAME,
        "version": APP_VERSION,
    }))
}

/// 服务信息
async fn root() -> Json<serde_json::Value> {
    Json(json!({
        "message": APP_NAME,
        "version": APP_VERSION,
        "endpoints": {
            "extract": "/extract-bill-data",
            "health": "/health",
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(document: Option<&str>, documents: Option<Vec<&str>>) -> ExtractRequest {
        ExtractRequest {
            document: document.map(String::from),
            documents: documents.map(|v| v.into_iter().map(String::from).collect()),
        }
    }

    #[test]
    fn test_validate_single() {
        let kind = validate_request(request(Some("http://a/b.pdf"), None)).unwrap();
        assert!(matches!(kind, RequestKind::Single(_)));
    }

    #[test]
    fn test_validate_batch() {
        let kind = validate_request(request(None, Some(vec!["http://a", "http://b"]))).unwrap();
        match kind {
            RequestKind::Batch(urls) => assert_eq!(urls.len(), 2),
            _ => panic!("expected batch"),
        }
    }

    #[test]
    fn test_validate_rejects_neither() {
        let err = validate_request(request(None, None)).unwrap_err();
        assert!(matches!(err, ValidationError::MissingDocument));
    }

    #[test]
    fn test_validate_rejects_both() {
        let err = validate_request(request(Some("http://a"), Some(vec!["http://b"]))).unwrap_err();
        assert!(matches!(err, ValidationError::AmbiguousDocument));
    }

    #[test]
    fn test_validate_rejects_empty_list() {
        let err = validate_request(request(None, Some(vec![]))).unwrap_err();
        assert!(matches!(err, ValidationError::EmptyDocumentList));
    }

    #[test]
    fn test_error_status_mapping() {
        let too_large = AppError::Ingest(IngestError::FileTooLarge {
            size_mb: 80.0,
            limit_mb: 50,
        });
        assert_eq!(error_status(&too_large), StatusCode::PAYLOAD_TOO_LARGE);

        let unsupported = AppError::Ingest(IngestError::UnsupportedFormat);
        assert_eq!(error_status(&unsupported), StatusCode::BAD_REQUEST);

        let internal = AppError::Other("boom".to_string());
        assert_eq!(error_status(&internal), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
