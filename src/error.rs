use std::fmt;

/// 应用程序错误类型
///
/// Display 文本会直接出现在 API 响应的 message 字段中，因此用英文
#[derive(Debug)]
pub enum AppError {
    /// 文档获取/转换错误
    Ingest(IngestError),
    /// 视觉模型调用错误
    Model(ModelError),
    /// 请求体校验错误
    Validation(ValidationError),
    /// 其他错误（用于包装第三方库错误）
    Other(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Ingest(e) => write!(f, "{}", e),
            AppError::Model(e) => write!(f, "{}", e),
            AppError::Validation(e) => write!(f, "{}", e),
            AppError::Other(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Ingest(e) => Some(e),
            AppError::Model(e) => Some(e),
            AppError::Validation(e) => Some(e),
            AppError::Other(_) => None,
        }
    }
}

/// 文档获取/转换错误
#[derive(Debug)]
pub enum IngestError {
    /// 下载失败（网络层）
    DownloadFailed {
        url: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 下载返回了非 200 状态码
    BadStatus {
        url: String,
        status: u16,
    },
    /// 文件超出大小限制
    FileTooLarge {
        size_mb: f64,
        limit_mb: u64,
    },
    /// 不支持的文件格式
    UnsupportedFormat,
    /// PDF 转图片失败
    ConversionFailed {
        message: String,
    },
    /// 文档没有任何页面
    EmptyDocument,
}

impl fmt::Display for IngestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IngestError::DownloadFailed { url, source } => {
                write!(f, "Failed to download document from {}: {}", url, source)
            }
            IngestError::BadStatus { url, status } => {
                write!(f, "Failed to download document from {}. Status: {}", url, status)
            }
            IngestError::FileTooLarge { size_mb, limit_mb } => {
                write!(f, "File size ({:.2}MB) exceeds limit ({}MB)", size_mb, limit_mb)
            }
            IngestError::UnsupportedFormat => {
                write!(f, "Unsupported file format. Only PDF and images (PNG, JPG) are supported.")
            }
            IngestError::ConversionFailed { message } => {
                write!(f, "Failed to process PDF: {}", message)
            }
            IngestError::EmptyDocument => {
                write!(f, "Document contains no pages")
            }
        }
    }
}

impl std::error::Error for IngestError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            IngestError::DownloadFailed { source, .. } => {
                Some(source.as_ref() as &(dyn std::error::Error + 'static))
            }
            _ => None,
        }
    }
}

/// 视觉模型调用错误
#[derive(Debug)]
pub enum ModelError {
    /// API 调用失败
    InvocationFailed {
        model: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 返回内容为空
    EmptyResponse {
        model: String,
    },
    /// 返回内容不是期望形状的 JSON
    ParseFailed {
        message: String,
    },
    /// 所有页面都分析失败
    AllPagesFailed {
        total_pages: usize,
    },
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelError::InvocationFailed { model, source } => {
                write!(f, "Vision model call failed (model: {}): {}", model, source)
            }
            ModelError::EmptyResponse { model } => {
                write!(f, "Vision model returned an empty response (model: {})", model)
            }
            ModelError::ParseFailed { message } => {
                write!(f, "Failed to parse model response: {}", message)
            }
            ModelError::AllPagesFailed { total_pages } => {
                write!(f, "Extraction failed for all {} page(s) of the document", total_pages)
            }
        }
    }
}

impl std::error::Error for ModelError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ModelError::InvocationFailed { source, .. } => {
                Some(source.as_ref() as &(dyn std::error::Error + 'static))
            }
            _ => None,
        }
    }
}

/// 请求体校验错误
#[derive(Debug)]
pub enum ValidationError {
    /// document 和 documents 都没给
    MissingDocument,
    /// document 和 documents 同时给了
    AmbiguousDocument,
    /// documents 为空数组
    EmptyDocumentList,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::MissingDocument => {
                write!(f, "Request must contain either 'document' or 'documents'")
            }
            ValidationError::AmbiguousDocument => {
                write!(f, "Provide either 'document' or 'documents', not both")
            }
            ValidationError::EmptyDocumentList => {
                write!(f, "'documents' must contain at least one URL")
            }
        }
    }
}

impl std::error::Error for ValidationError {}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建下载失败错误
    pub fn download_failed(
        url: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::Ingest(IngestError::DownloadFailed {
            url: url.into(),
            source: Box::new(source),
        })
    }

    /// 创建模型调用失败错误
    pub fn model_invocation_failed(
        model: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::Model(ModelError::InvocationFailed {
            model: model.into(),
            source: Box::new(source),
        })
    }

    /// 创建响应解析失败错误
    pub fn parse_failed(message: impl Into<String>) -> Self {
        AppError::Model(ModelError::ParseFailed {
            message: message.into(),
        })
    }

    /// 创建 PDF 转换失败错误
    pub fn conversion_failed(message: impl Into<String>) -> Self {
        AppError::Ingest(IngestError::ConversionFailed {
            message: message.into(),
        })
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
