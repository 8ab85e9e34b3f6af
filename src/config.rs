/// 程序配置
///
/// 启动时构造一次，之后以只读方式传入各组件，不使用全局单例
#[derive(Clone, Debug)]
pub struct Config {
    // --- 服务配置 ---
    /// 监听地址
    pub host: String,
    /// 监听端口
    pub port: u16,
    // --- 视觉模型配置 ---
    pub vision_api_key: String,
    pub vision_api_base_url: String,
    pub vision_model_name: String,
    /// 生成温度（提取任务用低温度）
    pub vision_temperature: f32,
    // --- 文档处理配置 ---
    /// 文件大小上限（MB）
    pub max_file_size_mb: u64,
    /// PDF 渲染 DPI
    pub pdf_dpi: f32,
    /// 单个文档最多处理的页数
    pub max_pages: usize,
    /// 下载超时（秒）
    pub download_timeout_secs: u64,
    /// 单个文档整体处理超时（秒），批量模式下生效
    pub document_timeout_secs: u64,
    // --- 并发配置 ---
    /// 单个文档内同时分析的页数
    pub max_concurrent_pages: usize,
    /// 批量模式下同时处理的文档数
    pub max_concurrent_documents: usize,
    /// 页面分批大小（每批完成后再开始下一批，跨批传递已见条目）
    pub page_batch_size: usize,
    /// 注入提示词的"已见条目"窗口大小
    pub prior_items_window: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            vision_api_key: String::new(),
            vision_api_base_url: "https://api.openai.com/v1".to_string(),
            vision_model_name: "gpt-4o-mini".to_string(),
            vision_temperature: 0.1,
            max_file_size_mb: 50,
            pdf_dpi: 300.0,
            max_pages: 25,
            download_timeout_secs: 300,
            document_timeout_secs: 300,
            max_concurrent_pages: 5,
            max_concurrent_documents: 5,
            page_batch_size: 5,
            prior_items_window: 10,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            host: std::env::var("HOST").unwrap_or(default.host),
            port: std::env::var("PORT").ok().and_then(|v| v.parse().ok()).unwrap_or(default.port),
            vision_api_key: std::env::var("VISION_API_KEY").unwrap_or(default.vision_api_key),
            vision_api_base_url: std::env::var("VISION_API_BASE_URL").unwrap_or(default.vision_api_base_url),
            vision_model_name: std::env::var("VISION_MODEL_NAME").unwrap_or(default.vision_model_name),
            vision_temperature: std::env::var("VISION_TEMPERATURE").ok().and_then(|v| v.parse().ok()).unwrap_or(default.vision_temperature),
            max_file_size_mb: std::env::var("MAX_FILE_SIZE_MB").ok().and_then(|v| v.parse().ok()).unwrap_or(default.max_file_size_mb),
            pdf_dpi: std::env::var("PDF_DPI").ok().and_then(|v| v.parse().ok()).unwrap_or(default.pdf_dpi),
            max_pages: std::env::var("MAX_PAGES").ok().and_then(|v| v.parse().ok()).unwrap_or(default.max_pages),
            download_timeout_secs: std::env::var("DOWNLOAD_TIMEOUT_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.download_timeout_secs),
            document_timeout_secs: std::env::var("DOCUMENT_TIMEOUT_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.document_timeout_secs),
            max_concurrent_pages: std::env::var("MAX_CONCURRENT_PAGES").ok().and_then(|v| v.parse().ok()).unwrap_or(default.max_concurrent_pages),
            max_concurrent_documents: std::env::var("MAX_CONCURRENT_DOCUMENTS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.max_concurrent_documents),
            page_batch_size: std::env::var("PAGE_BATCH_SIZE").ok().and_then(|v| v.parse().ok()).unwrap_or(default.page_batch_size),
            prior_items_window: std::env::var("PRIOR_ITEMS_WINDOW").ok().and_then(|v| v.parse().ok()).unwrap_or(default.prior_items_window),
        }
    }
}
