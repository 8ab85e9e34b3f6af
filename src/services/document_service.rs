//! 文档获取服务 - 业务能力层
//!
//! 负责"拿到页面图像"能力：下载、格式识别、PDF 栅格化。
//! 不关心页面之后如何被分析

use std::io::Cursor;
use std::time::Duration;

use image::ImageFormat;
use pdfium_render::prelude::*;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{AppError, AppResult, IngestError};
use crate::models::PageImage;

/// PDF 点为 1/72 英寸
const PDF_POINTS_PER_INCH: f32 = 72.0;

/// 支持的文件类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Pdf,
    Png,
    Jpeg,
}

/// 文档获取服务
#[derive(Clone)]
pub struct DocumentService {
    http: reqwest::Client,
    max_file_size_mb: u64,
    pdf_dpi: f32,
    max_pages: usize,
}

impl DocumentService {
    /// 创建新的文档获取服务
    pub fn new(config: &Config) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.download_timeout_secs))
            .build()
            .map_err(|e| AppError::Other(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            max_file_size_mb: config.max_file_size_mb,
            pdf_dpi: config.pdf_dpi,
            max_pages: config.max_pages,
        })
    }

    /// 从 URL 下载文档
    ///
    /// 非 200 状态码与超出大小限制都视为摄取失败，对该文档是终止性的
    pub async fn download(&self, url: &str) -> AppResult<Vec<u8>> {
        info!("正在下载文档: {}", url);

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| AppError::download_failed(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Ingest(IngestError::BadStatus {
                url: url.to_string(),
                status: status.as_u16(),
            }));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| AppError::download_failed(url, e))?;

        let size_mb = bytes.len() as f64 / (1024.0 * 1024.0);
        if size_mb > self.max_file_size_mb as f64 {
            return Err(AppError::Ingest(IngestError::FileTooLarge {
                size_mb,
                limit_mb: self.max_file_size_mb,
            }));
        }

        info!("✓ 下载完成: {:.2}MB", size_mb);
        Ok(bytes.to_vec())
    }

    /// 把文档字节转成按页排列的图像序列
    ///
    /// - 图片：原样作为单页透传
    /// - PDF：在阻塞线程上用 pdfium 逐页渲染为 PNG
    pub async fn to_page_images(&self, bytes: Vec<u8>) -> AppResult<Vec<PageImage>> {
        match detect_file_type(&bytes)? {
            FileType::Png => Ok(vec![PageImage {
                mime: "image/png",
                data: bytes,
            }]),
            FileType::Jpeg => Ok(vec![PageImage {
                mime: "image/jpeg",
                data: bytes,
            }]),
            FileType::Pdf => {
                let dpi = self.pdf_dpi;
                let max_pages = self.max_pages;
                // pdfium 不是线程安全的异步公民，整个转换在一个阻塞任务内完成
                let pages = tokio::task::spawn_blocking(move || {
                    render_pdf_pages(&bytes, dpi, max_pages)
                })
                .await
                .map_err(|e| AppError::Other(format!("PDF conversion task failed: {}", e)))??;

                if pages.is_empty() {
                    return Err(AppError::Ingest(IngestError::EmptyDocument));
                }
                Ok(pages)
            }
        }
    }
}

/// 通过魔数识别文件类型
pub fn detect_file_type(bytes: &[u8]) -> AppResult<FileType> {
    if bytes.starts_with(b"%PDF") {
        return Ok(FileType::Pdf);
    }
    if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
        return Ok(FileType::Png);
    }
    if bytes.starts_with(b"\xff\xd8") {
        return Ok(FileType::Jpeg);
    }
    Err(AppError::Ingest(IngestError::UnsupportedFormat))
}

/// 用 pdfium 把 PDF 逐页渲染为 PNG
fn render_pdf_pages(bytes: &[u8], dpi: f32, max_pages: usize) -> AppResult<Vec<PageImage>> {
    let pdfium = Pdfium::new(
        Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library())
            .map_err(|e| AppError::conversion_failed(format!("failed to bind pdfium: {}", e)))?,
    );

    let document = pdfium
        .load_pdf_from_byte_slice(bytes, None)
        .map_err(|e| AppError::conversion_failed(e.to_string()))?;

    let page_count = document.pages().len() as usize;
    let render_count = page_count.min(max_pages);
    if page_count > max_pages {
        warn!("⚠️ PDF 共 {} 页，超出上限，仅处理前 {} 页", page_count, max_pages);
    }

    info!("正在以 {} DPI 渲染 PDF，共 {} 页...", dpi, render_count);

    let scale = dpi / PDF_POINTS_PER_INCH;
    let mut pages = Vec::with_capacity(render_count);

    for (page_idx, page) in document.pages().iter().enumerate() {
        if page_idx >= render_count {
            break;
        }

        let pixel_width = (page.width().value * scale) as i32;
        let pixel_height = (page.height().value * scale) as i32;

        let bitmap = page
            .render_with_config(
                &PdfRenderConfig::new()
                    .set_target_width(pixel_width)
                    .set_target_height(pixel_height)
                    .render_form_data(true)
                    .render_annotations(true),
            )
            .map_err(|e| {
                AppError::conversion_failed(format!("page {}: {}", page_idx + 1, e))
            })?;

        let mut png_bytes = Vec::new();
        bitmap
            .as_image()
            .write_to(&mut Cursor::new(&mut png_bytes), ImageFormat::Png)
            .map_err(|e| {
                AppError::conversion_failed(format!("page {}: {}", page_idx + 1, e))
            })?;

        pages.push(PageImage {
            mime: "image/png",
            data: png_bytes,
        });
    }

    info!("✓ PDF 渲染完成: {} 页", pages.len());
    Ok(pages)
}
