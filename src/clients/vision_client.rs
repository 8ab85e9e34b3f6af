//! 视觉模型客户端
//!
//! 只负责"一次带图的模型调用"能力，不关心提示词内容和流程
//!
//! ## 技术栈
//! - 使用 `async-openai` crate 进行 API 调用
//! - 支持自定义 API 端点和模型
//! - 兼容 OpenAI API 的服务（如 Azure, Gemini, Doubao 等）

use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestMessageContentPartImage,
        ChatCompletionRequestMessageContentPartText, ChatCompletionRequestUserMessageArgs,
        ChatCompletionRequestUserMessageContent, ChatCompletionRequestUserMessageContentPart,
        CreateChatCompletionRequestArgs, ImageDetail, ImageUrl,
    },
    Client,
};
use base64::{engine::general_purpose, Engine};
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{AppError, AppResult, ModelError};
use crate::models::{PageImage, TokenUsage};

/// 视觉模型客户端
#[derive(Clone)]
pub struct VisionClient {
    client: Client<OpenAIConfig>,
    model_name: String,
    temperature: f32,
}

impl VisionClient {
    /// 创建新的视觉模型客户端
    pub fn new(config: &Config) -> Self {
        // 配置 OpenAI 客户端（兼容 OpenAI API 的服务）
        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.vision_api_key)
            .with_api_base(&config.vision_api_base_url);

        let client = Client::with_config(openai_config);

        Self {
            client,
            model_name: config.vision_model_name.clone(),
            temperature: config.vision_temperature,
        }
    }

    /// 对一张页面图像执行一次提取调用
    ///
    /// 图像以 base64 data URL 内联在用户消息里
    ///
    /// # 参数
    /// - `prompt`: 完整的提取提示词
    /// - `image`: 页面图像（PNG/JPEG 字节）
    ///
    /// # 返回
    /// 返回 (模型原始文本, token 消耗)
    pub async fn analyze_page(&self, prompt: &str, image: &PageImage) -> AppResult<(String, TokenUsage)> {
        debug!("调用视觉模型，模型: {}", self.model_name);
        debug!("提示词长度: {} 字符, 图像: {} 字节", prompt.len(), image.data.len());

        let data_url = format!(
            "data:{};base64,{}",
            image.mime,
            general_purpose::STANDARD.encode(&image.data)
        );

        // 构建包含文本和图片的用户消息
        let content_parts: Vec<ChatCompletionRequestUserMessageContentPart> = vec![
            ChatCompletionRequestUserMessageContentPart::Text(
                ChatCompletionRequestMessageContentPartText {
                    text: prompt.to_string(),
                },
            ),
            ChatCompletionRequestUserMessageContentPart::ImageUrl(
                ChatCompletionRequestMessageContentPartImage {
                    image_url: ImageUrl {
                        url: data_url,
                        detail: Some(ImageDetail::High),
                    },
                },
            ),
        ];

        let user_msg = ChatCompletionRequestUserMessageArgs::default()
            .content(ChatCompletionRequestUserMessageContent::Array(content_parts))
            .build()
            .map_err(|e| AppError::model_invocation_failed(&self.model_name, e))?;

        let messages = vec![ChatCompletionRequestMessage::User(user_msg)];

        // 构建请求
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model_name)
            .messages(messages)
            .temperature(self.temperature)
            .max_tokens(8192u32)
            .build()
            .map_err(|e| AppError::model_invocation_failed(&self.model_name, e))?;

        // 调用 API
        let response = self.client.chat().create(request).await.map_err(|e| {
            warn!("视觉模型调用失败: {}", e);
            AppError::model_invocation_failed(&self.model_name, e)
        })?;

        // 提取 token 消耗
        let usage = response
            .usage
            .as_ref()
            .map(|u| TokenUsage {
                total_tokens: u64::from(u.total_tokens),
                input_tokens: u64::from(u.prompt_tokens),
                output_tokens: u64::from(u.completion_tokens),
            })
            .unwrap_or_default();

        // 提取响应内容
        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| {
                AppError::Model(ModelError::EmptyResponse {
                    model: self.model_name.clone(),
                })
            })?;

        debug!("视觉模型调用成功，消耗 {} tokens", usage.total_tokens);

        Ok((content.trim().to_string(), usage))
    }

    /// 当前使用的模型名
    pub fn model_name(&self) -> &str {
        &self.model_name
    }
}
