//! 主体分类服务 - 业务能力层
//!
//! 只负责"看图说出这是什么首饰"能力，结果只用于拼展示标题
//!
//! ## 技术栈
//! - 使用 `async-openai` crate 进行 API 调用
//! - 兼容 OpenAI API 的 Vision 服务（Gemini / Doubao 等的兼容端点）
//! - 图片以 data URL 的形式放进用户消息

use anyhow::Result;
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
use tracing::{debug, warn};

use crate::config::Config;
use crate::models::image_record::ImageData;

/// 主体分类接口
#[allow(async_fn_in_trait)]
pub trait SubjectClassifier {
    /// 返回模型的原始文本回答
    async fn classify(&self, image: &ImageData, instruction: &str) -> Result<String>;
}

impl<T: SubjectClassifier> SubjectClassifier for std::sync::Arc<T> {
    async fn classify(&self, image: &ImageData, instruction: &str) -> Result<String> {
        (**self).classify(image, instruction).await
    }
}

/// 基于 OpenAI 兼容接口的分类器
pub struct LlmClassifier {
    client: Client<OpenAIConfig>,
    model_name: String,
}

impl LlmClassifier {
    /// 创建新的分类服务
    pub fn new(config: &Config) -> Self {
        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.llm_api_key)
            .with_api_base(&config.llm_api_base_url);

        Self {
            client: Client::with_config(openai_config),
            model_name: config.llm_model_name.clone(),
        }
    }
}

impl SubjectClassifier for LlmClassifier {
    async fn classify(&self, image: &ImageData, instruction: &str) -> Result<String> {
        debug!("调用分类接口，模型: {}", self.model_name);

        let content_parts = vec![
            ChatCompletionRequestUserMessageContentPart::Text(
                ChatCompletionRequestMessageContentPartText {
                    text: instruction.to_string(),
                },
            ),
            ChatCompletionRequestUserMessageContentPart::ImageUrl(
                ChatCompletionRequestMessageContentPartImage {
                    image_url: ImageUrl {
                        url: image.to_data_url(),
                        detail: Some(ImageDetail::Low),
                    },
                },
            ),
        ];

        let user_msg = ChatCompletionRequestUserMessageArgs::default()
            .content(ChatCompletionRequestUserMessageContent::Array(content_parts))
            .build()?;

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model_name)
            .messages(vec![ChatCompletionRequestMessage::User(user_msg)])
            .temperature(0.2)
            .max_tokens(32u32)
            .build()?;

        let response = self.client.chat().create(request).await.map_err(|e| {
            warn!("分类接口调用失败: {}", e);
            anyhow::anyhow!("分类接口调用失败: {}", e)
        })?;

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| anyhow::anyhow!("分类接口返回内容为空"))?;

        Ok(content.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::prompt_builder::CLASSIFY_PROMPT;

    /// 测试真实接口连通性
    ///
    /// 运行方式：
    /// ```bash
    /// LLM_API_KEY=... cargo test test_classify_live -- --ignored --nocapture
    /// ```
    #[tokio::test]
    #[ignore]
    async fn test_classify_live() {
        let _ = tracing_subscriber::fmt::try_init();

        let config = Config::from_env().unwrap();
        let classifier = LlmClassifier::new(&config);
        let image = crate::services::generation::tests::tiny_png();

        let answer = classifier.classify(&image, CLASSIFY_PROMPT).await;
        match answer {
            Ok(text) => {
                println!("分类结果: {}", text);
                assert!(!text.is_empty());
            }
            Err(e) => panic!("分类接口测试失败: {}", e),
        }
    }
}
