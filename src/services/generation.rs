//! 图片生成服务 - 业务能力层
//!
//! 只负责"发一次生成请求"能力，重试和退避由 `workflow::retry` 负责
//!
//! ## 技术栈
//! - 使用 `reqwest` 调用 Gemini `generateContent` REST 接口
//! - 图片以 base64 `inline_data` 的形式随提示词一起发送
//! - 使用 `image` crate 校验返回图片并转换输出格式

use serde::Deserialize;
use serde_json::json;
use std::io::Cursor;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::Config;
use crate::models::image_record::{ImageData, OutputFormat};

/// 单次生成请求的失败原因
#[derive(Debug, Error)]
pub enum GenerationError {
    /// 接口返回非 2xx 状态码（429 表示被限流）
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// 网络请求失败
    #[error("请求失败: {0}")]
    Request(#[from] reqwest::Error),

    /// 响应里没有图片
    #[error("响应中没有图片数据")]
    NoImage { text: Option<String> },

    /// 返回的数据无法解析为图片
    #[error("图片解码失败: {0}")]
    Decode(String),

    /// 响应 JSON 结构不符合预期
    #[error("响应解析失败: {0}")]
    InvalidResponse(String),

    #[error("{0}")]
    Other(String),
}

/// 生成接口的响应：可能带图片，也可能只有文字
#[derive(Debug, Clone, Default)]
pub struct GenerationResponse {
    pub images: Vec<ImageData>,
    pub text: Option<String>,
}

/// 图片生成接口
///
/// 在单个逻辑线程上协作式调用，不要求 `Send`
#[allow(async_fn_in_trait)]
pub trait ImageGenerator {
    async fn generate(
        &self,
        image: &ImageData,
        prompt: &str,
    ) -> Result<GenerationResponse, GenerationError>;
}

impl<T: ImageGenerator> ImageGenerator for std::sync::Arc<T> {
    async fn generate(
        &self,
        image: &ImageData,
        prompt: &str,
    ) -> Result<GenerationResponse, GenerationError> {
        (**self).generate(image, prompt).await
    }
}

/// Gemini 图片生成客户端
pub struct GeminiGenerator {
    http: reqwest::Client,
    api_key: String,
    api_base: String,
    model: String,
}

impl GeminiGenerator {
    /// 创建新的生成客户端
    pub fn new(config: &Config) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: config.generation_api_key.clone(),
            api_base: config
                .generation_api_base_url
                .trim()
                .trim_end_matches('/')
                .to_string(),
            model: config.generation_model.clone(),
        }
    }

    fn endpoint(&self) -> String {
        let model = self.model.trim();
        let model_path = if model.starts_with("models/") {
            model.to_string()
        } else {
            format!("models/{model}")
        };
        format!("{}/{}:generateContent", self.api_base, model_path)
    }
}

impl ImageGenerator for GeminiGenerator {
    async fn generate(
        &self,
        image: &ImageData,
        prompt: &str,
    ) -> Result<GenerationResponse, GenerationError> {
        debug!(
            "调用生成接口，模型: {}，图片大小: {} 字节",
            self.model,
            image.len()
        );

        let body = json!({
            "contents": [{
                "role": "user",
                "parts": [
                    { "inline_data": { "mime_type": image.mime_type, "data": image.to_base64() } },
                    { "text": prompt },
                ],
            }],
            "generationConfig": { "responseModalities": ["TEXT", "IMAGE"] },
        });

        let response = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            warn!("生成接口返回错误状态: {}", status);
            return Err(GenerationError::Http {
                status: status.as_u16(),
                body: text,
            });
        }

        parse_generate_response(&text)
    }
}

// ========== 响应解析 ==========

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponsePart {
    text: Option<String>,
    #[serde(alias = "inline_data")]
    inline_data: Option<InlineBlob>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineBlob {
    #[serde(alias = "mime_type")]
    mime_type: String,
    data: String,
}

/// 解析 `generateContent` 的响应体
pub fn parse_generate_response(body: &str) -> Result<GenerationResponse, GenerationError> {
    let parsed: GenerateContentResponse = serde_json::from_str(body)
        .map_err(|e| GenerationError::InvalidResponse(e.to_string()))?;

    let mut result = GenerationResponse::default();
    let mut texts = Vec::new();

    let parts = parsed
        .candidates
        .into_iter()
        .filter_map(|c| c.content)
        .flat_map(|c| c.parts);

    for part in parts {
        if let Some(blob) = part.inline_data {
            let image = ImageData::from_base64(blob.mime_type, &blob.data)
                .map_err(|e| GenerationError::Decode(e.to_string()))?;
            result.images.push(image);
        }
        if let Some(text) = part.text {
            texts.push(text);
        }
    }

    if !texts.is_empty() {
        result.text = Some(texts.join("\n"));
    }

    Ok(result)
}

/// 校验图片可解码，并在需要时转换为目标格式
///
/// 格式一致时原样返回字节，避免二次压缩
pub fn reencode(image: ImageData, format: OutputFormat) -> Result<ImageData, GenerationError> {
    let decoded =
        image::load_from_memory(&image.bytes).map_err(|e| GenerationError::Decode(e.to_string()))?;

    if image.mime_type.eq_ignore_ascii_case(format.mime_type()) {
        return Ok(image);
    }

    let mut buffer = Cursor::new(Vec::new());
    let written = match format {
        // JPEG 不支持透明通道
        OutputFormat::Jpeg => image::DynamicImage::ImageRgb8(decoded.to_rgb8())
            .write_to(&mut buffer, image::ImageFormat::Jpeg),
        OutputFormat::Png => decoded.write_to(&mut buffer, image::ImageFormat::Png),
        OutputFormat::Webp => image::DynamicImage::ImageRgba8(decoded.to_rgba8())
            .write_to(&mut buffer, image::ImageFormat::WebP),
    };
    written.map_err(|e| GenerationError::Decode(e.to_string()))?;

    debug!("结果图已转换为 {}", format);
    Ok(ImageData::new(format.mime_type(), buffer.into_inner()))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// 生成一张 2x2 的 PNG
    pub(crate) fn tiny_png() -> ImageData {
        let img = image::RgbaImage::from_pixel(2, 2, image::Rgba([200, 170, 40, 255]));
        let mut buffer = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut buffer, image::ImageFormat::Png)
            .unwrap();
        ImageData::new("image/png", buffer.into_inner())
    }

    #[test]
    fn test_parse_response_with_image_and_text() {
        let png = tiny_png();
        let body = format!(
            r#"{{"candidates":[{{"content":{{"parts":[
                {{"text":"here you go"}},
                {{"inlineData":{{"mimeType":"image/png","data":"{}"}}}}
            ]}}}}]}}"#,
            png.to_base64()
        );

        let response = parse_generate_response(&body).unwrap();
        assert_eq!(response.images.len(), 1);
        assert_eq!(response.images[0], png);
        assert_eq!(response.text.as_deref(), Some("here you go"));
    }

    #[test]
    fn test_parse_response_text_only() {
        let body = r#"{"candidates":[{"content":{"parts":[{"text":"I cannot edit this"}]}}]}"#;
        let response = parse_generate_response(body).unwrap();
        assert!(response.images.is_empty());
        assert_eq!(response.text.as_deref(), Some("I cannot edit this"));
    }

    #[test]
    fn test_parse_response_snake_case_blob() {
        let body = r#"{"candidates":[{"content":{"parts":[{"inline_data":{"mime_type":"image/png","data":"AQID"}}]}}]}"#;
        let response = parse_generate_response(body).unwrap();
        assert_eq!(response.images[0].bytes.as_ref(), &[1u8, 2, 3]);
    }

    #[test]
    fn test_parse_response_rejects_garbage() {
        assert!(matches!(
            parse_generate_response("not json"),
            Err(GenerationError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_http_error_message_carries_status() {
        let err = GenerationError::Http {
            status: 429,
            body: "Resource has been exhausted".to_string(),
        };
        assert!(err.to_string().starts_with("HTTP 429"));
    }

    #[test]
    fn test_reencode_same_format_keeps_bytes() {
        let png = tiny_png();
        let out = reencode(png.clone(), OutputFormat::Png).unwrap();
        assert_eq!(out, png);
    }

    #[test]
    fn test_reencode_png_to_jpeg() {
        let out = reencode(tiny_png(), OutputFormat::Jpeg).unwrap();
        assert_eq!(out.mime_type, "image/jpeg");
        assert_eq!(&out.bytes[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn test_reencode_rejects_undecodable() {
        let junk = ImageData::new("image/png", vec![0u8; 8]);
        assert!(matches!(
            reencode(junk, OutputFormat::Png),
            Err(GenerationError::Decode(_))
        ));
    }
}
