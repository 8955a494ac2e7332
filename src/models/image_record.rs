//! 图片记录模型
//!
//! 一条记录对应一张原图或一张生成结果

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::models::style::Angle;

/// 图片二进制数据 + MIME 类型
///
/// 字节用 `Arc` 共享，派生记录复制原图数据时不会拷贝整张图片
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageData {
    pub mime_type: String,
    #[serde(with = "base64_bytes")]
    pub bytes: Arc<[u8]>,
}

impl ImageData {
    pub fn new(mime_type: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            mime_type: mime_type.into(),
            bytes: bytes.into(),
        }
    }

    /// 编码为 base64 文本（发送给生成接口）
    pub fn to_base64(&self) -> String {
        BASE64.encode(&self.bytes)
    }

    /// 从 base64 文本解码
    pub fn from_base64(mime_type: impl Into<String>, data: &str) -> Result<Self, base64::DecodeError> {
        let bytes = BASE64.decode(data.trim())?;
        Ok(Self::new(mime_type, bytes))
    }

    /// 转为 data URL，供 Vision 接口使用
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.to_base64())
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for ImageData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageData")
            .field("mime_type", &self.mime_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

mod base64_bytes {
    use super::BASE64;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};
    use std::sync::Arc;

    pub fn serialize<S: Serializer>(bytes: &Arc<[u8]>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&BASE64.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Arc<[u8]>, D::Error> {
        let text = String::deserialize(deserializer)?;
        BASE64
            .decode(text.as_bytes())
            .map(Arc::from)
            .map_err(serde::de::Error::custom)
    }
}

/// 输出编码格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Jpeg,
    Png,
    Webp,
}

impl OutputFormat {
    pub fn mime_type(self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "image/jpeg",
            OutputFormat::Png => "image/png",
            OutputFormat::Webp => "image/webp",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "jpg",
            OutputFormat::Png => "png",
            OutputFormat::Webp => "webp",
        }
    }

    /// 从配置字符串解析
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "jpeg" | "jpg" => Some(OutputFormat::Jpeg),
            "png" => Some(OutputFormat::Png),
            "webp" => Some(OutputFormat::Webp),
            _ => None,
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// 记录状态
///
/// `Pending → Loading → Succeeded | Failed`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    Pending,
    Loading,
    Succeeded,
    Failed,
}

/// 图片记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRecord {
    pub id: String,
    /// 原图 ID；原图自身的 source_id == id
    pub source_id: String,
    /// 发送给生成接口的原始图片（派生记录保存的是原图数据）
    pub raw_image: ImageData,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_image: Option<ImageData>,
    pub status: RecordStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default)]
    pub is_selected: bool,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub angle: Option<Angle>,
    pub created_at: DateTime<Utc>,
}

impl ImageRecord {
    /// 新建原图记录（上传或拍照）
    pub fn original(raw_image: ImageData, title: impl Into<String>) -> Self {
        let id = uuid::Uuid::new_v4().to_string();
        Self {
            source_id: id.clone(),
            id,
            raw_image,
            result_image: None,
            status: RecordStatus::Pending,
            error_message: None,
            is_selected: false,
            title: title.into(),
            result_label: None,
            angle: None,
            created_at: Utc::now(),
        }
    }

    /// 从原图派生一条 `Loading` 状态的结果记录
    ///
    /// 派生记录永远引用原图的数据，不会基于其它生成结果继续生成
    pub fn derive_loading(
        source: &ImageRecord,
        title: impl Into<String>,
        result_label: impl Into<String>,
        angle: Option<Angle>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            source_id: source.source_id.clone(),
            raw_image: source.raw_image.clone(),
            result_image: None,
            status: RecordStatus::Loading,
            error_message: None,
            is_selected: false,
            title: title.into(),
            result_label: Some(result_label.into()),
            angle,
            created_at: Utc::now(),
        }
    }

    pub fn is_original(&self) -> bool {
        self.id == self.source_id
    }

    pub fn succeeded(mut self, result_image: ImageData) -> Self {
        self.status = RecordStatus::Succeeded;
        self.result_image = Some(result_image);
        self.error_message = None;
        self.is_selected = true;
        self
    }

    pub fn failed(mut self, message: impl Into<String>) -> Self {
        self.status = RecordStatus::Failed;
        self.result_image = None;
        self.error_message = Some(message.into());
        self
    }

    /// 可导出的图片：派生记录取结果图，原图取自身数据
    pub fn display_image(&self) -> Option<&ImageData> {
        if self.is_original() {
            Some(&self.raw_image)
        } else {
            self.result_image.as_ref()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jpeg() -> ImageData {
        ImageData::new("image/jpeg", vec![0xFF, 0xD8, 0xFF])
    }

    #[test]
    fn test_original_points_to_itself() {
        let record = ImageRecord::original(jpeg(), "ring");
        assert!(record.is_original());
        assert_eq!(record.id, record.source_id);
        assert_eq!(record.status, RecordStatus::Pending);
    }

    #[test]
    fn test_derived_uses_source_raw_image() {
        let source = ImageRecord::original(jpeg(), "ring");
        let derived = ImageRecord::derive_loading(&source, "ring · Side", "Side", Some(Angle::Side));

        assert!(!derived.is_original());
        assert_eq!(derived.source_id, source.id);
        assert_eq!(derived.raw_image, source.raw_image);
        assert_eq!(derived.status, RecordStatus::Loading);
        assert!(derived.display_image().is_none());
    }

    #[test]
    fn test_succeeded_auto_selects() {
        let source = ImageRecord::original(jpeg(), "ring");
        let done = ImageRecord::derive_loading(&source, "t", "l", None)
            .succeeded(ImageData::new("image/png", vec![1, 2, 3]));
        assert_eq!(done.status, RecordStatus::Succeeded);
        assert!(done.is_selected);
        assert!(done.error_message.is_none());
    }

    #[test]
    fn test_image_data_serializes_as_base64() {
        let data = ImageData::new("image/png", vec![1u8, 2, 3]);
        let json = serde_json::to_value(&data).unwrap();
        assert_eq!(json["bytes"], "AQID");

        let back: ImageData = serde_json::from_value(json).unwrap();
        assert_eq!(back, data);
    }

    #[test]
    fn test_output_format_parse() {
        assert_eq!(OutputFormat::parse("JPG"), Some(OutputFormat::Jpeg));
        assert_eq!(OutputFormat::parse("webp"), Some(OutputFormat::Webp));
        assert_eq!(OutputFormat::parse("gif"), None);
        assert_eq!(OutputFormat::Png.extension(), "png");
    }
}
