use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;

use crate::error::{AppError, AppResult, ConfigError};
use crate::models::image_record::OutputFormat;
use crate::models::style::{parse_angles, Angle, Background, Lighting, Material, StyleOptions};

/// 增强模式
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnhanceMode {
    /// 一键增强
    #[default]
    Auto,
    /// 按风格和角度增强
    Custom,
}

impl FromStr for EnhanceMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(EnhanceMode::Auto),
            "custom" => Ok(EnhanceMode::Custom),
            other => Err(format!("未知的增强模式: {}", other)),
        }
    }
}

/// 程序配置文件
///
/// 加载顺序：默认值 → TOML 文件（可只写部分字段）→ 环境变量
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    // --- 图片生成接口 ---
    pub generation_api_key: String,
    pub generation_api_base_url: String,
    pub generation_model: String,
    // --- 分类接口（OpenAI 兼容）---
    pub llm_api_key: String,
    pub llm_api_base_url: String,
    pub llm_model_name: String,
    /// 待处理图片目录
    pub input_folder: String,
    /// 导出目录
    pub export_folder: String,
    /// 收藏持久化文件
    pub liked_store_path: String,
    /// 输出日志文件
    pub output_log_file: String,
    /// 结果图编码
    pub output_format: OutputFormat,
    pub mode: EnhanceMode,
    // --- 自定义增强参数 ---
    pub angles: Vec<Angle>,
    pub background: Background,
    pub lighting: Lighting,
    pub material: Material,
    /// 每批同时发起的生成任务数
    pub batch_size: usize,
    /// 每个任务的最大尝试次数
    pub max_retries: u32,
    /// 首次重试前的等待时间（毫秒），之后每次翻倍
    pub initial_delay_ms: u64,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    /// 运行结束后自动收藏成功的结果
    pub auto_like: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            generation_api_key: String::new(),
            generation_api_base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            generation_model: "gemini-2.5-flash-image-preview".to_string(),
            llm_api_key: String::new(),
            llm_api_base_url: "https://api.openai.com/v1".to_string(),
            llm_model_name: "gpt-4o-mini".to_string(),
            input_folder: "input_images".to_string(),
            export_folder: "export".to_string(),
            liked_store_path: "liked.json".to_string(),
            output_log_file: "output.txt".to_string(),
            output_format: OutputFormat::Jpeg,
            mode: EnhanceMode::Auto,
            angles: vec![Angle::Front],
            background: Background::default(),
            lighting: Lighting::default(),
            material: Material::default(),
            batch_size: 5,
            max_retries: 3,
            initial_delay_ms: 1000,
            verbose_logging: false,
            auto_like: false,
        }
    }
}

impl Config {
    /// 默认值 + 环境变量
    pub fn from_env() -> AppResult<Self> {
        Self::default().with_overrides(|name| std::env::var(name).ok())
    }

    /// 读取 TOML 配置文件（不存在时使用默认值），再应用环境变量
    pub fn load(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        let base = if path.exists() {
            let content = std::fs::read_to_string(path)
                .map_err(|e| AppError::file_read_failed(path.display().to_string(), e))?;
            Self::from_toml_str(&content)?
        } else {
            Self::default()
        };

        let config = base.with_overrides(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> AppResult<Self> {
        Ok(toml::from_str(content)?)
    }

    /// 用 `lookup` 提供的变量覆盖各字段
    ///
    /// # 参数
    /// - `lookup`: 变量名 → 值，没有设置时返回 `None`
    pub fn with_overrides<F>(self, lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let string = |name: &str, default: String| lookup(name).unwrap_or(default);

        Ok(Self {
            generation_api_key: string("GENERATION_API_KEY", self.generation_api_key),
            generation_api_base_url: string("GENERATION_API_BASE_URL", self.generation_api_base_url),
            generation_model: string("GENERATION_MODEL", self.generation_model),
            llm_api_key: string("LLM_API_KEY", self.llm_api_key),
            llm_api_base_url: string("LLM_API_BASE_URL", self.llm_api_base_url),
            llm_model_name: string("LLM_MODEL_NAME", self.llm_model_name),
            input_folder: string("INPUT_FOLDER", self.input_folder),
            export_folder: string("EXPORT_FOLDER", self.export_folder),
            liked_store_path: string("LIKED_STORE_PATH", self.liked_store_path),
            output_log_file: string("OUTPUT_LOG_FILE", self.output_log_file),
            output_format: match lookup("OUTPUT_FORMAT") {
                Some(v) => OutputFormat::parse(&v)
                    .ok_or_else(|| env_parse_failed("OUTPUT_FORMAT", &v, "jpeg|png|webp"))?,
                None => self.output_format,
            },
            mode: parsed(&lookup, "ENHANCE_MODE", "auto|custom", self.mode)?,
            angles: match lookup("ANGLES") {
                Some(v) => parse_angles(&v).map_err(|_| env_parse_failed("ANGLES", &v, "角度列表"))?,
                None => self.angles,
            },
            background: parsed(&lookup, "BACKGROUND", "背景", self.background)?,
            lighting: parsed(&lookup, "LIGHTING", "光线", self.lighting)?,
            material: parsed(&lookup, "MATERIAL", "材质", self.material)?,
            batch_size: parsed(&lookup, "BATCH_SIZE", "usize", self.batch_size)?,
            max_retries: parsed(&lookup, "MAX_RETRIES", "u32", self.max_retries)?,
            initial_delay_ms: parsed(&lookup, "INITIAL_DELAY_MS", "u64", self.initial_delay_ms)?,
            verbose_logging: parsed(&lookup, "VERBOSE_LOGGING", "bool", self.verbose_logging)?,
            auto_like: parsed(&lookup, "AUTO_LIKE", "bool", self.auto_like)?,
        })
    }

    /// 检查取值范围
    pub fn validate(&self) -> AppResult<()> {
        if self.batch_size == 0 {
            return Err(invalid_option("batch_size", "0"));
        }
        if self.max_retries == 0 {
            return Err(invalid_option("max_retries", "0"));
        }
        if self.mode == EnhanceMode::Custom && self.angles.is_empty() {
            return Err(invalid_option("angles", "[]"));
        }
        Ok(())
    }

    /// 自定义增强的风格参数
    pub fn style(&self) -> StyleOptions {
        StyleOptions {
            background: self.background,
            lighting: self.lighting,
            material: self.material,
        }
    }
}

fn parsed<T, F>(lookup: &F, name: &str, expected: &str, default: T) -> AppResult<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| env_parse_failed(name, &value, expected)),
        None => Ok(default),
    }
}

fn env_parse_failed(name: &str, value: &str, expected: &str) -> AppError {
    AppError::Config(ConfigError::EnvVarParseFailed {
        var_name: name.to_string(),
        value: value.to_string(),
        expected_type: expected.to_string(),
    })
}

fn invalid_option(field: &str, value: &str) -> AppError {
    AppError::Config(ConfigError::InvalidOption {
        field: field.to_string(),
        value: value.to_string(),
    })
}
