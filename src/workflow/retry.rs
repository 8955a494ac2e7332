//! 重试执行器 - 流程层
//!
//! 定义"一个生成任务"的完整处理流程：
//! 1. 编码原图 → 调用生成接口 → 检查响应里是否有图片
//! 2. 失败（包括没有图片）→ 指数退避后重试，最多 `MAX_RETRIES` 次
//! 3. 全部失败 → 对最后一次的错误分类，写进记录的 `error_message`
//!
//! 单个任务的失败只体现在它自己的记录上，不会以错误的形式向上传播

use std::fmt;
use std::future::Future;
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::models::image_record::{ImageData, ImageRecord, OutputFormat};
use crate::services::generation::{reencode, GenerationError, ImageGenerator};

/// 最大尝试次数
pub const MAX_RETRIES: u32 = 3;

/// 首次退避时间（毫秒），之后每次翻倍
pub const INITIAL_DELAY_MS: u64 = 1000;

/// 被限流时展示给用户的固定提示
pub const RATE_LIMIT_MESSAGE: &str = "请求频率超出限制 (rate limit exceeded)，请稍后再试";

/// 错误没有任何描述时的兜底提示
pub const UNKNOWN_ERROR_MESSAGE: &str = "未知错误 (unknown error)";

/// 重试策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: MAX_RETRIES,
            initial_delay: Duration::from_millis(INITIAL_DELAY_MS),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_delay: Duration::from_millis(config.initial_delay_ms),
        }
    }

    /// 第 `attempt` 次（从 1 开始）失败后的等待时间：`initial * 2^(attempt-1)`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.initial_delay.saturating_mul(2u32.pow(exponent))
    }

    fn attempts(&self) -> u32 {
        self.max_retries.max(1)
    }
}

/// 带指数退避的重试循环
///
/// 只在 `operation` 返回 `Err` 时重试；最后一次失败后不再等待，直接返回错误
///
/// # 参数
/// - `policy`: 重试策略
/// - `label`: 日志前缀（通常是记录 ID）
/// - `operation`: 单次尝试，参数是从 1 开始的尝试序号
pub async fn retry_with_backoff<T, E, F, Fut>(
    policy: &RetryPolicy,
    label: &str,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Display,
{
    let max_attempts = policy.attempts();
    let mut attempt = 1;

    loop {
        match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if attempt >= max_attempts => {
                warn!("[{}] 已尝试 {} 次，放弃: {}", label, attempt, e);
                return Err(e);
            }
            Err(e) => {
                let delay = policy.delay_for(attempt);
                warn!(
                    "[{}] 尝试 {}/{} 失败: {}，{}ms 后重试...",
                    label,
                    attempt,
                    max_attempts,
                    e,
                    delay.as_millis()
                );
                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

fn rate_limit_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)429|quota|rate[\s_-]?limit").expect("rate limit pattern is valid")
    })
}

/// 错误信息是否表示被限流
pub fn is_rate_limited(message: &str) -> bool {
    rate_limit_pattern().is_match(message)
}

/// 把最终错误转换成展示给用户的信息
pub fn failure_message(error: &impl fmt::Display) -> String {
    let message = error.to_string();
    if message.trim().is_empty() {
        UNKNOWN_ERROR_MESSAGE.to_string()
    } else if is_rate_limited(&message) {
        RATE_LIMIT_MESSAGE.to_string()
    } else {
        message
    }
}

/// 重试执行器
///
/// 持有生成接口和重试策略，对单条记录执行增强
pub struct RetryHarness<G> {
    generator: G,
    policy: RetryPolicy,
}

impl<G: ImageGenerator> RetryHarness<G> {
    pub fn new(generator: G, policy: RetryPolicy) -> Self {
        Self { generator, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// 对一条记录执行增强
    ///
    /// # 返回
    /// 成功时记录状态为 `Succeeded`、结果图已设置且自动选中；
    /// 重试耗尽时状态为 `Failed`，`error_message` 为分类后的错误信息
    pub async fn enhance(
        &self,
        record: ImageRecord,
        prompt: &str,
        format: OutputFormat,
    ) -> ImageRecord {
        debug!("[{}] 开始生成，提示词长度: {} 字符", record.id, prompt.len());

        let outcome = retry_with_backoff(&self.policy, &record.id, |attempt| {
            self.attempt(&record, prompt, format, attempt)
        })
        .await;

        match outcome {
            Ok(image) => {
                info!("[{}] ✓ 生成成功", record.id);
                record.succeeded(image)
            }
            Err(e) => {
                let message = failure_message(&e);
                error!("[{}] ❌ 生成失败: {}", record.id, message);
                record.failed(message)
            }
        }
    }

    async fn attempt(
        &self,
        record: &ImageRecord,
        prompt: &str,
        format: OutputFormat,
        attempt: u32,
    ) -> Result<ImageData, GenerationError> {
        debug!("[{}] 第 {} 次请求生成接口", record.id, attempt);

        let response = self.generator.generate(&record.raw_image, prompt).await?;

        let image = response
            .images
            .into_iter()
            .next()
            .ok_or(GenerationError::NoImage {
                text: response.text,
            })?;

        reencode(image, format)
    }
}
