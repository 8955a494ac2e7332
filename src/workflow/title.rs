//! 标题生成流程
//!
//! 让分类接口说出图片里是什么首饰，用作展示标题。
//! 与生成流程共用同一套退避时间表，但判定更宽松：
//! 只要回答清洗后是 3–24 个字符的字母/空格就算成功，
//! 回答不合格时直接使用兜底标签，不再重试。

use tracing::{debug, warn};

use crate::models::image_record::ImageData;
use crate::services::classify::SubjectClassifier;
use crate::services::prompt_builder::CLASSIFY_PROMPT;
use crate::workflow::retry::{retry_with_backoff, RetryPolicy};

/// 分类失败时使用的标签
pub const FALLBACK_LABEL: &str = "Jewelry";

const MIN_LABEL_LEN: usize = 3;
const MAX_LABEL_LEN: usize = 24;

/// 清洗分类接口的回答
///
/// 去掉字母和空格以外的字符并合并空白，长度不在 3–24 之间时返回 `None`
pub fn clean_label(text: &str) -> Option<String> {
    let stripped: String = text
        .chars()
        .filter(|c| c.is_alphabetic() || *c == ' ')
        .collect();
    let label = stripped.split_whitespace().collect::<Vec<_>>().join(" ");

    let len = label.chars().count();
    (MIN_LABEL_LEN..=MAX_LABEL_LEN).contains(&len).then_some(label)
}

/// 标题分类器
pub struct TitleClassifier<C> {
    classifier: C,
    policy: RetryPolicy,
}

impl<C: SubjectClassifier> TitleClassifier<C> {
    pub fn new(classifier: C, policy: RetryPolicy) -> Self {
        Self { classifier, policy }
    }

    /// 为图片生成标签，永远返回一个可用的标签
    pub async fn label_for(&self, image: &ImageData) -> String {
        let answer = retry_with_backoff(&self.policy, "分类", |_| {
            self.classifier.classify(image, CLASSIFY_PROMPT)
        })
        .await;

        match answer {
            Ok(text) => match clean_label(&text) {
                Some(label) => {
                    debug!("分类结果: {}", label);
                    label
                }
                None => {
                    warn!("分类结果不可用: '{}'，使用默认标签", text);
                    FALLBACK_LABEL.to_string()
                }
            },
            Err(e) => {
                warn!("分类失败: {}，使用默认标签", e);
                FALLBACK_LABEL.to_string()
            }
        }
    }
}
