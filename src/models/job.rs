//! 生成任务
//!
//! 一个任务 = 一条 `Loading` 状态的派生记录 + 发送给生成接口的提示词

use crate::models::image_record::ImageRecord;

#[derive(Debug, Clone)]
pub struct Job {
    /// 占位记录（raw_image 为原图数据）
    pub record: ImageRecord,
    pub prompt: String,
}

impl Job {
    pub fn new(record: ImageRecord, prompt: impl Into<String>) -> Self {
        Self {
            record,
            prompt: prompt.into(),
        }
    }

    pub fn id(&self) -> &str {
        &self.record.id
    }
}
