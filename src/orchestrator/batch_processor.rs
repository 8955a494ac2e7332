//! 批量任务调度器 - 编排层
//!
//! ## 职责
//!
//! 把一组生成任务切成固定大小的批次，按顺序逐批执行。
//!
//! ## 核心功能
//!
//! 1. **分批**：按 `batch_size` 连续切分任务列表
//! 2. **批内并发**：同一批的任务同时发起，在当前任务上协作式轮询
//! 3. **批间串行**：本批全部结束后才开始下一批，这是限流手段
//! 4. **进度回调**：每批结束后按完成顺序逐个回调，每个任务一次
//! 5. **失败隔离**：单个任务失败只体现在它自己的记录上
//!
//! ## 返回
//!
//! 与输入顺序一致的结果记录列表，供会话按 ID 合并

use futures::stream::{FuturesUnordered, StreamExt};
use tracing::info;

use crate::models::image_record::{ImageRecord, OutputFormat, RecordStatus};
use crate::models::job::Job;
use crate::services::generation::ImageGenerator;
use crate::workflow::retry::RetryHarness;

/// 默认批大小
pub const BATCH_SIZE: usize = 5;

/// 批量调度器
#[derive(Debug, Clone, Copy)]
pub struct BatchScheduler {
    batch_size: usize,
}

impl Default for BatchScheduler {
    fn default() -> Self {
        Self::new(BATCH_SIZE)
    }
}

impl BatchScheduler {
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// 逐批执行所有任务
    ///
    /// # 参数
    /// - `harness`: 重试执行器
    /// - `jobs`: 任务列表
    /// - `format`: 输出编码格式
    /// - `on_progress`: 每个任务完成后回调一次（在所属批次全部结束之后）
    ///
    /// # 返回
    /// 按输入顺序排列的结果记录
    pub async fn run_batches<G, F>(
        &self,
        harness: &RetryHarness<G>,
        jobs: Vec<Job>,
        format: OutputFormat,
        mut on_progress: F,
    ) -> Vec<ImageRecord>
    where
        G: ImageGenerator,
        F: FnMut(&ImageRecord),
    {
        let total_jobs = jobs.len();
        let total_batches = total_jobs.div_ceil(self.batch_size);
        let mut results: Vec<Option<ImageRecord>> = vec![None; total_jobs];
        let mut remaining = jobs.into_iter();

        for batch_start in (0..total_jobs).step_by(self.batch_size) {
            let batch_end = (batch_start + self.batch_size).min(total_jobs);
            let batch_num = batch_start / self.batch_size + 1;

            log_batch_start(batch_num, total_batches, batch_start + 1, batch_end, total_jobs);

            // 为本批创建并发任务
            let mut pending: FuturesUnordered<_> = remaining
                .by_ref()
                .take(batch_end - batch_start)
                .enumerate()
                .map(|(offset, job)| async move {
                    let Job { record, prompt } = job;
                    let record = harness.enhance(record, &prompt, format).await;
                    (batch_start + offset, record)
                })
                .collect();

            // 等待本批所有任务完成
            let mut settled = Vec::with_capacity(batch_end - batch_start);
            while let Some(done) = pending.next().await {
                settled.push(done);
            }

            let mut batch_result = BatchResult::default();
            for (index, record) in settled {
                match record.status {
                    RecordStatus::Succeeded => batch_result.success += 1,
                    _ => batch_result.failed += 1,
                }
                on_progress(&record);
                results[index] = Some(record);
            }

            log_batch_complete(batch_num, &batch_result);
        }

        results.into_iter().flatten().collect()
    }
}

/// 批次处理结果
#[derive(Debug, Default)]
struct BatchResult {
    success: usize,
    failed: usize,
}

// ========== 日志辅助函数 ==========

fn log_batch_start(batch_num: usize, total_batches: usize, start: usize, end: usize, total: usize) {
    info!("{}", "=".repeat(60));
    info!("📦 开始处理第 {}/{} 批", batch_num, total_batches);
    info!("🖼️ 本批任务: {}-{} / 共 {} 个", start, end, total);
    info!("{}", "=".repeat(60));
}

fn log_batch_complete(batch_num: usize, result: &BatchResult) {
    info!("{}", "─".repeat(60));
    info!(
        "✓ 第 {} 批完成: 成功 {}/{}",
        batch_num,
        result.success,
        result.success + result.failed
    );
    info!("{}", "─".repeat(60));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::image_record::ImageData;
    use crate::services::generation::tests::tiny_png;
    use crate::services::generation::{GenerationError, GenerationResponse};
    use crate::workflow::retry::RetryPolicy;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// 记录开始/结束事件的假生成接口
    ///
    /// 提示词形如 `job-3`；编号越小耗时越长，`fail` 开头的提示词总是失败
    struct RecordingGenerator {
        events: Arc<Mutex<Vec<String>>>,
    }

    impl ImageGenerator for RecordingGenerator {
        async fn generate(
            &self,
            _image: &ImageData,
            prompt: &str,
        ) -> Result<GenerationResponse, GenerationError> {
            self.events.lock().unwrap().push(format!("start:{prompt}"));
            let n: u64 = prompt.rsplit('-').next().and_then(|n| n.parse().ok()).unwrap_or(0);
            tokio::time::sleep(Duration::from_millis(100 - n * 10)).await;
            self.events.lock().unwrap().push(format!("end:{prompt}"));

            if prompt.starts_with("fail") {
                return Err(GenerationError::Http {
                    status: 500,
                    body: "boom".into(),
                });
            }
            Ok(GenerationResponse {
                images: vec![tiny_png()],
                text: None,
            })
        }
    }

    fn jobs(names: &[&str]) -> Vec<Job> {
        let source = ImageRecord::original(tiny_png(), "ring");
        names
            .iter()
            .map(|name| Job::new(ImageRecord::derive_loading(&source, *name, *name, None), *name))
            .collect()
    }

    fn position(events: &[String], needle: &str) -> usize {
        events.iter().position(|e| e == needle).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_seven_jobs_run_as_five_then_two() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let harness = RetryHarness::new(
            RecordingGenerator {
                events: events.clone(),
            },
            RetryPolicy::default(),
        );
        let names: Vec<String> = (0..7).map(|i| format!("job-{i}")).collect();
        let name_refs: Vec<&str> = names.iter().map(String::as_str).collect();

        let progress_events = events.clone();
        let results = BatchScheduler::default()
            .run_batches(&harness, jobs(&name_refs), OutputFormat::Png, |record| {
                progress_events
                    .lock()
                    .unwrap()
                    .push(format!("progress:{}", record.title));
            })
            .await;

        let events = events.lock().unwrap().clone();
        let progress: Vec<_> = events.iter().filter(|e| e.starts_with("progress:")).collect();
        assert_eq!(progress.len(), 7);

        // 第二批在第一批全部结束（含进度回调）之后才开始
        let second_batch_start = position(&events, "start:job-5");
        for i in 0..5 {
            assert!(position(&events, &format!("end:job-{i}")) < second_batch_start);
            assert!(position(&events, &format!("progress:job-{i}")) < second_batch_start);
        }
        // 第 K 次回调晚于所属批次所有任务结束
        for i in 5..7 {
            let p = position(&events, &format!("progress:job-{i}"));
            assert!(position(&events, "end:job-5") < p);
            assert!(position(&events, "end:job-6") < p);
        }

        // 批内按完成顺序回调：编号大的先结束
        let first_batch_progress: Vec<_> = progress[..5].iter().map(|s| s.as_str()).collect();
        assert_eq!(
            first_batch_progress,
            vec![
                "progress:job-4",
                "progress:job-3",
                "progress:job-2",
                "progress:job-1",
                "progress:job-0"
            ]
        );

        // 结果保持输入顺序
        let titles: Vec<_> = results.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, name_refs);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_does_not_abort_siblings() {
        let harness = RetryHarness::new(
            RecordingGenerator {
                events: Arc::new(Mutex::new(Vec::new())),
            },
            RetryPolicy::default(),
        );

        let mut completed = 0;
        let results = BatchScheduler::new(2)
            .run_batches(
                &harness,
                jobs(&["job-1", "fail-2", "job-3", "job-4"]),
                OutputFormat::Png,
                |_| completed += 1,
            )
            .await;

        assert_eq!(completed, 4);
        let statuses: Vec<_> = results.iter().map(|r| r.status).collect();
        assert_eq!(
            statuses,
            vec![
                RecordStatus::Succeeded,
                RecordStatus::Failed,
                RecordStatus::Succeeded,
                RecordStatus::Succeeded
            ]
        );
        assert_eq!(results[1].error_message.as_deref(), Some("HTTP 500: boom"));
    }

    #[tokio::test]
    async fn test_empty_job_list() {
        let harness = RetryHarness::new(
            RecordingGenerator {
                events: Arc::new(Mutex::new(Vec::new())),
            },
            RetryPolicy::default(),
        );
        let mut calls = 0;
        let results = BatchScheduler::default()
            .run_batches(&harness, Vec::new(), OutputFormat::Jpeg, |_| calls += 1)
            .await;
        assert!(results.is_empty());
        assert_eq!(calls, 0);
    }
}
