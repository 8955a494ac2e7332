//! 增强编排器 - 编排层
//!
//! 把会话、调度器和重试执行器串起来：
//!
//! ```text
//! begin_*_run (占位) ─▶ run_batches (逐批生成) ─▶ finish_run (按 ID 合并)
//! ```

use tracing::info;

use crate::config::Config;
use crate::error::AppResult;
use crate::models::image_record::{ImageData, OutputFormat};
use crate::models::job::Job;
use crate::models::style::{Angle, StyleOptions};
use crate::orchestrator::batch_processor::BatchScheduler;
use crate::orchestrator::session::{Progress, RunSummary, Session};
use crate::services::capture::{capture_photo, CaptureDevice};
use crate::services::classify::SubjectClassifier;
use crate::services::generation::ImageGenerator;
use crate::workflow::retry::{RetryHarness, RetryPolicy};
use crate::workflow::title::TitleClassifier;

/// 增强编排器
pub struct Enhancer<G, C> {
    harness: RetryHarness<G>,
    titles: TitleClassifier<C>,
    scheduler: BatchScheduler,
    output_format: OutputFormat,
}

impl<G: ImageGenerator, C: SubjectClassifier> Enhancer<G, C> {
    /// 按配置创建编排器
    pub fn new(generator: G, classifier: C, config: &Config) -> Self {
        let policy = RetryPolicy::from_config(config);
        Self {
            harness: RetryHarness::new(generator, policy),
            titles: TitleClassifier::new(classifier, policy),
            scheduler: BatchScheduler::new(config.batch_size),
            output_format: config.output_format,
        }
    }

    pub fn with_parts(
        harness: RetryHarness<G>,
        titles: TitleClassifier<C>,
        scheduler: BatchScheduler,
        output_format: OutputFormat,
    ) -> Self {
        Self {
            harness,
            titles,
            scheduler,
            output_format,
        }
    }

    pub fn output_format(&self) -> OutputFormat {
        self.output_format
    }

    /// 接收一张原图：先分类得到标题，再加入会话
    ///
    /// # 返回
    /// 新原图记录的 ID
    pub async fn import(&self, session: &mut Session, image: ImageData) -> String {
        let label = self.titles.label_for(&image).await;
        session.add_original(image, label)
    }

    /// 拍一张照片并作为原图导入
    ///
    /// 设备错误不重试，直接返回（带面向用户的提示）
    pub async fn import_capture<D: CaptureDevice>(
        &self,
        session: &mut Session,
        device: &D,
    ) -> AppResult<String> {
        let image = capture_photo(device).await?;
        Ok(self.import(session, image).await)
    }

    /// 一键增强所有待处理的原图
    pub async fn auto_enhance<F>(&self, session: &mut Session, on_progress: F) -> AppResult<RunSummary>
    where
        F: FnMut(Progress),
    {
        let jobs = session.begin_auto_run()?;
        info!("✨ 一键增强: {} 张原图", jobs.len());
        Ok(self.execute(session, jobs, on_progress).await)
    }

    /// 按风格和角度增强所有待处理的原图
    pub async fn custom_enhance<F>(
        &self,
        session: &mut Session,
        style: &StyleOptions,
        angles: &[Angle],
        on_progress: F,
    ) -> AppResult<RunSummary>
    where
        F: FnMut(Progress),
    {
        let jobs = session.begin_custom_run(style, angles)?;
        info!(
            "🎨 自定义增强: {} 个任务 (背景 {:?} / 光线 {:?} / 材质 {:?}，{} 个角度)",
            jobs.len(),
            style.background,
            style.lighting,
            style.material,
            angles.len()
        );
        Ok(self.execute(session, jobs, on_progress).await)
    }

    async fn execute<F>(&self, session: &mut Session, jobs: Vec<Job>, mut on_progress: F) -> RunSummary
    where
        F: FnMut(Progress),
    {
        let tracker: &Session = session;
        let results = self
            .scheduler
            .run_batches(&self.harness, jobs, self.output_format, |_| {
                on_progress(tracker.record_progress());
            })
            .await;

        session.finish_run(results)
    }
}
