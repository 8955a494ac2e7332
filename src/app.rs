//! 命令行应用
//!
//! ## 流程
//!
//! 1. 初始化日志文件，加载收藏
//! 2. 扫描输入目录，逐张分类并加入会话
//! 3. 按配置执行一键增强或自定义增强
//! 4. （可选）自动收藏成功的结果
//! 5. 导出选中的结果和收藏快照
//! 6. 输出统计

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use crate::config::{Config, EnhanceMode};
use crate::error::{AppError, BusinessError};
use crate::models::image_record::{ImageRecord, RecordStatus};
use crate::orchestrator::{Enhancer, Progress, RunSummary, Session};
use crate::services::export::export_bundle;
use crate::services::upload::load_images_from_folder;
use crate::services::{GeminiGenerator, JsonFileStore, LikedSet, LlmClassifier};
use crate::utils::logging::{
    append_run_summary, init_log_file, log_images_loaded, log_startup, print_final_stats,
};

/// 应用主结构
pub struct App {
    config: Config,
    enhancer: Enhancer<GeminiGenerator, LlmClassifier>,
    session: Session,
}

impl App {
    /// 初始化应用
    pub async fn initialize(config: Config) -> Result<Self> {
        // 初始化日志文件
        init_log_file(&config.output_log_file)?;

        log_startup(&config);

        if config.generation_api_key.is_empty() {
            warn!("⚠️ 未设置 GENERATION_API_KEY，生成请求将会失败");
        }

        let enhancer = Enhancer::new(
            GeminiGenerator::new(&config),
            LlmClassifier::new(&config),
            &config,
        );
        let liked = LikedSet::load(Box::new(JsonFileStore::new(&config.liked_store_path)));
        info!("❤️ 已加载 {} 条收藏", liked.len());

        Ok(Self {
            config,
            enhancer,
            session: Session::new(liked),
        })
    }

    /// 运行应用主逻辑
    pub async fn run(mut self) -> Result<()> {
        // 加载所有待处理的图片
        info!("\n📁 正在扫描待处理的图片...");
        let uploads = load_images_from_folder(&self.config.input_folder)
            .await
            .with_context(|| format!("加载图片目录失败: {}", self.config.input_folder))?;

        if uploads.is_empty() {
            warn!("⚠️ 没有找到待处理的图片，程序结束");
            return Ok(());
        }

        log_images_loaded(uploads.len(), self.config.batch_size);

        for upload in uploads {
            let id = self.enhancer.import(&mut self.session, upload.image).await;
            if let Some(record) = self.session.record(&id) {
                info!("🖼️ {} → {}", upload.name, record.title);
            }
        }

        let summary = self.enhance().await?;

        if self.config.auto_like {
            self.like_succeeded()?;
        }

        if let Err(e) = append_run_summary(&self.config.output_log_file, self.session.records()) {
            warn!("写入运行日志失败: {}", e);
        }

        self.export().await;

        print_final_stats(&summary, &self.config.output_log_file);
        Ok(())
    }

    async fn enhance(&mut self) -> Result<RunSummary> {
        let on_progress = |p: Progress| info!("⏳ 进度: {}/{}", p.completed, p.total);

        let outcome = match self.config.mode {
            EnhanceMode::Auto => self.enhancer.auto_enhance(&mut self.session, on_progress).await,
            EnhanceMode::Custom => {
                let style = self.config.style();
                self.enhancer
                    .custom_enhance(&mut self.session, &style, &self.config.angles, on_progress)
                    .await
            }
        };

        match outcome {
            Ok(summary) => Ok(summary),
            Err(e) if e.is_business(&BusinessError::NoEligibleImages) => {
                warn!("⚠️ {}", e);
                Ok(RunSummary::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn like_succeeded(&mut self) -> Result<()> {
        let ids: Vec<String> = self
            .session
            .records()
            .iter()
            .filter(|r| !r.is_original() && r.status == RecordStatus::Succeeded)
            .map(|r| r.id.clone())
            .collect();

        for id in &ids {
            self.session.like(id)?;
        }
        info!("❤️ 已自动收藏 {} 张结果", ids.len());
        Ok(())
    }

    /// 分别导出选中结果和收藏快照，一个失败不影响另一个
    async fn export(&self) {
        let export_dir = Path::new(&self.config.export_folder);

        let selected = self.session.selected_results();
        export_or_skip(&selected, &export_dir.join("selected"), "jewelry").await;

        let liked = self.session.liked_records();
        export_or_skip(&liked, &export_dir.join("liked"), "liked").await;
    }
}

/// 导出；没有可导出的图片时只记日志，导出失败记错误日志
///
/// # 返回
/// 成功时返回压缩包路径
async fn export_or_skip(records: &[ImageRecord], dir: &Path, prefix: &str) -> Option<PathBuf> {
    match export_bundle(records, dir, prefix).await {
        Ok(path) => Some(path),
        Err(AppError::Business(BusinessError::NothingToExport)) => {
            info!("📭 {} 没有可导出的图片", prefix);
            None
        }
        Err(e) => {
            error!("❌ 导出失败 {}: {}", dir.display(), e);
            None
        }
    }
}
