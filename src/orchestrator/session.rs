//! 会话状态 - 编排层
//!
//! ## 职责
//!
//! 持有当前会话的全部图片记录和收藏集合，提供读写操作。
//!
//! ## 增强运行状态机
//!
//! ```text
//! Idle ──begin_*_run──▶ Running ──finish_run──▶ Idle
//! ```
//!
//! - 只有"还没有任何派生记录"的原图才会被处理（处理一次，不会重复处理失败的）
//! - `begin_*_run` 先创建所有 `Loading` 占位记录并写入会话，再交给调度器
//! - 运行期间不修改记录集合，`finish_run` 统一按 ID 合并结果
//! - 同一时间只允许一个运行

use std::cell::Cell;
use std::collections::HashMap;

use tracing::{debug, info};

use crate::error::{AppResult, BusinessError};
use crate::models::image_record::{ImageData, ImageRecord, RecordStatus};
use crate::models::job::Job;
use crate::models::style::{Angle, StyleOptions};
use crate::services::liked_store::LikedSet;
use crate::services::prompt_builder::{build_prompt, AUTO_ENHANCE_PROMPT};

/// 一键增强结果的标签
pub const AUTO_RESULT_LABEL: &str = "Auto Enhanced";

/// 运行进度 (已完成, 总数)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
}

/// 一次运行的统计
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// 一组记录：原图 + 它的所有派生结果
#[derive(Debug)]
pub struct RecordGroup<'a> {
    pub original: &'a ImageRecord,
    pub derived: Vec<&'a ImageRecord>,
}

/// 会话上下文
pub struct Session {
    records: Vec<ImageRecord>,
    liked: LikedSet,
    run_state: RunState,
    progress: Cell<Progress>,
}

impl Session {
    pub fn new(liked: LikedSet) -> Self {
        Self {
            records: Vec::new(),
            liked,
            run_state: RunState::Idle,
            progress: Cell::new(Progress::default()),
        }
    }

    // ========== 读取 ==========

    pub fn records(&self) -> &[ImageRecord] {
        &self.records
    }

    pub fn record(&self, id: &str) -> Option<&ImageRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    pub fn originals(&self) -> impl Iterator<Item = &ImageRecord> {
        self.records.iter().filter(|r| r.is_original())
    }

    pub fn derived_of<'a>(&'a self, source_id: &'a str) -> impl Iterator<Item = &'a ImageRecord> {
        self.records
            .iter()
            .filter(move |r| r.source_id == source_id && !r.is_original())
    }

    /// 按原图分组，保持插入顺序
    pub fn groups(&self) -> Vec<RecordGroup<'_>> {
        self.originals()
            .map(|original| RecordGroup {
                original,
                derived: self.derived_of(&original.id).collect(),
            })
            .collect()
    }

    /// 还没有任何派生记录的原图
    pub fn eligible_originals(&self) -> Vec<&ImageRecord> {
        self.originals()
            .filter(|o| self.derived_of(&o.id).next().is_none())
            .collect()
    }

    pub fn unenhanced_count(&self) -> usize {
        self.eligible_originals().len()
    }

    /// 增强按钮是否可用
    pub fn can_enhance(&self) -> bool {
        self.run_state == RunState::Idle && self.unenhanced_count() > 0
    }

    pub fn run_state(&self) -> RunState {
        self.run_state
    }

    pub fn is_running(&self) -> bool {
        self.run_state == RunState::Running
    }

    pub fn progress(&self) -> Progress {
        self.progress.get()
    }

    /// 已选中且成功的结果，用于批量导出
    pub fn selected_results(&self) -> Vec<ImageRecord> {
        self.records
            .iter()
            .filter(|r| !r.is_original() && r.is_selected && r.status == RecordStatus::Succeeded)
            .cloned()
            .collect()
    }

    pub fn liked(&self) -> &LikedSet {
        &self.liked
    }

    // ========== 写入 ==========

    /// 接收一张新原图，返回记录 ID
    pub fn add_original(&mut self, image: ImageData, title: impl Into<String>) -> String {
        let record = ImageRecord::original(image, title);
        let id = record.id.clone();
        debug!("新增原图: {} ({})", record.title, id);
        self.records.push(record);
        id
    }

    /// 删除单条记录；删除原图等同于删除整组
    pub fn remove_record(&mut self, id: &str) -> AppResult<usize> {
        let record = self.record(id).ok_or_else(|| BusinessError::RecordNotFound {
            id: id.to_string(),
        })?;

        if record.is_original() {
            let source_id = record.source_id.clone();
            return Ok(self.remove_group(&source_id));
        }

        self.records.retain(|r| r.id != id);
        Ok(1)
    }

    /// 删除原图及其所有派生记录，返回删除的数量
    pub fn remove_group(&mut self, source_id: &str) -> usize {
        let before = self.records.len();
        self.records.retain(|r| r.source_id != source_id);
        let removed = before - self.records.len();
        debug!("删除分组 {}: {} 条记录", source_id, removed);
        removed
    }

    /// 切换选中状态，返回切换后的状态
    pub fn toggle_selected(&mut self, id: &str) -> AppResult<bool> {
        let record = self
            .records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| BusinessError::RecordNotFound { id: id.to_string() })?;
        record.is_selected = !record.is_selected;
        Ok(record.is_selected)
    }

    /// 全选 / 全不选所有成功的结果
    pub fn select_all_results(&mut self, selected: bool) {
        for record in self
            .records
            .iter_mut()
            .filter(|r| !r.is_original() && r.status == RecordStatus::Succeeded)
        {
            record.is_selected = selected;
        }
    }

    /// 收藏一条记录（已收藏时不做任何事）
    pub fn like(&mut self, id: &str) -> AppResult<()> {
        let record = self
            .records
            .iter()
            .find(|r| r.id == id)
            .ok_or_else(|| BusinessError::RecordNotFound { id: id.to_string() })?;
        self.liked.like(record);
        Ok(())
    }

    /// 取消收藏，返回之前是否已收藏
    pub fn unlike(&mut self, id: &str) -> bool {
        self.liked.unlike(id)
    }

    /// 切换收藏，返回切换后是否已收藏
    pub fn toggle_like(&mut self, id: &str) -> AppResult<bool> {
        let record = self
            .records
            .iter()
            .find(|r| r.id == id)
            .ok_or_else(|| BusinessError::RecordNotFound { id: id.to_string() })?;
        Ok(self.liked.toggle(record))
    }

    /// 收藏快照，按收藏时间排序，用于导出
    pub fn liked_records(&self) -> Vec<ImageRecord> {
        self.liked.records().into_iter().cloned().collect()
    }

    // ========== 增强运行 ==========

    /// 开始一键增强：每张待处理原图一个任务，使用固定提示词
    pub fn begin_auto_run(&mut self) -> AppResult<Vec<Job>> {
        self.ensure_idle()?;

        let jobs: Vec<Job> = self
            .eligible_originals()
            .into_iter()
            .map(|source| {
                let title = format!("{} · {}", source.title, AUTO_RESULT_LABEL);
                let record = ImageRecord::derive_loading(source, title, AUTO_RESULT_LABEL, None);
                Job::new(record, AUTO_ENHANCE_PROMPT)
            })
            .collect();

        self.begin_run(jobs)
    }

    /// 开始自定义增强：每张待处理原图 × 每个选中角度一个任务
    ///
    /// 所有角度（包括正面）都以原图为输入，不基于已生成的结果
    pub fn begin_custom_run(
        &mut self,
        style: &StyleOptions,
        angles: &[Angle],
    ) -> AppResult<Vec<Job>> {
        self.ensure_idle()?;
        if angles.is_empty() {
            return Err(BusinessError::NoAnglesSelected.into());
        }

        let mut jobs = Vec::new();
        for source in self.eligible_originals() {
            for &angle in angles {
                let title = format!("{} · {}", source.title, angle.label());
                let record = ImageRecord::derive_loading(source, title, angle.label(), Some(angle));
                jobs.push(Job::new(record, build_prompt(style, angle)));
            }
        }

        self.begin_run(jobs)
    }

    fn ensure_idle(&self) -> AppResult<()> {
        if self.is_running() {
            return Err(BusinessError::RunInProgress.into());
        }
        Ok(())
    }

    fn begin_run(&mut self, jobs: Vec<Job>) -> AppResult<Vec<Job>> {
        if jobs.is_empty() {
            return Err(BusinessError::NoEligibleImages.into());
        }

        // 先写入占位记录，界面可以立即显示
        self.records.extend(jobs.iter().map(|job| job.record.clone()));
        self.run_state = RunState::Running;
        self.progress.set(Progress {
            completed: 0,
            total: jobs.len(),
        });

        info!("🚀 开始增强: 共 {} 个任务", jobs.len());
        Ok(jobs)
    }

    /// 记录一个任务完成，返回最新进度
    pub fn record_progress(&self) -> Progress {
        let mut progress = self.progress.get();
        progress.completed = (progress.completed + 1).min(progress.total);
        self.progress.set(progress);
        progress
    }

    /// 运行结束：按 ID 合并结果，回到空闲状态并重置进度
    pub fn finish_run(&mut self, results: Vec<ImageRecord>) -> RunSummary {
        let summary = RunSummary {
            total: results.len(),
            succeeded: results
                .iter()
                .filter(|r| r.status == RecordStatus::Succeeded)
                .count(),
            failed: results
                .iter()
                .filter(|r| r.status == RecordStatus::Failed)
                .count(),
        };

        let records = std::mem::take(&mut self.records);
        self.records = reconcile(records, results);
        self.run_state = RunState::Idle;
        self.progress.set(Progress::default());

        info!(
            "✅ 增强完成: 成功 {}/{}，失败 {}",
            summary.succeeded, summary.total, summary.failed
        );
        summary
    }
}

/// 按 ID 合并：旧集合中的记录被同 ID 的结果替换，顺序不变；
/// 旧集合中已不存在的结果被丢弃
pub fn reconcile(records: Vec<ImageRecord>, results: Vec<ImageRecord>) -> Vec<ImageRecord> {
    let mut by_id: HashMap<String, ImageRecord> =
        results.into_iter().map(|r| (r.id.clone(), r)).collect();

    records
        .into_iter()
        .map(|record| by_id.remove(&record.id).unwrap_or(record))
        .collect()
}
