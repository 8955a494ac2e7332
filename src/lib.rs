//! # Jewelry Enhance
//!
//! 一个用于批量增强首饰产品图的 Rust 应用程序
//!
//! ## 架构设计
//!
//! 本系统采用分层架构：
//!
//! ### ① 数据模型（Models）
//! - `models/` - 图片记录、风格参数、生成任务
//! - `ImageRecord` - 原图或派生结果，状态 `Pending → Loading → Succeeded | Failed`
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，只处理单张图片
//! - `ImageGenerator` - 图片生成接口
//! - `SubjectClassifier` - 图片分类接口
//! - `prompt_builder` - 根据风格和角度拼提示词
//! - `LikedSet` - 收藏持久化
//! - `capture` / `upload` / `export` - 拍照、上传、批量导出
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一个任务"的处理流程
//! - `RetryHarness` - 带指数退避的生成重试
//! - `TitleClassifier` - 分类得到展示标题
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/session` - 会话状态、占位与合并
//! - `orchestrator/batch_processor` - 批内并发、批间串行
//! - `orchestrator/enhancer` - 一键增强 / 自定义增强
//!
//! ## 模块结构

pub mod app;
pub mod config;
pub mod error;
pub mod logger;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use app::App;
pub use config::{Config, EnhanceMode};
pub use error::{AppError, AppResult};
pub use models::{Angle, ImageData, ImageRecord, OutputFormat, RecordStatus, StyleOptions};
pub use orchestrator::{BatchScheduler, Enhancer, Progress, RunSummary, Session};
pub use workflow::{RetryHarness, RetryPolicy};
