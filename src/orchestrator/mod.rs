//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责会话状态和批量调度，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `session` - 会话状态
//! - 持有所有图片记录（原图 + 派生结果）和收藏集合
//! - 判断哪些原图待处理（每张原图只处理一次）
//! - 创建 `Loading` 占位记录、运行互斥、进度计数
//! - 运行结束后按 ID 合并结果
//!
//! ### `batch_processor` - 批量调度器
//! - 把任务切成固定大小的批次
//! - 批内并发、批间串行
//! - 每个任务完成后回调一次进度
//!
//! ### `enhancer` - 增强编排器
//! - 导入图片（分类得到标题）
//! - 一键增强 / 自定义增强
//!
//! ## 层次关系
//!
//! ```text
//! enhancer (Auto / Custom)
//!     ↓
//! session (占位 / 合并)  +  batch_processor (Vec<Job>)
//!     ↓
//! workflow::RetryHarness (处理单个 Job)
//!     ↓
//! services (能力层：generation / classify / liked_store / export)
//! ```

pub mod batch_processor;
pub mod enhancer;
pub mod session;

// 重新导出主要类型
pub use batch_processor::{BatchScheduler, BATCH_SIZE};
pub use enhancer::Enhancer;
pub use session::{reconcile, Progress, RecordGroup, RunState, RunSummary, Session, AUTO_RESULT_LABEL};
