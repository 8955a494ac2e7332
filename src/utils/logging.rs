use anyhow::{Context, Result};
/// 日志工具模块
///
/// 提供日志格式化和运行日志文件的辅助函数
use std::fs::{self, OpenOptions};
use std::io::Write;
use tracing::info;

use crate::config::{Config, EnhanceMode};
use crate::models::image_record::{ImageRecord, RecordStatus};
use crate::orchestrator::session::RunSummary;

/// 初始化日志文件
///
/// # 参数
/// - `log_file_path`: 日志文件路径
pub fn init_log_file(log_file_path: &str) -> Result<()> {
    let log_header = format!(
        "{}\n首饰图片增强日志 - {}\n{}\n\n",
        "=".repeat(60),
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        "=".repeat(60)
    );
    fs::write(log_file_path, log_header)
        .with_context(|| format!("无法创建日志文件: {}", log_file_path))?;
    Ok(())
}

/// 记录程序启动信息
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 首饰图片增强");
    match config.mode {
        EnhanceMode::Auto => info!("✨ 模式: 一键增强"),
        EnhanceMode::Custom => {
            let angles: Vec<_> = config.angles.iter().map(|a| a.label()).collect();
            info!("🎨 模式: 自定义增强");
            info!(
                "   背景 {:?} / 光线 {:?} / 材质 {:?}",
                config.background, config.lighting, config.material
            );
            info!("   角度: {}", angles.join(", "));
        }
    }
    info!(
        "📊 每批任务数: {}，最大尝试次数: {}",
        config.batch_size, config.max_retries
    );
    info!("{}", "=".repeat(60));
}

/// 记录图片加载信息
///
/// # 参数
/// - `total`: 图片总数
/// - `batch_size`: 每批任务数
pub fn log_images_loaded(total: usize, batch_size: usize) {
    info!("✓ 找到 {} 张待处理的图片", total);
    info!("📋 将以每批 {} 个任务的方式处理", batch_size);
    info!("💡 每批完成后再开始下一批\n");
}

/// 把每条结果追加到日志文件
///
/// # 参数
/// - `log_file_path`: 日志文件路径
/// - `records`: 本次运行的所有记录
pub fn append_run_summary(log_file_path: &str, records: &[ImageRecord]) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file_path)
        .with_context(|| format!("无法打开日志文件: {}", log_file_path))?;

    for record in records.iter().filter(|r| !r.is_original()) {
        let line = match record.status {
            RecordStatus::Succeeded => format!("✅ {}", record.title),
            RecordStatus::Failed => format!(
                "❌ {} - {}",
                record.title,
                truncate_text(record.error_message.as_deref().unwrap_or_default(), 120)
            ),
            RecordStatus::Pending | RecordStatus::Loading => format!("⏳ {}", record.title),
        };
        writeln!(file, "{}", line)?;
    }
    Ok(())
}

/// 打印最终统计信息
///
/// # 参数
/// - `summary`: 运行统计
/// - `log_file_path`: 日志文件路径
pub fn print_final_stats(summary: &RunSummary, log_file_path: &str) {
    info!("\n{}", "=".repeat(60));
    info!("📊 全部处理完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("✅ 成功: {}/{}", summary.succeeded, summary.total);
    info!("❌ 失败: {}", summary.failed);
    info!("{}", "=".repeat(60));
    info!("\n日志已保存至: {}", log_file_path);
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}
