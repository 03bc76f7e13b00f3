/// 日志工具模块
///
/// 提供日志初始化、格式化和输出的辅助函数
use std::fs::{self, OpenOptions};
use std::io::Write;

use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::error::{AppError, AppResult, FileError};

/// 初始化 tracing 订阅者
///
/// 优先使用 `RUST_LOG`，否则根据 `verbose` 选择 debug / info 级别。
/// 重复调用是安全的（测试中会多次调用）。
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// 初始化会话日志文件
///
/// # 参数
/// - `log_file_path`: 日志文件路径
pub fn init_log_file(log_file_path: &str) -> AppResult<()> {
    let log_header = format!(
        "{}\n学习会话日志 - {}\n{}\n\n",
        "=".repeat(60),
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        "=".repeat(60)
    );
    fs::write(log_file_path, log_header).map_err(|source| {
        AppError::File(FileError::WriteFailed {
            path: log_file_path.to_string(),
            source,
        })
    })?;
    Ok(())
}

/// 向会话日志文件追加一行
pub fn append_log_line(log_file_path: &str, line: &str) -> AppResult<()> {
    let write_failed = |source| {
        AppError::File(FileError::WriteFailed {
            path: log_file_path.to_string(),
            source,
        })
    };

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file_path)
        .map_err(write_failed)?;

    let entry = format!("[{}] {}\n", chrono::Local::now().format("%H:%M:%S"), line);
    file.write_all(entry.as_bytes()).map_err(write_failed)?;

    Ok(())
}

/// 记录程序启动信息
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 上传 → 摘要 → 测验");
    info!("🌐 后端地址: {}", config.api_base_url);
    info!(
        "📝 测验设置: {} 题 / 难度 {}",
        config.num_questions,
        config.quiz_difficulty.as_str()
    );
    info!("{}", "=".repeat(60));
}

/// 记录阶段切换
///
/// # 参数
/// - `index`: 阶段序号（从 1 开始）
/// - `total`: 阶段总数
/// - `label`: 阶段名称
pub fn log_stage(index: usize, total: usize, label: &str) {
    info!("\n{}", "─".repeat(60));
    info!("📦 阶段 {}/{}: {}", index, total, label);
    info!("{}", "─".repeat(60));
}

/// 打印测验成绩
pub fn print_final_stats(score: u32, total: u32, percentage: f64, log_file_path: &str) {
    info!("\n{}", "=".repeat(60));
    info!("📊 测验完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("✅ 正确: {}/{}", score, total);
    info!("❌ 错误: {}", total.saturating_sub(score));
    info!("📈 正确率: {}%", percentage);
    info!("{}", "=".repeat(60));
    info!("\n日志已保存至: {}", log_file_path);
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度（按字符计）
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_text_counts_chars() {
        assert_eq!(truncate_text("inteligencia", 5), "intel...");
        assert_eq!(truncate_text("人工智能", 4), "人工智能");
        assert_eq!(truncate_text("人工智能", 2), "人工...");
    }
}
