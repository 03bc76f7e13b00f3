//! 上传校验 - 业务能力层
//!
//! 纯函数，在任何网络请求之前拒绝不合法的输入

use crate::error::ValidationError;

/// 允许的文件扩展名
pub const ALLOWED_EXTENSIONS: [&str; 3] = ["pdf", "txt", "docx"];

/// 取文件扩展名（小写）
pub fn file_extension(file_name: &str) -> Option<String> {
    let (stem, ext) = file_name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// 校验文件类型和大小
///
/// # 参数
/// - `file_name`: 文件名
/// - `size`: 文件大小（字节）
/// - `max_size`: 允许的最大大小（字节）
pub fn validate_file(file_name: &str, size: u64, max_size: u64) -> Result<(), ValidationError> {
    let allowed = file_extension(file_name)
        .map(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false);

    if !allowed {
        return Err(ValidationError::UnsupportedFileType {
            file_name: file_name.to_string(),
        });
    }

    if size > max_size {
        return Err(ValidationError::FileTooLarge {
            file_name: file_name.to_string(),
            size,
            limit: format_file_size(max_size),
        });
    }

    Ok(())
}

/// 校验文本内容，返回去掉首尾空白后的文本
pub fn validate_text(content: &str) -> Result<&str, ValidationError> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyText);
    }
    Ok(trimmed)
}

/// 上传时使用的 MIME 类型
pub fn mime_type_for(file_name: &str) -> &'static str {
    match file_extension(file_name).as_deref() {
        Some("pdf") => "application/pdf",
        Some("txt") => "text/plain",
        Some("docx") => {
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
        }
        _ => "application/octet-stream",
    }
}

/// 格式化文件大小，例如 `10 MB`、`1.5 KB`
pub fn format_file_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    // 保留两位小数并去掉末尾的 0
    let formatted = format!("{:.2}", value);
    let formatted = formatted.trim_end_matches('0').trim_end_matches('.');
    format!("{} {}", formatted, UNITS[unit])
}
