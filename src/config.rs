use std::path::Path;

use serde::Deserialize;

use crate::error::{AppError, AppResult, ConfigError};
use crate::models::{Difficulty, SummaryLength};

/// 允许上传的最大文件大小（10 MiB）
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

/// 程序配置
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 后端 API 根地址
    pub api_base_url: String,
    /// 单次请求超时（秒）
    pub request_timeout_secs: u64,
    /// 摘要长度
    pub summary_length: SummaryLength,
    /// 每次测验的题目数量
    pub num_questions: u32,
    /// 测验难度
    pub quiz_difficulty: Difficulty,
    /// 上传文件大小上限（字节）
    pub max_upload_bytes: u64,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    /// 会话日志文件
    pub output_log_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8000/api/v1".to_string(),
            request_timeout_secs: 120,
            summary_length: SummaryLength::Medium,
            num_questions: 5,
            quiz_difficulty: Difficulty::Medium,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            verbose_logging: false,
            output_log_file: "session_log.txt".to_string(),
        }
    }
}

impl Config {
    /// 默认值 + 环境变量
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// 读取 TOML 配置文件，缺省项使用默认值，之后再应用环境变量
    pub fn from_toml_file(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::file_read_failed(path.display().to_string(), e))?;

        let config = Self::from_toml_str(&content).map_err(|e| match e {
            AppError::Config(ConfigError::TomlParseFailed { source, .. }) => {
                AppError::Config(ConfigError::TomlParseFailed {
                    path: path.display().to_string(),
                    source,
                })
            }
            other => other,
        })?;

        Ok(config.with_env_overrides())
    }

    /// 解析 TOML 文本
    pub fn from_toml_str(content: &str) -> AppResult<Self> {
        let config: Config = toml::from_str(content).map_err(|source| ConfigError::TomlParseFailed {
            path: String::new(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// 环境变量覆盖，无法解析的值保持原样
    pub fn with_env_overrides(self) -> Self {
        let env = |key: &str| std::env::var(key).ok();
        Self {
            api_base_url: env("API_BASE_URL").unwrap_or(self.api_base_url),
            request_timeout_secs: env("REQUEST_TIMEOUT_SECS").and_then(|v| v.parse().ok()).unwrap_or(self.request_timeout_secs),
            summary_length: env("SUMMARY_LENGTH").and_then(|v| SummaryLength::from_str(&v)).unwrap_or(self.summary_length),
            num_questions: env("NUM_QUESTIONS").and_then(|v| v.parse().ok()).filter(|n| *n > 0).unwrap_or(self.num_questions),
            quiz_difficulty: env("QUIZ_DIFFICULTY").and_then(|v| Difficulty::from_str(&v)).unwrap_or(self.quiz_difficulty),
            max_upload_bytes: env("MAX_UPLOAD_BYTES").and_then(|v| v.parse().ok()).unwrap_or(self.max_upload_bytes),
            verbose_logging: env("VERBOSE_LOGGING").and_then(|v| v.parse().ok()).unwrap_or(self.verbose_logging),
            output_log_file: env("OUTPUT_LOG_FILE").unwrap_or(self.output_log_file),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.num_questions == 0 {
            return Err(ConfigError::InvalidValue {
                key: "num_questions".to_string(),
                value: "0".to_string(),
            });
        }
        if self.api_base_url.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "api_base_url".to_string(),
                value: self.api_base_url.clone(),
            });
        }
        Ok(())
    }
}
