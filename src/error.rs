use thiserror::Error;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 后端调用错误（网络 / 后端 / 响应格式）
    #[error(transparent)]
    Api(#[from] ApiError),
    /// 发起请求前的本地校验错误
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// 流程阶段错误
    #[error("流程错误: {0}")]
    Pipeline(#[from] PipelineError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// 文件操作错误
    #[error("文件错误: {0}")]
    File(#[from] FileError),
}

/// 后端调用错误
#[derive(Debug, Error)]
pub enum ApiError {
    /// 没有收到响应（连接失败、超时等）
    #[error("网络请求失败 ({endpoint}): {source}")]
    Network {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
    /// 后端返回了非成功状态，消息取自响应体或由状态码合成
    #[error("{message}")]
    Backend {
        endpoint: String,
        status: u16,
        message: String,
    },
    /// 状态成功但响应体不符合约定格式
    #[error("响应格式错误 ({endpoint}): {reason}")]
    MalformedResponse { endpoint: String, reason: String },
    /// 请求本身无法构建（序列化失败、客户端初始化失败）
    #[error("无法构建请求 ({endpoint}): {reason}")]
    InvalidRequest { endpoint: String, reason: String },
}

impl ApiError {
    /// 出错的接口路径
    pub fn endpoint(&self) -> &str {
        match self {
            ApiError::Network { endpoint, .. }
            | ApiError::Backend { endpoint, .. }
            | ApiError::MalformedResponse { endpoint, .. }
            | ApiError::InvalidRequest { endpoint, .. } => endpoint,
        }
    }

    /// 后端状态码（仅 Backend 错误有）
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Backend { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// 本地校验错误，永远在网络调用之前产生
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// 文件类型不被支持
    #[error("不支持的文件类型: {file_name}（仅支持 PDF、TXT、DOCX）")]
    UnsupportedFileType { file_name: String },
    /// 文件过大
    #[error("文件过大: {file_name} ({size} 字节)，最大允许 {limit}")]
    FileTooLarge {
        file_name: String,
        size: u64,
        limit: String,
    },
    /// 文本内容为空
    #[error("文本内容不能为空")]
    EmptyText,
    /// 题目索引越界
    #[error("题目索引 {question_index} 超出范围 [0, {total})")]
    QuestionOutOfRange { question_index: usize, total: usize },
    /// 选项索引越界
    #[error("题目 {question_index} 的选项索引 {option_index} 超出范围 [0, {option_count})")]
    AnswerOutOfRange {
        question_index: usize,
        option_index: usize,
        option_count: usize,
    },
    /// 还有题目未作答
    #[error("还有题目未作答: 已答 {answered}/{total}")]
    IncompleteQuiz { answered: usize, total: usize },
    /// 提交请求在途，测验已锁定
    #[error("答案正在提交中，请等待批改结果")]
    SubmissionInProgress,
    /// 同一测验会话只能提交一次
    #[error("该测验已提交，重新作答需要新的测验会话")]
    QuizAlreadySubmitted,
}

/// 流程阶段错误
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PipelineError {
    /// 当前阶段不允许该操作
    #[error("当前阶段为 {actual}，该操作需要 {expected} 阶段")]
    WrongStage {
        expected: &'static str,
        actual: &'static str,
    },
    /// 还没有会话记录
    #[error("尚未上传任何内容")]
    NoSession,
    /// 摘要阶段尚未全部完成
    #[error("摘要阶段未完成 (摘要: {summary}, 可视化: {visualization})")]
    SummaryIncomplete { summary: bool, visualization: bool },
    /// 会话记录中没有原文
    #[error("会话中没有可用于出题的原文")]
    MissingSourceText,
    /// 还没有生成测验
    #[error("尚未生成测验")]
    NoQuiz,
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 配置文件解析失败
    #[error("配置文件解析失败 ({path}): {source}")]
    TomlParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    /// 配置值不合法
    #[error("配置项 {key} 的值 '{value}' 不合法")]
    InvalidValue { key: String, value: String },
}

/// 文件操作错误
#[derive(Debug, Error)]
pub enum FileError {
    /// 读取文件失败
    #[error("读取文件失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// 写入文件失败
    #[error("写入文件失败 ({path}): {source}")]
    WriteFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建网络错误
    pub fn network(endpoint: impl Into<String>, source: reqwest::Error) -> Self {
        AppError::Api(ApiError::Network {
            endpoint: endpoint.into(),
            source,
        })
    }

    /// 创建后端错误
    pub fn backend(endpoint: impl Into<String>, status: u16, message: impl Into<String>) -> Self {
        AppError::Api(ApiError::Backend {
            endpoint: endpoint.into(),
            status,
            message: message.into(),
        })
    }

    /// 创建响应格式错误
    pub fn malformed(endpoint: impl Into<String>, reason: impl ToString) -> Self {
        AppError::Api(ApiError::MalformedResponse {
            endpoint: endpoint.into(),
            reason: reason.to_string(),
        })
    }

    /// 创建文件读取错误
    pub fn file_read_failed(path: impl Into<String>, source: std::io::Error) -> Self {
        AppError::File(FileError::ReadFailed {
            path: path.into(),
            source,
        })
    }

    /// 是否是本地校验错误
    pub fn is_validation(&self) -> bool {
        matches!(self, AppError::Validation(_))
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_error_displays_server_message() {
        let err = AppError::backend("/quiz/submit-quiz", 422, "Sesión no encontrada");
        assert_eq!(err.to_string(), "Sesión no encontrada");

        match err {
            AppError::Api(api) => {
                assert_eq!(api.status(), Some(422));
                assert_eq!(api.endpoint(), "/quiz/submit-quiz");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_validation_error_is_flagged() {
        let err: AppError = ValidationError::EmptyText.into();
        assert!(err.is_validation());
        assert!(!AppError::malformed("/x", "bad").is_validation());
    }
}
