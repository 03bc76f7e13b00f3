/// 推理后端 API 客户端
///
/// 封装所有与后端相关的调用逻辑：每次调用恰好发出一个网络请求，从不重试
use std::time::Duration;

use reqwest::multipart::{Form, Part};
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{ApiError, AppError, AppResult};
use crate::models::{
    AnswerSubmission, Difficulty, FileUpload, GeneratedQuiz, QuizResults, SummaryData,
    SummaryLength, UploadedDocument, VisualizationData,
};
use crate::services::upload_validator;

/// 后端支持的六种逻辑操作
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    UploadFile,
    UploadText,
    GenerateSummary,
    GenerateVisualization,
    GenerateQuiz,
    SubmitQuiz,
}

impl Operation {
    /// 操作名称（用作去重键的一部分）
    pub fn name(self) -> &'static str {
        match self {
            Operation::UploadFile => "upload-file",
            Operation::UploadText => "upload-text",
            Operation::GenerateSummary => "generate-summary",
            Operation::GenerateVisualization => "generate-visualization",
            Operation::GenerateQuiz => "generate-quiz",
            Operation::SubmitQuiz => "submit-quiz",
        }
    }

    /// 相对于 API 根地址的路径
    pub fn path(self) -> &'static str {
        match self {
            Operation::UploadFile => "/upload/upload-file",
            Operation::UploadText => "/upload/upload-text",
            Operation::GenerateSummary => "/summary/generate-summary",
            Operation::GenerateVisualization => "/summary/generate-visualization",
            Operation::GenerateQuiz => "/quiz/generate-quiz",
            Operation::SubmitQuiz => "/quiz/submit-quiz",
        }
    }
}

/// 所有接口共用的响应外壳 `{success, data}`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ApiEnvelope<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    #[serde(skip)]
    status: u16,
    #[serde(skip)]
    endpoint: String,
}

impl<T> ApiEnvelope<T> {
    /// 取出数据
    ///
    /// `success == false` 视为后端错误；成功但没有 `data` 视为响应格式错误
    pub fn into_data(self) -> AppResult<T> {
        if !self.success {
            let message = self
                .message
                .unwrap_or_else(|| format!("Error {}: backend reported failure", self.status));
            return Err(AppError::backend(self.endpoint, self.status, message));
        }

        self.data
            .ok_or_else(|| AppError::malformed(self.endpoint, "响应中缺少 data 字段"))
    }
}

/// 错误响应体
#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

// ========== 请求体 ==========

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct UploadTextRequest {
    pub content: String,
    pub title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SummaryRequest {
    pub text: String,
    pub length: SummaryLength,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct VisualizationRequest {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct QuizRequest {
    pub text: String,
    pub num_questions: u32,
    pub difficulty: Difficulty,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SubmitQuizRequest {
    pub session_id: String,
    pub answers: Vec<AnswerSubmission>,
}

/// 推理后端客户端（RequestGateway）
#[derive(Debug, Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    base_url: String,
}

impl BackendClient {
    /// 根据配置创建客户端
    pub fn new(config: &Config) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| ApiError::InvalidRequest {
                endpoint: config.api_base_url.clone(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            http,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
        })
    }

    /// 使用默认 HTTP 客户端和指定根地址创建
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// 上传文件（multipart）
    ///
    /// # 参数
    /// - `upload`: 文件名、内容和可选标题
    ///
    /// # 返回
    /// 返回会话记录的种子数据
    pub async fn upload_file(&self, upload: &FileUpload) -> AppResult<ApiEnvelope<UploadedDocument>> {
        let endpoint = Operation::UploadFile.path();
        debug!(
            "上传文件: {} ({} 字节)",
            upload.file_name,
            upload.bytes.len()
        );

        let part = Part::bytes(upload.bytes.clone())
            .file_name(upload.file_name.clone())
            .mime_str(upload_validator::mime_type_for(&upload.file_name))
            .map_err(|e| ApiError::InvalidRequest {
                endpoint: endpoint.to_string(),
                reason: e.to_string(),
            })?;

        let mut form = Form::new().part("file", part);
        if let Some(title) = upload.title.as_deref().filter(|t| !t.is_empty()) {
            form = form.text("title", title.to_string());
        }

        let response = self
            .http
            .post(self.url(endpoint))
            .multipart(form)
            .send()
            .await
            .map_err(|e| AppError::network(endpoint, e))?;

        Self::read_envelope(endpoint, response).await
    }

    /// 上传纯文本
    pub async fn upload_text(
        &self,
        request: &UploadTextRequest,
    ) -> AppResult<ApiEnvelope<UploadedDocument>> {
        self.post_json(Operation::UploadText, request).await
    }

    /// 生成摘要
    pub async fn generate_summary(
        &self,
        request: &SummaryRequest,
    ) -> AppResult<ApiEnvelope<SummaryData>> {
        self.post_json(Operation::GenerateSummary, request).await
    }

    /// 生成可视化数据
    pub async fn generate_visualization(
        &self,
        request: &VisualizationRequest,
    ) -> AppResult<ApiEnvelope<VisualizationData>> {
        self.post_json(Operation::GenerateVisualization, request)
            .await
    }

    /// 生成测验
    pub async fn generate_quiz(&self, request: &QuizRequest) -> AppResult<ApiEnvelope<GeneratedQuiz>> {
        self.post_json(Operation::GenerateQuiz, request).await
    }

    /// 提交测验答案
    pub async fn submit_quiz(
        &self,
        request: &SubmitQuizRequest,
    ) -> AppResult<ApiEnvelope<QuizResults>> {
        self.post_json(Operation::SubmitQuiz, request).await
    }

    /// 健康检查：`{根地址去掉 /api/v1}/health`
    pub async fn health_check(&self) -> AppResult<Value> {
        let url = format!("{}/health", self.base_url.replace("/api/v1", ""));
        debug!("健康检查: {}", url);

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| AppError::network("/health", e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AppError::network("/health", e))?;

        if !status.is_success() {
            return Err(AppError::backend(
                "/health",
                status.as_u16(),
                Self::error_message(status, &body),
            ));
        }

        serde_json::from_str(&body).map_err(|e| AppError::malformed("/health", e))
    }

    /// 发送 JSON 请求并解析响应外壳
    async fn post_json<B, T>(&self, operation: Operation, body: &B) -> AppResult<ApiEnvelope<T>>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let endpoint = operation.path();
        debug!("调用后端接口: {}", endpoint);

        let response = self
            .http
            .post(self.url(endpoint))
            .json(body)
            .send()
            .await
            .map_err(|e| AppError::network(endpoint, e))?;

        Self::read_envelope(endpoint, response).await
    }

    /// 读取响应
    ///
    /// - 非 2xx：取响应体中的 `message`，没有时合成 `Error {status}: {reason}`
    /// - 2xx 但无法解析：响应格式错误
    async fn read_envelope<T: DeserializeOwned>(
        endpoint: &str,
        response: Response,
    ) -> AppResult<ApiEnvelope<T>> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AppError::network(endpoint, e))?;

        if !status.is_success() {
            let message = Self::error_message(status, &body);
            warn!("后端返回错误 ({}): {} {}", endpoint, status.as_u16(), message);
            return Err(AppError::backend(endpoint, status.as_u16(), message));
        }

        let mut envelope: ApiEnvelope<T> = serde_json::from_str(&body).map_err(|e| {
            warn!("响应格式错误 ({}): {}", endpoint, e);
            AppError::malformed(endpoint, e)
        })?;
        envelope.status = status.as_u16();
        envelope.endpoint = endpoint.to_string();

        Ok(envelope)
    }

    fn error_message(status: StatusCode, body: &str) -> String {
        serde_json::from_str::<ErrorBody>(body)
            .ok()
            .and_then(|b| b.message)
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| {
                format!(
                    "Error {}: {}",
                    status.as_u16(),
                    status.canonical_reason().unwrap_or("Unknown")
                )
            })
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    #[tokio::test]
    async fn test_upload_text_parses_envelope() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/upload/upload-text")
            .match_body(Matcher::Json(json!({
                "content": "Artificial intelligence improves efficiency.",
                "title": "AI Intro"
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "success": true,
                    "data": {
                        "title": "AI Intro",
                        "text": "Artificial intelligence improves efficiency.",
                        "analysis": {"word_count": 5, "sentence_count": 1},
                        "key_concepts": [{"concept": "intelligence", "frequency": 1, "relevance": 0.8}]
                    }
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = BackendClient::with_base_url(server.url());
        let doc = client
            .upload_text(&UploadTextRequest {
                content: "Artificial intelligence improves efficiency.".to_string(),
                title: Some("AI Intro".to_string()),
            })
            .await
            .unwrap()
            .into_data()
            .unwrap();

        assert_eq!(doc.title, "AI Intro");
        assert_eq!(doc.analysis.word_count, 5);
        assert_eq!(doc.key_concepts[0].concept, "intelligence");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_backend_error_uses_body_message() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/quiz/submit-quiz")
            .with_status(404)
            .with_body(r#"{"message": "Sesión de quiz no encontrada"}"#)
            .create_async()
            .await;

        let client = BackendClient::with_base_url(server.url());
        let err = client
            .submit_quiz(&SubmitQuizRequest {
                session_id: "missing".to_string(),
                answers: vec![],
            })
            .await
            .unwrap_err();

        match err {
            AppError::Api(ApiError::Backend { status, message, .. }) => {
                assert_eq!(status, 404);
                assert_eq!(message, "Sesión de quiz no encontrada");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_backend_error_without_body_uses_status() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/summary/generate-visualization")
            .with_status(500)
            .with_body("<html>oops</html>")
            .create_async()
            .await;

        let client = BackendClient::with_base_url(server.url());
        let err = client
            .generate_visualization(&VisualizationRequest {
                text: "x".to_string(),
            })
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "Error 500: Internal Server Error");
    }

    #[tokio::test]
    async fn test_malformed_success_body() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/quiz/generate-quiz")
            .with_status(200)
            .with_body(r#"{"success": true, "data": {"questions": "nope"}}"#)
            .create_async()
            .await;

        let client = BackendClient::with_base_url(server.url());
        let err = client
            .generate_quiz(&QuizRequest {
                text: "x".to_string(),
                num_questions: 5,
                difficulty: Difficulty::Medium,
            })
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            AppError::Api(ApiError::MalformedResponse { .. })
        ));
    }

    #[tokio::test]
    async fn test_unsuccessful_envelope_becomes_backend_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/summary/generate-summary")
            .with_status(200)
            .with_body(r#"{"success": false, "message": "Texto demasiado corto"}"#)
            .create_async()
            .await;

        let client = BackendClient::with_base_url(server.url());
        let envelope = client
            .generate_summary(&SummaryRequest {
                text: "x".to_string(),
                length: SummaryLength::Short,
            })
            .await
            .unwrap();

        assert!(!envelope.success);
        let err = envelope.into_data().unwrap_err();
        assert_eq!(err.to_string(), "Texto demasiado corto");
    }

    #[tokio::test]
    async fn test_success_without_data_is_malformed() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/upload/upload-text")
            .with_status(200)
            .with_body(r#"{"success": true}"#)
            .create_async()
            .await;

        let client = BackendClient::with_base_url(server.url());
        let envelope = client
            .upload_text(&UploadTextRequest {
                content: "hola".to_string(),
                title: None,
            })
            .await
            .unwrap();

        assert!(envelope.success);
        assert!(envelope.data.is_none());
        assert!(envelope.message.is_none());
        assert!(matches!(
            envelope.into_data().unwrap_err(),
            AppError::Api(ApiError::MalformedResponse { .. })
        ));
    }

    #[tokio::test]
    async fn test_network_error() {
        // 端口 1 上没有服务
        let client = BackendClient::with_base_url("http://127.0.0.1:1/api/v1");
        let err = client
            .generate_visualization(&VisualizationRequest {
                text: "x".to_string(),
            })
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Api(ApiError::Network { .. })));
    }

    #[tokio::test]
    async fn test_upload_file_sends_multipart() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/upload/upload-file")
            .match_header(
                "content-type",
                Matcher::Regex("multipart/form-data".to_string()),
            )
            .match_body(Matcher::AllOf(vec![
                Matcher::Regex(r#"name="file"; filename="notes.txt""#.to_string()),
                Matcher::Regex(r#"name="title""#.to_string()),
                Matcher::Regex("Apuntes".to_string()),
            ]))
            .with_status(200)
            .with_body(r#"{"success": true, "data": {"title": "Apuntes", "text": "hola"}}"#)
            .create_async()
            .await;

        let client = BackendClient::with_base_url(server.url());
        let upload = FileUpload::new("notes.txt", b"hola".to_vec()).with_title("Apuntes");
        let doc = client
            .upload_file(&upload)
            .await
            .unwrap()
            .into_data()
            .unwrap();

        assert_eq!(doc.text, "hola");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_health_check_strips_api_prefix() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/health")
            .with_status(200)
            .with_body(r#"{"status": "healthy"}"#)
            .create_async()
            .await;

        let client = BackendClient::with_base_url(format!("{}/api/v1", server.url()));
        let body = client.health_check().await.unwrap();

        assert_eq!(body["status"], "healthy");
        mock.assert_async().await;
    }
}
