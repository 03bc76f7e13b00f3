//! 上传 → 摘要 → 测验流程 - 流程层
//!
//! 核心职责：把每个阶段的请求串起来
//!
//! 每个操作的顺序：
//! 1. 本地校验（失败直接返回，不进入单飞控制，也不发请求）
//! 2. 领取票据
//! 3. 通过单飞控制调用后端
//! 4. 票据仍然有效时把结果写入流程状态，否则丢弃

use std::sync::{Mutex, MutexGuard};

use tracing::{debug, info, warn};

use crate::clients::{
    BackendClient, Operation, QuizRequest, SubmitQuizRequest, SummaryRequest, UploadTextRequest,
    VisualizationRequest,
};
use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::models::{
    Difficulty, FileUpload, QuizResults, QuizState, SessionRecord, SessionUpdate, SummaryLength,
};
use crate::services::{upload_validator, Flight, RequestKey, SingleFlight};
use crate::utils::logging::truncate_text;
use crate::workflow::pipeline_state::{PipelineState, Stage, Ticket};

/// 文本上传未填写标题时使用的标题
pub const DEFAULT_TEXT_TITLE: &str = "Texto ingresado manualmente";

/// 一次操作的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// 结果已写入流程状态
    Applied,
    /// 相同请求已在途，本次调用没有发出请求
    Suppressed,
    /// 响应到达时流程已经切换阶段或重置，结果被丢弃
    Stale,
}

/// 流程使用的请求参数
#[derive(Debug, Clone, PartialEq)]
pub struct FlowOptions {
    pub summary_length: SummaryLength,
    pub num_questions: u32,
    pub difficulty: Difficulty,
    pub max_upload_bytes: u64,
}

impl From<&Config> for FlowOptions {
    fn from(config: &Config) -> Self {
        Self {
            summary_length: config.summary_length,
            num_questions: config.num_questions,
            difficulty: config.quiz_difficulty,
            max_upload_bytes: config.max_upload_bytes,
        }
    }
}

/// 流程编排
///
/// - 持有唯一的流程状态，所有写入都在两次网络等待之间同步完成
/// - 所有方法只需要 `&self`，同一个流程可以被重复触发，由单飞控制去重
pub struct PipelineFlow {
    client: BackendClient,
    single_flight: SingleFlight,
    state: Mutex<PipelineState>,
    options: FlowOptions,
}

impl PipelineFlow {
    pub fn new(client: BackendClient, config: &Config) -> Self {
        Self::with_options(client, FlowOptions::from(config))
    }

    pub fn with_options(client: BackendClient, options: FlowOptions) -> Self {
        Self {
            client,
            single_flight: SingleFlight::new(),
            state: Mutex::new(PipelineState::new()),
            options,
        }
    }

    // ========== 状态查询 ==========

    pub fn stage(&self) -> Stage {
        self.state().stage()
    }

    /// 当前会话记录的副本
    pub fn record(&self) -> Option<SessionRecord> {
        self.state().record().cloned()
    }

    /// 当前流程状态的副本
    pub fn snapshot(&self) -> PipelineState {
        self.state().clone()
    }

    pub fn summary_ready(&self) -> bool {
        self.state().summary_ready()
    }

    pub fn quiz(&self) -> Option<QuizState> {
        self.state().quiz().cloned()
    }

    pub fn quiz_results(&self) -> Option<QuizResults> {
        self.state().quiz().and_then(|q| q.results().cloned())
    }

    /// 是否有请求在途
    pub fn loading(&self) -> bool {
        self.single_flight.loading()
    }

    /// 最近一次失败的错误消息
    pub fn error(&self) -> Option<String> {
        self.single_flight.error()
    }

    pub fn clear_error(&self) {
        self.single_flight.clear_error();
    }

    // ========== 阶段 1: 上传 ==========

    /// 上传文本
    ///
    /// # 参数
    /// - `content`: 文本内容，空白文本在本地被拒绝
    /// - `title`: 标题，未提供时使用默认标题
    pub async fn upload_text(&self, content: &str, title: Option<&str>) -> AppResult<StepOutcome> {
        upload_validator::validate_text(content)?;
        let ticket = self.ticket_for(Stage::Upload)?;

        let title = title
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(DEFAULT_TEXT_TITLE);
        let request = UploadTextRequest {
            content: content.to_string(),
            title: Some(title.to_string()),
        };
        let key = RequestKey::from_args(Operation::UploadText, &request)?;

        info!(
            "📤 上传文本: {} ({})",
            truncate_text(title, 40),
            truncate_text(content.trim(), 60)
        );
        let flight = self
            .single_flight
            .run(key, || async {
                self.client.upload_text(&request).await?.into_data()
            })
            .await?;

        let Flight::Completed(doc) = flight else {
            return Ok(StepOutcome::Suppressed);
        };

        self.apply(ticket, |state| {
            state.complete_upload(doc)?;
            Ok(())
        })
    }

    /// 上传文件，类型和大小在本地校验
    pub async fn upload_file(&self, upload: FileUpload) -> AppResult<StepOutcome> {
        upload_validator::validate_file(
            &upload.file_name,
            upload.size(),
            self.options.max_upload_bytes,
        )?;
        let ticket = self.ticket_for(Stage::Upload)?;

        let title = upload.effective_title().to_string();
        let upload = upload.with_title(title.clone());
        let key = RequestKey::from_args(Operation::UploadFile, &(&upload.file_name, &title))?
            .with_payload(&upload.bytes);

        info!(
            "📤 上传文件: {} ({})",
            truncate_text(&upload.file_name, 40),
            upload_validator::format_file_size(upload.size())
        );
        let flight = self
            .single_flight
            .run(key, || async {
                self.client.upload_file(&upload).await?.into_data()
            })
            .await?;

        let Flight::Completed(doc) = flight else {
            return Ok(StepOutcome::Suppressed);
        };

        self.apply(ticket, |state| {
            state.complete_upload(doc)?;
            Ok(())
        })
    }

    // ========== 阶段 2: 摘要与可视化 ==========

    /// 同时请求摘要和可视化，两者都成功才合并
    ///
    /// 两个请求共用一个去重键：只要本阶段还有请求在途，重复调用不会再发出任何请求
    pub async fn load_summary(&self) -> AppResult<StepOutcome> {
        let (ticket, text) = {
            let state = self.state();
            state.require_stage(Stage::Summary)?;
            let text = state.source_text()?.to_string();
            (state.ticket(), text)
        };

        let summary_request = SummaryRequest {
            text: text.clone(),
            length: self.options.summary_length,
        };
        let visualization_request = VisualizationRequest { text };
        let key = RequestKey::combined(
            &[Operation::GenerateSummary, Operation::GenerateVisualization],
            &(&summary_request, &visualization_request),
        )?;

        info!("📝 生成摘要和可视化...");
        let flight = self
            .single_flight
            .run(key, || async {
                futures::try_join!(
                    async {
                        self.client
                            .generate_summary(&summary_request)
                            .await?
                            .into_data()
                    },
                    async {
                        self.client
                            .generate_visualization(&visualization_request)
                            .await?
                            .into_data()
                    },
                )
            })
            .await?;

        let Flight::Completed((summary, visualization)) = flight else {
            debug!("摘要阶段的请求已在途，本次调用不合并");
            return Ok(StepOutcome::Suppressed);
        };

        self.apply(ticket, |state| {
            state.merge(SessionUpdate {
                summary: Some(summary),
                visualization: Some(visualization),
            })?;
            Ok(())
        })
    }

    /// 摘要 → 测验
    pub fn proceed_to_quiz(&self) -> AppResult<()> {
        self.state().advance_to_quiz()?;
        info!("➡️ 进入测验阶段");
        Ok(())
    }

    // ========== 阶段 3: 测验 ==========

    /// 根据原文生成测验，替换之前的测验会话
    pub async fn start_quiz(&self) -> AppResult<StepOutcome> {
        let (ticket, text) = {
            let state = self.state();
            state.require_stage(Stage::Quiz)?;
            let text = state.source_text()?.to_string();
            (state.ticket(), text)
        };

        let request = QuizRequest {
            text,
            num_questions: self.options.num_questions,
            difficulty: self.options.difficulty,
        };
        let key = RequestKey::from_args(Operation::GenerateQuiz, &request)?;

        info!(
            "🧩 生成测验: {} 题 / 难度 {}",
            request.num_questions,
            request.difficulty.as_str()
        );
        let flight = self
            .single_flight
            .run(key, || async {
                self.client.generate_quiz(&request).await?.into_data()
            })
            .await?;

        let Flight::Completed(quiz) = flight else {
            return Ok(StepOutcome::Suppressed);
        };

        info!("✓ 测验已生成: 会话 {}，{} 题", quiz.session_id, quiz.questions.len());
        self.apply(ticket, |state| {
            state.attach_quiz(QuizState::from_generated(quiz))?;
            Ok(())
        })
    }

    /// 选择答案
    pub fn select_answer(&self, question_index: usize, option_index: usize) -> AppResult<()> {
        let mut state = self.state();
        state.quiz_mut()?.select_answer(question_index, option_index)?;
        Ok(())
    }

    /// 提交答案，未全部作答时在本地拒绝
    ///
    /// 提交在途期间测验被锁定，不能改答案，也不能再次提交
    pub async fn submit_quiz(&self) -> AppResult<StepOutcome> {
        let (ticket, request) = {
            let mut state = self.state();
            let ticket = state.ticket();
            let quiz = state.quiz_mut()?;
            let answers = quiz.begin_submission()?;
            let request = SubmitQuizRequest {
                session_id: quiz.session_id.clone(),
                answers,
            };
            (ticket, request)
        };

        info!("📨 提交答案: 会话 {}", request.session_id);
        let flight = match RequestKey::from_args(Operation::SubmitQuiz, &request) {
            Ok(key) => {
                self.single_flight
                    .run(key, || async {
                        self.client.submit_quiz(&request).await?.into_data()
                    })
                    .await
            }
            Err(e) => Err(e),
        };

        let mut state = self.state();
        let same_session = state
            .quiz()
            .map(|q| q.session_id == request.session_id)
            .unwrap_or(false);

        let results = match flight {
            Ok(Flight::Completed(results)) => results,
            other => {
                // 提交没有完成，解除锁定以便重试
                if same_session {
                    if let Ok(quiz) = state.quiz_mut() {
                        quiz.cancel_submission();
                    }
                }
                return other.map(|_| StepOutcome::Suppressed);
            }
        };

        if !state.is_current(&ticket) || !same_session {
            warn!("⚠️ 测验会话已变化，丢弃会话 {} 的批改结果", request.session_id);
            return Ok(StepOutcome::Stale);
        }

        info!(
            "✓ 批改完成: {}/{} ({}%)",
            results.score, results.total_questions, results.percentage
        );
        state.quiz_mut()?.record_results(results)?;
        Ok(StepOutcome::Applied)
    }

    /// 重新开始：丢弃会话记录，回到上传阶段
    pub fn restart(&self) {
        self.state().reset();
        self.single_flight.clear_error();
        info!("🔄 流程已重置");
    }

    // ========== 内部辅助 ==========

    fn state(&self) -> MutexGuard<'_, PipelineState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn ticket_for(&self, stage: Stage) -> AppResult<Ticket> {
        let state = self.state();
        state.require_stage(stage)?;
        Ok(state.ticket())
    }

    /// 票据有效时写入状态
    fn apply<F>(&self, ticket: Ticket, update: F) -> AppResult<StepOutcome>
    where
        F: FnOnce(&mut PipelineState) -> Result<(), AppError>,
    {
        let mut state = self.state();
        if !state.is_current(&ticket) {
            warn!(
                "⚠️ 响应到达时流程已离开 {} 阶段，丢弃结果",
                ticket.stage().label()
            );
            return Ok(StepOutcome::Stale);
        }
        update(&mut state)?;
        Ok(StepOutcome::Applied)
    }
}
