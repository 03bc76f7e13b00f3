//! 流程状态 - 流程层
//!
//! 三阶段状态机：上传 → 摘要 → 测验，任意阶段都可以重置回上传。
//! 每次阶段切换或重置都会递增 `generation`，网络请求发出前领取 [`Ticket`]，
//! 响应回来时只有票据仍然有效才允许写入状态。

use std::fmt::Display;

use crate::error::PipelineError;
use crate::models::{QuizState, SessionRecord, SessionUpdate, UploadedDocument};

/// 流程阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Upload,
    Summary,
    Quiz,
}

impl Stage {
    /// 阶段总数
    pub const COUNT: usize = 3;

    /// 阶段序号（从 1 开始，用于进度显示）
    pub fn index(self) -> usize {
        match self {
            Stage::Upload => 1,
            Stage::Summary => 2,
            Stage::Quiz => 3,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Stage::Upload => "上传内容",
            Stage::Summary => "摘要与可视化",
            Stage::Quiz => "测验",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Stage::Upload => "upload",
            Stage::Summary => "summary",
            Stage::Quiz => "quiz",
        }
    }
}

impl Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}/{} {}]", self.index(), Self::COUNT, self.label())
    }
}

/// 请求发出时的状态快照
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    generation: u64,
    stage: Stage,
}

impl Ticket {
    pub fn stage(&self) -> Stage {
        self.stage
    }
}

/// 流程状态，唯一持有会话记录
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineState {
    stage: Stage,
    record: Option<SessionRecord>,
    generation: u64,
    summary_done: bool,
    visualization_done: bool,
}

impl Default for PipelineState {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineState {
    pub fn new() -> Self {
        Self {
            stage: Stage::Upload,
            record: None,
            generation: 0,
            summary_done: false,
            visualization_done: false,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn record(&self) -> Option<&SessionRecord> {
        self.record.as_ref()
    }

    /// 领取票据
    pub fn ticket(&self) -> Ticket {
        Ticket {
            generation: self.generation,
            stage: self.stage,
        }
    }

    /// 票据是否仍然对应当前阶段
    pub fn is_current(&self, ticket: &Ticket) -> bool {
        ticket.generation == self.generation && ticket.stage == self.stage
    }

    /// 要求当前处于指定阶段
    pub fn require_stage(&self, expected: Stage) -> Result<(), PipelineError> {
        if self.stage != expected {
            return Err(PipelineError::WrongStage {
                expected: expected.name(),
                actual: self.stage.name(),
            });
        }
        Ok(())
    }

    /// 上传完成：用上传结果创建全新的会话记录并进入摘要阶段
    pub fn complete_upload(&mut self, doc: UploadedDocument) -> Result<(), PipelineError> {
        self.require_stage(Stage::Upload)?;
        self.record = Some(SessionRecord::from_upload(doc));
        self.summary_done = false;
        self.visualization_done = false;
        self.enter(Stage::Summary);
        Ok(())
    }

    /// 合并摘要阶段的结果，未提供的部分保持不变
    pub fn merge(&mut self, update: SessionUpdate) -> Result<(), PipelineError> {
        self.require_stage(Stage::Summary)?;
        let record = self.record.as_mut().ok_or(PipelineError::NoSession)?;

        self.summary_done |= update.summary.is_some();
        self.visualization_done |= update.visualization.is_some();
        record.merge(update);
        Ok(())
    }

    /// 摘要和可视化是否都已完成
    pub fn summary_ready(&self) -> bool {
        self.summary_done && self.visualization_done
    }

    /// 出题使用的原文
    pub fn source_text(&self) -> Result<&str, PipelineError> {
        let record = self.record.as_ref().ok_or(PipelineError::NoSession)?;
        if record.raw_text.trim().is_empty() {
            return Err(PipelineError::MissingSourceText);
        }
        Ok(&record.raw_text)
    }

    /// 摘要 → 测验
    pub fn advance_to_quiz(&mut self) -> Result<(), PipelineError> {
        self.require_stage(Stage::Summary)?;
        if !self.summary_ready() {
            return Err(PipelineError::SummaryIncomplete {
                summary: self.summary_done,
                visualization: self.visualization_done,
            });
        }
        self.source_text()?;
        self.enter(Stage::Quiz);
        Ok(())
    }

    /// 挂载新生成的测验，替换之前的测验会话
    pub fn attach_quiz(&mut self, quiz: QuizState) -> Result<(), PipelineError> {
        self.require_stage(Stage::Quiz)?;
        let record = self.record.as_mut().ok_or(PipelineError::NoSession)?;
        record.quiz = Some(quiz);
        Ok(())
    }

    pub fn quiz(&self) -> Option<&QuizState> {
        self.record.as_ref().and_then(|r| r.quiz.as_ref())
    }

    pub fn quiz_mut(&mut self) -> Result<&mut QuizState, PipelineError> {
        self.require_stage(Stage::Quiz)?;
        self.record
            .as_mut()
            .and_then(|r| r.quiz.as_mut())
            .ok_or(PipelineError::NoQuiz)
    }

    /// 重置：丢弃会话记录并回到上传阶段
    pub fn reset(&mut self) {
        self.record = None;
        self.summary_done = false;
        self.visualization_done = false;
        self.enter(Stage::Upload);
    }

    fn enter(&mut self, stage: Stage) {
        self.stage = stage;
        self.generation += 1;
    }
}
