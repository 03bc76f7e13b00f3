//! 测验状态
//!
//! `session_id` 是后端批改时使用的关联键，原样转发

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// 单道选择题
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub question: String,
    pub options: Vec<String>,
    #[serde(rename = "correct_answer")]
    pub correct_answer_index: usize,
    #[serde(default)]
    pub explanation: String,
    #[serde(default)]
    pub difficulty: String,
}

/// generate-quiz 的返回数据
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedQuiz {
    pub session_id: String,
    pub questions: Vec<QuizQuestion>,
}

/// submit-quiz 的单条答案，`question_id` 从 1 开始
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AnswerSubmission {
    pub question_id: usize,
    pub selected_answer: usize,
}

/// submit-quiz 的返回数据
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizResults {
    pub score: u32,
    pub total_questions: u32,
    pub percentage: f64,
    #[serde(default)]
    pub feedback: String,
    #[serde(default)]
    pub improvement_suggestions: Vec<String>,
}

impl QuizResults {
    pub fn tier(&self) -> ScoreTier {
        ScoreTier::from_percentage(self.percentage)
    }
}

/// 成绩等级
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreTier {
    Excellent,
    Great,
    Good,
    Pass,
    KeepPracticing,
}

impl ScoreTier {
    pub fn from_percentage(percentage: f64) -> Self {
        if percentage >= 90.0 {
            ScoreTier::Excellent
        } else if percentage >= 80.0 {
            ScoreTier::Great
        } else if percentage >= 70.0 {
            ScoreTier::Good
        } else if percentage >= 60.0 {
            ScoreTier::Pass
        } else {
            ScoreTier::KeepPracticing
        }
    }

    pub fn emoji(self) -> &'static str {
        match self {
            ScoreTier::Excellent => "🏆",
            ScoreTier::Great => "🎉",
            ScoreTier::Good => "👍",
            ScoreTier::Pass => "📚",
            ScoreTier::KeepPracticing => "💪",
        }
    }
}

/// 单题回顾
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuestionReview {
    pub question_index: usize,
    pub selected: Option<usize>,
    pub correct: usize,
}

impl QuestionReview {
    pub fn is_correct(&self) -> bool {
        self.selected == Some(self.correct)
    }
}

/// 一次测验会话的完整状态
#[derive(Debug, Clone, PartialEq)]
pub struct QuizState {
    pub session_id: String,
    pub questions: Vec<QuizQuestion>,
    selected_answers: HashMap<usize, usize>,
    results: Option<QuizResults>,
    /// 提交请求在途
    submitting: bool,
}

impl QuizState {
    pub fn from_generated(quiz: GeneratedQuiz) -> Self {
        Self {
            session_id: quiz.session_id,
            questions: quiz.questions,
            selected_answers: HashMap::new(),
            results: None,
            submitting: false,
        }
    }

    /// 选择答案，可以覆盖之前的选择
    ///
    /// # 参数
    /// - `question_index`: 题目索引（从 0 开始）
    /// - `option_index`: 选项索引（从 0 开始）
    pub fn select_answer(
        &mut self,
        question_index: usize,
        option_index: usize,
    ) -> Result<(), ValidationError> {
        self.ensure_open()?;

        let question =
            self.questions
                .get(question_index)
                .ok_or(ValidationError::QuestionOutOfRange {
                    question_index,
                    total: self.questions.len(),
                })?;

        if option_index >= question.options.len() {
            return Err(ValidationError::AnswerOutOfRange {
                question_index,
                option_index,
                option_count: question.options.len(),
            });
        }

        self.selected_answers.insert(question_index, option_index);
        Ok(())
    }

    pub fn selected_answer(&self, question_index: usize) -> Option<usize> {
        self.selected_answers.get(&question_index).copied()
    }

    pub fn answered_count(&self) -> usize {
        self.selected_answers.len()
    }

    pub fn is_complete(&self) -> bool {
        !self.questions.is_empty() && self.selected_answers.len() == self.questions.len()
    }

    pub fn results(&self) -> Option<&QuizResults> {
        self.results.as_ref()
    }

    /// 构建提交数据，按题目顺序排列
    ///
    /// 未全部作答、提交在途或已提交过时返回校验错误。
    /// 没有题目的测验不能提交。
    pub fn build_submission(&self) -> Result<Vec<AnswerSubmission>, ValidationError> {
        self.ensure_open()?;
        if !self.is_complete() {
            return Err(ValidationError::IncompleteQuiz {
                answered: self.selected_answers.len(),
                total: self.questions.len(),
            });
        }

        let mut answers: Vec<AnswerSubmission> = self
            .selected_answers
            .iter()
            .map(|(&question_index, &selected_answer)| AnswerSubmission {
                question_id: question_index + 1,
                selected_answer,
            })
            .collect();
        answers.sort_by_key(|a| a.question_id);

        Ok(answers)
    }

    /// 开始提交：构建提交数据并锁定测验，直到记录结果或取消
    pub fn begin_submission(&mut self) -> Result<Vec<AnswerSubmission>, ValidationError> {
        let answers = self.build_submission()?;
        self.submitting = true;
        Ok(answers)
    }

    /// 提交失败时解除锁定
    pub fn cancel_submission(&mut self) {
        self.submitting = false;
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting
    }

    /// 记录批改结果，每个会话只能记录一次
    pub fn record_results(&mut self, results: QuizResults) -> Result<(), ValidationError> {
        if self.results.is_some() {
            return Err(ValidationError::QuizAlreadySubmitted);
        }
        self.results = Some(results);
        self.submitting = false;
        Ok(())
    }

    fn ensure_open(&self) -> Result<(), ValidationError> {
        if self.results.is_some() {
            return Err(ValidationError::QuizAlreadySubmitted);
        }
        if self.submitting {
            return Err(ValidationError::SubmissionInProgress);
        }
        Ok(())
    }

    /// 逐题回顾
    pub fn review(&self) -> Vec<QuestionReview> {
        self.questions
            .iter()
            .enumerate()
            .map(|(question_index, q)| QuestionReview {
                question_index,
                selected: self.selected_answer(question_index),
                correct: q.correct_answer_index,
            })
            .collect()
    }

    /// 本地计算的成绩 (正确数, 百分比)
    pub fn local_score(&self) -> (usize, f64) {
        let total = self.questions.len();
        if total == 0 {
            return (0, 0.0);
        }
        let correct = self.review().iter().filter(|r| r.is_correct()).count();
        (correct, correct as f64 * 100.0 / total as f64)
    }
}
