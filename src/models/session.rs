//! 会话记录
//!
//! 上传成功后创建，摘要 / 可视化 / 测验阶段逐步补充，重置时整体丢弃

use serde::{Deserialize, Serialize};

use crate::models::quiz::QuizState;

/// 原文统计信息
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TextAnalysis {
    pub word_count: u64,
    pub sentence_count: u64,
    pub avg_words_per_sentence: f64,
    pub complexity_level: String,
    /// 阅读时间（分钟）
    pub reading_time: f64,
}

/// 后端提取的关键概念
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyConcept {
    pub concept: String,
    #[serde(default)]
    pub frequency: u64,
    /// 相关度，取值 [0, 1]
    #[serde(default)]
    pub relevance: f64,
}

impl KeyConcept {
    /// 相关度百分比，限制在 0–100
    pub fn relevance_percent(&self) -> u32 {
        (self.relevance * 100.0).clamp(0.0, 100.0).round() as u32
    }
}

/// 摘要中的关键概念，后端可能只返回词条，也可能返回完整概念
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SummaryConcept {
    Term(String),
    Detailed(KeyConcept),
}

impl SummaryConcept {
    pub fn term(&self) -> &str {
        match self {
            SummaryConcept::Term(term) => term,
            SummaryConcept::Detailed(concept) => &concept.concept,
        }
    }
}

/// generate-summary 的返回数据
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryData {
    #[serde(rename = "summary")]
    pub text: String,
    #[serde(default)]
    pub word_count: u64,
    #[serde(default)]
    pub reading_time: f64,
    #[serde(default)]
    pub key_concepts: Vec<SummaryConcept>,
}

impl SummaryData {
    /// 按换行拆分段落，跳过空行
    pub fn paragraphs(&self) -> Vec<&str> {
        self.text
            .split('\n')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect()
    }
}

/// 图表中的单个数据点
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    pub name: String,
    pub value: f64,
}

/// generate-visualization 的返回数据
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualizationData {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub data: Vec<DataPoint>,
}

/// upload-file / upload-text 的返回数据，即会话记录的种子
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadedDocument {
    pub title: String,
    pub text: String,
    #[serde(default)]
    pub analysis: TextAnalysis,
    #[serde(default)]
    pub key_concepts: Vec<KeyConcept>,
}

/// 摘要阶段产生的增量更新，`None` 的字段不会覆盖已有数据
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionUpdate {
    pub summary: Option<SummaryData>,
    pub visualization: Option<VisualizationData>,
}

/// 在各阶段之间传递的会话记录
#[derive(Debug, Clone, PartialEq)]
pub struct SessionRecord {
    pub title: String,
    pub raw_text: String,
    pub analysis: TextAnalysis,
    pub key_concepts: Vec<KeyConcept>,
    pub summary: Option<SummaryData>,
    pub visualization: Option<VisualizationData>,
    pub quiz: Option<QuizState>,
}

impl SessionRecord {
    /// 由上传结果创建全新的记录，不继承任何旧数据
    pub fn from_upload(doc: UploadedDocument) -> Self {
        Self {
            title: doc.title,
            raw_text: doc.text,
            analysis: doc.analysis,
            key_concepts: doc.key_concepts,
            summary: None,
            visualization: None,
            quiz: None,
        }
    }

    /// 非破坏性合并
    pub fn merge(&mut self, update: SessionUpdate) {
        if let Some(summary) = update.summary {
            self.summary = Some(summary);
        }
        if let Some(visualization) = update.visualization {
            self.visualization = Some(visualization);
        }
    }

    /// 前 `n` 个关键概念（用于展示）
    pub fn top_concepts(&self, n: usize) -> &[KeyConcept] {
        &self.key_concepts[..self.key_concepts.len().min(n)]
    }

    /// 用于高亮的关键词：上传阶段的概念加上摘要里的概念
    pub fn highlight_keywords(&self) -> Vec<String> {
        let mut keywords: Vec<String> = self
            .key_concepts
            .iter()
            .map(|c| c.concept.clone())
            .collect();

        if let Some(summary) = &self.summary {
            keywords.extend(summary.key_concepts.iter().map(|c| c.term().to_string()));
        }

        keywords
    }
}
