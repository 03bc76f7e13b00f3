//! 关键词高亮 - 业务能力层
//!
//! 纯函数：(文本, 关键词) → 片段序列，所有片段按顺序拼接后与原文完全一致。
//!
//! 匹配规则：
//! - 关键词中的正则元字符全部转义，按字面匹配
//! - 不区分大小写，片段保留原文大小写
//! - 关键词首尾是单词字符时加单词边界（"cat" 不会匹配 "category"，"C++" 仍能匹配）
//! - 重叠时较长的关键词优先，长度相同按调用方给出的顺序

use std::collections::HashMap;

use regex::Regex;
use tracing::warn;

/// 高亮片段
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub text: String,
    pub is_keyword: bool,
}

/// 一组概念关键词（例如摘要中的"核心概念"和"相关术语"）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConceptGroup {
    pub label: String,
    pub keywords: Vec<String>,
}

impl ConceptGroup {
    pub fn new(label: impl Into<String>, keywords: Vec<String>) -> Self {
        Self {
            label: label.into(),
            keywords,
        }
    }
}

/// 带分组信息的片段，`group` 为所属分组的下标
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupSegment {
    pub text: String,
    pub group: Option<usize>,
}

/// 预编译的高亮器，同一组关键词可以反复用于多段文本
#[derive(Debug, Clone)]
pub struct KeywordHighlighter {
    pattern: Option<Regex>,
    /// 小写关键词 → 分组下标
    owners: HashMap<String, usize>,
}

impl KeywordHighlighter {
    /// 单组关键词
    pub fn new<S: AsRef<str>>(keywords: &[S]) -> Self {
        let entries = keywords
            .iter()
            .map(|k| (k.as_ref().to_string(), 0))
            .collect();
        Self::from_entries(entries)
    }

    /// 多组关键词，同一关键词出现在多个分组时归属下标较小的分组
    pub fn with_groups(groups: &[ConceptGroup]) -> Self {
        let entries = groups
            .iter()
            .enumerate()
            .flat_map(|(index, group)| group.keywords.iter().map(move |k| (k.clone(), index)))
            .collect();
        Self::from_entries(entries)
    }

    fn from_entries(entries: Vec<(String, usize)>) -> Self {
        let mut owners = HashMap::new();
        let mut ordered = Vec::new();

        for (keyword, group) in entries {
            let keyword = keyword.trim().to_string();
            if keyword.is_empty() {
                continue;
            }
            let lower = keyword.to_lowercase();
            if owners.contains_key(&lower) {
                continue;
            }
            owners.insert(lower, group);
            ordered.push(keyword);
        }

        // 稳定排序：长的在前，长度相同保持原顺序
        ordered.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()));

        let pattern = if ordered.is_empty() {
            None
        } else {
            build_pattern(&ordered)
        };

        Self { pattern, owners }
    }

    /// 是否有可用的关键词
    pub fn is_empty(&self) -> bool {
        self.pattern.is_none()
    }

    /// 切分文本，只标记是否为关键词
    pub fn segments(&self, text: &str) -> Vec<Segment> {
        self.split(text)
            .into_iter()
            .map(|(text, group)| Segment {
                text,
                is_keyword: group.is_some(),
            })
            .collect()
    }

    /// 切分文本，附带关键词所属的分组
    pub fn group_segments(&self, text: &str) -> Vec<GroupSegment> {
        self.split(text)
            .into_iter()
            .map(|(text, group)| GroupSegment { text, group })
            .collect()
    }

    fn split(&self, text: &str) -> Vec<(String, Option<usize>)> {
        if text.is_empty() {
            return Vec::new();
        }

        let Some(pattern) = &self.pattern else {
            return vec![(text.to_string(), None)];
        };

        let mut pieces = Vec::new();
        let mut last = 0;

        for m in pattern.find_iter(text) {
            if m.start() > last {
                pieces.push((text[last..m.start()].to_string(), None));
            }
            // 正则按 Unicode 折叠匹配，个别字符小写化后可能查不到，仍按第一组处理
            let group = self
                .owners
                .get(&m.as_str().to_lowercase())
                .copied()
                .unwrap_or(0);
            pieces.push((m.as_str().to_string(), Some(group)));
            last = m.end();
        }

        if last < text.len() {
            pieces.push((text[last..].to_string(), None));
        }

        pieces
    }
}

/// 高亮单组关键词
///
/// # 参数
/// - `text`: 原文
/// - `keywords`: 关键词列表，空字符串会被忽略
///
/// # 返回
/// 片段序列；关键词为空时返回整段原文，原文为空时返回空序列
pub fn highlight<S: AsRef<str>>(text: &str, keywords: &[S]) -> Vec<Segment> {
    KeywordHighlighter::new(keywords).segments(text)
}

/// 高亮多组关键词
pub fn highlight_groups(text: &str, groups: &[ConceptGroup]) -> Vec<GroupSegment> {
    KeywordHighlighter::with_groups(groups).group_segments(text)
}

fn build_pattern(keywords: &[String]) -> Option<Regex> {
    let alternation = keywords
        .iter()
        .map(|keyword| {
            let escaped = regex::escape(keyword);
            let prefix = if starts_with_word_char(keyword) { r"\b" } else { "" };
            let suffix = if ends_with_word_char(keyword) { r"\b" } else { "" };
            format!("{prefix}{escaped}{suffix}")
        })
        .collect::<Vec<_>>()
        .join("|");

    match Regex::new(&format!("(?i)(?:{alternation})")) {
        Ok(re) => Some(re),
        Err(e) => {
            // 转义后理论上不会失败，失败时退化为不高亮
            warn!("⚠️ 关键词正则构建失败，跳过高亮: {}", e);
            None
        }
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn starts_with_word_char(keyword: &str) -> bool {
    keyword.chars().next().map(is_word_char).unwrap_or(false)
}

fn ends_with_word_char(keyword: &str) -> bool {
    keyword.chars().last().map(is_word_char).unwrap_or(false)
}
