use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use tokio::io::{self, AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::{info, warn};

use crate::clients::BackendClient;
use crate::config::Config;
use crate::models::{FileUpload, QuizQuestion, QuizResults, SessionRecord};
use crate::services::{highlight, Segment};
use crate::utils::logging;
use crate::workflow::{PipelineFlow, Stage, StepOutcome};

/// 展示的关键概念数量
const TOP_CONCEPTS: usize = 8;

/// 上传内容的来源
#[derive(Debug, Clone)]
pub enum InputSource {
    /// 读取文本文件，走 upload-text
    Text { path: PathBuf, title: Option<String> },
    /// 直接上传文件，走 upload-file
    File { path: PathBuf, title: Option<String> },
}

/// 应用主结构
pub struct App {
    config: Config,
    flow: PipelineFlow,
}

impl App {
    /// 初始化应用
    pub async fn initialize(config: Config) -> Result<Self> {
        logging::init_log_file(&config.output_log_file)?;
        logging::log_startup(&config);

        let client = BackendClient::new(&config)?;

        // 健康检查失败只提示，不阻止后续流程
        match client.health_check().await {
            Ok(body) => info!("✓ 后端健康检查通过: {}", body),
            Err(e) => warn!("⚠️ 后端健康检查失败: {}", e),
        }

        let flow = PipelineFlow::new(client, &config);
        Ok(Self { config, flow })
    }

    /// 运行三个阶段
    pub async fn run(&self, input: InputSource) -> Result<()> {
        let mut answers = BufReader::new(io::stdin()).lines();

        // ========== 阶段 1: 上传 ==========
        logging::log_stage(Stage::Upload.index(), Stage::COUNT, Stage::Upload.label());
        let outcome = match input {
            InputSource::Text { path, title } => {
                let content = tokio::fs::read_to_string(&path)
                    .await
                    .with_context(|| format!("读取文本失败: {}", path.display()))?;
                self.flow.upload_text(&content, title.as_deref()).await?
            }
            InputSource::File { path, title } => {
                let mut upload = FileUpload::from_path(&path).await?;
                if let Some(title) = title {
                    upload = upload.with_title(title);
                }
                self.flow.upload_file(upload).await?
            }
        };
        ensure_applied(outcome, "上传")?;

        let record = self.current_record()?;
        info!("✓ 上传完成: {}", record.title);
        self.log_line(&format!(
            "上传: {} ({} 词)",
            record.title, record.analysis.word_count
        ));
        print_analysis(&record);

        // ========== 阶段 2: 摘要与可视化 ==========
        logging::log_stage(Stage::Summary.index(), Stage::COUNT, Stage::Summary.label());
        ensure_applied(self.flow.load_summary().await?, "摘要")?;

        let record = self.current_record()?;
        print_summary(&record);
        self.log_line("摘要与可视化已生成");

        self.flow.proceed_to_quiz()?;

        // ========== 阶段 3: 测验 ==========
        logging::log_stage(Stage::Quiz.index(), Stage::COUNT, Stage::Quiz.label());
        ensure_applied(self.flow.start_quiz().await?, "生成测验")?;

        let quiz = self
            .flow
            .quiz()
            .context("测验生成后未找到测验数据")?;

        for (index, question) in quiz.questions.iter().enumerate() {
            let option = ask_question(&mut answers, index, quiz.questions.len(), question).await?;
            self.flow.select_answer(index, option)?;
        }

        ensure_applied(self.flow.submit_quiz().await?, "提交测验")?;

        let results = self.flow.quiz_results().context("提交后未找到批改结果")?;
        if let Some(quiz) = self.flow.quiz() {
            for review in quiz.review() {
                let mark = if review.is_correct() { "✅" } else { "❌" };
                println!(
                    "{} 第 {} 题: 你的答案 {}，正确答案 {}",
                    mark,
                    review.question_index + 1,
                    review.selected.map(option_letter).unwrap_or('-'),
                    option_letter(review.correct)
                );
            }
        }
        print_results(&results);
        self.log_line(&format!(
            "测验: {}/{} ({}%)",
            results.score, results.total_questions, results.percentage
        ));

        logging::print_final_stats(
            results.score,
            results.total_questions,
            results.percentage,
            &self.config.output_log_file,
        );

        Ok(())
    }

    fn current_record(&self) -> Result<SessionRecord> {
        self.flow.record().context("当前没有会话记录")
    }

    fn log_line(&self, line: &str) {
        if let Err(e) = logging::append_log_line(&self.config.output_log_file, line) {
            warn!("⚠️ 写入会话日志失败: {}", e);
        }
    }
}

fn ensure_applied(outcome: StepOutcome, step: &str) -> Result<()> {
    match outcome {
        StepOutcome::Applied => Ok(()),
        StepOutcome::Suppressed => bail!("{}: 相同请求仍在处理中", step),
        StepOutcome::Stale => bail!("{}: 流程已重置，结果被丢弃", step),
    }
}

// ========== 终端输出 ==========

fn print_analysis(record: &SessionRecord) {
    let analysis = &record.analysis;
    println!("\n📄 {}", record.title);
    println!(
        "   {} 词 / {} 句 / 平均每句 {:.1} 词 / 复杂度 {} / 约 {:.0} 分钟",
        analysis.word_count,
        analysis.sentence_count,
        analysis.avg_words_per_sentence,
        analysis.complexity_level,
        analysis.reading_time
    );

    let concepts = record.top_concepts(TOP_CONCEPTS);
    if !concepts.is_empty() {
        println!("   关键概念:");
        for concept in concepts {
            println!(
                "   - {} (出现 {} 次, 相关度 {}%)",
                concept.concept,
                concept.frequency,
                concept.relevance_percent()
            );
        }
    }
}

fn print_summary(record: &SessionRecord) {
    let keywords = record.highlight_keywords();

    if let Some(summary) = &record.summary {
        println!(
            "\n📝 摘要 ({} 词, 约 {:.0} 分钟)",
            summary.word_count, summary.reading_time
        );
        for paragraph in summary.paragraphs() {
            println!("   {}", render_segments(&highlight(paragraph, &keywords)));
        }
    }

    if let Some(visualization) = &record.visualization {
        println!("\n📊 {}", visualization.title);
        if !visualization.description.is_empty() {
            println!("   {}", visualization.description);
        }
        for point in &visualization.data {
            println!("   {:<24} {}", point.name, point.value);
        }
    }
}

fn print_results(results: &QuizResults) {
    let tier = results.tier();
    println!(
        "\n{} 得分 {}/{} ({}%)",
        tier.emoji(),
        results.score,
        results.total_questions,
        results.percentage
    );
    if !results.feedback.is_empty() {
        println!("   {}", results.feedback);
    }
    for suggestion in &results.improvement_suggestions {
        println!("   💡 {}", suggestion);
    }
}

/// 关键词加粗显示
fn render_segments(segments: &[Segment]) -> String {
    segments
        .iter()
        .map(|s| {
            if s.is_keyword {
                format!("\x1b[1;33m{}\x1b[0m", s.text)
            } else {
                s.text.clone()
            }
        })
        .collect()
}

fn option_letter(index: usize) -> char {
    (b'A' + (index % 26) as u8) as char
}

/// 解析用户输入的选项：字母 (A/b) 或序号 (1 开始)
fn parse_option(input: &str, option_count: usize) -> Option<usize> {
    let input = input.trim();
    let index = match input.chars().next()? {
        c if c.is_ascii_alphabetic() && input.len() == 1 => {
            (c.to_ascii_uppercase() as u8 - b'A') as usize
        }
        _ => input.parse::<usize>().ok()?.checked_sub(1)?,
    };
    (index < option_count).then_some(index)
}

async fn ask_question(
    lines: &mut Lines<BufReader<Stdin>>,
    index: usize,
    total: usize,
    question: &QuizQuestion,
) -> Result<usize> {
    println!("\n❓ [{}/{}] {}", index + 1, total, question.question);
    for (i, option) in question.options.iter().enumerate() {
        println!("   {}. {}", option_letter(i), option);
    }

    loop {
        println!("请输入答案:");
        let Some(line) = lines.next_line().await? else {
            bail!("输入已结束，第 {} 题未作答", index + 1);
        };
        match parse_option(&line, question.options.len()) {
            Some(option) => return Ok(option),
            None => warn!("⚠️ 无效的选项: {}", line.trim()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_option() {
        assert_eq!(parse_option("a", 4), Some(0));
        assert_eq!(parse_option(" D ", 4), Some(3));
        assert_eq!(parse_option("2", 4), Some(1));
        assert_eq!(parse_option("E", 4), None);
        assert_eq!(parse_option("0", 4), None);
        assert_eq!(parse_option("", 4), None);
    }

    #[test]
    fn test_render_segments_marks_keywords() {
        let rendered = render_segments(&highlight("la IA ayuda", &["IA"]));
        assert_eq!(rendered, "la \x1b[1;33mIA\x1b[0m ayuda");
    }
}
