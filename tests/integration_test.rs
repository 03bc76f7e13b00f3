use mockito::{Matcher, Server, ServerGuard};
use quiz_pipeline::clients::BackendClient;
use quiz_pipeline::config::Config;
use quiz_pipeline::error::{AppError, ValidationError};
use quiz_pipeline::models::ScoreTier;
use quiz_pipeline::utils::logging;
use quiz_pipeline::workflow::{PipelineFlow, Stage, StepOutcome};
use serde_json::{json, Value};

const TEXT: &str = "Artificial intelligence improves efficiency.";

fn envelope(data: Value) -> String {
    json!({"success": true, "data": data}).to_string()
}

fn questions(n: usize) -> Value {
    let questions: Vec<Value> = (0..n)
        .map(|i| {
            json!({
                "question": format!("Pregunta {}", i + 1),
                "options": ["A", "B", "C", "D"],
                "correct_answer": i % 4,
                "explanation": "",
                "difficulty": "medium"
            })
        })
        .collect();
    Value::Array(questions)
}

async fn mock_backend(server: &mut ServerGuard) -> Vec<mockito::Mock> {
    let upload = server
        .mock("POST", "/upload/upload-text")
        .match_body(Matcher::Json(json!({"content": TEXT, "title": "AI Intro"})))
        .with_status(200)
        .with_body(envelope(json!({
            "title": "AI Intro",
            "text": TEXT,
            "analysis": {
                "word_count": 5,
                "sentence_count": 1,
                "avg_words_per_sentence": 5.0,
                "complexity_level": "Básico",
                "reading_time": 1
            },
            "key_concepts": [
                {"concept": "intelligence", "frequency": 1, "relevance": 0.9},
                {"concept": "efficiency", "frequency": 1, "relevance": 0.7}
            ]
        })))
        .expect(1)
        .create_async()
        .await;

    let summary = server
        .mock("POST", "/summary/generate-summary")
        .match_body(Matcher::Json(json!({"text": TEXT, "length": "medium"})))
        .with_status(200)
        .with_body(envelope(json!({
            "summary": "AI improves efficiency.\nIntelligence matters.",
            "word_count": 5,
            "reading_time": 1,
            "key_concepts": ["AI", {"concept": "efficiency", "frequency": 1, "relevance": 0.7}]
        })))
        .expect(1)
        .create_async()
        .await;

    let visualization = server
        .mock("POST", "/summary/generate-visualization")
        .match_body(Matcher::Json(json!({"text": TEXT})))
        .with_status(200)
        .with_body(envelope(json!({
            "title": "Conceptos principales",
            "description": "Frecuencia de conceptos",
            "data": [{"name": "intelligence", "value": 1}, {"name": "efficiency", "value": 1}]
        })))
        .expect(1)
        .create_async()
        .await;

    let quiz = server
        .mock("POST", "/quiz/generate-quiz")
        .match_body(Matcher::Json(json!({
            "text": TEXT,
            "num_questions": 5,
            "difficulty": "medium"
        })))
        .with_status(200)
        .with_body(envelope(json!({"session_id": "abc123", "questions": questions(5)})))
        .expect(1)
        .create_async()
        .await;

    vec![upload, summary, visualization, quiz]
}

async fn flow_at_quiz(server: &mut ServerGuard) -> (PipelineFlow, Vec<mockito::Mock>) {
    let mocks = mock_backend(server).await;
    let flow = PipelineFlow::new(BackendClient::with_base_url(server.url()), &Config::default());

    assert_eq!(flow.upload_text(TEXT, Some("AI Intro")).await.unwrap(), StepOutcome::Applied);
    assert_eq!(flow.load_summary().await.unwrap(), StepOutcome::Applied);
    flow.proceed_to_quiz().unwrap();
    assert_eq!(flow.start_quiz().await.unwrap(), StepOutcome::Applied);

    (flow, mocks)
}

#[tokio::test]
async fn test_upload_then_summary_merges_without_touching_title() {
    logging::init(false);
    let mut server = Server::new_async().await;
    let _mocks = mock_backend(&mut server).await;
    let flow = PipelineFlow::new(BackendClient::with_base_url(server.url()), &Config::default());

    flow.upload_text(TEXT, Some("AI Intro")).await.unwrap();
    let record = flow.record().unwrap();
    assert_eq!(record.title, "AI Intro");
    assert_eq!(record.raw_text, TEXT);
    assert_eq!(flow.stage(), Stage::Summary);

    flow.load_summary().await.unwrap();
    let record = flow.record().unwrap();
    assert_eq!(record.title, "AI Intro");
    assert_eq!(record.raw_text, TEXT);
    assert_eq!(record.key_concepts.len(), 2);
    assert_eq!(record.summary.as_ref().unwrap().paragraphs().len(), 2);
    assert_eq!(
        record.highlight_keywords(),
        vec!["intelligence", "efficiency", "AI", "efficiency"]
    );
    assert!(flow.summary_ready());
}

#[tokio::test]
async fn test_quiz_submission_scores_sixty_percent() {
    let mut server = Server::new_async().await;
    let (flow, mocks) = flow_at_quiz(&mut server).await;

    // 正确答案为 i % 4，前三题答对，后两题答错
    let selections = [0, 1, 2, 0, 1];
    for (index, option) in selections.iter().enumerate() {
        flow.select_answer(index, *option).unwrap();
    }

    let submit = server
        .mock("POST", "/quiz/submit-quiz")
        .match_body(Matcher::Json(json!({
            "session_id": "abc123",
            "answers": [
                {"question_id": 1, "selected_answer": 0},
                {"question_id": 2, "selected_answer": 1},
                {"question_id": 3, "selected_answer": 2},
                {"question_id": 4, "selected_answer": 0},
                {"question_id": 5, "selected_answer": 1}
            ]
        })))
        .with_status(200)
        .with_body(envelope(json!({
            "score": 3,
            "total_questions": 5,
            "percentage": 60,
            "feedback": "Buen trabajo",
            "improvement_suggestions": ["Repasa los conceptos clave"]
        })))
        .expect(1)
        .create_async()
        .await;

    assert_eq!(flow.submit_quiz().await.unwrap(), StepOutcome::Applied);

    let results = flow.quiz_results().unwrap();
    assert_eq!(results.score, 3);
    assert_eq!(results.percentage, 60.0);
    assert_eq!(results.tier(), ScoreTier::Pass);

    let quiz = flow.quiz().unwrap();
    assert_eq!(quiz.local_score(), (3, 60.0));

    // 同一测验会话不能再次提交
    let err = flow.submit_quiz().await.unwrap_err();
    assert!(matches!(
        err,
        AppError::Validation(ValidationError::QuizAlreadySubmitted)
    ));

    submit.assert_async().await;
    for mock in mocks {
        mock.assert_async().await;
    }
}

#[tokio::test]
async fn test_incomplete_submission_rejected_before_network() {
    let mut server = Server::new_async().await;
    let (flow, _mocks) = flow_at_quiz(&mut server).await;

    let submit = server
        .mock("POST", "/quiz/submit-quiz")
        .expect(0)
        .create_async()
        .await;

    for index in 0..4 {
        flow.select_answer(index, 0).unwrap();
    }

    let err = flow.submit_quiz().await.unwrap_err();
    assert!(matches!(
        err,
        AppError::Validation(ValidationError::IncompleteQuiz { answered: 4, total: 5 })
    ));
    assert_eq!(flow.error(), None);
    assert!(flow.quiz_results().is_none());

    submit.assert_async().await;
}

#[tokio::test]
async fn test_answers_locked_while_submission_in_flight() {
    let mut server = Server::new_async().await;
    let (flow, _mocks) = flow_at_quiz(&mut server).await;

    for index in 0..5 {
        flow.select_answer(index, 0).unwrap();
    }

    let submit = server
        .mock("POST", "/quiz/submit-quiz")
        .with_status(200)
        .with_body(envelope(json!({
            "score": 2,
            "total_questions": 5,
            "percentage": 40,
            "feedback": "Sigue practicando"
        })))
        .expect(1)
        .create_async()
        .await;

    let (first, (changed, resubmitted)) = tokio::join!(flow.submit_quiz(), async {
        (flow.select_answer(0, 1), flow.submit_quiz().await)
    });

    assert_eq!(first.unwrap(), StepOutcome::Applied);
    assert!(matches!(
        changed,
        Err(AppError::Validation(ValidationError::SubmissionInProgress))
    ));
    assert!(matches!(
        resubmitted,
        Err(AppError::Validation(ValidationError::SubmissionInProgress))
    ));

    // 批改结果对应的仍是提交时的答案
    let quiz = flow.quiz().unwrap();
    assert_eq!(quiz.selected_answer(0), Some(0));
    assert!(!quiz.is_submitting());
    assert_eq!(flow.quiz_results().unwrap().score, 2);

    submit.assert_async().await;
}

#[tokio::test]
async fn test_failed_submission_unlocks_answers() {
    let mut server = Server::new_async().await;
    let (flow, _mocks) = flow_at_quiz(&mut server).await;

    for index in 0..5 {
        flow.select_answer(index, 0).unwrap();
    }

    let _submit = server
        .mock("POST", "/quiz/submit-quiz")
        .with_status(500)
        .with_body(r#"{"message": "Error al evaluar"}"#)
        .create_async()
        .await;

    let err = flow.submit_quiz().await.unwrap_err();
    assert_eq!(err.to_string(), "Error al evaluar");
    assert!(!flow.quiz().unwrap().is_submitting());
    assert!(flow.quiz_results().is_none());

    flow.select_answer(0, 1).unwrap();
    assert_eq!(flow.quiz().unwrap().selected_answer(0), Some(1));
}

#[tokio::test]
async fn test_reset_then_new_upload_inherits_nothing() {
    let mut server = Server::new_async().await;
    let (flow, _mocks) = flow_at_quiz(&mut server).await;

    flow.restart();
    assert_eq!(flow.stage(), Stage::Upload);
    assert!(flow.record().is_none());

    let other = "Los volcanes expulsan lava.";
    let _upload = server
        .mock("POST", "/upload/upload-text")
        .match_body(Matcher::PartialJson(json!({"content": other})))
        .with_status(200)
        .with_body(envelope(json!({"title": "Volcanes", "text": other})))
        .create_async()
        .await;

    assert_eq!(flow.upload_text(other, Some("Volcanes")).await.unwrap(), StepOutcome::Applied);

    let record = flow.record().unwrap();
    assert_eq!(record.title, "Volcanes");
    assert_eq!(record.raw_text, other);
    assert!(record.key_concepts.is_empty());
    assert!(record.summary.is_none());
    assert!(record.visualization.is_none());
    assert!(record.quiz.is_none());
    assert!(!flow.summary_ready());
}
