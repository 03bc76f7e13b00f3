pub mod options;
pub mod quiz;
pub mod session;
pub mod upload;

pub use options::{Difficulty, SummaryLength};
pub use quiz::{
    AnswerSubmission, GeneratedQuiz, QuestionReview, QuizQuestion, QuizResults, QuizState,
    ScoreTier,
};
pub use session::{
    DataPoint, KeyConcept, SessionRecord, SessionUpdate, SummaryConcept, SummaryData,
    TextAnalysis, UploadedDocument, VisualizationData,
};
pub use upload::FileUpload;
