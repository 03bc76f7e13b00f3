pub mod backend_client;

pub use backend_client::{
    ApiEnvelope, BackendClient, Operation, QuizRequest, SubmitQuizRequest, SummaryRequest,
    UploadTextRequest, VisualizationRequest,
};
