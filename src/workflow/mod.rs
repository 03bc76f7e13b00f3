pub mod pipeline_flow;
pub mod pipeline_state;

pub use pipeline_flow::{FlowOptions, PipelineFlow, StepOutcome, DEFAULT_TEXT_TITLE};
pub use pipeline_state::{PipelineState, Stage, Ticket};
