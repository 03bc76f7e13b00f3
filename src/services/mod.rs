pub mod highlighter;
pub mod single_flight;
pub mod upload_validator;

pub use highlighter::{
    highlight, highlight_groups, ConceptGroup, GroupSegment, KeywordHighlighter, Segment,
};
pub use single_flight::{Flight, RequestKey, SingleFlight};
