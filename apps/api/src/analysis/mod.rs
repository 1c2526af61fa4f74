// Position analysis: job summary and CV/job intersection, run as independent model calls.

pub mod handlers;
pub mod models;
pub mod orchestrator;
pub mod prompts;
pub mod validation;

pub use models::{AnalysisOptions, JobIntersection, PositionAnalysis};
pub use orchestrator::analyze_position;
