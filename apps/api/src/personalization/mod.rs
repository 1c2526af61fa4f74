// Personalization pipeline: cached analysis, cached CV rewrite, story ranking,
// cover letter, with per-stage progress.

pub mod handlers;
pub mod models;
pub mod pipeline;
pub mod progress;
pub mod prompts;

pub use pipeline::{CacheTtls, PersonalizationPipeline};
