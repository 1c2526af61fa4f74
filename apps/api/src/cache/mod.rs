// AI response cache: deterministic keys, TTL entries, debounced durable persistence.

pub mod backend;
pub mod clock;
pub mod handlers;
pub mod key;
pub mod store;

pub use backend::JsonFileBackend;
pub use clock::SystemClock;
pub use key::generate_key;
pub use store::{Cached, CacheStats, ResponseCache};

/// Key namespace for cached position analyses.
pub const POSITION_ANALYSIS_PREFIX: &str = "position-analysis";
/// Key namespace for cached CV rewrites.
pub const PERSONALIZE_CV_PREFIX: &str = "personalize-cv";
/// Key namespace for cached story rankings.
pub const STORY_RANKING_PREFIX: &str = "story-ranking";
