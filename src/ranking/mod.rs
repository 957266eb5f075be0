pub mod diversity;
pub mod engine;
pub mod features;
pub mod scorers;
#[cfg(test)]
pub(crate) mod tests;
pub mod types;

pub use engine::{FeedbackOutcome, RankingEngine, BANDIT_WEIGHT};
pub use types::{Article, RankingResult, ScoredArticle, UserPreferences};
