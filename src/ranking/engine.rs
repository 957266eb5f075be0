use anyhow::Result;
use tracing::{debug, info};

use super::diversity::diversity;
use super::features::extract_features;
use super::scorers::{freshness, novelty};
use super::types::{Article, RankingResult, ScoredArticle, UserPreferences};
use crate::bandit::store::{BanditStore, CapacityPolicy};
use crate::TARGET_RANKING;

/// Fixed weight of the bandit term in the blended score. The content scores
/// dominate the ordering; the bandit perturbs ties and personalizes slowly
/// over many feedback cycles.
pub const BANDIT_WEIGHT: f64 = 0.1;

/// Preference weight above which a dimension is called out in the
/// explanation, and below which its opposite phrasing is used.
const HIGH_PREFERENCE: f64 = 0.7;
const LOW_PREFERENCE: f64 = 0.3;

/// Outcome of a feedback call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackOutcome {
    /// The reward was folded into the user's bandit.
    Applied,
    /// The user exists but no context is cached for the article, so the
    /// reward cannot honestly be attributed; acknowledged without an update.
    NoContext,
    /// No bandit state exists for the user; acknowledged without an update.
    UnknownUser,
}

impl FeedbackOutcome {
    pub fn applied(&self) -> bool {
        matches!(self, FeedbackOutcome::Applied)
    }
}

/// Orchestrates feature extraction, content scoring and the per-user bandit
/// into a single ordering over a candidate set.
pub struct RankingEngine {
    bandits: BanditStore,
}

impl RankingEngine {
    pub fn new(alpha: f64, policy: CapacityPolicy) -> Self {
        Self {
            bandits: BanditStore::new(alpha, policy),
        }
    }

    /// Ranks a candidate set for one user.
    ///
    /// Each article is scored independently (features, novelty, freshness,
    /// bandit prediction), blended under the caller's preference weights and
    /// stable-sorted descending, so equal scores keep their input order. The
    /// result carries aggregate diversity over the whole set, mean novelty
    /// and freshness, and a short explanation of the ordering.
    pub fn rank(
        &self,
        articles: &[Article],
        user_id: &str,
        preferences: &UserPreferences,
        reading_history: &[String],
    ) -> Result<RankingResult> {
        let handle = self.bandits.get_or_create(user_id);
        let mut user = handle.lock();

        let mut scored: Vec<ScoredArticle> = Vec::with_capacity(articles.len());
        for (original_rank, article) in articles.iter().enumerate() {
            let features = extract_features(article);

            let diversity_score = diversity(std::slice::from_ref(article));
            let novelty_score = novelty(article, reading_history);
            let freshness_score = freshness(article);
            let bandit_score = user.bandit.predict(&features);

            let final_score = preferences.diversity * diversity_score
                + preferences.novelty * novelty_score
                + preferences.freshness * freshness_score
                + BANDIT_WEIGHT * bandit_score;

            debug!(
                target: TARGET_RANKING,
                "Scored article {}: novelty {:.3}, freshness {:.3}, bandit {:.3}, final {:.3}",
                article.id, novelty_score, freshness_score, bandit_score, final_score
            );

            user.remember_context(&article.id, features.clone());

            scored.push(ScoredArticle {
                article: article.clone(),
                original_rank,
                diversity_score,
                novelty_score,
                freshness_score,
                bandit_score,
                final_score,
                features: features.to_vec(),
            });
        }
        drop(user);

        // Stable sort keeps input order between equal scores.
        scored.sort_by(|a, b| b.final_score.total_cmp(&a.final_score));

        let overall_diversity = diversity(articles);
        let mean_novelty = mean(scored.iter().map(|s| s.novelty_score));
        let mean_freshness = mean(scored.iter().map(|s| s.freshness_score));
        let explanation = build_explanation(preferences, overall_diversity);

        info!(
            target: TARGET_RANKING,
            "Ranked {} articles for user {} (diversity {:.3})",
            scored.len(),
            user_id,
            overall_diversity
        );

        Ok(RankingResult {
            ranked_articles: scored,
            ranking_explanation: explanation,
            diversity_score: overall_diversity,
            novelty_score: mean_novelty,
            freshness_score: mean_freshness,
        })
    }

    /// Records an observed reward for an article previously shown to a user.
    ///
    /// A bandit update needs the exact context vector used at prediction
    /// time, which the store caches per user at ranking time. When the user
    /// or the cached context is missing the call is a logged no-op: rewards
    /// are never reconstructed from the article's current state, since its
    /// features (age in particular) may have changed since ranking.
    pub fn record_feedback(&self, user_id: &str, article_id: &str, reward: f64) -> FeedbackOutcome {
        let Some(handle) = self.bandits.get(user_id) else {
            info!(
                target: TARGET_RANKING,
                "Feedback for unknown user {} ignored (article {}, reward {})",
                user_id, article_id, reward
            );
            return FeedbackOutcome::UnknownUser;
        };

        let mut user = handle.lock();
        match user.context_for(article_id) {
            Some(context) => {
                user.bandit.update(&context, reward);
                info!(
                    target: TARGET_RANKING,
                    "Applied reward {} for user {} on article {}", reward, user_id, article_id
                );
                FeedbackOutcome::Applied
            }
            None => {
                info!(
                    target: TARGET_RANKING,
                    "No cached context for user {} article {}; feedback not applied",
                    user_id, article_id
                );
                FeedbackOutcome::NoContext
            }
        }
    }

    /// Number of users with live bandit state.
    pub fn tracked_users(&self) -> usize {
        self.bandits.len()
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

/// Renders the fixed threshold rules over the preference weights and the
/// aggregate diversity into a short human-readable explanation.
fn build_explanation(preferences: &UserPreferences, diversity: f64) -> String {
    let mut explanations: Vec<&str> = Vec::new();

    if preferences.diversity > HIGH_PREFERENCE {
        explanations.push("Prioritizing diverse topics and perspectives");
    } else if preferences.diversity < LOW_PREFERENCE {
        explanations.push("Focusing on your preferred topics");
    }

    if preferences.novelty > HIGH_PREFERENCE {
        explanations.push("Emphasizing fresh, new content");
    } else if preferences.novelty < LOW_PREFERENCE {
        explanations.push("Including familiar, trusted sources");
    }

    if preferences.freshness > HIGH_PREFERENCE {
        explanations.push("Highlighting the latest breaking news");
    } else if preferences.freshness < LOW_PREFERENCE {
        explanations.push("Including both recent and background stories");
    }

    if diversity > HIGH_PREFERENCE {
        explanations.push("Ensuring balanced topic coverage");
    }

    if explanations.is_empty() {
        "Balanced news selection based on your preferences.".to_string()
    } else {
        format!("{}.", explanations.join(". "))
    }
}
