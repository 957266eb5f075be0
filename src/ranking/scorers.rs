use super::features::hours_since_published;
use super::types::Article;

/// Neutral constant used when a signal cannot be computed from the input.
pub const NEUTRAL_SCORE: f64 = 0.5;

/// Number of reading-history entries considered when scoring novelty.
pub const NOVELTY_HISTORY_WINDOW: usize = 10;

/// Decay constant for the exponential freshness score, in hours.
const FRESHNESS_DECAY_HOURS: f64 = 24.0;

/// Novelty of an article relative to the user's reading history: `1/(1+n)`
/// where `n` counts recent history entries in the candidate's section.
///
/// The request surface carries only history article ids, so each entry is
/// attributed the candidate's own section rather than the historical
/// article's true section. That collapses the count to the window size and
/// is preserved as-is; see the novelty tests pinning this behavior.
pub fn novelty(article: &Article, reading_history: &[String]) -> f64 {
    if reading_history.is_empty() {
        return 1.0;
    }

    let recent_sections: Vec<&str> = reading_history
        .iter()
        .take(NOVELTY_HISTORY_WINDOW)
        .map(|_| article.section.as_str())
        .collect();

    let same_section = recent_sections
        .iter()
        .filter(|section| **section == article.section)
        .count();

    1.0 / (1.0 + same_section as f64)
}

/// Freshness of an article as exponential decay over its age, with a
/// 24-hour decay constant. An unparseable publish timestamp scores neutral.
pub fn freshness(article: &Article) -> f64 {
    match hours_since_published(article) {
        Some(hours) => (-hours / FRESHNESS_DECAY_HOURS).exp(),
        None => NEUTRAL_SCORE,
    }
}
