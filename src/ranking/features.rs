use chrono::{DateTime, Utc};
use ndarray::Array1;
use once_cell::sync::Lazy;
use std::collections::HashMap;

use super::types::Article;

/// Dimensionality of the article context vector fed to the bandit.
pub const FEATURE_DIM: usize = 10;

/// Age assigned to articles whose publish timestamp cannot be parsed,
/// treated as "medium-aged" rather than an error.
pub const DEFAULT_AGE: f64 = 0.5;

/// Fixed codes for the known sections. Unknown sections map to 0.0.
static SECTION_CODES: Lazy<HashMap<&'static str, f64>> = Lazy::new(|| {
    HashMap::from([
        ("world", 0.1),
        ("us", 0.2),
        ("politics", 0.3),
        ("business", 0.4),
        ("technology", 0.5),
        ("science", 0.6),
        ("health", 0.7),
        ("sports", 0.8),
        ("arts", 0.9),
        ("opinion", 1.0),
    ])
});

/// Hours elapsed since the article was published, when the timestamp parses.
/// Timestamps are ISO-8601; a literal `Z` suffix is accepted as UTC.
pub fn hours_since_published(article: &Article) -> Option<f64> {
    let published = DateTime::parse_from_rfc3339(&article.published_date).ok()?;
    let elapsed = Utc::now().signed_duration_since(published.with_timezone(&Utc));
    Some(elapsed.num_seconds() as f64 / 3600.0)
}

/// Maps an article to its fixed-length context vector.
///
/// Dimensions, in order: normalized title length, normalized abstract length,
/// section code, normalized age (capped at 1.0), multimedia flag, four
/// normalized facet counts, byline flag. Total and deterministic: malformed
/// input degrades to defaults, never to an error. The text-length and facet
/// dimensions are deliberately not clamped and can exceed 1.0.
pub fn extract_features(article: &Article) -> Array1<f64> {
    let mut features = Array1::zeros(FEATURE_DIM);

    features[0] = article.title.len() as f64 / 100.0;
    features[1] = article.abstract_text.len() as f64 / 500.0;

    features[2] = SECTION_CODES
        .get(article.section.as_str())
        .copied()
        .unwrap_or(0.0);

    features[3] = match hours_since_published(article) {
        Some(hours) => (hours / 24.0).min(1.0),
        None => DEFAULT_AGE,
    };

    features[4] = match &article.multimedia {
        Some(entries) if !entries.is_empty() => 1.0,
        _ => 0.0,
    };

    features[5] = facet_count(&article.des_facet) / 10.0;
    features[6] = facet_count(&article.org_facet) / 5.0;
    features[7] = facet_count(&article.per_facet) / 5.0;
    features[8] = facet_count(&article.geo_facet) / 5.0;

    features[9] = if article.byline.trim().is_empty() {
        0.0
    } else {
        1.0
    };

    features
}

fn facet_count(facets: &Option<Vec<String>>) -> f64 {
    facets.as_ref().map_or(0, Vec::len) as f64
}
