use serde::{Deserialize, Serialize};

/// A candidate news article supplied by the caller.
///
/// Only `id` is assumed unique within one ranking request. Optional fields
/// degrade to neutral defaults during scoring; a malformed `published_date`
/// never aborts ranking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub id: String,
    pub title: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub url: String,
    pub byline: String,
    pub published_date: String,
    pub section: String,
    #[serde(default)]
    pub subsection: Option<String>,
    #[serde(default)]
    pub multimedia: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    pub des_facet: Option<Vec<String>>,
    #[serde(default)]
    pub org_facet: Option<Vec<String>>,
    #[serde(default)]
    pub per_facet: Option<Vec<String>>,
    #[serde(default)]
    pub geo_facet: Option<Vec<String>>,
}

/// Per-request blending weights. Values are nominally in [0,1] but are not
/// enforced; out-of-range weights simply scale the blended score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserPreferences {
    #[serde(default = "default_weight")]
    pub diversity: f64,
    #[serde(default = "default_weight")]
    pub novelty: f64,
    #[serde(default = "default_weight")]
    pub freshness: f64,
}

fn default_weight() -> f64 {
    0.5
}

impl Default for UserPreferences {
    fn default() -> Self {
        Self {
            diversity: default_weight(),
            novelty: default_weight(),
            freshness: default_weight(),
        }
    }
}

/// One article with every score that contributed to its final position.
/// The raw feature vector is exposed for transparency and debugging.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredArticle {
    pub article: Article,
    pub original_rank: usize,
    pub diversity_score: f64,
    pub novelty_score: f64,
    pub freshness_score: f64,
    pub bandit_score: f64,
    pub final_score: f64,
    pub features: Vec<f64>,
}

/// The ordered ranking plus aggregate scores over the whole candidate set.
#[derive(Debug, Clone, Serialize)]
pub struct RankingResult {
    pub ranked_articles: Vec<ScoredArticle>,
    pub ranking_explanation: String,
    pub diversity_score: f64,
    pub novelty_score: f64,
    pub freshness_score: f64,
}
