use chrono::{Duration, Utc};

use super::engine::{FeedbackOutcome, RankingEngine, BANDIT_WEIGHT};
use super::types::{Article, UserPreferences};
use crate::bandit::CapacityPolicy;

/// A minimal well-formed article published one hour ago.
pub(crate) fn test_article(id: &str, section: &str) -> Article {
    Article {
        id: id.to_string(),
        title: "A reasonably sized headline".to_string(),
        abstract_text: "A short abstract describing the story.".to_string(),
        url: format!("https://example.com/{}", id),
        byline: "By A. Reporter".to_string(),
        published_date: (Utc::now() - Duration::hours(1)).to_rfc3339(),
        section: section.to_string(),
        subsection: None,
        multimedia: None,
        des_facet: None,
        org_facet: None,
        per_facet: None,
        geo_facet: None,
    }
}

fn engine() -> RankingEngine {
    RankingEngine::new(1.0, CapacityPolicy::Unbounded)
}

fn preferences(diversity: f64, novelty: f64, freshness: f64) -> UserPreferences {
    UserPreferences {
        diversity,
        novelty,
        freshness,
    }
}

#[test]
fn test_single_article_request() {
    let articles = vec![test_article("a1", "world")];
    let result = engine()
        .rank(&articles, "alice", &UserPreferences::default(), &[])
        .unwrap();

    assert_eq!(result.ranked_articles.len(), 1);
    let scored = &result.ranked_articles[0];

    // A set of one is trivially fully diverse, both per article and overall.
    assert_eq!(scored.diversity_score, 1.0);
    assert_eq!(result.diversity_score, 1.0);

    // A fresh bandit has zero theta, so its score is the pure exploration
    // bonus alpha * |x| and the content scores dominate the blend.
    let magnitude = scored
        .features
        .iter()
        .map(|f| f * f)
        .sum::<f64>()
        .sqrt();
    assert!((scored.bandit_score - magnitude).abs() < 1e-9);

    let expected = 0.5 * scored.diversity_score
        + 0.5 * scored.novelty_score
        + 0.5 * scored.freshness_score
        + BANDIT_WEIGHT * scored.bandit_score;
    assert!((scored.final_score - expected).abs() < 1e-12);
    assert!(scored.novelty_score == 1.0);
    assert!(scored.freshness_score > 0.9);
}

#[test]
fn test_empty_candidate_set() {
    let result = engine()
        .rank(&[], "alice", &UserPreferences::default(), &[])
        .unwrap();
    assert!(result.ranked_articles.is_empty());
    assert_eq!(result.diversity_score, 1.0);
    assert_eq!(result.novelty_score, 0.0);
    assert_eq!(result.freshness_score, 0.0);
}

#[test]
fn test_ranking_is_stable_for_tied_scores() {
    // Identical articles apart from their ids produce identical blended
    // scores; the earlier input must keep the earlier output position.
    let articles = vec![
        test_article("first", "world"),
        test_article("second", "world"),
        test_article("third", "world"),
    ];
    let result = engine()
        .rank(&articles, "alice", &UserPreferences::default(), &[])
        .unwrap();

    let ids: Vec<&str> = result
        .ranked_articles
        .iter()
        .map(|s| s.article.id.as_str())
        .collect();
    assert_eq!(ids, vec!["first", "second", "third"]);
    assert_eq!(result.ranked_articles[0].original_rank, 0);
    assert_eq!(result.ranked_articles[2].original_rank, 2);
}

#[test]
fn test_fresher_article_ranks_higher_on_freshness() {
    let mut fresh = test_article("fresh", "world");
    fresh.published_date = Utc::now().to_rfc3339();
    let mut stale = test_article("stale", "world");
    stale.published_date = (Utc::now() - Duration::hours(40)).to_rfc3339();

    let articles = vec![stale, fresh];
    let result = engine()
        .rank(&articles, "alice", &preferences(0.0, 0.0, 1.0), &[])
        .unwrap();
    assert_eq!(result.ranked_articles[0].article.id, "fresh");
}

#[test]
fn test_aggregate_diversity_separates_shared_and_disjoint_facets() {
    let mut shared_a = test_article("a1", "world");
    shared_a.des_facet = Some(vec!["economy".into(), "inflation".into()]);
    let mut shared_b = test_article("a2", "business");
    shared_b.des_facet = Some(vec!["economy".into(), "inflation".into()]);

    let mut disjoint_a = test_article("b1", "world");
    disjoint_a.des_facet = Some(vec!["economy".into(), "inflation".into()]);
    let mut disjoint_b = test_article("b2", "sports");
    disjoint_b.des_facet = Some(vec!["football".into(), "playoffs".into()]);

    let prefs = UserPreferences::default();
    let eng = engine();
    let shared = eng
        .rank(&[shared_a, shared_b], "alice", &prefs, &[])
        .unwrap();
    let disjoint = eng
        .rank(&[disjoint_a, disjoint_b], "alice", &prefs, &[])
        .unwrap();

    assert!(shared.diversity_score < disjoint.diversity_score);
}

#[test]
fn test_novelty_lowers_score_with_history() {
    let articles = vec![test_article("a1", "world")];
    let history: Vec<String> = (0..4).map(|i| format!("h{}", i)).collect();

    let result = engine()
        .rank(&articles, "alice", &UserPreferences::default(), &history)
        .unwrap();
    assert!((result.ranked_articles[0].novelty_score - 0.2).abs() < 1e-12);
    assert!((result.novelty_score - 0.2).abs() < 1e-12);
}

#[test]
fn test_neutral_explanation() {
    // All preferences at 0.5 and aggregate diversity at or below the
    // threshold: only the fixed neutral sentence is emitted.
    let mut a = test_article("a1", "world");
    a.des_facet = Some(vec!["economy".into()]);
    let mut b = test_article("a2", "world");
    b.des_facet = Some(vec!["economy".into()]);

    let result = engine()
        .rank(&[a, b], "alice", &UserPreferences::default(), &[])
        .unwrap();
    assert_eq!(
        result.ranking_explanation,
        "Balanced news selection based on your preferences."
    );
}

#[test]
fn test_high_diversity_preference_explanation() {
    let articles = vec![test_article("a1", "world")];
    let result = engine()
        .rank(&articles, "alice", &preferences(0.9, 0.5, 0.5), &[])
        .unwrap();
    assert!(result
        .ranking_explanation
        .contains("Prioritizing diverse topics and perspectives"));
}

#[test]
fn test_low_preferences_explanation() {
    let articles = vec![test_article("a1", "world")];
    let result = engine()
        .rank(&articles, "alice", &preferences(0.1, 0.1, 0.1), &[])
        .unwrap();
    assert!(result
        .ranking_explanation
        .contains("Focusing on your preferred topics"));
    assert!(result
        .ranking_explanation
        .contains("Including familiar, trusted sources"));
    assert!(result
        .ranking_explanation
        .contains("Including both recent and background stories"));
    assert!(result.ranking_explanation.ends_with('.'));
}

#[test]
fn test_malformed_date_does_not_abort_the_batch() {
    let mut broken = test_article("broken", "world");
    broken.published_date = "not-a-timestamp".to_string();
    let healthy = test_article("healthy", "world");

    let result = engine()
        .rank(&[broken, healthy], "alice", &UserPreferences::default(), &[])
        .unwrap();
    assert_eq!(result.ranked_articles.len(), 2);

    let broken_scored = result
        .ranked_articles
        .iter()
        .find(|s| s.article.id == "broken")
        .unwrap();
    assert_eq!(broken_scored.freshness_score, 0.5);
    assert_eq!(broken_scored.features[3], 0.5);
}

#[test]
fn test_feedback_round_trip_raises_prediction() {
    let eng = engine();
    let articles = vec![test_article("a1", "world")];
    let prefs = UserPreferences::default();

    let before = eng.rank(&articles, "alice", &prefs, &[]).unwrap();
    let outcome = eng.record_feedback("alice", "a1", 5.0);
    assert_eq!(outcome, FeedbackOutcome::Applied);
    assert!(outcome.applied());

    let after = eng.rank(&articles, "alice", &prefs, &[]).unwrap();
    // A strongly positive reward moves the linear estimate up by more than
    // the shrinking exploration bonus moves it down.
    assert!(after.ranked_articles[0].bandit_score > before.ranked_articles[0].bandit_score);
}

#[test]
fn test_feedback_for_unknown_user_is_acknowledged_noop() {
    let eng = engine();
    let outcome = eng.record_feedback("nobody", "a1", 1.0);
    assert_eq!(outcome, FeedbackOutcome::UnknownUser);
    assert!(!outcome.applied());
    assert_eq!(eng.tracked_users(), 0);
}

#[test]
fn test_feedback_without_cached_context_is_noop() {
    let eng = engine();
    let articles = vec![test_article("a1", "world")];
    eng.rank(&articles, "alice", &UserPreferences::default(), &[])
        .unwrap();

    let outcome = eng.record_feedback("alice", "never-ranked", 1.0);
    assert_eq!(outcome, FeedbackOutcome::NoContext);
}

#[test]
fn test_users_have_independent_bandits() {
    let eng = engine();
    let articles = vec![test_article("a1", "world")];
    let prefs = UserPreferences::default();

    eng.rank(&articles, "alice", &prefs, &[]).unwrap();
    eng.rank(&articles, "bob", &prefs, &[]).unwrap();
    eng.record_feedback("alice", "a1", 5.0);

    let alice = eng.rank(&articles, "alice", &prefs, &[]).unwrap();
    let bob = eng.rank(&articles, "bob", &prefs, &[]).unwrap();
    assert!(alice.ranked_articles[0].bandit_score > bob.ranked_articles[0].bandit_score);
    assert_eq!(eng.tracked_users(), 2);
}

// Ranking and feedback calls for the same user may run concurrently; the
// per-user lock must keep the bandit state consistent so the parameter
// solve keeps producing finite scores throughout.
#[test]
fn test_concurrent_rank_and_feedback_keep_state_solvable() {
    use std::sync::Arc;
    use std::thread;

    let eng = Arc::new(engine());
    let articles = vec![test_article("a1", "world")];
    eng.rank(&articles, "alice", &UserPreferences::default(), &[])
        .unwrap();

    let threads: Vec<_> = (0..4)
        .map(|i| {
            let eng = Arc::clone(&eng);
            let articles = articles.clone();
            thread::spawn(move || {
                for j in 0..50 {
                    eng.rank(&articles, "alice", &UserPreferences::default(), &[])
                        .unwrap();
                    let outcome = eng.record_feedback("alice", "a1", ((i + j) % 3) as f64 / 2.0);
                    assert!(outcome.applied());
                }
            })
        })
        .collect();
    for handle in threads {
        handle.join().unwrap();
    }

    let result = eng
        .rank(&articles, "alice", &UserPreferences::default(), &[])
        .unwrap();
    assert!(result.ranked_articles[0].bandit_score.is_finite());
}

#[test]
fn test_out_of_range_preferences_scale_the_blend() {
    let articles = vec![test_article("a1", "world")];
    let eng = engine();
    let boosted = eng
        .rank(&articles, "alice", &preferences(0.0, 0.0, 3.0), &[])
        .unwrap();
    let plain = eng
        .rank(&articles, "alice", &preferences(0.0, 0.0, 1.0), &[])
        .unwrap();
    assert!(boosted.ranked_articles[0].final_score > plain.ranked_articles[0].final_score);
}
