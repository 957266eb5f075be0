use ndarray::{Array1, Array2};
use std::collections::HashMap;

use super::scorers::NEUTRAL_SCORE;
use super::types::Article;

/// Topic diversity of a candidate set, in [0,1].
///
/// Fewer than two articles are trivially fully diverse. Otherwise each
/// article's descriptor, organization and person facet terms are joined into
/// one topic string, the strings are embedded with TF-IDF, and diversity is
/// one minus the mean pairwise cosine similarity. A candidate set with no
/// topic signal at all, or a degenerate vocabulary, scores neutral.
///
/// The term model is fit per call on the current candidate set only; no
/// vocabulary is shared across users or requests.
pub fn diversity(articles: &[Article]) -> f64 {
    if articles.len() < 2 {
        return 1.0;
    }

    let topics: Vec<String> = articles.iter().map(topic_string).collect();
    if topics.iter().all(|topic| topic.is_empty()) {
        return NEUTRAL_SCORE;
    }

    match mean_pairwise_similarity(&topics) {
        Some(similarity) => 1.0 - similarity,
        None => NEUTRAL_SCORE,
    }
}

/// Joins an article's topical facets into a single whitespace-separated
/// topic string. Geographic facets are not part of the topic signal.
fn topic_string(article: &Article) -> String {
    let mut terms: Vec<&str> = Vec::new();
    for facets in [&article.des_facet, &article.org_facet, &article.per_facet] {
        if let Some(facets) = facets {
            terms.extend(facets.iter().map(String::as_str));
        }
    }
    terms.join(" ")
}

/// Mean cosine similarity over all unordered document pairs in a TF-IDF
/// embedding of `documents`, or `None` when the vocabulary is degenerate.
fn mean_pairwise_similarity(documents: &[String]) -> Option<f64> {
    let tokenized: Vec<Vec<String>> = documents
        .iter()
        .map(|doc| {
            doc.split_whitespace()
                .map(|token| token.to_lowercase())
                .collect()
        })
        .collect();

    let mut vocabulary: HashMap<&str, usize> = HashMap::new();
    for tokens in &tokenized {
        for token in tokens {
            let next_index = vocabulary.len();
            vocabulary.entry(token.as_str()).or_insert(next_index);
        }
    }
    if vocabulary.is_empty() {
        return None;
    }

    // Term counts per document, then smoothed inverse document frequency.
    let n_docs = documents.len();
    let mut matrix = Array2::<f64>::zeros((n_docs, vocabulary.len()));
    for (row, tokens) in tokenized.iter().enumerate() {
        for token in tokens {
            matrix[[row, vocabulary[token.as_str()]]] += 1.0;
        }
    }

    let mut document_frequency = Array1::<f64>::zeros(vocabulary.len());
    for row in matrix.rows() {
        for (term, &count) in row.iter().enumerate() {
            if count > 0.0 {
                document_frequency[term] += 1.0;
            }
        }
    }
    for mut row in matrix.rows_mut() {
        for (term, value) in row.iter_mut().enumerate() {
            let idf = ((1.0 + n_docs as f64) / (1.0 + document_frequency[term])).ln() + 1.0;
            *value *= idf;
        }
        let norm = row.dot(&row).sqrt();
        if norm > 0.0 {
            row.mapv_inplace(|v| v / norm);
        }
    }

    // Rows are unit length (or zero), so pairwise cosine is a dot product.
    let mut total = 0.0;
    let mut pairs = 0usize;
    for i in 0..n_docs {
        for j in (i + 1)..n_docs {
            total += matrix.row(i).dot(&matrix.row(j));
            pairs += 1;
        }
    }
    if pairs == 0 {
        return None;
    }

    let mean = total / pairs as f64;
    mean.is_finite().then_some(mean)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ranking::tests::test_article;

    fn with_facets(id: &str, des: &[&str]) -> Article {
        let mut article = test_article(id, "world");
        article.des_facet = Some(des.iter().map(|s| s.to_string()).collect());
        article
    }

    #[test]
    fn test_single_article_is_fully_diverse() {
        let article = test_article("a1", "world");
        assert_eq!(diversity(std::slice::from_ref(&article)), 1.0);
    }

    #[test]
    fn test_empty_candidate_set_is_fully_diverse() {
        assert_eq!(diversity(&[]), 1.0);
    }

    #[test]
    fn test_no_topic_signal_is_neutral() {
        let articles = vec![test_article("a1", "world"), test_article("a2", "us")];
        assert_eq!(diversity(&articles), NEUTRAL_SCORE);
    }

    #[test]
    fn test_identical_facets_score_zero_diversity() {
        let articles = vec![
            with_facets("a1", &["economy", "trade"]),
            with_facets("a2", &["economy", "trade"]),
        ];
        assert!(diversity(&articles) < 1e-9);
    }

    #[test]
    fn test_disjoint_facets_score_full_diversity() {
        let articles = vec![
            with_facets("a1", &["economy", "trade"]),
            with_facets("a2", &["football", "playoffs"]),
        ];
        assert!((diversity(&articles) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_identical_below_disjoint() {
        let identical = vec![
            with_facets("a1", &["economy"]),
            with_facets("a2", &["economy"]),
        ];
        let disjoint = vec![
            with_facets("a1", &["economy"]),
            with_facets("a2", &["football"]),
        ];
        assert!(diversity(&identical) < diversity(&disjoint));
    }

    #[test]
    fn test_facet_casing_is_normalized() {
        let articles = vec![
            with_facets("a1", &["Economy"]),
            with_facets("a2", &["economy"]),
        ];
        assert!(diversity(&articles) < 1e-9);
    }
}
