//! Vector space scoring over the stored raw-frequency postings.
//!
//! Scores are unnormalized weighted dot products: neither the query nor the
//! document vector is divided by its magnitude. Ranking depends on this, so it
//! must not be "corrected" into cosine similarity.

use crate::{CorpusIndex, DocId};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Term weighting applied identically to query and document frequencies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WeightingScheme {
    /// tf * idf
    #[default]
    #[serde(rename = "raw-tfidf", alias = "tfidf")]
    RawTfIdf,
    /// (1 + log10 tf) * idf
    #[serde(rename = "sublinear")]
    Sublinear,
}

impl WeightingScheme {
    pub fn weight(self, term_frequency: u32, idf: f64) -> f64 {
        if term_frequency == 0 {
            return 0.0;
        }
        match self {
            WeightingScheme::RawTfIdf => term_frequency as f64 * idf,
            WeightingScheme::Sublinear => (1.0 + (term_frequency as f64).log10()) * idf,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            WeightingScheme::RawTfIdf => "raw-tfidf",
            WeightingScheme::Sublinear => "sublinear",
        }
    }
}

impl fmt::Display for WeightingScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WeightingScheme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "raw-tfidf" | "tfidf" => Ok(WeightingScheme::RawTfIdf),
            "sublinear" => Ok(WeightingScheme::Sublinear),
            other => Err(format!("unknown weighting scheme {other:?} (expected raw-tfidf or sublinear)")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoredDoc {
    pub doc_id: DocId,
    pub score: f64,
}

/// Rank documents sharing at least one term with `query_tokens`.
///
/// Out-of-vocabulary terms are dropped. Documents sharing no query term are
/// never candidates, so they are absent rather than scored zero. Equal scores
/// keep no particular order.
pub fn score(index: &CorpusIndex, query_tokens: &[String], scheme: WeightingScheme) -> Vec<ScoredDoc> {
    let mut query_tf: BTreeMap<&str, u32> = BTreeMap::new();
    for token in query_tokens {
        *query_tf.entry(token.as_str()).or_insert(0) += 1;
    }

    let query_weights: Vec<(&str, f64, f64)> = query_tf
        .into_iter()
        .filter_map(|(term, tf)| index.idf(term).map(|idf| (term, idf, scheme.weight(tf, idf))))
        .collect();

    // candidate set: union of the matched terms' postings
    let mut scores: BTreeMap<DocId, f64> = BTreeMap::new();
    for (term, _, _) in &query_weights {
        for posting in index.postings().iterate(term) {
            scores.entry(posting.doc_id).or_insert(0.0);
        }
    }
    if scores.is_empty() {
        return Vec::new();
    }

    for (term, idf, query_weight) in &query_weights {
        for posting in index.postings().iterate(term) {
            if let Some(acc) = scores.get_mut(&posting.doc_id) {
                *acc += scheme.weight(posting.term_frequency, *idf) * query_weight;
            }
        }
    }

    let mut ranked: Vec<ScoredDoc> = scores.into_iter().map(|(doc_id, score)| ScoredDoc { doc_id, score }).collect();
    ranked.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    tracing::debug!(candidates = ranked.len(), scheme = %scheme, "scored query");
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SourceDoc;

    fn index(texts: &[&str]) -> CorpusIndex {
        CorpusIndex::build(texts.iter().enumerate().map(|(i, text)| SourceDoc {
            place: format!("place-{i}"),
            location: "Bogor".into(),
            rating: 4.0,
            tokens: text.split_whitespace().map(str::to_string).collect(),
        }))
        .unwrap()
    }

    fn tokens(text: &str) -> Vec<String> {
        text.split_whitespace().map(str::to_string).collect()
    }

    #[test]
    fn sublinear_dampens_repeats() {
        assert_eq!(WeightingScheme::Sublinear.weight(1, 2.0), 2.0);
        assert_eq!(WeightingScheme::RawTfIdf.weight(10, 2.0), 20.0);
        assert!((WeightingScheme::Sublinear.weight(10, 2.0) - 4.0).abs() < 1e-12);
        assert_eq!(WeightingScheme::Sublinear.weight(0, 2.0), 0.0);
    }

    #[test]
    fn scheme_parses_from_cli_names() {
        assert_eq!("tfidf".parse::<WeightingScheme>(), Ok(WeightingScheme::RawTfIdf));
        assert_eq!("Raw-TFIDF".parse::<WeightingScheme>(), Ok(WeightingScheme::RawTfIdf));
        assert_eq!("sublinear".parse::<WeightingScheme>(), Ok(WeightingScheme::Sublinear));
        assert!("bm25".parse::<WeightingScheme>().is_err());
    }

    #[test]
    fn higher_frequency_ranks_first() {
        let idx = index(&["sejuk sejuk sejuk", "sejuk", "kota"]);
        let ranked = score(&idx, &tokens("sejuk"), WeightingScheme::RawTfIdf);
        let ids: Vec<DocId> = ranked.iter().map(|d| d.doc_id).collect();
        assert_eq!(ids, vec![0, 1]);
        let idf = (3f64 / 2.0).log10();
        assert!((ranked[0].score - 3.0 * idf * idf).abs() < 1e-12);
    }

    #[test]
    fn repeated_query_terms_scale_query_weight() {
        let idx = index(&["sejuk", "kota"]);
        let once = score(&idx, &tokens("sejuk"), WeightingScheme::RawTfIdf);
        let twice = score(&idx, &tokens("sejuk sejuk"), WeightingScheme::RawTfIdf);
        assert!((twice[0].score - 2.0 * once[0].score).abs() < 1e-12);
    }

    #[test]
    fn zero_idf_terms_still_make_candidates() {
        let idx = index(&["alam", "alam"]);
        let ranked = score(&idx, &tokens("alam"), WeightingScheme::RawTfIdf);
        assert_eq!(ranked.len(), 2);
        assert!(ranked.iter().all(|d| d.score == 0.0));
    }

    #[test]
    fn empty_and_unknown_queries_yield_nothing() {
        let idx = index(&["alam sejuk"]);
        assert!(score(&idx, &[], WeightingScheme::RawTfIdf).is_empty());
        assert!(score(&idx, &tokens("gunung"), WeightingScheme::Sublinear).is_empty());
    }
}
