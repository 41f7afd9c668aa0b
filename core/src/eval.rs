//! Retrieval quality metrics against a gold relevance set.

use crate::DocId;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Default rank cutoff for average precision.
pub const DEFAULT_CUTOFF: usize = 10;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SetMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub retrieved: usize,
    pub relevant: usize,
    pub true_positives: usize,
}

/// Precision, recall and F1 for an unordered result set.
pub fn precision_recall_f1(
    retrieved: impl IntoIterator<Item = DocId>,
    relevant: impl IntoIterator<Item = DocId>,
) -> SetMetrics {
    let retrieved: HashSet<DocId> = retrieved.into_iter().collect();
    let relevant: HashSet<DocId> = relevant.into_iter().collect();
    let true_positives = retrieved.intersection(&relevant).count();

    let precision = if retrieved.is_empty() { 0.0 } else { true_positives as f64 / retrieved.len() as f64 };
    let recall = if relevant.is_empty() { 0.0 } else { true_positives as f64 / relevant.len() as f64 };
    let f1 = if precision + recall == 0.0 { 0.0 } else { 2.0 * precision * recall / (precision + recall) };

    SetMetrics { precision, recall, f1, retrieved: retrieved.len(), relevant: relevant.len(), true_positives }
}

/// Average precision over the first `k` ranked documents.
///
/// Precision is sampled at every relevant hit inside the cutoff, and the sum is
/// divided by the total number of relevant documents, so relevant documents
/// beyond `k` count as misses.
pub fn average_precision(ranked: &[DocId], relevant: &[DocId], k: usize) -> f64 {
    let relevant: HashSet<DocId> = relevant.iter().copied().collect();
    if relevant.is_empty() {
        return 0.0;
    }
    let mut hits = 0usize;
    let mut sum = 0.0;
    for (rank, doc_id) in ranked.iter().take(k).enumerate() {
        if relevant.contains(doc_id) {
            hits += 1;
            sum += hits as f64 / (rank + 1) as f64;
        }
    }
    sum / relevant.len() as f64
}

pub fn mean_average_precision(per_query: &[f64]) -> f64 {
    if per_query.is_empty() {
        return 0.0;
    }
    per_query.iter().sum::<f64>() / per_query.len() as f64
}

/// One judged query of a gold set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoldQuery {
    pub query_id: String,
    pub query_text: String,
    pub relevant_docs: Vec<DocId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoldSet {
    pub queries: Vec<GoldQuery>,
}
