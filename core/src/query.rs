use crate::tokenizer::{FallbackPolicy, Intent, Normalizer};
use serde::{Deserialize, Serialize};

/// How the assembler turns a query into place results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalMode {
    /// Rank by VSM score
    Rank,
    /// Skip scoring and list every place, optionally filtered by region
    AllRegionFiltered,
    SortByRatingAsc,
    SortByRatingDesc,
}

impl From<Option<Intent>> for RetrievalMode {
    fn from(intent: Option<Intent>) -> Self {
        match intent {
            None => RetrievalMode::Rank,
            Some(Intent::All) => RetrievalMode::AllRegionFiltered,
            Some(Intent::RatingTop) => RetrievalMode::SortByRatingDesc,
            Some(Intent::RatingBottom) => RetrievalMode::SortByRatingAsc,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyzedQuery {
    pub tokens: Vec<String>,
    pub mode: RetrievalMode,
    pub region: Option<String>,
}

/// Run intent and region detection, normalize what is left, and apply the
/// fallback policy for queries that named only a region or an intent.
pub fn analyze_query<N: Normalizer + ?Sized>(
    normalizer: &N,
    fallback: &FallbackPolicy,
    text: &str,
) -> AnalyzedQuery {
    let (after_intent, mut intent) = normalizer.detect_intent(text);
    let (remaining, region) = normalizer.detect_region(&after_intent);
    let mut tokens = normalizer.normalize(&remaining);

    if region.is_some() && tokens.iter().all(|t| fallback.filler_words.contains(t)) {
        tokens.clear();
    }
    if tokens.is_empty() && (intent.is_some() || region.is_some()) {
        tokens.push(fallback.fallback_term.clone());
        if intent.is_none() {
            intent = Some(Intent::All);
        }
    }

    let analyzed = AnalyzedQuery { tokens, mode: intent.into(), region };
    tracing::debug!(query = text, ?analyzed, "analyzed query");
    analyzed
}
