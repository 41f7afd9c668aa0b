use crate::assemble::{self, PlaceHit};
use crate::boolean::search_boolean;
use crate::query::{analyze_query, AnalyzedQuery};
use crate::tokenizer::{FallbackPolicy, LexiconNormalizer, Normalizer};
use crate::vsm::{self, ScoredDoc, WeightingScheme};
use crate::{CorpusIndex, DocId};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Shared pointer to the live index snapshot.
///
/// A query clones the `Arc` once and keeps reading that snapshot to the end,
/// so a concurrent [`IndexHandle::swap`] never changes data under it.
#[derive(Debug)]
pub struct IndexHandle {
    current: RwLock<Arc<CorpusIndex>>,
}

impl IndexHandle {
    pub fn new(index: CorpusIndex) -> Self {
        Self { current: RwLock::new(Arc::new(index)) }
    }

    pub fn snapshot(&self) -> Arc<CorpusIndex> {
        self.current.read().clone()
    }

    /// Replace the live snapshot, returning the previous one.
    pub fn swap(&self, index: CorpusIndex) -> Arc<CorpusIndex> {
        let next = Arc::new(index);
        std::mem::replace(&mut *self.current.write(), next)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Model {
    Boolean,
    Vsm,
}

impl FromStr for Model {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "boolean" => Ok(Model::Boolean),
            "vsm" => Ok(Model::Vsm),
            other => Err(format!("unknown retrieval model {other:?} (expected boolean or vsm)")),
        }
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Model::Boolean => "boolean",
            Model::Vsm => "vsm",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrievalRequest {
    pub query: String,
    pub model: Model,
    #[serde(default)]
    pub scheme: Option<WeightingScheme>,
    #[serde(default)]
    pub top_k: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Retrieval {
    /// Unordered matching documents
    Boolean(BTreeSet<DocId>),
    /// Documents by descending score
    Ranked(Vec<ScoredDoc>),
}

impl Retrieval {
    pub fn len(&self) -> usize {
        match self {
            Retrieval::Boolean(ids) => ids.len(),
            Retrieval::Ranked(docs) => docs.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaceSearch {
    /// Intent and region analysis; Boolean queries skip it
    pub analyzed: Option<AnalyzedQuery>,
    pub total_hits: usize,
    pub places: Vec<PlaceHit>,
}

/// Query entry point: an index handle plus the normalizer that produced its
/// terms.
pub struct Engine {
    index: IndexHandle,
    normalizer: Arc<dyn Normalizer>,
    fallback: FallbackPolicy,
}

impl Engine {
    pub fn new(index: CorpusIndex, normalizer: Arc<dyn Normalizer>, fallback: FallbackPolicy) -> Self {
        Self { index: IndexHandle::new(index), normalizer, fallback }
    }

    pub fn with_lexicon(index: CorpusIndex, normalizer: LexiconNormalizer) -> Self {
        let fallback = normalizer.fallback().clone();
        Self::new(index, Arc::new(normalizer), fallback)
    }

    pub fn index(&self) -> Arc<CorpusIndex> {
        self.index.snapshot()
    }

    /// Atomically replace the index; in-flight queries finish on the old one.
    pub fn swap(&self, index: CorpusIndex) {
        let previous = self.index.swap(index);
        let current = self.index.snapshot();
        tracing::info!(
            previous_docs = previous.num_docs(),
            num_docs = current.num_docs(),
            num_terms = current.num_terms(),
            "swapped index snapshot"
        );
    }

    pub fn analyze(&self, text: &str) -> AnalyzedQuery {
        analyze_query(self.normalizer.as_ref(), &self.fallback, text)
    }

    /// Document-level retrieval. The ranked list is cut to `top_k` when given.
    pub fn retrieve(&self, request: &RetrievalRequest) -> Retrieval {
        let index = self.index();
        match request.model {
            Model::Boolean => Retrieval::Boolean(search_boolean(&index, self.normalizer.as_ref(), &request.query)),
            Model::Vsm => {
                let analyzed = self.analyze(&request.query);
                let mut ranked = vsm::score(&index, &analyzed.tokens, request.scheme.unwrap_or_default());
                if let Some(k) = request.top_k {
                    ranked.truncate(k);
                }
                Retrieval::Ranked(ranked)
            }
        }
    }

    /// Place-level search. The vector model honors detected intent and
    /// region; a Boolean expression yields its matching places in doc_id order.
    pub fn search_places(
        &self,
        text: &str,
        model: Model,
        scheme: WeightingScheme,
        top_k: Option<usize>,
    ) -> PlaceSearch {
        let index = self.index();
        let (analyzed, mut places) = match model {
            Model::Vsm => {
                let analyzed = self.analyze(text);
                let places = assemble::assemble(&index, &analyzed, scheme);
                (Some(analyzed), places)
            }
            Model::Boolean => {
                let ids = search_boolean(&index, self.normalizer.as_ref(), text);
                (None, assemble::assemble_matches(&index, &ids))
            }
        };
        let total_hits = places.len();
        if let Some(k) = top_k {
            places.truncate(k);
        }
        PlaceSearch { analyzed, total_hits, places }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SourceDoc;

    fn corpus(texts: &[&str]) -> CorpusIndex {
        let n = LexiconNormalizer::default();
        CorpusIndex::build(texts.iter().enumerate().map(|(i, text)| SourceDoc {
            place: format!("Tempat {i}"),
            location: "Bogor".into(),
            rating: 4.0,
            tokens: n.normalize(text),
        }))
        .unwrap()
    }

    #[test]
    fn swap_leaves_held_snapshots_alone() {
        let engine = Engine::with_lexicon(corpus(&["alam sejuk"]), LexiconNormalizer::default());
        let held = engine.index();
        engine.swap(corpus(&["alam sejuk", "alam kota", "pantai"]));
        assert_eq!(held.num_docs(), 1);
        assert_eq!(engine.index().num_docs(), 3);
    }

    #[test]
    fn vsm_retrieval_truncates_to_top_k() {
        let engine = Engine::with_lexicon(corpus(&["sejuk", "sejuk sejuk", "kota"]), LexiconNormalizer::default());
        let request = RetrievalRequest {
            query: "sejuk".into(),
            model: Model::Vsm,
            scheme: None,
            top_k: Some(1),
        };
        match engine.retrieve(&request) {
            Retrieval::Ranked(docs) => {
                assert_eq!(docs.len(), 1);
                assert_eq!(docs[0].doc_id, 1);
            }
            other => panic!("expected ranked results, got {other:?}"),
        }
    }

    #[test]
    fn boolean_place_search_keeps_one_hit_per_place() {
        let n = LexiconNormalizer::default();
        let reviews = [
            ("Ranca Upas", "kemah sejuk"),
            ("Gunung Pancar", "kemah kota"),
            ("Ranca Upas", "kemah dingin"),
        ];
        let index = CorpusIndex::build(reviews.iter().map(|(place, text)| SourceDoc {
            place: place.to_string(),
            location: "Bandung".into(),
            rating: 4.0,
            tokens: n.normalize(text),
        }))
        .unwrap();
        let engine = Engine::with_lexicon(index, n);

        let found = engine.search_places("kemah NOT kota", Model::Boolean, WeightingScheme::default(), None);
        assert!(found.analyzed.is_none());
        assert_eq!(found.total_hits, 1);
        assert_eq!(found.places[0].name, "Ranca Upas");
        assert_eq!(found.places[0].top_score, 0.0);

        let found = engine.search_places("kemah", Model::Boolean, WeightingScheme::default(), Some(1));
        assert_eq!(found.total_hits, 2);
        assert_eq!(found.places.len(), 1);
        assert_eq!(found.places[0].name, "Ranca Upas");
    }

    #[test]
    fn model_parses_case_insensitively() {
        assert_eq!("VSM".parse::<Model>(), Ok(Model::Vsm));
        assert_eq!("boolean".parse::<Model>(), Ok(Model::Boolean));
        assert!("fuzzy".parse::<Model>().is_err());
    }
}
