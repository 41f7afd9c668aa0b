use crate::error::{BuildError, SnapshotError};
use crate::postings::PostingsStore;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

pub type DocId = u32;

/// Term -> set of documents containing it, without weights.
pub type BooleanIndex = BTreeMap<String, BTreeSet<DocId>>;

static NO_DOCS: BTreeSet<DocId> = BTreeSet::new();

/// Place-level metadata attached to every document (review) of that place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocMeta {
    pub place: String,
    pub location: String,
    /// Rating given by this review
    pub rating: f64,
    /// Mean rating over every review of the same place
    pub avg_rating: f64,
    pub photo_url: Option<String>,
    pub gmaps_link: Option<String>,
    pub facilities: Option<String>,
    pub price_items: Option<Vec<String>>,
    pub opening_hours: Option<String>,
}

/// Static display information for a place, joined to documents by place name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlaceInfo {
    pub name: String,
    #[serde(default)]
    pub photo_url: Option<String>,
    #[serde(default)]
    pub gmaps_link: Option<String>,
    #[serde(default)]
    pub facilities: Option<String>,
    #[serde(default)]
    pub price_items: Option<Vec<String>>,
    #[serde(default)]
    pub opening_hours: Option<String>,
}

/// A document whose text has already been normalized into terms.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceDoc {
    pub place: String,
    pub location: String,
    pub rating: f64,
    pub tokens: Vec<String>,
}

/// Immutable index snapshot: IDF table, VSM postings, Boolean index and
/// per-document metadata for one corpus.
#[derive(Debug, Clone, PartialEq)]
pub struct CorpusIndex {
    num_docs: u32,
    idf: BTreeMap<String, f64>,
    postings: PostingsStore,
    boolean: BooleanIndex,
    docs: BTreeMap<DocId, DocMeta>,
}

impl CorpusIndex {
    /// Build an index in one pass over `docs`; doc ids follow iteration order.
    pub fn build(docs: impl IntoIterator<Item = SourceDoc>) -> Result<Self, BuildError> {
        let mut builder = IndexBuilder::new();
        for doc in docs {
            builder.add(doc);
        }
        builder.build()
    }

    /// Reassemble an index from previously persisted parts, checking that they
    /// describe the same corpus.
    pub fn from_parts(
        num_docs: u32,
        idf: BTreeMap<String, f64>,
        postings: PostingsStore,
        boolean: BooleanIndex,
        docs: BTreeMap<DocId, DocMeta>,
    ) -> Result<Self, SnapshotError> {
        if num_docs == 0 {
            return Err(SnapshotError::Inconsistent("snapshot holds no documents".into()));
        }
        if docs.len() != num_docs as usize || docs.keys().zip(0..).any(|(id, expected)| *id != expected) {
            return Err(SnapshotError::Inconsistent(format!(
                "document metadata does not cover the dense range [0, {num_docs})"
            )));
        }
        postings.validate(num_docs)?;
        if !idf.keys().map(String::as_str).eq(postings.terms()) {
            return Err(SnapshotError::Inconsistent("idf and postings cover different terms".into()));
        }
        if !boolean.keys().map(String::as_str).eq(postings.terms()) {
            return Err(SnapshotError::Inconsistent("boolean index and postings cover different terms".into()));
        }
        for (term, ids) in &boolean {
            let list = postings.get(term);
            if !ids.iter().copied().eq(list.iter().map(|p| p.doc_id)) {
                return Err(SnapshotError::Inconsistent(format!("boolean entry {term:?} disagrees with its postings")));
            }
            let expected = (num_docs as f64 / list.len() as f64).log10();
            if (idf[term] - expected).abs() > 1e-9 {
                let reason = format!("idf of {term:?} does not match its document frequency");
                return Err(SnapshotError::Inconsistent(reason));
            }
        }
        Ok(Self { num_docs, idf, postings, boolean, docs })
    }

    pub fn num_docs(&self) -> u32 {
        self.num_docs
    }

    pub fn num_terms(&self) -> usize {
        self.idf.len()
    }

    pub fn idf(&self, term: &str) -> Option<f64> {
        self.idf.get(term).copied()
    }

    pub fn idf_table(&self) -> &BTreeMap<String, f64> {
        &self.idf
    }

    pub fn postings(&self) -> &PostingsStore {
        &self.postings
    }

    pub fn boolean_index(&self) -> &BooleanIndex {
        &self.boolean
    }

    /// Documents containing `term`; empty for terms outside the corpus.
    pub fn boolean_postings(&self, term: &str) -> &BTreeSet<DocId> {
        self.boolean.get(term).unwrap_or(&NO_DOCS)
    }

    pub fn doc(&self, doc_id: DocId) -> Option<&DocMeta> {
        self.docs.get(&doc_id)
    }

    /// All documents in ascending doc_id order.
    pub fn docs(&self) -> impl Iterator<Item = (DocId, &DocMeta)> + '_ {
        self.docs.iter().map(|(id, meta)| (*id, meta))
    }

    pub(crate) fn doc_table(&self) -> &BTreeMap<DocId, DocMeta> {
        &self.docs
    }
}

/// Collects documents, then builds a [`CorpusIndex`] from them in one batch.
#[derive(Debug, Default)]
pub struct IndexBuilder {
    docs: Vec<SourceDoc>,
    places: HashMap<String, PlaceInfo>,
}

impl IndexBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a document and return the doc id it will receive.
    pub fn add(&mut self, doc: SourceDoc) -> DocId {
        let doc_id = self.docs.len() as DocId;
        self.docs.push(doc);
        doc_id
    }

    /// Register static display info; later entries for the same name win.
    pub fn place_info(&mut self, info: impl IntoIterator<Item = PlaceInfo>) -> &mut Self {
        for place in info {
            self.places.insert(place.name.clone(), place);
        }
        self
    }

    pub fn build(self) -> Result<CorpusIndex, BuildError> {
        let n = self.docs.len();
        if n == 0 {
            return Err(BuildError::EmptyCorpus);
        }

        // document frequency: each distinct term counts once per document
        let mut df: BTreeMap<&str, u32> = BTreeMap::new();
        for doc in &self.docs {
            let distinct: BTreeSet<&str> = doc.tokens.iter().map(String::as_str).collect();
            for term in distinct {
                *df.entry(term).or_insert(0) += 1;
            }
        }
        let idf: BTreeMap<String, f64> = df
            .iter()
            .map(|(term, &count)| (term.to_string(), (n as f64 / count as f64).log10()))
            .collect();

        let mut postings = PostingsStore::new();
        let mut boolean = BooleanIndex::new();
        for (doc_id, doc) in self.docs.iter().enumerate() {
            let doc_id = doc_id as DocId;
            let mut tf: BTreeMap<&str, u32> = BTreeMap::new();
            for term in &doc.tokens {
                *tf.entry(term.as_str()).or_insert(0) += 1;
            }
            for (term, count) in tf {
                if idf.contains_key(term) {
                    postings.append(term, doc_id, count);
                }
                boolean.entry(term.to_owned()).or_default().insert(doc_id);
            }
        }

        let mut ratings: HashMap<&str, (f64, u32)> = HashMap::new();
        for doc in &self.docs {
            let slot = ratings.entry(doc.place.as_str()).or_insert((0.0, 0));
            slot.0 += doc.rating;
            slot.1 += 1;
        }
        let mut docs = BTreeMap::new();
        for (doc_id, doc) in self.docs.iter().enumerate() {
            let avg_rating = ratings
                .get(doc.place.as_str())
                .map(|(sum, count)| sum / *count as f64)
                .unwrap_or(doc.rating);
            let info = self.places.get(&doc.place);
            docs.insert(
                doc_id as DocId,
                DocMeta {
                    place: doc.place.clone(),
                    location: doc.location.clone(),
                    rating: doc.rating,
                    avg_rating,
                    photo_url: info.and_then(|i| i.photo_url.clone()),
                    gmaps_link: info.and_then(|i| i.gmaps_link.clone()),
                    facilities: info.and_then(|i| i.facilities.clone()),
                    price_items: info.and_then(|i| i.price_items.clone()),
                    opening_hours: info.and_then(|i| i.opening_hours.clone()),
                },
            );
        }

        tracing::info!(num_docs = n, num_terms = idf.len(), "built corpus index");
        Ok(CorpusIndex { num_docs: n as u32, idf, postings, boolean, docs })
    }
}
