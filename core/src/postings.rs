use crate::error::SnapshotError;
use crate::DocId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One (term, document) entry in stored form: the raw in-document frequency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posting {
    pub doc_id: DocId,
    pub term_frequency: u32,
}

/// Restartable iterator over one term's postings. Cloning it restarts the walk.
pub type Postings<'a> = std::slice::Iter<'a, Posting>;

/// Append-only per-term postings lists, ordered by ascending doc_id.
///
/// Lists are only written while an index is being built; afterwards the store
/// is reached through a shared `Arc` and never mutated again.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostingsStore {
    lists: BTreeMap<String, Vec<Posting>>,
}

impl PostingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a posting to `term`'s list.
    ///
    /// Panics if `doc_id` is not strictly greater than the last doc_id already
    /// in the list: builders scan the corpus once in doc_id order, so anything
    /// else is a bug in the caller.
    pub fn append(&mut self, term: &str, doc_id: DocId, term_frequency: u32) {
        let list = self.lists.entry(term.to_owned()).or_default();
        if let Some(last) = list.last() {
            assert!(
                doc_id > last.doc_id,
                "postings for {term:?} must ascend by doc_id: got {doc_id} after {}",
                last.doc_id
            );
        }
        list.push(Posting { doc_id, term_frequency });
    }

    /// Walk `term`'s postings. Unknown terms yield an empty walk.
    pub fn iterate(&self, term: &str) -> Postings<'_> {
        self.get(term).iter()
    }

    pub fn get(&self, term: &str) -> &[Posting] {
        self.lists.get(term).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn num_terms(&self) -> usize {
        self.lists.len()
    }

    pub fn terms(&self) -> impl Iterator<Item = &str> + '_ {
        self.lists.keys().map(String::as_str)
    }

    /// Check the ordering and range invariants of every list. Used when a
    /// snapshot is loaded from disk, where the append-time assertion never ran.
    pub(crate) fn validate(&self, num_docs: u32) -> Result<(), SnapshotError> {
        for (term, list) in &self.lists {
            if list.is_empty() {
                return Err(SnapshotError::Inconsistent(format!("term {term:?} has an empty postings list")));
            }
            if list.windows(2).any(|pair| pair[1].doc_id <= pair[0].doc_id) {
                return Err(SnapshotError::Inconsistent(format!("postings for {term:?} are not ascending")));
            }
            if let Some(p) = list.iter().find(|p| p.doc_id >= num_docs || p.term_frequency == 0) {
                return Err(SnapshotError::Inconsistent(format!("term {term:?} has an invalid posting {p:?}")));
            }
        }
        Ok(())
    }
}
