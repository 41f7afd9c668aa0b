//! Boolean and vector-space retrieval over a tokenized review corpus.
//!
//! An index is built once per corpus ([`CorpusIndex::build`]) and is read-only
//! afterwards; serving code holds it behind an [`engine::IndexHandle`] and
//! swaps in whole new snapshots instead of mutating it.

pub mod assemble;
pub mod boolean;
pub mod engine;
pub mod error;
pub mod eval;
pub mod index;
pub mod persist;
pub mod postings;
pub mod query;
pub mod tokenizer;
pub mod vsm;

pub use index::{CorpusIndex, DocId, DocMeta, IndexBuilder, PlaceInfo, SourceDoc};
pub use postings::{Posting, PostingsStore};
