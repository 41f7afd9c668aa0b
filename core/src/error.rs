//! Error types for the retrieval core.
//!
//! Build and snapshot errors are fatal: the caller must not serve queries when
//! one of them is returned. Query errors are recoverable and the public search
//! functions map them to empty results.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while building an index from a corpus.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BuildError {
    /// IDF divides by the corpus size, so a corpus must hold at least one document.
    #[error("cannot build an index from an empty corpus")]
    EmptyCorpus,
}

/// Errors raised while saving or loading an index snapshot.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// A snapshot part is missing from the snapshot directory
    #[error("snapshot part missing: {}", .0.display())]
    Missing(PathBuf),
    /// A snapshot part exists but could not be decoded
    #[error("snapshot part {part} is corrupt: {reason}")]
    Corrupt { part: &'static str, reason: String },
    /// Parts decoded individually but disagree with each other
    #[error("snapshot parts are inconsistent: {0}")]
    Inconsistent(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Errors raised while parsing a Boolean query expression.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("empty boolean expression")]
    EmptyExpression,
    /// The expression starts with an operator instead of a term
    #[error("operator {0} has no left-hand term")]
    LeadingOperator(String),
    /// The expression ends with an operator instead of a term
    #[error("operator {0} has no right-hand term")]
    DanglingOperator(String),
    /// Two operators follow each other without a term in between
    #[error("operator {second} directly follows {first}")]
    ConsecutiveOperators { first: String, second: String },
}

/// Errors raised while loading a normalizer lexicon.
#[derive(Debug, Error)]
pub enum LexiconError {
    #[error("failed to read lexicon: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse lexicon: {0}")]
    Parse(#[from] serde_json::Error),
    /// A phrase could not be turned into a word-boundary pattern
    #[error("invalid phrase pattern {phrase:?}: {reason}")]
    InvalidPhrase { phrase: String, reason: String },
}
