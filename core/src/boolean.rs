//! Flat Boolean retrieval: `term (AND|OR|NOT) term ...`.
//!
//! There are no parentheses and no precedence. Operators apply strictly left
//! to right, so `a OR b AND c` means `(a OR b) AND c`. `NOT` is binary set
//! difference: `a NOT b` keeps the documents of `a` that lack `b`.

use crate::error::QueryError;
use crate::tokenizer::Normalizer;
use crate::{CorpusIndex, DocId};
use std::collections::BTreeSet;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolOp {
    And,
    Or,
    Not,
}

impl BoolOp {
    /// Operators are whole words, matched case-insensitively.
    fn from_keyword(word: &str) -> Option<Self> {
        if word.eq_ignore_ascii_case("and") {
            Some(BoolOp::And)
        } else if word.eq_ignore_ascii_case("or") {
            Some(BoolOp::Or)
        } else if word.eq_ignore_ascii_case("not") {
            Some(BoolOp::Not)
        } else {
            None
        }
    }
}

/// A parsed expression. Terms are the raw text between operators; a term may
/// span several words ("kamar mandi").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BooleanQuery {
    pub first: String,
    pub rest: Vec<(BoolOp, String)>,
}

impl FromStr for BooleanQuery {
    type Err = QueryError;

    fn from_str(expr: &str) -> Result<Self, Self::Err> {
        let mut first: Option<String> = None;
        let mut rest = Vec::new();
        let mut pending: Option<(BoolOp, &str)> = None;
        let mut words: Vec<&str> = Vec::new();

        for word in expr.split_whitespace() {
            let Some(op) = BoolOp::from_keyword(word) else {
                words.push(word);
                continue;
            };
            if words.is_empty() {
                return Err(match pending {
                    Some((_, prev)) => {
                        QueryError::ConsecutiveOperators { first: prev.to_string(), second: word.to_string() }
                    }
                    None => QueryError::LeadingOperator(word.to_string()),
                });
            }
            let term = words.join(" ");
            words.clear();
            match pending.take() {
                Some((prev, _)) => rest.push((prev, term)),
                None => first = Some(term),
            }
            pending = Some((op, word));
        }

        if words.is_empty() {
            return Err(match pending {
                Some((_, op)) => QueryError::DanglingOperator(op.to_string()),
                None => QueryError::EmptyExpression,
            });
        }
        let term = words.join(" ");
        match pending {
            Some((op, _)) => rest.push((op, term)),
            None => first = Some(term),
        }
        let first = first.ok_or(QueryError::EmptyExpression)?;
        Ok(BooleanQuery { first, rest })
    }
}

impl BooleanQuery {
    pub fn evaluate<N: Normalizer + ?Sized>(&self, index: &CorpusIndex, normalizer: &N) -> BTreeSet<DocId> {
        let mut result = term_docs(index, normalizer, &self.first).cloned().unwrap_or_default();
        for (op, term) in &self.rest {
            let docs = term_docs(index, normalizer, term);
            match (op, docs) {
                (BoolOp::And, Some(docs)) => result.retain(|id| docs.contains(id)),
                (BoolOp::And, None) => result.clear(),
                (BoolOp::Or, Some(docs)) => result.extend(docs.iter().copied()),
                (BoolOp::Not, Some(docs)) => result.retain(|id| !docs.contains(id)),
                (BoolOp::Or | BoolOp::Not, None) => {}
            }
        }
        result
    }
}

/// Documents for one raw term: the term is normalized and only its first
/// resulting token is looked up. A term that normalizes away matches nothing.
fn term_docs<'a, N: Normalizer + ?Sized>(
    index: &'a CorpusIndex,
    normalizer: &N,
    raw: &str,
) -> Option<&'a BTreeSet<DocId>> {
    let token = normalizer.normalize(raw).into_iter().next()?;
    Some(index.boolean_postings(&token))
}

/// Evaluate a Boolean expression. Malformed expressions are logged and
/// produce an empty set.
pub fn search_boolean<N: Normalizer + ?Sized>(index: &CorpusIndex, normalizer: &N, expr: &str) -> BTreeSet<DocId> {
    match expr.parse::<BooleanQuery>() {
        Ok(query) => query.evaluate(index, normalizer),
        Err(e) => {
            tracing::warn!(query = expr, error = %e, "rejected boolean query");
            BTreeSet::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parsed(expr: &str) -> Result<BooleanQuery, QueryError> {
        expr.parse()
    }

    #[test]
    fn parses_left_to_right() {
        let q = parsed("alam or kamar mandi AND sejuk").unwrap();
        assert_eq!(q.first, "alam");
        assert_eq!(
            q.rest,
            vec![(BoolOp::Or, "kamar mandi".to_string()), (BoolOp::And, "sejuk".to_string())]
        );
    }

    #[test]
    fn single_term_is_valid() {
        let q = parsed("  sejuk ").unwrap();
        assert_eq!(q.first, "sejuk");
        assert!(q.rest.is_empty());
    }

    #[test]
    fn malformed_expressions_are_reported() {
        assert_eq!(parsed(""), Err(QueryError::EmptyExpression));
        assert_eq!(parsed("alam AND"), Err(QueryError::DanglingOperator("AND".into())));
        assert_eq!(parsed("NOT alam"), Err(QueryError::LeadingOperator("NOT".into())));
        assert_eq!(
            parsed("alam AND NOT bayar"),
            Err(QueryError::ConsecutiveOperators { first: "AND".into(), second: "NOT".into() })
        );
    }
}
