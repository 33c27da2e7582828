//! Subject index over a statement snapshot.

use crate::model::{Node, RdfKey, Statement};
use ahash::AHashMap;

/// Which graph contexts a lookup accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphFilter {
    /// Every graph, default included.
    Any,
    /// Only statements without a context.
    Default,
    /// Only statements in the named graph.
    Named(RdfKey),
}

impl GraphFilter {
    pub fn matches(&self, context: Option<&RdfKey>) -> bool {
        match self {
            GraphFilter::Any => true,
            GraphFilter::Default => context.is_none(),
            GraphFilter::Named(name) => context == Some(name),
        }
    }
}

/// Read-only view answering "what is said about K" without scanning.
pub struct StatementIndex<'s> {
    statements: &'s [Statement],
    by_subject: AHashMap<&'s RdfKey, Vec<usize>>,
}

impl<'s> StatementIndex<'s> {
    pub fn new(statements: &'s [Statement]) -> Self {
        let mut by_subject: AHashMap<&'s RdfKey, Vec<usize>> = AHashMap::new();
        for (i, st) in statements.iter().enumerate() {
            by_subject.entry(&st.subject).or_default().push(i);
        }
        tracing::trace!(
            statements = statements.len(),
            subjects = by_subject.len(),
            "indexed statements"
        );
        Self {
            statements,
            by_subject,
        }
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    /// All statements about `key`, in snapshot order.
    pub fn about<'a>(&'a self, key: &RdfKey) -> impl Iterator<Item = &'s Statement> + 'a {
        self.by_subject
            .get(key)
            .into_iter()
            .flatten()
            .map(|&i| &self.statements[i])
    }

    pub fn has_subject(&self, key: &RdfKey, filter: &GraphFilter) -> bool {
        self.about(key).any(|st| filter.matches(st.context.as_ref()))
    }

    /// Statements about `key` with `predicate`, in snapshot order.
    pub fn select(
        &self,
        key: &RdfKey,
        predicate: &str,
        filter: &GraphFilter,
    ) -> Vec<&'s Statement> {
        self.about(key)
            .filter(|st| st.predicate == predicate && filter.matches(st.context.as_ref()))
            .collect()
    }

    /// Objects of `select`.
    pub fn values(&self, key: &RdfKey, predicate: &str, filter: &GraphFilter) -> Vec<&'s Node> {
        self.select(key, predicate, filter)
            .into_iter()
            .map(|st| &st.object)
            .collect()
    }

    pub fn subjects(&self) -> impl Iterator<Item = &'s RdfKey> + '_ {
        self.by_subject.keys().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Literal;

    fn key(s: &str) -> RdfKey {
        RdfKey::resource(s).expect("key")
    }

    fn sample() -> Vec<Statement> {
        vec![
            Statement::new(key("urn:a"), "urn:p", Node::literal(Literal::plain("1"))),
            Statement::new(key("urn:b"), "urn:p", Node::literal(Literal::plain("2"))),
            Statement::new(key("urn:a"), "urn:q", Node::resource("urn:b")),
            Statement::new(key("urn:a"), "urn:p", Node::literal(Literal::plain("3")))
                .in_graph(Some(key("urn:g"))),
        ]
    }

    #[test]
    fn about_keeps_snapshot_order() {
        let statements = sample();
        let index = StatementIndex::new(&statements);
        let preds: Vec<_> = index.about(&key("urn:a")).map(|s| s.predicate.as_str()).collect();
        assert_eq!(preds, ["urn:p", "urn:q", "urn:p"]);
        assert_eq!(index.subjects().count(), 2);
    }

    #[test]
    fn select_honours_graph_filter() {
        let statements = sample();
        let index = StatementIndex::new(&statements);
        let a = key("urn:a");
        assert_eq!(index.select(&a, "urn:p", &GraphFilter::Any).len(), 2);
        assert_eq!(index.select(&a, "urn:p", &GraphFilter::Default).len(), 1);
        let named = GraphFilter::Named(key("urn:g"));
        assert_eq!(
            index.values(&a, "urn:p", &named),
            [&Node::literal(Literal::plain("3"))]
        );
        assert!(!index.has_subject(&key("urn:b"), &named));
        assert!(!index.has_subject(&key("urn:missing"), &GraphFilter::Any));
    }
}
