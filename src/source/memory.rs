use super::{TripleSource, transaction_state_error};
use crate::convert::GraphFilter;
use crate::error::Result;
use crate::model::{RdfKey, Statement};
use indexmap::IndexSet;

/// Insertion-ordered in-memory statement set. A transaction snapshots the
/// set on `begin` and restores it on `rollback`.
#[derive(Debug, Clone, Default)]
pub struct MemoryTripleSource {
    statements: IndexSet<Statement>,
    snapshot: Option<IndexSet<Statement>>,
}

impl MemoryTripleSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_statements(statements: impl IntoIterator<Item = Statement>) -> Self {
        Self {
            statements: statements.into_iter().collect(),
            snapshot: None,
        }
    }

    pub fn statements(&self) -> impl Iterator<Item = &Statement> {
        self.statements.iter()
    }

    pub fn contains(&self, statement: &Statement) -> bool {
        self.statements.contains(statement)
    }
}

impl TripleSource for MemoryTripleSource {
    fn query(
        &self,
        subject: Option<&RdfKey>,
        predicate: Option<&str>,
        graph: &GraphFilter,
    ) -> Result<Vec<Statement>> {
        Ok(self
            .statements
            .iter()
            .filter(|st| subject.is_none_or(|s| &st.subject == s))
            .filter(|st| predicate.is_none_or(|p| st.predicate == p))
            .filter(|st| graph.matches(st.context.as_ref()))
            .cloned()
            .collect())
    }

    fn add(&mut self, statements: &[Statement]) -> Result<()> {
        self.statements.extend(statements.iter().cloned());
        Ok(())
    }

    fn remove(&mut self, statements: &[Statement]) -> Result<()> {
        for st in statements {
            self.statements.shift_remove(st);
        }
        Ok(())
    }

    fn begin(&mut self) -> Result<()> {
        if self.snapshot.is_some() {
            return Err(transaction_state_error(false));
        }
        self.snapshot = Some(self.statements.clone());
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        self.snapshot
            .take()
            .map(|_| ())
            .ok_or_else(|| transaction_state_error(true))
    }

    fn rollback(&mut self) -> Result<()> {
        let snapshot = self.snapshot.take().ok_or_else(|| transaction_state_error(true))?;
        self.statements = snapshot;
        Ok(())
    }

    fn in_transaction(&self) -> bool {
        self.snapshot.is_some()
    }

    fn len(&self) -> Result<usize> {
        Ok(self.statements.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MapperError;
    use crate::model::{Literal, Node};
    use crate::source::in_transaction;
    use assert_matches::assert_matches;

    fn st(s: &str, o: &str) -> Statement {
        Statement::new(
            RdfKey::resource(s).expect("key"),
            "urn:p",
            Node::literal(Literal::plain(o)),
        )
    }

    #[test]
    fn duplicates_are_stored_once() {
        let mut source = MemoryTripleSource::new();
        source.add(&[st("urn:a", "1"), st("urn:a", "1")]).expect("add");
        assert_eq!(source.len().expect("len"), 1);
    }

    #[test]
    fn failed_work_rolls_back() {
        let mut source = MemoryTripleSource::from_statements([st("urn:a", "1")]);
        let result: Result<()> = in_transaction(&mut source, |s| {
            s.add(&[st("urn:b", "2")])?;
            Err(MapperError::Source("boom".into()))
        });
        assert!(result.is_err());
        assert_eq!(source.len().expect("len"), 1);
        assert!(!source.in_transaction());
    }

    #[test]
    fn nested_begin_is_rejected() {
        let mut source = MemoryTripleSource::new();
        source.begin().expect("begin");
        assert_matches!(source.begin(), Err(MapperError::Source(_)));
        source.commit().expect("commit");
        assert_matches!(source.commit(), Err(MapperError::Source(_)));
    }

    #[test]
    fn remove_matching_reports_count() {
        let mut source = MemoryTripleSource::from_statements([
            st("urn:a", "1"),
            st("urn:a", "2"),
            st("urn:b", "3"),
        ]);
        let a = RdfKey::resource("urn:a").expect("key");
        let removed = source
            .remove_matching(Some(&a), None, &GraphFilter::Any)
            .expect("remove");
        assert_eq!(removed, 2);
        assert_eq!(source.len().expect("len"), 1);
    }
}
