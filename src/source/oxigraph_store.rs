use super::{TripleSource, transaction_state_error};
use crate::convert::GraphFilter;
use crate::error::{MapperError, Result};
use crate::model::{Literal, Node, RdfKey, Statement};
use oxigraph::io::RdfFormat;
use oxigraph::model::{
    BlankNode, GraphName, GraphNameRef, Literal as OxLiteral, NamedNode, Quad, Term,
};
use oxigraph::store::Store;

enum PendingOp {
    Add(Quad),
    Remove(Quad),
}

/// Triple source over an oxigraph store.
///
/// Writes made inside a transaction are buffered and applied on `commit`;
/// queries see only committed data.
pub struct OxigraphTripleSource {
    store: Store,
    pending: Option<Vec<PendingOp>>,
}

fn invalid(value: &str, err: impl std::fmt::Display) -> MapperError {
    MapperError::invalid_key(value, err.to_string())
}

fn named_node(iri: &str) -> Result<NamedNode> {
    NamedNode::new(iri).map_err(|e| invalid(iri, e))
}

fn blank_node(id: &str) -> Result<BlankNode> {
    BlankNode::new(id).map_err(|e| invalid(id, e))
}

fn to_term(node: &Node) -> Result<Term> {
    Ok(match node {
        Node::Resource { iri } => named_node(iri)?.into(),
        Node::Anonymous { id } => blank_node(id)?.into(),
        Node::Literal(lit) => match (&lit.language, &lit.datatype) {
            (Some(lang), _) => {
                OxLiteral::new_language_tagged_literal(lit.value.as_str(), lang.as_str())
                    .map_err(|e| {
                        MapperError::Source(format!("invalid language tag {lang:?}: {e}"))
                    })?
                    .into()
            }
            (None, Some(dt)) => {
                OxLiteral::new_typed_literal(lit.value.as_str(), named_node(dt)?).into()
            }
            (None, None) => OxLiteral::new_simple_literal(lit.value.as_str()).into(),
        },
    })
}

fn to_graph_name(context: Option<&RdfKey>) -> Result<GraphName> {
    Ok(match context {
        None => GraphName::DefaultGraph,
        Some(RdfKey::Resource(iri)) => named_node(iri)?.into(),
        Some(RdfKey::Anonymous(id)) => blank_node(id)?.into(),
    })
}

fn to_quad(st: &Statement) -> Result<Quad> {
    let predicate = named_node(&st.predicate)?;
    let object = to_term(&st.object)?;
    let graph = to_graph_name(st.context.as_ref())?;
    Ok(match &st.subject {
        RdfKey::Resource(iri) => Quad::new(named_node(iri)?, predicate, object, graph),
        RdfKey::Anonymous(id) => Quad::new(blank_node(id)?, predicate, object, graph),
    })
}

fn term_key(term: Term) -> Option<RdfKey> {
    match term {
        Term::NamedNode(n) => Some(RdfKey::Resource(n.into_string())),
        Term::BlankNode(b) => Some(RdfKey::Anonymous(b.into_string())),
        _ => None,
    }
}

fn from_quad(quad: Quad) -> Option<Statement> {
    let subject = term_key(Term::from(quad.subject))?;
    let object = match quad.object {
        Term::NamedNode(n) => Node::Resource { iri: n.into_string() },
        Term::BlankNode(b) => Node::Anonymous { id: b.into_string() },
        Term::Literal(lit) => {
            let language = lit.language().map(str::to_string);
            let datatype = match language {
                Some(_) => None,
                None => Some(lit.datatype().as_str().to_string()),
            };
            Node::Literal(Literal {
                value: lit.value().to_string(),
                datatype,
                language,
            })
        }
        #[allow(unreachable_patterns)]
        _ => return None,
    };
    let context = match quad.graph_name {
        GraphName::DefaultGraph => None,
        GraphName::NamedNode(n) => Some(RdfKey::Resource(n.into_string())),
        GraphName::BlankNode(b) => Some(RdfKey::Anonymous(b.into_string())),
    };
    Some(Statement {
        subject,
        predicate: quad.predicate.into_string(),
        object,
        context,
    })
}

impl OxigraphTripleSource {
    /// In-memory oxigraph store.
    pub fn new() -> Result<Self> {
        Ok(Self::from_store(Store::new()?))
    }

    pub fn from_store(store: Store) -> Self {
        Self {
            store,
            pending: None,
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Loads Turtle into the default graph, outside any transaction.
    pub fn load_turtle(&self, turtle: &str) -> Result<()> {
        self.store
            .load_from_reader(RdfFormat::Turtle, turtle.as_bytes())
            .map_err(|e| MapperError::Source(format!("failed to parse Turtle content: {e}")))
    }

    fn apply(&self, op: &PendingOp) -> Result<()> {
        match op {
            PendingOp::Add(q) => self.store.insert(q)?,
            PendingOp::Remove(q) => self.store.remove(q)?,
        };
        Ok(())
    }

    fn undo(&self, op: &PendingOp) -> Result<()> {
        match op {
            PendingOp::Add(q) => self.store.remove(q)?,
            PendingOp::Remove(q) => self.store.insert(q)?,
        };
        Ok(())
    }
}

impl TripleSource for OxigraphTripleSource {
    fn query(
        &self,
        subject: Option<&RdfKey>,
        predicate: Option<&str>,
        graph: &GraphFilter,
    ) -> Result<Vec<Statement>> {
        let named_subject;
        let blank_subject;
        let subject_ref = match subject {
            Some(RdfKey::Resource(iri)) => {
                named_subject = named_node(iri)?;
                Some(named_subject.as_ref().into())
            }
            Some(RdfKey::Anonymous(id)) => {
                blank_subject = blank_node(id)?;
                Some(blank_subject.as_ref().into())
            }
            None => None,
        };
        let predicate = predicate.map(named_node).transpose()?;

        let named_graph;
        let blank_graph;
        let graph_ref = match graph {
            GraphFilter::Any => None,
            GraphFilter::Default => Some(GraphNameRef::DefaultGraph),
            GraphFilter::Named(RdfKey::Resource(iri)) => {
                named_graph = named_node(iri)?;
                Some(named_graph.as_ref().into())
            }
            GraphFilter::Named(RdfKey::Anonymous(id)) => {
                blank_graph = blank_node(id)?;
                Some(blank_graph.as_ref().into())
            }
        };

        let mut out = Vec::new();
        for quad in self.store.quads_for_pattern(
            subject_ref,
            predicate.as_ref().map(|p| p.as_ref()),
            None,
            graph_ref,
        ) {
            if let Some(st) = from_quad(quad?) {
                out.push(st);
            }
        }
        Ok(out)
    }

    fn add(&mut self, statements: &[Statement]) -> Result<()> {
        let quads = statements.iter().map(to_quad).collect::<Result<Vec<_>>>()?;
        match &mut self.pending {
            Some(pending) => pending.extend(quads.into_iter().map(PendingOp::Add)),
            None => {
                for quad in &quads {
                    self.store.insert(quad)?;
                }
            }
        }
        Ok(())
    }

    fn remove(&mut self, statements: &[Statement]) -> Result<()> {
        let quads = statements.iter().map(to_quad).collect::<Result<Vec<_>>>()?;
        match &mut self.pending {
            Some(pending) => pending.extend(quads.into_iter().map(PendingOp::Remove)),
            None => {
                for quad in &quads {
                    self.store.remove(quad)?;
                }
            }
        }
        Ok(())
    }

    fn begin(&mut self) -> Result<()> {
        if self.pending.is_some() {
            return Err(transaction_state_error(false));
        }
        self.pending = Some(Vec::new());
        Ok(())
    }

    /// Applies buffered writes in order. If one fails, the writes already
    /// applied are undone before the error is returned.
    fn commit(&mut self) -> Result<()> {
        let pending = self.pending.take().ok_or_else(|| transaction_state_error(true))?;
        for (i, op) in pending.iter().enumerate() {
            if let Err(err) = self.apply(op) {
                for done in pending[..i].iter().rev() {
                    if let Err(undo_err) = self.undo(done) {
                        tracing::warn!(error = %undo_err, "failed to undo partial commit");
                    }
                }
                return Err(err);
            }
        }
        tracing::trace!(operations = pending.len(), "committed oxigraph transaction");
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        self.pending
            .take()
            .map(|_| ())
            .ok_or_else(|| transaction_state_error(true))
    }

    fn in_transaction(&self) -> bool {
        self.pending.is_some()
    }

    fn len(&self) -> Result<usize> {
        Ok(self.store.len()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::vocab::xsd;

    #[test]
    fn statements_survive_the_store() {
        let mut source = OxigraphTripleSource::new().expect("store");
        let subject = RdfKey::anonymous("b0").expect("key");
        let graph = RdfKey::resource("http://example.org/g").expect("key");
        let statements = vec![
            Statement::new(
                subject.clone(),
                "http://example.org/n",
                Node::literal(Literal::typed("3", xsd::INTEGER)),
            )
            .in_graph(Some(graph.clone())),
            Statement::new(
                subject.clone(),
                "http://example.org/l",
                Node::literal(Literal::tagged("chat", "fr")),
            )
            .in_graph(Some(graph.clone())),
        ];
        source.add(&statements).expect("add");

        let mut found = source
            .query(Some(&subject), None, &GraphFilter::Named(graph))
            .expect("query");
        found.sort_by(|a, b| a.predicate.cmp(&b.predicate));
        let mut expected = statements.clone();
        expected.sort_by(|a, b| a.predicate.cmp(&b.predicate));
        assert_eq!(found, expected);
        assert!(source
            .query(Some(&subject), None, &GraphFilter::Default)
            .expect("query")
            .is_empty());
    }

    #[test]
    fn buffered_writes_apply_on_commit_only() {
        let mut source = OxigraphTripleSource::new().expect("store");
        let st = Statement::new(
            RdfKey::resource("http://example.org/a").expect("key"),
            "http://example.org/p",
            Node::resource("http://example.org/b"),
        );
        source.begin().expect("begin");
        source.add(std::slice::from_ref(&st)).expect("add");
        assert_eq!(source.len().expect("len"), 0);
        source.rollback().expect("rollback");
        assert_eq!(source.len().expect("len"), 0);

        source.begin().expect("begin");
        source.add(std::slice::from_ref(&st)).expect("add");
        source.commit().expect("commit");
        assert_eq!(source.len().expect("len"), 1);
    }

    #[test]
    fn turtle_loads_into_default_graph() {
        let source = OxigraphTripleSource::new().expect("store");
        source
            .load_turtle("<http://example.org/a> <http://example.org/p> \"x\" .")
            .expect("load");
        let found = source.query(None, None, &GraphFilter::Default).expect("query");
        assert_eq!(found.len(), 1);
        assert_eq!(
            found[0].object,
            Node::literal(Literal::typed("x", xsd::STRING))
        );
    }
}
