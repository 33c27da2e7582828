//! Statements and the nodes they connect.

use super::key::RdfKey;
use super::vocab::xsd;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A literal: lexical form plus optional datatype IRI or language tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Literal {
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datatype: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl Literal {
    /// Untyped, untagged literal.
    pub fn plain(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            datatype: None,
            language: None,
        }
    }

    pub fn typed(value: impl Into<String>, datatype: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            datatype: Some(datatype.into()),
            language: None,
        }
    }

    pub fn tagged(value: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            datatype: None,
            language: Some(language.into()),
        }
    }

    /// Plain literals and `xsd:string` both carry simple strings.
    pub fn is_simple_string(&self) -> bool {
        self.language.is_none()
            && self
                .datatype
                .as_deref()
                .is_none_or(|dt| dt == xsd::STRING)
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.value)?;
        if let Some(lang) = &self.language {
            write!(f, "@{lang}")
        } else if let Some(dt) = &self.datatype {
            write!(f, "^^<{dt}>")
        } else {
            Ok(())
        }
    }
}

/// Object position of a statement.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Node {
    Resource { iri: String },
    Anonymous { id: String },
    Literal(Literal),
}

impl Node {
    pub fn resource(iri: impl Into<String>) -> Self {
        Node::Resource { iri: iri.into() }
    }

    pub fn literal(literal: Literal) -> Self {
        Node::Literal(literal)
    }

    /// The key this node refers to; `None` for literals.
    ///
    /// # Errors
    /// `InvalidKey` when the node names an empty or malformed key.
    pub fn as_key(&self) -> Result<Option<RdfKey>> {
        match self {
            Node::Resource { iri } => RdfKey::resource(iri.as_str()).map(Some),
            Node::Anonymous { id } => RdfKey::anonymous(id.as_str()).map(Some),
            Node::Literal(_) => Ok(None),
        }
    }

    pub fn as_literal(&self) -> Option<&Literal> {
        match self {
            Node::Literal(lit) => Some(lit),
            _ => None,
        }
    }
}

impl From<&RdfKey> for Node {
    fn from(key: &RdfKey) -> Self {
        match key {
            RdfKey::Resource(iri) => Node::Resource { iri: iri.clone() },
            RdfKey::Anonymous(id) => Node::Anonymous { id: id.clone() },
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Resource { iri } => write!(f, "<{iri}>"),
            Node::Anonymous { id } => write!(f, "_:{id}"),
            Node::Literal(lit) => lit.fmt(f),
        }
    }
}

/// One triple, optionally placed in a named graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Statement {
    pub subject: RdfKey,
    pub predicate: String,
    pub object: Node,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<RdfKey>,
}

impl Statement {
    pub fn new(subject: RdfKey, predicate: impl Into<String>, object: Node) -> Self {
        Self {
            subject,
            predicate: predicate.into(),
            object,
            context: None,
        }
    }

    pub fn in_graph(mut self, context: Option<RdfKey>) -> Self {
        self.context = context;
        self
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let subject = Node::from(&self.subject);
        write!(f, "{subject} <{}> {}", self.predicate, self.object)?;
        if let Some(ctx) = &self.context {
            write!(f, " {}", Node::from(ctx))?;
        }
        f.write_str(" .")
    }
}
