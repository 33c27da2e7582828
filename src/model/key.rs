//! Entity identity: resolvable IRIs and blank-node identifiers.

use crate::error::{MapperError, Result};
use oxigraph::model::NamedNode;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Primary key of a mapped entity.
///
/// A `Resource` key is an absolute IRI and is stable across graphs. An
/// `Anonymous` key is a blank-node label that is only meaningful inside the
/// graph or session that produced it. Equality is structural: the same text
/// under different variants names different entities.
///
/// # Example
/// ```rust,ignore
/// let key = RdfKey::resource("http://example.org/people/ada")?;
/// assert!(key.is_resource());
/// assert_eq!(key.value(), "http://example.org/people/ada");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum RdfKey {
    Resource(String),
    Anonymous(String),
}

impl RdfKey {
    /// Creates a resource key.
    ///
    /// # Errors
    /// Returns `InvalidKey` if the IRI is empty or not absolute.
    pub fn resource(iri: impl Into<String>) -> Result<Self> {
        let iri = iri.into();
        if iri.is_empty() {
            return Err(MapperError::invalid_key(iri, "resource key must not be empty"));
        }
        NamedNode::new(iri.as_str())
            .map_err(|e| MapperError::invalid_key(iri.as_str(), e.to_string()))?;
        Ok(Self::Resource(iri))
    }

    /// Creates a blank-node key.
    ///
    /// # Errors
    /// Returns `InvalidKey` if the id is empty or contains whitespace.
    pub fn anonymous(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(MapperError::invalid_key(id, "anonymous key must not be empty"));
        }
        if id.chars().any(char::is_whitespace) {
            return Err(MapperError::invalid_key(
                id,
                "anonymous key must not contain whitespace",
            ));
        }
        Ok(Self::Anonymous(id))
    }

    /// Re-checks a key that may have been built without its constructor.
    ///
    /// # Errors
    /// Same as [`resource`](Self::resource) and [`anonymous`](Self::anonymous).
    pub fn validate(&self) -> Result<()> {
        match self {
            RdfKey::Resource(iri) => Self::resource(iri.as_str()).map(drop),
            RdfKey::Anonymous(id) => Self::anonymous(id.as_str()).map(drop),
        }
    }

    /// Fresh blank-node key, unique for the life of the process.
    pub fn generate_anonymous() -> Self {
        Self::Anonymous(uuid::Uuid::new_v4().simple().to_string())
    }

    /// Mints `namespace` + a random UUID as a resource key.
    pub fn mint(namespace: &str) -> Result<Self> {
        Self::resource(format!("{namespace}{}", uuid::Uuid::new_v4()))
    }

    pub fn value(&self) -> &str {
        match self {
            RdfKey::Resource(v) | RdfKey::Anonymous(v) => v,
        }
    }

    pub fn is_resource(&self) -> bool {
        matches!(self, RdfKey::Resource(_))
    }

    pub fn is_anonymous(&self) -> bool {
        matches!(self, RdfKey::Anonymous(_))
    }
}

impl fmt::Display for RdfKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RdfKey::Resource(iri) => f.write_str(iri),
            RdfKey::Anonymous(id) => write!(f, "_:{id}"),
        }
    }
}

impl FromStr for RdfKey {
    type Err = MapperError;

    /// `_:label` parses as anonymous, anything else as a resource IRI.
    fn from_str(s: &str) -> Result<Self> {
        match s.strip_prefix("_:") {
            Some(id) => Self::anonymous(id),
            None => Self::resource(s),
        }
    }
}

impl AsRef<str> for RdfKey {
    fn as_ref(&self) -> &str {
        self.value()
    }
}
