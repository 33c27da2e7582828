//! Property values held by entity instances.

use super::key::RdfKey;
use crate::entity::{EntityHandle, WeakEntity};
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::{Arc, Weak};

/// Non-owning reference from one entity to another.
///
/// The referenced entity is owned elsewhere (by the caller or by an
/// [`ObjectGraph`](crate::convert::ObjectGraph)); a reference whose target was
/// dropped still carries the key it was created with.
#[derive(Clone)]
pub struct EntityRef {
    key: Option<RdfKey>,
    handle: Option<WeakEntity>,
}

impl EntityRef {
    /// Reference to a live instance. The key is captured now if assigned and
    /// read from the instance later otherwise.
    pub fn to(handle: &EntityHandle) -> Self {
        let key = handle.read_recursive().rdf_id().cloned();
        Self {
            key,
            handle: Some(Arc::downgrade(handle)),
        }
    }

    /// Reference by key only, with no instance behind it.
    pub fn key_only(key: RdfKey) -> Self {
        Self {
            key: Some(key),
            handle: None,
        }
    }

    /// Key of the referenced entity.
    ///
    /// Must not be called while the caller holds a write lock on the target.
    pub fn key(&self) -> Option<RdfKey> {
        if self.key.is_some() {
            return self.key.clone();
        }
        self.upgrade()
            .and_then(|h| h.read_recursive().rdf_id().cloned())
    }

    pub fn upgrade(&self) -> Option<EntityHandle> {
        self.handle.as_ref().and_then(Weak::upgrade)
    }

    pub fn is_dangling(&self) -> bool {
        self.upgrade().is_none()
    }
}

impl PartialEq for EntityRef {
    fn eq(&self, other: &Self) -> bool {
        match (self.key(), other.key()) {
            (Some(a), Some(b)) => a == b,
            (None, None) => match (&self.handle, &other.handle) {
                (Some(a), Some(b)) => Weak::ptr_eq(a, b),
                _ => false,
            },
            _ => false,
        }
    }
}

impl fmt::Debug for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.key() {
            Some(key) => write!(f, "EntityRef({key})"),
            None => f.write_str("EntityRef(<unidentified>)"),
        }
    }
}

/// A property value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Iri(String),
    DateTime(DateTime<Utc>),
    Entity(EntityRef),
    /// Ordered, duplicates allowed.
    List(Vec<Value>),
    /// Insertion-ordered, no duplicates.
    Set(Vec<Value>),
}

impl Value {
    pub fn str(value: impl Into<String>) -> Self {
        Value::Str(value.into())
    }

    pub fn entity(handle: &EntityHandle) -> Self {
        Value::Entity(EntityRef::to(handle))
    }

    /// Builds a set, dropping later duplicates.
    pub fn set(items: impl IntoIterator<Item = Value>) -> Self {
        let mut out: Vec<Value> = Vec::new();
        for item in items {
            if !out.contains(&item) {
                out.push(item);
            }
        }
        Value::Set(out)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Value::Bool(_) => "boolean",
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Iri(_) => "iri",
            Value::DateTime(_) => "dateTime",
            Value::Entity(_) => "entity",
            Value::List(_) => "list",
            Value::Set(_) => "set",
        }
    }

    /// Elements of a collection, or the value itself.
    pub fn items(&self) -> &[Value] {
        match self {
            Value::List(items) | Value::Set(items) => items,
            single => std::slice::from_ref(single),
        }
    }

    /// Appends to a collection; sets ignore values already present.
    /// Returns false when `self` is not a collection.
    pub fn push(&mut self, value: Value) -> bool {
        match self {
            Value::List(items) => {
                items.push(value);
                true
            }
            Value::Set(items) => {
                if !items.contains(&value) {
                    items.push(value);
                }
                true
            }
            _ => false,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) | Value::Iri(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_entity(&self) -> Option<&EntityRef> {
        match self {
            Value::Entity(r) => Some(r),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v.into())
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::DateTime(v)
    }
}

impl From<RdfKey> for Value {
    fn from(key: RdfKey) -> Self {
        Value::Entity(EntityRef::key_only(key))
    }
}
