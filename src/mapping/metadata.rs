//! Resolved mapping records.

use crate::entity::{
    EntityType, EntityTypeId, IdStrategy, Multiplicity, NamedGraphPolicy, TypeExpr, ValueType,
};
use crate::model::RdfKey;
use std::fmt;
use std::sync::Arc;

/// The property side of a mapping.
#[derive(Clone)]
pub struct PropertyDescriptor {
    pub name: String,
    pub value_type: ValueType,
    pub multiplicity: Multiplicity,
    /// Declared target of an entity-valued property.
    pub target: Option<Arc<EntityType>>,
}

impl PropertyDescriptor {
    pub fn type_expr(&self) -> TypeExpr {
        TypeExpr {
            value_type: self.value_type.clone(),
            multiplicity: self.multiplicity,
            wildcard: false,
        }
    }
}

impl fmt::Debug for PropertyDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyDescriptor")
            .field("name", &self.name)
            .field("value_type", &self.value_type)
            .field("multiplicity", &self.multiplicity)
            .finish()
    }
}

/// One predicate ↔ property binding with every IRI expanded.
#[derive(Debug, Clone)]
pub struct PropertyMapping {
    pub predicate: String,
    pub property: PropertyDescriptor,
    pub language: Option<String>,
    pub datatype: Option<String>,
}

impl PropertyMapping {
    pub fn is_entity(&self) -> bool {
        self.property.value_type.is_entity()
    }
}

/// Everything the converters need to know about one entity type.
#[derive(Debug, Clone)]
pub struct MappingMetadata {
    pub entity_type: String,
    pub type_id: EntityTypeId,
    pub class_iri: String,
    /// Inherited mappings first, in declaration order.
    pub properties: Vec<PropertyMapping>,
    pub named_graph: NamedGraphPolicy,
    pub id_strategy: IdStrategy,
}

impl MappingMetadata {
    pub fn property(&self, name: &str) -> Option<&PropertyMapping> {
        self.properties.iter().find(|p| p.property.name == name)
    }

    pub fn by_predicate<'a>(
        &'a self,
        predicate: &'a str,
    ) -> impl Iterator<Item = &'a PropertyMapping> {
        self.properties.iter().filter(move |p| p.predicate == predicate)
    }

    /// Graph an instance with `key` lives in; `None` is the default graph.
    pub fn context_for(&self, key: &RdfKey) -> Option<RdfKey> {
        match &self.named_graph {
            NamedGraphPolicy::None => None,
            NamedGraphPolicy::Instance => Some(key.clone()),
            NamedGraphPolicy::Static(iri) => Some(RdfKey::Resource(iri.clone())),
        }
    }
}
