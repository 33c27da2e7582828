//! Object → graph conversion.

use super::literal;
use crate::config::ConversionOptions;
use crate::entity::{Entity, EntityHandle, Multiplicity};
use crate::error::{MapperError, Result};
use crate::mapping::MetadataResolver;
use crate::model::vocab::RDF_TYPE;
use crate::model::{EntityRef, Node, RdfKey, Statement, Value};
use std::collections::HashSet;

/// Turns entity instances into statements.
pub struct GraphWriter<'a> {
    resolver: &'a MetadataResolver,
    options: ConversionOptions,
}

impl<'a> GraphWriter<'a> {
    pub fn new(resolver: &'a MetadataResolver, options: ConversionOptions) -> Self {
        Self { resolver, options }
    }

    /// Statements for `entity` and everything it reaches.
    pub fn serialize(&self, entity: &dyn Entity) -> Result<Vec<Statement>> {
        let mut visited = HashSet::new();
        let mut out = Vec::new();
        self.serialize_into(entity, &mut visited, &mut out)
            .map_err(|e| e.track("serialize"))?;
        Ok(out)
    }

    pub fn serialize_handle(&self, handle: &EntityHandle) -> Result<Vec<Statement>> {
        let entity = handle.read_recursive();
        self.serialize(&*entity)
    }

    /// Appends one contiguous block for `entity` (type statement, then
    /// literals, then references), then the blocks of nested entities not yet
    /// in `visited`.
    ///
    /// List elements are written as repeated statements, so a list that
    /// holds the same element twice is rejected.
    ///
    /// Nested entities reachable only through a key, or whose instance was
    /// dropped, contribute the reference statement and nothing else.
    pub fn serialize_into(
        &self,
        entity: &dyn Entity,
        visited: &mut HashSet<RdfKey>,
        out: &mut Vec<Statement>,
    ) -> Result<()> {
        let ty = entity.entity_type();
        let key = entity.rdf_id().cloned().ok_or_else(|| {
            MapperError::conversion(ty.name(), None, "instance has no rdf id")
        })?;
        if !visited.insert(key.clone()) {
            return Ok(());
        }

        let meta = self.resolver.resolve(&ty)?;
        let context = meta.context_for(&key);
        let strict = self.options.strict_typing;

        let type_statement = Statement::new(
            key.clone(),
            RDF_TYPE,
            Node::resource(meta.class_iri.clone()),
        );
        let mut scalars: Vec<Statement> = Vec::new();
        let mut references: Vec<Statement> = Vec::new();
        let mut nested: Vec<EntityRef> = Vec::new();

        for mapping in &meta.properties {
            let name = mapping.property.name.as_str();
            let Some(value) = entity.property(name) else {
                continue;
            };
            let value = mapping.property.type_expr().coerce(&value).ok_or_else(|| {
                MapperError::conversion(
                    ty.name(),
                    Some(&key),
                    format!(
                        "{name} holds a {} but is declared {}",
                        value.kind(),
                        mapping.property.type_expr()
                    ),
                )
            })?;

            let mut written: HashSet<Node> = HashSet::new();
            for item in value.items() {
                let (object, is_reference) = match item {
                    Value::Entity(reference) => {
                        let child = reference.key().ok_or_else(|| {
                            MapperError::conversion(
                                ty.name(),
                                Some(&key),
                                format!("{name} refers to an entity with no rdf id"),
                            )
                        })?;
                        nested.push(reference.clone());
                        (Node::from(&child), true)
                    }
                    scalar => {
                        let node = literal::value_to_node(scalar, mapping, strict).ok_or_else(|| {
                            MapperError::conversion(
                                ty.name(),
                                Some(&key),
                                format!("{} cannot be written as a literal", scalar.kind()),
                            )
                        })?;
                        (node, false)
                    }
                };
                if !written.insert(object.clone())
                    && mapping.property.multiplicity == Multiplicity::List
                {
                    return Err(MapperError::conversion(
                        ty.name(),
                        Some(&key),
                        format!("list {name} repeats {object}; repeated statements collapse"),
                    ));
                }

                let statement = Statement::new(key.clone(), mapping.predicate.clone(), object);
                let target = if is_reference { &mut references } else { &mut scalars };
                if !target.contains(&statement) {
                    target.push(statement);
                }
            }
        }

        let block: Vec<Statement> = std::iter::once(type_statement)
            .chain(scalars)
            .chain(references)
            .collect();
        tracing::trace!(key = %key, statements = block.len(), "serialized entity");
        out.extend(block.into_iter().map(|st| st.in_graph(context.clone())));

        for reference in nested {
            let Some(child) = reference.upgrade() else {
                continue;
            };
            let child = child.read_recursive();
            self.serialize_into(&*child, visited, out)?;
        }
        Ok(())
    }
}
