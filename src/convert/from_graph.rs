//! Graph → object conversion.

use super::index::{GraphFilter, StatementIndex};
use super::literal::{self, LiteralError};
use crate::codegen::InstanceGenerator;
use crate::config::ConversionOptions;
use crate::entity::{EntityHandle, EntityType, EntityTypeId, Multiplicity, NamedGraphPolicy};
use crate::error::{MapperError, Result};
use crate::mapping::{MappingMetadata, MetadataResolver, PropertyMapping};
use crate::model::{EntityRef, Node, RdfKey, Statement, Value};
use indexmap::IndexMap;
use std::fmt;
use std::sync::Arc;

/// Something worth knowing about a conversion that did not stop it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionNote {
    pub key: RdfKey,
    pub predicate: Option<String>,
    pub message: String,
}

impl fmt::Display for ConversionNote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.predicate {
            Some(p) => write!(f, "{} <{p}>: {}", self.key, self.message),
            None => write!(f, "{}: {}", self.key, self.message),
        }
    }
}

/// The result of one resolution: the requested entity plus every entity it
/// reached, each built exactly once per (key, type).
///
/// Entities refer to each other weakly, so the graph must be kept alive for
/// nested references to stay resolvable.
pub struct ObjectGraph {
    root: EntityHandle,
    entities: IndexMap<(RdfKey, EntityTypeId), EntityHandle>,
    notes: Vec<ConversionNote>,
}

impl ObjectGraph {
    pub fn root(&self) -> &EntityHandle {
        &self.root
    }

    /// First entity built for `key`, whatever its type.
    pub fn get(&self, key: &RdfKey) -> Option<&EntityHandle> {
        self.entities
            .iter()
            .find_map(|((k, _), h)| (k == key).then_some(h))
    }

    pub fn get_as(&self, key: &RdfKey, ty: &EntityType) -> Option<&EntityHandle> {
        self.entities.get(&(key.clone(), ty.id()))
    }

    /// Every entity, in the order resolution started building them.
    pub fn entities(&self) -> impl Iterator<Item = &EntityHandle> {
        self.entities.values()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn notes(&self) -> &[ConversionNote] {
        &self.notes
    }
}

impl fmt::Debug for ObjectGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectGraph")
            .field("root", &*self.root.read_recursive())
            .field("entities", &self.entities.len())
            .field("notes", &self.notes)
            .finish()
    }
}

struct Resolution<'s> {
    index: StatementIndex<'s>,
    memo: IndexMap<(RdfKey, EntityTypeId), EntityHandle>,
    notes: Vec<ConversionNote>,
}

/// Builds entity instances from a statement snapshot.
pub struct GraphReader<'a> {
    resolver: &'a MetadataResolver,
    generator: &'a InstanceGenerator,
    options: ConversionOptions,
}

impl<'a> GraphReader<'a> {
    pub fn new(
        resolver: &'a MetadataResolver,
        generator: &'a InstanceGenerator,
        options: ConversionOptions,
    ) -> Self {
        Self {
            resolver,
            generator,
            options,
        }
    }

    /// Builds the entity `key` as `ty`, resolving nested references
    /// recursively.
    ///
    /// # Errors
    /// `InvalidKey` when `key` or a referenced object is not a valid key;
    /// `NotFound` when nothing is said about `key` and the type does not
    /// construct empty instances; `Typing` when a literal does not fit its
    /// property; `Mapping`/`Shape` when a reached type cannot be mapped or
    /// generated.
    pub fn resolve(
        &self,
        key: &RdfKey,
        ty: &Arc<EntityType>,
        statements: &[Statement],
    ) -> Result<ObjectGraph> {
        let _span =
            tracing::debug_span!("resolve", key = %key, entity_type = ty.name()).entered();
        key.validate().map_err(|e| e.track("resolve"))?;
        let mut state = Resolution {
            index: StatementIndex::new(statements),
            memo: IndexMap::new(),
            notes: Vec::new(),
        };
        let root = self
            .resolve_entity(&mut state, key, ty, true)
            .map_err(|e| e.track("resolve"))?;
        tracing::debug!(
            entities = state.memo.len(),
            notes = state.notes.len(),
            "resolved object graph"
        );
        Ok(ObjectGraph {
            root,
            entities: state.memo,
            notes: state.notes,
        })
    }

    fn graph_filter(meta: &MappingMetadata, key: &RdfKey) -> GraphFilter {
        match &meta.named_graph {
            NamedGraphPolicy::None => GraphFilter::Any,
            NamedGraphPolicy::Instance => GraphFilter::Named(key.clone()),
            NamedGraphPolicy::Static(iri) => GraphFilter::Named(RdfKey::Resource(iri.clone())),
        }
    }

    fn resolve_entity(
        &self,
        state: &mut Resolution<'_>,
        key: &RdfKey,
        ty: &Arc<EntityType>,
        top_level: bool,
    ) -> Result<EntityHandle> {
        let memo_key = (key.clone(), ty.id());
        if let Some(existing) = state.memo.get(&memo_key) {
            return Ok(existing.clone());
        }

        let meta = self.resolver.resolve(ty)?;
        let filter = Self::graph_filter(&meta, key);
        let known = state.index.has_subject(key, &filter);
        if !known {
            if top_level && !ty.construct_when_absent() {
                return Err(MapperError::NotFound {
                    key: key.clone(),
                    entity_type: ty.name().to_string(),
                });
            }
            if !top_level {
                tracing::warn!(key = %key, entity_type = ty.name(), "dangling reference");
                state.notes.push(ConversionNote {
                    key: key.clone(),
                    predicate: None,
                    message: format!("no statements; built an empty {}", ty.name()),
                });
            }
        }

        let handle = self.generator.instantiate(ty)?;
        handle.write().set_rdf_id(key.clone());
        state.memo.insert(memo_key, handle.clone());
        if !known {
            return Ok(handle);
        }

        let mut assignments: Vec<(&str, Value)> = Vec::new();
        for mapping in &meta.properties {
            if let Some(value) = self.property_value(state, key, mapping, &filter)? {
                assignments.push((mapping.property.name.as_str(), value));
            }
        }

        let mut entity = handle.write();
        for (name, value) in assignments {
            entity.set_property(name, value)?;
        }
        drop(entity);
        Ok(handle)
    }

    fn property_value(
        &self,
        state: &mut Resolution<'_>,
        key: &RdfKey,
        mapping: &PropertyMapping,
        filter: &GraphFilter,
    ) -> Result<Option<Value>> {
        let statements = state.index.select(key, &mapping.predicate, filter);
        let mut values = Vec::with_capacity(statements.len());

        for st in statements {
            let value = match &mapping.property.target {
                Some(target) => {
                    let Some(child_key) = st.object.as_key()? else {
                        let reason = LiteralError::Malformed(format!(
                            "expected a reference to a {}",
                            target.name()
                        ));
                        return Err(self.typing_error(key, mapping, &st.object, reason));
                    };
                    let child = self.resolve_entity(state, &child_key, target, false)?;
                    Value::Entity(EntityRef::to(&child))
                }
                None => {
                    if let (true, Some(wanted), Node::Literal(lit)) =
                        (self.options.language_aware, &mapping.language, &st.object)
                    {
                        let matches = lit
                            .language
                            .as_deref()
                            .is_some_and(|tag| tag.eq_ignore_ascii_case(wanted));
                        if !matches {
                            tracing::trace!(
                                key = %key,
                                predicate = %mapping.predicate,
                                "language filtered"
                            );
                            continue;
                        }
                    }
                    literal::node_to_value(&st.object, mapping, self.options.strict_typing)
                        .map_err(|e| self.typing_error(key, mapping, &st.object, e))?
                }
            };
            values.push(value);
        }

        if values.is_empty() {
            return Ok(None);
        }
        let value = match mapping.property.multiplicity {
            Multiplicity::Single => {
                if values.len() > 1 {
                    tracing::debug!(
                        key = %key,
                        predicate = %mapping.predicate,
                        candidates = values.len(),
                        "single-valued property has several values; keeping the first"
                    );
                    state.notes.push(ConversionNote {
                        key: key.clone(),
                        predicate: Some(mapping.predicate.clone()),
                        message: format!(
                            "{} values for a single-valued property; kept the first",
                            values.len()
                        ),
                    });
                }
                values.swap_remove(0)
            }
            Multiplicity::List => Value::List(values),
            Multiplicity::Set => Value::set(values),
        };
        Ok(Some(value))
    }

    fn typing_error(
        &self,
        key: &RdfKey,
        mapping: &PropertyMapping,
        node: &Node,
        err: LiteralError,
    ) -> MapperError {
        MapperError::Typing {
            key: key.clone(),
            predicate: mapping.predicate.clone(),
            literal: node.to_string(),
            expected: mapping.property.value_type.to_string(),
            reason: err.to_string(),
        }
    }
}
