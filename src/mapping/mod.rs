//! Mapping metadata: turning entity type declarations into predicate tables.
//!
//! Metadata is derived once per type and shared. A declaration that cannot be
//! mapped fails with [`MapperError::Mapping`]; failures are not cached, so a
//! type can be fixed up (for example by registering a missing nested type) and
//! resolved again.

pub mod metadata;

pub use metadata::{MappingMetadata, PropertyDescriptor, PropertyMapping};

use crate::entity::{EntityType, EntityTypeId, IdStrategy, NamedGraphPolicy, ValueType, registry};
use crate::error::{MapperError, Result};
use crate::model::PrefixMapping;
use once_cell::sync::{Lazy, OnceCell};
use oxigraph::model::NamedNode;
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

static GLOBAL_RESOLVER: Lazy<Arc<MetadataResolver>> =
    Lazy::new(|| Arc::new(MetadataResolver::new()));

/// Cache statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub size: usize,
    pub hits: u64,
    pub misses: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

type Slot<T> = Arc<OnceCell<Arc<T>>>;

/// Write-once-per-key cache: concurrent callers asking for the same key see
/// exactly one successful construction. A failed construction leaves the
/// slot empty.
pub(crate) struct OnceMap<T> {
    slots: RwLock<HashMap<EntityTypeId, Slot<T>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<T> OnceMap<T> {
    pub(crate) fn new() -> Self {
        Self {
            slots: RwLock::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub(crate) fn get_or_try_init<F>(&self, id: EntityTypeId, init: F) -> Result<Arc<T>>
    where
        F: FnOnce() -> Result<T>,
    {
        let slot = {
            let slots = self.slots.read();
            slots.get(&id).cloned()
        };
        let slot = match slot {
            Some(slot) => slot,
            None => self.slots.write().entry(id).or_default().clone(),
        };

        // Only the caller whose closure runs counts as a miss; callers that
        // waited on it count as hits.
        let mut built = false;
        let result = slot
            .get_or_try_init(|| {
                built = true;
                init().map(Arc::new)
            })
            .cloned();
        let counter = if built { &self.misses } else { &self.hits };
        counter.fetch_add(1, Ordering::Relaxed);
        result
    }

    pub(crate) fn stats(&self) -> CacheStats {
        CacheStats {
            size: self.slots.read().values().filter(|s| s.get().is_some()).count(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

/// Derives and caches [`MappingMetadata`] per entity type.
pub struct MetadataResolver {
    cache: OnceMap<MappingMetadata>,
    prefixes: Option<PrefixMapping>,
}

impl MetadataResolver {
    /// Resolver that expands compact IRIs with the global prefix table.
    pub fn new() -> Self {
        Self {
            cache: OnceMap::new(),
            prefixes: None,
        }
    }

    /// Resolver with its own prefix table.
    pub fn with_prefixes(prefixes: PrefixMapping) -> Self {
        Self {
            cache: OnceMap::new(),
            prefixes: Some(prefixes),
        }
    }

    /// The process-wide resolver.
    pub fn global() -> &'static Arc<MetadataResolver> {
        &GLOBAL_RESOLVER
    }

    pub fn resolve(&self, ty: &Arc<EntityType>) -> Result<Arc<MappingMetadata>> {
        self.cache
            .get_or_try_init(ty.id(), || {
                let prefixes = match &self.prefixes {
                    Some(p) => p.clone(),
                    None => PrefixMapping::global(),
                };
                let metadata = build_metadata(ty, &prefixes)?;
                tracing::debug!(
                    entity_type = ty.name(),
                    class = %metadata.class_iri,
                    properties = metadata.properties.len(),
                    "mapping metadata resolved"
                );
                Ok(metadata)
            })
            .map_err(|e| e.track("resolve_metadata"))
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }
}

impl Default for MetadataResolver {
    fn default() -> Self {
        Self::new()
    }
}

fn expand_iri(ty: &EntityType, prefixes: &PrefixMapping, what: &str, raw: &str) -> Result<String> {
    let iri = prefixes.expand(raw);
    NamedNode::new(iri.as_str()).map_err(|e| {
        MapperError::mapping(ty.name(), format!("{what} {raw:?} is not an absolute IRI: {e}"))
    })?;
    Ok(iri)
}

fn build_metadata(ty: &Arc<EntityType>, prefixes: &PrefixMapping) -> Result<MappingMetadata> {
    let class_raw = ty
        .class_iri()
        .ok_or_else(|| MapperError::mapping(ty.name(), "no RDF class declared"))?;
    let class_iri = expand_iri(ty, prefixes, "class", class_raw)?;
    let namespace = class_iri
        .rfind(['#', '/'])
        .map(|cut| class_iri[..=cut].to_string());

    let mut properties: Vec<PropertyMapping> = Vec::new();
    for decl in ty.all_properties() {
        let predicate = match &decl.predicate {
            Some(p) => expand_iri(ty, prefixes, "predicate", p)?,
            None => {
                let ns = namespace.as_deref().ok_or_else(|| {
                    MapperError::mapping(
                        ty.name(),
                        format!(
                            "property {} has no predicate and the class has no namespace",
                            decl.name
                        ),
                    )
                })?;
                expand_iri(ty, prefixes, "predicate", &format!("{ns}{}", decl.name))?
            }
        };

        let target = match &decl.value_type {
            ValueType::Entity(name) => Some(registry::lookup(name).ok_or_else(|| {
                MapperError::mapping(
                    ty.name(),
                    format!("property {} refers to unregistered entity type {name}", decl.name),
                )
            })?),
            ValueType::Key | ValueType::Opaque(_) => {
                return Err(MapperError::mapping(
                    ty.name(),
                    format!("property {} has unmappable type {}", decl.name, decl.value_type),
                ));
            }
            _ => None,
        };

        if target.is_some() && (decl.datatype.is_some() || decl.language.is_some()) {
            return Err(MapperError::mapping(
                ty.name(),
                format!("entity property {} cannot carry a datatype or language", decl.name),
            ));
        }
        if decl.language.is_some() && decl.value_type != ValueType::String {
            return Err(MapperError::mapping(
                ty.name(),
                format!("language tag on non-string property {}", decl.name),
            ));
        }
        let datatype = decl
            .datatype
            .as_deref()
            .map(|dt| expand_iri(ty, prefixes, "datatype", dt))
            .transpose()?;

        if let Some(other) = properties.iter().find(|p| p.predicate == predicate) {
            if other.property.multiplicity != decl.multiplicity
                || other.property.value_type != decl.value_type
            {
                return Err(MapperError::mapping(
                    ty.name(),
                    format!(
                        "properties {} and {} both map <{predicate}> with different shapes",
                        other.property.name, decl.name
                    ),
                ));
            }
        }

        properties.push(PropertyMapping {
            predicate,
            property: PropertyDescriptor {
                name: decl.name.clone(),
                value_type: decl.value_type.clone(),
                multiplicity: decl.multiplicity,
                target,
            },
            language: decl.language.clone(),
            datatype,
        });
    }

    let named_graph = match ty.named_graph() {
        NamedGraphPolicy::Static(raw) => {
            NamedGraphPolicy::Static(expand_iri(ty, prefixes, "named graph", raw)?)
        }
        other => other.clone(),
    };
    let id_strategy = match ty.id_strategy() {
        IdStrategy::Generated { namespace } => IdStrategy::Generated {
            namespace: prefixes.expand(namespace),
        },
        other => other.clone(),
    };

    Ok(MappingMetadata {
        entity_type: ty.name().to_string(),
        type_id: ty.id(),
        class_iri,
        properties,
        named_graph,
        id_strategy,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::PropertyDecl;
    use assert_matches::assert_matches;

    fn prefixes() -> PrefixMapping {
        let mut p = PrefixMapping::standard();
        p.insert("ex", "http://example.org/");
        p
    }

    #[test]
    fn expands_compact_iris_and_infers_predicates() {
        let ty = EntityType::builder("mapping::Book")
            .class("ex:Book")
            .property(PropertyDecl::single("title", "ex:title", ValueType::String).language("en"))
            .property(PropertyDecl::inferred("pages", ValueType::Integer))
            .property(
                PropertyDecl::single("isbn", "ex:isbn", ValueType::String).datatype("xsd:string"),
            )
            .build();

        let meta = MetadataResolver::with_prefixes(prefixes()).resolve(&ty).expect("resolve");
        assert_eq!(meta.class_iri, "http://example.org/Book");
        let predicates: Vec<_> = meta.properties.iter().map(|p| p.predicate.as_str()).collect();
        assert_eq!(
            predicates,
            [
                "http://example.org/title",
                "http://example.org/pages",
                "http://example.org/isbn"
            ]
        );
        assert_eq!(
            meta.property("isbn").and_then(|p| p.datatype.as_deref()),
            Some("http://www.w3.org/2001/XMLSchema#string")
        );
    }

    #[test]
    fn missing_class_is_a_mapping_error() {
        let ty = EntityType::builder("mapping::NoClass").build();
        assert_matches!(MetadataResolver::new().resolve(&ty), Err(MapperError::Mapping { .. }));
    }

    #[test]
    fn conflicting_predicate_shapes_are_rejected() {
        let ty = EntityType::builder("mapping::Conflict")
            .class("http://example.org/C")
            .property(PropertyDecl::single("a", "http://example.org/p", ValueType::String))
            .property(PropertyDecl::list("b", "http://example.org/p", ValueType::String))
            .build();
        assert_matches!(MetadataResolver::new().resolve(&ty), Err(MapperError::Mapping { .. }));
    }

    #[test]
    fn opaque_and_unregistered_targets_are_rejected() {
        let opaque = EntityType::builder("mapping::Opaque")
            .class("http://example.org/O")
            .property(PropertyDecl::single(
                "blob",
                "http://example.org/blob",
                ValueType::Opaque("Blob".into()),
            ))
            .build();
        assert_matches!(MetadataResolver::new().resolve(&opaque), Err(MapperError::Mapping { .. }));

        let dangling = EntityType::builder("mapping::Dangling")
            .class("http://example.org/D")
            .property(PropertyDecl::single(
                "x",
                "http://example.org/x",
                ValueType::entity("mapping::Nowhere"),
            ))
            .build();
        assert_matches!(
            MetadataResolver::new().resolve(&dangling),
            Err(MapperError::Mapping { .. })
        );
    }

    #[test]
    fn failures_are_not_cached() {
        let resolver = MetadataResolver::new();
        let ty = EntityType::builder("mapping::Later")
            .class("http://example.org/L")
            .property(PropertyDecl::single(
                "t",
                "http://example.org/t",
                ValueType::entity("mapping::LaterTarget"),
            ))
            .build();
        assert!(resolver.resolve(&ty).is_err());

        EntityType::builder("mapping::LaterTarget")
            .class("http://example.org/T")
            .register()
            .expect("register");
        assert!(resolver.resolve(&ty).is_ok());
    }

    #[test]
    fn repeated_resolution_hits_the_cache() {
        let resolver = MetadataResolver::new();
        let ty = EntityType::builder("mapping::Cached")
            .class("http://example.org/Cached")
            .build();
        let a = resolver.resolve(&ty).expect("first");
        let b = resolver.resolve(&ty).expect("second");
        assert!(Arc::ptr_eq(&a, &b));
        let stats = resolver.stats();
        assert_eq!((stats.size, stats.hits, stats.misses), (1, 1, 1));
    }

    #[test]
    fn static_graph_is_expanded() {
        let ty = EntityType::builder("mapping::Graphed")
            .class("ex:G")
            .named_graph(NamedGraphPolicy::Static("ex:graph".into()))
            .build();
        let meta = MetadataResolver::with_prefixes(prefixes()).resolve(&ty).expect("resolve");
        assert_eq!(meta.named_graph, NamedGraphPolicy::Static("http://example.org/graph".into()));
    }
}
