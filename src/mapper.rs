//! The mapper facade: conversion plus entity-manager operations over a
//! [`TripleSource`].

use crate::codegen::{GeneratedClass, InstanceGenerator};
use crate::config::{ConversionOptions, GLOBAL_OPTIONS, MapperConfig};
use crate::convert::{GraphFilter, GraphReader, GraphWriter, ObjectGraph};
use crate::entity::{Entity, EntityHandle, EntityType, IdStrategy};
use crate::error::{MapperError, Result};
use crate::logging::operation_span;
use crate::mapping::{MappingMetadata, MetadataResolver};
use crate::model::{RdfKey, Statement};
use crate::source::{TripleSource, in_transaction};
use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Entry point for converting between entities and statements.
///
/// By default the mapper shares the process-wide metadata cache and
/// generated-class cache, and reads [`GLOBAL_OPTIONS`] at the start of every
/// call.
#[derive(Clone)]
pub struct RdfMapper {
    resolver: Arc<MetadataResolver>,
    generator: Arc<InstanceGenerator>,
    options: Option<ConversionOptions>,
    config: MapperConfig,
}

impl Default for RdfMapper {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RdfMapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RdfMapper")
            .field("metadata_cache", &self.resolver.stats())
            .field("class_cache", &self.generator.stats())
            .field("options", &self.options)
            .field("config", &self.config)
            .finish()
    }
}

impl RdfMapper {
    pub fn new() -> Self {
        Self {
            resolver: MetadataResolver::global().clone(),
            generator: InstanceGenerator::global().clone(),
            options: None,
            config: MapperConfig::default(),
        }
    }

    /// Loads configuration from `path` (when given) and the `RDFBIND_*`
    /// environment, installs its options and prefixes process-wide, and
    /// returns a mapper that uses it.
    pub fn configured(path: Option<&Path>) -> Result<Self> {
        let config = MapperConfig::load(path)
            .map_err(|e| MapperError::Config(format!("{e:#}")).track("configure"))?;
        config.apply();
        Ok(Self::new().with_config(config))
    }

    /// Mapper with its own caches, isolated from every other mapper.
    pub fn isolated() -> Self {
        Self {
            resolver: Arc::new(MetadataResolver::new()),
            generator: Arc::new(InstanceGenerator::new()),
            ..Self::new()
        }
    }

    /// Uses `config` for describe depth and key namespaces. Conversion
    /// options still come from the globals unless fixed with
    /// [`with_options`](Self::with_options).
    pub fn with_config(mut self, config: MapperConfig) -> Self {
        self.config = config;
        self
    }

    /// Pins the conversion options instead of reading the globals.
    pub fn with_options(mut self, options: ConversionOptions) -> Self {
        self.options = Some(options);
        self
    }

    pub fn options(&self) -> ConversionOptions {
        self.options.unwrap_or_else(|| GLOBAL_OPTIONS.snapshot())
    }

    pub fn config(&self) -> &MapperConfig {
        &self.config
    }

    pub fn metadata(&self, ty: &Arc<EntityType>) -> Result<Arc<MappingMetadata>> {
        self.resolver.resolve(ty)
    }

    // ========================================================================
    // Conversion
    // ========================================================================

    /// Builds entity `key` of type `ty` from `statements`.
    pub fn resolve(
        &self,
        key: &RdfKey,
        ty: &Arc<EntityType>,
        statements: &[Statement],
    ) -> Result<ObjectGraph> {
        GraphReader::new(&self.resolver, &self.generator, self.options())
            .resolve(key, ty, statements)
    }

    /// Statements for `entity` and every entity it reaches.
    pub fn serialize(&self, entity: &dyn Entity) -> Result<Vec<Statement>> {
        GraphWriter::new(&self.resolver, self.options()).serialize(entity)
    }

    pub fn serialize_handle(&self, handle: &EntityHandle) -> Result<Vec<Statement>> {
        GraphWriter::new(&self.resolver, self.options()).serialize_handle(handle)
    }

    pub fn implementation_for(&self, interface: &Arc<EntityType>) -> Result<Arc<GeneratedClass>> {
        self.generator.implementation_for(interface)
    }

    /// New empty instance of `ty`, without a key.
    pub fn create(&self, ty: &Arc<EntityType>) -> Result<EntityHandle> {
        self.generator.instantiate(ty)
    }

    /// Gives `entity` a key according to its type's id strategy, unless it
    /// already has one.
    ///
    /// # Errors
    /// `Conversion` for `Assigned` types without a key, and for generated
    /// keys with no namespace from either the type or the configuration.
    pub fn assign_id(&self, entity: &mut dyn Entity) -> Result<RdfKey> {
        if let Some(key) = entity.rdf_id() {
            return Ok(key.clone());
        }
        let ty = entity.entity_type();
        let meta = self.resolver.resolve(&ty)?;
        let key = match &meta.id_strategy {
            IdStrategy::Assigned => {
                return Err(MapperError::conversion(
                    ty.name(),
                    None,
                    "type requires an assigned rdf id",
                ));
            }
            IdStrategy::Anonymous => RdfKey::generate_anonymous(),
            IdStrategy::Generated { namespace } => {
                let namespace = Some(namespace.as_str())
                    .filter(|ns| !ns.is_empty())
                    .or(self.config.default_namespace.as_deref())
                    .ok_or_else(|| {
                        MapperError::conversion(
                            ty.name(),
                            None,
                            "no namespace to generate an rdf id in",
                        )
                    })?;
                RdfKey::mint(namespace)?
            }
        };
        tracing::debug!(entity_type = ty.name(), key = %key, "assigned rdf id");
        entity.set_rdf_id(key.clone());
        Ok(key)
    }

    // ========================================================================
    // Entity manager
    // ========================================================================

    /// Statements about `key` and everything reachable from it within the
    /// configured describe depth.
    ///
    /// # Errors
    /// `InvalidKey` when `key` or a followed reference is not a valid key.
    pub fn describe<S: TripleSource + ?Sized>(
        &self,
        source: &S,
        key: &RdfKey,
    ) -> Result<Vec<Statement>> {
        key.validate()?;
        let mut seen: HashSet<RdfKey> = HashSet::from([key.clone()]);
        let mut queue: VecDeque<(RdfKey, usize)> = VecDeque::from([(key.clone(), 0)]);
        let mut out = Vec::new();

        while let Some((subject, depth)) = queue.pop_front() {
            let statements = source.query(Some(&subject), None, &GraphFilter::Any)?;
            if depth < self.config.describe_depth {
                for st in &statements {
                    if let Some(next) = st.object.as_key()? {
                        if seen.insert(next.clone()) {
                            queue.push_back((next, depth + 1));
                        }
                    }
                }
            }
            out.extend(statements);
        }
        Ok(out)
    }

    /// Loads entity `key` of type `ty` from `source`.
    pub fn find<S: TripleSource + ?Sized>(
        &self,
        source: &S,
        key: &RdfKey,
        ty: &Arc<EntityType>,
    ) -> Result<ObjectGraph> {
        let _span = operation_span("find", ty.name()).entered();
        let statements = self.describe(source, key)?;
        self.resolve(key, ty, &statements)
    }

    /// Writes `handle` and everything it reaches to `source` in one
    /// transaction, assigning a key first if needed.
    ///
    /// Existing statements about each written subject, in the graph it is
    /// written to, are replaced.
    pub fn persist<S: TripleSource + ?Sized>(
        &self,
        source: &mut S,
        handle: &EntityHandle,
    ) -> Result<RdfKey> {
        let key = self.assign_id(&mut *handle.write())?;
        let ty = handle.read().entity_type();
        let _span = operation_span("persist", ty.name()).entered();
        let statements = self.serialize_handle(handle)?;

        let mut blocks: Vec<(RdfKey, Option<RdfKey>)> = Vec::new();
        for st in &statements {
            let block = (st.subject.clone(), st.context.clone());
            if !blocks.contains(&block) {
                blocks.push(block);
            }
        }

        in_transaction(source, |source| {
            for (subject, context) in &blocks {
                let filter = match context {
                    Some(graph) => GraphFilter::Named(graph.clone()),
                    None => GraphFilter::Default,
                };
                source.remove_matching(Some(subject), None, &filter)?;
            }
            source.add(&statements)
        })
        .map_err(|e| e.track("persist"))?;

        tracing::debug!(key = %key, statements = statements.len(), "persisted entity");
        Ok(key)
    }

    /// Deletes the statements about `key` in the graph `ty` places it in.
    /// Returns how many were removed.
    pub fn remove<S: TripleSource + ?Sized>(
        &self,
        source: &mut S,
        key: &RdfKey,
        ty: &Arc<EntityType>,
    ) -> Result<usize> {
        let _span = operation_span("remove", ty.name()).entered();
        let meta = self.resolver.resolve(ty)?;
        let filter = match meta.context_for(key) {
            Some(graph) => GraphFilter::Named(graph),
            None => GraphFilter::Any,
        };
        let removed = in_transaction(source, |source| {
            source.remove_matching(Some(key), None, &filter)
        })
        .map_err(|e| e.track("remove"))?;
        tracing::debug!(key = %key, removed, "removed entity");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::PropertyDecl;
    use crate::entity::ValueType;
    use crate::source::MemoryTripleSource;
    use assert_matches::assert_matches;
    use serial_test::serial;
    use std::io::Write;

    #[test]
    #[serial]
    fn configured_mapper_installs_options_and_prefixes() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .expect("tempfile");
        writeln!(file, "strict_typing = false\ndescribe_depth = 3\n").expect("write");
        writeln!(file, "[prefixes]\ncfg = \"http://config.example.org/\"").expect("write");

        let mapper = RdfMapper::configured(Some(file.path())).expect("configure");
        assert!(!mapper.options().strict_typing);
        assert_eq!(mapper.config().describe_depth, 3);
        assert_eq!(
            crate::model::PrefixMapping::expand_global("cfg:Thing"),
            "http://config.example.org/Thing"
        );
        GLOBAL_OPTIONS.reset();
    }

    #[test]
    #[serial]
    fn bad_configuration_is_a_config_error() {
        let file = tempfile::Builder::new()
            .suffix(".ini")
            .tempfile()
            .expect("tempfile");
        assert_matches!(
            RdfMapper::configured(Some(file.path())),
            Err(MapperError::Config(_))
        );
    }

    #[test]
    fn debug_output_shows_caches_and_options() {
        let mapper = RdfMapper::isolated().with_options(ConversionOptions::default());
        let shown = format!("{mapper:?}");
        assert!(shown.starts_with("RdfMapper"));
        assert!(shown.contains("metadata_cache"));
        assert!(shown.contains("strict_typing: true"));
    }

    #[test]
    fn describe_stops_at_cycles() {
        let a = RdfKey::resource("http://example.org/a").expect("key");
        let b = RdfKey::resource("http://example.org/b").expect("key");
        let source = MemoryTripleSource::from_statements([
            Statement::new(a.clone(), "http://example.org/p", crate::model::Node::from(&b)),
            Statement::new(b.clone(), "http://example.org/p", crate::model::Node::from(&a)),
        ]);
        let statements = RdfMapper::isolated().describe(&source, &a).expect("describe");
        assert_eq!(statements.len(), 2);
    }

    #[test]
    fn remove_of_unknown_key_removes_nothing() {
        let ty = EntityType::builder("mapper::Gone")
            .class("http://example.org/Gone")
            .identifiable()
            .property(PropertyDecl::single("name", "http://example.org/name", ValueType::String))
            .build();
        let mut source = MemoryTripleSource::new();
        let key = RdfKey::resource("http://example.org/gone").expect("key");
        let removed = RdfMapper::isolated()
            .remove(&mut source, &key, &ty)
            .expect("remove");
        assert_eq!(removed, 0);
    }
}
