//! Entity type declarations and the runtime entity contract.
//!
//! An [`EntityType`] is the declarative description of a mapped type: its RDF
//! class, the properties it exposes, the accessor methods an implementation
//! must answer, and how instances are identified and placed in named graphs.
//! Types either carry a factory for a hand-written implementation or are left
//! to the instance generator.

pub mod registry;

use crate::error::{MapperError, Result};
use crate::model::{RdfKey, Value};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

// ============================================================================
// Runtime contract
// ============================================================================

/// A live instance of a mapped type.
///
/// Property access is by property name as declared on the type (or any of its
/// ancestors). Implementations own scalar values and hold nested entities
/// through non-owning [`EntityRef`](crate::model::EntityRef)s.
pub trait Entity: Send + Sync + fmt::Debug {
    fn entity_type(&self) -> Arc<EntityType>;

    fn rdf_id(&self) -> Option<&RdfKey>;

    fn set_rdf_id(&mut self, key: RdfKey);

    /// Current value, `None` when unset.
    fn property(&self, name: &str) -> Option<Value>;

    fn set_property(&mut self, name: &str, value: Value) -> Result<()>;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

pub type EntityHandle = Arc<RwLock<dyn Entity>>;
pub type WeakEntity = Weak<RwLock<dyn Entity>>;

/// Wraps a concrete entity in a shared handle.
pub fn handle<E: Entity + 'static>(entity: E) -> EntityHandle {
    Arc::new(RwLock::new(entity))
}

pub type EntityFactory = Arc<dyn Fn(&Arc<EntityType>) -> EntityHandle + Send + Sync>;
pub type ProvidedBody = Arc<dyn Fn(&dyn Entity, &[Value]) -> Value + Send + Sync>;

// ============================================================================
// Value types
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ValueType {
    Boolean,
    Integer,
    Float,
    String,
    Iri,
    DateTime,
    /// Reference to a registered entity type, by name.
    Entity(String),
    /// The entity's own key.
    Key,
    /// Anything the mapper has no literal form for.
    Opaque(String),
}

impl ValueType {
    pub fn entity(name: impl Into<String>) -> Self {
        ValueType::Entity(name.into())
    }

    pub fn is_entity(&self) -> bool {
        matches!(self, ValueType::Entity(_))
    }

    fn accepts(&self, value: &Value) -> Option<Value> {
        match (self, value) {
            (ValueType::Boolean, Value::Bool(_))
            | (ValueType::Integer, Value::Int(_))
            | (ValueType::Float, Value::Float(_))
            | (ValueType::String, Value::Str(_))
            | (ValueType::Iri, Value::Iri(_))
            | (ValueType::DateTime, Value::DateTime(_))
            | (ValueType::Entity(_), Value::Entity(_))
            | (ValueType::Key, Value::Entity(_))
            | (ValueType::Opaque(_), _) => Some(value.clone()),
            (ValueType::Float, Value::Int(i)) => Some(Value::Float(*i as f64)),
            _ => None,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Boolean => f.write_str("boolean"),
            ValueType::Integer => f.write_str("integer"),
            ValueType::Float => f.write_str("float"),
            ValueType::String => f.write_str("string"),
            ValueType::Iri => f.write_str("iri"),
            ValueType::DateTime => f.write_str("dateTime"),
            ValueType::Entity(name) => write!(f, "entity {name}"),
            ValueType::Key => f.write_str("key"),
            ValueType::Opaque(name) => write!(f, "opaque {name}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Multiplicity {
    Single,
    List,
    Set,
}

/// Declared type of an accessor parameter or return value.
///
/// `wildcard` marks an upper-bounded collection element type: a wildcard
/// collection of `Entity("Agent")` accepts any entity, and is compatible with
/// a non-wildcard collection of the same bound.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeExpr {
    pub value_type: ValueType,
    pub multiplicity: Multiplicity,
    pub wildcard: bool,
}

impl TypeExpr {
    pub fn single(value_type: ValueType) -> Self {
        Self {
            value_type,
            multiplicity: Multiplicity::Single,
            wildcard: false,
        }
    }

    pub fn list(value_type: ValueType) -> Self {
        Self {
            value_type,
            multiplicity: Multiplicity::List,
            wildcard: false,
        }
    }

    pub fn set(value_type: ValueType) -> Self {
        Self {
            value_type,
            multiplicity: Multiplicity::Set,
            wildcard: false,
        }
    }

    pub fn wildcard(mut self) -> Self {
        self.wildcard = true;
        self
    }

    /// Same element type and multiplicity; the wildcard flag is ignored.
    pub fn compatible_with(&self, other: &TypeExpr) -> bool {
        self.value_type == other.value_type && self.multiplicity == other.multiplicity
    }

    /// Element type of a collection, as a single-valued expression.
    pub fn element(&self) -> TypeExpr {
        TypeExpr::single(self.value_type.clone())
    }

    /// Checks `value` against this type and returns its normalized form:
    /// integers widen to floats and lists of a set-typed property become sets.
    pub fn coerce(&self, value: &Value) -> Option<Value> {
        match (self.multiplicity, value) {
            (Multiplicity::Single, v) => self.value_type.accepts(v),
            (Multiplicity::List, Value::List(items)) => items
                .iter()
                .map(|v| self.value_type.accepts(v))
                .collect::<Option<Vec<_>>>()
                .map(Value::List),
            (Multiplicity::Set, Value::Set(items) | Value::List(items)) => items
                .iter()
                .map(|v| self.value_type.accepts(v))
                .collect::<Option<Vec<_>>>()
                .map(Value::set),
            _ => None,
        }
    }

    /// Empty value of a collection type.
    pub fn empty_collection(&self) -> Option<Value> {
        match self.multiplicity {
            Multiplicity::Single => None,
            Multiplicity::List => Some(Value::List(Vec::new())),
            Multiplicity::Set => Some(Value::Set(Vec::new())),
        }
    }
}

impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bound = if self.wildcard { "? extends " } else { "" };
        match self.multiplicity {
            Multiplicity::Single => write!(f, "{}", self.value_type),
            Multiplicity::List => write!(f, "list<{bound}{}>", self.value_type),
            Multiplicity::Set => write!(f, "set<{bound}{}>", self.value_type),
        }
    }
}

// ============================================================================
// Declarations
// ============================================================================

/// One mapped property.
///
/// `predicate` may be absolute or a compact `prefix:local` IRI; when omitted
/// the predicate is the class namespace followed by the property name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyDecl {
    pub name: String,
    pub predicate: Option<String>,
    pub value_type: ValueType,
    pub multiplicity: Multiplicity,
    pub language: Option<String>,
    pub datatype: Option<String>,
}

impl PropertyDecl {
    fn new(
        name: impl Into<String>,
        predicate: impl Into<String>,
        value_type: ValueType,
        multiplicity: Multiplicity,
    ) -> Self {
        Self {
            name: name.into(),
            predicate: Some(predicate.into()),
            value_type,
            multiplicity,
            language: None,
            datatype: None,
        }
    }

    pub fn single(
        name: impl Into<String>,
        predicate: impl Into<String>,
        value_type: ValueType,
    ) -> Self {
        Self::new(name, predicate, value_type, Multiplicity::Single)
    }

    pub fn list(
        name: impl Into<String>,
        predicate: impl Into<String>,
        value_type: ValueType,
    ) -> Self {
        Self::new(name, predicate, value_type, Multiplicity::List)
    }

    pub fn set(
        name: impl Into<String>,
        predicate: impl Into<String>,
        value_type: ValueType,
    ) -> Self {
        Self::new(name, predicate, value_type, Multiplicity::Set)
    }

    /// Single-valued property whose predicate derives from the class namespace.
    pub fn inferred(name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            predicate: None,
            ..Self::single(name, "", value_type)
        }
    }

    pub fn language(mut self, tag: impl Into<String>) -> Self {
        self.language = Some(tag.into());
        self
    }

    pub fn datatype(mut self, datatype: impl Into<String>) -> Self {
        self.datatype = Some(datatype.into());
        self
    }

    pub fn type_expr(&self) -> TypeExpr {
        TypeExpr {
            value_type: self.value_type.clone(),
            multiplicity: self.multiplicity,
            wildcard: false,
        }
    }

    /// `Name` for `name`; used to build accessor names.
    pub fn accessor_suffix(&self) -> String {
        let mut chars = self.name.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }
}

/// One method an implementation must answer.
#[derive(Clone)]
pub struct MethodDecl {
    pub name: String,
    pub params: Vec<TypeExpr>,
    pub returns: Option<TypeExpr>,
    /// Property backing an accessor, when known from the declaration.
    pub property: Option<String>,
    /// Behavior of a non-accessor method supplied by the declaring type.
    pub body: Option<ProvidedBody>,
}

impl MethodDecl {
    pub fn getter(name: impl Into<String>, returns: TypeExpr) -> Self {
        Self::method(name, Vec::new(), Some(returns))
    }

    pub fn setter(name: impl Into<String>, param: TypeExpr) -> Self {
        Self::method(name, vec![param], None)
    }

    pub fn adder(name: impl Into<String>, element: TypeExpr) -> Self {
        Self::method(name, vec![element], None)
    }

    pub fn method(
        name: impl Into<String>,
        params: Vec<TypeExpr>,
        returns: Option<TypeExpr>,
    ) -> Self {
        Self {
            name: name.into(),
            params,
            returns,
            property: None,
            body: None,
        }
    }

    pub fn provided<F>(name: impl Into<String>, returns: TypeExpr, body: F) -> Self
    where
        F: Fn(&dyn Entity, &[Value]) -> Value + Send + Sync + 'static,
    {
        Self {
            body: Some(Arc::new(body)),
            ..Self::getter(name, returns)
        }
    }

    fn for_property(mut self, property: &str) -> Self {
        self.property = Some(property.to_string());
        self
    }
}

impl fmt::Debug for MethodDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodDecl")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("returns", &self.returns)
            .field("property", &self.property)
            .field("provided", &self.body.is_some())
            .finish()
    }
}

/// Which named graph an entity's statements live in.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum NamedGraphPolicy {
    /// The default graph.
    #[default]
    None,
    /// A graph named by the entity's own key.
    Instance,
    /// One fixed graph for every instance of the type.
    Static(String),
}

/// How a new instance obtains its key.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum IdStrategy {
    /// The caller sets the key before persisting.
    #[default]
    Assigned,
    /// `namespace` followed by a random UUID.
    Generated { namespace: String },
    /// A fresh blank node.
    Anonymous,
}

// ============================================================================
// EntityType
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityTypeId(u64);

impl EntityTypeId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        EntityTypeId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for EntityTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

pub const SUPPORTS_RDF_ID: &str = "SupportsRdfId";

/// The identity capability every generated type must inherit.
static SUPPORTS_RDF_ID_TYPE: Lazy<Arc<EntityType>> = Lazy::new(|| {
    EntityType::builder(SUPPORTS_RDF_ID)
        .method(MethodDecl::getter("getRdfId", TypeExpr::single(ValueType::Key)))
        .method(MethodDecl::setter("setRdfId", TypeExpr::single(ValueType::Key)))
        .build()
});

pub struct EntityType {
    id: EntityTypeId,
    name: String,
    class_iri: Option<String>,
    parents: Vec<Arc<EntityType>>,
    properties: Vec<PropertyDecl>,
    methods: Vec<MethodDecl>,
    named_graph: NamedGraphPolicy,
    id_strategy: IdStrategy,
    construct_when_absent: bool,
    factory: Option<EntityFactory>,
}

impl EntityType {
    pub fn builder(name: impl Into<String>) -> EntityTypeBuilder {
        EntityTypeBuilder {
            name: name.into(),
            class_iri: None,
            parents: Vec::new(),
            properties: Vec::new(),
            methods: Vec::new(),
            named_graph: NamedGraphPolicy::None,
            id_strategy: IdStrategy::Assigned,
            construct_when_absent: false,
            factory: None,
        }
    }

    /// The built-in identity capability type.
    pub fn supports_rdf_id() -> Arc<EntityType> {
        SUPPORTS_RDF_ID_TYPE.clone()
    }

    pub fn id(&self) -> EntityTypeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn class_iri(&self) -> Option<&str> {
        self.class_iri.as_deref()
    }

    pub fn parents(&self) -> &[Arc<EntityType>] {
        &self.parents
    }

    /// Properties declared directly on this type.
    pub fn properties(&self) -> &[PropertyDecl] {
        &self.properties
    }

    /// Methods declared directly on this type.
    pub fn methods(&self) -> &[MethodDecl] {
        &self.methods
    }

    pub fn named_graph(&self) -> &NamedGraphPolicy {
        &self.named_graph
    }

    pub fn id_strategy(&self) -> &IdStrategy {
        &self.id_strategy
    }

    pub fn construct_when_absent(&self) -> bool {
        self.construct_when_absent
    }

    pub fn factory(&self) -> Option<&EntityFactory> {
        self.factory.as_ref()
    }

    /// All ancestors in depth-first preorder, each visited once.
    pub fn ancestors(&self) -> Vec<Arc<EntityType>> {
        fn visit(ty: &EntityType, seen: &mut Vec<EntityTypeId>, out: &mut Vec<Arc<EntityType>>) {
            for parent in &ty.parents {
                if seen.contains(&parent.id) {
                    continue;
                }
                seen.push(parent.id);
                out.push(parent.clone());
                visit(parent, seen, out);
            }
        }
        let mut seen = vec![self.id];
        let mut out = Vec::new();
        visit(self, &mut seen, &mut out);
        out
    }

    /// True when this type is, or inherits from, `other`.
    pub fn is_a(&self, other: &EntityType) -> bool {
        self.id == other.id || self.ancestors().iter().any(|a| a.id == other.id)
    }

    /// True when the type carries the identity capability.
    pub fn is_identifiable(&self) -> bool {
        self.is_a(&SUPPORTS_RDF_ID_TYPE)
    }

    /// Inherited properties first (nearest ancestor wins), then this type's
    /// own; an own property replaces an inherited one of the same name.
    pub fn all_properties(&self) -> Vec<PropertyDecl> {
        let mut out: Vec<PropertyDecl> = Vec::new();
        let mut lineage = self.ancestors();
        lineage.reverse();
        let own = self.properties.iter();
        let inherited = lineage.iter().flat_map(|t| t.properties.iter());
        for decl in inherited.chain(own) {
            match out.iter_mut().find(|p| p.name == decl.name) {
                Some(existing) => *existing = decl.clone(),
                None => out.push(decl.clone()),
            }
        }
        out
    }

    /// Every method declaration of this type and its ancestors, this type's
    /// first. A name redeclared down the hierarchy appears once per declaring
    /// type.
    pub fn all_methods(self: &Arc<Self>) -> Vec<(Arc<EntityType>, MethodDecl)> {
        let mut out: Vec<_> = self.methods.iter().map(|m| (self.clone(), m.clone())).collect();
        for ancestor in self.ancestors() {
            out.extend(ancestor.methods.iter().map(|m| (ancestor.clone(), m.clone())));
        }
        out
    }
}

impl fmt::Debug for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityType")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("class_iri", &self.class_iri)
            .field(
                "parents",
                &self.parents.iter().map(|p| p.name.as_str()).collect::<Vec<_>>(),
            )
            .field("properties", &self.properties)
            .field("named_graph", &self.named_graph)
            .field("id_strategy", &self.id_strategy)
            .field("concrete", &self.factory.is_some())
            .finish()
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

// ============================================================================
// Builder
// ============================================================================

pub struct EntityTypeBuilder {
    name: String,
    class_iri: Option<String>,
    parents: Vec<Arc<EntityType>>,
    properties: Vec<PropertyDecl>,
    methods: Vec<MethodDecl>,
    named_graph: NamedGraphPolicy,
    id_strategy: IdStrategy,
    construct_when_absent: bool,
    factory: Option<EntityFactory>,
}

impl EntityTypeBuilder {
    /// RDF class of the type; absolute or `prefix:local`.
    pub fn class(mut self, iri: impl Into<String>) -> Self {
        self.class_iri = Some(iri.into());
        self
    }

    pub fn extends(mut self, parent: &Arc<EntityType>) -> Self {
        self.parents.push(parent.clone());
        self
    }

    /// Inherit the identity capability (`getRdfId` / `setRdfId`).
    pub fn identifiable(self) -> Self {
        let base = EntityType::supports_rdf_id();
        self.extends(&base)
    }

    /// Declares a property together with its getter and setter (`isX` for
    /// booleans).
    pub fn property(mut self, decl: PropertyDecl) -> Self {
        let suffix = decl.accessor_suffix();
        let ty = decl.type_expr();
        let is_flag =
            decl.value_type == ValueType::Boolean && ty.multiplicity == Multiplicity::Single;
        let getter = if is_flag {
            format!("is{suffix}")
        } else {
            format!("get{suffix}")
        };
        let accessors = [
            MethodDecl::getter(getter, ty.clone()).for_property(&decl.name),
            MethodDecl::setter(format!("set{suffix}"), ty).for_property(&decl.name),
        ];
        for accessor in accessors {
            if !self.methods.iter().any(|m| m.name == accessor.name) {
                self.methods.push(accessor);
            }
        }
        self.properties.push(decl);
        self
    }

    /// Declares a method explicitly; replaces an accessor of the same name.
    pub fn method(mut self, method: MethodDecl) -> Self {
        self.methods.retain(|m| m.name != method.name);
        self.methods.push(method);
        self
    }

    pub fn named_graph(mut self, policy: NamedGraphPolicy) -> Self {
        self.named_graph = policy;
        self
    }

    pub fn id_strategy(mut self, strategy: IdStrategy) -> Self {
        self.id_strategy = strategy;
        self
    }

    /// Build an empty instance when asked for a key with no statements.
    pub fn construct_when_absent(mut self, yes: bool) -> Self {
        self.construct_when_absent = yes;
        self
    }

    /// Concrete implementation; types with one are never generated.
    pub fn implemented_by<F>(mut self, factory: F) -> Self
    where
        F: Fn(&Arc<EntityType>) -> EntityHandle + Send + Sync + 'static,
    {
        self.factory = Some(Arc::new(factory));
        self
    }

    pub fn build(self) -> Arc<EntityType> {
        Arc::new(EntityType {
            id: EntityTypeId::next(),
            name: self.name,
            class_iri: self.class_iri,
            parents: self.parents,
            properties: self.properties,
            methods: self.methods,
            named_graph: self.named_graph,
            id_strategy: self.id_strategy,
            construct_when_absent: self.construct_when_absent,
            factory: self.factory,
        })
    }

    /// Builds the type and adds it to the process-wide registry so that
    /// properties of other types can refer to it by name.
    pub fn register(self) -> Result<Arc<EntityType>> {
        if self.name.trim().is_empty() {
            return Err(MapperError::mapping(self.name, "entity type name must not be empty"));
        }
        let ty = self.build();
        registry::register(ty.clone())?;
        Ok(ty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn named() -> Arc<EntityType> {
        EntityType::builder("entity_mod::Named")
            .class("http://example.org/Named")
            .identifiable()
            .property(PropertyDecl::single("name", "http://example.org/name", ValueType::String))
            .property(PropertyDecl::single(
                "active",
                "http://example.org/active",
                ValueType::Boolean,
            ))
            .build()
    }

    #[test]
    fn properties_add_accessors() {
        let ty = named();
        let names: Vec<_> = ty.methods().iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, ["getName", "setName", "isActive", "setActive"]);
        assert!(ty.methods().iter().all(|m| m.property.is_some()));
    }

    #[test]
    fn identifiable_types_inherit_supports_rdf_id() {
        assert!(named().is_identifiable());
        let plain = EntityType::builder("entity_mod::Plain").build();
        assert!(!plain.is_identifiable());
    }

    #[test]
    fn ancestors_visit_shared_parents_once() {
        let base = named();
        let left = EntityType::builder("entity_mod::Left").extends(&base).build();
        let right = EntityType::builder("entity_mod::Right").extends(&base).build();
        let child = EntityType::builder("entity_mod::Child")
            .extends(&left)
            .extends(&right)
            .build();

        let names: Vec<_> = child.ancestors().iter().map(|t| t.name().to_string()).collect();
        assert_eq!(
            names,
            ["entity_mod::Left", "entity_mod::Named", SUPPORTS_RDF_ID, "entity_mod::Right"]
        );
    }

    #[test]
    fn child_property_overrides_inherited_in_place() {
        let base = named();
        let child = EntityType::builder("entity_mod::Override")
            .extends(&base)
            .property(
                PropertyDecl::single("name", "http://example.org/name", ValueType::String)
                    .language("en"),
            )
            .property(PropertyDecl::single("age", "http://example.org/age", ValueType::Integer))
            .build();

        let props = child.all_properties();
        let names: Vec<_> = props.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["name", "active", "age"]);
        assert_eq!(props[0].language.as_deref(), Some("en"));
    }

    #[test]
    fn type_expr_coerces_collections() {
        let set = TypeExpr::set(ValueType::Integer);
        assert_eq!(
            set.coerce(&Value::List(vec![1.into(), 1.into(), 2.into()])),
            Some(Value::Set(vec![1.into(), 2.into()]))
        );
        assert_eq!(set.coerce(&Value::List(vec!["x".into()])), None);
        assert_eq!(
            TypeExpr::single(ValueType::Float).coerce(&3.into()),
            Some(Value::Float(3.0))
        );
        assert!(TypeExpr::list(ValueType::String).compatible_with(
            &TypeExpr::list(ValueType::String).wildcard()
        ));
    }
}
