//! Generated implementations of interface-only entity types.

use assert_matches::assert_matches;
use rdfbind::{
    Entity, EntityType, InstanceGenerator, MapperError, MethodDecl, PropertyDecl, RdfKey,
    TypeExpr, Value, ValueType,
};
use std::sync::Arc;
use std::thread;

fn agent(name: &str) -> Arc<EntityType> {
    EntityType::builder(name)
        .class("http://xmlns.com/foaf/0.1/Agent")
        .identifiable()
        .property(PropertyDecl::single("name", "http://xmlns.com/foaf/0.1/name", ValueType::String))
        .build()
}

// ============================================================================
// Caching
// ============================================================================

#[test]
fn implementation_is_generated_once_per_interface() {
    let generator = InstanceGenerator::new();
    let ty = agent("codegen::Cached");
    let first = generator.implementation_for(&ty).expect("generate");
    let second = generator.implementation_for(&ty).expect("generate");
    assert!(Arc::ptr_eq(&first, &second));

    let stats = generator.stats();
    assert_eq!(stats.size, 1);
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.hits, 1);
}

#[test]
fn concurrent_requests_share_one_implementation() {
    let generator = InstanceGenerator::new();
    let ty = agent("codegen::Concurrent");

    let classes: Vec<_> = thread::scope(|scope| {
        let workers: Vec<_> = (0..8)
            .map(|_| scope.spawn(|| generator.implementation_for(&ty).expect("generate")))
            .collect();
        workers
            .into_iter()
            .map(|w| w.join().expect("worker panicked"))
            .collect()
    });

    assert!(classes.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    assert_eq!(generator.stats().misses, 1);
}

#[test]
fn failures_are_not_cached() {
    let generator = InstanceGenerator::new();
    let broken = EntityType::builder("codegen::Broken")
        .property(PropertyDecl::single("name", "http://example.org/name", ValueType::String))
        .build();
    assert_matches!(generator.implementation_for(&broken), Err(MapperError::Shape { .. }));
    assert_matches!(generator.implementation_for(&broken), Err(MapperError::Shape { .. }));
    assert_eq!(generator.stats().size, 0);
}

// ============================================================================
// Shape errors
// ============================================================================

#[test]
fn interface_without_identity_is_rejected() {
    let ty = EntityType::builder("codegen::NoIdentity")
        .property(PropertyDecl::single("name", "http://example.org/name", ValueType::String))
        .build();
    let err = InstanceGenerator::new()
        .implementation_for(&ty)
        .expect_err("missing identity");
    assert_matches!(
        err,
        MapperError::Shape { ref interface, .. } if interface == "codegen::NoIdentity"
    );
}

#[test]
fn non_accessor_without_body_is_rejected() {
    let ty = EntityType::builder("codegen::Frobnicator")
        .identifiable()
        .method(MethodDecl::method("frobnicate", Vec::new(), None))
        .build();
    let err = InstanceGenerator::new()
        .implementation_for(&ty)
        .expect_err("not an accessor");
    assert!(err.to_string().contains("frobnicate"));
}

#[test]
fn mismatched_setter_is_rejected() {
    let ty = EntityType::builder("codegen::Mismatch")
        .identifiable()
        .method(MethodDecl::getter("getCount", TypeExpr::single(ValueType::Integer)))
        .method(MethodDecl::setter("setCount", TypeExpr::single(ValueType::String)))
        .build();
    assert_matches!(
        InstanceGenerator::new().implementation_for(&ty),
        Err(MapperError::Shape { .. })
    );
}

#[test]
fn adder_on_single_valued_property_is_rejected() {
    let ty = EntityType::builder("codegen::BadAdder")
        .identifiable()
        .property(PropertyDecl::single("tag", "http://example.org/tag", ValueType::String))
        .method(MethodDecl::adder("addTag", TypeExpr::single(ValueType::String)))
        .build();
    assert_matches!(
        InstanceGenerator::new().implementation_for(&ty),
        Err(MapperError::Shape { .. })
    );
}

// ============================================================================
// Instances
// ============================================================================

#[test]
fn accessors_read_and_write_slots() {
    let ty = EntityType::builder("codegen::Account")
        .class("http://example.org/Account")
        .identifiable()
        .property(PropertyDecl::single("active", "http://example.org/active", ValueType::Boolean))
        .property(PropertyDecl::set("tags", "http://example.org/tag", ValueType::String))
        .method(MethodDecl::adder("addTags", TypeExpr::single(ValueType::String)))
        .build();
    let class = InstanceGenerator::new().implementation_for(&ty).expect("generate");
    let mut account = class.instantiate();

    assert_eq!(account.invoke("isActive", &[]).expect("get"), None);
    account.invoke("setActive", &[true.into()]).expect("set");
    assert_eq!(account.invoke("isActive", &[]).expect("get"), Some(Value::Bool(true)));

    account.invoke("addTags", &["a".into()]).expect("add");
    account.invoke("addTags", &["a".into()]).expect("add");
    account.invoke("addTags", &["b".into()]).expect("add");
    assert_eq!(
        account.property("tags"),
        Some(Value::Set(vec!["a".into(), "b".into()]))
    );

    let err = account.invoke("setActive", &["yes".into()]).expect_err("wrong type");
    assert_matches!(err, MapperError::Conversion { .. });
}

#[test]
fn identity_methods_use_the_key() {
    let class = InstanceGenerator::new()
        .implementation_for(&agent("codegen::Identity"))
        .expect("generate");
    let mut entity = class.instantiate();
    let key = RdfKey::resource("http://example.org/a1").expect("key");

    assert_eq!(entity.call("getRdfId", &[]).expect("get id"), None);
    entity.invoke("setRdfId", &[Value::from(key.clone())]).expect("set id");
    assert_eq!(entity.rdf_id(), Some(&key));
    assert_eq!(entity.to_string(), "http://example.org/a1");
}

#[test]
fn instances_answer_through_any_ancestor_view() {
    let base = agent("codegen::BaseAgent");
    let person = EntityType::builder("codegen::Person")
        .class("http://xmlns.com/foaf/0.1/Person")
        .extends(&base)
        .property(PropertyDecl::single(
            "age",
            "http://xmlns.com/foaf/0.1/age",
            ValueType::Integer,
        ))
        .build();
    let class = InstanceGenerator::new().implementation_for(&person).expect("generate");
    assert!(class.implements(&base));

    let mut entity = class.instantiate();
    entity
        .invoke_as(&base, "setName", &[Value::str("Ada")])
        .expect("set through base");
    assert_eq!(entity.invoke("getName", &[]).expect("get"), Some(Value::str("Ada")));
    assert_eq!(
        entity.invoke_as(&person, "getName", &[]).expect("get"),
        Some(Value::str("Ada"))
    );
    assert_matches!(
        entity.invoke_as(&base, "setAge", &[30.into()]),
        Err(MapperError::Shape { .. })
    );
}

#[test]
fn wildcard_collection_getter_matches_plain_setter() {
    let member = agent("codegen::Member");
    let team = EntityType::builder("codegen::Team")
        .identifiable()
        .property(PropertyDecl::list(
            "members",
            "http://example.org/member",
            ValueType::entity("codegen::Member"),
        ))
        .method(MethodDecl::getter(
            "getMembers",
            TypeExpr::list(ValueType::entity("codegen::Member")).wildcard(),
        ))
        .build();
    let generator = InstanceGenerator::new();
    let class = generator.implementation_for(&team).expect("generate");
    let mut entity = class.instantiate();

    let m = generator.instantiate(&member).expect("member");
    entity
        .invoke("setMembers", &[Value::List(vec![Value::entity(&m)])])
        .expect("set members");
    let members = entity.invoke("getMembers", &[]).expect("get").expect("members");
    assert_eq!(members.items().len(), 1);
}

#[test]
fn provided_methods_run_their_body() {
    let ty = EntityType::builder("codegen::Resource")
        .identifiable()
        .method(MethodDecl::provided(
            "isDereferenced",
            TypeExpr::single(ValueType::Boolean),
            |entity, _| Value::Bool(entity.rdf_id().is_some()),
        ))
        .build();
    let class = InstanceGenerator::new().implementation_for(&ty).expect("generate");
    let mut entity = class.instantiate();
    assert_eq!(entity.call("isDereferenced", &[]).expect("call"), Some(Value::Bool(false)));
    entity.set_rdf_id(RdfKey::generate_anonymous());
    assert_eq!(entity.call("isDereferenced", &[]).expect("call"), Some(Value::Bool(true)));
}

#[test]
fn collections_start_empty() {
    let ty = EntityType::builder("codegen::Bag")
        .identifiable()
        .property(PropertyDecl::list("items", "http://example.org/item", ValueType::Integer))
        .build();
    let class = InstanceGenerator::new().implementation_for(&ty).expect("generate");
    let bag = class.instantiate();
    assert_eq!(bag.property("items"), Some(Value::List(Vec::new())));
}
