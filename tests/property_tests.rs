//! Property-based checks for keys and scalar conversion.

use proptest::prelude::*;
use rdfbind::{
    ConversionOptions, EntityType, PropertyDecl, RdfKey, RdfMapper, Value, ValueType,
};
use std::sync::Arc;

fn scalars() -> Arc<EntityType> {
    EntityType::builder("proptest::Scalars")
        .class("http://example.org/Scalars")
        .identifiable()
        .property(PropertyDecl::single("text", "http://example.org/text", ValueType::String))
        .property(PropertyDecl::single("number", "http://example.org/number", ValueType::Integer))
        .property(PropertyDecl::single("flag", "http://example.org/flag", ValueType::Boolean))
        .property(PropertyDecl::list("items", "http://example.org/item", ValueType::Integer))
        .build()
}

fn local_name() -> impl Strategy<Value = String> {
    "[a-zA-Z][a-zA-Z0-9_-]{0,24}"
}

proptest! {
    #[test]
    fn resource_keys_parse_back_from_display(local in local_name()) {
        let key = RdfKey::resource(format!("http://example.org/{local}")).expect("valid iri");
        let parsed: RdfKey = key.to_string().parse().expect("parse");
        prop_assert_eq!(parsed, key);
    }

    #[test]
    fn anonymous_keys_parse_back_from_display(id in "[a-z][a-z0-9]{0,16}") {
        let key = RdfKey::anonymous(id.clone()).expect("valid id");
        prop_assert_eq!(key.to_string(), format!("_:{id}"));
        let parsed: RdfKey = key.to_string().parse().expect("parse");
        prop_assert!(parsed.is_anonymous());
        prop_assert_eq!(parsed, key);
    }

    #[test]
    fn resource_and_anonymous_keys_never_collide(id in "[a-z][a-z0-9]{0,16}") {
        let anonymous = RdfKey::anonymous(id.clone()).expect("valid id");
        let resource = RdfKey::resource(format!("urn:x:{id}")).expect("valid iri");
        prop_assert_ne!(anonymous, resource);
    }

    #[test]
    fn scalars_survive_conversion(
        text in "\\PC{0,40}",
        number in any::<i64>(),
        flag in any::<bool>(),
        items in prop::collection::hash_set(any::<i64>(), 0..6),
        strict in any::<bool>(),
    ) {
        let ty = scalars();
        let mapper = RdfMapper::isolated().with_options(ConversionOptions {
            strict_typing: strict,
            language_aware: false,
        });
        let key = RdfKey::generate_anonymous();
        let entity = mapper.create(&ty).expect("create");
        {
            let mut e = entity.write();
            e.set_rdf_id(key.clone());
            e.set_property("text", Value::str(text.clone())).expect("text");
            e.set_property("number", number.into()).expect("number");
            e.set_property("flag", flag.into()).expect("flag");
            e.set_property("items", Value::List(items.iter().copied().map(Value::Int).collect()))
                .expect("items");
        }

        let statements = mapper.serialize_handle(&entity).expect("serialize");
        let graph = mapper.resolve(&key, &ty, &statements).expect("resolve");
        let root = graph.root().read();
        prop_assert_eq!(root.property("text"), Some(Value::Str(text)));
        prop_assert_eq!(root.property("number"), Some(Value::Int(number)));
        prop_assert_eq!(root.property("flag"), Some(Value::Bool(flag)));
        let mut read_back: Vec<i64> = root
            .property("items")
            .map(|v| v.items().iter().filter_map(Value::as_int).collect())
            .unwrap_or_default();
        let mut expected: Vec<i64> = items.into_iter().collect();
        read_back.sort_unstable();
        expected.sort_unstable();
        prop_assert_eq!(read_back, expected);
    }
}
