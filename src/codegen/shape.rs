//! Accessor analysis for interface-only entity types.
//!
//! Every method reachable from the interface is classified as an accessor
//! (`getX`, `isX`, `setX`, `addX`), an identity method, or a provided method.
//! Anything else makes the interface unimplementable.

use crate::entity::{EntityType, MethodDecl, Multiplicity, ProvidedBody, TypeExpr, ValueType};
use crate::error::{MapperError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

static ACCESSOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(get|is|set|add)([A-Z][A-Za-z0-9_]*)$").expect("accessor pattern is valid")
});

pub const GET_RDF_ID: &str = "getRdfId";
pub const SET_RDF_ID: &str = "setRdfId";

/// Storage for one property of a generated instance.
#[derive(Debug, Clone, PartialEq)]
pub struct SlotDecl {
    pub property: String,
    pub ty: TypeExpr,
}

#[derive(Clone)]
pub enum Dispatch {
    Get(usize),
    Set(usize),
    Add(usize),
    GetId,
    SetId,
    Provided(ProvidedBody),
}

impl fmt::Debug for Dispatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dispatch::Get(slot) => write!(f, "Get({slot})"),
            Dispatch::Set(slot) => write!(f, "Set({slot})"),
            Dispatch::Add(slot) => write!(f, "Add({slot})"),
            Dispatch::GetId => f.write_str("GetId"),
            Dispatch::SetId => f.write_str("SetId"),
            Dispatch::Provided(_) => f.write_str("Provided"),
        }
    }
}

#[derive(Debug, Default)]
pub struct ClassShape {
    pub slots: Vec<SlotDecl>,
    pub by_property: HashMap<String, usize>,
    pub dispatch: HashMap<String, Dispatch>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AccessorKind {
    Get,
    Is,
    Set,
    Add,
}

struct Accessor {
    kind: AccessorKind,
    property: String,
    method: MethodDecl,
}

/// `Name` -> `name`, keeping leading acronyms (`URL` stays `URL`).
fn decapitalize(suffix: &str) -> String {
    let mut chars = suffix.chars();
    match (chars.next(), chars.next()) {
        (Some(a), Some(b)) if a.is_uppercase() && b.is_uppercase() => suffix.to_string(),
        (Some(a), _) => a.to_lowercase().chain(suffix.chars().skip(1)).collect(),
        (None, _) => String::new(),
    }
}

fn classify(interface: &EntityType, method: &MethodDecl) -> Result<Accessor> {
    let not_accessor = || {
        MapperError::shape(
            interface.name(),
            format!("method {} is not a property accessor and has no body", method.name),
        )
    };
    let caps = ACCESSOR.captures(&method.name).ok_or_else(not_accessor)?;
    let kind = match &caps[1] {
        "get" => AccessorKind::Get,
        "is" => AccessorKind::Is,
        "set" => AccessorKind::Set,
        _ => AccessorKind::Add,
    };
    let property = method
        .property
        .clone()
        .unwrap_or_else(|| decapitalize(&caps[2]));

    let arity_ok = match kind {
        AccessorKind::Get | AccessorKind::Is => {
            method.params.is_empty() && method.returns.is_some()
        }
        AccessorKind::Set | AccessorKind::Add => {
            method.params.len() == 1 && method.returns.is_none()
        }
    };
    if !arity_ok {
        return Err(not_accessor());
    }
    if kind == AccessorKind::Is
        && method.returns.as_ref() != Some(&TypeExpr::single(ValueType::Boolean))
    {
        return Err(MapperError::shape(
            interface.name(),
            format!("{} must return a single boolean", method.name),
        ));
    }
    Ok(Accessor {
        kind,
        property,
        method: method.clone(),
    })
}

/// Classifies every method of `interface` and its ancestors and lays out
/// one storage slot per property.
pub fn analyze(interface: &Arc<EntityType>) -> Result<ClassShape> {
    if !interface.is_identifiable() {
        return Err(MapperError::shape(
            interface.name(),
            "interface does not inherit the rdf id capability",
        ));
    }

    let mut shape = ClassShape::default();
    let mut getters: Vec<Accessor> = Vec::new();
    let mut mutators: Vec<Accessor> = Vec::new();
    let mut seen: HashMap<String, MethodDecl> = HashMap::new();

    for (_, method) in interface.all_methods() {
        if let Some(first) = seen.get(&method.name) {
            if first.params != method.params || first.returns != method.returns {
                return Err(MapperError::shape(
                    interface.name(),
                    format!("method {} is declared twice with different types", method.name),
                ));
            }
            continue;
        }
        seen.insert(method.name.clone(), method.clone());

        if method.name == GET_RDF_ID {
            shape.dispatch.insert(method.name.clone(), Dispatch::GetId);
            continue;
        }
        if method.name == SET_RDF_ID {
            shape.dispatch.insert(method.name.clone(), Dispatch::SetId);
            continue;
        }
        if let Some(body) = &method.body {
            shape
                .dispatch
                .insert(method.name.clone(), Dispatch::Provided(body.clone()));
            continue;
        }

        let accessor = classify(interface, &method)?;
        match accessor.kind {
            AccessorKind::Get | AccessorKind::Is => getters.push(accessor),
            AccessorKind::Set | AccessorKind::Add => mutators.push(accessor),
        }
    }

    for getter in getters {
        let Some(ty) = getter.method.returns.clone() else {
            continue;
        };
        let slot = match shape.by_property.get(&getter.property) {
            Some(&slot) => {
                if !shape.slots[slot].ty.compatible_with(&ty) {
                    return Err(MapperError::shape(
                        interface.name(),
                        format!("getters for {} disagree on its type", getter.property),
                    ));
                }
                slot
            }
            None => {
                shape.slots.push(SlotDecl {
                    property: getter.property.clone(),
                    ty,
                });
                shape
                    .by_property
                    .insert(getter.property.clone(), shape.slots.len() - 1);
                shape.slots.len() - 1
            }
        };
        shape.dispatch.insert(getter.method.name, Dispatch::Get(slot));
    }

    for mutator in mutators {
        let slot = *shape.by_property.get(&mutator.property).ok_or_else(|| {
            MapperError::shape(
                interface.name(),
                format!("{} has no matching getter for {}", mutator.method.name, mutator.property),
            )
        })?;
        let slot_ty = &shape.slots[slot].ty;
        let param = &mutator.method.params[0];
        let (compatible, dispatch) = match mutator.kind {
            AccessorKind::Set => (slot_ty.compatible_with(param), Dispatch::Set(slot)),
            _ => (
                slot_ty.multiplicity != Multiplicity::Single
                    && param.multiplicity == Multiplicity::Single
                    && slot_ty.element().compatible_with(param),
                Dispatch::Add(slot),
            ),
        };
        if !compatible {
            return Err(MapperError::shape(
                interface.name(),
                format!(
                    "{} takes {param} but {} is {slot_ty}",
                    mutator.method.name, mutator.property
                ),
            ));
        }
        shape.dispatch.insert(mutator.method.name, dispatch);
    }

    Ok(shape)
}
