//! Generated classes and their instances.

use super::shape::{ClassShape, Dispatch, SlotDecl};
use crate::entity::{Entity, EntityHandle, EntityType};
use crate::error::{MapperError, Result};
use crate::model::{RdfKey, Value};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A synthesized implementation of an interface-only entity type.
pub struct GeneratedClass {
    interface: Arc<EntityType>,
    slots: Vec<SlotDecl>,
    by_property: HashMap<String, usize>,
    dispatch: HashMap<String, Dispatch>,
}

impl GeneratedClass {
    pub(crate) fn new(interface: Arc<EntityType>, shape: ClassShape) -> Self {
        Self {
            interface,
            slots: shape.slots,
            by_property: shape.by_property,
            dispatch: shape.dispatch,
        }
    }

    pub fn interface(&self) -> &Arc<EntityType> {
        &self.interface
    }

    pub fn slots(&self) -> &[SlotDecl] {
        &self.slots
    }

    /// Names of every method instances answer, sorted.
    pub fn methods(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.dispatch.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn implements(&self, ty: &EntityType) -> bool {
        self.interface.is_a(ty)
    }

    pub fn instantiate(self: &Arc<Self>) -> GeneratedEntity {
        let values = self.slots.iter().map(|s| s.ty.empty_collection()).collect();
        GeneratedEntity {
            class: self.clone(),
            key: None,
            values,
        }
    }

    pub fn new_instance(self: &Arc<Self>) -> EntityHandle {
        crate::entity::handle(self.instantiate())
    }
}

impl fmt::Debug for GeneratedClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeneratedClass")
            .field("interface", &self.interface.name())
            .field("slots", &self.slots)
            .field("methods", &self.methods())
            .finish()
    }
}

/// An instance of a [`GeneratedClass`]: one value per slot plus its key.
pub struct GeneratedEntity {
    class: Arc<GeneratedClass>,
    key: Option<RdfKey>,
    values: Vec<Option<Value>>,
}

impl GeneratedEntity {
    pub fn class(&self) -> &Arc<GeneratedClass> {
        &self.class
    }

    fn no_method(&self, method: &str) -> MapperError {
        MapperError::shape(
            self.class.interface.name(),
            format!("no method {method}"),
        )
    }

    fn bad_argument(&self, method: &str, detail: impl fmt::Display) -> MapperError {
        MapperError::conversion(
            self.class.interface.name(),
            self.key.as_ref(),
            format!("{method}: {detail}"),
        )
    }

    fn single_arg<'a>(&self, method: &str, args: &'a [Value]) -> Result<&'a Value> {
        match args {
            [value] => Ok(value),
            _ => Err(self.bad_argument(method, format!("expected 1 argument, got {}", args.len()))),
        }
    }

    /// Calls a method that does not modify the instance.
    pub fn call(&self, method: &str, args: &[Value]) -> Result<Option<Value>> {
        match self.class.dispatch.get(method) {
            Some(Dispatch::Get(slot)) => Ok(self.values[*slot].clone()),
            Some(Dispatch::GetId) => Ok(self.key.clone().map(Value::from)),
            Some(Dispatch::Provided(body)) => Ok(Some(body(self, args))),
            Some(_) => {
                Err(self.bad_argument(method, "mutating method called on a shared instance"))
            }
            None => Err(self.no_method(method)),
        }
    }

    /// Calls any method, by name, the way a generated implementation would
    /// answer it.
    pub fn invoke(&mut self, method: &str, args: &[Value]) -> Result<Option<Value>> {
        let Some(dispatch) = self.class.dispatch.get(method).cloned() else {
            return Err(self.no_method(method));
        };
        match dispatch {
            Dispatch::Set(slot) => {
                let value = self.single_arg(method, args)?;
                let ty = &self.class.slots[slot].ty;
                let coerced = ty.coerce(value).ok_or_else(|| {
                    self.bad_argument(method, format!("{} is not a {ty}", value.kind()))
                })?;
                self.values[slot] = Some(coerced);
                Ok(None)
            }
            Dispatch::Add(slot) => {
                let value = self.single_arg(method, args)?;
                let ty = self.class.slots[slot].ty.clone();
                let element = ty.element().coerce(value).ok_or_else(|| {
                    self.bad_argument(method, format!("{} is not a {ty}", value.kind()))
                })?;
                let collection = self.values[slot].get_or_insert_with(|| {
                    ty.empty_collection().unwrap_or(Value::List(Vec::new()))
                });
                collection.push(element);
                Ok(None)
            }
            Dispatch::SetId => {
                let value = self.single_arg(method, args)?;
                let key = value
                    .as_entity()
                    .and_then(|r| r.key())
                    .ok_or_else(|| self.bad_argument(method, "argument is not a key"))?;
                self.key = Some(key);
                Ok(None)
            }
            Dispatch::Get(_) | Dispatch::GetId | Dispatch::Provided(_) => self.call(method, args),
        }
    }

    /// Calls `method` through the view of `interface`, which must be the
    /// generated interface or one of its ancestors and must declare the method.
    pub fn invoke_as(
        &mut self,
        interface: &Arc<EntityType>,
        method: &str,
        args: &[Value],
    ) -> Result<Option<Value>> {
        if !self.class.implements(interface) {
            return Err(MapperError::shape(
                interface.name(),
                format!("{} does not implement it", self.class.interface.name()),
            ));
        }
        if !interface.all_methods().iter().any(|(_, m)| m.name == method) {
            return Err(MapperError::shape(interface.name(), format!("no method {method}")));
        }
        self.invoke(method, args)
    }
}

impl Entity for GeneratedEntity {
    fn entity_type(&self) -> Arc<EntityType> {
        self.class.interface.clone()
    }

    fn rdf_id(&self) -> Option<&RdfKey> {
        self.key.as_ref()
    }

    fn set_rdf_id(&mut self, key: RdfKey) {
        self.key = Some(key);
    }

    fn property(&self, name: &str) -> Option<Value> {
        let slot = *self.class.by_property.get(name)?;
        self.values[slot].clone()
    }

    fn set_property(&mut self, name: &str, value: Value) -> Result<()> {
        let slot = *self
            .class
            .by_property
            .get(name)
            .ok_or_else(|| self.bad_argument(name, "no such property"))?;
        let ty = &self.class.slots[slot].ty;
        let coerced = ty
            .coerce(&value)
            .ok_or_else(|| self.bad_argument(name, format!("{} is not a {ty}", value.kind())))?;
        self.values[slot] = Some(coerced);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl PartialEq for GeneratedEntity {
    fn eq(&self, other: &Self) -> bool {
        match (&self.key, &other.key) {
            (Some(a), Some(b)) => a == b,
            (None, None) => Arc::ptr_eq(&self.class, &other.class) && self.values == other.values,
            _ => false,
        }
    }
}

impl fmt::Display for GeneratedEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.key {
            Some(key) => fmt::Display::fmt(key, f),
            None => write!(f, "<unidentified {}>", self.class.interface.name()),
        }
    }
}

impl fmt::Debug for GeneratedEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct(self.class.interface.name());
        s.field("rdf_id", &self.key);
        for (slot, value) in self.class.slots.iter().zip(&self.values) {
            s.field(&slot.property, value);
        }
        s.finish()
    }
}
