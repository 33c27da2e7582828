//! Instance generation for interface-only entity types.
//!
//! ## Architecture
//!
//! ```text
//! EntityType (methods)
//!   → shape analysis
//!   → GeneratedClass (slots + dispatch)
//!   → GeneratedEntity
//! ```
//!
//! A generated class is built at most once per interface per process and is
//! never evicted. Instances of it are independent: each owns its key and one
//! value per property slot, and answers accessor calls through the class's
//! dispatch table.
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! let person = EntityType::builder("Person")
//!     .class("http://xmlns.com/foaf/0.1/Person")
//!     .identifiable()
//!     .property(PropertyDecl::single("name", "http://xmlns.com/foaf/0.1/name", ValueType::String))
//!     .register()?;
//!
//! let class = InstanceGenerator::global().implementation_for(&person)?;
//! let mut ada = class.instantiate();
//! ada.invoke("setName", &["Ada".into()])?;
//! ```

pub mod instance;
pub mod shape;

pub use instance::{GeneratedClass, GeneratedEntity};
pub use shape::{Dispatch, SlotDecl};

use crate::entity::{EntityHandle, EntityType};
use crate::error::Result;
use crate::mapping::{CacheStats, OnceMap};
use once_cell::sync::Lazy;
use std::sync::Arc;

static GLOBAL_GENERATOR: Lazy<Arc<InstanceGenerator>> =
    Lazy::new(|| Arc::new(InstanceGenerator::new()));

/// Produces and caches [`GeneratedClass`]es.
pub struct InstanceGenerator {
    cache: OnceMap<GeneratedClass>,
}

impl InstanceGenerator {
    pub fn new() -> Self {
        Self {
            cache: OnceMap::new(),
        }
    }

    /// The process-wide generator.
    pub fn global() -> &'static Arc<InstanceGenerator> {
        &GLOBAL_GENERATOR
    }

    /// Generated implementation of `interface`, built on first request.
    ///
    /// # Errors
    /// `Shape` when the interface lacks the identity capability, declares a
    /// method that is neither an accessor nor provided, or pairs accessors of
    /// different types. Failures are not cached.
    pub fn implementation_for(&self, interface: &Arc<EntityType>) -> Result<Arc<GeneratedClass>> {
        self.cache
            .get_or_try_init(interface.id(), || {
                let shape = shape::analyze(interface)?;
                tracing::debug!(
                    interface = interface.name(),
                    slots = shape.slots.len(),
                    methods = shape.dispatch.len(),
                    "generated entity class"
                );
                Ok(GeneratedClass::new(interface.clone(), shape))
            })
            .map_err(|e| e.track("implementation_for"))
    }

    /// New empty instance: from the type's own factory when it has one,
    /// otherwise from its generated class.
    pub fn instantiate(&self, ty: &Arc<EntityType>) -> Result<EntityHandle> {
        match ty.factory() {
            Some(factory) => Ok(factory(ty)),
            None => Ok(self.implementation_for(ty)?.new_instance()),
        }
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }
}

impl Default for InstanceGenerator {
    fn default() -> Self {
        Self::new()
    }
}
