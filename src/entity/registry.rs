//! Process-wide table of entity types by name.
//!
//! Nested entity properties name their target type; the resolver and the
//! converters look those names up here.

use super::EntityType;
use crate::error::{MapperError, Result};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

static REGISTRY: Lazy<RwLock<HashMap<String, Arc<EntityType>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Adds `ty` under its name. Registering the same type twice is a no-op; a
/// different type under a taken name is rejected.
pub fn register(ty: Arc<EntityType>) -> Result<()> {
    let mut registry = REGISTRY.write();
    if let Some(existing) = registry.get(ty.name()) {
        if existing.id() == ty.id() {
            return Ok(());
        }
        return Err(MapperError::mapping(
            ty.name(),
            format!("a different type is already registered as {}", ty.name()),
        ));
    }
    tracing::debug!(entity_type = ty.name(), id = %ty.id(), "registered entity type");
    registry.insert(ty.name().to_string(), ty);
    Ok(())
}

pub fn lookup(name: &str) -> Option<Arc<EntityType>> {
    REGISTRY.read().get(name).cloned()
}

/// Names of every registered type, sorted.
pub fn registered_types() -> Vec<String> {
    let mut names: Vec<String> = REGISTRY.read().keys().cloned().collect();
    names.sort();
    names
}
