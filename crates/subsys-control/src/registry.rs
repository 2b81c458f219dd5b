//! Process-wide table of subsystem factories keyed by kind.
//!
//! The host registers factories once at startup and instantiates configured
//! subsystems through [`create_subsystem`].

use crate::config::SubsystemConfig;
use crate::subsystem::Subsystem;
use lazy_static::lazy_static;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use subsys_common::{SubsystemError, SubsystemResult};
use tracing::debug;

/// Builds a subsystem from its configuration
pub type SubsystemFactory =
    Arc<dyn Fn(&SubsystemConfig) -> SubsystemResult<Arc<dyn Subsystem>> + Send + Sync>;

lazy_static! {
    static ref REGISTRY: RwLock<HashMap<String, SubsystemFactory>> = RwLock::new(HashMap::new());
}

/// Register `factory` under `kind`. A kind can be registered once.
pub fn register_subsystem<F>(kind: &str, factory: F) -> SubsystemResult<()>
where
    F: Fn(&SubsystemConfig) -> SubsystemResult<Arc<dyn Subsystem>> + Send + Sync + 'static,
{
    let mut registry = REGISTRY.write();
    if registry.contains_key(kind) {
        return Err(SubsystemError::already_registered(kind));
    }
    registry.insert(kind.to_string(), Arc::new(factory));
    debug!(kind = %kind, "Subsystem kind registered");
    Ok(())
}

/// Instantiate the subsystem described by `config`.
pub fn create_subsystem(config: &SubsystemConfig) -> SubsystemResult<Arc<dyn Subsystem>> {
    let factory = REGISTRY
        .read()
        .get(&config.kind)
        .cloned()
        .ok_or_else(|| SubsystemError::unknown_subsystem(&config.kind))?;

    // Factory runs outside the lock so it may consult the registry itself.
    factory(config)
}

pub fn is_registered(kind: &str) -> bool {
    REGISTRY.read().contains_key(kind)
}

/// Registered kinds, sorted
pub fn list_registered_subsystems() -> Vec<String> {
    let mut kinds: Vec<String> = REGISTRY.read().keys().cloned().collect();
    kinds.sort();
    kinds
}

/// Register the subsystems shipped with this crate. Safe to call repeatedly.
pub fn register_builtin_subsystems() -> SubsystemResult<()> {
    match crate::server::register() {
        Ok(()) | Err(SubsystemError::AlreadyRegistered { .. }) => Ok(()),
        Err(e) => Err(e),
    }
}
