//! Add-in resolution service contract and an in-process implementation.

use super::RuntimeAddin;
use crate::BoxError;
use log::info;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// Resolves opaque add-in ids to runtime handles, loading on demand.
///
/// Loading may block on I/O; timeout and retry policy belong to the
/// implementation.
pub trait AddinResolver {
    fn is_loaded(&self, addin_id: &str) -> bool;
    fn load(&self, addin_id: &str) -> Result<(), BoxError>;
    fn resolve(&self, addin_id: &str, module: Option<&str>) -> Option<Arc<RuntimeAddin>>;
}

struct Registration {
    addin: Arc<RuntimeAddin>,
    loaded: bool,
    load_count: usize,
}

/// Resolver over a fixed set of registered add-ins.
///
/// "Loading" only flips a flag; it exists for hosts that assemble add-ins
/// in-process and for tests.
#[derive(Default)]
pub struct StaticAddinResolver {
    entries: Mutex<BTreeMap<String, Registration>>,
}

impl StaticAddinResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers one add-in, initially loaded or not.
    pub fn register(&self, addin: RuntimeAddin, loaded: bool) {
        let id = addin.id().to_string();
        self.lock().insert(
            id,
            Registration {
                addin: Arc::new(addin),
                loaded,
                load_count: 0,
            },
        );
    }

    /// Marks a registered add-in as unloaded.
    pub fn unload(&self, addin_id: &str) {
        if let Some(entry) = self.lock().get_mut(addin_id) {
            entry.loaded = false;
        }
    }

    /// Number of successful `load` calls for one add-in.
    pub fn load_count(&self, addin_id: &str) -> usize {
        self.lock()
            .get(addin_id)
            .map(|entry| entry.load_count)
            .unwrap_or(0)
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, Registration>> {
        // A poisoned map is still structurally valid.
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl AddinResolver for StaticAddinResolver {
    fn is_loaded(&self, addin_id: &str) -> bool {
        self.lock()
            .get(addin_id)
            .map(|entry| entry.loaded)
            .unwrap_or(false)
    }

    fn load(&self, addin_id: &str) -> Result<(), BoxError> {
        let mut entries = self.lock();
        let entry = entries.get_mut(addin_id).ok_or_else(|| -> BoxError {
            format!("add-in '{addin_id}' is not registered").into()
        })?;
        entry.loaded = true;
        entry.load_count += 1;
        info!("event=addin_load module=addin status=ok addin_id={addin_id}");
        Ok(())
    }

    fn resolve(&self, addin_id: &str, module: Option<&str>) -> Option<Arc<RuntimeAddin>> {
        let entries = self.lock();
        let entry = entries.get(addin_id).filter(|entry| entry.loaded)?;
        match module {
            None => Some(Arc::clone(&entry.addin)),
            Some(module) => Some(Arc::new(entry.addin.for_module(module))),
        }
    }
}
