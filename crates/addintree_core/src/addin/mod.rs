//! Add-in resolution contracts.
//!
//! # Responsibility
//! - Describe the runtime add-in handle extension nodes depend on.
//! - Define the resolution service that loads add-ins on demand.
//!
//! # Invariants
//! - Resolution is lazy: nothing here is consulted at materialization time.
//! - A node that cannot resolve its owning add-in fails the calling point
//!   operation with [`UnavailableAddinError`], never the whole tree.

mod localizer;
mod resolver;

pub use localizer::{CatalogLocalizer, IdentityLocalizer, Localizer};
pub use resolver::{AddinResolver, StaticAddinResolver};

use crate::tree::Object;
use crate::BoxError;
use std::collections::BTreeMap;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

/// Exported constructor of one named object type.
pub type ObjectConstructor = Arc<dyn Fn() -> Result<Object, BoxError> + Send + Sync>;

/// Loaded add-in (or one module of it) as seen by extension nodes.
pub struct RuntimeAddin {
    id: String,
    module: Option<String>,
    localizer: Arc<dyn Localizer>,
    exports: BTreeMap<String, ObjectConstructor>,
}

impl Debug for RuntimeAddin {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeAddin")
            .field("id", &self.id)
            .field("module", &self.module)
            .field("exports", &self.exports.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl RuntimeAddin {
    /// Creates an add-in handle with an identity localizer and no exports.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            module: None,
            localizer: Arc::new(IdentityLocalizer),
            exports: BTreeMap::new(),
        }
    }

    /// Returns a copy of this handle scoped to one module.
    pub fn for_module(&self, module: impl Into<String>) -> Self {
        Self {
            id: self.id.clone(),
            module: Some(module.into()),
            localizer: Arc::clone(&self.localizer),
            exports: self.exports.clone(),
        }
    }

    pub fn with_localizer(mut self, localizer: Arc<dyn Localizer>) -> Self {
        self.localizer = localizer;
        self
    }

    /// Registers a constructor under a type name nodes can refer to.
    pub fn export<P, F>(mut self, type_name: impl Into<String>, constructor: F) -> Self
    where
        P: Send + Sync + 'static,
        F: Fn() -> Result<P, BoxError> + Send + Sync + 'static,
    {
        self.exports.insert(
            type_name.into(),
            Arc::new(move || constructor().map(|value| Arc::new(value) as Object)),
        );
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn module(&self) -> Option<&str> {
        self.module.as_deref()
    }

    pub fn localizer(&self) -> &dyn Localizer {
        self.localizer.as_ref()
    }

    /// Constructs one exported object by type name.
    pub fn create_object(&self, type_name: &str) -> Result<Object, BoxError> {
        let constructor = self.exports.get(type_name).ok_or_else(|| -> BoxError {
            format!("add-in '{}' does not export type '{type_name}'", self.id).into()
        })?;
        constructor()
    }
}

/// Owning add-in of an extension node could not be obtained.
#[derive(Debug, thiserror::Error)]
pub enum UnavailableAddinError {
    /// The node was contributed without an owning add-in.
    #[error("extension node at `{path}` has no owning add-in")]
    NoOwner { path: String },
    /// Loading the add-in through the resolution service failed.
    #[error("add-in '{addin_id}' could not be loaded")]
    LoadFailed {
        addin_id: String,
        #[source]
        source: BoxError,
    },
    /// The add-in is loaded but no handle could be resolved.
    #[error("add-in '{addin_id}' could not be loaded")]
    NotResolved { addin_id: String },
}
