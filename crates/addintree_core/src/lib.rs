//! Typed extension tree for add-in hosts.
//!
//! Projects a mutable backing tree of extension points into typed nodes,
//! keeps the projection in sync through reconciliation, binds contributed
//! attributes through per-node-type schemas and constructs the objects
//! instantiable nodes wrap.

pub mod addin;
pub mod backing;
pub mod config;
pub mod logging;
pub mod report;
pub mod schema;
pub mod tree;

/// Failure raised by a collaborator (condition, loader, factory, observer).
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

pub use addin::{
    AddinResolver, CatalogLocalizer, IdentityLocalizer, Localizer, RuntimeAddin,
    StaticAddinResolver, UnavailableAddinError,
};
pub use backing::{ArenaTree, BackingNodeId, BackingTree, BackingTreeError, Condition};
pub use config::{LogSettings, TreeConfig};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use report::{CollectingErrorSink, ErrorReport, ErrorSink, LogErrorSink, ReportRecord};
pub use schema::{
    bind_object, Attribute, BindingError, FieldKind, FieldSpec, NodeTypeRegistry, NodeTypeSchema,
    PayloadSpec, SchemaError,
};
pub use tree::{
    ChildObjects, ExtensionChange, ExtensionError, ExtensionNodeEvent, ExtensionNodeList,
    ExtensionTree, InstanceContext, InstanceFactory, NodeFailure, NodeId, NodeOrigin, Object,
    SubscriptionId, TypeMismatchError,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
