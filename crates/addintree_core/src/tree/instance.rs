//! Object retrieval for instantiable node types.
//!
//! # Responsibility
//! - Construct the object a node wraps, either cached per node or fresh.
//! - Collect objects of sibling nodes without letting one failure abort the
//!   rest.
//!
//! # Invariants
//! - `get_instance` returns the same object until the owning add-in is
//!   unloaded or the node is released. Reconciliation never drops it.
//! - `create_instance` never reads or writes the cache.

use super::{ExtensionError, ExtensionTree, NodeId, TypeMismatchError};
use crate::addin::RuntimeAddin;
use crate::backing::BackingTree;
use crate::BoxError;
use log::debug;
use std::any::{type_name, Any, TypeId};
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

/// Shared, type-erased object produced by a node.
pub type Object = Arc<dyn Any + Send + Sync>;

type Construct = Box<dyn Fn(&InstanceContext<'_>) -> Result<Object, BoxError> + Send + Sync>;

/// What a factory can see while constructing one object.
pub struct InstanceContext<'a> {
    path: &'a str,
    data: &'a dyn Any,
    addin: Option<&'a RuntimeAddin>,
}

impl<'a> InstanceContext<'a> {
    pub fn path(&self) -> &'a str {
        self.path
    }

    /// Bound node data, when it has type `T`.
    pub fn data<T: 'static>(&self) -> Option<&'a T> {
        self.data.downcast_ref::<T>()
    }

    /// Owning add-in, resolved before the factory runs.
    pub fn addin(&self) -> Option<&'a RuntimeAddin> {
        self.addin
    }
}

/// Instantiation capability of a node type.
pub struct InstanceFactory {
    product: Option<(TypeId, &'static str)>,
    construct: Construct,
}

impl Debug for InstanceFactory {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstanceFactory")
            .field("product", &self.product_type_name())
            .finish()
    }
}

impl InstanceFactory {
    /// Factory whose objects are always of type `P`.
    pub fn typed<P, F>(construct: F) -> Self
    where
        P: Send + Sync + 'static,
        F: Fn(&InstanceContext<'_>) -> Result<P, BoxError> + Send + Sync + 'static,
    {
        Self {
            product: Some((TypeId::of::<P>(), type_name::<P>())),
            construct: Box::new(move |context| {
                construct(context).map(|value| Arc::new(value) as Object)
            }),
        }
    }

    /// Factory creating the owning add-in's export named by the node data.
    ///
    /// The product type is only known after construction.
    pub fn from_export<T, F>(type_name_of: F) -> Self
    where
        T: 'static,
        F: Fn(&T) -> &str + Send + Sync + 'static,
    {
        Self {
            product: None,
            construct: Box::new(move |context| {
                let data = context.data::<T>().ok_or_else(|| -> BoxError {
                    format!("node data is not {}", type_name::<T>()).into()
                })?;
                let addin = context
                    .addin()
                    .ok_or_else(|| -> BoxError { "node has no owning add-in".into() })?;
                addin.create_object(type_name_of(data))
            }),
        }
    }

    /// Declared product type, `None` when decided at construction time.
    pub fn product_type_name(&self) -> Option<&'static str> {
        self.product.map(|(_, name)| name)
    }

    fn produces(&self, requested: TypeId) -> bool {
        self.product
            .map_or(true, |(product, _)| product == requested)
    }
}

/// One child that did not yield an object.
#[derive(Debug)]
pub struct NodeFailure {
    pub node: NodeId,
    pub addin_id: Option<String>,
    pub error: ExtensionError,
}

/// Objects collected from the children of one node.
#[derive(Debug)]
pub struct ChildObjects<T> {
    /// In child order.
    pub objects: Vec<Arc<T>>,
    pub failures: Vec<NodeFailure>,
}

impl<T> ChildObjects<T> {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

impl<B: BackingTree> ExtensionTree<B> {
    /// The node's cached object, constructed on first request.
    pub fn get_instance<T>(&mut self, node: NodeId) -> Result<Arc<T>, ExtensionError>
    where
        T: Send + Sync + 'static,
    {
        self.check_product::<T>(node)?;
        let object = match self.slot(node)?.cached_instance.clone() {
            Some(object) => object,
            None => {
                let object = self.construct(node)?;
                self.slot_mut(node)?.cached_instance = Some(Arc::clone(&object));
                debug!("event=instance_cache module=tree status=ok node={node}");
                object
            }
        };
        self.downcast_object(node, object)
    }

    /// A freshly constructed object; the cache is left untouched.
    pub fn create_instance<T>(&mut self, node: NodeId) -> Result<Arc<T>, ExtensionError>
    where
        T: Send + Sync + 'static,
    {
        self.check_product::<T>(node)?;
        let object = self.construct(node)?;
        self.downcast_object(node, object)
    }

    /// Objects of every visible child of `node`.
    ///
    /// Children that are not instantiable or fail to construct are reported
    /// and listed in [`ChildObjects::failures`].
    pub fn get_child_objects<T>(
        &mut self,
        node: NodeId,
        reuse_cached: bool,
    ) -> Result<ChildObjects<T>, ExtensionError>
    where
        T: Send + Sync + 'static,
    {
        let children = self.child_nodes(node)?;
        let mut objects = Vec::with_capacity(children.len());
        let mut failures = Vec::new();
        for child in children.iter() {
            let result = if reuse_cached {
                self.get_instance::<T>(child)
            } else {
                self.create_instance::<T>(child)
            };
            match result {
                Ok(object) => objects.push(object),
                Err(error) => {
                    let (path, addin_id) = match self.slot(child) {
                        Ok(slot) => (self.slot_path(slot), slot.origin.addin_id.clone()),
                        Err(_) => (String::new(), None),
                    };
                    let context = format!("Error while getting object for node in path '{path}'");
                    self.report(Some(&context), addin_id.as_deref(), Some(&error));
                    failures.push(NodeFailure {
                        node: child,
                        addin_id,
                        error,
                    });
                }
            }
        }
        Ok(ChildObjects { objects, failures })
    }

    fn check_product<T: 'static>(&self, node: NodeId) -> Result<(), ExtensionError> {
        let slot = self.slot(node)?;
        let factory = slot
            .schema
            .as_ref()
            .and_then(|schema| schema.instance_factory())
            .ok_or_else(|| ExtensionError::NotInstantiable {
                path: self.slot_path(slot),
            })?;
        if factory.produces(TypeId::of::<T>()) {
            return Ok(());
        }
        Err(TypeMismatchError {
            path: self.slot_path(slot),
            requested: type_name::<T>(),
            actual: factory.product_type_name().unwrap_or("object"),
        }
        .into())
    }

    fn construct(&mut self, node: NodeId) -> Result<Object, ExtensionError> {
        let owned = self.slot(node)?.origin.addin_id.is_some();
        let addin = if owned { Some(self.addin(node)?) } else { None };
        let slot = self.slot(node)?;
        let Some(schema) = slot.schema.clone() else {
            return Err(ExtensionError::NotInstantiable {
                path: self.slot_path(slot),
            });
        };
        let Some(factory) = schema.instance_factory() else {
            return Err(ExtensionError::NotInstantiable {
                path: self.slot_path(slot),
            });
        };

        let path = self.slot_path(slot);
        let context = InstanceContext {
            path: &path,
            data: slot.data.as_ref(),
            addin: addin.as_deref(),
        };
        (factory.construct)(&context).map_err(|source| ExtensionError::Construction {
            path: path.clone(),
            source,
        })
    }

    fn downcast_object<T>(&self, node: NodeId, object: Object) -> Result<Arc<T>, ExtensionError>
    where
        T: Send + Sync + 'static,
    {
        object.downcast::<T>().map_err(|_| {
            let path = self.path(node).unwrap_or_default();
            let actual = self
                .slot(node)
                .ok()
                .and_then(|slot| slot.schema.as_ref())
                .and_then(|schema| schema.instance_factory())
                .and_then(InstanceFactory::product_type_name)
                .unwrap_or("object");
            TypeMismatchError {
                path,
                requested: type_name::<T>(),
                actual,
            }
            .into()
        })
    }
}
