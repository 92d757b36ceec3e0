//! Node type schemas: the per-extension-point binding table.

use super::field::{FieldBinding, FieldSet, FieldSpec};
use super::{is_valid_name, SchemaError};
use crate::tree::InstanceFactory;
use std::any::{type_name, Any, TypeId};
use std::fmt::{Debug, Formatter};
use std::marker::PhantomData;

type DataFactory = Box<dyn Fn() -> Box<dyn Any> + Send + Sync>;
type PayloadAssign = Box<dyn Fn(&mut dyn Any, Box<dyn Any>) -> bool + Send + Sync>;
pub(crate) type LifecycleHook = Box<dyn Fn(&mut dyn Any) + Send + Sync>;

/// Aggregate value built from the same attribute set and stored in one member.
pub struct PayloadBinding {
    member: String,
    fields: FieldSet,
    construct: DataFactory,
    assign: PayloadAssign,
}

impl Debug for PayloadBinding {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PayloadBinding")
            .field("member", &self.member)
            .field("fields", &self.fields)
            .finish()
    }
}

impl PayloadBinding {
    pub fn member(&self) -> &str {
        &self.member
    }

    pub fn fields(&self) -> &FieldSet {
        &self.fields
    }

    pub(crate) fn construct(&self) -> Box<dyn Any> {
        (self.construct)()
    }

    /// Stores `payload` into `target`; false when either type is foreign.
    pub(crate) fn assign(&self, target: &mut dyn Any, payload: Box<dyn Any>) -> bool {
        (self.assign)(target, payload)
    }
}

/// Payload declaration: payload type `P` stored into node data `T`.
pub struct PayloadSpec<T, P> {
    member: String,
    fields: Vec<FieldBinding>,
    assign: Box<dyn Fn(&mut T, P) + Send + Sync>,
    _types: PhantomData<fn(&mut T, P)>,
}

impl<T: 'static, P: Default + 'static> PayloadSpec<T, P> {
    pub fn new<F>(member: impl Into<String>, assign: F) -> Self
    where
        F: Fn(&mut T, P) + Send + Sync + 'static,
    {
        Self {
            member: member.into(),
            fields: Vec::new(),
            assign: Box::new(assign),
            _types: PhantomData,
        }
    }

    pub fn field(mut self, spec: FieldSpec<P>) -> Self {
        self.fields.push(spec.into_binding());
        self
    }

    fn build(self, schema: &str) -> Result<PayloadBinding, SchemaError> {
        let fields = FieldSet::from_bindings(schema, type_name::<P>(), self.fields)?;
        let assign = self.assign;
        Ok(PayloadBinding {
            member: self.member,
            fields,
            construct: Box::new(|| Box::new(P::default())),
            assign: Box::new(move |target, payload| {
                match (target.downcast_mut::<T>(), payload.downcast::<P>()) {
                    (Some(target), Ok(payload)) => {
                        assign(target, *payload);
                        true
                    }
                    _ => false,
                }
            }),
        })
    }
}

/// Per-node-type descriptor: field bindings, optional payload, optional
/// instantiation capability and lifecycle hooks.
pub struct NodeTypeSchema {
    name: String,
    data_type: TypeId,
    data_type_name: &'static str,
    fields: FieldSet,
    payload: Option<PayloadBinding>,
    default_data: DataFactory,
    instance_factory: Option<InstanceFactory>,
    on_addin_loaded: Option<LifecycleHook>,
    on_addin_unloaded: Option<LifecycleHook>,
}

impl Debug for NodeTypeSchema {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeTypeSchema")
            .field("name", &self.name)
            .field("data_type", &self.data_type_name)
            .field("fields", &self.fields)
            .field("payload", &self.payload)
            .field("instantiable", &self.instance_factory.is_some())
            .finish()
    }
}

impl NodeTypeSchema {
    /// Starts a schema whose nodes carry data of type `T`.
    pub fn builder<T: Default + 'static>(name: impl Into<String>) -> NodeTypeBuilder<T> {
        NodeTypeBuilder {
            name: name.into(),
            fields: Vec::new(),
            payload: None,
            instance_factory: None,
            on_addin_loaded: None,
            on_addin_unloaded: None,
            _data: PhantomData,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data_type(&self) -> TypeId {
        self.data_type
    }

    pub fn data_type_name(&self) -> &'static str {
        self.data_type_name
    }

    pub fn fields(&self) -> &FieldSet {
        &self.fields
    }

    pub fn payload(&self) -> Option<&PayloadBinding> {
        self.payload.as_ref()
    }

    pub fn instance_factory(&self) -> Option<&InstanceFactory> {
        self.instance_factory.as_ref()
    }

    pub fn is_instantiable(&self) -> bool {
        self.instance_factory.is_some()
    }

    pub(crate) fn new_data(&self) -> Box<dyn Any> {
        (self.default_data)()
    }

    pub(crate) fn on_addin_loaded(&self) -> Option<&LifecycleHook> {
        self.on_addin_loaded.as_ref()
    }

    pub(crate) fn on_addin_unloaded(&self) -> Option<&LifecycleHook> {
        self.on_addin_unloaded.as_ref()
    }
}

/// Builder for [`NodeTypeSchema`] over node data `T`.
pub struct NodeTypeBuilder<T> {
    name: String,
    fields: Vec<FieldBinding>,
    payload: Option<Result<PayloadBinding, SchemaError>>,
    instance_factory: Option<InstanceFactory>,
    on_addin_loaded: Option<LifecycleHook>,
    on_addin_unloaded: Option<LifecycleHook>,
    _data: PhantomData<fn() -> T>,
}

impl<T: Default + 'static> NodeTypeBuilder<T> {
    pub fn field(mut self, spec: FieldSpec<T>) -> Self {
        self.fields.push(spec.into_binding());
        self
    }

    /// Declares the aggregate payload member; a later call replaces it.
    pub fn payload<P: Default + 'static>(mut self, spec: PayloadSpec<T, P>) -> Self {
        self.payload = Some(spec.build(&self.name));
        self
    }

    /// Gives nodes of this type the ability to produce objects.
    pub fn instantiable(mut self, factory: InstanceFactory) -> Self {
        self.instance_factory = Some(factory);
        self
    }

    pub fn on_addin_loaded<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut T) + Send + Sync + 'static,
    {
        self.on_addin_loaded = Some(erase_hook(hook));
        self
    }

    pub fn on_addin_unloaded<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut T) + Send + Sync + 'static,
    {
        self.on_addin_unloaded = Some(erase_hook(hook));
        self
    }

    pub fn build(self) -> Result<NodeTypeSchema, SchemaError> {
        if !is_valid_name(&self.name) {
            return Err(SchemaError::InvalidName(self.name));
        }
        let fields = FieldSet::from_bindings(&self.name, type_name::<T>(), self.fields)?;
        let payload = self.payload.transpose()?;
        Ok(NodeTypeSchema {
            name: self.name,
            data_type: TypeId::of::<T>(),
            data_type_name: type_name::<T>(),
            fields,
            payload,
            default_data: Box::new(|| Box::new(T::default())),
            instance_factory: self.instance_factory,
            on_addin_loaded: self.on_addin_loaded,
            on_addin_unloaded: self.on_addin_unloaded,
        })
    }
}

fn erase_hook<T: 'static, F>(hook: F) -> LifecycleHook
where
    F: Fn(&mut T) + Send + Sync + 'static,
{
    Box::new(move |data| {
        if let Some(data) = data.downcast_mut::<T>() {
            hook(data);
        }
    })
}
