//! Attribute-to-field bindings.
//!
//! A [`FieldSpec<T>`] is declared against a concrete data type and erased into
//! a [`FieldBinding`] once, at schema build time. The erased setter only
//! downcasts; conversion rules live in the binder.

use super::SchemaError;
use std::any::{type_name, Any};
use std::collections::BTreeMap;
use std::fmt::{Debug, Display, Formatter};
use std::marker::PhantomData;
use std::str::FromStr;

/// Declared target type class of one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Single string, optionally localized.
    Text,
    /// Comma-separated list of trimmed strings.
    TextList,
    /// Enumeration parsed by symbolic name.
    Enumeration,
    /// Any other type converted from its string form.
    Value,
}

/// Converted input handed to an erased setter.
pub(crate) enum FieldInput<'a> {
    Text(String),
    TextList(Vec<String>),
    Raw(&'a str),
}

/// Why an erased setter rejected its input.
pub(crate) enum AssignError {
    /// Binding target is not the type the field was declared on.
    TargetMismatch,
    /// Raw value could not be converted to the field type.
    Conversion(String),
}

type ErasedSetter =
    Box<dyn for<'a> Fn(&mut dyn Any, FieldInput<'a>) -> Result<(), AssignError> + Send + Sync>;

/// Type-erased binding of one attribute name to one field.
pub struct FieldBinding {
    name: String,
    kind: FieldKind,
    value_type: &'static str,
    required: bool,
    localizable: bool,
    setter: ErasedSetter,
}

impl Debug for FieldBinding {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldBinding")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("value_type", &self.value_type)
            .field("required", &self.required)
            .field("localizable", &self.localizable)
            .finish()
    }
}

impl FieldBinding {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    /// Rust type name of the field value.
    pub fn value_type(&self) -> &'static str {
        self.value_type
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn is_localizable(&self) -> bool {
        self.localizable
    }

    pub(crate) fn assign(
        &self,
        target: &mut dyn Any,
        input: FieldInput<'_>,
    ) -> Result<(), AssignError> {
        (self.setter)(target, input)
    }
}

/// Field declaration against data type `T`.
pub struct FieldSpec<T> {
    binding: FieldBinding,
    _target: PhantomData<fn(&mut T)>,
}

impl<T: 'static> FieldSpec<T> {
    /// String field.
    pub fn text<F>(name: impl Into<String>, set: F) -> Self
    where
        F: Fn(&mut T, String) + Send + Sync + 'static,
    {
        Self::erased(name, FieldKind::Text, type_name::<String>(), move |target, input| {
            match input {
                FieldInput::Text(value) => set(target, value),
                FieldInput::TextList(values) => set(target, values.join(",")),
                FieldInput::Raw(raw) => set(target, raw.to_string()),
            }
            Ok(())
        })
    }

    /// String-list field bound from a comma-separated value.
    pub fn text_list<F>(name: impl Into<String>, set: F) -> Self
    where
        F: Fn(&mut T, Vec<String>) + Send + Sync + 'static,
    {
        Self::erased(
            name,
            FieldKind::TextList,
            type_name::<Vec<String>>(),
            move |target, input| {
                match input {
                    FieldInput::TextList(values) => set(target, values),
                    FieldInput::Text(value) => set(target, vec![value]),
                    FieldInput::Raw(raw) => set(target, vec![raw.to_string()]),
                }
                Ok(())
            },
        )
    }

    /// Enumeration field parsed by symbolic name through `FromStr`.
    pub fn enumeration<E, F>(name: impl Into<String>, set: F) -> Self
    where
        E: FromStr + 'static,
        E::Err: Display,
        F: Fn(&mut T, E) + Send + Sync + 'static,
    {
        Self::parsed(name, FieldKind::Enumeration, set)
    }

    /// Any other field type converted through `FromStr`.
    pub fn value<V, F>(name: impl Into<String>, set: F) -> Self
    where
        V: FromStr + 'static,
        V::Err: Display,
        F: Fn(&mut T, V) + Send + Sync + 'static,
    {
        Self::parsed(name, FieldKind::Value, set)
    }

    /// Binding fails when the attribute is absent.
    pub fn required(mut self) -> Self {
        self.binding.required = true;
        self
    }

    /// String value is resolved through the owning add-in's localizer.
    pub fn localizable(mut self) -> Self {
        self.binding.localizable = true;
        self
    }

    pub(crate) fn into_binding(self) -> FieldBinding {
        self.binding
    }

    fn parsed<V, F>(name: impl Into<String>, kind: FieldKind, set: F) -> Self
    where
        V: FromStr + 'static,
        V::Err: Display,
        F: Fn(&mut T, V) + Send + Sync + 'static,
    {
        Self::erased(name, kind, type_name::<V>(), move |target, input| {
            let raw = match &input {
                FieldInput::Raw(raw) => *raw,
                FieldInput::Text(value) => value.as_str(),
                FieldInput::TextList(_) => {
                    return Err(AssignError::Conversion(
                        "list input cannot convert to a scalar".to_string(),
                    ))
                }
            };
            let value = raw
                .parse::<V>()
                .map_err(|err| AssignError::Conversion(err.to_string()))?;
            set(target, value);
            Ok(())
        })
    }

    fn erased<S>(name: impl Into<String>, kind: FieldKind, value_type: &'static str, set: S) -> Self
    where
        S: for<'a> Fn(&mut T, FieldInput<'a>) -> Result<(), AssignError> + Send + Sync + 'static,
    {
        let setter: ErasedSetter = Box::new(move |target, input| {
            let target = target
                .downcast_mut::<T>()
                .ok_or(AssignError::TargetMismatch)?;
            set(target, input)
        });
        Self {
            binding: FieldBinding {
                name: name.into(),
                kind,
                value_type,
                required: false,
                localizable: false,
                setter,
            },
            _target: PhantomData,
        }
    }
}

/// Immutable set of bindings for one target type, keyed by attribute name.
#[derive(Debug)]
pub struct FieldSet {
    target_type: &'static str,
    bindings: BTreeMap<String, FieldBinding>,
}

impl FieldSet {
    /// Builds a set, rejecting empty or duplicate attribute names.
    pub(crate) fn from_bindings(
        owner: &str,
        target_type: &'static str,
        bindings: Vec<FieldBinding>,
    ) -> Result<Self, SchemaError> {
        let mut map = BTreeMap::new();
        for binding in bindings {
            if !super::is_valid_name(&binding.name) {
                return Err(SchemaError::InvalidFieldName {
                    schema: owner.to_string(),
                    field: binding.name,
                });
            }
            if map.contains_key(&binding.name) {
                return Err(SchemaError::DuplicateField {
                    schema: owner.to_string(),
                    field: binding.name,
                });
            }
            map.insert(binding.name.clone(), binding);
        }
        Ok(Self {
            target_type,
            bindings: map,
        })
    }

    /// Rust type name of the struct these bindings write into.
    pub fn target_type(&self) -> &'static str {
        self.target_type
    }

    pub fn get(&self, attribute: &str) -> Option<&FieldBinding> {
        self.bindings.get(attribute)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldBinding> {
        self.bindings.values()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}
