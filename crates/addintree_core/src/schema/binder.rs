//! Schema-driven attribute binding.
//!
//! # Invariants
//! - The shared [`FieldSet`] is never mutated; consumption happens on a
//!   borrowed working copy.
//! - Unknown attribute names are ignored.
//! - Only the first occurrence of a repeated attribute name is bound.

use super::field::{AssignError, FieldBinding, FieldInput, FieldKind, FieldSet};
use crate::addin::Localizer;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::BTreeMap;

/// Raw `(name, value)` attribute as delivered by the manifest parser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    pub value: String,
}

impl Attribute {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Attribute data does not satisfy the schema.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BindingError {
    /// A required attribute was absent.
    #[error("required attribute '{attribute}' not found")]
    MissingRequired { attribute: String },
    /// Enumeration value is not a known symbolic name.
    #[error("invalid value '{value}' for attribute '{attribute}' of enumeration {enum_type}: {reason}")]
    InvalidEnumValue {
        attribute: String,
        value: String,
        enum_type: &'static str,
        reason: String,
    },
    /// Raw value cannot be converted to the declared field type.
    #[error("field type not supported for attribute '{attribute}' ({field_type}): {reason}")]
    UnsupportedFieldType {
        attribute: String,
        field_type: &'static str,
        reason: String,
    },
    /// Binding target is not the type the field set was declared on.
    #[error("attribute '{attribute}' is declared on {expected}, not on the binding target")]
    TargetMismatch {
        attribute: String,
        expected: &'static str,
    },
}

/// Binds `attributes` into a typed target using `fields`.
pub fn bind_object<T: 'static>(
    target: &mut T,
    attributes: &[Attribute],
    fields: &FieldSet,
    localizer: Option<&dyn Localizer>,
) -> Result<(), BindingError> {
    bind_fields(target, attributes, fields, localizer)
}

/// Binds `attributes` into an erased target using `fields`.
///
/// Localizable text is routed through `localizer` when one is supplied and
/// assigned verbatim otherwise.
pub(crate) fn bind_fields(
    target: &mut dyn Any,
    attributes: &[Attribute],
    fields: &FieldSet,
    localizer: Option<&dyn Localizer>,
) -> Result<(), BindingError> {
    let mut pending: BTreeMap<&str, &FieldBinding> =
        fields.iter().map(|binding| (binding.name(), binding)).collect();

    for attribute in attributes {
        let Some(binding) = pending.remove(attribute.name.as_str()) else {
            continue;
        };
        let input = convert(binding, &attribute.value, localizer);
        binding
            .assign(target, input)
            .map_err(|err| assign_error(binding, &attribute.value, fields, err))?;
    }

    if let Some(missing) = pending.values().find(|binding| binding.is_required()) {
        return Err(BindingError::MissingRequired {
            attribute: missing.name().to_string(),
        });
    }
    Ok(())
}

/// Whether binding `attributes` against `fields` would localize anything.
pub(crate) fn needs_localizer(attributes: &[Attribute], fields: &FieldSet) -> bool {
    attributes.iter().any(|attribute| {
        fields
            .get(&attribute.name)
            .is_some_and(|binding| binding.kind() == FieldKind::Text && binding.is_localizable())
    })
}

/// Splits a comma-separated value into trimmed elements.
///
/// An empty or blank value yields an empty list.
pub fn split_text_list(raw: &str) -> Vec<String> {
    if raw.trim().is_empty() {
        return Vec::new();
    }
    raw.split(',').map(|part| part.trim().to_string()).collect()
}

fn convert<'a>(
    binding: &FieldBinding,
    raw: &'a str,
    localizer: Option<&dyn Localizer>,
) -> FieldInput<'a> {
    match binding.kind() {
        FieldKind::Text => match localizer {
            Some(localizer) if binding.is_localizable() => {
                FieldInput::Text(localizer.localize(raw))
            }
            _ => FieldInput::Text(raw.to_string()),
        },
        FieldKind::TextList => FieldInput::TextList(split_text_list(raw)),
        FieldKind::Enumeration | FieldKind::Value => FieldInput::Raw(raw),
    }
}

fn assign_error(
    binding: &FieldBinding,
    raw: &str,
    fields: &FieldSet,
    err: AssignError,
) -> BindingError {
    match err {
        AssignError::TargetMismatch => BindingError::TargetMismatch {
            attribute: binding.name().to_string(),
            expected: fields.target_type(),
        },
        AssignError::Conversion(reason) if binding.kind() == FieldKind::Enumeration => {
            BindingError::InvalidEnumValue {
                attribute: binding.name().to_string(),
                value: raw.to_string(),
                enum_type: binding.value_type(),
                reason,
            }
        }
        AssignError::Conversion(reason) => BindingError::UnsupportedFieldType {
            attribute: binding.name().to_string(),
            field_type: binding.value_type(),
            reason,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::{bind_object, split_text_list, Attribute, BindingError};
    use crate::addin::CatalogLocalizer;
    use crate::schema::{FieldSet, FieldSpec};
    use pretty_assertions::assert_eq;
    use std::str::FromStr;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    enum Placement {
        #[default]
        Start,
        End,
    }

    impl FromStr for Placement {
        type Err = String;

        fn from_str(s: &str) -> Result<Self, Self::Err> {
            match s {
                "Start" => Ok(Self::Start),
                "End" => Ok(Self::End),
                other => Err(format!("unknown placement `{other}`")),
            }
        }
    }

    #[derive(Debug, Default, PartialEq)]
    struct Button {
        id: String,
        label: String,
        flags: Vec<String>,
        placement: Placement,
        priority: u32,
    }

    fn fields() -> FieldSet {
        FieldSet::from_bindings(
            "Button",
            "Button",
            vec![
                FieldSpec::<Button>::text("id", |b, v| b.id = v)
                    .required()
                    .into_binding(),
                FieldSpec::<Button>::text("label", |b, v| b.label = v)
                    .localizable()
                    .into_binding(),
                FieldSpec::<Button>::text_list("flags", |b, v| b.flags = v).into_binding(),
                FieldSpec::<Button>::enumeration("placement", |b, v| b.placement = v)
                    .into_binding(),
                FieldSpec::<Button>::value("priority", |b, v| b.priority = v).into_binding(),
            ],
        )
        .unwrap()
    }

    fn attrs(pairs: &[(&str, &str)]) -> Vec<Attribute> {
        pairs
            .iter()
            .map(|(name, value)| Attribute::new(*name, *value))
            .collect()
    }

    #[test]
    fn binds_every_field_kind() {
        let mut button = Button::default();
        let localizer = CatalogLocalizer::new().with_entry("Save", "Enregistrer");
        bind_object(
            &mut button,
            &attrs(&[
                ("id", "save"),
                ("label", "Save"),
                ("flags", "a, b ,c"),
                ("placement", "End"),
                ("priority", "7"),
                ("unknown", "ignored"),
            ]),
            &fields(),
            Some(&localizer),
        )
        .unwrap();

        assert_eq!(
            button,
            Button {
                id: "save".to_string(),
                label: "Enregistrer".to_string(),
                flags: vec!["a".to_string(), "b".to_string(), "c".to_string()],
                placement: Placement::End,
                priority: 7,
            }
        );
    }

    #[test]
    fn localizable_text_is_verbatim_without_localizer() {
        let mut button = Button::default();
        bind_object(
            &mut button,
            &attrs(&[("id", "save"), ("label", "Save")]),
            &fields(),
            None,
        )
        .unwrap();
        assert_eq!(button.label, "Save");
    }

    #[test]
    fn empty_list_value_binds_empty_list() {
        let mut button = Button::default();
        bind_object(
            &mut button,
            &attrs(&[("id", "x"), ("flags", "")]),
            &fields(),
            None,
        )
        .unwrap();
        assert!(button.flags.is_empty());
        assert_eq!(split_text_list("  "), Vec::<String>::new());
        assert_eq!(split_text_list("a,,b"), vec!["a", "", "b"]);
    }

    #[test]
    fn missing_required_attribute_fails() {
        let mut button = Button::default();
        let err = bind_object(&mut button, &attrs(&[("flags", "a,b")]), &fields(), None)
            .unwrap_err();
        assert_eq!(
            err,
            BindingError::MissingRequired {
                attribute: "id".to_string()
            }
        );
    }

    #[test]
    fn enum_and_value_failures_are_distinct() {
        let mut button = Button::default();
        let err = bind_object(
            &mut button,
            &attrs(&[("id", "x"), ("placement", "Middle")]),
            &fields(),
            None,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            BindingError::InvalidEnumValue { ref attribute, .. } if attribute == "placement"
        ));

        let err = bind_object(
            &mut button,
            &attrs(&[("id", "x"), ("priority", "high")]),
            &fields(),
            None,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            BindingError::UnsupportedFieldType { ref attribute, field_type: "u32", .. }
                if attribute == "priority"
        ));
    }

    #[test]
    fn repeated_attribute_binds_first_occurrence() {
        let mut button = Button::default();
        bind_object(
            &mut button,
            &attrs(&[("id", "first"), ("id", "second")]),
            &fields(),
            None,
        )
        .unwrap();
        assert_eq!(button.id, "first");
    }

    #[test]
    fn binding_leaves_shared_field_set_untouched() {
        let fields = fields();
        let mut button = Button::default();
        bind_object(&mut button, &attrs(&[("id", "x")]), &fields, None).unwrap();
        assert_eq!(fields.len(), 5);

        let mut other = Button::default();
        let err = bind_object(&mut other, &[], &fields, None).unwrap_err();
        assert!(matches!(err, BindingError::MissingRequired { .. }));
    }

    #[test]
    fn rejects_foreign_binding_target() {
        let mut wrong = String::new();
        let err = bind_object(&mut wrong, &attrs(&[("id", "x")]), &fields(), None).unwrap_err();
        assert!(matches!(err, BindingError::TargetMismatch { expected: "Button", .. }));
    }
}
