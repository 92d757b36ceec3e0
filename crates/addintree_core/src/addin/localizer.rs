//! Per-add-in string localization.

use std::collections::BTreeMap;

/// Resolves localizable attribute values through an add-in's catalog.
pub trait Localizer: Send + Sync {
    fn localize(&self, raw: &str) -> String;
}

/// Returns every string unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityLocalizer;

impl Localizer for IdentityLocalizer {
    fn localize(&self, raw: &str) -> String {
        raw.to_string()
    }
}

/// Key/text table; unknown keys fall back to the raw value.
#[derive(Debug, Clone, Default)]
pub struct CatalogLocalizer {
    entries: BTreeMap<String, String>,
}

impl CatalogLocalizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(mut self, key: impl Into<String>, text: impl Into<String>) -> Self {
        self.entries.insert(key.into(), text.into());
        self
    }
}

impl Localizer for CatalogLocalizer {
    fn localize(&self, raw: &str) -> String {
        self.entries
            .get(raw)
            .cloned()
            .unwrap_or_else(|| raw.to_string())
    }
}
