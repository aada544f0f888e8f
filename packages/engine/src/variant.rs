//! Variant-selector fields.
//!
//! A selector starts `Unselected` (or at its default variant) and moves to
//! `Selected(name)` whenever a variant is picked. The resolved template is
//! always rebuilt from the base template with the operations of every
//! selector's current variant; variants never stack on a previous merge.

use crate::error::{SessionError, SessionResult};
use crate::merge::merge;
use indexmap::IndexMap;
use metaform_template::{Field, FieldKind, FieldPath, SubclassOperation, Template};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VariantState {
    Unselected,
    Selected(String),
}

#[derive(Debug, Clone)]
pub struct VariantSelector {
    path: FieldPath,
    variants: IndexMap<String, Vec<SubclassOperation>>,
    state: VariantState,
}

impl VariantSelector {
    /// Selector for `field`, positioned at its default variant if it has one
    pub fn from_field(path: FieldPath, field: &Field) -> Self {
        let state = match field.default_variant() {
            Some(name) => VariantState::Selected(name.to_string()),
            None => VariantState::Unselected,
        };
        Self {
            path,
            variants: field.variants.clone(),
            state,
        }
    }

    pub fn path(&self) -> &FieldPath {
        &self.path
    }

    pub fn state(&self) -> &VariantState {
        &self.state
    }

    pub fn selected(&self) -> Option<&str> {
        match &self.state {
            VariantState::Selected(name) => Some(name),
            VariantState::Unselected => None,
        }
    }

    pub fn variant_names(&self) -> impl Iterator<Item = &String> {
        self.variants.keys()
    }

    pub fn select(&mut self, name: &str) -> SessionResult<()> {
        if !self.variants.contains_key(name) {
            return Err(SessionError::UnknownVariant {
                path: self.path.clone(),
                name: name.to_string(),
            });
        }
        debug!(path = %self.path, variant = name, "Variant selected");
        self.state = VariantState::Selected(name.to_string());
        Ok(())
    }

    /// Operations of the current variant; none while unselected
    pub fn operations(&self) -> &[SubclassOperation] {
        self.selected()
            .and_then(|name| self.variants.get(name))
            .map(|ops| ops.as_slice())
            .unwrap_or(&[])
    }
}

/// Every variant selector of `base`, in traversal order
pub fn discover_selectors(base: &Template) -> Vec<VariantSelector> {
    base.fields()
        .into_iter()
        .filter(|(_, field)| field.kind == FieldKind::Variant)
        .map(|(path, field)| VariantSelector::from_field(path, field))
        .collect()
}

/// Merge the base with the current variant of every selector
pub fn resolve_variants(base: &Template, selectors: &[VariantSelector]) -> Template {
    let ops: Vec<SubclassOperation> = selectors
        .iter()
        .flat_map(|selector| selector.operations().iter().cloned())
        .collect();
    merge(base, &ops)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn base() -> Template {
        Template::from_json(json!({
            "sample": {
                "state": {
                    "kind": "variant",
                    "default": "solid",
                    "variants": {
                        "solid": [
                            { "op": "add", "path": "sample.mass", "field": { "kind": "number", "units": { "allowed": ["mg", "g"] } } }
                        ],
                        "liquid": [
                            { "op": "add", "path": "sample.volume", "field": { "kind": "number" } },
                            { "op": "remove", "path": "sample.grainSize" }
                        ]
                    }
                },
                "grainSize": { "kind": "text" }
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_default_variant_is_preselected() {
        let selectors = discover_selectors(&base());
        assert_eq!(selectors.len(), 1);
        assert_eq!(selectors[0].selected(), Some("solid"));
        let resolved = resolve_variants(&base(), &selectors);
        assert!(resolved.field(&FieldPath::parse("sample.mass")).is_some());
    }

    #[test]
    fn test_switch_rebuilds_from_base() {
        let base = base();
        let mut selectors = discover_selectors(&base);
        selectors[0].select("liquid").unwrap();
        let resolved = resolve_variants(&base, &selectors);

        assert!(resolved.field(&FieldPath::parse("sample.volume")).is_some());
        assert!(resolved.field(&FieldPath::parse("sample.grainSize")).is_none());
        // the solid variant's addition does not linger
        assert!(resolved.field(&FieldPath::parse("sample.mass")).is_none());
    }

    #[test]
    fn test_unknown_variant_is_rejected() {
        let mut selectors = discover_selectors(&base());
        let err = selectors[0].select("gas").unwrap_err();
        assert!(matches!(err, SessionError::UnknownVariant { .. }));
        assert_eq!(selectors[0].selected(), Some("solid"));
    }

    #[test]
    fn test_unselected_without_default() {
        let template = Template::from_json(json!({
            "mode": { "kind": "variant", "variants": { "a": [], "b": [] } }
        }))
        .unwrap();
        let selectors = discover_selectors(&template);
        assert_eq!(selectors[0].state(), &VariantState::Unselected);
        assert!(selectors[0].operations().is_empty());
        assert_eq!(resolve_variants(&template, &selectors), template);
    }
}
