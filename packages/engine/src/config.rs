//! Engine configuration: global settings plus named templates.
//!
//! ```json
//! {
//!   "settings": { "authors": ["Ada"] },
//!   "templates": { "chemical": { "name": { "kind": "text" } } }
//! }
//! ```
//!
//! Templates are validated at load. Unsupported field kinds and dependency
//! cycles (in the base template or in any of its variants) are fatal;
//! dependency warnings are logged.

use crate::dependency::check_cycles;
use crate::error::{ConfigError, ConfigResult};
use crate::merge::merge;
use indexmap::IndexMap;
use metaform_template::{FieldKind, Template, TemplateWarning};
use serde::Deserialize;
use serde_json::Value as Json;
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Clone, Default)]
pub struct Configuration {
    /// Bound as the `settings` context
    pub settings: Json,
    pub templates: IndexMap<String, Template>,
}

#[derive(Deserialize)]
struct RawConfiguration {
    #[serde(default)]
    settings: Json,
    #[serde(default)]
    templates: IndexMap<String, Json>,
}

impl Configuration {
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&source)
    }

    pub fn from_json_str(source: &str) -> ConfigResult<Self> {
        let raw: RawConfiguration = serde_json::from_str(source)?;

        let mut templates = IndexMap::with_capacity(raw.templates.len());
        for (name, json) in raw.templates {
            let template = Template::from_json(json).map_err(|source| ConfigError::Template {
                name: name.clone(),
                source,
            })?;
            for warning in validate_template(&name, &template)? {
                warn!(template = %name, path = %warning.path, "{}", warning.message);
            }
            templates.insert(name, template);
        }

        let settings = match raw.settings {
            Json::Null => Json::Object(Default::default()),
            other => other,
        };

        info!(templates = templates.len(), "Configuration loaded");
        Ok(Self { settings, templates })
    }

    pub fn template(&self, name: &str) -> ConfigResult<&Template> {
        self.templates
            .get(name)
            .ok_or_else(|| ConfigError::UnknownTemplate {
                name: name.to_string(),
            })
    }

    pub fn template_names(&self) -> impl Iterator<Item = &String> {
        self.templates.keys()
    }
}

/// Check a template and each of its variants for cycles and collect
/// non-fatal warnings
pub fn validate_template(name: &str, template: &Template) -> ConfigResult<Vec<TemplateWarning>> {
    check_cycles(template).map_err(|source| ConfigError::Template {
        name: name.to_string(),
        source,
    })?;
    let mut warnings = template.validate();

    for (_, field) in template.fields() {
        if field.kind != FieldKind::Variant {
            continue;
        }
        for (variant, ops) in &field.variants {
            let merged = merge(template, ops);
            check_cycles(&merged).map_err(|source| ConfigError::Variant {
                name: name.to_string(),
                variant: variant.clone(),
                source,
            })?;
            for warning in merged.validate() {
                if !warnings.contains(&warning) {
                    warnings.push(warning);
                }
            }
        }
    }

    Ok(warnings)
}
