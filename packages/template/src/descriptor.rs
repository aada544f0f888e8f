use crate::path::FieldPath;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

/// Named context a computed expression may read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ContextName {
    /// The current answer set
    UserInput,
    /// Global configuration
    Settings,
    /// Date arithmetic helper
    Date,
    /// Structured metadata of a resolved external document
    Frontmatter,
    /// The option just chosen in a query field
    Selection,
    /// The raw value being transformed or acted upon
    Value,
}

impl ContextName {
    pub const ALL: [ContextName; 6] = [
        ContextName::UserInput,
        ContextName::Settings,
        ContextName::Date,
        ContextName::Frontmatter,
        ContextName::Selection,
        ContextName::Value,
    ];

    /// Identifier under which the context is bound inside expressions
    pub fn as_str(&self) -> &'static str {
        match self {
            ContextName::UserInput => "userInput",
            ContextName::Settings => "settings",
            ContextName::Date => "date",
            ContextName::Frontmatter => "frontmatter",
            ContextName::Selection => "selection",
            ContextName::Value => "value",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == name)
    }
}

impl fmt::Display for ContextName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value computed from named contexts via a restricted expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ComputedDescriptor {
    #[serde(default)]
    pub contexts: Vec<ContextName>,
    pub expression: String,
    /// Field paths whose change triggers recomputation
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reactive_deps: Vec<FieldPath>,
    #[serde(default)]
    pub fallback: Value,
}

impl ComputedDescriptor {
    pub fn new(expression: impl Into<String>) -> Self {
        Self {
            contexts: Vec::new(),
            expression: expression.into(),
            reactive_deps: Vec::new(),
            fallback: Value::Null,
        }
    }

    pub fn with_contexts(mut self, contexts: impl IntoIterator<Item = ContextName>) -> Self {
        self.contexts = contexts.into_iter().collect();
        self
    }

    pub fn with_reactive_deps<P: Into<FieldPath>>(mut self, deps: impl IntoIterator<Item = P>) -> Self {
        self.reactive_deps = deps.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_fallback(mut self, fallback: Value) -> Self {
        self.fallback = fallback;
        self
    }

    /// Evaluated once at render and never recomputed when there are no deps
    pub fn is_reactive(&self) -> bool {
        !self.reactive_deps.is_empty()
    }

    pub fn declares(&self, context: ContextName) -> bool {
        self.contexts.contains(&context)
    }
}

/// Literal value or computed descriptor.
///
/// In configuration a JSON object carrying an `expression` key is a computed
/// descriptor; anything else is a literal.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ValueDescriptor {
    Computed(ComputedDescriptor),
    Literal(Value),
}

impl ValueDescriptor {
    pub fn literal(value: impl Into<Value>) -> Self {
        ValueDescriptor::Literal(value.into())
    }

    pub fn computed(&self) -> Option<&ComputedDescriptor> {
        match self {
            ValueDescriptor::Computed(computed) => Some(computed),
            ValueDescriptor::Literal(_) => None,
        }
    }

    pub fn reactive_deps(&self) -> &[FieldPath] {
        match self {
            ValueDescriptor::Computed(computed) => &computed.reactive_deps,
            ValueDescriptor::Literal(_) => &[],
        }
    }
}

impl From<ComputedDescriptor> for ValueDescriptor {
    fn from(computed: ComputedDescriptor) -> Self {
        ValueDescriptor::Computed(computed)
    }
}

impl<'de> Deserialize<'de> for ValueDescriptor {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Value::deserialize(deserializer)?;
        match raw {
            Value::Object(ref map) if map.contains_key("expression") => serde_json::from_value(raw)
                .map(ValueDescriptor::Computed)
                .map_err(D::Error::custom),
            other => Ok(ValueDescriptor::Literal(other)),
        }
    }
}

/// Descriptor invoked on explicit user trigger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ActionDescriptor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default)]
    pub contexts: Vec<ContextName>,
    pub expression: String,
    /// Where the result is written; defaults to the field itself
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<FieldPath>,
}

impl ActionDescriptor {
    /// View the action as a computed descriptor with a null fallback
    pub fn as_computed(&self) -> ComputedDescriptor {
        ComputedDescriptor::new(self.expression.clone()).with_contexts(self.contexts.iter().copied())
    }
}
